//! Headless siege server: gameplay on top of the shared fluid grid.

pub mod economy;
pub mod init;
pub mod placement;
pub mod player;
pub mod plugin;
pub mod scenario;
pub mod schedule;
pub mod siege;
pub mod sources;
pub mod town_hall;
pub mod towers;
pub mod waves;
