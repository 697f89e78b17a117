pub mod constants;
pub mod error;
pub mod fluid;
pub mod sets;

pub use constants::*;
pub use error::ConfigError;
