//! Scenario files: everything needed to start a siege, in one RON document.

use std::path::Path;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use siege_shared::error::{load_ron_file, to_ron_string};
use siege_shared::fluid::{FluidConfig, HeightfieldProbe, TerrainSource};
use siege_shared::ConfigError;
use thiserror::Error;

use crate::player::PlayerSetup;
use crate::siege::{SiegeSetup, TowerSetup};
use crate::sources::{SourceKind, SourceSetup};
use crate::towers::TowerKind;
use crate::town_hall::TownHallSetup;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// Randomly placed gaussian hills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HillSettings {
    pub seed: u64,
    pub count: usize,
    pub min_height: f32,
    pub max_height: f32,
    pub min_radius: f32,
    pub max_radius: f32,
}

impl Default for HillSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            count: 6,
            min_height: 50.0,
            max_height: 200.0,
            min_radius: 300.0,
            max_radius: 900.0,
        }
    }
}

/// Static ground: a tilted plane with optional hills on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    pub base_height: f32,
    /// Height gained per world unit along X and Z.
    pub gradient: Vec2,
    pub hills: Option<HillSettings>,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            base_height: 0.0,
            gradient: Vec2::ZERO,
            hills: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Hill {
    center: Vec2,
    height: f32,
    radius: f32,
}

/// Terrain generated from [`TerrainSettings`] over a grid's extent.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioTerrain {
    base_height: f32,
    gradient: Vec2,
    hills: Vec<Hill>,
}

impl ScenarioTerrain {
    pub fn generate(settings: &TerrainSettings, fluid: &FluidConfig) -> Self {
        let hills = match &settings.hills {
            Some(hill_settings) => {
                let origin = fluid.resolved_origin();
                let extent = fluid.grid_size as f32 * fluid.cell_size;
                scatter_hills(hill_settings, origin, origin + Vec2::splat(extent))
            }
            None => Vec::new(),
        };
        Self {
            base_height: settings.base_height,
            gradient: settings.gradient,
            hills,
        }
    }

    /// Ground height at a point on the X/Z plane.
    pub fn height_at(&self, point: Vec2) -> f32 {
        let hills: f32 = self
            .hills
            .iter()
            .map(|hill| {
                let d2 = point.distance_squared(hill.center);
                hill.height * (-d2 / (2.0 * hill.radius * hill.radius)).exp()
            })
            .sum();
        self.base_height + self.gradient.dot(point) + hills
    }

    pub fn into_source(self) -> TerrainSource {
        TerrainSource::new(HeightfieldProbe::new(move |point| {
            Some(self.height_at(point))
        }))
    }
}

fn scatter_hills(settings: &HillSettings, min: Vec2, max: Vec2) -> Vec<Hill> {
    let mut rng = StdRng::seed_from_u64(settings.seed);
    (0..settings.count)
        .map(|_| Hill {
            center: Vec2::new(rng.gen_range(min.x..=max.x), rng.gen_range(min.y..=max.y)),
            height: rng.gen_range(settings.min_height..=settings.max_height),
            radius: rng.gen_range(settings.min_radius..=settings.max_radius),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    pub fluid: FluidConfig,
    pub terrain: TerrainSettings,
    pub siege: SiegeSetup,
}

impl Default for Scenario {
    /// A valley draining south: three sources on the northern ridge, a basin
    /// source halfway down and the town hall at the bottom.
    fn default() -> Self {
        let source = |x: f32, z: f32, kind: SourceKind| SourceSetup {
            position: Vec3::new(x, 0.0, z),
            kind,
            ..Default::default()
        };
        Self {
            name: "valley".to_string(),
            fluid: FluidConfig::default(),
            terrain: TerrainSettings {
                base_height: 0.0,
                gradient: Vec2::new(0.0, 0.05),
                hills: Some(HillSettings {
                    seed: 7,
                    ..Default::default()
                }),
            },
            siege: SiegeSetup {
                sources: vec![
                    source(0.0, 5000.0, SourceKind::Regular),
                    source(-3000.0, 5000.0, SourceKind::Regular),
                    source(3000.0, 5000.0, SourceKind::Regular),
                    source(0.0, 2000.0, SourceKind::Basin),
                ],
                towers: vec![
                    TowerSetup {
                        kind: TowerKind::LeveeWall,
                        position: Vec3::new(0.0, 0.0, -3000.0),
                        facing: Vec2::X,
                    },
                    TowerSetup {
                        kind: TowerKind::Evaporator,
                        position: Vec3::new(-1500.0, 0.0, -3500.0),
                        facing: Vec2::X,
                    },
                ],
                town_hall: Some(TownHallSetup {
                    position: Vec3::new(0.0, 0.0, -4000.0),
                    ..Default::default()
                }),
                player: Some(PlayerSetup {
                    position: Vec3::new(500.0, 0.0, -3800.0),
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let scenario: Self = load_ron_file(path)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Self =
            ron::de::from_str(text).map_err(|err| ConfigError::parse("<inline>", err))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn to_ron(&self) -> Result<String, ScenarioError> {
        Ok(to_ron_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.fluid.validate()?;

        if !self.terrain.gradient.is_finite() || !self.terrain.base_height.is_finite() {
            return Err(ScenarioError::Invalid("terrain must be finite".to_string()));
        }
        if let Some(hills) = &self.terrain.hills {
            if hills.min_height > hills.max_height || hills.min_radius > hills.max_radius {
                return Err(ScenarioError::Invalid(
                    "hill ranges must have min <= max".to_string(),
                ));
            }
            if hills.min_radius <= 0.0 {
                return Err(ScenarioError::Invalid(
                    "hill radius must be positive".to_string(),
                ));
            }
        }

        let waves = &self.siege.waves;
        if self.siege.waves_enabled && waves.waves.is_empty() {
            return Err(ScenarioError::Invalid("no waves defined".to_string()));
        }
        if let Some((i, _)) = waves
            .waves
            .iter()
            .enumerate()
            .find(|(_, wave)| !(wave.duration.is_finite() && wave.duration > 0.0))
        {
            return Err(ScenarioError::Invalid(format!(
                "wave {} must have a positive duration",
                i + 1
            )));
        }
        if self
            .siege
            .sources
            .iter()
            .any(|s| !(s.spawn_interval.is_finite() && s.spawn_interval > 0.0))
        {
            return Err(ScenarioError::Invalid(
                "source spawn_interval must be positive".to_string(),
            ));
        }

        let mapper = self.fluid.mapper();
        for source in &self.siege.sources {
            let cell = mapper.world_to_cell(source.position);
            if !mapper.is_valid_cell(cell.x, cell.y) {
                warn!("Source at {} lies outside the fluid grid", source.position);
            }
        }
        Ok(())
    }

    pub fn terrain(&self) -> ScenarioTerrain {
        ScenarioTerrain::generate(&self.terrain, &self.fluid)
    }
}
