//! Scenario loading and configuration.
//!
//! Scenarios define the initial world for headless runs: dam geometry,
//! starting sea level, how fast the icecaps melt, the RNG seed, and how
//! long to simulate.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dam_core::dam::DamId;
use dam_core::reservoir::ReservoirId;
use dam_core::world::World;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario describes an invalid world.
    #[error("Invalid scenario: {0}")]
    WorldError(#[from] dam_core::error::DamError),
}

/// Geometry of the scenario's dam.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DamSetup {
    /// Lower horizontal bound.
    pub start_x: f32,
    /// Upper horizontal bound.
    pub end_x: f32,
    /// Number of wooden layers the dam starts with.
    pub layers: usize,
}

/// A complete scenario configuration.
///
/// # Example RON
///
/// ```ron
/// Scenario(
///     name: "standard",
///     description: "One dam against the melting icecaps",
///     dam: DamSetup(start_x: 5.5, end_x: 6.5, layers: 8),
///     sea_level: 1.0,
///     warming_rate: 0.07,
///     seed: 42,
///     ticks: 5000,
///     report_every: 50,
///     loss_threshold: 10.0,
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Dam geometry.
    pub dam: DamSetup,
    /// Initial level of the sea behind the dam.
    pub sea_level: f32,
    /// Rate at which the icecaps feed the sea; zero disables the source.
    pub warming_rate: f32,
    /// RNG seed for a reproducible run.
    pub seed: u64,
    /// Ticks to simulate.
    pub ticks: u64,
    /// Emit a state report every this many ticks.
    pub report_every: u64,
    /// Shoreline level at which the session counts as lost.
    pub loss_threshold: f32,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "standard".to_string(),
            description: "One dam against the melting icecaps".to_string(),
            dam: DamSetup {
                start_x: 5.5,
                end_x: 6.5,
                layers: 8,
            },
            sea_level: 1.0,
            warming_rate: 0.07,
            seed: 42,
            ticks: 5000,
            report_every: 50,
            loss_threshold: 10.0,
        }
    }
}

impl Scenario {
    /// Reservoir id used for the scenario's sea.
    pub const SEA: ReservoirId = ReservoirId(1);
    /// Reservoir id used for the icecaps source.
    pub const ICECAPS: ReservoirId = ReservoirId(2);

    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Build the world this scenario describes.
    pub fn build_world(&self) -> Result<(World, DamId), ScenarioError> {
        let mut world = World::with_seed(0.0, self.seed);
        let dam = world.add_dam(
            Self::SEA,
            self.dam.start_x,
            self.dam.end_x,
            self.dam.layers,
            Some(self.sea_level),
        )?;
        if self.warming_rate > 0.0 {
            world.add_source(Self::ICECAPS)?;
            let warming = world.allocate_connection_id();
            world.connect(warming, Self::ICECAPS, Self::SEA, self.warming_rate, 0.0)?;
        }
        Ok((world, dam))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario_builds() {
        let scenario = Scenario::default();
        let (world, dam) = scenario.build_world().expect("build");
        assert!(world.dam(dam).is_some());
        assert!((world.graph().level(Scenario::SEA).unwrap() - 1.0).abs() < 1e-6);
        assert!(world.graph().level(Scenario::ICECAPS).is_none());
    }

    #[test]
    fn test_zero_warming_skips_source() {
        let scenario = Scenario {
            warming_rate: 0.0,
            ..Scenario::default()
        };
        let (world, _) = scenario.build_world().expect("build");
        assert!(world.graph().get(Scenario::ICECAPS).is_none());
    }

    #[test]
    fn test_ron_roundtrip() {
        let scenario = Scenario::default();
        let text = ron::to_string(&scenario).expect("to ron");
        let parsed = Scenario::from_ron_str(&text).expect("from ron");
        assert_eq!(parsed.name, scenario.name);
        assert_eq!(parsed.ticks, scenario.ticks);
        assert!((parsed.sea_level - scenario.sea_level).abs() < 1e-6);
    }

    #[test]
    fn test_parse_error_reported() {
        assert!(matches!(
            Scenario::from_ron_str("Scenario(nope)"),
            Err(ScenarioError::ParseError(_))
        ));
    }
}
