//! Test fixtures and helpers.
//!
//! Pre-built world configurations for consistent testing. The standard
//! world is the canonical game session: one eight-layer wooden dam
//! holding the sea back from the shoreline, fed by the melting icecaps.

use dam_core::dam::DamId;
use dam_core::reservoir::ReservoirId;
use dam_core::world::World;

/// Reservoir held back by the standard dam.
pub const SEA: ReservoirId = ReservoirId(1);

/// Infinite source feeding the sea.
pub const ICECAPS: ReservoirId = ReservoirId(2);

/// Horizontal extent of the standard dam.
pub const DAM_SPAN: (f32, f32) = (5.5, 6.5);

/// Layer count of the standard dam.
pub const DAM_LAYERS: usize = 8;

/// Initial sea level of the standard world.
pub const INITIAL_SEA_LEVEL: f32 = 1.0;

/// Rate at which the icecaps feed the sea.
pub const WARMING_RATE: f32 = 0.07;

/// Shoreline level at which the standard session is lost.
pub const LOSS_THRESHOLD: f32 = 10.0;

/// Float value `a` is approximately `b`.
#[must_use]
pub fn approx(a: f32, b: f32, tolerance: f32) -> bool {
    (a - b).abs() < tolerance
}

/// Build the canonical session world with an explicit seed.
///
/// Returns the world and the standard dam's id.
#[must_use]
pub fn standard_world(seed: u64) -> (World, DamId) {
    let mut world = World::with_seed(0.0, seed);
    let dam = world
        .add_dam(
            SEA,
            DAM_SPAN.0,
            DAM_SPAN.1,
            DAM_LAYERS,
            Some(INITIAL_SEA_LEVEL),
        )
        .expect("standard dam setup");
    world.add_source(ICECAPS).expect("icecaps setup");
    let warming = world.allocate_connection_id();
    world
        .connect(warming, ICECAPS, SEA, WARMING_RATE, 0.0)
        .expect("warming connection setup");
    (world, dam)
}

/// A standard world with `count` leaks already gnawed into the dam at
/// evenly spaced heights.
#[must_use]
pub fn breached_world(seed: u64, count: usize) -> (World, DamId) {
    let (mut world, dam) = standard_world(seed);
    let height = world.dam(dam).map_or(0.0, |d| d.height());
    for i in 0..count {
        let y = height * (i as f32 + 0.5) / count as f32;
        world.nibble_at(dam, y, 0.01, 0.0);
    }
    (world, dam)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dam_core::material::SECTION_HEIGHT;

    #[test]
    fn test_standard_world_shape() {
        let (world, dam) = standard_world(1);
        let dam = world.dam(dam).expect("dam exists");
        assert!(approx(dam.height(), 8.0 * SECTION_HEIGHT, 1e-6));
        assert!(approx(
            world.graph().level(SEA).unwrap_or(0.0),
            INITIAL_SEA_LEVEL,
            1e-6
        ));
        assert!(world.graph().level(ICECAPS).is_none());
    }

    #[test]
    fn test_breached_world_has_requested_leaks() {
        let (world, dam) = breached_world(1, 5);
        assert_eq!(world.dam(dam).expect("dam exists").leaks().len(), 5);
    }
}
