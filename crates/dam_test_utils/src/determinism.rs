//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Same-seed runs must be 100% reproducible: replays and balance
//! analysis depend on it. Sources of non-determinism include:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   The graph always iterates in sorted-id order.
//!
//! - **System randomness**: no calls to `thread_rng()`. All "random"
//!   behavior draws from the world's seeded ChaCha8 stream.
//!
//! - **Unordered event application**: host mutations (nibbles, repairs)
//!   must be applied in a fixed order between ticks.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual module determinism
//! 2. **Property tests**: random inputs must still produce deterministic outputs
//! 3. **Integration tests**: full scenarios are reproducible tick by tick

use dam_core::world::World;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed
    /// error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute a state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`World`].
///
/// Runs the world twice with identical setup and a fixed timestep, and
/// verifies the final state hashes match exactly.
pub fn verify_world_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> World,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |world| {
            world.step(dam_core::world::TICK_DT).expect("world step");
        },
        World::state_hash,
    );
    result.is_deterministic
}

/// Compare two world runs tick-by-tick, finding the first divergence.
///
/// Useful for debugging non-determinism by finding exactly when runs
/// start to differ.
///
/// # Returns
///
/// `None` if the runs agree, `Some(tick)` if they diverge at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> World,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        a.step(dam_core::world::TICK_DT).expect("world step");
        b.step(dam_core::world::TICK_DT).expect("world step");

        if a.state_hash() != b.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a serialization round-trip preserves world state exactly.
///
/// This is what save/load and replay verification rest on.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> World,
{
    let mut world = setup_fn();

    for _ in 0..num_ticks {
        world.step(dam_core::world::TICK_DT).expect("world step");
    }

    let hash_before = world.state_hash();

    let Ok(bytes) = world.serialize() else {
        return false;
    };
    let Ok(restored) = World::deserialize(&bytes) else {
        return false;
    };

    hash_before == restored.state_hash()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of simulation determinism.
pub mod strategies {
    use dam_core::material::Material;
    use proptest::prelude::*;

    /// Generate a water level in a reasonable range.
    pub fn arb_level() -> impl Strategy<Value = f32> {
        0.0f32..20.0
    }

    /// Generate a connection rate.
    pub fn arb_rate() -> impl Strategy<Value = f32> {
        0.001f32..2.0
    }

    /// Generate a height somewhere on the standard dam.
    pub fn arb_dam_height() -> impl Strategy<Value = f32> {
        0.0f32..2.5
    }

    /// Generate a material.
    pub fn arb_material() -> impl Strategy<Value = Material> {
        prop_oneof![
            Just(Material::Wood),
            Just(Material::Stone),
            Just(Material::Brick),
            Just(Material::Metal),
        ]
    }

    /// One scripted host action against the dam.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum HostAction {
        /// Gnaw at the given height.
        Nibble {
            /// Height to gnaw at.
            y: f32,
            /// Damage per action.
            amount: f32,
        },
        /// Attempt a repair at the given height.
        Fix {
            /// Height to patch at.
            y: f32,
            /// Repair strength.
            amount: f32,
            /// Replacement material.
            material: Material,
        },
        /// Add a layer of the given material.
        BuildUp(Material),
    }

    /// Generate a host action.
    pub fn arb_host_action() -> impl Strategy<Value = HostAction> {
        prop_oneof![
            (arb_dam_height(), 0.0001f32..0.01)
                .prop_map(|(y, amount)| HostAction::Nibble { y, amount }),
            (arb_dam_height(), 0.001f32..0.1, arb_material()).prop_map(
                |(y, amount, material)| HostAction::Fix {
                    y,
                    amount,
                    material
                }
            ),
            arb_material().prop_map(HostAction::BuildUp),
        ]
    }

    /// Generate a script of host actions, one per tick.
    pub fn arb_host_script(max_len: usize) -> impl Strategy<Value = Vec<HostAction>> {
        proptest::collection::vec(arb_host_action(), 0..max_len)
    }
}
