//! The simulation world: tick driver and host façade.
//!
//! A [`World`] owns the reservoir graph, the dam chain and the seeded
//! simulation RNG, and advances everything synchronously once per
//! [`step`](World::step) call. No operation suspends or blocks; no
//! background tasks exist.
//!
//! # Determinism
//!
//! - All randomness comes from the world's seeded RNG; identical seeds
//!   produce identical runs.
//! - Connections and reservoirs are iterated in sorted-id order.
//! - [`state_hash`](World::state_hash) lets tests compare whole runs.
//!
//! # Example
//!
//! ```
//! use dam_core::world::{World, TICK_DT};
//! use dam_core::reservoir::ReservoirId;
//!
//! let mut world = World::new(0.0);
//! let sea = ReservoirId(1);
//! let dam = world.add_dam(sea, 5.5, 6.5, 8, Some(1.0)).unwrap();
//!
//! let events = world.step(TICK_DT).unwrap();
//! assert!(events.flows_opened.is_empty());
//! assert!(!world.is_flooded(dam));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::dam::{Dam, DamChain, DamId};
use crate::error::{DamError, Result};
use crate::material::Material;
use crate::reservoir::{ConnectionId, ReservoirGraph, ReservoirId};
use crate::rng::SimRng;

/// Ticks per second the host is expected to drive.
pub const TICK_RATE: u32 = 50;

/// Duration of one tick in seconds.
pub const TICK_DT: f32 = 0.02;

/// Whether a flow change belongs to a flood overflow or a leak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Water pouring over a flooded dam's crest.
    Flood,
    /// Water escaping through a breach.
    Leak,
}

/// A connection that opened or closed this tick.
///
/// The host uses these to start and stop cosmetic emitters without
/// polling every connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowChange {
    /// Dam the flow belongs to.
    pub dam: DamId,
    /// The connection that changed.
    pub connection: ConnectionId,
    /// Flood overflow or leak.
    pub kind: FlowKind,
    /// Rate at opening time; zero for closes.
    pub rate: f32,
}

/// A leak that formed spontaneously this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeakSpawn {
    /// Dam that breached.
    pub dam: DamId,
    /// Connection id of the new leak.
    pub connection: ConnectionId,
    /// Height of the breach.
    pub height: f32,
}

/// Events generated during one simulation tick, for the game layer to
/// trigger effects and sounds from.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// Connections opened this tick.
    pub flows_opened: Vec<FlowChange>,
    /// Connections closed this tick.
    pub flows_closed: Vec<FlowChange>,
    /// Leaks that formed spontaneously this tick.
    pub leaks_created: Vec<LeakSpawn>,
}

/// The core dam simulation.
///
/// # Tick Order
///
/// Each [`step`](Self::step), in this fixed sequence:
/// 1. For every dam, shoreline outward: flood check, leak activation,
///    erosion. Decisions are based on the levels as of the previous tick.
/// 2. The reservoir graph integrates all connections exactly once.
///
/// All mutation between ticks goes through this façade; only the owning
/// dam touches its leaks and layers, and only the graph moves water.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    tick: u64,
    graph: ReservoirGraph,
    chain: DamChain,
    rng: SimRng,
}

impl World {
    /// Reservoir id of the sentinel shoreline, registered by
    /// [`new`](Self::new). Host-chosen reservoir ids start at 1.
    pub const SHORELINE: ReservoirId = ReservoirId(0);

    /// First connection id handed out by
    /// [`allocate_connection_id`](Self::allocate_connection_id). Hosts
    /// wiring their own connections should keep chosen ids below this.
    pub const INTERNAL_CONNECTIONS: u32 = 1 << 16;

    /// Create a world with the default seed and the given shoreline level.
    #[must_use]
    pub fn new(shoreline_level: f32) -> Self {
        Self::from_rng(shoreline_level, SimRng::default())
    }

    /// Create a world with an explicit RNG seed, for reproducible runs.
    #[must_use]
    pub fn with_seed(shoreline_level: f32, seed: u64) -> Self {
        Self::from_rng(shoreline_level, SimRng::from_seed_u64(seed))
    }

    fn from_rng(shoreline_level: f32, rng: SimRng) -> Self {
        let mut graph = ReservoirGraph::new();
        // the graph is empty here; the sentinel id cannot collide
        let _ = graph.add_level(Self::SHORELINE, shoreline_level);
        Self {
            tick: 0,
            graph,
            chain: DamChain::new(Self::SHORELINE, Self::INTERNAL_CONNECTIONS),
            rng,
        }
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Read access to the reservoir graph.
    #[must_use]
    pub const fn graph(&self) -> &ReservoirGraph {
        &self.graph
    }

    // SETUP

    /// Register a reservoir.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::DuplicateReservoir`] if the id is taken.
    pub fn add_level(&mut self, id: ReservoirId, initial_level: f32) -> Result<()> {
        self.graph.add_level(id, initial_level)
    }

    /// Register an infinite source.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::DuplicateReservoir`] if the id is taken.
    pub fn add_source(&mut self, id: ReservoirId) -> Result<()> {
        self.graph.add_source(id)
    }

    /// Wire a host connection (rain, springs, global warming).
    ///
    /// # Errors
    ///
    /// Propagates the graph's configuration errors.
    pub fn connect(
        &mut self,
        id: ConnectionId,
        source: ReservoirId,
        target: ReservoirId,
        rate: f32,
        minimum_level: f32,
    ) -> Result<()> {
        self.graph.connect(id, source, target, rate, minimum_level)
    }

    /// One-time initialization write of a reservoir level.
    ///
    /// # Errors
    ///
    /// Propagates the graph's configuration errors.
    pub fn set_level(&mut self, id: ReservoirId, level: f32) -> Result<()> {
        self.graph.set_level(id, level)
    }

    /// Hand out a fresh connection id from the internal counter.
    pub fn allocate_connection_id(&mut self) -> ConnectionId {
        self.chain.allocate_connection()
    }

    /// Register a dam and splice it into the chain by position.
    ///
    /// Creates the dam's reservoir under `level`; without an explicit
    /// `initial_level` it inherits the level behind it. The dam starts as
    /// `layers` sections of wood.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::InvalidState`] for degenerate geometry or
    /// [`DamError::DuplicateReservoir`] if `level` is taken.
    pub fn add_dam(
        &mut self,
        level: ReservoirId,
        start_x: f32,
        end_x: f32,
        layers: usize,
        initial_level: Option<f32>,
    ) -> Result<DamId> {
        self.chain
            .add_dam(&mut self.graph, level, start_x, end_x, layers, initial_level)
    }

    // SIMULATION

    /// Advance the simulation by `dt` seconds.
    ///
    /// Runs every dam's flood/leak/erosion phases, then integrates the
    /// graph, and returns the events generated along the way.
    ///
    /// # Errors
    ///
    /// Errors indicate a corrupted topology and are not recoverable.
    pub fn step(&mut self, dt: f32) -> Result<TickEvents> {
        let mut events = TickEvents::default();
        self.chain
            .update(&mut self.graph, dt, &mut self.rng.0, &mut events)?;
        self.graph.step(dt);
        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "world state hash");
        }

        Ok(events)
    }

    // CREATURE / PLAYER OPERATIONS

    /// Gnaw at a dam. See [`Dam`] for the full semantics.
    ///
    /// Returns the connection id of the newly created leak, or `None` when
    /// existing leaks were widened instead (or nothing was hit). Unknown
    /// dam ids and out-of-range heights are silent misses: creatures probe
    /// this speculatively every tick.
    pub fn nibble_at(
        &mut self,
        dam: DamId,
        y: f32,
        check_radius: f32,
        amount: f32,
    ) -> Option<ConnectionId> {
        self.chain.nibble_at(dam, y, check_radius, amount)
    }

    /// Patch the first leak found around height `y` on a dam.
    ///
    /// Returns `true` when a leak was destroyed and the layer at its
    /// height replaced with `material` — only then should the caller spend
    /// inventory.
    ///
    /// # Errors
    ///
    /// Errors indicate a corrupted topology and are not recoverable.
    pub fn fix_leaks_at(
        &mut self,
        dam: DamId,
        y: f32,
        check_radius: f32,
        amount: f32,
        material: Material,
    ) -> Result<bool> {
        self.chain
            .fix_leaks_at(&mut self.graph, dam, y, check_radius, amount, material)
    }

    /// Add one layer of `material` to a dam. Returns whether the dam
    /// exists.
    pub fn build_up(&mut self, dam: DamId, material: Material) -> bool {
        self.chain.build_up(dam, material)
    }

    // QUERIES

    /// Dams in position order, shoreline outward.
    pub fn dams(&self) -> impl Iterator<Item = &Dam> + '_ {
        self.chain.iter()
    }

    /// Look up a dam by id.
    #[must_use]
    pub fn dam(&self, id: DamId) -> Option<&Dam> {
        self.chain.get(id)
    }

    /// The dam whose area contains `x`, if any.
    #[must_use]
    pub fn dam_at(&self, x: f32) -> Option<DamId> {
        self.chain.dam_at(x)
    }

    /// The dam whose held-back water covers `x`, if any.
    #[must_use]
    pub fn water_area_at(&self, x: f32) -> Option<DamId> {
        self.chain.water_area_at(x)
    }

    /// Height of the world at `x`: the dam's height on a dam, zero
    /// elsewhere.
    #[must_use]
    pub fn height_at(&self, x: f32) -> f32 {
        self.chain
            .iter()
            .find(|dam| dam.in_area(x))
            .map_or(0.0, Dam::height)
    }

    /// Water level visible at `x`.
    #[must_use]
    pub fn water_level_at(&self, x: f32) -> f32 {
        self.chain.water_level_at(&self.graph, x)
    }

    /// Whether the water behind or before a dam stands above its crest.
    #[must_use]
    pub fn is_flooded(&self, dam: DamId) -> bool {
        match (self.chain.get(dam), self.chain.prev_level(dam)) {
            (Some(d), Some(prev)) => d.is_flooded(&self.graph, prev),
            _ => false,
        }
    }

    /// The higher of a dam's own level and the level behind it.
    #[must_use]
    pub fn highest_level(&self, dam: DamId) -> Option<f32> {
        let prev = self.chain.prev_level(dam)?;
        Some(self.chain.get(dam)?.highest_level(&self.graph, prev))
    }

    /// Whether the land has drowned: the shoreline level stands above
    /// `threshold`.
    #[must_use]
    pub fn is_lost(&self, threshold: f32) -> bool {
        self.graph.level(Self::SHORELINE).unwrap_or(0.0) > threshold
    }

    // SNAPSHOTS

    /// Calculate a hash of the current simulation state.
    ///
    /// Two worlds with identical state produce identical hashes; used for
    /// determinism and replay verification.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);

        for id in self.graph.sorted_reservoir_ids() {
            id.hash(&mut hasher);
            match self.graph.level(id) {
                Some(level) => {
                    1u8.hash(&mut hasher);
                    level.to_bits().hash(&mut hasher);
                }
                None => 0u8.hash(&mut hasher),
            }
        }

        for id in self.graph.sorted_connection_ids() {
            id.hash(&mut hasher);
            if let Some(rate) = self.graph.connection_rate(id) {
                rate.to_bits().hash(&mut hasher);
            }
        }

        for dam in self.chain.iter() {
            dam.id().hash(&mut hasher);
            dam.height().to_bits().hash(&mut hasher);
            dam.materials().hash(&mut hasher);
            for leak in dam.leaks() {
                leak.connection().hash(&mut hasher);
                leak.height().to_bits().hash(&mut hasher);
                leak.rate().to_bits().hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// Serialize the world for saving or replay verification.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::InvalidState`] if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| DamError::InvalidState(format!("failed to serialize world: {e}")))
    }

    /// Deserialize a world from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::InvalidState`] if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| DamError::InvalidState(format!("failed to deserialize world: {e}")))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(0.0)
    }
}
