//! Water-transport graph: reservoirs, sources, and rate-limited connections.
//!
//! The graph owns every water level in the simulation. Levels only change
//! when [`ReservoirGraph::step`] integrates the registered connections, or
//! through one-time initialization. Total water is conserved: every unit
//! credited to one side of a connection is debited from the other.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DamError, Result};

/// Unique handle for a reservoir or source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ReservoirId(pub u32);

impl ReservoirId {
    /// Create a new reservoir id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Unique handle for a flow connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Create a new connection id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// A named quantity of water.
///
/// A reservoir with `level == None` is an infinite *source*: it can donate
/// water through connections but is never filled or depleted, and always
/// reports "no level".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reservoir {
    /// Identity of this reservoir.
    pub id: ReservoirId,
    /// Current level, or `None` for an infinite source.
    level: Option<f32>,
}

impl Reservoir {
    /// Current level; `None` for sources.
    #[must_use]
    pub const fn level(&self) -> Option<f32> {
        self.level
    }

    /// Whether this is an infinite source.
    #[must_use]
    pub const fn is_source(&self) -> bool {
        self.level.is_none()
    }
}

/// A directed, rate-limited flow path between two reservoirs.
///
/// The stored rate is always non-negative; a negative rate at registration
/// time swaps the endpoints instead. The stored direction is only nominal:
/// each tick water runs from whichever side is currently higher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Identity of this connection.
    pub id: ConnectionId,
    /// Nominal donating side.
    pub source: ReservoirId,
    /// Nominal receiving side. Never a source.
    pub target: ReservoirId,
    /// Transfer rate in level units per second.
    pub rate: f32,
    /// Level below which the donating side will not be drained.
    pub minimum_level: f32,
}

/// The water-transport graph.
///
/// Exclusively owns all reservoirs, sources and connections. Registration
/// errors (duplicate ids, flow into a source, self-connection) are
/// topology bugs and fail immediately; see [`DamError`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservoirGraph {
    reservoirs: HashMap<ReservoirId, Reservoir>,
    connections: HashMap<ConnectionId, Connection>,
}

impl ReservoirGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reservoir with an initial level.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::DuplicateReservoir`] if the id is already taken.
    pub fn add_level(&mut self, id: ReservoirId, initial_level: f32) -> Result<()> {
        self.insert_reservoir(Reservoir {
            id,
            level: Some(initial_level),
        })
    }

    /// Register an infinite source.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::DuplicateReservoir`] if the id is already taken.
    pub fn add_source(&mut self, id: ReservoirId) -> Result<()> {
        self.insert_reservoir(Reservoir { id, level: None })
    }

    fn insert_reservoir(&mut self, reservoir: Reservoir) -> Result<()> {
        if self.reservoirs.contains_key(&reservoir.id) {
            return Err(DamError::DuplicateReservoir(reservoir.id));
        }
        self.reservoirs.insert(reservoir.id, reservoir);
        Ok(())
    }

    /// Create (or replace) a connection between two registered reservoirs.
    ///
    /// A negative `rate` swaps `source` and `target` and stores the negated
    /// rate, so stored rates are always non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::UnknownReservoir`] if either endpoint is not
    /// registered, or [`DamError::InvalidFlow`] if the (normalized) target
    /// is a source or both endpoints are the same reservoir.
    pub fn connect(
        &mut self,
        id: ConnectionId,
        source: ReservoirId,
        target: ReservoirId,
        rate: f32,
        minimum_level: f32,
    ) -> Result<()> {
        let (source, target, rate) = if rate < 0.0 {
            (target, source, -rate)
        } else {
            (source, target, rate)
        };
        if source == target {
            return Err(DamError::InvalidFlow(format!(
                "reservoir {source:?} connected to itself"
            )));
        }
        let target_reservoir = self
            .reservoirs
            .get(&target)
            .ok_or(DamError::UnknownReservoir(target))?;
        if target_reservoir.is_source() {
            return Err(DamError::InvalidFlow(format!(
                "cannot flow water into source {target:?}"
            )));
        }
        if !self.reservoirs.contains_key(&source) {
            return Err(DamError::UnknownReservoir(source));
        }
        self.connections.insert(
            id,
            Connection {
                id,
                source,
                target,
                rate,
                minimum_level,
            },
        );
        Ok(())
    }

    /// Remove a connection.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::UnknownConnection`] if no connection has this id.
    /// Callers are expected to check [`have_connection`](Self::have_connection)
    /// first when absence is a legitimate possibility.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<()> {
        if self.connections.remove(&id).is_none() {
            return Err(DamError::UnknownConnection(id));
        }
        Ok(())
    }

    /// Whether a connection with this id exists.
    ///
    /// Presence of a connection is the "flow is active" signal used by the
    /// presentation layer and by dams managing their leaks.
    #[must_use]
    pub fn have_connection(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Current rate of a connection, or `None` if it does not exist.
    #[must_use]
    pub fn connection_rate(&self, id: ConnectionId) -> Option<f32> {
        self.connections.get(&id).map(|c| c.rate)
    }

    /// Look up a reservoir.
    #[must_use]
    pub fn get(&self, id: ReservoirId) -> Option<&Reservoir> {
        self.reservoirs.get(&id)
    }

    /// Finite level of a reservoir; `None` for sources and unknown ids.
    #[must_use]
    pub fn level(&self, id: ReservoirId) -> Option<f32> {
        self.reservoirs.get(&id).and_then(|r| r.level)
    }

    /// One-time initialization write of a reservoir level.
    ///
    /// Ordinary mutation happens exclusively through [`step`](Self::step);
    /// this exists for world setup only.
    ///
    /// # Errors
    ///
    /// Returns [`DamError::UnknownReservoir`] for an unregistered id, or
    /// [`DamError::InvalidFlow`] when targeting a source.
    pub fn set_level(&mut self, id: ReservoirId, level: f32) -> Result<()> {
        let reservoir = self
            .reservoirs
            .get_mut(&id)
            .ok_or(DamError::UnknownReservoir(id))?;
        if reservoir.is_source() {
            return Err(DamError::InvalidFlow(format!(
                "cannot set level of source {id:?}"
            )));
        }
        reservoir.level = Some(level);
        Ok(())
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Sorted connection ids for deterministic iteration.
    #[must_use]
    pub fn sorted_connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted reservoir ids for deterministic iteration.
    #[must_use]
    pub fn sorted_reservoir_ids(&self) -> Vec<ReservoirId> {
        let mut ids: Vec<_> = self.reservoirs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Advance all connections by `dt` seconds.
    ///
    /// Connections are integrated independently, in sorted-id order (the
    /// order carries no semantics; sorting only keeps runs reproducible).
    /// For each connection, `rate * dt` water moves from the currently
    /// higher side to the lower side. The amount is capped at half the
    /// level difference so a coarse step can never overshoot equalization,
    /// and any transfer that would take the donating side below the
    /// connection's minimum level is clawed back from the receiving side,
    /// preserving conservation.
    pub fn step(&mut self, dt: f32) {
        for id in self.sorted_connection_ids() {
            if let Some(connection) = self.connections.get(&id).copied() {
                self.integrate(connection, dt);
            }
        }
    }

    fn integrate(&mut self, connection: Connection, dt: f32) {
        let source_level = self.level(connection.source);
        let Some(target_level) = self.level(connection.target) else {
            // target is never a source; enforced at connect()
            return;
        };

        // flow direction is re-evaluated every tick: if the nominal source
        // has dropped below the target, water runs the other way
        let (donor_id, donor_level, receiver_id, mut receiver_level) = match source_level {
            Some(level) if level < target_level => (
                connection.target,
                Some(target_level),
                connection.source,
                level,
            ),
            _ => (
                connection.source,
                source_level,
                connection.target,
                target_level,
            ),
        };

        let mut amount = connection.rate * dt;
        if let Some(level) = donor_level {
            // equalize this step at most, never cross over
            let difference = level - receiver_level;
            if difference < 2.0 * amount {
                amount = difference / 2.0;
            }
        }
        receiver_level += amount;
        if let Some(mut level) = donor_level {
            level -= amount;
            let shortfall = connection.minimum_level - level;
            if shortfall > 0.0 {
                level += shortfall;
                receiver_level -= shortfall;
            }
            self.write_level(donor_id, level);
        }
        self.write_level(receiver_id, receiver_level);
    }

    fn write_level(&mut self, id: ReservoirId, level: f32) {
        if let Some(reservoir) = self.reservoirs.get_mut(&id) {
            if reservoir.level.is_some() {
                reservoir.level = Some(level);
            }
        }
    }

    /// Sum of all finite levels. Sources contribute nothing.
    #[must_use]
    pub fn total_water(&self) -> f32 {
        self.reservoirs.values().filter_map(|r| r.level).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const A: ReservoirId = ReservoirId(1);
    const B: ReservoirId = ReservoirId(2);
    const SRC: ReservoirId = ReservoirId(3);
    const FLOW: ConnectionId = ConnectionId(1);

    fn two_levels(a: f32, b: f32) -> ReservoirGraph {
        let mut graph = ReservoirGraph::new();
        graph.add_level(A, a).unwrap();
        graph.add_level(B, b).unwrap();
        graph
    }

    #[test]
    fn test_duplicate_reservoir_rejected() {
        let mut graph = two_levels(1.0, 0.0);
        assert!(matches!(
            graph.add_level(A, 5.0),
            Err(DamError::DuplicateReservoir(id)) if id == A
        ));
        assert!(matches!(
            graph.add_source(B),
            Err(DamError::DuplicateReservoir(_))
        ));
    }

    #[test]
    fn test_flow_into_source_rejected() {
        let mut graph = two_levels(1.0, 0.0);
        graph.add_source(SRC).unwrap();
        assert!(matches!(
            graph.connect(FLOW, A, SRC, 0.1, 0.0),
            Err(DamError::InvalidFlow(_))
        ));
        // negative rate normalizes endpoints before validation
        assert!(graph.connect(FLOW, SRC, A, 0.1, 0.0).is_ok());
        assert!(matches!(
            graph.connect(ConnectionId(2), A, SRC, -0.1, 0.0),
            Err(DamError::InvalidFlow(_))
        ));
    }

    #[test]
    fn test_self_connection_rejected() {
        let mut graph = two_levels(1.0, 0.0);
        assert!(matches!(
            graph.connect(FLOW, A, A, 0.1, 0.0),
            Err(DamError::InvalidFlow(_))
        ));
    }

    #[test]
    fn test_disconnect_unknown_is_error() {
        let mut graph = two_levels(1.0, 0.0);
        assert!(matches!(
            graph.disconnect(FLOW),
            Err(DamError::UnknownConnection(id)) if id == FLOW
        ));
        graph.connect(FLOW, A, B, 0.1, 0.0).unwrap();
        assert!(graph.have_connection(FLOW));
        graph.disconnect(FLOW).unwrap();
        assert!(!graph.have_connection(FLOW));
    }

    #[test]
    fn test_negative_rate_swaps_endpoints() {
        let mut graph = two_levels(1.0, 0.0);
        graph.connect(FLOW, A, B, -0.5, 0.0).unwrap();
        assert_eq!(graph.connection_rate(FLOW), Some(0.5));
        // B is now the nominal source: draining B is capped by its minimum
        graph.step(1.0);
        // water still runs downhill, from A (1.0) toward B (0.0)
        assert!(graph.level(A).unwrap() < 1.0);
        assert!(graph.level(B).unwrap() > 0.0);
    }

    #[test]
    fn test_transfer_moves_rate_times_dt() {
        let mut graph = two_levels(10.0, 0.0);
        graph.connect(FLOW, A, B, 0.5, 0.0).unwrap();
        graph.step(1.0);
        assert!((graph.level(A).unwrap() - 9.5).abs() < 1e-6);
        assert!((graph.level(B).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_equalization_never_overshoots() {
        let mut graph = two_levels(10.0, 0.0);
        // rate far larger than the difference: one step must not cross over
        graph.connect(FLOW, A, B, 1000.0, 0.0).unwrap();
        let mut previous_gap = 10.0_f32;
        for _ in 0..50 {
            graph.step(1.0);
            let a = graph.level(A).unwrap();
            let b = graph.level(B).unwrap();
            assert!(a >= b, "A sank below B: {a} < {b}");
            let gap = a - b;
            assert!(gap <= previous_gap + 1e-6, "gap grew: {gap} > {previous_gap}");
            previous_gap = gap;
        }
        assert!(previous_gap < 1e-3);
    }

    #[test]
    fn test_flow_reverses_when_levels_invert() {
        let mut graph = two_levels(0.0, 4.0);
        // nominal direction A -> B, but B is higher
        graph.connect(FLOW, A, B, 0.5, 0.0).unwrap();
        graph.step(1.0);
        assert!((graph.level(A).unwrap() - 0.5).abs() < 1e-6);
        assert!((graph.level(B).unwrap() - 3.5).abs() < 1e-6);
    }

    #[test]
    fn test_minimum_level_clawback_conserves() {
        let mut graph = two_levels(1.0, 0.0);
        // minimum above what the transfer would leave behind
        graph.connect(FLOW, A, B, 0.5, 0.8).unwrap();
        graph.step(1.0);
        let a = graph.level(A).unwrap();
        let b = graph.level(B).unwrap();
        assert!((a - 0.8).abs() < 1e-6, "donor clamped to minimum, got {a}");
        assert!(((a + b) - 1.0).abs() < 1e-6, "water not conserved");
    }

    #[test]
    fn test_source_feeds_without_draining() {
        let mut graph = ReservoirGraph::new();
        graph.add_level(A, 0.0).unwrap();
        graph.add_source(SRC).unwrap();
        graph.connect(FLOW, SRC, A, 0.07, 0.0).unwrap();
        for _ in 0..100 {
            graph.step(1.0);
            assert!(graph.level(SRC).is_none(), "source grew a finite level");
        }
        assert!((graph.level(A).unwrap() - 7.0).abs() < 1e-3);
    }

    #[test]
    fn test_replacing_connection_updates_rate() {
        let mut graph = two_levels(10.0, 0.0);
        graph.connect(FLOW, A, B, 0.1, 0.0).unwrap();
        graph.connect(FLOW, A, B, 0.9, 0.0).unwrap();
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.connection_rate(FLOW), Some(0.9));
    }

    proptest! {
        /// Without sources, total water is invariant under stepping no
        /// matter the topology, rates or minimums.
        #[test]
        fn prop_conservation_without_sources(
            levels in proptest::collection::vec(0.0f32..50.0, 2..6),
            edges in proptest::collection::vec((0usize..6, 0usize..6, 0.01f32..5.0, 0.0f32..2.0), 1..8),
            steps in 1usize..30,
        ) {
            let mut graph = ReservoirGraph::new();
            for (i, level) in levels.iter().enumerate() {
                graph.add_level(ReservoirId(i as u32), *level).unwrap();
            }
            let mut next_id = 0u32;
            for (a, b, rate, minimum) in edges {
                let a = a % levels.len();
                let b = b % levels.len();
                if a == b {
                    continue;
                }
                let id = ConnectionId(next_id);
                next_id += 1;
                graph
                    .connect(id, ReservoirId(a as u32), ReservoirId(b as u32), rate, minimum)
                    .unwrap();
            }
            let before = graph.total_water();
            for _ in 0..steps {
                graph.step(0.02);
            }
            let after = graph.total_water();
            prop_assert!((before - after).abs() < 1e-3 * before.max(1.0));
        }

        /// Two connected reservoirs approach each other monotonically.
        #[test]
        fn prop_equalization_monotone(
            a in 0.0f32..20.0,
            b in 0.0f32..20.0,
            rate in 0.01f32..100.0,
        ) {
            let mut graph = ReservoirGraph::new();
            graph.add_level(A, a).unwrap();
            graph.add_level(B, b).unwrap();
            graph.connect(FLOW, A, B, rate, 0.0).unwrap();
            let mut gap = (a - b).abs();
            for _ in 0..40 {
                graph.step(0.1);
                let new_gap = (graph.level(A).unwrap() - graph.level(B).unwrap()).abs();
                prop_assert!(new_gap <= gap + 1e-5);
                gap = new_gap;
            }
        }
    }
}
