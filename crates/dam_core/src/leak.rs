//! A single breach point in a dam.
//!
//! A leak is a localized hole at a fixed height with a flow rate that only
//! ever grows (erosion, animal damage) until a repair drives it below zero
//! and destroys it. While the water reaches the leak's height the leak is
//! *active*: it holds a live connection in the reservoir graph. A leak
//! above the water line keeps its accumulated rate and waits.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::VisualFlow;
use crate::material::Material;
use crate::reservoir::{ConnectionId, ReservoirGraph, ReservoirId};

/// A breach in a dam at a given height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leak {
    start_x: f32,
    end_x: f32,
    height: f32,
    rate: f32,
    connection: ConnectionId,
    flow: VisualFlow,
}

impl Leak {
    /// Create a leak spanning the dam horizontally at the given height.
    #[must_use]
    pub fn new(
        start_x: f32,
        end_x: f32,
        height: f32,
        rate: f32,
        connection: ConnectionId,
    ) -> Self {
        Self {
            start_x,
            end_x,
            height,
            rate,
            connection,
            flow: VisualFlow::new(start_x, end_x, height),
        }
    }

    /// Height at which the leak penetrates the dam.
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }

    /// Current flow rate. Unbounded above; repair is the only floor.
    #[must_use]
    pub const fn rate(&self) -> f32 {
        self.rate
    }

    /// Connection id this leak owns in the reservoir graph.
    #[must_use]
    pub const fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Cosmetic emitter state for this leak.
    #[must_use]
    pub const fn flow(&self) -> &VisualFlow {
        &self.flow
    }

    /// Half-open containment test: `low <= height < high`.
    #[must_use]
    pub fn between(&self, low: f32, high: f32) -> bool {
        low <= self.height && self.height < high
    }

    pub(crate) fn add_rate(&mut self, delta: f32) {
        self.rate += delta;
    }

    /// Ensure the leak's connection exists with the current rate and drive
    /// the emitter. The minimum level is the leak's own height: the held
    /// water cannot drain below the hole it escapes through.
    ///
    /// Returns whether the connection was newly opened.
    pub(crate) fn activate(
        &mut self,
        graph: &mut ReservoirGraph,
        level: ReservoirId,
        prev_level: ReservoirId,
    ) -> Result<bool> {
        let own = graph.level(level).unwrap_or(0.0);
        let prev = graph.level(prev_level).unwrap_or(0.0);
        self.flow.update_flow(self.rate, own, prev);

        let newly_opened = !graph.have_connection(self.connection);
        // re-connecting an existing id refreshes the stored rate, so a leak
        // that eroded while active pushes its new rate into the graph
        graph.connect(self.connection, level, prev_level, self.rate, self.height)?;
        Ok(newly_opened)
    }

    /// Close the leak's connection if it is open and cut the emitter.
    /// The leak itself (and its accumulated rate) survives for later
    /// reactivation.
    ///
    /// Returns whether a connection was actually closed.
    pub(crate) fn deactivate(&mut self, graph: &mut ReservoirGraph) -> Result<bool> {
        if !graph.have_connection(self.connection) {
            return Ok(false);
        }
        graph.disconnect(self.connection)?;
        self.flow.cut_flow();
        Ok(true)
    }

    /// Erode this leak for `dt` seconds.
    ///
    /// A leak above the highest relevant water level erodes at the
    /// material's dry rate; a submerged one at the wet rate.
    pub(crate) fn step_erosion(&mut self, dt: f32, material: Material, water_height: f32) {
        if self.height > water_height {
            self.rate += material.dry_erosion_rate() * dt;
        } else {
            self.rate += material.wet_erosion_rate() * dt;
        }
    }
}
