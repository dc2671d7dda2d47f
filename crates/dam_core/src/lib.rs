//! # Dam Core
//!
//! Deterministic simulation core for the dam-building game.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO
//! - No system randomness (all randomness from a seeded RNG)
//!
//! This separation enables:
//! - Headless runs for CI and balance analysis
//! - Replay verification against state hashes
//! - Determinism testing with explicit seeds
//!
//! ## Crate Structure
//!
//! - [`reservoir`] - Water-transport graph: levels, sources, connections
//! - [`dam`] - Layered dams, leaks, floods, erosion scheduling
//! - [`leak`] - A single breach and its erosion behavior
//! - [`material`] - Material kinds and erosion tables
//! - [`flow`] - Cosmetic flow-emitter contract for the presentation layer
//! - [`world`] - Tick driver and host façade

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod dam;
pub mod error;
pub mod flow;
pub mod leak;
pub mod material;
pub mod reservoir;
pub mod rng;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::dam::{Dam, DamChain, DamId, FLOOD_RATE, INITIAL_LEAK_RATE};
    pub use crate::error::{DamError, Result};
    pub use crate::flow::{SpillDirection, VisualFlow};
    pub use crate::leak::Leak;
    pub use crate::material::{Material, SECTION_HEIGHT};
    pub use crate::reservoir::{Connection, ConnectionId, Reservoir, ReservoirGraph, ReservoirId};
    pub use crate::rng::SimRng;
    pub use crate::world::{FlowChange, FlowKind, TickEvents, World, TICK_DT, TICK_RATE};
}
