//! Error types for the dam simulation.

use thiserror::Error;

use crate::reservoir::{ConnectionId, ReservoirId};

/// Result type alias using [`DamError`].
pub type Result<T> = std::result::Result<T, DamError>;

/// Top-level error type for all simulation errors.
///
/// Everything here is a configuration or programming error surfaced at
/// setup time. Expected misses (probing for a leak that is not there,
/// querying material above a dam) return sentinels instead, never errors.
#[derive(Debug, Error)]
pub enum DamError {
    /// A reservoir or source was registered twice under the same id.
    #[error("duplicate reservoir id: {0:?}")]
    DuplicateReservoir(ReservoirId),

    /// A connection endpoint names a reservoir that was never registered.
    #[error("unknown reservoir id: {0:?}")]
    UnknownReservoir(ReservoirId),

    /// A connection was disconnected without existing.
    ///
    /// Callers are expected to check `have_connection` first; hitting this
    /// indicates a topology bug, not a transient condition.
    #[error("unknown connection id: {0:?}")]
    UnknownConnection(ConnectionId),

    /// A connection would corrupt conservation (flow into a source, or a
    /// reservoir connected to itself).
    #[error("invalid flow: {0}")]
    InvalidFlow(String),

    /// Invalid simulation state (bad dam geometry, serialization failure).
    #[error("invalid state: {0}")]
    InvalidState(String),
}
