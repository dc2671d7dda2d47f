//! # Dam Headless
//!
//! Headless runner for the dam simulation: no graphics, JSON on stdout.
//! Designed for CI verification, balance analysis and replay checks.
//!
//! A run loads a [`scenario::Scenario`] (RON file or the built-in
//! default), steps the world at the fixed tick rate, emits a JSON state
//! line per report interval, and finishes with a summary line carrying
//! the classic score: the final sea level.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod runner;
pub mod scenario;

pub use runner::{HeadlessRunner, RunSummary, RunnerError, StateReport};
pub use scenario::{Scenario, ScenarioError};
