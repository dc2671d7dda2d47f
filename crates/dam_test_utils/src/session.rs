//! Session survival analysis for headless simulation.
//!
//! Tools for running many unattended sessions to answer balance
//! questions: how long does an untended dam hold, how fast does the sea
//! climb, how much does a repairing player extend survival.

use dam_core::dam::DamId;
use dam_core::world::{World, TICK_DT};

/// Result of one simulated session.
#[derive(Debug, Clone)]
pub struct SessionResult {
    /// Ticks the session ran before loss or cutoff.
    pub ticks: u64,
    /// Whether the shoreline drowned before the cutoff.
    pub lost: bool,
    /// Final level of the dam's reservoir; the classic score.
    pub final_sea_level: f32,
    /// Final level of the shoreline behind the dam.
    pub final_shoreline_level: f32,
    /// Leaks still open in the dam when the session ended.
    pub leaks_remaining: usize,
}

/// Statistics over a set of sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total sessions run.
    pub total_sessions: u32,
    /// Sessions that ended with a drowned shoreline.
    pub losses: u32,
    /// Average ticks survived.
    pub avg_ticks: f64,
    /// Average final sea level.
    pub avg_sea_level: f64,
}

impl SessionStats {
    /// Summarize a batch of session results.
    #[must_use]
    pub fn from_results(results: &[SessionResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }
        let total = results.len() as f64;
        Self {
            total_sessions: results.len() as u32,
            losses: results.iter().filter(|r| r.lost).count() as u32,
            avg_ticks: results.iter().map(|r| r.ticks as f64).sum::<f64>() / total,
            avg_sea_level: results
                .iter()
                .map(|r| f64::from(r.final_sea_level))
                .sum::<f64>()
                / total,
        }
    }

    /// Fraction of sessions lost.
    #[must_use]
    pub fn loss_rate(&self) -> f64 {
        if self.total_sessions == 0 {
            return 0.0;
        }
        f64::from(self.losses) / f64::from(self.total_sessions)
    }
}

/// Step a world at the fixed tick rate until the shoreline drowns or the
/// tick cutoff is reached.
///
/// `repair` is invoked between ticks and may mutate the world the way a
/// player would; pass a no-op for untended sessions.
pub fn run_session<F>(
    world: &mut World,
    dam: DamId,
    max_ticks: u64,
    loss_threshold: f32,
    mut repair: F,
) -> SessionResult
where
    F: FnMut(&mut World, DamId),
{
    let mut ticks = 0;
    while ticks < max_ticks && !world.is_lost(loss_threshold) {
        repair(world, dam);
        world.step(TICK_DT).expect("world step");
        ticks += 1;
    }

    let sea = world.dam(dam).map(dam_core::dam::Dam::level);
    SessionResult {
        ticks,
        lost: world.is_lost(loss_threshold),
        final_sea_level: sea
            .and_then(|id| world.graph().level(id))
            .unwrap_or(0.0),
        final_shoreline_level: world
            .graph()
            .level(World::SHORELINE)
            .unwrap_or(0.0),
        leaks_remaining: world.dam(dam).map_or(0, |d| d.leaks().len()),
    }
}
