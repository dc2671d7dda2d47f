//! Cosmetic flow-emitter contract.
//!
//! A [`VisualFlow`] carries everything a particle system needs to draw
//! water spilling through a breach or over a crest: whether it is running,
//! an intensity budget derived from the flow rate, which side of the dam
//! the water falls on, and the heights it falls from and into. The core
//! only maintains this state; it never draws anything.

use serde::{Deserialize, Serialize};

/// Which side of the dam the water spills toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpillDirection {
    /// Toward the shoreline (the lower-x end of the dam).
    TowardStart,
    /// Toward the held-back water (the higher-x end of the dam).
    TowardEnd,
}

/// State of one cosmetic water flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualFlow {
    /// Droplet budget for the emitter; zero means not running.
    amount: u32,
    /// Level of the pool the falling water vanishes into.
    disappear_height: f32,
    /// Horizontal span of the owning dam or leak.
    start_x: f32,
    /// Horizontal span of the owning dam or leak.
    end_x: f32,
    /// Height the water falls from.
    spill_height: f32,
    /// Side the water falls on.
    direction: SpillDirection,
}

impl VisualFlow {
    /// Droplets emitted per unit of flow rate.
    const DROPLETS_PER_RATE: f32 = 200.0;

    /// Create a stopped flow for a span and spill height.
    #[must_use]
    pub fn new(start_x: f32, end_x: f32, spill_height: f32) -> Self {
        Self {
            amount: 0,
            disappear_height: 0.0,
            start_x,
            end_x,
            spill_height,
            direction: SpillDirection::TowardStart,
        }
    }

    /// Drive the emitter from the current flow rate and the two adjacent
    /// water levels. Water falls toward whichever side is lower.
    pub fn update_flow(&mut self, rate: f32, level: f32, prev_level: f32) {
        self.amount = (rate * Self::DROPLETS_PER_RATE) as u32;
        if prev_level > level {
            self.disappear_height = level;
            self.direction = SpillDirection::TowardEnd;
        } else {
            self.disappear_height = prev_level;
            self.direction = SpillDirection::TowardStart;
        }
    }

    /// Stop the emitter.
    pub fn cut_flow(&mut self) {
        self.amount = 0;
    }

    /// Raise the spill crest (a dam was built up).
    pub(crate) fn set_spill_height(&mut self, height: f32) {
        self.spill_height = height;
    }

    /// Whether the emitter should be running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.amount > 0
    }

    /// Droplet budget; the host picks a cosmetic intensity tier from this.
    #[must_use]
    pub const fn intensity(&self) -> u32 {
        self.amount
    }

    /// X coordinate the water is emitted from.
    #[must_use]
    pub fn emit_x(&self) -> f32 {
        match self.direction {
            SpillDirection::TowardStart => self.start_x,
            SpillDirection::TowardEnd => self.end_x,
        }
    }

    /// Height the water falls from.
    #[must_use]
    pub const fn spill_height(&self) -> f32 {
        self.spill_height
    }

    /// Level of the pool the water vanishes into.
    #[must_use]
    pub const fn disappear_height(&self) -> f32 {
        self.disappear_height
    }

    /// Side the water falls on.
    #[must_use]
    pub const fn direction(&self) -> SpillDirection {
        self.direction
    }
}
