//! Dam construction materials and their erosion tables.
//!
//! A material is purely a lookup key: per-material dry/wet erosion rates
//! and the animal damage multiplier. No per-material object state exists.

use serde::{Deserialize, Serialize};

/// Height of one material layer in world units.
///
/// Dams are always built in whole layers, so a dam's height is a multiple
/// of this constant.
pub const SECTION_HEIGHT: f32 = 0.3125;

/// A kind of dam-building material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    /// Cheap, erodes fastest.
    Wood,
    /// Solid against gnawing, middling against water.
    Stone,
    /// Best dry-erosion resistance short of metal.
    Brick,
    /// Never erodes while dry; rusts slowly under water.
    Metal,
}

impl Material {
    /// All materials, in purchase-menu order.
    pub const ALL: [Material; 4] = [
        Material::Wood,
        Material::Stone,
        Material::Brick,
        Material::Metal,
    ];

    /// Rate increase per second for a leak sitting above the water line.
    #[must_use]
    pub const fn dry_erosion_rate(self) -> f32 {
        match self {
            Material::Wood => 0.001,
            Material::Stone => 0.0005,
            Material::Brick => 0.0002,
            Material::Metal => 0.0,
        }
    }

    /// Rate increase per second for a submerged, flowing leak.
    #[must_use]
    pub const fn wet_erosion_rate(self) -> f32 {
        match self {
            Material::Wood => 0.004,
            Material::Stone => 0.002,
            Material::Brick => 0.001,
            // metal in water
            Material::Metal => 0.002,
        }
    }

    /// Multiplier applied to animal damage against this material.
    #[must_use]
    pub const fn animal_erosion_factor(self) -> f32 {
        match self {
            Material::Wood => 1.0,
            Material::Stone => 0.75,
            Material::Brick => 0.5,
            Material::Metal => 0.2,
        }
    }

    /// Cost in trash of one section of this material.
    #[must_use]
    pub const fn cost(self) -> u32 {
        match self {
            Material::Wood => 1,
            Material::Stone => 2,
            Material::Brick => 4,
            Material::Metal => 5,
        }
    }
}
