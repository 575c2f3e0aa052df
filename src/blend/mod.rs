//! Blend-mode shader generation, its CPU reference, and the [`BlendEffect`] built on it.

mod effect;
mod mode;
pub mod reference;

pub use effect::{BlendEffect, BlendProperty, EffectInput};
pub use mode::{generate, generate_for_index, BlendMode, UnknownBlendMode};
