//! The acrylic material: blur, luminosity, tint and noise layered over a backdrop.

mod color_math;
mod material;
mod noise;
mod theme;

pub use color_math::{effective_luminosity_color, effective_tint_color, tint_opacity_modifier};
pub use material::{AcrylicMaterialEffect, AcrylicProperty};
pub use noise::{noise_texture, NOISE_TEXTURE_SIZE};
pub use theme::{
    Appearance, AppearanceProvider, FixedAppearance, SystemAppearance, Theme, ThemePreset,
    ThemeService, ThemeSubscription,
};
