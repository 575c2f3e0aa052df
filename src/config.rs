//! TOML configuration for the shader pipeline and the acrylic material defaults.
//!
//! ```toml
//! graphics_api = "opengl"
//! max_blur_samples = 12
//! enforce_varying_budget = true
//! shader_cache_capacity = 128
//!
//! [acrylic]
//! blur_radius = 48.0
//! noise_opacity = 0.03
//! ```

use crate::error::ConfigError;
use crate::shader::GraphicsApi;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::Path;

const DEFAULT_ACRYLIC_BLUR_RADIUS: f64 = 60.0;
const DEFAULT_NOISE_OPACITY: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EffectsConfig {
    /// Overrides the graphics API reported by the host.
    pub graphics_api: Option<GraphicsApi>,
    /// Overrides the varying budget of the active API.
    pub max_blur_samples: Option<usize>,
    /// Switch blurs whose collapsed sample count exceeds the budget to the fallback path.
    pub enforce_varying_budget: bool,
    pub shader_cache_capacity: NonZeroUsize,
    pub acrylic: AcrylicConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcrylicConfig {
    /// Radius of the blur underneath the tint layers, in logical pixels.
    pub blur_radius: f64,
    pub noise_opacity: f64,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            graphics_api: None,
            max_blur_samples: None,
            enforce_varying_budget: false,
            shader_cache_capacity: NonZeroUsize::new(crate::cache::DEFAULT_SHADER_CACHE_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            acrylic: AcrylicConfig::default(),
        }
    }
}

impl Default for AcrylicConfig {
    fn default() -> Self {
        Self {
            blur_radius: DEFAULT_ACRYLIC_BLUR_RADIUS,
            noise_opacity: DEFAULT_NOISE_OPACITY,
        }
    }
}

impl EffectsConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("loaded effects config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_blur_samples == Some(0) {
            return Err(ConfigError::InvalidValue(
                "max_blur_samples must be at least 1".into(),
            ));
        }
        let acrylic = &self.acrylic;
        if !acrylic.blur_radius.is_finite() || acrylic.blur_radius < 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "acrylic.blur_radius must be a non-negative number, got {}",
                acrylic.blur_radius
            )));
        }
        if !(0.0..=1.0).contains(&acrylic.noise_opacity) {
            return Err(ConfigError::InvalidValue(format!(
                "acrylic.noise_opacity must be within [0, 1], got {}",
                acrylic.noise_opacity
            )));
        }
        Ok(())
    }
}
