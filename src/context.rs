use crate::acrylic::ThemeService;
use crate::config::{AcrylicConfig, EffectsConfig};
use crate::shader::{ShaderBuilder, SharedShaderBaker};
use std::sync::Arc;

/// Services shared by every effect of a window: the shader baker and the theme service.
#[derive(Clone)]
pub struct EffectContext {
    shaders: ShaderBuilder,
    themes: Arc<ThemeService>,
    acrylic: AcrylicConfig,
}

impl EffectContext {
    pub fn new(baker: SharedShaderBaker, themes: Arc<ThemeService>) -> Self {
        Self {
            shaders: ShaderBuilder::new(baker),
            themes,
            acrylic: AcrylicConfig::default(),
        }
    }

    /// Uses the process-wide [`ThemeService::global`].
    pub fn with_global_themes(baker: SharedShaderBaker) -> Self {
        Self::new(baker, ThemeService::global())
    }

    pub fn with_config(mut self, config: &EffectsConfig) -> Self {
        self.acrylic = config.acrylic.clone();
        self
    }

    pub fn shaders(&self) -> &ShaderBuilder {
        &self.shaders
    }

    pub fn themes(&self) -> &Arc<ThemeService> {
        &self.themes
    }

    pub fn acrylic(&self) -> &AcrylicConfig {
        &self.acrylic
    }
}
