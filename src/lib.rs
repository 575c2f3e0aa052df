//! Compositing effects for scene-graph GUI toolkits: separable Gaussian blur, blend
//! modes and the acrylic material, plus a desktop wallpaper source to put under them.
//!
//! Effects never draw. Each one generates GLSL, compiles it through a shared
//! [`ShaderBaker`] and describes its passes as a [`graph::RenderGraph`] the host executes.

pub use wgpu;

pub mod acrylic;
pub mod blend;
mod blur;
mod cache;
mod color;
mod config;
mod context;
mod error;
pub mod geometry;
pub mod gpu;
pub mod graph;
mod id;
mod notify;
mod platform;
mod proxy;
pub mod sampling;
pub mod shader;
pub mod uniforms;
mod util;
pub mod wallpaper;

pub use acrylic::{AcrylicMaterialEffect, AcrylicProperty, Theme, ThemeService};
pub use blend::{BlendEffect, BlendMode, BlendProperty, EffectInput};
pub use blur::{BlurParameters, BlurProperty, GaussianBlurEffect};
pub use cache::DEFAULT_SHADER_CACHE_CAPACITY;
pub use color::{Color, Hsv};
pub use config::{AcrylicConfig, EffectsConfig};
pub use context::EffectContext;
pub use error::{CompileError, ConfigError, WallpaperError};
pub use id::{CaptureId, ItemId, NodeId, ShaderHandle};
pub use proxy::{
    FillMode, Interpolation, ItemKind, LayerConfig, ProxyProperty, SourceItem, SourceOutput,
    SourceProxy,
};
pub use shader::{
    GraphicsApi, ShaderBaker, ShaderBuilder, ShaderCompiler, ShaderStage, ShaderTarget,
    ShadingLanguage, SharedShaderBaker,
};
pub use util::{fuzzy_compare, fuzzy_is_null};
pub use wallpaper::{DesktopWallpaperSampler, WallpaperCache};
