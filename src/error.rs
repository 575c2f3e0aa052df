//! Error types for the fallible parts of the crate.
//!
//! Effect property setters never fail: invalid input is ignored and the previous state is
//! kept. Only the collaborators that talk to the outside world (shader compilation,
//! configuration files, wallpaper loading) report errors.

use std::path::PathBuf;

// ── Shader compilation ───────────────────────────────────────────────────────

/// Errors reported by a [`crate::ShaderCompiler`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    /// The source failed to compile for at least one target. Contains the compiler log.
    #[error("{stage} shader compilation failed: {message}")]
    Failed {
        stage: crate::ShaderStage,
        message: String,
    },
    /// The active graphics API has no shading-language target to compile for.
    #[error("no shader targets available for {0}")]
    NoTargets(crate::GraphicsApi),
}

// ── Configuration ────────────────────────────────────────────────────────────

/// Errors that can occur while loading an [`crate::EffectsConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

// ── Wallpaper ────────────────────────────────────────────────────────────────

/// Errors from wallpaper discovery and decoding.
#[derive(Debug, thiserror::Error)]
pub enum WallpaperError {
    /// The platform reported no wallpaper (solid color desktop, unsupported session).
    #[error("no desktop wallpaper is configured")]
    NotConfigured,
    #[error("failed to decode wallpaper {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// A platform API or helper command failed.
    #[error("wallpaper platform query failed: {0}")]
    Platform(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
