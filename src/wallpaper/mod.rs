//! The desktop wallpaper as an effect source.

mod cache;
mod compose;
mod platform;
mod sampler;

pub use cache::WallpaperCache;
pub use compose::{compose, fallback_background};
pub use platform::{
    aspect_style_from_gnome, aspect_style_from_windows, system_platform, AspectStyle,
    ChangeCallback, StaticWallpaper, WallpaperPlatform,
};
#[cfg(target_os = "linux")]
pub use platform::GnomeWallpaper;
#[cfg(windows)]
pub use platform::WindowsWallpaper;
pub use sampler::{DesktopWallpaperSampler, WallpaperPaintNode};
