//! Where the desktop wallpaper lives and how the desktop lays it out.

use crate::error::WallpaperError;
use crate::util::lock_unpoisoned;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// How the desktop lays the wallpaper image out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectStyle {
    /// Keep the aspect ratio and cover the desktop, cropping the overflow.
    #[default]
    Fill,
    /// Keep the aspect ratio and fit inside the desktop.
    Fit,
    /// Ignore the aspect ratio.
    Stretch,
    /// Repeat the unscaled image from the top-left corner.
    Tile,
    /// Draw the unscaled image centered.
    Center,
    /// One image across every monitor.
    Span,
}

/// Callback invoked when the wallpaper changes. May run on any thread.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// OS access to the wallpaper settings.
pub trait WallpaperPlatform: Send + Sync {
    fn wallpaper_path(&self) -> Result<PathBuf, WallpaperError>;

    /// Failures fall back to [`AspectStyle::Fill`].
    fn aspect_style(&self) -> AspectStyle;

    /// Registers `on_change` to run whenever the wallpaper or its layout changes.
    fn subscribe_change_notification(&self, on_change: ChangeCallback)
        -> Result<(), WallpaperError>;

    /// Whether centered wallpapers are drawn on black instead of transparency.
    fn centers_on_black(&self) -> bool {
        false
    }
}

/// Maps the `WallpaperStyle` and `TileWallpaper` values of `HKCU\Control Panel\Desktop`.
pub fn aspect_style_from_windows(wallpaper_style: Option<u32>, tile: Option<u32>) -> AspectStyle {
    match wallpaper_style {
        Some(0) if tile.is_some_and(|tile| tile != 0) => AspectStyle::Tile,
        Some(0) => AspectStyle::Center,
        Some(2) => AspectStyle::Stretch,
        Some(6) => AspectStyle::Fit,
        Some(10) => AspectStyle::Fill,
        Some(22) => AspectStyle::Span,
        _ => AspectStyle::Fill,
    }
}

/// Maps the GNOME `picture-options` setting.
pub fn aspect_style_from_gnome(options: &str) -> AspectStyle {
    match options {
        "wallpaper" | "tiled" => AspectStyle::Tile,
        "centered" => AspectStyle::Center,
        "stretched" => AspectStyle::Stretch,
        "scaled" => AspectStyle::Fit,
        "spanned" => AspectStyle::Span,
        _ => AspectStyle::Fill,
    }
}

/// A wallpaper set by the application, from configuration or in tests.
#[derive(Default)]
pub struct StaticWallpaper {
    path: Mutex<Option<PathBuf>>,
    style: Mutex<AspectStyle>,
    subscribers: Mutex<Vec<ChangeCallback>>,
}

impl StaticWallpaper {
    pub fn new(path: impl Into<PathBuf>, style: AspectStyle) -> Self {
        Self {
            path: Mutex::new(Some(path.into())),
            style: Mutex::new(style),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// A desktop without a wallpaper image.
    pub fn none() -> Self {
        Self::default()
    }

    /// Replaces the wallpaper and notifies subscribers.
    pub fn set(&self, path: Option<PathBuf>, style: AspectStyle) {
        *lock_unpoisoned(&self.path) = path;
        *lock_unpoisoned(&self.style) = style;
        self.notify_changed();
    }

    pub fn notify_changed(&self) {
        let subscribers = lock_unpoisoned(&self.subscribers).clone();
        for on_change in subscribers {
            on_change();
        }
    }
}

impl WallpaperPlatform for StaticWallpaper {
    fn wallpaper_path(&self) -> Result<PathBuf, WallpaperError> {
        lock_unpoisoned(&self.path)
            .clone()
            .ok_or(WallpaperError::NotConfigured)
    }

    fn aspect_style(&self) -> AspectStyle {
        *lock_unpoisoned(&self.style)
    }

    fn subscribe_change_notification(
        &self,
        on_change: ChangeCallback,
    ) -> Result<(), WallpaperError> {
        lock_unpoisoned(&self.subscribers).push(on_change);
        Ok(())
    }
}

/// Turns a `file://` URI from the desktop settings into a path.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn path_from_uri(uri: &str) -> Option<PathBuf> {
    let uri = uri.trim();
    if uri.is_empty() {
        return None;
    }
    let Some(encoded) = uri.strip_prefix("file://") else {
        return Some(PathBuf::from(uri));
    };
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    Some(PathBuf::from(String::from_utf8_lossy(&decoded).into_owned()))
}

#[cfg(target_os = "linux")]
pub use gnome::GnomeWallpaper;

#[cfg(target_os = "linux")]
mod gnome {
    use super::*;
    use crate::platform::gsettings;
    use std::io::{BufRead, BufReader};
    use std::process::{Child, ChildStdout, Command, Stdio};

    const BACKGROUND_SCHEMA: &str = "org.gnome.desktop.background";

    /// Reads the GNOME background settings through `gsettings`.
    #[derive(Debug, Default)]
    pub struct GnomeWallpaper;

    impl WallpaperPlatform for GnomeWallpaper {
        fn wallpaper_path(&self) -> Result<PathBuf, WallpaperError> {
            let uri = gsettings::get(BACKGROUND_SCHEMA, "picture-uri")
                .map_err(|err| WallpaperError::Platform(err.to_string()))?;
            path_from_uri(&uri).ok_or(WallpaperError::NotConfigured)
        }

        fn aspect_style(&self) -> AspectStyle {
            match gsettings::get(BACKGROUND_SCHEMA, "picture-options") {
                Ok(options) => aspect_style_from_gnome(&options),
                Err(err) => {
                    tracing::warn!("failed to query wallpaper options, assuming fill: {err}");
                    AspectStyle::Fill
                }
            }
        }

        /// Spawns `gsettings monitor` on a background thread for the lifetime of the
        /// process.
        fn subscribe_change_notification(
            &self,
            on_change: ChangeCallback,
        ) -> Result<(), WallpaperError> {
            let mut child = Command::new("gsettings")
                .args(["monitor", BACKGROUND_SCHEMA])
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()?;
            let Some(stdout) = child.stdout.take() else {
                let _ = child.kill();
                let _ = child.wait();
                return Err(WallpaperError::Platform("gsettings monitor has no stdout".into()));
            };
            let thread = std::thread::Builder::new().name("acrylic-fx-wallpaper-monitor".into());
            forward_changes(child, stdout, thread, on_change)
        }
    }

    /// Reads `monitor` output on a thread built from `thread`, reaping `monitor` when
    /// its output ends. If the thread cannot start, `monitor` is killed right away.
    fn forward_changes(
        monitor: Child,
        stdout: ChildStdout,
        thread: std::thread::Builder,
        on_change: ChangeCallback,
    ) -> Result<(), WallpaperError> {
        let monitor = Arc::new(Mutex::new(monitor));
        let watched = Arc::clone(&monitor);
        let spawned = thread.spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if line.starts_with("picture-uri") || line.starts_with("picture-options") {
                    tracing::debug!("wallpaper setting changed: {line}");
                    on_change();
                }
            }
            let _ = lock_unpoisoned(&watched).wait();
        });
        if let Err(err) = spawned {
            let mut monitor = lock_unpoisoned(&monitor);
            let _ = monitor.kill();
            let _ = monitor.wait();
            return Err(err.into());
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn sleeper() -> (Child, ChildStdout) {
            let mut child = Command::new("sleep")
                .arg("30")
                .stdout(Stdio::piped())
                .spawn()
                .unwrap();
            let stdout = child.stdout.take().unwrap();
            (child, stdout)
        }

        fn is_running(pid: u32) -> bool {
            Command::new("kill")
                .args(["-0", &pid.to_string()])
                .stderr(Stdio::null())
                .status()
                .is_ok_and(|status| status.success())
        }

        #[test]
        fn monitor_is_reaped_when_the_thread_cannot_start() {
            let (child, stdout) = sleeper();
            let pid = child.id();
            assert!(is_running(pid));
            let unstartable = std::thread::Builder::new().stack_size(1 << 60);
            let result = forward_changes(child, stdout, unstartable, Arc::new(|| {}));
            assert!(result.is_err());
            assert!(!is_running(pid));
        }
    }
}

#[cfg(windows)]
pub use windows_impl::WindowsWallpaper;

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use crate::platform::registry;
    use windows::Win32::UI::WindowsAndMessaging::{
        SystemParametersInfoW, SPI_GETDESKWALLPAPER, SPI_SETDESKWALLPAPER,
        SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS,
    };

    const DESKTOP_KEY: &str = r"Control Panel\Desktop";
    const MAX_PATH: usize = 260;

    /// Reads the wallpaper through `SystemParametersInfoW` and the desktop registry key.
    ///
    /// Windows reports wallpaper changes as `WM_SETTINGCHANGE` to top-level windows, so
    /// the host forwards them through [`WindowsWallpaper::handle_setting_change`].
    #[derive(Default)]
    pub struct WindowsWallpaper {
        subscribers: Mutex<Vec<ChangeCallback>>,
    }

    impl WindowsWallpaper {
        pub fn new() -> Self {
            Self::default()
        }

        /// Call with the `wParam` of every `WM_SETTINGCHANGE` message.
        pub fn handle_setting_change(&self, wparam: usize) {
            if wparam != SPI_SETDESKWALLPAPER.0 as usize {
                return;
            }
            tracing::debug!("desktop wallpaper changed");
            let subscribers = lock_unpoisoned(&self.subscribers).clone();
            for on_change in subscribers {
                on_change();
            }
        }
    }

    impl WallpaperPlatform for WindowsWallpaper {
        fn wallpaper_path(&self) -> Result<PathBuf, WallpaperError> {
            let mut buffer = [0u16; MAX_PATH];
            // SAFETY: the buffer holds MAX_PATH wide characters, as announced to the call.
            unsafe {
                SystemParametersInfoW(
                    SPI_GETDESKWALLPAPER,
                    MAX_PATH as u32,
                    Some(buffer.as_mut_ptr().cast()),
                    SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
                )
            }
            .map_err(|err| WallpaperError::Platform(err.to_string()))?;
            let len = buffer.iter().position(|c| *c == 0).unwrap_or(buffer.len());
            if len == 0 {
                return Err(WallpaperError::NotConfigured);
            }
            Ok(PathBuf::from(String::from_utf16_lossy(&buffer[..len])))
        }

        fn aspect_style(&self) -> AspectStyle {
            let read = |value| {
                registry::read_string(DESKTOP_KEY, value)
                    .and_then(|text| text.trim().parse::<u32>().ok())
                    .or_else(|| registry::read_dword(DESKTOP_KEY, value))
            };
            let style = read("WallpaperStyle");
            if style.is_none() {
                tracing::warn!("failed to read WallpaperStyle, assuming fill");
            }
            aspect_style_from_windows(style, read("TileWallpaper"))
        }

        fn subscribe_change_notification(
            &self,
            on_change: ChangeCallback,
        ) -> Result<(), WallpaperError> {
            lock_unpoisoned(&self.subscribers).push(on_change);
            Ok(())
        }

        fn centers_on_black(&self) -> bool {
            true
        }
    }
}

/// The wallpaper backend of the running desktop.
pub fn system_platform() -> Arc<dyn WallpaperPlatform> {
    #[cfg(windows)]
    {
        Arc::new(WindowsWallpaper::new())
    }
    #[cfg(target_os = "linux")]
    {
        Arc::new(GnomeWallpaper)
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    {
        Arc::new(StaticWallpaper::none())
    }
}
