//! Acrylic theme presets and the process-wide system theme service.

use crate::color::Color;
use crate::util::lock_unpoisoned;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Dark,
    #[default]
    Light,
    HighContrast,
    /// Follows the OS dark-mode preference.
    System,
}

/// Values a theme assigns to a material in one go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemePreset {
    pub tint_color: Color,
    pub tint_opacity: f64,
    pub luminosity_opacity: f64,
    pub fallback_color: Color,
}

impl Theme {
    /// The preset of a concrete theme. `System` has none; resolve it first.
    pub fn preset(self) -> Option<ThemePreset> {
        match self {
            Theme::Dark => Some(ThemePreset {
                tint_color: Color::rgb(0x2C, 0x2C, 0x2C),
                tint_opacity: 0.15,
                luminosity_opacity: 0.96,
                fallback_color: Color::rgb(0x2C, 0x2C, 0x2C),
            }),
            Theme::Light => Some(ThemePreset {
                tint_color: Color::rgb(0xFC, 0xFC, 0xFC),
                tint_opacity: 0.0,
                luminosity_opacity: 0.85,
                fallback_color: Color::rgb(0xF9, 0xF9, 0xF9),
            }),
            // Opaque and flat.
            Theme::HighContrast => Some(ThemePreset {
                tint_color: Color::BLACK,
                tint_opacity: 1.0,
                luminosity_opacity: 1.0,
                fallback_color: Color::BLACK,
            }),
            Theme::System => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appearance {
    Light,
    Dark,
}

/// Reports the OS light/dark preference.
pub trait AppearanceProvider: Send + Sync {
    fn appearance(&self) -> Appearance;
}

/// An appearance set by the application, e.g. from its own settings or in tests.
#[derive(Debug, Default)]
pub struct FixedAppearance {
    dark: AtomicBool,
}

impl FixedAppearance {
    pub fn new(appearance: Appearance) -> Self {
        Self {
            dark: AtomicBool::new(appearance == Appearance::Dark),
        }
    }

    pub fn set(&self, appearance: Appearance) {
        self.dark
            .store(appearance == Appearance::Dark, Ordering::Relaxed);
    }
}

impl AppearanceProvider for FixedAppearance {
    fn appearance(&self) -> Appearance {
        if self.dark.load(Ordering::Relaxed) {
            Appearance::Dark
        } else {
            Appearance::Light
        }
    }
}

impl<T: AppearanceProvider> AppearanceProvider for Arc<T> {
    fn appearance(&self) -> Appearance {
        (**self).appearance()
    }
}

/// Queries the desktop settings on every call. Falls back to light when the setting
/// can't be read.
#[derive(Debug, Default)]
pub struct SystemAppearance;

impl AppearanceProvider for SystemAppearance {
    #[cfg(windows)]
    fn appearance(&self) -> Appearance {
        const PERSONALIZE: &str = r"Software\Microsoft\Windows\CurrentVersion\Themes\Personalize";
        match crate::platform::registry::read_dword(PERSONALIZE, "AppsUseLightTheme") {
            Some(0) => Appearance::Dark,
            Some(_) => Appearance::Light,
            None => {
                tracing::warn!("failed to read AppsUseLightTheme, assuming light theme");
                Appearance::Light
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn appearance(&self) -> Appearance {
        match crate::platform::gsettings::get("org.gnome.desktop.interface", "color-scheme") {
            Ok(scheme) if scheme == "prefer-dark" => Appearance::Dark,
            Ok(_) => Appearance::Light,
            Err(err) => {
                tracing::warn!("failed to query color scheme, assuming light theme: {err}");
                Appearance::Light
            }
        }
    }

    #[cfg(not(any(windows, target_os = "linux")))]
    fn appearance(&self) -> Appearance {
        Appearance::Light
    }
}

/// A material's registration with a [`ThemeService`]. Dropping it unregisters.
#[derive(Debug)]
pub struct ThemeSubscription {
    pending: Arc<AtomicBool>,
}

impl ThemeSubscription {
    /// Returns whether the system theme changed since the last call.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

/// Tracks live materials and tells them when the OS theme changes.
///
/// Notifications may come from any thread; materials pick them up on their next sync.
pub struct ThemeService {
    provider: Box<dyn AppearanceProvider>,
    subscribers: Mutex<Vec<Weak<AtomicBool>>>,
}

static GLOBAL_THEME_SERVICE: OnceLock<Arc<ThemeService>> = OnceLock::new();

impl ThemeService {
    pub fn new(provider: impl AppearanceProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide service, backed by [`SystemAppearance`].
    pub fn global() -> Arc<ThemeService> {
        GLOBAL_THEME_SERVICE
            .get_or_init(|| Arc::new(ThemeService::new(SystemAppearance)))
            .clone()
    }

    pub fn appearance(&self) -> Appearance {
        self.provider.appearance()
    }

    /// Resolves `System` to the concrete theme the OS currently asks for.
    pub fn resolve(&self, theme: Theme) -> Theme {
        match theme {
            Theme::System => match self.appearance() {
                Appearance::Dark => Theme::Dark,
                Appearance::Light => Theme::Light,
            },
            theme => theme,
        }
    }

    pub fn subscribe(&self) -> ThemeSubscription {
        let pending = Arc::new(AtomicBool::new(false));
        lock_unpoisoned(&self.subscribers).push(Arc::downgrade(&pending));
        ThemeSubscription { pending }
    }

    /// Marks every live subscriber for re-resolution of its system theme.
    pub fn notify_system_theme_changed(&self) {
        let mut subscribers = lock_unpoisoned(&self.subscribers);
        subscribers.retain(|subscriber| match subscriber.upgrade() {
            Some(pending) => {
                pending.store(true, Ordering::Release);
                true
            }
            None => false,
        });
        tracing::debug!(
            "system theme changed, notified {} materials",
            subscribers.len()
        );
    }

    /// Number of registered materials still alive.
    pub fn live_subscribers(&self) -> usize {
        lock_unpoisoned(&self.subscribers)
            .iter()
            .filter(|subscriber| subscriber.strong_count() > 0)
            .count()
    }
}
