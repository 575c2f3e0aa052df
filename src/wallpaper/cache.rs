use super::compose::compose;
use super::platform::WallpaperPlatform;
use crate::error::WallpaperError;
use crate::util::lock_unpoisoned;
use image::RgbaImage;
use std::sync::{Arc, Mutex, OnceLock, Weak};

#[derive(Default)]
struct CacheState {
    image: Option<Arc<RgbaImage>>,
    desktop: (u32, u32),
    generation: u64,
    watching: bool,
}

/// The composed desktop image, shared by every wallpaper view of the process.
///
/// Generated once per desktop size and dropped when the platform reports a wallpaper
/// change. Change notifications may arrive on any thread.
#[derive(Default)]
pub struct WallpaperCache {
    state: Mutex<CacheState>,
}

static GLOBAL_WALLPAPER_CACHE: OnceLock<Arc<WallpaperCache>> = OnceLock::new();

impl WallpaperCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Arc<WallpaperCache> {
        GLOBAL_WALLPAPER_CACHE
            .get_or_init(|| Arc::new(WallpaperCache::new()))
            .clone()
    }

    /// Returns the cached image, composing it first if the cache is empty or was built
    /// for another desktop size.
    pub fn get_or_generate(
        &self,
        platform: &dyn WallpaperPlatform,
        desktop: (u32, u32),
    ) -> Arc<RgbaImage> {
        let mut state = lock_unpoisoned(&self.state);
        if state.desktop == desktop {
            if let Some(image) = &state.image {
                return Arc::clone(image);
            }
        }

        let wallpaper = match load_wallpaper(platform) {
            Ok(image) => Some(image),
            Err(WallpaperError::NotConfigured) => {
                tracing::debug!("no desktop wallpaper configured, using fallback background");
                None
            }
            Err(err) => {
                tracing::warn!("failed to load desktop wallpaper, using fallback background: {err}");
                None
            }
        };
        let image = Arc::new(compose(
            wallpaper.as_ref(),
            platform.aspect_style(),
            desktop,
            platform.centers_on_black(),
        ));
        tracing::debug!(
            "generated {}x{} desktop wallpaper cache",
            desktop.0,
            desktop.1
        );
        state.image = Some(Arc::clone(&image));
        state.desktop = desktop;
        state.generation += 1;
        image
    }

    /// Drops the cached image; the next [`WallpaperCache::get_or_generate`] recomposes it.
    pub fn invalidate(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.image = None;
        state.generation += 1;
    }

    /// Increases every time the cached image is replaced or dropped.
    pub fn generation(&self) -> u64 {
        lock_unpoisoned(&self.state).generation
    }

    pub fn is_populated(&self) -> bool {
        lock_unpoisoned(&self.state).image.is_some()
    }

    /// Subscribes to the platform's change notifications once per cache.
    pub fn watch(self: &Arc<Self>, platform: &dyn WallpaperPlatform) {
        {
            let mut state = lock_unpoisoned(&self.state);
            if state.watching {
                return;
            }
            state.watching = true;
        }
        let cache: Weak<WallpaperCache> = Arc::downgrade(self);
        let result = platform.subscribe_change_notification(Arc::new(move || {
            if let Some(cache) = cache.upgrade() {
                tracing::debug!("desktop wallpaper changed, invalidating cache");
                cache.invalidate();
            }
        }));
        if let Err(err) = result {
            tracing::warn!("failed to subscribe to wallpaper changes: {err}");
            lock_unpoisoned(&self.state).watching = false;
        }
    }
}

fn load_wallpaper(platform: &dyn WallpaperPlatform) -> Result<RgbaImage, WallpaperError> {
    let path = platform.wallpaper_path()?;
    let image = image::open(&path).map_err(|source| WallpaperError::Decode { path, source })?;
    Ok(image.to_rgba8())
}
