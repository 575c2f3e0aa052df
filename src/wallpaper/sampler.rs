use super::cache::WallpaperCache;
use super::platform::{system_platform, WallpaperPlatform};
use crate::geometry::{Rect, Size};
use crate::util::fuzzy_eq;
use image::RgbaImage;
use std::sync::Arc;

/// What a wallpaper view draws: the slice of the desktop image behind the item.
#[derive(Debug, Clone)]
pub struct WallpaperPaintNode {
    /// Target rectangle in item coordinates.
    pub rect: Rect,
    /// Rectangle of `image` to sample, in desktop pixels.
    pub source_rect: Rect,
    pub image: Arc<RgbaImage>,
}

/// Shows the part of the desktop wallpaper that sits behind an item, so translucent
/// windows can blur what the desktop shows.
///
/// Every view shares one [`WallpaperCache`]; the platform only reports where the image
/// is and how it is laid out.
pub struct DesktopWallpaperSampler {
    platform: Arc<dyn WallpaperPlatform>,
    cache: Arc<WallpaperCache>,
    desktop_size: (u32, u32),
    global_position: (f64, f64),
    size: Size,
    painted_generation: Option<u64>,
    geometry_changed: bool,
}

impl DesktopWallpaperSampler {
    pub fn new(platform: Arc<dyn WallpaperPlatform>, cache: Arc<WallpaperCache>) -> Self {
        cache.watch(platform.as_ref());
        Self {
            platform,
            cache,
            desktop_size: (0, 0),
            global_position: (0.0, 0.0),
            size: Size::default(),
            painted_generation: None,
            geometry_changed: true,
        }
    }

    /// Uses the running desktop's wallpaper and the process-wide cache.
    pub fn for_system() -> Self {
        Self::new(system_platform(), WallpaperCache::global())
    }

    pub fn desktop_size(&self) -> (u32, u32) {
        self.desktop_size
    }

    /// Size of the virtual desktop (all screens) in pixels.
    pub fn set_desktop_size(&mut self, width: u32, height: u32) {
        if self.desktop_size != (width, height) {
            self.desktop_size = (width, height);
            self.geometry_changed = true;
        }
    }

    pub fn global_position(&self) -> (f64, f64) {
        self.global_position
    }

    /// Position of the item's top-left corner on the desktop. Follows window moves.
    pub fn set_global_position(&mut self, x: f64, y: f64) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        if !fuzzy_eq(self.global_position.0, x) || !fuzzy_eq(self.global_position.1, y) {
            self.global_position = (x, y);
            self.geometry_changed = true;
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn set_size(&mut self, size: Size) {
        if !size.width.is_finite() || !size.height.is_finite() {
            return;
        }
        if !fuzzy_eq(self.size.width, size.width) || !fuzzy_eq(self.size.height, size.height) {
            self.size = size;
            self.geometry_changed = true;
        }
    }

    /// Whether [`DesktopWallpaperSampler::paint_node`] would return something new.
    pub fn needs_repaint(&self) -> bool {
        self.geometry_changed || self.painted_generation != Some(self.cache.generation())
    }

    /// Builds the paint node, composing the shared cache if it is empty.
    pub fn paint_node(&mut self) -> WallpaperPaintNode {
        let image = self
            .cache
            .get_or_generate(self.platform.as_ref(), self.desktop_size);
        self.painted_generation = Some(self.cache.generation());
        self.geometry_changed = false;
        let (x, y) = self.global_position;
        WallpaperPaintNode {
            rect: Rect::from_size(self.size),
            source_rect: Rect::new(x, y, self.size.width, self.size.height),
            image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallpaper::{AspectStyle, StaticWallpaper};
    use image::Rgba;

    fn sampler(platform: Arc<StaticWallpaper>) -> DesktopWallpaperSampler {
        let mut sampler = DesktopWallpaperSampler::new(platform, Arc::new(WallpaperCache::new()));
        sampler.set_desktop_size(64, 32);
        sampler
    }

    #[test]
    fn paint_node_maps_the_item_onto_the_desktop() {
        let mut view = sampler(Arc::new(StaticWallpaper::none()));
        view.set_global_position(10.0, 4.0);
        view.set_size(Size::new(20.0, 8.0));
        assert!(view.needs_repaint());

        let node = view.paint_node();
        assert_eq!(node.rect, Rect::new(0.0, 0.0, 20.0, 8.0));
        assert_eq!(node.source_rect, Rect::new(10.0, 4.0, 20.0, 8.0));
        assert_eq!(node.image.dimensions(), (64, 32));
        assert!(!view.needs_repaint());

        view.set_global_position(12.0, 4.0);
        assert!(view.needs_repaint());
    }

    #[test]
    fn wallpaper_change_triggers_a_repaint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wall.png");
        RgbaImage::from_pixel(8, 4, Rgba([200, 10, 10, 0xff]))
            .save(&path)
            .unwrap();

        let platform = Arc::new(StaticWallpaper::none());
        let mut view = sampler(Arc::clone(&platform));
        let before = view.paint_node();
        assert_eq!(before.image.get_pixel(0, 0), &Rgba([0x3a, 0x5a, 0x86, 0xff]));

        platform.set(Some(path), AspectStyle::Stretch);
        assert!(view.needs_repaint());
        let after = view.paint_node();
        assert_eq!(after.image.get_pixel(32, 16), &Rgba([200, 10, 10, 0xff]));
    }
}
