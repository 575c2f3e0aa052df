use super::AspectStyle;
use image::{imageops, Rgba, RgbaImage};
use std::borrow::Cow;

const FALLBACK_TOP: [f64; 3] = [0x3a as f64, 0x5a as f64, 0x86 as f64];
const FALLBACK_BOTTOM: [f64; 3] = [0x12 as f64, 0x1a as f64, 0x2b as f64];

/// How an image is scaled into the desktop before it is centered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScaleMode {
    IgnoreAspect,
    KeepAspect,
    KeepAspectByExpanding,
}

/// Scales `(width, height)` into `(target_width, target_height)`, rounding down like
/// integer pixel math does.
fn scaled_size(size: (u32, u32), target: (u32, u32), mode: ScaleMode) -> (u32, u32) {
    let (width, height) = (u64::from(size.0), u64::from(size.1));
    let (target_width, target_height) = (u64::from(target.0), u64::from(target.1));
    if mode == ScaleMode::IgnoreAspect || width == 0 || height == 0 {
        return target;
    }
    let rescaled_width = target_height * width / height;
    let use_height = match mode {
        ScaleMode::KeepAspect => rescaled_width <= target_width,
        _ => rescaled_width >= target_width,
    };
    let (w, h) = if use_height {
        (rescaled_width, target_height)
    } else {
        (target_width, target_width * height / width)
    };
    (
        u32::try_from(w).unwrap_or(u32::MAX),
        u32::try_from(h).unwrap_or(u32::MAX),
    )
}

/// Top-left corner that centers `size` inside `target`. Negative when it overflows.
fn centered_origin(size: (u32, u32), target: (u32, u32)) -> (i64, i64) {
    (
        i64::from(target.0 / 2) - i64::from(size.0 / 2),
        i64::from(target.1 / 2) - i64::from(size.1 / 2),
    )
}

/// Lays `wallpaper` out over a desktop of `desktop` pixels.
///
/// Areas the image does not cover stay transparent, or black for centered images when
/// `centers_on_black` is set. Without an image the generated fallback background is
/// returned.
pub fn compose(
    wallpaper: Option<&RgbaImage>,
    style: AspectStyle,
    desktop: (u32, u32),
    centers_on_black: bool,
) -> RgbaImage {
    let Some(wallpaper) = wallpaper else {
        return fallback_background(desktop.0, desktop.1);
    };

    let mut buffer = if style == AspectStyle::Center && centers_on_black {
        RgbaImage::from_pixel(desktop.0, desktop.1, Rgba([0, 0, 0, 0xff]))
    } else {
        RgbaImage::new(desktop.0, desktop.1)
    };
    if desktop.0 == 0 || desktop.1 == 0 {
        return buffer;
    }

    let mode = match style {
        AspectStyle::Stretch => Some(ScaleMode::IgnoreAspect),
        AspectStyle::Fit => Some(ScaleMode::KeepAspect),
        // The desktop size already spans every monitor.
        AspectStyle::Fill | AspectStyle::Span => Some(ScaleMode::KeepAspectByExpanding),
        AspectStyle::Tile | AspectStyle::Center => None,
    };
    let image: Cow<'_, RgbaImage> = match mode {
        Some(mode) => {
            let (width, height) = scaled_size(wallpaper.dimensions(), desktop, mode);
            if (width, height) == wallpaper.dimensions() || width == 0 || height == 0 {
                Cow::Borrowed(wallpaper)
            } else {
                Cow::Owned(imageops::resize(
                    wallpaper,
                    width,
                    height,
                    imageops::FilterType::Triangle,
                ))
            }
        }
        None => Cow::Borrowed(wallpaper),
    };

    if style == AspectStyle::Tile {
        let (tile_width, tile_height) = image.dimensions();
        if tile_width == 0 || tile_height == 0 {
            return buffer;
        }
        for y in (0..desktop.1).step_by(tile_height as usize) {
            for x in (0..desktop.0).step_by(tile_width as usize) {
                imageops::replace(&mut buffer, image.as_ref(), i64::from(x), i64::from(y));
            }
        }
    } else {
        let (x, y) = centered_origin(image.dimensions(), desktop);
        imageops::overlay(&mut buffer, image.as_ref(), x, y);
    }
    buffer
}

/// The background shown when no wallpaper can be loaded: a vertical slate-blue gradient.
pub fn fallback_background(width: u32, height: u32) -> RgbaImage {
    let span = f64::from(height.saturating_sub(1).max(1));
    RgbaImage::from_fn(width, height, |_, y| {
        let t = f64::from(y) / span;
        let channel =
            |i: usize| (FALLBACK_TOP[i] + (FALLBACK_BOTTOM[i] - FALLBACK_TOP[i]) * t).round() as u8;
        Rgba([channel(0), channel(1), channel(2), 0xff])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 0xff]))
    }

    #[test]
    fn scaled_size_follows_the_aspect_mode() {
        assert_eq!(scaled_size((100, 50), (400, 400), ScaleMode::IgnoreAspect), (400, 400));
        assert_eq!(scaled_size((100, 50), (400, 400), ScaleMode::KeepAspect), (400, 200));
        assert_eq!(
            scaled_size((100, 50), (400, 400), ScaleMode::KeepAspectByExpanding),
            (800, 400)
        );
    }

    #[test]
    fn stretch_covers_the_desktop() {
        let out = compose(Some(&solid(3, 7, 200)), AspectStyle::Stretch, (20, 10), false);
        assert_eq!(out.dimensions(), (20, 10));
        assert!(out.pixels().all(|p| p[3] == 0xff));
    }

    #[test]
    fn fit_letterboxes_with_transparency() {
        let out = compose(Some(&solid(10, 10, 200)), AspectStyle::Fit, (40, 20), false);
        assert_eq!(out.get_pixel(0, 10)[3], 0);
        assert_eq!(out.get_pixel(39, 10)[3], 0);
        assert_eq!(out.get_pixel(20, 10), &Rgba([200, 200, 200, 0xff]));
    }

    #[test]
    fn fill_crops_instead_of_letterboxing() {
        let out = compose(Some(&solid(10, 10, 200)), AspectStyle::Fill, (40, 20), false);
        assert!(out.pixels().all(|p| p[3] == 0xff));
    }

    #[test]
    fn tile_repeats_from_the_origin() {
        let mut tile = solid(4, 4, 10);
        tile.put_pixel(0, 0, Rgba([250, 0, 0, 0xff]));
        let out = compose(Some(&tile), AspectStyle::Tile, (10, 6), false);
        assert_eq!(out.get_pixel(0, 0), &Rgba([250, 0, 0, 0xff]));
        assert_eq!(out.get_pixel(4, 4), &Rgba([250, 0, 0, 0xff]));
        assert_eq!(out.get_pixel(8, 0), &Rgba([250, 0, 0, 0xff]));
        assert_eq!(out.get_pixel(9, 5), &Rgba([10, 10, 10, 0xff]));
    }

    #[test]
    fn center_keeps_the_original_size() {
        let out = compose(Some(&solid(4, 2, 99)), AspectStyle::Center, (10, 10), true);
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 0, 0xff]));
        assert_eq!(out.get_pixel(3, 4), &Rgba([99, 99, 99, 0xff]));
        assert_eq!(out.get_pixel(6, 5), &Rgba([99, 99, 99, 0xff]));
        assert_eq!(out.get_pixel(7, 5), &Rgba([0, 0, 0, 0xff]));

        let transparent = compose(Some(&solid(4, 2, 99)), AspectStyle::Center, (10, 10), false);
        assert_eq!(transparent.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn missing_wallpaper_uses_the_fallback() {
        let out = compose(None, AspectStyle::Fill, (8, 16), false);
        assert_eq!(out, fallback_background(8, 16));
        assert_eq!(out.get_pixel(0, 0), &Rgba([0x3a, 0x5a, 0x86, 0xff]));
        assert_eq!(out.get_pixel(7, 15), &Rgba([0x12, 0x1a, 0x2b, 0xff]));
    }
}
