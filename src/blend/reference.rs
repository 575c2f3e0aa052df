//! CPU evaluation of the blend shaders.
//!
//! Mirrors the generated GLSL operation for operation (in `f32`), so software paths and
//! tests can predict what the GPU produces for a single pixel.

use super::BlendMode;

type Rgb = [f32; 3];

const MIN_ALPHA: f32 = 1.0 / 256.0;

fn map(v: Rgb, f: impl Fn(f32) -> f32) -> Rgb {
    [f(v[0]), f(v[1]), f(v[2])]
}

fn zip(a: Rgb, b: Rgb, f: impl Fn(f32, f32) -> f32) -> Rgb {
    [f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2])]
}

fn rgb_to_l(color: Rgb) -> f32 {
    let cmin = color[0].min(color[1].min(color[2]));
    let cmax = color[0].max(color[1].max(color[2]));
    (cmin + cmax) / 2.0
}

fn rgb_to_hsl(color: Rgb) -> Rgb {
    let [r, g, b] = color;
    let cmin = r.min(g.min(b));
    let cmax = r.max(g.max(b));
    let mut h = 0.0;
    let mut s = 0.0;
    let l = (cmin + cmax) / 2.0;
    let diff = cmax - cmin;

    if diff > 1.0 / 256.0 {
        s = if l < 0.5 {
            diff / (cmin + cmax)
        } else {
            diff / (2.0 - (cmin + cmax))
        };
        h = if r == cmax {
            (g - b) / diff
        } else if g == cmax {
            2.0 + (b - r) / diff
        } else {
            4.0 + (r - g) / diff
        };
        h /= 6.0;
    }
    [h, s, l]
}

fn hue_to_intensity(v1: f32, v2: f32, h: f32) -> f32 {
    let h = h - h.floor();
    if h < 1.0 / 6.0 {
        v1 + (v2 - v1) * 6.0 * h
    } else if h < 1.0 / 2.0 {
        v2
    } else if h < 2.0 / 3.0 {
        v1 + (v2 - v1) * 6.0 * (2.0 / 3.0 - h)
    } else {
        v1
    }
}

fn hsl_to_rgb(color: Rgb) -> Rgb {
    let [h, s, l] = color;
    if s < 1.0 / 256.0 {
        return [l, l, l];
    }
    let v2 = if l < 0.5 {
        l * (1.0 + s)
    } else {
        (l + s) - (s * l)
    };
    let v1 = 2.0 * l - v2;
    let d = 1.0 / 3.0;
    [
        hue_to_intensity(v1, v2, h + d),
        hue_to_intensity(v1, v2, h),
        hue_to_intensity(v1, v2, h - d),
    ]
}

fn channel_blend_hard_light(c1: f32, c2: f32) -> f32 {
    if c2 > 0.5 {
        1.0 - (1.0 - 2.0 * (c2 - 0.5)) * (1.0 - c1)
    } else {
        2.0 * c1 * c2
    }
}

fn luma(c: Rgb) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

/// Blends premultiplied `foreground` over premultiplied `background` with `mode` and
/// returns the premultiplied result, as the blend shader does at full opacity.
///
/// ```
/// use acrylic_fx::blend::{reference, BlendMode};
///
/// let background = [0.2, 0.4, 0.6, 1.0];
/// let foreground = [0.9, 0.1, 0.3, 1.0];
/// assert_eq!(reference::composite(BlendMode::Normal, background, foreground), foreground);
/// ```
pub fn composite(mode: BlendMode, background: [f32; 4], foreground: [f32; 4]) -> [f32; 4] {
    let color1 = background;
    let color2 = foreground;
    let rgb1 = map([color1[0], color1[1], color1[2]], |c| c / MIN_ALPHA.max(color1[3]));
    let rgb2 = map([color2[0], color2[1], color2[2]], |c| c / MIN_ALPHA.max(color2[3]));
    let mut a = color1[3].max(color1[3] * color2[3]);

    let result: Rgb = match mode {
        BlendMode::Normal => {
            a = color1[3].max(color2[3]);
            rgb2
        }
        BlendMode::Addition => zip(rgb1, rgb2, |x, y| (x + y).min(1.0)),
        BlendMode::Average => zip(rgb1, rgb2, |x, y| 0.5 * (x + y)),
        BlendMode::Color => {
            let hsl2 = rgb_to_hsl(rgb2);
            hsl_to_rgb([hsl2[0], hsl2[1], rgb_to_l(rgb1)])
        }
        BlendMode::ColorBurn => zip(rgb1, rgb2, |x, y| {
            (1.0 - ((1.0 - x) / MIN_ALPHA.max(y))).clamp(0.0, 1.0)
        }),
        BlendMode::ColorDodge => {
            zip(rgb1, rgb2, |x, y| (x / MIN_ALPHA.max(1.0 - y)).clamp(0.0, 1.0))
        }
        BlendMode::Darken => zip(rgb1, rgb2, f32::min),
        BlendMode::DarkerColor => {
            if luma(rgb1) > luma(rgb2) {
                rgb2
            } else {
                rgb1
            }
        }
        BlendMode::Difference => zip(rgb1, rgb2, |x, y| (x - y).abs()),
        BlendMode::Divide => zip(rgb1, rgb2, |x, y| (x / y).clamp(0.0, 1.0)),
        BlendMode::Exclusion => zip(rgb1, rgb2, |x, y| x + y - 2.0 * x * y),
        BlendMode::HardLight => zip(rgb1, rgb2, channel_blend_hard_light),
        BlendMode::Hue => {
            let hsl1 = rgb_to_hsl(rgb1);
            hsl_to_rgb([rgb_to_hsl(rgb2)[0], hsl1[1], hsl1[2]])
        }
        BlendMode::Lighten => zip(rgb1, rgb2, f32::max),
        BlendMode::LighterColor => {
            if luma(rgb1) > luma(rgb2) {
                rgb1
            } else {
                rgb2
            }
        }
        BlendMode::Lightness => {
            let hsl1 = rgb_to_hsl(rgb1);
            hsl_to_rgb([hsl1[0], hsl1[1], rgb_to_l(rgb2)])
        }
        BlendMode::Multiply => zip(rgb1, rgb2, |x, y| x * y),
        BlendMode::Negation => zip(rgb1, rgb2, |x, y| 1.0 - (1.0 - x - y).abs()),
        BlendMode::Saturation => {
            let hsl1 = rgb_to_hsl(rgb1);
            hsl_to_rgb([hsl1[0], rgb_to_hsl(rgb2)[1], hsl1[2]])
        }
        BlendMode::Screen => zip(rgb1, rgb2, |x, y| 1.0 - (1.0 - x) * (1.0 - y)),
        BlendMode::Subtract => zip(rgb1, rgb2, |x, y| (x - y).max(0.0)),
        BlendMode::SoftLight => zip(rgb1, rgb2, |x, y| {
            x * ((1.0 - x) * y + (1.0 - (1.0 - x) * (1.0 - y)))
        }),
    };

    let coverage = color2[3];
    let mixed = zip(rgb1, result, |x, y| x * (1.0 - coverage) + y * coverage);
    [mixed[0] * a, mixed[1] * a, mixed[2] * a, a]
}
