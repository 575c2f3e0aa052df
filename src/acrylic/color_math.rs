//! Tint and luminosity colors of the acrylic material.
//!
//! All math runs in `f64` on straight (non-premultiplied) colors.

use crate::color::{Color, Hsv};
use crate::util::fuzzy_compare;

const MID_POINT: f64 = 0.50;
const WHITE_MAX_OPACITY: f64 = 0.45;
const MID_POINT_MAX_OPACITY: f64 = 0.90;
const BLACK_MAX_OPACITY: f64 = 0.85;

const MIN_HSV_VALUE: f64 = 0.125;
const MAX_HSV_VALUE: f64 = 0.965;
const MIN_LUMINOSITY_OPACITY: f64 = 0.15;
const MAX_LUMINOSITY_OPACITY: f64 = 1.03;

/// Caps the opacity a tint may reach depending on its brightness and saturation.
///
/// Pure white maps to 0.45, pure black to 0.85 and mid gray to 0.90, linearly in the
/// distance from mid gray. Saturation cancels the suppression, fully at 50%.
pub fn tint_opacity_modifier(tint: Color) -> f64 {
    let Hsv {
        saturation, value, ..
    } = tint.to_hsv();
    if fuzzy_compare(value, MID_POINT) {
        return MID_POINT_MAX_OPACITY;
    }

    let (lowest_max_opacity, max_deviation) = if value > MID_POINT {
        (WHITE_MAX_OPACITY, 1.0 - MID_POINT)
    } else {
        (BLACK_MAX_OPACITY, MID_POINT)
    };
    let mut max_suppression = MID_POINT_MAX_OPACITY - lowest_max_opacity;
    let normalized_deviation = (value - MID_POINT).abs() / max_deviation;
    if saturation > 0.0 {
        max_suppression *= (1.0 - saturation * 2.0).max(0.0);
    }
    MID_POINT_MAX_OPACITY - max_suppression * normalized_deviation
}

/// Color of the tint layer. Without an explicit luminosity opacity the tint is
/// additionally capped by [`tint_opacity_modifier`].
pub fn effective_tint_color(
    tint: Color,
    tint_opacity: f64,
    luminosity_opacity: Option<f64>,
) -> Color {
    let mut alpha = f64::from(tint.alpha()) * tint_opacity;
    if luminosity_opacity.is_none() {
        alpha *= tint_opacity_modifier(tint);
    }
    tint.with_alpha(alpha as f32)
}

/// Color of the luminosity layer, derived from the tint at its unmodified opacity.
pub fn effective_luminosity_color(
    tint: Color,
    tint_opacity: f64,
    luminosity_opacity: Option<f64>,
) -> Color {
    let tint_alpha = f64::from(tint.alpha()) * tint_opacity;
    if let Some(luminosity) = luminosity_opacity {
        return tint.with_alpha(luminosity.clamp(0.0, 1.0) as f32);
    }

    let hsv = tint.to_hsv();
    let clamped = Hsv {
        value: hsv.value.clamp(MIN_HSV_VALUE, MAX_HSV_VALUE),
        ..hsv
    };
    let mapped_opacity =
        tint_alpha * (MAX_LUMINOSITY_OPACITY - MIN_LUMINOSITY_OPACITY) + MIN_LUMINOSITY_OPACITY;
    Color::from_hsv(clamped, mapped_opacity.min(1.0) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn modifier_at_the_anchor_points() {
        assert!(close(tint_opacity_modifier(Color::WHITE), 0.45));
        assert!(close(tint_opacity_modifier(Color::BLACK), 0.85));
        let gray = Color::from_rgba_f32(0.5, 0.5, 0.5, 1.0);
        assert_eq!(tint_opacity_modifier(gray), 0.90);
    }

    #[test]
    fn saturation_cancels_the_suppression() {
        let red = Color::rgb(255, 0, 0);
        assert!(close(tint_opacity_modifier(red), 0.90));
        // Half saturated, full value: suppression fully damped.
        let pink = Color::from_rgba_f32(1.0, 0.5, 0.5, 1.0);
        assert!(close(tint_opacity_modifier(pink), 0.90));
        // Quarter saturated: half the white suppression.
        let light = Color::from_rgba_f32(1.0, 0.75, 0.75, 1.0);
        assert!(close(tint_opacity_modifier(light), 0.90 - 0.45 * 0.5));
    }

    #[test]
    fn explicit_luminosity_opacity_is_used_verbatim() {
        let tint = Color::rgb(0x2C, 0x2C, 0x2C);
        for tint_opacity in [0.0, 0.15, 1.0] {
            let color = effective_luminosity_color(tint, tint_opacity, Some(0.5));
            assert_eq!(color.alpha(), 0.5);
            assert_eq!(color.red(), tint.red());
        }
        assert_eq!(effective_luminosity_color(tint, 1.0, Some(3.0)).alpha(), 1.0);
    }

    #[test]
    fn explicit_luminosity_skips_the_tint_modifier() {
        let tint = Color::WHITE;
        assert!(close(f64::from(effective_tint_color(tint, 0.5, Some(0.9)).alpha()), 0.5));
        assert!(close(
            f64::from(effective_tint_color(tint, 0.5, None).alpha()),
            0.5 * 0.45
        ));
    }

    #[test]
    fn derived_luminosity_clamps_value_and_maps_opacity() {
        let white = effective_luminosity_color(Color::WHITE, 1.0, None);
        assert!((white.red() - 0.965).abs() < 1e-6);
        assert_eq!(white.alpha(), 1.0);

        let black = effective_luminosity_color(Color::BLACK, 0.0, None);
        assert!((black.red() - 0.125).abs() < 1e-6);
        assert!((black.alpha() - 0.15).abs() < 1e-6);
    }
}
