use crate::util::{fuzzy_is_null, normalize_rgba_color};

/// Represents a color in straight (non-premultiplied) RGBA format.
///
/// Each channel is stored as a normalized `f32` in `[0.0, 1.0]`. Colors built from
/// out-of-range or non-finite channels are representable but report `is_valid() == false`;
/// effect setters ignore invalid colors.
///
/// # Examples
///
/// ```
/// use acrylic_fx::Color;
///
/// let red = Color::rgb(255, 0, 0);
/// assert_eq!(red.normalize(), [1.0, 0.0, 0.0, 1.0]);
///
/// let semi_blue = Color::rgba(0, 0, 255, 128);
/// assert_eq!(semi_blue.to_array(), [0, 0, 255, 128]);
///
/// let dark = Color::from_hex("#2C2C2C").unwrap();
/// assert_eq!(dark, Color::rgb(0x2C, 0x2C, 0x2C));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color(pub [f32; 4]);

/// Hue/saturation/value triple used by the acrylic color math.
///
/// `hue` is `None` for achromatic colors and otherwise lies in `[0.0, 1.0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub hue: Option<f64>,
    pub saturation: f64,
    pub value: f64,
}

impl Color {
    /// A fully transparent color.
    pub const TRANSPARENT: Self = Self([0.0, 0.0, 0.0, 0.0]);
    /// An opaque black color.
    pub const BLACK: Self = Self([0.0, 0.0, 0.0, 1.0]);
    /// An opaque white color.
    pub const WHITE: Self = Self([1.0, 1.0, 1.0, 1.0]);

    /// Creates an opaque color from 8-bit channels.
    ///
    /// ```
    /// use acrylic_fx::Color;
    ///
    /// let green = Color::rgb(0, 255, 0);
    /// assert_eq!(green, Color([0.0, 1.0, 0.0, 1.0]));
    /// ```
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Creates a color from 8-bit channels.
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(normalize_rgba_color(&[r, g, b, a]))
    }

    /// Creates a color from normalized channels without clamping them.
    pub fn from_rgba_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([r, g, b, a])
    }

    /// Parses `#RRGGBB` or `#AARRGGBB`.
    ///
    /// ```
    /// use acrylic_fx::Color;
    ///
    /// assert_eq!(Color::from_hex("#80FFFFFF"), Some(Color::rgba(255, 255, 255, 128)));
    /// assert_eq!(Color::from_hex("not a color"), None);
    /// ```
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(2)?, byte(4)?, byte(6)?, byte(0)?)),
            _ => None,
        }
    }

    pub fn red(&self) -> f32 {
        self.0[0]
    }

    pub fn green(&self) -> f32 {
        self.0[1]
    }

    pub fn blue(&self) -> f32 {
        self.0[2]
    }

    pub fn alpha(&self) -> f32 {
        self.0[3]
    }

    /// Returns a copy with the alpha channel replaced.
    pub fn with_alpha(self, alpha: f32) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, alpha])
    }

    /// `true` when every channel is finite and inside `[0.0, 1.0]`.
    pub fn is_valid(&self) -> bool {
        self.0
            .iter()
            .all(|c| c.is_finite() && (0.0..=1.0).contains(c))
    }

    /// Returns the normalized channels, ready to be written into a uniform block.
    pub fn normalize(&self) -> [f32; 4] {
        self.0
    }

    /// Returns the channels premultiplied by alpha, the layout textures are sampled in.
    pub fn premultiplied(&self) -> [f32; 4] {
        let [r, g, b, a] = self.0;
        [r * a, g * a, b * a, a]
    }

    /// Returns the color quantized to 8-bit channels.
    ///
    /// ```
    /// use acrylic_fx::Color;
    ///
    /// let blue = Color::rgb(0, 0, 255);
    /// assert_eq!(blue.to_array(), [0, 0, 255, 255]);
    /// ```
    pub fn to_array(&self) -> [u8; 4] {
        self.0
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    /// Converts the RGB channels to hue/saturation/value.
    pub fn to_hsv(&self) -> Hsv {
        let [r, g, b, _] = self.0.map(f64::from);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let saturation = if fuzzy_is_null(max) { 0.0 } else { delta / max };
        let hue = if fuzzy_is_null(delta) {
            None
        } else {
            let sector = if r == max {
                (g - b) / delta
            } else if g == max {
                2.0 + (b - r) / delta
            } else {
                4.0 + (r - g) / delta
            };
            let degrees = sector * 60.0;
            let degrees = if degrees < 0.0 { degrees + 360.0 } else { degrees };
            Some(degrees / 360.0)
        };

        Hsv {
            hue,
            saturation,
            value: max,
        }
    }

    /// Builds a color from hue/saturation/value and an alpha channel.
    pub fn from_hsv(hsv: Hsv, alpha: f32) -> Self {
        let Hsv {
            hue,
            saturation: s,
            value: v,
        } = hsv;

        let hue = match hue {
            Some(hue) if s > 0.0 => hue,
            _ => {
                let v = v as f32;
                return Self([v, v, v, alpha]);
            }
        };

        let h = (hue * 6.0).rem_euclid(6.0);
        let sector = h.floor();
        let f = h - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));

        let (r, g, b) = match sector as u8 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };

        Self([r as f32, g as f32, b as f32, alpha])
    }
}
