use crate::util::fuzzy_eq;

/// An axis-aligned rectangle in logical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    /// `true` when the rectangle covers no area. An empty source rect means "whole item".
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// `true` when the rectangle extends above or left of the item, i.e. leaves room
    /// for a transparent border around the sampled content.
    pub fn is_padded(&self) -> bool {
        self.x < 0.0 || self.y < 0.0
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    pub fn fuzzy_eq(&self, other: &Rect) -> bool {
        fuzzy_eq(self.x, other.x)
            && fuzzy_eq(self.y, other.y)
            && fuzzy_eq(self.width, other.width)
            && fuzzy_eq(self.height, other.height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// `true` when either dimension is zero or negative.
    pub fn is_null(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}
