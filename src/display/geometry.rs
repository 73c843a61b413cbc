//! Geometry primitives
//!
//! Integer rectangles, points, sizes and insets shared by the registry, the
//! topology builder and the reconciler. Coordinates may be negative (a display
//! placed left of or above the primary).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Point in pixel or DIP coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate by the given deltas
    pub fn offset(&mut self, dx: i32, dy: i32) {
        self.x += dx;
        self.y += dy;
    }
}

/// Width and height
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    /// Create a new size
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Area in square pixels
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// True when either dimension is zero or negative
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Swap width and height (90/270 degree rotation)
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Scale both dimensions and floor the result
    pub fn scale_floored(&self, scale: f32) -> Self {
        Self::new(
            floor_scaled(self.width, scale),
            floor_scaled(self.height, scale),
        )
    }

    /// Scale both dimensions by the exact ratio `num / den`, flooring the result
    ///
    /// Integer arithmetic keeps panel widths in the unified desktop free of
    /// float rounding drift.
    pub fn scale_ratio_floored(&self, num: i32, den: i32) -> Self {
        if den == 0 {
            return *self;
        }
        let scale = |v: i32| ((v as i64 * num as i64).div_euclid(den as i64)) as i32;
        Self::new(scale(self.width), scale(self.height))
    }

    /// Shrink by the given amounts, clamping at zero
    pub fn enlarge(&mut self, dw: i32, dh: i32) {
        self.width = (self.width + dw).max(0);
        self.height = (self.height + dh).max(0);
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn floor_scaled(value: i32, scale: f32) -> i32 {
    (value as f64 * scale as f64).floor() as i32
}

/// Insets from the edges of a rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Insets {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
}

impl Insets {
    /// Create insets
    pub fn new(top: i32, left: i32, bottom: i32, right: i32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// True when every inset is zero
    pub fn is_empty(&self) -> bool {
        self.top == 0 && self.left == 0 && self.bottom == 0 && self.right == 0
    }

    /// Sum of left and right
    pub fn width(&self) -> i32 {
        self.left + self.right
    }

    /// Sum of top and bottom
    pub fn height(&self) -> i32 {
        self.top + self.bottom
    }

    /// Scale every inset, flooring
    pub fn scale(&self, scale: f32) -> Self {
        Self::new(
            floor_scaled(self.top, scale),
            floor_scaled(self.left, scale),
            floor_scaled(self.bottom, scale),
            floor_scaled(self.right, scale),
        )
    }
}

/// Rectangle with origin and size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle at the origin with the given size
    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Rectangle at `origin` with `size`
    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }

    pub fn set_origin(&mut self, origin: Point) {
        self.x = origin.x;
        self.y = origin.y;
    }

    pub fn set_size(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }

    /// Check if rectangle contains a point
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Shrink by `insets`, clamping the size at zero
    pub fn inset(&self, insets: &Insets) -> Self {
        Self::new(
            self.x + insets.left,
            self.y + insets.top,
            (self.width - insets.width()).max(0),
            (self.height - insets.height()).max(0),
        )
    }

    /// Insets that turn `self` into `inner`
    pub fn insets_from(&self, inner: &Rect) -> Insets {
        Insets::new(
            inner.y - self.y,
            inner.x - self.x,
            self.bottom() - inner.bottom(),
            self.right() - inner.right(),
        )
    }

    /// Smallest rectangle containing both; empty rectangles are ignored
    pub fn union(&self, other: &Rect) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(x, y, right - x, bottom - y)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains() {
        let rect = Rect::new(10, 10, 100, 100);
        assert!(rect.contains(Point::new(10, 10)));
        assert!(rect.contains(Point::new(109, 109)));
        assert!(!rect.contains(Point::new(110, 50)));
        assert!(!rect.contains(Point::new(9, 50)));
    }

    #[test]
    fn test_rect_union_ignores_empty() {
        let a = Rect::new(0, 0, 1920, 1080);
        let b = Rect::new(1920, 0, 1350, 1080);
        assert_eq!(a.union(&b), Rect::new(0, 0, 3270, 1080));
        assert_eq!(Rect::default().union(&b), b);
        assert_eq!(a.union(&Rect::default()), a);
    }

    #[test]
    fn test_inset_round_trip() {
        let bounds = Rect::new(0, 0, 1000, 800);
        let insets = Insets::new(10, 20, 30, 40);
        let work_area = bounds.inset(&insets);
        assert_eq!(work_area, Rect::new(20, 10, 940, 760));
        assert_eq!(bounds.insets_from(&work_area), insets);
    }

    #[test]
    fn test_scale_ratio_floored() {
        // 1280x1024 panel stretched to a 1080 tall canvas
        let size = Size::new(1280, 1024);
        assert_eq!(size.scale_ratio_floored(1080, 1024), Size::new(1350, 1080));
        // Non-integral results floor
        assert_eq!(Size::new(1366, 768).scale_ratio_floored(1080, 768), Size::new(1920, 1080));
        assert_eq!(Size::new(1000, 700).scale_ratio_floored(1080, 700), Size::new(1542, 1080));
    }

    #[test]
    fn test_size_scale_floored() {
        assert_eq!(Size::new(2560, 1700).scale_floored(0.5), Size::new(1280, 850));
        assert_eq!(Size::new(1366, 768).scale_floored(0.8), Size::new(1092, 614));
    }
}
