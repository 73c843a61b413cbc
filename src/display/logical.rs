//! Logical displays
//!
//! The externally visible unit: one per active output, or a single synthetic
//! aggregate in unified mode. Bounds are in device independent pixels.

use serde::{Deserialize, Serialize};

use super::geometry::{Insets, Point, Rect, Size};
use super::info::{Rotation, TouchSupport};
use super::{DisplayId, INVALID_DISPLAY_ID};

/// An active display as seen by observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalDisplay {
    pub id: DisplayId,
    /// Bounds in DIP, positioned by the layout
    pub bounds: Rect,
    /// Bounds minus shelf/panel insets
    pub work_area: Rect,
    pub size_in_pixels: Size,
    pub device_scale_factor: f32,
    pub rotation: Rotation,
    pub touch_support: TouchSupport,
    pub maximum_cursor_size: Size,
    /// Native bounds of the backing record, for change detection
    pub native_bounds: Rect,
    /// Overscan of the backing record in pixels, for change detection
    pub overscan_insets: Insets,
}

impl LogicalDisplay {
    /// Create a display with empty bounds
    pub fn new(id: DisplayId) -> Self {
        Self {
            id,
            bounds: Rect::default(),
            work_area: Rect::default(),
            size_in_pixels: Size::default(),
            device_scale_factor: 1.0,
            rotation: Rotation::Rotate0,
            touch_support: TouchSupport::Unknown,
            maximum_cursor_size: Size::default(),
            native_bounds: Rect::default(),
            overscan_insets: Insets::default(),
        }
    }

    /// Sentinel returned for lookups of unknown ids
    pub fn invalid() -> Self {
        Self::new(INVALID_DISPLAY_ID)
    }

    pub fn is_valid(&self) -> bool {
        self.id != INVALID_DISPLAY_ID
    }

    pub fn size(&self) -> Size {
        self.bounds.size()
    }

    /// Insets between bounds and work area
    pub fn work_area_insets(&self) -> Insets {
        self.bounds.insets_from(&self.work_area)
    }

    /// Recompute the work area from insets against the current bounds
    pub fn update_work_area_from_insets(&mut self, insets: &Insets) {
        self.work_area = self.bounds.inset(insets);
    }

    /// Set the scale and pixel bounds, keeping the current work-area insets
    pub fn set_scale_and_bounds(&mut self, device_scale_factor: f32, bounds_in_pixel: Rect) {
        let insets = self.work_area_insets();
        self.device_scale_factor = device_scale_factor;
        let inverse = 1.0 / device_scale_factor;
        let origin = Point::new(
            (bounds_in_pixel.x as f64 * inverse as f64).floor() as i32,
            (bounds_in_pixel.y as f64 * inverse as f64).floor() as i32,
        );
        self.bounds = Rect::from_origin_size(origin, bounds_in_pixel.size().scale_floored(inverse));
        self.size_in_pixels = bounds_in_pixel.size();
        self.update_work_area_from_insets(&insets);
    }

    /// Replace bounds, keeping the current work-area insets
    pub fn set_bounds(&mut self, bounds: Rect) {
        let insets = self.work_area_insets();
        self.bounds = bounds;
        self.update_work_area_from_insets(&insets);
    }

    /// Change pixel size, recomputing DIP bounds at the current scale
    pub fn set_size(&mut self, size_in_pixel: Size) {
        let origin = self.bounds.origin();
        let scale = self.device_scale_factor;
        self.set_scale_and_bounds(scale, Rect::from_size(size_in_pixel));
        let mut bounds = self.bounds;
        bounds.set_origin(origin);
        self.set_bounds(bounds);
    }
}
