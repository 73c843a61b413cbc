//! Physical display records and display modes
//!
//! A [`PhysicalDisplayRecord`] is everything known about one output, whether it
//! is connected right now or not. Records are owned by the
//! [`DisplayRegistry`](super::DisplayRegistry) and never deleted, so replugging
//! a panel restores its rotation, scale and overscan.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::geometry::{Insets, Point, Rect, Size};
use super::DisplayId;

const SCALE_EPSILON: f32 = 0.0001;

/// Compare two scale factors or refresh rates
pub(crate) fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < SCALE_EPSILON
}

/// Display rotation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    /// Parse from degrees (0, 90, 180, 270)
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Rotate0),
            90 => Some(Self::Rotate90),
            180 => Some(Self::Rotate180),
            270 => Some(Self::Rotate270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Self::Rotate0 => 0,
            Self::Rotate90 => 90,
            Self::Rotate180 => 180,
            Self::Rotate270 => 270,
        }
    }

    /// True for 90 and 270 degrees
    pub fn is_transposed(&self) -> bool {
        matches!(self, Self::Rotate90 | Self::Rotate270)
    }
}

/// Who asked for a rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationSource {
    /// Requested through preferences or settings
    User,
    /// Currently applied (may come from an accelerometer)
    Active,
}

/// Color calibration profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorProfile {
    #[default]
    Standard,
    Dynamic,
    Movie,
    Reading,
}

/// Touch capability of a display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchSupport {
    #[default]
    Unknown,
    Available,
    Unavailable,
}

/// Touch calibration: four display/touch point pairs and the bounds they were taken at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchCalibrationData {
    pub point_pairs: [(Point, Point); 4],
    pub bounds: Size,
}

/// One candidate resolution/scale for a display
///
/// Modes are immutable values. Two modes are equivalent when size, refresh
/// rate, interlace, UI scale and device scale factor all match; the `native`
/// and `is_default` flags do not take part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayMode {
    pub size: Size,
    pub refresh_rate: f32,
    pub interlaced: bool,
    pub native: bool,
    pub ui_scale: f32,
    pub device_scale_factor: f32,
    #[serde(default)]
    pub is_default: bool,
}

impl DisplayMode {
    /// Create a mode
    pub fn new(
        size: Size,
        refresh_rate: f32,
        interlaced: bool,
        native: bool,
        ui_scale: f32,
        device_scale_factor: f32,
    ) -> Self {
        Self {
            size,
            refresh_rate,
            interlaced,
            native,
            ui_scale,
            device_scale_factor,
            is_default: false,
        }
    }

    /// Same mode with the default flag set
    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Same mode with the native flag set
    pub fn with_native(mut self, native: bool) -> Self {
        self.native = native;
        self
    }

    /// Set-membership equivalence
    pub fn is_equivalent(&self, other: &DisplayMode) -> bool {
        self.size == other.size
            && approx_eq(self.refresh_rate, other.refresh_rate)
            && self.interlaced == other.interlaced
            && approx_eq(self.ui_scale, other.ui_scale)
            && approx_eq(self.device_scale_factor, other.device_scale_factor)
    }

    /// Same pixel size and scale factors, ignoring timing
    ///
    /// Used when hardware reports the resolution it actually applied without a
    /// refresh rate.
    pub fn matches_resolution(&self, other: &DisplayMode) -> bool {
        self.size == other.size
            && approx_eq(self.ui_scale, other.ui_scale)
            && approx_eq(self.device_scale_factor, other.device_scale_factor)
    }

    /// Size in device independent pixels
    ///
    /// DSF 1.25 on the internal display is drawn at 1.25 but does not shrink the
    /// logical size.
    pub fn size_in_dip(&self, is_internal: bool) -> Size {
        let mut width = self.size.width as f64 * self.ui_scale as f64;
        let mut height = self.size.height as f64 * self.ui_scale as f64;
        if !(is_internal && approx_eq(self.device_scale_factor, 1.25)) {
            width /= self.device_scale_factor as f64;
            height /= self.device_scale_factor as f64;
        }
        Size::new(width.floor() as i32, height.floor() as i32)
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{:.1}Hz{} ui={} dsf={}{}",
            self.size,
            self.refresh_rate,
            if self.interlaced { "i" } else { "" },
            self.ui_scale,
            self.device_scale_factor,
            if self.native { " native" } else { "" }
        )
    }
}

/// Authoritative snapshot of one physical output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalDisplayRecord {
    pub id: DisplayId,
    pub name: String,
    pub has_overscan: bool,
    /// Bounds reported by hardware, in native pixels
    pub bounds_in_native: Rect,
    /// Derived: native size minus overscan, rotated, UI scaled
    pub size_in_pixel: Size,
    pub device_scale_factor: f32,
    /// Legacy UI scale, valid range [0.5, 2.0]
    pub configured_ui_scale: f32,
    pub user_rotation: Rotation,
    pub active_rotation: Rotation,
    pub overscan_insets_in_dip: Insets,
    /// Next merge should wipe overscan rather than keep the old value
    pub clear_overscan_insets: bool,
    pub display_modes: Vec<DisplayMode>,
    pub touch_calibration: Option<TouchCalibrationData>,
    pub touch_support: TouchSupport,
    pub color_profile: ColorProfile,
    pub available_color_profiles: Vec<ColorProfile>,
    pub maximum_cursor_size: Size,
    /// Came straight from hardware detection (not yet merged)
    pub is_native: bool,
    /// Set by the registry for the designated internal panel
    pub is_internal: bool,
}

impl PhysicalDisplayRecord {
    /// Create a record with no bounds
    pub fn new(id: DisplayId, name: impl Into<String>, has_overscan: bool) -> Self {
        Self {
            id,
            name: name.into(),
            has_overscan,
            bounds_in_native: Rect::default(),
            size_in_pixel: Size::default(),
            device_scale_factor: 1.0,
            configured_ui_scale: 1.0,
            user_rotation: Rotation::Rotate0,
            active_rotation: Rotation::Rotate0,
            overscan_insets_in_dip: Insets::default(),
            clear_overscan_insets: false,
            display_modes: Vec::new(),
            touch_calibration: None,
            touch_support: TouchSupport::Unknown,
            color_profile: ColorProfile::Standard,
            available_color_profiles: Vec::new(),
            maximum_cursor_size: Size::default(),
            is_native: false,
            is_internal: false,
        }
    }

    /// Set native bounds and recompute the pixel size
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds_in_native = bounds;
        self.size_in_pixel = bounds.size();
        self.update_display_size();
    }

    pub fn rotation(&self, source: RotationSource) -> Rotation {
        match source {
            RotationSource::User => self.user_rotation,
            RotationSource::Active => self.active_rotation,
        }
    }

    /// Record a rotation; the active rotation always follows
    pub fn set_rotation(&mut self, rotation: Rotation, source: RotationSource) {
        if source == RotationSource::User {
            self.user_rotation = rotation;
        }
        self.active_rotation = rotation;
    }

    pub fn set_overscan_insets(&mut self, insets: Insets) {
        self.overscan_insets_in_dip = insets;
    }

    /// Overscan converted to native pixels
    pub fn overscan_insets_in_pixel(&self) -> Insets {
        self.overscan_insets_in_dip.scale(self.device_scale_factor)
    }

    pub fn is_color_profile_available(&self, profile: ColorProfile) -> bool {
        self.available_color_profiles.contains(&profile)
    }

    /// Device scale factor actually used for rendering
    pub fn effective_device_scale_factor(&self) -> f32 {
        if self.is_internal && approx_eq(self.device_scale_factor, 1.25) {
            return if approx_eq(self.configured_ui_scale, 0.8) {
                1.25
            } else {
                1.0
            };
        }
        if approx_eq(self.device_scale_factor, self.configured_ui_scale) {
            return 1.0;
        }
        self.device_scale_factor
    }

    /// UI scale actually applied on top of the device scale factor
    pub fn effective_ui_scale(&self) -> f32 {
        if self.is_internal && approx_eq(self.device_scale_factor, 1.25) {
            return if approx_eq(self.configured_ui_scale, 0.8) {
                1.0
            } else {
                self.configured_ui_scale
            };
        }
        if approx_eq(self.device_scale_factor, self.configured_ui_scale) {
            return 1.0;
        }
        self.configured_ui_scale
    }

    /// Recompute `size_in_pixel` from native bounds, overscan, rotation and UI scale
    pub fn update_display_size(&mut self) {
        let mut size = self.bounds_in_native.size();
        if self.overscan_insets_in_dip.is_empty() {
            self.overscan_insets_in_dip = Insets::default();
        } else {
            let insets = self.overscan_insets_in_pixel();
            size.enlarge(-insets.width(), -insets.height());
        }
        if self.active_rotation.is_transposed() {
            size = size.transposed();
        }
        self.size_in_pixel = size.scale_floored(self.effective_ui_scale());
    }

    /// Largest candidate mode by area
    pub fn max_native_size(&self) -> Size {
        self.display_modes
            .iter()
            .map(|mode| mode.size)
            .fold(Size::default(), |best, size| {
                if size.area() > best.area() {
                    size
                } else {
                    best
                }
            })
    }

    /// Merge an incoming snapshot onto this record
    ///
    /// Hardware fields are always taken. Preference fields (rotation, UI scale,
    /// color profile, overscan, touch calibration) are taken only when the
    /// incoming record did not come from hardware detection.
    pub fn copy_from(&mut self, other: &PhysicalDisplayRecord) {
        debug_assert_eq!(self.id, other.id);
        self.name = other.name.clone();
        self.has_overscan = other.has_overscan;
        self.touch_support = other.touch_support;
        self.device_scale_factor = other.device_scale_factor;
        self.bounds_in_native = other.bounds_in_native;
        self.size_in_pixel = other.size_in_pixel;
        self.display_modes = other.display_modes.clone();
        self.maximum_cursor_size = other.maximum_cursor_size;

        if !other.is_native {
            if other.clear_overscan_insets {
                self.overscan_insets_in_dip = Insets::default();
            } else if !other.overscan_insets_in_dip.is_empty() {
                self.overscan_insets_in_dip = other.overscan_insets_in_dip;
            }
            self.user_rotation = other.user_rotation;
            self.active_rotation = other.active_rotation;
            self.configured_ui_scale = other.configured_ui_scale;
            self.color_profile = other.color_profile;
            self.available_color_profiles = other.available_color_profiles.clone();
            self.touch_calibration = other.touch_calibration;
        }
    }
}

impl fmt::Display for PhysicalDisplayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DisplayInfo[{}] native={} size={} dsf={} ui={} rotation={} overscan={:?} modes={}",
            self.id,
            self.bounds_in_native,
            self.size_in_pixel,
            self.device_scale_factor,
            self.configured_ui_scale,
            self.active_rotation.degrees(),
            self.overscan_insets_in_dip,
            self.display_modes.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: DisplayId, width: i32, height: i32) -> PhysicalDisplayRecord {
        let mut info = PhysicalDisplayRecord::new(id, format!("Display {}", id), false);
        info.set_bounds(Rect::new(0, 0, width, height));
        info
    }

    #[test]
    fn test_mode_equivalence_ignores_flags() {
        let a = DisplayMode::new(Size::new(1920, 1080), 60.0, false, true, 1.0, 1.0);
        let b = DisplayMode::new(Size::new(1920, 1080), 60.0, false, false, 1.0, 1.0)
            .with_default(true);
        assert!(a.is_equivalent(&b));

        let c = DisplayMode::new(Size::new(1920, 1080), 50.0, false, true, 1.0, 1.0);
        assert!(!a.is_equivalent(&c));
        assert!(a.matches_resolution(&c));

        let d = DisplayMode::new(Size::new(1920, 1080), 60.0, true, true, 1.0, 1.0);
        assert!(!a.is_equivalent(&d));
    }

    #[test]
    fn test_update_display_size_overscan_and_rotation() {
        let mut info = record(1, 1920, 1080);
        info.set_overscan_insets(Insets::new(10, 20, 30, 40));
        info.update_display_size();
        assert_eq!(info.size_in_pixel, Size::new(1860, 1040));

        info.set_rotation(Rotation::Rotate90, RotationSource::User);
        info.update_display_size();
        assert_eq!(info.size_in_pixel, Size::new(1040, 1860));
    }

    #[test]
    fn test_ui_scale_shrinks_pixel_size() {
        let mut info = record(1, 1366, 768);
        info.configured_ui_scale = 0.5;
        info.update_display_size();
        assert_eq!(info.size_in_pixel, Size::new(683, 384));
    }

    #[test]
    fn test_effective_scale_fhd_125_internal() {
        let mut info = record(1, 1920, 1080);
        info.is_internal = true;
        info.device_scale_factor = 1.25;
        info.configured_ui_scale = 0.8;
        assert_eq!(info.effective_device_scale_factor(), 1.25);
        assert_eq!(info.effective_ui_scale(), 1.0);

        info.configured_ui_scale = 1.0;
        assert_eq!(info.effective_device_scale_factor(), 1.0);
        assert_eq!(info.effective_ui_scale(), 1.0);
    }

    #[test]
    fn test_effective_scale_cancels_when_equal() {
        let mut info = record(1, 2560, 1700);
        info.device_scale_factor = 2.0;
        info.configured_ui_scale = 2.0;
        assert_eq!(info.effective_device_scale_factor(), 1.0);
        assert_eq!(info.effective_ui_scale(), 1.0);
    }

    #[test]
    fn test_copy_from_native_keeps_preferences() {
        let mut existing = record(5, 1920, 1080);
        existing.set_rotation(Rotation::Rotate90, RotationSource::User);
        existing.configured_ui_scale = 0.8;
        existing.set_overscan_insets(Insets::new(5, 5, 5, 5));

        let mut incoming = record(5, 2560, 1440);
        incoming.is_native = true;
        existing.copy_from(&incoming);

        assert_eq!(existing.bounds_in_native, Rect::new(0, 0, 2560, 1440));
        assert_eq!(existing.active_rotation, Rotation::Rotate90);
        assert_eq!(existing.configured_ui_scale, 0.8);
        assert_eq!(existing.overscan_insets_in_dip, Insets::new(5, 5, 5, 5));
    }

    #[test]
    fn test_copy_from_non_native_takes_preferences() {
        let mut existing = record(5, 1920, 1080);
        existing.set_overscan_insets(Insets::new(5, 5, 5, 5));

        let mut incoming = record(5, 1920, 1080);
        incoming.set_rotation(Rotation::Rotate180, RotationSource::Active);
        incoming.clear_overscan_insets = true;
        existing.copy_from(&incoming);

        assert_eq!(existing.active_rotation, Rotation::Rotate180);
        assert!(existing.overscan_insets_in_dip.is_empty());
    }

    #[test]
    fn test_size_in_dip() {
        let mode = DisplayMode::new(Size::new(2560, 1700), 60.0, false, false, 1.0, 2.0);
        assert_eq!(mode.size_in_dip(false), Size::new(1280, 850));

        let internal_125 = DisplayMode::new(Size::new(1920, 1080), 60.0, false, false, 0.8, 1.25);
        assert_eq!(internal_125.size_in_dip(true), Size::new(1536, 864));
    }
}
