//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::display::{
    ColorProfile, DisplayId, DisplayPlacement, Insets, Layout, Position, Size,
    TouchCalibrationData, MINIMUM_OVERLAP_FOR_INVALID_OFFSET,
};

/// Engine-wide display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Allow the unified desktop mode
    pub unified_desktop_enabled: bool,

    /// Treat the first bootstrapped display as the internal panel
    pub first_display_as_internal: bool,

    /// Designated internal panel id
    pub internal_display_id: Option<DisplayId>,

    /// A hardware configurator performs mode setting
    pub configure_displays: bool,

    /// Start in software mirroring mode
    pub software_mirroring: bool,

    /// Bootstrap display specs, comma separated (empty = one 1366x768 display)
    pub host_window_bounds: String,

    /// Placement for layouts created on first sight of a display set
    pub default_placement: PlacementConfig,

    /// Minimum shared edge between neighboring displays, in DIP
    pub minimum_overlap: i32,
}

fn default_minimum_overlap() -> i32 {
    MINIMUM_OVERLAP_FOR_INVALID_OFFSET
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            unified_desktop_enabled: false,
            first_display_as_internal: true,
            internal_display_id: None,
            configure_displays: false,
            software_mirroring: false,
            host_window_bounds: String::new(),
            default_placement: PlacementConfig::default(),
            minimum_overlap: default_minimum_overlap(),
        }
    }
}

/// Default placement of a display against its parent
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlacementConfig {
    #[serde(default)]
    pub position: Position,

    #[serde(default)]
    pub offset: i32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    pub level: String,

    /// Output format ("pretty", "compact", "json")
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Also write logs to this file
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: default_log_format(),
            log_file: None,
        }
    }
}

/// Persisted state for one display
///
/// Applied with `DisplayManager::register_display_property` before the first
/// hardware event, so a panel comes up the way it was left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayPropertiesConfig {
    pub id: DisplayId,

    /// Rotation in degrees (0, 90, 180, 270)
    #[serde(default)]
    pub rotation: i32,

    #[serde(default = "default_scale")]
    pub ui_scale: f32,

    /// Overscan in DIP
    #[serde(default)]
    pub overscan: Option<Insets>,

    /// Selected resolution in native pixels
    #[serde(default)]
    pub resolution: Option<Size>,

    #[serde(default = "default_scale")]
    pub device_scale_factor: f32,

    #[serde(default)]
    pub color_profile: ColorProfile,

    #[serde(default)]
    pub touch_calibration: Option<TouchCalibrationData>,
}

fn default_scale() -> f32 {
    1.0
}

/// Persisted layout for one set of display ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Display ids the layout applies to
    pub ids: Vec<DisplayId>,

    pub primary_id: DisplayId,

    #[serde(default)]
    pub placements: Vec<DisplayPlacement>,

    #[serde(default)]
    pub mirrored: bool,

    #[serde(default = "default_unified")]
    pub default_unified: bool,
}

fn default_unified() -> bool {
    true
}

impl LayoutConfig {
    pub fn to_layout(&self) -> Layout {
        Layout {
            primary_id: self.primary_id,
            placement_list: self.placements.clone(),
            mirrored: self.mirrored,
            default_unified: self.default_unified,
        }
    }
}
