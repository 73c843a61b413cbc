//! Textual display specs
//!
//! Describes displays without hardware, for the host window on a desktop and
//! for tests. One display per comma-separated entry:
//!
//! ```text
//! [x+y-]WxH[*dsf][#WxH[%hz]|WxH[%hz]...][/options][@ui_scale]
//!
//! 1366x768                  default origin, scale 1
//! 100+200-1920x1080*2       origin (100, 200), device scale factor 2
//! 1920x1080#1920x1080%60|1280x720%60
//!                           with a mode list; largest/fastest is native
//! 1280x800/o                2.5% overscan on every edge
//! 1280x800/r@0.8            rotated 90 degrees, UI scale 0.8
//! ```
//!
//! Rotation options are `r` (90), `u` (180) and `l` (270).

use thiserror::Error;

use super::geometry::{Insets, Rect, Size};
use super::info::{DisplayMode, PhysicalDisplayRecord, Rotation, RotationSource};
use super::{DisplayId, SYNTHETIC_DISPLAY_ID_START};

/// Size used for the empty spec
pub const DEFAULT_HOST_WINDOW_SIZE: Size = Size {
    width: 1366,
    height: 768,
};

/// Bootstrap spec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecParseError {
    #[error("Invalid display bounds: {0}")]
    InvalidBounds(String),

    #[error("Invalid scale value: {0}")]
    InvalidScale(String),

    #[error("Invalid refresh rate: {0}")]
    InvalidRefreshRate(String),

    #[error("Unknown display option: {0}")]
    UnknownOption(char),
}

/// Hands out ids for displays created from specs
#[derive(Debug, Clone)]
pub struct SyntheticIdAllocator {
    next: DisplayId,
}

impl Default for SyntheticIdAllocator {
    fn default() -> Self {
        Self {
            next: SYNTHETIC_DISPLAY_ID_START,
        }
    }
}

impl SyntheticIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> DisplayId {
        let id = self.next;
        self.next += 1;
        id
    }
}

fn parse_scale(value: &str) -> Result<f32, SpecParseError> {
    match value.trim().parse::<f32>() {
        Ok(scale) if scale > 0.0 && scale.is_finite() => Ok(scale),
        _ => Err(SpecParseError::InvalidScale(value.to_string())),
    }
}

fn parse_int(value: &str, spec: &str) -> Result<i32, SpecParseError> {
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| SpecParseError::InvalidBounds(spec.to_string()))
}

/// Parse `[x+y-]WxH[*dsf]` into bounds and an optional scale factor
fn parse_bounds(spec: &str) -> Result<(Rect, Option<f32>), SpecParseError> {
    let (geometry, scale) = match spec.split_once('*') {
        Some((geometry, scale)) => (geometry, Some(parse_scale(scale)?)),
        None => (spec, None),
    };

    let (origin, size) = match geometry.rsplit_once('-') {
        Some((origin, size)) => (Some(origin), size),
        None => (None, geometry),
    };

    let (x, y) = match origin {
        Some(origin) => {
            let (x, y) = origin
                .split_once('+')
                .ok_or_else(|| SpecParseError::InvalidBounds(spec.to_string()))?;
            (parse_int(x, spec)?, parse_int(y, spec)?)
        }
        None => (0, 0),
    };

    let (width, height) = size
        .split_once('x')
        .ok_or_else(|| SpecParseError::InvalidBounds(spec.to_string()))?;
    let width = parse_int(width, spec)?;
    let height = parse_int(height, spec)?;
    if width <= 0 || height <= 0 {
        return Err(SpecParseError::InvalidBounds(spec.to_string()));
    }

    Ok((Rect::new(x, y, width, height), scale))
}

/// Parse `WxH[*dsf][%hz]|...`; the largest, then fastest, mode is native
fn parse_mode_list(list: &str, default_dsf: f32) -> Result<Vec<DisplayMode>, SpecParseError> {
    let mut modes = Vec::new();
    let mut native_index = 0;
    let mut largest_area = -1i64;
    let mut highest_refresh = -1.0f32;

    for (index, entry) in list.split('|').enumerate() {
        let (resolution, refresh) = match entry.split_once('%') {
            Some((resolution, refresh)) => {
                let rate = refresh
                    .trim()
                    .parse::<f32>()
                    .map_err(|_| SpecParseError::InvalidRefreshRate(refresh.to_string()))?;
                (resolution, rate)
            }
            None => (entry, 0.0),
        };
        let (bounds, dsf) = parse_bounds(resolution)?;
        let size = bounds.size();
        if size.area() > largest_area || (size.area() == largest_area && refresh > highest_refresh) {
            native_index = index;
            largest_area = size.area();
            highest_refresh = refresh;
        }
        modes.push(DisplayMode::new(
            size,
            refresh,
            false,
            false,
            1.0,
            dsf.unwrap_or(default_dsf),
        ));
    }

    if let Some(native) = modes.get_mut(native_index) {
        *native = native.with_native(true);
    }
    Ok(modes)
}

/// Build a record from one display spec
///
/// The empty spec yields a 1366x768 display at scale 1.
pub fn parse_display_spec(spec: &str, id: DisplayId) -> Result<PhysicalDisplayRecord, SpecParseError> {
    let spec = spec.trim();

    let (main, ui_scale) = match spec.split_once('@') {
        Some((main, ui_scale)) => (main, parse_scale(ui_scale)?),
        None => (spec, 1.0),
    };

    let (main, options) = match main.split_once('/') {
        Some((main, options)) => (main, options),
        None => (main, ""),
    };
    let mut rotation = Rotation::Rotate0;
    let mut has_overscan = false;
    for option in options.chars() {
        match option {
            'o' => has_overscan = true,
            'r' => rotation = Rotation::Rotate90,
            'u' => rotation = Rotation::Rotate180,
            'l' => rotation = Rotation::Rotate270,
            other => return Err(SpecParseError::UnknownOption(other)),
        }
    }

    let (main, mode_list) = match main.split_once('#') {
        Some((main, modes)) => (main, Some(modes)),
        None => (main, None),
    };

    let (bounds, device_scale_factor) = if main.is_empty() {
        (Rect::from_size(DEFAULT_HOST_WINDOW_SIZE), 1.0)
    } else {
        let (bounds, dsf) = parse_bounds(main)?;
        (bounds, dsf.unwrap_or(1.0))
    };

    let display_modes = match mode_list {
        Some(list) => parse_mode_list(list, device_scale_factor)?,
        None => Vec::new(),
    };

    let mut record = PhysicalDisplayRecord::new(id, format!("Display-{}", id), has_overscan);
    record.device_scale_factor = device_scale_factor;
    record.set_rotation(rotation, RotationSource::Active);
    record.configured_ui_scale = ui_scale;
    record.set_bounds(bounds);
    record.display_modes = display_modes;

    if has_overscan {
        // 2.5% of each dimension on every edge
        let width = (bounds.width as f32 / device_scale_factor / 40.0) as i32;
        let height = (bounds.height as f32 / device_scale_factor / 40.0) as i32;
        record.set_overscan_insets(Insets::new(height, width, height, width));
        record.update_display_size();
    }
    record.is_native = true;
    Ok(record)
}

/// Parse a comma-separated list of specs, allocating an id for each
pub fn parse_display_spec_list(
    spec: &str,
    ids: &mut SyntheticIdAllocator,
) -> Result<Vec<PhysicalDisplayRecord>, SpecParseError> {
    spec.split(',')
        .map(|entry| parse_display_spec(entry, ids.allocate()))
        .collect()
}
