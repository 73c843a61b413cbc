//! Mode Selector
//!
//! Chooses and validates the resolution/scale of each display and remembers
//! the user's choice per id across replug. Also builds the synthetic mode lists
//! used for the internal panel (UI scales) and the unified desktop
//! (alternate resolutions).

use std::collections::HashMap;
use tracing::{debug, warn};

use super::info::{approx_eq, DisplayMode, PhysicalDisplayRecord};
use super::{DisplayError, DisplayId, Result};

const UI_SCALES_FOR_2X: &[f32] = &[0.5, 0.625, 0.8, 1.0, 1.125, 1.25, 1.5, 2.0];
const UI_SCALES_FOR_1_25X: &[f32] = &[0.5, 0.625, 0.8, 1.0, 1.25];
const UI_SCALES_FOR_1280: &[f32] = &[0.5, 0.625, 0.8, 1.0, 1.125];
const UI_SCALES_FOR_1366: &[f32] = &[0.5, 0.6, 0.75, 1.0, 1.125];
const UI_SCALES_FOR_FHD: &[f32] = &[0.5, 0.625, 0.8, 1.0, 1.25];

/// What a successful [`ModeSelector::select_mode`] changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeChange {
    /// Scale or UI scale changed; a topology pass is needed
    pub property_changed: bool,
    /// Pixel size differs from the current native bounds; hardware must be reconfigured
    pub resolution_changed: bool,
}

impl ModeChange {
    pub fn any(&self) -> bool {
        self.property_changed || self.resolution_changed
    }
}

/// Index of the first candidate equivalent to `target`
pub fn find_display_mode(modes: &[DisplayMode], target: &DisplayMode) -> Option<usize> {
    modes.iter().position(|mode| mode.is_equivalent(target))
}

/// The mode flagged as the vendor/OS default
pub fn default_mode(record: &PhysicalDisplayRecord) -> Option<DisplayMode> {
    record.display_modes.iter().find(|mode| mode.is_default).copied()
}

fn scales_for_display(native_mode: &DisplayMode) -> &'static [f32] {
    if approx_eq(native_mode.device_scale_factor, 2.0) {
        return UI_SCALES_FOR_2X;
    }
    if approx_eq(native_mode.device_scale_factor, 1.25) {
        return UI_SCALES_FOR_1_25X;
    }
    match native_mode.size.width {
        1366 => UI_SCALES_FOR_1366,
        1920 => UI_SCALES_FOR_FHD,
        _ => UI_SCALES_FOR_1280,
    }
}

/// UI-scale candidates for the internal panel
///
/// Every entry shares the native size and DSF; the one at the panel's native UI
/// scale is flagged native and default.
pub fn internal_mode_list(native_mode: &DisplayMode) -> Vec<DisplayMode> {
    let native_ui_scale = if approx_eq(native_mode.device_scale_factor, 1.25) {
        1.0
    } else {
        native_mode.device_scale_factor
    };
    scales_for_display(native_mode)
        .iter()
        .map(|&ui_scale| {
            let is_native = approx_eq(ui_scale, native_ui_scale);
            DisplayMode::new(
                native_mode.size,
                native_mode.refresh_rate,
                native_mode.interlaced,
                is_native,
                ui_scale,
                native_mode.device_scale_factor,
            )
            .with_default(is_native)
        })
        .collect()
}

/// Per-panel scale inside a unified desktop, kept as an exact ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScaleRatio {
    pub num: i32,
    pub den: i32,
}

impl ScaleRatio {
    /// Reduced ratio `num / den`
    pub fn new(num: i32, den: i32) -> Self {
        let divisor = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1) as i32;
        Self {
            num: num / divisor,
            den: den / divisor,
        }
    }

    pub fn as_f32(&self) -> f32 {
        self.num as f32 / self.den as f32
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Synthetic resolutions for the unified desktop
///
/// One entry per distinct (device scale factor, panel scale) pair, each the
/// native canvas scaled by that panel's ratio, sorted by DIP width.
pub fn unified_mode_list(
    native_mode: &DisplayMode,
    dsf_scale_list: &[(f32, ScaleRatio)],
) -> Vec<DisplayMode> {
    let mut modes: Vec<DisplayMode> = dsf_scale_list
        .iter()
        .map(|(dsf, scale)| {
            DisplayMode::new(
                native_mode.size.scale_ratio_floored(scale.num, scale.den),
                native_mode.refresh_rate,
                native_mode.interlaced,
                false,
                native_mode.ui_scale,
                *dsf,
            )
        })
        .collect();
    modes.sort_by_key(|mode| mode.size_in_dip(false).width);
    modes
}

fn next_mode(modes: &[DisplayMode], index: usize, up: bool) -> Option<DisplayMode> {
    if modes.is_empty() || index >= modes.len() {
        return None;
    }
    let mut new_index = index;
    if up && index + 1 < modes.len() {
        new_index += 1;
    } else if !up && index != 0 {
        new_index -= 1;
    }
    modes.get(new_index).copied()
}

/// Next UI scale step for the internal panel
pub fn mode_for_next_ui_scale(record: &PhysicalDisplayRecord, up: bool) -> Option<DisplayMode> {
    let index = record
        .display_modes
        .iter()
        .position(|mode| approx_eq(mode.ui_scale, record.configured_ui_scale))?;
    next_mode(&record.display_modes, index, up)
}

/// Next resolution step for an external or unified display
pub fn mode_for_next_resolution(record: &PhysicalDisplayRecord, up: bool) -> Option<DisplayMode> {
    if record.is_internal {
        return None;
    }
    let current = DisplayMode::new(
        record.size_in_pixel,
        0.0,
        false,
        false,
        1.0,
        record.device_scale_factor,
    );
    let resolution = current.size_in_dip(false);
    let index = record
        .display_modes
        .iter()
        .position(|mode| mode.size_in_dip(false) == resolution)?;
    next_mode(&record.display_modes, index, up)
}

/// Per-display selected modes
#[derive(Debug, Default)]
pub struct ModeSelector {
    selected: HashMap<DisplayId, DisplayMode>,
}

impl ModeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `requested` against the record's candidates and apply it
    ///
    /// `record` is a working copy; on error it is left untouched. When
    /// `ui_scaling` is set (the internal panel) only the configured UI scale is
    /// updated. Otherwise the selection is remembered and the DSF copied over.
    pub fn select_mode(
        &mut self,
        record: &mut PhysicalDisplayRecord,
        requested: &DisplayMode,
        ui_scaling: bool,
    ) -> Result<ModeChange> {
        let Some(index) = find_display_mode(&record.display_modes, requested) else {
            warn!(
                "Unsupported display mode was requested for {}: size={}, ui scale={}, scale factor={}",
                record.id, requested.size, requested.ui_scale, requested.device_scale_factor
            );
            return Err(DisplayError::UnsupportedMode {
                display_id: record.id,
                mode: requested.to_string(),
            });
        };
        let candidate = record.display_modes[index];
        let mut change = ModeChange::default();

        if ui_scaling {
            if !approx_eq(record.configured_ui_scale, candidate.ui_scale) {
                record.configured_ui_scale = candidate.ui_scale;
                change.property_changed = true;
            }
            return Ok(change);
        }

        self.selected.insert(record.id, candidate);
        if record.bounds_in_native.size() != candidate.size {
            change.resolution_changed = true;
        }
        if !approx_eq(record.device_scale_factor, candidate.device_scale_factor) {
            record.device_scale_factor = candidate.device_scale_factor;
            change.property_changed = true;
        }
        debug!("Selected {} for display {} ({:?})", candidate, record.id, change);
        Ok(change)
    }

    /// Explicitly selected mode, if any
    pub fn selected_mode(&self, id: DisplayId) -> Option<DisplayMode> {
        self.selected.get(&id).copied()
    }

    /// Remember a mode without validation (persisted state)
    pub fn set_selected_mode(&mut self, id: DisplayId, mode: DisplayMode) {
        self.selected.insert(id, mode);
    }

    pub fn forget(&mut self, id: DisplayId) {
        self.selected.remove(&id);
    }

    /// Mode in effect for a display
    ///
    /// The selected mode wins. Otherwise the UI-scaling panel reports the mode
    /// matching its configured UI scale and other displays their native mode.
    pub fn active_mode(
        &self,
        record: &PhysicalDisplayRecord,
        ui_scaling: bool,
    ) -> Option<DisplayMode> {
        if let Some(selected) = self.selected_mode(record.id) {
            return Some(selected);
        }
        record.display_modes.iter().copied().find(|mode| {
            if ui_scaling {
                approx_eq(record.configured_ui_scale, mode.ui_scale)
            } else {
                mode.native
            }
        })
    }

    /// Bring a selection in line with what hardware actually applied
    ///
    /// Resolution requests can fail; if nothing in the candidate list matches
    /// the reported size the selection is dropped.
    pub fn sync_with_hardware(&mut self, record: &PhysicalDisplayRecord) {
        if record.display_modes.is_empty() {
            return;
        }
        let applied = DisplayMode::new(
            record.bounds_in_native.size(),
            0.0,
            false,
            false,
            record.configured_ui_scale,
            record.device_scale_factor,
        );
        match record
            .display_modes
            .iter()
            .find(|mode| mode.matches_resolution(&applied))
        {
            None => {
                if self.selected.remove(&record.id).is_some() {
                    debug!("Dropped selected mode for {}: hardware applied {}", record.id, applied.size);
                }
            }
            Some(mode) => {
                if let Some(selected) = self.selected.get_mut(&record.id) {
                    *selected = *mode;
                }
            }
        }
    }
}
