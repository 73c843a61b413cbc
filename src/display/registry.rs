//! Display Registry
//!
//! Authoritative map of physical display id to its latest snapshot. Records are
//! created or merged by hardware events and by persisted-property restoration,
//! and are never removed.

use std::collections::HashMap;
use tracing::{debug, warn};

use super::geometry::{Insets, Rect, Size};
use super::info::{
    ColorProfile, DisplayMode, PhysicalDisplayRecord, Rotation, RotationSource,
    TouchCalibrationData,
};
use super::{DisplayId, UNIFIED_DISPLAY_ID};

/// Valid range for a persisted UI scale
pub const MIN_UI_SCALE: f32 = 0.5;
pub const MAX_UI_SCALE: f32 = 2.0;

/// Persisted per-display state, restorable without live hardware
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayProperties {
    pub rotation: Rotation,
    pub ui_scale: f32,
    pub overscan_insets: Option<Insets>,
    /// Empty when no resolution was persisted
    pub resolution_in_pixels: Size,
    pub device_scale_factor: f32,
    pub color_profile: ColorProfile,
    pub touch_calibration: Option<TouchCalibrationData>,
}

/// Owner of every [`PhysicalDisplayRecord`]
#[derive(Debug, Default)]
pub struct DisplayRegistry {
    records: HashMap<DisplayId, PhysicalDisplayRecord>,
    internal_display_id: Option<DisplayId>,
}

impl DisplayRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Designate the internal panel
    pub fn set_internal_display_id(&mut self, id: Option<DisplayId>) {
        self.internal_display_id = id;
        for (record_id, record) in self.records.iter_mut() {
            record.is_internal = Some(*record_id) == id;
        }
    }

    pub fn internal_display_id(&self) -> Option<DisplayId> {
        self.internal_display_id
    }

    pub fn is_internal(&self, id: DisplayId) -> bool {
        self.internal_display_id == Some(id)
    }

    /// Insert a new record or merge onto the existing one
    ///
    /// A freshly created internal FHD panel at DSF 1.25 gets a UI scale of 0.8
    /// so it renders at 1.25; later updates leave the UI scale alone.
    pub fn upsert(&mut self, record: &PhysicalDisplayRecord) -> &PhysicalDisplayRecord {
        let is_internal = self.is_internal(record.id);
        let entry = match self.records.entry(record.id) {
            std::collections::hash_map::Entry::Occupied(occupied) => {
                let existing = occupied.into_mut();
                existing.copy_from(record);
                existing
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                let mut created = record.clone();
                created.is_native = false;
                if created.clear_overscan_insets {
                    created.overscan_insets_in_dip = Insets::default();
                }
                if is_internal
                    && record.bounds_in_native.height == 1080
                    && super::info::approx_eq(record.device_scale_factor, 1.25)
                {
                    debug!("Defaulting UI scale to 0.8 for FHD internal display {}", record.id);
                    created.configured_ui_scale = 0.8;
                }
                debug!("Registered display {}", record.id);
                vacant.insert(created)
            }
        };
        entry.is_internal = is_internal;
        entry.clear_overscan_insets = false;
        entry.update_display_size();
        entry
    }

    pub fn get(&self, id: DisplayId) -> Option<&PhysicalDisplayRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: DisplayId) -> Option<&mut PhysicalDisplayRecord> {
        self.records.get_mut(&id)
    }

    pub fn contains(&self, id: DisplayId) -> bool {
        self.records.contains_key(&id)
    }

    /// Get the record, creating an empty one if the id is unknown
    pub fn get_or_create(&mut self, id: DisplayId) -> &mut PhysicalDisplayRecord {
        let is_internal = self.is_internal(id);
        self.records.entry(id).or_insert_with(|| {
            let mut record = PhysicalDisplayRecord::new(id, String::new(), false);
            record.is_internal = is_internal;
            record
        })
    }

    /// Number of known displays, connected or not
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Restore persisted properties
    ///
    /// Returns the selected mode implied by a persisted resolution, if any.
    /// Rotation is forced to 0 for the unified display and UI scales outside
    /// [0.5, 2.0] are ignored.
    pub fn register_properties(
        &mut self,
        id: DisplayId,
        properties: &DisplayProperties,
    ) -> Option<DisplayMode> {
        let is_internal = self.is_internal(id);
        let record = self.get_or_create(id);

        let rotation = if id == UNIFIED_DISPLAY_ID {
            Rotation::Rotate0
        } else {
            properties.rotation
        };
        record.set_rotation(rotation, RotationSource::User);
        record.set_rotation(rotation, RotationSource::Active);
        record.color_profile = properties.color_profile;

        if (MIN_UI_SCALE..=MAX_UI_SCALE).contains(&properties.ui_scale) {
            record.configured_ui_scale = properties.ui_scale;
        } else {
            warn!(
                "Ignoring out-of-range UI scale {} for display {}",
                properties.ui_scale, id
            );
        }
        if let Some(insets) = properties.overscan_insets {
            record.set_overscan_insets(insets);
        }
        if let Some(calibration) = properties.touch_calibration {
            record.touch_calibration = Some(calibration);
        }

        if properties.resolution_in_pixels.is_empty() {
            return None;
        }
        if is_internal {
            warn!("Ignoring persisted resolution for internal display {}", id);
            return None;
        }
        // 60 Hz until the next hardware event reports the real timing
        Some(DisplayMode::new(
            properties.resolution_in_pixels,
            60.0,
            false,
            false,
            1.0,
            properties.device_scale_factor,
        ))
    }

    /// Keep the internal panel's record around while it is disconnected
    ///
    /// Creates an 800x600 placeholder if the panel was never seen, otherwise
    /// resets its active rotation to the user preference so it comes back the
    /// way the user left it.
    pub fn retain_disconnected_internal(&mut self, internal_name: &str) {
        let Some(internal_id) = self.internal_display_id else {
            return;
        };
        match self.records.get_mut(&internal_id) {
            Some(record) => {
                let user_rotation = record.rotation(RotationSource::User);
                record.set_rotation(user_rotation, RotationSource::User);
            }
            None => {
                let mut record = PhysicalDisplayRecord::new(internal_id, internal_name, false);
                record.is_internal = true;
                record.set_bounds(Rect::new(0, 0, 800, 600));
                debug!("Created placeholder for disconnected internal display {}", internal_id);
                self.records.insert(internal_id, record);
            }
        }
    }

    /// Iterate all records
    pub fn iter(&self) -> impl Iterator<Item = &PhysicalDisplayRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_record(id: DisplayId, width: i32, height: i32, dsf: f32) -> PhysicalDisplayRecord {
        let mut record = PhysicalDisplayRecord::new(id, format!("Display {}", id), false);
        record.device_scale_factor = dsf;
        record.set_bounds(Rect::new(0, 0, width, height));
        record.is_native = true;
        record
    }

    #[test]
    fn test_upsert_inserts_and_merges() {
        let mut registry = DisplayRegistry::new();
        registry.upsert(&native_record(1, 1920, 1080, 1.0));
        assert_eq!(registry.len(), 1);
        assert!(!registry.get(1).map(|r| r.is_native).unwrap_or(true));

        registry.upsert(&native_record(1, 2560, 1440, 1.0));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(1).map(|r| r.size_in_pixel),
            Some(Size::new(2560, 1440))
        );
    }

    #[test]
    fn test_missing_lookup_is_none() {
        let registry = DisplayRegistry::new();
        assert!(registry.get(42).is_none());
    }

    #[test]
    fn test_fhd_125_internal_defaults_ui_scale_once() {
        let mut registry = DisplayRegistry::new();
        registry.set_internal_display_id(Some(7));
        registry.upsert(&native_record(7, 1920, 1080, 1.25));
        assert_eq!(registry.get(7).map(|r| r.configured_ui_scale), Some(0.8));

        // A later preference change is not overridden by the heuristic
        let mut changed = registry.get(7).cloned().expect("record");
        changed.configured_ui_scale = 1.0;
        changed.is_native = false;
        registry.upsert(&changed);
        assert_eq!(registry.get(7).map(|r| r.configured_ui_scale), Some(1.0));
    }

    #[test]
    fn test_fhd_125_external_keeps_ui_scale() {
        let mut registry = DisplayRegistry::new();
        registry.upsert(&native_record(8, 1920, 1080, 1.25));
        assert_eq!(registry.get(8).map(|r| r.configured_ui_scale), Some(1.0));
    }

    #[test]
    fn test_register_properties_clamps_ui_scale() {
        let mut registry = DisplayRegistry::new();
        let properties = DisplayProperties {
            rotation: Rotation::Rotate90,
            ui_scale: 3.5,
            ..Default::default()
        };
        let mode = registry.register_properties(3, &properties);
        assert!(mode.is_none());
        let record = registry.get(3).expect("created");
        assert_eq!(record.configured_ui_scale, 1.0);
        assert_eq!(record.user_rotation, Rotation::Rotate90);
        assert_eq!(record.active_rotation, Rotation::Rotate90);
    }

    #[test]
    fn test_register_properties_resolution_yields_mode() {
        let mut registry = DisplayRegistry::new();
        let properties = DisplayProperties {
            ui_scale: 1.0,
            resolution_in_pixels: Size::new(1280, 720),
            device_scale_factor: 1.0,
            ..Default::default()
        };
        let mode = registry.register_properties(3, &properties).expect("mode");
        assert_eq!(mode.size, Size::new(1280, 720));
        assert_eq!(mode.refresh_rate, 60.0);
    }

    #[test]
    fn test_unified_rotation_forced_to_zero() {
        let mut registry = DisplayRegistry::new();
        let properties = DisplayProperties {
            rotation: Rotation::Rotate270,
            ui_scale: 1.0,
            ..Default::default()
        };
        registry.register_properties(UNIFIED_DISPLAY_ID, &properties);
        assert_eq!(
            registry.get(UNIFIED_DISPLAY_ID).map(|r| r.active_rotation),
            Some(Rotation::Rotate0)
        );
    }

    #[test]
    fn test_disconnected_internal_placeholder() {
        let mut registry = DisplayRegistry::new();
        registry.set_internal_display_id(Some(11));
        registry.retain_disconnected_internal("Internal Display");
        let record = registry.get(11).expect("placeholder");
        assert_eq!(record.bounds_in_native, Rect::new(0, 0, 800, 600));
        assert!(record.is_internal);
    }
}
