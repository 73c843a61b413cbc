//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - CLI arguments
//!
//! Besides engine settings, the file carries persisted per-display state and
//! layouts that are restored into the manager before the first hardware event.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::display::{
    parse_display_spec_list, DisplayIdList, DisplayManager, DisplayManagerOptions,
    DisplayProperties, Rotation, SyntheticIdAllocator,
};

pub mod types;

pub use types::{
    DisplayPropertiesConfig, DisplaySettings, LayoutConfig, LoggingConfig, PlacementConfig,
};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Display engine settings
    #[serde(default)]
    pub display: DisplaySettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Persisted per-display properties
    #[serde(default)]
    pub displays: Vec<DisplayPropertiesConfig>,
    /// Persisted layouts
    #[serde(default)]
    pub layouts: Vec<LayoutConfig>,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Config {
            display: DisplaySettings::default(),
            logging: LoggingConfig::default(),
            displays: Vec::new(),
            layouts: Vec::new(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        if self.display.minimum_overlap < 0 {
            anyhow::bail!(
                "minimum_overlap cannot be negative: {}",
                self.display.minimum_overlap
            );
        }

        // Parse once to surface spec errors at startup rather than at bootstrap
        parse_display_spec_list(
            &self.display.host_window_bounds,
            &mut SyntheticIdAllocator::new(),
        )
        .with_context(|| {
            format!(
                "Invalid host_window_bounds: {:?}",
                self.display.host_window_bounds
            )
        })?;

        for display in &self.displays {
            if Rotation::from_degrees(display.rotation).is_none() {
                anyhow::bail!(
                    "Invalid rotation {} for display {}",
                    display.rotation,
                    display.id
                );
            }
        }

        for layout in &self.layouts {
            validate_layout(layout)?;
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, displays: Option<String>, unified: bool) -> Self {
        if let Some(spec) = displays {
            self.display.host_window_bounds = spec;
        }
        if unified {
            self.display.unified_desktop_enabled = true;
        }
        self
    }

    /// Convert display settings into manager options
    pub fn to_manager_options(&self) -> DisplayManagerOptions {
        DisplayManagerOptions {
            unified_desktop_enabled: self.display.unified_desktop_enabled,
            first_display_as_internal: self.display.first_display_as_internal,
            internal_display_id: self.display.internal_display_id,
            configure_displays: self.display.configure_displays,
            software_mirroring: self.display.software_mirroring,
            default_position: self.display.default_placement.position,
            default_offset: self.display.default_placement.offset,
            minimum_overlap: self.display.minimum_overlap,
        }
    }

    /// Restore persisted displays and layouts into a manager
    pub fn restore_into(&self, manager: &mut DisplayManager) {
        for display in &self.displays {
            let properties = DisplayProperties {
                rotation: Rotation::from_degrees(display.rotation).unwrap_or_default(),
                ui_scale: display.ui_scale,
                overscan_insets: display.overscan,
                resolution_in_pixels: display.resolution.unwrap_or_default(),
                device_scale_factor: display.device_scale_factor,
                color_profile: display.color_profile,
                touch_calibration: display.touch_calibration,
            };
            manager.register_display_property(display.id, &properties);
        }

        for layout in &self.layouts {
            let ids = DisplayIdList::new(layout.ids.iter().copied());
            manager
                .layout_store_mut()
                .register_layout(&ids, layout.to_layout());
        }
    }
}

fn validate_layout(layout: &LayoutConfig) -> Result<()> {
    if layout.ids.len() < 2 {
        anyhow::bail!("Layout needs at least two displays: {:?}", layout.ids);
    }

    let ids: HashSet<_> = layout.ids.iter().copied().collect();
    if ids.len() != layout.ids.len() {
        anyhow::bail!("Layout has duplicate display ids: {:?}", layout.ids);
    }

    if !ids.contains(&layout.primary_id) {
        anyhow::bail!(
            "Layout primary {} is not one of {:?}",
            layout.primary_id,
            layout.ids
        );
    }

    for placement in &layout.placements {
        if !ids.contains(&placement.display_id) || !ids.contains(&placement.parent_display_id) {
            anyhow::bail!(
                "Placement {} -> {} refers to a display outside {:?}",
                placement.display_id,
                placement.parent_display_id,
                layout.ids
            );
        }
    }

    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
