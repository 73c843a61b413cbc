//! External collaborators
//!
//! The manager never touches hardware or windows itself. It brackets every
//! configuration change through a [`DisplayDelegate`] and, when a real
//! configurator is present, forwards mode and color requests to a
//! [`DisplayConfigurator`].

use serde::{Deserialize, Serialize};
use tracing::info;

use super::info::{ColorProfile, PhysicalDisplayRecord};
use super::DisplayId;

/// Hardware-level state for two connected displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleDisplayState {
    DualMirror,
    DualExtended,
}

/// Window-system side of a configuration change
#[cfg_attr(test, mockall::automock)]
pub trait DisplayDelegate {
    /// Called before the active set changes
    fn pre_display_configuration_change(&mut self, clear_focus: bool);

    /// Called after every observer has been notified
    fn post_display_configuration_change(&mut self, must_clear_window: bool);

    /// (Re)build the software mirroring render target
    fn create_or_update_mirroring_display(&mut self, infos: &[PhysicalDisplayRecord]);

    /// Tear down the mirroring target before a new pass is computed
    fn close_mirroring_display_if_unnecessary(&mut self);
}

/// Hardware mode-setting backend
#[cfg_attr(test, mockall::automock)]
pub trait DisplayConfigurator {
    /// Returns false if the hardware rejected the profile
    fn set_color_calibration_profile(&mut self, display_id: DisplayId, profile: ColorProfile)
        -> bool;

    /// A selected resolution changed; re-run mode setting
    fn on_configuration_changed(&mut self);

    /// Switch between hardware mirroring and extended output
    fn set_display_state(&mut self, state: MultipleDisplayState);
}

/// Delegate that only logs, for headless runs
#[derive(Debug, Default)]
pub struct LoggingDelegate {
    mirroring_targets: usize,
}

impl LoggingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of displays the last mirroring target was built for
    pub fn mirroring_targets(&self) -> usize {
        self.mirroring_targets
    }
}

impl DisplayDelegate for LoggingDelegate {
    fn pre_display_configuration_change(&mut self, clear_focus: bool) {
        info!(clear_focus, "Display configuration change starting");
    }

    fn post_display_configuration_change(&mut self, must_clear_window: bool) {
        info!(must_clear_window, "Display configuration change finished");
    }

    fn create_or_update_mirroring_display(&mut self, infos: &[PhysicalDisplayRecord]) {
        let ids: Vec<DisplayId> = infos.iter().map(|info| info.id).collect();
        info!("Mirroring display target for {:?}", ids);
        self.mirroring_targets = infos.len();
    }

    fn close_mirroring_display_if_unnecessary(&mut self) {
        if self.mirroring_targets > 0 {
            info!("Closing mirroring display target");
        }
        self.mirroring_targets = 0;
    }
}
