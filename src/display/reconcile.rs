//! Reconciler
//!
//! Diffs the previous and new active display lists (both ascending by id) and
//! produces the removed/added/changed sets that drive observer notifications.

use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::info::approx_eq;
use super::logical::LogicalDisplay;
use super::observer::DisplayEvent;
use super::DisplayId;

/// Which properties of a display changed
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMetric {
    Bounds = 0b0_0001,
    WorkArea = 0b0_0010,
    DeviceScaleFactor = 0b0_0100,
    Rotation = 0b0_1000,
    Primary = 0b1_0000,
}

/// Outcome of one diff
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileResult {
    /// Owned snapshots of displays that left the active set, ascending by id
    pub removed: Vec<LogicalDisplay>,
    /// Displays that joined the active set, ascending by id
    pub added: Vec<LogicalDisplay>,
    /// Displays present in both lists whose properties changed
    pub changed: BTreeMap<DisplayId, BitFlags<DisplayMetric>>,
    /// Primary moved to a display with no other change
    pub primary_changed: Option<(LogicalDisplay, BitFlags<DisplayMetric>)>,
}

impl ReconcileResult {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
            && self.added.is_empty()
            && self.changed.is_empty()
            && self.primary_changed.is_none()
    }

    /// Focus should be cleared unless this is a one-for-one swap
    pub fn clear_focus(&self) -> bool {
        !self.removed.is_empty() && !(self.removed.len() == 1 && self.added.len() == 1)
    }

    /// Fold a primary-display change into the result
    ///
    /// The primary flag is OR'd into the new primary's changed entry. Without
    /// such an entry a separate event is recorded, carrying bounds and scale
    /// flags when those differ from the old primary. Nothing happens when there
    /// was no valid primary before.
    pub fn apply_primary_change(
        &mut self,
        old_primary: &LogicalDisplay,
        new_primary: &LogicalDisplay,
    ) {
        if !old_primary.is_valid() || !new_primary.is_valid() || old_primary.id == new_primary.id {
            return;
        }
        if let Some(metrics) = self.changed.get_mut(&new_primary.id) {
            *metrics |= DisplayMetric::Primary;
            return;
        }
        let mut metrics = BitFlags::from(DisplayMetric::Primary);
        if old_primary.size() != new_primary.size() {
            metrics |= DisplayMetric::Bounds | DisplayMetric::WorkArea;
        }
        if !approx_eq(old_primary.device_scale_factor, new_primary.device_scale_factor) {
            metrics |= DisplayMetric::DeviceScaleFactor;
        }
        self.primary_changed = Some((new_primary.clone(), metrics));
    }

    /// Events in delivery order: removed, added, changed, then primary
    ///
    /// `current` is the new active list the changed ids are looked up in.
    pub fn events(&self, current: &[LogicalDisplay]) -> Vec<DisplayEvent> {
        let mut events = Vec::with_capacity(
            self.removed.len() + self.added.len() + self.changed.len() + 1,
        );
        events.extend(self.removed.iter().cloned().map(DisplayEvent::Removed));
        events.extend(self.added.iter().cloned().map(DisplayEvent::Added));
        for (id, metrics) in &self.changed {
            if let Some(display) = current.iter().find(|display| display.id == *id) {
                events.push(DisplayEvent::MetricsChanged {
                    display: display.clone(),
                    metrics: *metrics,
                });
            }
        }
        if let Some((display, metrics)) = &self.primary_changed {
            events.push(DisplayEvent::MetricsChanged {
                display: display.clone(),
                metrics: *metrics,
            });
        }
        events
    }
}

/// Properties that differ between two snapshots of the same display
pub fn changed_metrics(old: &LogicalDisplay, new: &LogicalDisplay) -> BitFlags<DisplayMetric> {
    let mut metrics = BitFlags::empty();
    if old.bounds != new.bounds
        || old.native_bounds != new.native_bounds
        || old.overscan_insets != new.overscan_insets
    {
        metrics |= DisplayMetric::Bounds | DisplayMetric::WorkArea;
    } else if old.work_area != new.work_area {
        metrics |= DisplayMetric::WorkArea;
    }
    if !approx_eq(old.device_scale_factor, new.device_scale_factor) {
        metrics |= DisplayMetric::DeviceScaleFactor;
    }
    if old.rotation != new.rotation {
        metrics |= DisplayMetric::Rotation;
    }
    metrics
}

/// Merge two id-sorted lists into removed/added/changed sets
pub fn reconcile(old: &[LogicalDisplay], new: &[LogicalDisplay]) -> ReconcileResult {
    debug_assert!(old.windows(2).all(|pair| pair[0].id < pair[1].id));
    debug_assert!(new.windows(2).all(|pair| pair[0].id < pair[1].id));

    let mut result = ReconcileResult::default();
    let mut old_iter = old.iter().peekable();
    let mut new_iter = new.iter().peekable();

    loop {
        match (old_iter.peek(), new_iter.peek()) {
            (None, None) => break,
            (Some(_), None) => result.removed.extend(old_iter.by_ref().cloned()),
            (None, Some(_)) => result.added.extend(new_iter.by_ref().cloned()),
            (Some(current), Some(next)) => match current.id.cmp(&next.id) {
                Ordering::Equal => {
                    let metrics = changed_metrics(current, next);
                    if !metrics.is_empty() {
                        result.changed.insert(next.id, metrics);
                    }
                    old_iter.next();
                    new_iter.next();
                }
                Ordering::Less => {
                    result.removed.push((*current).clone());
                    old_iter.next();
                }
                Ordering::Greater => {
                    result.added.push((*next).clone());
                    new_iter.next();
                }
            },
        }
    }
    result
}
