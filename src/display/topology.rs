//! Topology Builder
//!
//! Turns the connected physical records plus the requested multi-display mode
//! into the ordered list of logical displays that observers see.
//!
//! Mirrored and unified modes both go through "software mirroring": the
//! displays that are not part of the visible active set are still described as
//! logical displays so an external renderer can draw into them.
//!
//! ```text
//!  Extended            Mirrored                 Unified
//!  ┌────┐┌────┐        ┌────┐  ┌ ─ ─┐           ┌──────────────┐
//!  │ 1  ││ 2  │        │ 1  │   ╎ 2 ╎ target    │   -10        │
//!  └────┘└────┘        └────┘  └ ─ ─┘           ├──────┬───────┤
//!  active: 1, 2        active: 1                │  1   │   2   │ mirroring
//!                      mirroring: 2             └──────┴───────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use super::geometry::{Point, Rect, Size};
use super::info::{approx_eq, DisplayMode, PhysicalDisplayRecord};
use super::layout::{DisplayIdList, Layout, LayoutStore};
use super::logical::LogicalDisplay;
use super::mode::{find_display_mode, unified_mode_list, ModeSelector, ScaleRatio};
use super::registry::DisplayRegistry;
use super::{DisplayId, INVALID_DISPLAY_ID, UNIFIED_DISPLAY_ID};

/// Name given to the synthetic unified display record
pub const UNIFIED_DISPLAY_NAME: &str = "Unified Desktop";

/// Requested composition of multiple displays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiDisplayMode {
    #[default]
    Extended,
    Mirrored,
    Unified,
}

impl fmt::Display for MultiDisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extended => write!(f, "extended"),
            Self::Mirrored => write!(f, "mirrored"),
            Self::Unified => write!(f, "unified"),
        }
    }
}

/// Composition actually produced for the current set of displays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResolvedMode {
    #[default]
    Extended,
    Mirrored {
        source_id: DisplayId,
        target_id: DisplayId,
    },
    Unified {
        synthetic_id: DisplayId,
        contributing_ids: Vec<DisplayId>,
    },
}

impl ResolvedMode {
    pub fn is_unified(&self) -> bool {
        matches!(self, Self::Unified { .. })
    }

    /// Software mirror target, if any
    pub fn mirroring_target(&self) -> Option<DisplayId> {
        match self {
            Self::Mirrored { target_id, .. } => Some(*target_id),
            _ => None,
        }
    }
}

/// Output of one topology pass
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub resolved: ResolvedMode,
    /// Active displays, ascending by id, positioned by the layout
    pub displays: Vec<LogicalDisplay>,
    /// Displays drawn by the external mirroring renderer, not part of the active set
    pub software_mirroring_displays: Vec<LogicalDisplay>,
    /// Layout applied to `displays`, when more than one is active
    pub resolved_layout: Option<Layout>,
}

/// Inputs that stay fixed for one pass
#[derive(Debug, Clone, Copy)]
pub struct TopologyRequest {
    pub mode: MultiDisplayMode,
    /// First display reported by the last hardware event
    pub first_display_id: Option<DisplayId>,
    /// Shared-edge overlap enforced when applying layouts
    pub minimum_overlap: i32,
}

/// Logical display for an active physical record, at origin (0, 0)
pub fn create_display_from_record(record: &PhysicalDisplayRecord) -> LogicalDisplay {
    let mut display = LogicalDisplay::new(record.id);
    display.set_scale_and_bounds(
        record.effective_device_scale_factor(),
        Rect::from_size(record.size_in_pixel),
    );
    display.rotation = record.active_rotation;
    display.touch_support = record.touch_support;
    display.maximum_cursor_size = record.maximum_cursor_size;
    display.native_bounds = record.bounds_in_native;
    display.overscan_insets = record.overscan_insets_in_pixel();
    display
}

/// Logical display for a mirroring render target, at 1:1 scale
pub fn create_mirroring_display(
    record: &PhysicalDisplayRecord,
    origin: Point,
    size: Size,
) -> LogicalDisplay {
    let mut display = LogicalDisplay::new(record.id);
    display.set_scale_and_bounds(1.0, Rect::from_origin_size(origin, size));
    display.touch_support = record.touch_support;
    display.maximum_cursor_size = record.maximum_cursor_size;
    display.native_bounds = record.bounds_in_native;
    display
}

/// Build the active logical displays for one pass
///
/// Every record in `infos` is merged into the registry. In mirrored mode the
/// target record is pulled out of the active set; in unified mode all records
/// are replaced by one synthetic record. Work-area insets are carried over
/// from `previous` displays with the same id, then the layout for the
/// resulting id set is applied.
pub fn build_topology(
    request: &TopologyRequest,
    mut infos: Vec<PhysicalDisplayRecord>,
    previous: &[LogicalDisplay],
    registry: &mut DisplayRegistry,
    selector: &mut ModeSelector,
    layouts: &mut LayoutStore,
) -> Topology {
    infos.sort_by_key(|info| info.id);

    let (resolved, software_mirroring_displays) = match request.mode {
        MultiDisplayMode::Extended => (ResolvedMode::Extended, Vec::new()),
        MultiDisplayMode::Mirrored => {
            build_software_mirror(&mut infos, request.first_display_id, registry)
        }
        MultiDisplayMode::Unified => build_unified(&mut infos, registry, selector),
    };

    let mut displays: Vec<LogicalDisplay> = infos
        .iter()
        .map(|info| create_display_from_record(registry.upsert(info)))
        .collect();
    displays.sort_by_key(|display| display.id);

    for display in displays.iter_mut() {
        if let Some(old) = previous.iter().find(|old| old.id == display.id) {
            display.update_work_area_from_insets(&old.work_area_insets());
        }
    }

    let mut resolved_layout = None;
    if displays.len() > 1 && !resolved.is_unified() {
        let ids = DisplayIdList::new(displays.iter().map(|display| display.id));
        let layout = layouts.get_layout(&ids).clone();
        if layout.primary_id != INVALID_DISPLAY_ID {
            layout.apply_to_displays(&mut displays, request.minimum_overlap);
            resolved_layout = Some(layout);
        }
    }

    debug!(
        "Topology {:?}: {} active, {} mirroring",
        resolved,
        displays.len(),
        software_mirroring_displays.len()
    );

    Topology {
        resolved,
        displays,
        software_mirroring_displays,
        resolved_layout,
    }
}

/// Pick the mirror target and describe it as a 1:1 render target
///
/// Needs exactly two displays; otherwise the pass stays extended.
fn build_software_mirror(
    infos: &mut Vec<PhysicalDisplayRecord>,
    first_display_id: Option<DisplayId>,
    registry: &mut DisplayRegistry,
) -> (ResolvedMode, Vec<LogicalDisplay>) {
    if infos.len() != 2 {
        debug!("Mirroring needs two displays, have {}", infos.len());
        return (ResolvedMode::Extended, Vec::new());
    }

    let zero_is_source =
        first_display_id == Some(infos[0].id) || registry.is_internal(infos[0].id);
    let target_index = if zero_is_source { 1 } else { 0 };
    let source_id = infos[1 - target_index].id;

    let mut target = infos.remove(target_index);
    target.set_overscan_insets(Default::default());
    target.clear_overscan_insets = true;
    let record = registry.upsert(&target);
    let mirror = create_mirroring_display(record, Point::default(), record.size_in_pixel);

    (
        ResolvedMode::Mirrored {
            source_id,
            target_id: target.id,
        },
        vec![mirror],
    )
}

/// Replace the records with one synthetic display spanning all of them
///
/// Panels are scaled to the tallest one and placed left to right. Widths use
/// exact integer ratios with floor so a panel never gains a pixel.
fn build_unified(
    infos: &mut Vec<PhysicalDisplayRecord>,
    registry: &mut DisplayRegistry,
    selector: &mut ModeSelector,
) -> (ResolvedMode, Vec<LogicalDisplay>) {
    if infos.len() < 2 {
        debug!("Unified desktop needs two displays, have {}", infos.len());
        return (ResolvedMode::Extended, Vec::new());
    }

    // 1st pass: merge records, find the tallest panel and the default height
    let records: Vec<PhysicalDisplayRecord> =
        infos.iter().map(|info| registry.upsert(info).clone()).collect();
    let max_height = records
        .iter()
        .map(|record| record.size_in_pixel.height)
        .max()
        .unwrap_or(0)
        .max(1);
    let default_record = records
        .iter()
        .find(|record| registry.is_internal(record.id))
        .unwrap_or(&records[0]);
    let default_height = default_record.size_in_pixel.height;
    let default_dsf = default_record.device_scale_factor;

    // 2nd pass: unified canvas and the distinct (dsf, scale) pairs
    let mut unified_bounds = Rect::default();
    let mut dsf_scale_list: Vec<(f32, ScaleRatio)> = Vec::new();
    for record in &records {
        let height = record.size_in_pixel.height.max(1);
        let size = record.size_in_pixel.scale_ratio_floored(max_height, height);
        let origin = Point::new(unified_bounds.right(), 0);
        unified_bounds = unified_bounds.union(&Rect::from_origin_size(origin, size));

        let scale = ScaleRatio::new(height, max_height);
        let seen = dsf_scale_list
            .iter()
            .any(|(dsf, ratio)| approx_eq(*dsf, record.device_scale_factor) && *ratio == scale);
        if !seen {
            dsf_scale_list.push((record.device_scale_factor, scale));
        }
    }

    let native_mode = DisplayMode::new(unified_bounds.size(), 60.0, false, true, 1.0, 1.0);
    let mut modes = unified_mode_list(&native_mode, &dsf_scale_list);
    let default_index = match modes.iter().position(|mode| {
        mode.size.height == default_height && approx_eq(mode.device_scale_factor, default_dsf)
    }) {
        Some(index) => index,
        None => {
            warn!(
                "No unified mode matches height {} at scale {}, using the largest",
                default_height, default_dsf
            );
            modes.len().saturating_sub(1)
        }
    };

    let mut unified = PhysicalDisplayRecord::new(UNIFIED_DISPLAY_ID, UNIFIED_DISPLAY_NAME, false);
    if let Some(default_mode) = modes.get_mut(default_index) {
        *default_mode = default_mode.with_native(true).with_default(true);
        unified.device_scale_factor = default_mode.device_scale_factor;
        unified.set_bounds(Rect::from_size(default_mode.size));
    }
    unified.display_modes = modes;

    // A selection made against another canvas size is stale
    if let Some(existing) = registry.get(UNIFIED_DISPLAY_ID) {
        if existing.max_native_size() != unified_bounds.size() {
            selector.forget(UNIFIED_DISPLAY_ID);
        }
    }

    // 3rd pass: apply the selected mode, then size each panel to the canvas
    match selector.selected_mode(UNIFIED_DISPLAY_ID) {
        Some(selected) if find_display_mode(&unified.display_modes, &selected).is_some() => {
            unified.device_scale_factor = selected.device_scale_factor;
            unified.set_bounds(Rect::from_size(selected.size));
        }
        _ => selector.forget(UNIFIED_DISPLAY_ID),
    }

    let unified_height = unified.size_in_pixel.height;
    let mut origin = Point::default();
    let mut mirroring = Vec::with_capacity(records.len());
    for record in &records {
        let height = record.size_in_pixel.height.max(1);
        let size = record.size_in_pixel.scale_ratio_floored(unified_height, height);
        let mut display = create_mirroring_display(record, origin, size);
        display.update_work_area_from_insets(&Default::default());
        origin.offset(display.size().width, 0);
        mirroring.push(display);
    }

    let contributing_ids = records.iter().map(|record| record.id).collect();
    debug!("Unified desktop {} from {:?}", unified_bounds, contributing_ids);

    infos.clear();
    infos.push(unified);

    (
        ResolvedMode::Unified {
            synthetic_id: UNIFIED_DISPLAY_ID,
            contributing_ids,
        },
        mirroring,
    )
}
