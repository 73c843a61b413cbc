//! Layout Store
//!
//! Placement layouts keyed by the (order-insensitive) set of display ids they
//! apply to, so reconnecting the same set of panels reuses the arrangement the
//! user chose last time.
//!
//! A layout names one primary display at (0, 0) and places every other display
//! against a parent:
//!
//! ```text
//!            ┌────────┐
//!            │  TOP   │
//! ┌────────┬─┴────────┴─┬────────┐
//! │  LEFT  │  parent    │ RIGHT  │
//! └────────┴─┬────────┬─┴────────┘
//!            │ BOTTOM │
//!            └────────┘
//! ```
//!
//! The offset slides the child along the shared edge and is clamped so at
//! least `minimum_overlap` pixels stay shared.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

use super::geometry::Point;
use super::logical::LogicalDisplay;
use super::{DisplayId, INVALID_DISPLAY_ID};

/// Default shared-edge overlap enforced when an offset is too large
pub const MINIMUM_OVERLAP_FOR_INVALID_OFFSET: i32 = 100;

/// Sorted, de-duplicated set of display ids used as a layout key
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<DisplayId>", into = "Vec<DisplayId>")]
pub struct DisplayIdList(Vec<DisplayId>);

impl DisplayIdList {
    /// Build from any order; duplicates are dropped
    pub fn new(ids: impl IntoIterator<Item = DisplayId>) -> Self {
        let mut ids: Vec<DisplayId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    pub fn ids(&self) -> &[DisplayId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: DisplayId) -> bool {
        self.0.binary_search(&id).is_ok()
    }
}

impl From<Vec<DisplayId>> for DisplayIdList {
    fn from(ids: Vec<DisplayId>) -> Self {
        Self::new(ids)
    }
}

impl From<DisplayIdList> for Vec<DisplayId> {
    fn from(list: DisplayIdList) -> Self {
        list.0
    }
}

impl fmt::Display for DisplayIdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "[{}]", parts.join(","))
    }
}

/// Edge of the parent a display is attached to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Top,
    #[default]
    Right,
    Bottom,
    Left,
}

impl std::str::FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "right" => Ok(Self::Right),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            other => Err(format!("unknown position: {}", other)),
        }
    }
}

/// Where one non-primary display sits relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayPlacement {
    pub display_id: DisplayId,
    pub parent_display_id: DisplayId,
    pub position: Position,
    #[serde(default)]
    pub offset: i32,
}

impl DisplayPlacement {
    pub fn new(
        display_id: DisplayId,
        parent_display_id: DisplayId,
        position: Position,
        offset: i32,
    ) -> Self {
        Self {
            display_id,
            parent_display_id,
            position,
            offset,
        }
    }
}

/// Placement relationship for one set of display ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub primary_id: DisplayId,
    #[serde(default)]
    pub placement_list: Vec<DisplayPlacement>,
    #[serde(default)]
    pub mirrored: bool,
    #[serde(default = "default_unified")]
    pub default_unified: bool,
}

fn default_unified() -> bool {
    true
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            primary_id: INVALID_DISPLAY_ID,
            placement_list: Vec::new(),
            mirrored: false,
            default_unified: true,
        }
    }
}

impl Layout {
    /// Structural comparison of the placement data only
    pub fn has_same_placement_list(&self, other: &Layout) -> bool {
        self.primary_id == other.primary_id && self.placement_list == other.placement_list
    }

    /// Check that this layout fully and consistently covers `ids`
    pub fn validate(&self, ids: &DisplayIdList) -> bool {
        if !ids.contains(self.primary_id) {
            warn!("Layout primary {} not in {}", self.primary_id, ids);
            return false;
        }
        if self.placement_list.len() + 1 != ids.len() {
            warn!(
                "Layout has {} placements for {} displays",
                self.placement_list.len(),
                ids.len()
            );
            return false;
        }

        let mut seen = HashSet::new();
        for placement in &self.placement_list {
            if placement.display_id == self.primary_id
                || !ids.contains(placement.display_id)
                || !ids.contains(placement.parent_display_id)
                || placement.display_id == placement.parent_display_id
                || !seen.insert(placement.display_id)
            {
                warn!("Invalid placement {:?} for {}", placement, ids);
                return false;
            }
        }

        // Every placement must chain back to the primary
        let mut reachable: HashSet<DisplayId> = HashSet::from([self.primary_id]);
        loop {
            let before = reachable.len();
            for placement in &self.placement_list {
                if reachable.contains(&placement.parent_display_id) {
                    reachable.insert(placement.display_id);
                }
            }
            if reachable.len() == before {
                break;
            }
        }
        reachable.len() == ids.len()
    }

    /// Position every non-primary display against its parent
    ///
    /// The primary is moved to (0, 0). Work-area insets are preserved. Returns
    /// the ids whose bounds actually moved.
    pub fn apply_to_displays(
        &self,
        displays: &mut [LogicalDisplay],
        minimum_overlap: i32,
    ) -> Vec<DisplayId> {
        if displays.len() < 2 {
            return Vec::new();
        }
        let index: HashMap<DisplayId, usize> = displays
            .iter()
            .enumerate()
            .map(|(idx, display)| (display.id, idx))
            .collect();
        let Some(&primary_idx) = index.get(&self.primary_id) else {
            warn!("Primary {} is not among the displays, layout skipped", self.primary_id);
            return Vec::new();
        };

        let original: Vec<_> = displays.iter().map(|d| d.bounds).collect();

        let mut primary_bounds = displays[primary_idx].bounds;
        primary_bounds.set_origin(Point::new(0, 0));
        displays[primary_idx].set_bounds(primary_bounds);

        let mut placed: HashSet<DisplayId> = HashSet::from([self.primary_id]);
        let mut pending: Vec<&DisplayPlacement> = self
            .placement_list
            .iter()
            .filter(|p| index.contains_key(&p.display_id))
            .collect();

        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|placement| {
                if !placed.contains(&placement.parent_display_id) {
                    return true;
                }
                let Some(&parent_idx) = index.get(&placement.parent_display_id) else {
                    return true;
                };
                let target_idx = index[&placement.display_id];
                let parent = displays[parent_idx].bounds;
                let target = displays[target_idx].bounds;

                let mut offset = placement.offset;
                match placement.position {
                    Position::Top | Position::Bottom => {
                        offset = offset.min(parent.width - minimum_overlap);
                        offset = offset.max(-target.width + minimum_overlap);
                    }
                    Position::Left | Position::Right => {
                        offset = offset.min(parent.height - minimum_overlap);
                        offset = offset.max(-target.height + minimum_overlap);
                    }
                }

                let mut origin = parent.origin();
                match placement.position {
                    Position::Top => origin.offset(offset, -target.height),
                    Position::Right => origin.offset(parent.width, offset),
                    Position::Bottom => origin.offset(offset, parent.height),
                    Position::Left => origin.offset(-target.width, offset),
                }

                let mut bounds = target;
                bounds.set_origin(origin);
                displays[target_idx].set_bounds(bounds);
                placed.insert(placement.display_id);
                false
            });
            if pending.len() == before {
                warn!(
                    "{} placements could not be resolved against the primary",
                    pending.len()
                );
                break;
            }
        }

        displays
            .iter()
            .zip(original)
            .filter(|(display, old)| display.bounds != *old)
            .map(|(display, _)| display.id)
            .collect()
    }
}

/// Cache of layouts keyed by display id set
#[derive(Debug)]
pub struct LayoutStore {
    layouts: HashMap<DisplayIdList, Layout>,
    default_position: Position,
    default_offset: i32,
}

impl Default for LayoutStore {
    fn default() -> Self {
        Self::new(Position::Right, 0)
    }
}

impl LayoutStore {
    /// Create a store whose fresh layouts use the given default placement
    pub fn new(default_position: Position, default_offset: i32) -> Self {
        Self {
            layouts: HashMap::new(),
            default_position,
            default_offset,
        }
    }

    /// Change the placement used for layouts created from now on
    pub fn set_default_display_placement(&mut self, position: Position, offset: i32) {
        self.default_position = position;
        self.default_offset = offset;
    }

    /// Default layout: first id is primary, each id chained to the previous one
    pub fn create_default_layout(&self, ids: &DisplayIdList) -> Layout {
        let primary_id = ids.ids().first().copied().unwrap_or(INVALID_DISPLAY_ID);
        let placement_list = ids
            .ids()
            .windows(2)
            .map(|pair| {
                DisplayPlacement::new(pair[1], pair[0], self.default_position, self.default_offset)
            })
            .collect();
        Layout {
            primary_id,
            placement_list,
            mirrored: false,
            default_unified: true,
        }
    }

    /// Registered layout for exactly this id set, creating the default if absent
    pub fn get_layout(&mut self, ids: &DisplayIdList) -> &Layout {
        if !self.layouts.contains_key(ids) {
            let layout = self.create_default_layout(ids);
            debug!("Created default layout for {}", ids);
            self.layouts.insert(ids.clone(), layout);
        }
        &self.layouts[ids]
    }

    /// Registered layout without creating one
    pub fn find_layout(&self, ids: &DisplayIdList) -> Option<&Layout> {
        self.layouts.get(ids)
    }

    /// Replace the stored layout if its placement differs
    ///
    /// Returns false for a no-op write, which must not trigger notifications.
    pub fn register_layout(&mut self, ids: &DisplayIdList, layout: Layout) -> bool {
        if let Some(current) = self.layouts.get(ids) {
            if current.has_same_placement_list(&layout) {
                return false;
            }
        }
        debug!("Registered layout for {} (primary {})", ids, layout.primary_id);
        self.layouts.insert(ids.clone(), layout);
        true
    }

    /// Record mirrored/unified defaults for an id set, leaving placement alone
    pub fn update_multi_display_state(&mut self, ids: &DisplayIdList, is_mirrored: bool, is_unified: bool) {
        if !self.layouts.contains_key(ids) {
            let layout = self.create_default_layout(ids);
            self.layouts.insert(ids.clone(), layout);
        }
        if let Some(layout) = self.layouts.get_mut(ids) {
            layout.mirrored = is_mirrored;
            layout.default_unified = is_unified;
        }
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
