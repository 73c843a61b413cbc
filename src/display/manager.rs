//! Display Manager
//!
//! Coordinates the registry, layout store, mode selector, topology builder,
//! reconciler and observer bus. Every public operation that changes the active
//! set funnels into one reconciliation pass.

use enumflags2::BitFlags;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use super::bootstrap::{parse_display_spec, parse_display_spec_list, SyntheticIdAllocator};
use super::delegate::{DisplayConfigurator, DisplayDelegate, MultipleDisplayState};
use super::geometry::{Insets, Point, Rect};
use super::info::{
    approx_eq, ColorProfile, DisplayMode, PhysicalDisplayRecord, Rotation, RotationSource,
    TouchCalibrationData,
};
use super::layout::{
    DisplayIdList, Layout, LayoutStore, Position, MINIMUM_OVERLAP_FOR_INVALID_OFFSET,
};
use super::logical::LogicalDisplay;
use super::mode::{
    default_mode, internal_mode_list, mode_for_next_resolution, mode_for_next_ui_scale,
    ModeSelector,
};
use super::observer::{DisplayEvent, DisplayObserver, ObserverBus, ObserverId};
use super::reconcile::{reconcile, DisplayMetric, ReconcileResult};
use super::registry::{DisplayProperties, DisplayRegistry};
use super::topology::{build_topology, MultiDisplayMode, ResolvedMode, TopologyRequest};
use super::{DisplayError, DisplayId, Result, INVALID_DISPLAY_ID, UNIFIED_DISPLAY_ID};

/// Name of the placeholder kept for a disconnected internal panel
const INTERNAL_DISPLAY_NAME: &str = "Internal Display";

/// Name reported for the invalid id
const UNKNOWN_DISPLAY_NAME: &str = "Unknown Display";

/// Vertical gap between the host display and the one `add_remove_display` creates
const ADDED_DISPLAY_OFFSET_PX: i32 = 100;

/// Manager options
#[derive(Debug, Clone)]
pub struct DisplayManagerOptions {
    /// Allow the unified desktop mode
    pub unified_desktop_enabled: bool,

    /// Treat the first bootstrapped display as the internal panel
    pub first_display_as_internal: bool,

    /// Designated internal panel, if known up front
    pub internal_display_id: Option<DisplayId>,

    /// A hardware configurator performs mode setting
    pub configure_displays: bool,

    /// Start in software mirroring mode
    pub software_mirroring: bool,

    /// Placement used for layouts created on first sight of an id set
    pub default_position: Position,
    pub default_offset: i32,

    /// Shared-edge overlap enforced when applying layouts
    pub minimum_overlap: i32,
}

impl Default for DisplayManagerOptions {
    fn default() -> Self {
        Self {
            unified_desktop_enabled: false,
            first_display_as_internal: false,
            internal_display_id: None,
            configure_displays: false,
            software_mirroring: false,
            default_position: Position::Right,
            default_offset: 0,
            minimum_overlap: MINIMUM_OVERLAP_FOR_INVALID_OFFSET,
        }
    }
}

/// Coordinator owning all display state
pub struct DisplayManager {
    options: DisplayManagerOptions,
    registry: DisplayRegistry,
    layouts: LayoutStore,
    selector: ModeSelector,
    observers: ObserverBus,
    delegate: Option<Box<dyn DisplayDelegate>>,
    configurator: Option<Box<dyn DisplayConfigurator>>,

    /// Active displays, ascending by id
    active_displays: Vec<LogicalDisplay>,
    software_mirroring_displays: Vec<LogicalDisplay>,
    current_resolved_layout: Option<Layout>,
    resolved_mode: ResolvedMode,

    multi_display_mode: MultiDisplayMode,
    current_default_multi_display_mode: MultiDisplayMode,
    unified_desktop_enabled: bool,
    mirroring_display_id: Option<DisplayId>,
    first_display_id: Option<DisplayId>,
    num_connected_displays: usize,

    synthetic_ids: SyntheticIdAllocator,
    change_display_upon_host_resize: bool,
    registered_internal_display_rotation_lock: bool,
    registered_internal_display_rotation: Rotation,

    is_updating: bool,
    mirror_window_pending: bool,
}

impl std::fmt::Debug for DisplayManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayManager")
            .field("active_displays", &self.active_display_ids())
            .field("multi_display_mode", &self.multi_display_mode)
            .field("resolved_mode", &self.resolved_mode)
            .field("mirroring_display_id", &self.mirroring_display_id)
            .field("num_connected_displays", &self.num_connected_displays)
            .finish()
    }
}

impl DisplayManager {
    /// Create a manager with no displays
    pub fn new(options: DisplayManagerOptions) -> Self {
        let mut registry = DisplayRegistry::new();
        registry.set_internal_display_id(options.internal_display_id);
        let layouts = LayoutStore::new(options.default_position, options.default_offset);
        let multi_display_mode = if options.software_mirroring {
            MultiDisplayMode::Mirrored
        } else {
            MultiDisplayMode::Extended
        };

        Self {
            unified_desktop_enabled: options.unified_desktop_enabled,
            change_display_upon_host_resize: !options.configure_displays,
            options,
            registry,
            layouts,
            selector: ModeSelector::new(),
            observers: ObserverBus::new(),
            delegate: None,
            configurator: None,
            active_displays: Vec::new(),
            software_mirroring_displays: Vec::new(),
            current_resolved_layout: None,
            resolved_mode: ResolvedMode::Extended,
            multi_display_mode,
            current_default_multi_display_mode: MultiDisplayMode::Extended,
            mirroring_display_id: None,
            first_display_id: None,
            num_connected_displays: 0,
            synthetic_ids: SyntheticIdAllocator::new(),
            registered_internal_display_rotation_lock: false,
            registered_internal_display_rotation: Rotation::Rotate0,
            is_updating: false,
            mirror_window_pending: false,
        }
    }

    pub fn set_delegate(&mut self, delegate: Box<dyn DisplayDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn set_configurator(&mut self, configurator: Box<dyn DisplayConfigurator>) {
        self.configurator = Some(configurator);
    }

    pub fn add_observer(&mut self, observer: Box<dyn DisplayObserver>) -> ObserverId {
        self.observers.add_observer(observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove_observer(id)
    }

    pub fn layout_store(&self) -> &LayoutStore {
        &self.layouts
    }

    pub fn layout_store_mut(&mut self) -> &mut LayoutStore {
        &mut self.layouts
    }

    /// Designate (or clear) the internal panel
    pub fn set_internal_display_id(&mut self, id: Option<DisplayId>) {
        self.registry.set_internal_display_id(id);
    }

    /// Panel eligible for UI scaling
    pub fn display_id_for_ui_scaling(&self) -> Option<DisplayId> {
        self.registry.internal_display_id()
    }

    // =========================================================================
    // Hardware events and reconciliation
    // =========================================================================

    /// Bootstrap from a comma-separated spec list instead of hardware
    pub fn init_from_spec(&mut self, spec: &str) -> Result<()> {
        let mut records = parse_display_spec_list(spec, &mut self.synthetic_ids)?;
        if let Some(first) = records.first_mut() {
            self.maybe_init_internal_display(first);
        }
        self.on_native_displays_changed(records)
    }

    fn maybe_init_internal_display(&mut self, record: &mut PhysicalDisplayRecord) {
        if !self.options.first_display_as_internal {
            return;
        }
        self.registry.set_internal_display_id(Some(record.id));
        record.is_internal = true;
        let native_mode = DisplayMode::new(
            record.bounds_in_native.size(),
            0.0,
            false,
            false,
            1.0,
            record.device_scale_factor,
        );
        record.display_modes = internal_mode_list(&native_mode);
        debug!("Display {} is the internal display", record.id);
    }

    /// Handle a hardware-change event
    ///
    /// An empty list with no active displays synthesizes one default display;
    /// an empty list otherwise is ignored (all outputs powered off). Displays
    /// sharing a native origin are hardware mirrors: the later one becomes the
    /// mirror target unless it is the internal panel.
    pub fn on_native_displays_changed(&mut self, updated: Vec<PhysicalDisplayRecord>) -> Result<()> {
        if updated.is_empty() {
            debug!(
                "Native displays changed to none, {} currently active",
                self.active_displays.len()
            );
            if self.active_displays.is_empty() {
                let mut record = parse_display_spec("", self.synthetic_ids.allocate())?;
                self.maybe_init_internal_display(&mut record);
                return self.on_native_displays_changed(vec![record]);
            }
            return Ok(());
        }

        self.first_display_id = Some(updated[0].id);
        self.num_connected_displays = updated.len();
        self.mirroring_display_id = None;
        self.software_mirroring_displays.clear();
        debug!(
            "Native displays changed ({}): {}",
            updated.len(),
            updated.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
        );

        let mut internal_display_connected = false;
        let mut origins: HashMap<Point, usize> = HashMap::new();
        let mut new_infos: Vec<PhysicalDisplayRecord> = Vec::with_capacity(updated.len());

        for record in updated {
            internal_display_connected |= self.registry.is_internal(record.id);
            self.selector.sync_with_hardware(&record);

            let origin = record.bounds_in_native.origin();
            match origins.get(&origin) {
                Some(&index) => {
                    let target = if self.registry.is_internal(record.id) {
                        std::mem::replace(&mut new_infos[index], record)
                    } else {
                        record
                    };
                    info!("Hardware mirroring detected, target {}", target.id);
                    self.registry.upsert(&target);
                    self.mirroring_display_id = Some(target.id);
                }
                None => {
                    origins.insert(origin, new_infos.len());
                    new_infos.push(record);
                }
            }
        }

        if self.registry.internal_display_id().is_some() && !internal_display_connected {
            self.registry.retain_disconnected_internal(INTERNAL_DISPLAY_NAME);
        }

        if !self.options.configure_displays && new_infos.len() > 1 {
            let ids = DisplayIdList::new(new_infos.iter().map(|info| info.id));
            if self.layouts.get_layout(&ids).mirrored {
                self.set_multi_display_mode(MultiDisplayMode::Mirrored);
            }
        }

        self.update_displays_with(new_infos).map(|_| ())
    }

    /// Re-run a pass with the current records
    pub fn update_displays(&mut self) -> Result<ReconcileResult> {
        let infos = self.connected_infos();
        self.update_displays_with(infos)
    }

    /// Re-run a pass after forgetting the current mirroring state
    pub fn reconfigure_displays(&mut self) -> Result<ReconcileResult> {
        let infos = self.connected_infos();
        self.mirroring_display_id = None;
        self.software_mirroring_displays.clear();
        self.update_displays_with(infos)
    }

    /// One reconciliation pass against `infos`
    ///
    /// Observers receive removals, then additions, then metric changes; the
    /// delegate brackets the pass when anything changed.
    pub fn update_displays_with(
        &mut self,
        mut infos: Vec<PhysicalDisplayRecord>,
    ) -> Result<ReconcileResult> {
        if self.is_updating {
            error!("Display update requested from inside a display update");
            return Err(DisplayError::ReentrantUpdate);
        }
        infos.sort_by_key(|info| info.id);

        if infos.len() > 1 {
            let ids = DisplayIdList::new(infos.iter().map(|info| info.id));
            let layout = self.layouts.get_layout(&ids);
            self.current_default_multi_display_mode =
                if layout.default_unified && self.unified_desktop_enabled {
                    MultiDisplayMode::Unified
                } else {
                    MultiDisplayMode::Extended
                };
        }
        if self.multi_display_mode != MultiDisplayMode::Mirrored {
            self.multi_display_mode = self.current_default_multi_display_mode;
        }

        if let Some(delegate) = self.delegate.as_mut() {
            delegate.close_mirroring_display_if_unnecessary();
        }

        let old_primary = self.primary_display_candidate();
        let request = TopologyRequest {
            mode: self.multi_display_mode,
            first_display_id: self.first_display_id,
            minimum_overlap: self.options.minimum_overlap,
        };
        let topology = build_topology(
            &request,
            infos,
            &self.active_displays,
            &mut self.registry,
            &mut self.selector,
            &mut self.layouts,
        );

        if let Some(target) = topology.resolved.mirroring_target() {
            self.mirroring_display_id = Some(target);
        }
        if topology.resolved != self.resolved_mode {
            info!("Display mode is now {:?}", topology.resolved);
        }

        let mut result = reconcile(&self.active_displays, &topology.displays);
        let changed = !result.is_empty();
        if changed {
            if let Some(delegate) = self.delegate.as_mut() {
                delegate.pre_display_configuration_change(result.clear_focus());
            }
        }

        self.active_displays = topology.displays;
        self.software_mirroring_displays = topology.software_mirroring_displays;
        self.current_resolved_layout = topology.resolved_layout;
        self.resolved_mode = topology.resolved;

        let updated_ids: Vec<DisplayId> = self
            .active_displays
            .iter()
            .chain(self.software_mirroring_displays.iter())
            .map(|display| display.id)
            .collect();
        self.on_display_info_updated(&updated_ids);

        let new_primary = self.primary_display_candidate();
        result.apply_primary_change(&old_primary, &new_primary);

        self.is_updating = true;
        let events = result.events(&self.active_displays);
        self.observers.notify_all(&events);
        self.is_updating = false;

        if changed {
            let must_clear_window = self.options.configure_displays && !result.changed.is_empty();
            if let Some(delegate) = self.delegate.as_mut() {
                delegate.post_display_configuration_change(must_clear_window);
            }
        }

        debug!(
            "Display update: {} removed, {} added, {} changed, active {:?}",
            result.removed.len(),
            result.added.len(),
            result.changed.len(),
            self.active_display_ids()
        );

        self.create_mirror_window_async_if_any();
        Ok(result)
    }

    /// Records for every connected panel behind the active set
    ///
    /// The unified display is replaced by its panels and a software mirror
    /// target is included.
    fn connected_infos(&self) -> Vec<PhysicalDisplayRecord> {
        self.active_displays
            .iter()
            .filter(|display| display.id != UNIFIED_DISPLAY_ID)
            .chain(self.software_mirroring_displays.iter())
            .filter_map(|display| self.registry.get(display.id).cloned())
            .collect()
    }

    fn on_display_info_updated(&mut self, ids: &[DisplayId]) {
        if !self.options.configure_displays {
            return;
        }
        let Some(configurator) = self.configurator.as_mut() else {
            return;
        };
        for &id in ids {
            if let Some(record) = self.registry.get(id) {
                if record.color_profile != ColorProfile::Standard {
                    configurator.set_color_calibration_profile(id, record.color_profile);
                }
            }
        }
    }

    fn create_mirror_window_async_if_any(&mut self) {
        if self.software_mirroring_displays.is_empty() || self.delegate.is_none() {
            return;
        }
        self.mirror_window_pending = true;
    }

    /// A deferred mirroring task is waiting for the next loop iteration
    pub fn has_pending_tasks(&self) -> bool {
        self.mirror_window_pending
    }

    /// Run the deferred mirroring task, if scheduled
    ///
    /// Recomputed from current state, so running it late or twice is harmless.
    pub fn run_pending_tasks(&mut self) -> bool {
        if !std::mem::take(&mut self.mirror_window_pending) {
            return false;
        }
        if self.software_mirroring_displays.is_empty() {
            return false;
        }
        let infos: Vec<PhysicalDisplayRecord> = self
            .software_mirroring_displays
            .iter()
            .filter_map(|display| self.registry.get(display.id).cloned())
            .collect();
        match self.delegate.as_mut() {
            Some(delegate) => {
                delegate.create_or_update_mirroring_display(&infos);
                true
            }
            None => false,
        }
    }

    fn notify(&mut self, display: &LogicalDisplay, metrics: BitFlags<DisplayMetric>) {
        self.observers.notify(&DisplayEvent::MetricsChanged {
            display: display.clone(),
            metrics,
        });
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Ids the current layout is keyed by
    ///
    /// The unified display is replaced by its panels and a mirrored pair is
    /// reported as both ids.
    pub fn current_display_id_list(&self) -> DisplayIdList {
        if self.is_in_unified_mode() {
            DisplayIdList::new(self.software_mirroring_displays.iter().map(|d| d.id))
        } else if let Some(mirroring_id) = self.mirroring_display_id {
            let source = self
                .active_displays
                .first()
                .map(|d| d.id)
                .unwrap_or(INVALID_DISPLAY_ID);
            DisplayIdList::new([source, mirroring_id])
        } else {
            DisplayIdList::new(self.active_displays.iter().map(|d| d.id))
        }
    }

    /// Registered layout for the connected displays
    ///
    /// Asking with a single display is a programming error; a layout naming
    /// that display as primary is returned instead.
    pub fn current_display_layout(&mut self) -> Layout {
        if self.num_connected_displays > 1 {
            let ids = self.current_display_id_list();
            return self.layouts.get_layout(&ids).clone();
        }
        error!("Display layout requested for a single display");
        Layout {
            primary_id: self
                .active_displays
                .first()
                .map(|d| d.id)
                .unwrap_or(INVALID_DISPLAY_ID),
            ..Layout::default()
        }
    }

    /// Layout as last applied, falling back to the registered one
    pub fn current_resolved_layout(&mut self) -> Layout {
        match &self.current_resolved_layout {
            Some(layout) => layout.clone(),
            None => self.current_display_layout(),
        }
    }

    /// Register a new layout for the current displays and apply it
    ///
    /// A layout with the same placements as the registered one is a no-op.
    pub fn set_layout_for_current_displays(&mut self, mut layout: Layout) -> Result<()> {
        if self.num_displays() <= 1 {
            return Ok(());
        }
        let ids = self.current_display_id_list();
        if !layout.validate(&ids) {
            return Err(DisplayError::InvalidLayout(format!(
                "layout with primary {} does not cover {}",
                layout.primary_id, ids
            )));
        }

        let current = self.layouts.get_layout(&ids);
        if layout.has_same_placement_list(current) {
            return Ok(());
        }
        layout.mirrored = current.mirrored;
        layout.default_unified = current.default_unified;
        self.layouts.register_layout(&ids, layout.clone());

        if let Some(delegate) = self.delegate.as_mut() {
            delegate.pre_display_configuration_change(false);
        }

        let moved = if self.is_in_unified_mode() {
            Vec::new()
        } else {
            layout.apply_to_displays(&mut self.active_displays, self.options.minimum_overlap)
        };
        self.current_resolved_layout = Some(layout);
        for id in moved {
            let display = self.display_for_id(id);
            self.notify(&display, DisplayMetric::Bounds | DisplayMetric::WorkArea);
        }

        if let Some(delegate) = self.delegate.as_mut() {
            delegate.post_display_configuration_change(false);
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Active display by id, or the invalid sentinel
    pub fn display_for_id(&self, id: DisplayId) -> LogicalDisplay {
        match self.active_displays.iter().find(|d| d.id == id) {
            Some(display) => display.clone(),
            None => {
                if id != UNIFIED_DISPLAY_ID {
                    debug!("Could not find display {}", id);
                }
                LogicalDisplay::invalid()
            }
        }
    }

    /// Active display containing a point in screen coordinates
    pub fn find_display_containing_point(&self, point: Point) -> LogicalDisplay {
        self.active_displays
            .iter()
            .find(|d| d.bounds.contains(point))
            .cloned()
            .unwrap_or_else(LogicalDisplay::invalid)
    }

    /// Active display by position in id order
    pub fn display_at(&self, index: usize) -> LogicalDisplay {
        self.active_displays
            .get(index)
            .cloned()
            .unwrap_or_else(LogicalDisplay::invalid)
    }

    pub fn active_displays(&self) -> &[LogicalDisplay] {
        &self.active_displays
    }

    /// Always strictly ascending
    pub fn active_display_ids(&self) -> Vec<DisplayId> {
        self.active_displays.iter().map(|d| d.id).collect()
    }

    pub fn num_displays(&self) -> usize {
        self.active_displays.len()
    }

    pub fn num_connected_displays(&self) -> usize {
        self.num_connected_displays
    }

    pub fn is_active_display_id(&self, id: DisplayId) -> bool {
        self.active_displays.iter().any(|d| d.id == id)
    }

    /// Display that should act as primary
    ///
    /// The layout's primary when it is active, otherwise the first display.
    pub fn primary_display_candidate(&self) -> LogicalDisplay {
        if self.active_displays.len() >= 2 {
            let ids = self.current_display_id_list();
            if let Some(layout) = self.layouts.find_layout(&ids) {
                if self.is_active_display_id(layout.primary_id) {
                    return self.display_for_id(layout.primary_id);
                }
            }
        }
        self.display_at(0)
    }

    /// The active display that is not the primary, when there are two or more
    pub fn secondary_display(&self) -> LogicalDisplay {
        if self.active_displays.len() < 2 {
            warn!("Secondary display requested with {} displays", self.active_displays.len());
            return LogicalDisplay::invalid();
        }
        let primary = self.primary_display_candidate();
        if self.active_displays[0].id == primary.id {
            self.active_displays[1].clone()
        } else {
            self.active_displays[0].clone()
        }
    }

    /// Record for any known display, connected or not
    pub fn display_info(&self, id: DisplayId) -> Option<&PhysicalDisplayRecord> {
        self.registry.get(id)
    }

    pub fn registry(&self) -> &DisplayRegistry {
        &self.registry
    }

    /// Software mirroring display by id, or the invalid sentinel
    pub fn mirroring_display_by_id(&self, id: DisplayId) -> LogicalDisplay {
        self.software_mirroring_displays
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .unwrap_or_else(LogicalDisplay::invalid)
    }

    pub fn software_mirroring_displays(&self) -> &[LogicalDisplay] {
        &self.software_mirroring_displays
    }

    pub fn mirroring_display_id(&self) -> Option<DisplayId> {
        self.mirroring_display_id
    }

    pub fn display_name_for_id(&self, id: DisplayId) -> String {
        if id == INVALID_DISPLAY_ID {
            return UNKNOWN_DISPLAY_NAME.to_string();
        }
        match self.registry.get(id) {
            Some(record) if !record.name.is_empty() => record.name.clone(),
            _ => format!("Display {}", id),
        }
    }

    pub fn is_in_mirror_mode(&self) -> bool {
        self.mirroring_display_id.is_some()
    }

    pub fn is_in_unified_mode(&self) -> bool {
        self.multi_display_mode == MultiDisplayMode::Unified && self.resolved_mode.is_unified()
    }

    pub fn software_mirroring_enabled(&self) -> bool {
        self.multi_display_mode == MultiDisplayMode::Mirrored
    }

    pub fn multi_display_mode(&self) -> MultiDisplayMode {
        self.multi_display_mode
    }

    pub fn resolved_mode(&self) -> &ResolvedMode {
        &self.resolved_mode
    }

    pub fn unified_desktop_enabled(&self) -> bool {
        self.unified_desktop_enabled
    }

    /// Persisted overscan of any known display
    pub fn overscan_insets(&self, id: DisplayId) -> Insets {
        self.registry
            .get(id)
            .map(|record| record.overscan_insets_in_dip)
            .unwrap_or_default()
    }

    /// Mode in effect for a display
    pub fn active_mode(&self, id: DisplayId) -> Option<DisplayMode> {
        let record = self.registry.get(id)?;
        let ui_scaling = self.display_id_for_ui_scaling() == Some(id);
        self.selector.active_mode(record, ui_scaling)
    }

    pub fn selected_mode(&self, id: DisplayId) -> Option<DisplayMode> {
        self.selector.selected_mode(id)
    }

    pub fn largest_device_scale_factor(&self) -> f32 {
        self.active_displays
            .iter()
            .map(|d| d.device_scale_factor)
            .fold(1.0, f32::max)
    }

    pub fn registered_internal_display_rotation_lock(&self) -> bool {
        self.registered_internal_display_rotation_lock
    }

    pub fn registered_internal_display_rotation(&self) -> Rotation {
        self.registered_internal_display_rotation
    }

    // =========================================================================
    // Per-display properties
    // =========================================================================

    /// Select a resolution/scale for an active display
    ///
    /// Returns whether anything changed. A mode outside the display's
    /// candidate list is rejected and nothing is modified.
    pub fn set_display_mode(&mut self, id: DisplayId, mode: &DisplayMode) -> Result<bool> {
        if !self.is_active_display_id(id) {
            warn!("Mode requested for inactive display {}", id);
            return Err(DisplayError::DisplayNotActive(id));
        }
        let mut working = self
            .registry
            .get(id)
            .cloned()
            .ok_or(DisplayError::DisplayNotFound(id))?;
        let ui_scaling = self.display_id_for_ui_scaling() == Some(id);
        let change = self.selector.select_mode(&mut working, mode, ui_scaling)?;

        if id == UNIFIED_DISPLAY_ID {
            if change.any() {
                info!("Unified desktop mode set to {}", mode);
                self.reconfigure_displays()?;
            }
            return Ok(change.any());
        }

        if change.property_changed {
            let infos = self
                .connected_infos()
                .into_iter()
                .map(|info| if info.id == id { working.clone() } else { info })
                .collect();
            self.update_displays_with(infos)?;
        }
        if change.resolution_changed && self.options.configure_displays {
            if let Some(configurator) = self.configurator.as_mut() {
                configurator.on_configuration_changed();
            }
        }
        Ok(change.any())
    }

    /// Apply `update` to the record of `id` and re-run a pass if it is connected
    ///
    /// Returns false when the display is not connected, in which case
    /// `fallback` is applied to the stored record instead.
    fn update_connected_record(
        &mut self,
        id: DisplayId,
        update: impl FnOnce(&mut PhysicalDisplayRecord),
        fallback: impl FnOnce(&mut PhysicalDisplayRecord),
    ) -> Result<bool> {
        let mut infos = self.connected_infos();
        match infos.iter_mut().find(|info| info.id == id) {
            Some(info) => {
                update(info);
                self.update_displays_with(infos)?;
                Ok(true)
            }
            None => {
                fallback(self.registry.get_or_create(id));
                Ok(false)
            }
        }
    }

    /// Set overscan in DIP; empty insets clear it
    pub fn set_overscan_insets(&mut self, id: DisplayId, insets: Insets) -> Result<()> {
        self.update_connected_record(
            id,
            |info| {
                info.clear_overscan_insets = insets.is_empty();
                if !insets.is_empty() {
                    info.set_overscan_insets(insets);
                }
            },
            |record| {
                record.set_overscan_insets(insets);
                record.update_display_size();
            },
        )
        .map(|_| ())
    }

    /// Rotate a display; ignored in unified mode
    pub fn set_display_rotation(
        &mut self,
        id: DisplayId,
        rotation: Rotation,
        source: RotationSource,
    ) -> Result<()> {
        if self.is_in_unified_mode() {
            return Ok(());
        }
        if let Some(record) = self.registry.get(id) {
            if self.is_active_display_id(id)
                && record.rotation(source) == rotation
                && record.active_rotation == rotation
            {
                return Ok(());
            }
        }
        if !self.registry.contains(id) {
            warn!("Rotation requested for unknown display {}", id);
            return Ok(());
        }
        self.update_connected_record(
            id,
            |info| info.set_rotation(rotation, source),
            |record| record.set_rotation(rotation, source),
        )
        .map(|_| ())
    }

    /// Apply a color profile the display advertises
    ///
    /// Returns false if the profile is unavailable or the configurator rejected it.
    pub fn set_color_calibration_profile(&mut self, id: DisplayId, profile: ColorProfile) -> bool {
        let available = self
            .registry
            .get(id)
            .is_some_and(|record| record.is_color_profile_available(profile));
        if !available {
            warn!("Color profile {:?} is not available on {}", profile, id);
            return false;
        }

        if let Some(delegate) = self.delegate.as_mut() {
            delegate.pre_display_configuration_change(false);
        }
        let accepted = match (self.options.configure_displays, self.configurator.as_mut()) {
            (true, Some(configurator)) => configurator.set_color_calibration_profile(id, profile),
            _ => true,
        };
        if accepted {
            if let Some(record) = self.registry.get_mut(id) {
                record.color_profile = profile;
            }
        }
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.post_display_configuration_change(false);
        }
        accepted
    }

    pub fn set_touch_calibration_data(
        &mut self,
        id: DisplayId,
        data: TouchCalibrationData,
    ) -> Result<()> {
        self.update_connected_record(
            id,
            |info| info.touch_calibration = Some(data),
            |record| record.touch_calibration = Some(data),
        )
        .map(|_| ())
    }

    pub fn clear_touch_calibration_data(&mut self, id: DisplayId) -> Result<()> {
        self.update_connected_record(
            id,
            |info| info.touch_calibration = None,
            |record| record.touch_calibration = None,
        )
        .map(|_| ())
    }

    /// Apply shelf/panel insets to an active display
    ///
    /// Returns whether the work area changed.
    pub fn update_work_area_of_display(&mut self, id: DisplayId, insets: Insets) -> bool {
        let Some(display) = self.active_displays.iter_mut().find(|d| d.id == id) else {
            warn!("Work area update for inactive display {}", id);
            return false;
        };
        let old_work_area = display.work_area;
        display.update_work_area_from_insets(&insets);
        if old_work_area == display.work_area {
            return false;
        }
        let display = display.clone();
        self.notify(&display, DisplayMetric::WorkArea.into());
        true
    }

    /// Host window resized (desktop backends only)
    ///
    /// Returns whether observers were notified.
    pub fn update_display_bounds(&mut self, id: DisplayId, bounds: Rect) -> bool {
        if !self.change_display_upon_host_resize {
            return false;
        }
        let size_in_pixel = {
            let record = self.registry.get_or_create(id);
            record.set_bounds(bounds);
            record.size_in_pixel
        };
        if self.software_mirroring_enabled() && self.mirroring_display_id == Some(id) {
            return false;
        }
        let Some(display) = self.active_displays.iter_mut().find(|d| d.id == id) else {
            return false;
        };
        display.set_size(size_in_pixel);
        let display = display.clone();
        self.notify(&display, DisplayMetric::Bounds.into());
        true
    }

    /// Restore persisted state for a display, connected or not
    pub fn register_display_property(&mut self, id: DisplayId, properties: &DisplayProperties) {
        if let Some(mode) = self.registry.register_properties(id, properties) {
            self.selector.set_selected_mode(id, mode);
        }
    }

    /// Restore the internal panel's rotation lock
    pub fn register_display_rotation_properties(&mut self, rotation_lock: bool, rotation: Rotation) {
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.pre_display_configuration_change(false);
        }
        self.registered_internal_display_rotation_lock = rotation_lock;
        self.registered_internal_display_rotation = rotation;
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.post_display_configuration_change(false);
        }
    }

    // =========================================================================
    // Multi-display mode
    // =========================================================================

    /// Turn mirroring on or off; needs exactly two connected displays
    pub fn set_mirror_mode(&mut self, mirror: bool) -> Result<()> {
        if self.num_connected_displays != 2 {
            debug!("Mirror mode needs two displays, have {}", self.num_connected_displays);
            return Ok(());
        }
        if self.options.configure_displays {
            if let Some(configurator) = self.configurator.as_mut() {
                let state = if mirror {
                    MultipleDisplayState::DualMirror
                } else {
                    MultipleDisplayState::DualExtended
                };
                configurator.set_display_state(state);
                return Ok(());
            }
        }
        self.multi_display_mode = if mirror {
            MultiDisplayMode::Mirrored
        } else {
            self.current_default_multi_display_mode
        };
        self.reconfigure_displays().map(|_| ())
    }

    /// Switch software mirroring; takes effect on the next pass
    pub fn set_software_mirroring(&mut self, enabled: bool) {
        let mode = if enabled {
            MultiDisplayMode::Mirrored
        } else {
            self.current_default_multi_display_mode
        };
        self.set_multi_display_mode(mode);
    }

    pub fn set_unified_desktop_enabled(&mut self, enabled: bool) -> Result<()> {
        self.unified_desktop_enabled = enabled;
        // Hardware mirroring state comes from the configurator
        if self.is_in_mirror_mode() {
            return Ok(());
        }
        self.reconfigure_displays().map(|_| ())
    }

    /// Remember extended or unified as the default for the current id set
    pub fn set_default_multi_display_mode_for_current_displays(
        &mut self,
        mode: MultiDisplayMode,
    ) -> Result<()> {
        if mode == MultiDisplayMode::Mirrored {
            warn!("Mirrored cannot be stored as a default multi-display mode");
            return Ok(());
        }
        let ids = self.current_display_id_list();
        let mirrored = self.is_in_mirror_mode();
        self.layouts
            .update_multi_display_state(&ids, mirrored, mode == MultiDisplayMode::Unified);
        self.reconfigure_displays().map(|_| ())
    }

    /// Set the requested mode without running a pass
    pub fn set_multi_display_mode(&mut self, mode: MultiDisplayMode) {
        self.multi_display_mode = mode;
        self.mirroring_display_id = None;
        self.software_mirroring_displays.clear();
    }

    // =========================================================================
    // Test and accelerator helpers
    // =========================================================================

    /// Add a second display below the first, or remove it if there are two
    pub fn add_remove_display(&mut self) -> Result<()> {
        let first_id = if self.is_in_unified_mode() {
            self.software_mirroring_displays.first().map(|d| d.id)
        } else {
            self.active_displays.first().map(|d| d.id)
        };
        let Some(first) = first_id.and_then(|id| self.registry.get(id)).cloned() else {
            warn!("No display to add a second display next to");
            return Ok(());
        };

        let host = first.bounds_in_native;
        let mut infos = vec![first];
        if self.num_connected_displays == 1 {
            let spec = format!(
                "{}+{}-600x{}",
                host.x,
                host.y + ADDED_DISPLAY_OFFSET_PX,
                host.height
            );
            infos.push(parse_display_spec(&spec, self.synthetic_ids.allocate())?);
        }

        self.num_connected_displays = infos.len();
        self.mirroring_display_id = None;
        self.software_mirroring_displays.clear();
        self.update_displays_with(infos).map(|_| ())
    }

    /// Flip every connected display between scale 1 and 2
    pub fn toggle_display_scale_factor(&mut self) -> Result<()> {
        let infos = self
            .connected_infos()
            .into_iter()
            .map(|mut info| {
                info.device_scale_factor = if approx_eq(info.device_scale_factor, 1.0) {
                    2.0
                } else {
                    1.0
                };
                info
            })
            .collect();
        self.update_displays_with(infos).map(|_| ())
    }

    /// Step the internal panel's UI scale, or the unified resolution
    pub fn zoom_internal_display(&mut self, up: bool) -> Result<bool> {
        let (id, mode) = if self.is_in_unified_mode() {
            let mode = self
                .registry
                .get(UNIFIED_DISPLAY_ID)
                .and_then(|record| mode_for_next_resolution(record, up));
            (UNIFIED_DISPLAY_ID, mode)
        } else {
            let Some(id) = self.display_id_for_ui_scaling() else {
                return Ok(false);
            };
            if !self.is_active_display_id(id) {
                return Ok(false);
            }
            let mode = self
                .registry
                .get(id)
                .and_then(|record| mode_for_next_ui_scale(record, up));
            (id, mode)
        };

        match mode {
            Some(mode) => self.set_display_mode(id, &mode),
            None => Ok(false),
        }
    }

    /// Select the internal panel's default mode
    pub fn reset_display_to_default_mode(&mut self, id: DisplayId) -> Result<bool> {
        if !self.is_active_display_id(id) || !self.registry.is_internal(id) {
            return Ok(false);
        }
        match self.registry.get(id).and_then(default_mode) {
            Some(mode) => self.set_display_mode(id, &mode),
            None => Ok(false),
        }
    }

    /// Undo zoom on the internal panel or the unified desktop
    pub fn reset_internal_display_zoom(&mut self) -> Result<bool> {
        if self.is_in_unified_mode() {
            let native = self
                .registry
                .get(UNIFIED_DISPLAY_ID)
                .and_then(|record| record.display_modes.iter().find(|mode| mode.native).copied());
            return match native {
                Some(mode) => self.set_display_mode(UNIFIED_DISPLAY_ID, &mode),
                None => Ok(false),
            };
        }
        match self.display_id_for_ui_scaling() {
            Some(id) => self.reset_display_to_default_mode(id),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::delegate::{MockDisplayConfigurator, MockDisplayDelegate};
    use crate::display::geometry::Size;
    use crate::display::observer::ChannelObserver;
    use crate::display::SYNTHETIC_DISPLAY_ID_START;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn record(id: DisplayId, x: i32, y: i32, width: i32, height: i32) -> PhysicalDisplayRecord {
        let mut info = PhysicalDisplayRecord::new(id, format!("Display {}", id), false);
        info.set_bounds(Rect::new(x, y, width, height));
        info.is_native = true;
        info
    }

    fn with_modes(mut info: PhysicalDisplayRecord) -> PhysicalDisplayRecord {
        let size = info.bounds_in_native.size();
        info.display_modes = vec![
            DisplayMode::new(size, 60.0, false, true, 1.0, 1.0),
            DisplayMode::new(Size::new(1280, 720), 60.0, false, false, 1.0, 1.0),
            DisplayMode::new(Size::new(1024, 768), 60.0, false, false, 1.0, 2.0),
        ];
        info
    }

    fn manager() -> (DisplayManager, UnboundedReceiver<DisplayEvent>) {
        manager_with(DisplayManagerOptions::default())
    }

    fn manager_with(
        options: DisplayManagerOptions,
    ) -> (DisplayManager, UnboundedReceiver<DisplayEvent>) {
        let mut manager = DisplayManager::new(options);
        let (observer, receiver) = ChannelObserver::channel();
        manager.add_observer(Box::new(observer));
        (manager, receiver)
    }

    fn drain(receiver: &mut UnboundedReceiver<DisplayEvent>) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn quiet_delegate() -> MockDisplayDelegate {
        let mut delegate = MockDisplayDelegate::new();
        delegate
            .expect_pre_display_configuration_change()
            .return_const(());
        delegate
            .expect_post_display_configuration_change()
            .return_const(());
        delegate
            .expect_close_mirroring_display_if_unnecessary()
            .return_const(());
        delegate
    }

    // =========================================================================
    // Hardware events
    // =========================================================================

    #[test]
    fn test_bootstrap_on_empty_input() {
        let (mut manager, mut events) = manager();
        manager.on_native_displays_changed(Vec::new()).unwrap();

        assert_eq!(manager.active_display_ids(), vec![SYNTHETIC_DISPLAY_ID_START]);
        assert_eq!(manager.num_connected_displays(), 1);
        let display = manager.display_at(0);
        assert_eq!(display.bounds, Rect::new(0, 0, 1366, 768));

        let events = drain(&mut events);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DisplayEvent::Added(_)));
    }

    #[test]
    fn test_empty_input_with_active_displays_is_ignored() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();
        drain(&mut events);

        manager.on_native_displays_changed(Vec::new()).unwrap();
        assert_eq!(manager.active_display_ids(), vec![1]);
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn test_first_display_as_internal_gets_ui_scales() {
        let (mut manager, _events) = manager_with(DisplayManagerOptions {
            first_display_as_internal: true,
            ..Default::default()
        });
        manager.on_native_displays_changed(Vec::new()).unwrap();

        let id = SYNTHETIC_DISPLAY_ID_START;
        assert_eq!(manager.display_id_for_ui_scaling(), Some(id));
        let record = manager.display_info(id).expect("record");
        assert_eq!(record.display_modes.len(), 5);
        assert_eq!(manager.active_mode(id).map(|m| m.ui_scale), Some(1.0));
    }

    #[test]
    fn test_hardware_mirror_detected_by_origin() {
        let (mut manager, _events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 0, 0, 1920, 1080)])
            .unwrap();

        assert_eq!(manager.active_display_ids(), vec![1]);
        assert!(manager.is_in_mirror_mode());
        assert_eq!(manager.mirroring_display_id(), Some(2));
        assert_eq!(manager.num_connected_displays(), 2);
        assert_eq!(manager.current_display_id_list(), DisplayIdList::new([1, 2]));
    }

    #[test]
    fn test_hardware_mirror_keeps_internal_as_source() {
        let (mut manager, _events) = manager_with(DisplayManagerOptions {
            internal_display_id: Some(2),
            ..Default::default()
        });
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 0, 0, 1920, 1080)])
            .unwrap();

        assert_eq!(manager.active_display_ids(), vec![2]);
        assert_eq!(manager.mirroring_display_id(), Some(1));
    }

    #[test]
    fn test_disconnected_internal_keeps_record() {
        let (mut manager, _events) = manager_with(DisplayManagerOptions {
            internal_display_id: Some(7),
            ..Default::default()
        });
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();

        let placeholder = manager.display_info(7).expect("placeholder");
        assert_eq!(placeholder.bounds_in_native, Rect::new(0, 0, 800, 600));
        assert!(!manager.is_active_display_id(7));
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    #[test]
    fn test_diff_order_and_flags() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![
                record(1, 0, 0, 1024, 768),
                record(2, 1024, 0, 1024, 768),
                record(3, 2048, 0, 1024, 768),
            ])
            .unwrap();
        drain(&mut events);

        manager
            .on_native_displays_changed(vec![
                record(2, 0, 0, 1280, 768),
                record(3, 1280, 0, 1024, 768),
                record(4, 2304, 0, 1024, 768),
            ])
            .unwrap();
        let events = drain(&mut events);

        assert!(matches!(&events[0], DisplayEvent::Removed(d) if d.id == 1));
        assert!(matches!(&events[1], DisplayEvent::Added(d) if d.id == 4));
        assert!(matches!(
            &events[2],
            DisplayEvent::MetricsChanged { display, metrics }
                if display.id == 2
                    && metrics.contains(DisplayMetric::Bounds)
                    && metrics.contains(DisplayMetric::Primary)
        ));
        assert!(events[3..].iter().all(|event| !matches!(event, DisplayEvent::Removed(_) | DisplayEvent::Added(_))));
        assert_eq!(manager.active_display_ids(), vec![2, 3, 4]);
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 1920, 0, 1280, 1024)])
            .unwrap();
        drain(&mut events);

        let result = manager.update_displays().unwrap();
        assert!(result.is_empty());
        let result = manager.update_displays().unwrap();
        assert!(result.is_empty());
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn test_reentrant_update_is_rejected() {
        let (mut manager, _events) = manager();
        manager.is_updating = true;
        let result = manager.update_displays_with(vec![record(1, 0, 0, 800, 600)]);
        assert_eq!(result, Err(DisplayError::ReentrantUpdate));
        assert!(manager.active_display_ids().is_empty());
    }

    #[test]
    fn test_delegate_brackets_pass_with_clear_focus() {
        let (mut manager, _events) = manager();
        let mut delegate = MockDisplayDelegate::new();
        delegate
            .expect_close_mirroring_display_if_unnecessary()
            .times(2)
            .return_const(());
        // Adding displays keeps focus, losing one clears it
        delegate
            .expect_pre_display_configuration_change()
            .withf(|clear_focus| !*clear_focus)
            .times(1)
            .return_const(());
        delegate
            .expect_pre_display_configuration_change()
            .withf(|clear_focus| *clear_focus)
            .times(1)
            .return_const(());
        delegate
            .expect_post_display_configuration_change()
            .withf(|must_clear_window| !*must_clear_window)
            .times(2)
            .return_const(());
        manager.set_delegate(Box::new(delegate));

        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 1920, 0, 1280, 1024)])
            .unwrap();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();
    }

    #[test]
    fn test_primary_moves_when_layout_primary_leaves() {
        let (mut manager, mut events) = manager();
        let ids = DisplayIdList::new([1, 2]);
        manager.layout_store_mut().register_layout(
            &ids,
            Layout {
                primary_id: 2,
                placement_list: vec![crate::display::DisplayPlacement::new(1, 2, Position::Right, 0)],
                ..Layout::default()
            },
        );
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 1920, 0, 1280, 1024)])
            .unwrap();
        assert_eq!(manager.primary_display_candidate().id, 2);
        assert_eq!(manager.display_for_id(1).bounds.origin(), Point::new(1280, 0));
        drain(&mut events);

        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();
        let events = drain(&mut events);
        assert!(matches!(&events[0], DisplayEvent::Removed(d) if d.id == 2));
        assert!(matches!(
            &events[1],
            DisplayEvent::MetricsChanged { display, metrics }
                if display.id == 1 && metrics.contains(DisplayMetric::Primary | DisplayMetric::Bounds)
        ));
    }

    // =========================================================================
    // Add/remove and scale helpers
    // =========================================================================

    #[test]
    fn test_add_remove_display() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 800, 600)])
            .unwrap();
        drain(&mut events);

        manager.add_remove_display().unwrap();
        assert_eq!(manager.num_displays(), 2);
        assert_eq!(manager.num_connected_displays(), 2);
        let added_id = manager.active_display_ids()[1];
        let added = manager.display_info(added_id).expect("added record");
        assert_eq!(added.bounds_in_native, Rect::new(0, 100, 600, 600));
        assert_eq!(manager.display_for_id(added_id).bounds, Rect::new(800, 0, 600, 600));

        let drained = drain(&mut events);
        assert_eq!(drained.len(), 1);
        assert!(matches!(&drained[0], DisplayEvent::Added(d) if d.id == added_id));

        manager.add_remove_display().unwrap();
        assert_eq!(manager.active_display_ids(), vec![1]);
        assert!(matches!(drain(&mut events).first(), Some(DisplayEvent::Removed(d)) if d.id == added_id));
    }

    #[test]
    fn test_toggle_display_scale_factor() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();
        drain(&mut events);

        manager.toggle_display_scale_factor().unwrap();
        assert_eq!(manager.display_for_id(1).bounds, Rect::new(0, 0, 960, 540));
        let events = drain(&mut events);
        assert!(matches!(
            &events[0],
            DisplayEvent::MetricsChanged { metrics, .. }
                if metrics.contains(DisplayMetric::DeviceScaleFactor | DisplayMetric::Bounds)
        ));

        manager.toggle_display_scale_factor().unwrap();
        assert_eq!(manager.display_for_id(1).bounds, Rect::new(0, 0, 1920, 1080));
    }

    // =========================================================================
    // Multi-display modes
    // =========================================================================

    #[test]
    fn test_unified_desktop() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 1920, 0, 1280, 1024)])
            .unwrap();
        drain(&mut events);

        manager.set_unified_desktop_enabled(true).unwrap();
        assert!(manager.is_in_unified_mode());
        assert_eq!(manager.active_display_ids(), vec![UNIFIED_DISPLAY_ID]);
        assert_eq!(manager.display_at(0).bounds, Rect::new(0, 0, 3270, 1080));
        assert_eq!(manager.mirroring_display_by_id(2).bounds, Rect::new(1920, 0, 1350, 1080));
        assert_eq!(manager.current_display_id_list(), DisplayIdList::new([1, 2]));

        let events = drain(&mut events);
        assert!(matches!(&events[0], DisplayEvent::Removed(d) if d.id == 1));
        assert!(matches!(&events[1], DisplayEvent::Removed(d) if d.id == 2));
        assert!(matches!(&events[2], DisplayEvent::Added(d) if d.id == UNIFIED_DISPLAY_ID));

        manager.set_unified_desktop_enabled(false).unwrap();
        assert_eq!(manager.active_display_ids(), vec![1, 2]);
        assert!(!manager.is_in_unified_mode());
    }

    #[test]
    fn test_unified_zoom_and_reset() {
        let (mut manager, _events) = manager_with(DisplayManagerOptions {
            unified_desktop_enabled: true,
            ..Default::default()
        });
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 1920, 0, 1280, 1024)])
            .unwrap();
        assert!(manager.is_in_unified_mode());

        assert!(manager.zoom_internal_display(false).unwrap());
        assert_eq!(manager.display_at(0).bounds, Rect::new(0, 0, 3100, 1024));
        assert_eq!(
            manager.selected_mode(UNIFIED_DISPLAY_ID).map(|m| m.size),
            Some(Size::new(3100, 1024))
        );

        assert!(manager.reset_internal_display_zoom().unwrap());
        assert_eq!(manager.display_at(0).bounds, Rect::new(0, 0, 3270, 1080));
    }

    #[test]
    fn test_software_mirror_and_deferred_task() {
        let (mut manager, mut events) = manager();
        let mut delegate = quiet_delegate();
        delegate
            .expect_create_or_update_mirroring_display()
            .withf(|infos: &[PhysicalDisplayRecord]| infos.len() == 1 && infos[0].id == 2)
            .times(1)
            .return_const(());
        manager.set_delegate(Box::new(delegate));

        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 1920, 0, 1280, 1024)])
            .unwrap();
        drain(&mut events);
        assert!(!manager.has_pending_tasks());

        manager.set_mirror_mode(true).unwrap();
        assert!(manager.is_in_mirror_mode());
        assert!(manager.software_mirroring_enabled());
        assert_eq!(manager.active_display_ids(), vec![1]);
        assert_eq!(
            manager.resolved_mode(),
            &ResolvedMode::Mirrored {
                source_id: 1,
                target_id: 2
            }
        );
        assert!(matches!(drain(&mut events).first(), Some(DisplayEvent::Removed(d)) if d.id == 2));

        assert!(manager.has_pending_tasks());
        assert!(manager.run_pending_tasks());
        assert!(!manager.has_pending_tasks());
        assert!(!manager.run_pending_tasks());
    }

    #[test]
    fn test_mirror_mode_needs_two_displays() {
        let (mut manager, _events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();
        manager.set_mirror_mode(true).unwrap();
        assert!(!manager.is_in_mirror_mode());
        assert_eq!(manager.multi_display_mode(), MultiDisplayMode::Extended);
    }

    #[test]
    fn test_mirror_mode_goes_through_configurator() {
        let (mut manager, _events) = manager_with(DisplayManagerOptions {
            configure_displays: true,
            ..Default::default()
        });
        let mut configurator = MockDisplayConfigurator::new();
        configurator
            .expect_set_display_state()
            .withf(|state| *state == MultipleDisplayState::DualMirror)
            .times(1)
            .return_const(());
        manager.set_configurator(Box::new(configurator));
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 1920, 0, 1280, 1024)])
            .unwrap();

        manager.set_mirror_mode(true).unwrap();
        assert!(!manager.is_in_mirror_mode());
    }

    // =========================================================================
    // Modes and properties
    // =========================================================================

    #[test]
    fn test_set_display_mode_round_trip() {
        let (mut manager, _events) = manager_with(DisplayManagerOptions {
            configure_displays: true,
            ..Default::default()
        });
        let mut configurator = MockDisplayConfigurator::new();
        configurator
            .expect_on_configuration_changed()
            .times(1)
            .return_const(());
        manager.set_configurator(Box::new(configurator));
        manager
            .on_native_displays_changed(vec![with_modes(record(1, 0, 0, 1920, 1080))])
            .unwrap();

        let requested = DisplayMode::new(Size::new(1280, 720), 60.0, false, false, 1.0, 1.0);
        assert!(manager.set_display_mode(1, &requested).unwrap());
        assert!(manager.active_mode(1).expect("mode").is_equivalent(&requested));
    }

    #[test]
    fn test_set_display_mode_rejection_is_noop() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![with_modes(record(1, 0, 0, 1920, 1080))])
            .unwrap();
        drain(&mut events);
        let before = manager.active_mode(1);
        let record_before = manager.display_info(1).cloned();

        let bogus = DisplayMode::new(Size::new(640, 480), 60.0, false, false, 1.0, 1.0);
        let result = manager.set_display_mode(1, &bogus);
        assert!(matches!(result, Err(DisplayError::UnsupportedMode { .. })));
        assert_eq!(manager.active_mode(1), before);
        assert_eq!(manager.display_info(1).cloned(), record_before);
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn test_set_display_mode_scale_change_notifies() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![with_modes(record(1, 0, 0, 1920, 1080))])
            .unwrap();
        drain(&mut events);

        let hidpi = DisplayMode::new(Size::new(1024, 768), 60.0, false, false, 1.0, 2.0);
        assert!(manager.set_display_mode(1, &hidpi).unwrap());
        assert_eq!(manager.display_for_id(1).device_scale_factor, 2.0);
        let events = drain(&mut events);
        assert!(matches!(
            &events[0],
            DisplayEvent::MetricsChanged { metrics, .. }
                if metrics.contains(DisplayMetric::DeviceScaleFactor)
        ));
    }

    #[test]
    fn test_set_display_mode_inactive_display() {
        let (mut manager, _events) = manager();
        let mode = DisplayMode::new(Size::new(1280, 720), 60.0, false, false, 1.0, 1.0);
        assert_eq!(
            manager.set_display_mode(9, &mode),
            Err(DisplayError::DisplayNotActive(9))
        );
    }

    #[test]
    fn test_zoom_internal_display_steps_ui_scale() {
        let (mut manager, mut events) = manager_with(DisplayManagerOptions {
            first_display_as_internal: true,
            ..Default::default()
        });
        manager.on_native_displays_changed(Vec::new()).unwrap();
        drain(&mut events);
        let id = SYNTHETIC_DISPLAY_ID_START;

        assert!(manager.zoom_internal_display(true).unwrap());
        assert_eq!(manager.display_info(id).map(|r| r.configured_ui_scale), Some(1.125));
        assert_eq!(manager.display_for_id(id).bounds, Rect::new(0, 0, 1536, 864));
        assert_eq!(drain(&mut events).len(), 1);

        assert!(manager.reset_internal_display_zoom().unwrap());
        assert_eq!(manager.display_for_id(id).bounds, Rect::new(0, 0, 1366, 768));
    }

    #[test]
    fn test_rotation_of_active_display() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();
        drain(&mut events);

        manager
            .set_display_rotation(1, Rotation::Rotate90, RotationSource::User)
            .unwrap();
        assert_eq!(manager.display_for_id(1).bounds, Rect::new(0, 0, 1080, 1920));
        let drained = drain(&mut events);
        assert!(matches!(
            &drained[0],
            DisplayEvent::MetricsChanged { metrics, .. }
                if metrics.contains(DisplayMetric::Rotation | DisplayMetric::Bounds)
        ));

        // Same rotation again changes nothing
        manager
            .set_display_rotation(1, Rotation::Rotate90, RotationSource::User)
            .unwrap();
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn test_registered_properties_restore_on_plug() {
        let (mut manager, _events) = manager();
        manager.register_display_property(
            5,
            &DisplayProperties {
                rotation: Rotation::Rotate180,
                ui_scale: 1.0,
                overscan_insets: Some(Insets::new(10, 10, 10, 10)),
                ..Default::default()
            },
        );
        manager
            .on_native_displays_changed(vec![record(5, 0, 0, 1920, 1080)])
            .unwrap();

        let display = manager.display_for_id(5);
        assert_eq!(display.rotation, Rotation::Rotate180);
        assert_eq!(display.bounds, Rect::new(0, 0, 1900, 1060));
        assert_eq!(manager.overscan_insets(5), Insets::new(10, 10, 10, 10));
    }

    #[test]
    fn test_overscan_set_and_clear() {
        let (mut manager, _events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();

        manager.set_overscan_insets(1, Insets::new(20, 20, 20, 20)).unwrap();
        assert_eq!(manager.display_for_id(1).bounds, Rect::new(0, 0, 1880, 1040));

        manager.set_overscan_insets(1, Insets::default()).unwrap();
        assert_eq!(manager.display_for_id(1).bounds, Rect::new(0, 0, 1920, 1080));
        assert!(manager.overscan_insets(1).is_empty());
    }

    #[test]
    fn test_work_area_update() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();
        drain(&mut events);

        assert!(manager.update_work_area_of_display(1, Insets::new(0, 0, 48, 0)));
        assert!(!manager.update_work_area_of_display(1, Insets::new(0, 0, 48, 0)));
        assert_eq!(manager.display_for_id(1).work_area, Rect::new(0, 0, 1920, 1032));
        assert_eq!(drain(&mut events).len(), 1);

        // Insets survive a pass that does not change the display
        manager.update_displays().unwrap();
        assert_eq!(manager.display_for_id(1).work_area, Rect::new(0, 0, 1920, 1032));
    }

    #[test]
    fn test_color_profile_requires_availability() {
        let (mut manager, _events) = manager();
        let mut info = record(1, 0, 0, 1920, 1080);
        info.available_color_profiles = vec![ColorProfile::Movie];
        manager.on_native_displays_changed(vec![info]).unwrap();

        assert!(!manager.set_color_calibration_profile(1, ColorProfile::Reading));
        assert!(manager.set_color_calibration_profile(1, ColorProfile::Movie));
        assert_eq!(
            manager.display_info(1).map(|r| r.color_profile),
            Some(ColorProfile::Movie)
        );
    }

    #[test]
    fn test_update_display_bounds_on_host_resize() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1366, 768)])
            .unwrap();
        drain(&mut events);

        assert!(manager.update_display_bounds(1, Rect::new(0, 0, 1600, 900)));
        assert_eq!(manager.display_for_id(1).bounds, Rect::new(0, 0, 1600, 900));
        assert!(matches!(
            drain(&mut events).first(),
            Some(DisplayEvent::MetricsChanged { metrics, .. }) if *metrics == BitFlags::from(DisplayMetric::Bounds)
        ));
    }

    // =========================================================================
    // Layout
    // =========================================================================

    #[test]
    fn test_set_layout_for_current_displays() {
        let (mut manager, mut events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 1920, 0, 1280, 1024)])
            .unwrap();
        drain(&mut events);

        let layout = Layout {
            primary_id: 1,
            placement_list: vec![crate::display::DisplayPlacement::new(2, 1, Position::Bottom, 0)],
            ..Layout::default()
        };
        manager.set_layout_for_current_displays(layout.clone()).unwrap();
        assert_eq!(manager.display_for_id(2).bounds, Rect::new(0, 1080, 1280, 1024));
        let first = drain(&mut events);
        assert_eq!(first.len(), 1);
        assert!(matches!(
            &first[0],
            DisplayEvent::MetricsChanged { display, metrics }
                if display.id == 2 && *metrics == DisplayMetric::Bounds | DisplayMetric::WorkArea
        ));

        // Same placements again is a no-op
        manager.set_layout_for_current_displays(layout).unwrap();
        assert!(drain(&mut events).is_empty());
        assert_eq!(manager.current_resolved_layout().primary_id, 1);
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let (mut manager, _events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080), record(2, 1920, 0, 1280, 1024)])
            .unwrap();
        let layout = Layout {
            primary_id: 3,
            ..Layout::default()
        };
        assert!(matches!(
            manager.set_layout_for_current_displays(layout),
            Err(DisplayError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_single_display_layout_falls_back() {
        let (mut manager, _events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();
        let layout = manager.current_display_layout();
        assert_eq!(layout.primary_id, 1);
        assert!(layout.placement_list.is_empty());
    }

    #[test]
    fn test_display_lookup_sentinels() {
        let (mut manager, _events) = manager();
        manager
            .on_native_displays_changed(vec![record(1, 0, 0, 1920, 1080)])
            .unwrap();
        assert!(!manager.display_for_id(42).is_valid());
        assert!(!manager.display_at(3).is_valid());
        assert!(!manager.find_display_containing_point(Point::new(5000, 5000)).is_valid());
        assert_eq!(manager.find_display_containing_point(Point::new(10, 10)).id, 1);
        assert!(!manager.secondary_display().is_valid());
        assert_eq!(manager.display_name_for_id(INVALID_DISPLAY_ID), "Unknown Display");
        assert_eq!(manager.display_name_for_id(1), "Display 1");
        assert_eq!(manager.display_name_for_id(99), "Display 99");
    }
}
