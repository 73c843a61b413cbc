//! Display Topology Module
//!
//! Keeps the authoritative record of every physical display ever seen, derives
//! the set of active logical displays for the current multi-display mode, and
//! reconciles that set against the previous one into ordered notifications.
//!
//! # Pipeline
//!
//! ```text
//! hardware event ──► DisplayRegistry ──► Topology Builder ──► Reconciler ──► ObserverBus
//!                        ▲    ▲               │    ▲
//!                        │    └─ ModeSelector ┘    └─ LayoutStore
//!        persisted properties
//! ```
//!
//! Every stage runs synchronously on the caller's thread. The only deferred
//! work is (re)building the software mirroring target, which the caller runs
//! with [`DisplayManager::run_pending_tasks`] on its next loop iteration.
//!
//! # Multi-display modes
//!
//! - **Extended:** one logical display per connected panel, arranged by the
//!   layout registered for that set of ids.
//! - **Mirrored:** two panels show the same content. Hardware mirroring is
//!   detected from identical native origins; software mirroring keeps the
//!   source active and hands the target to the mirroring renderer.
//! - **Unified:** one synthetic display (id [`UNIFIED_DISPLAY_ID`]) spanning
//!   all panels scaled to the tallest one.
//!
//! # Example
//!
//! ```
//! use lamco_display_topology::display::{
//!     parse_display_spec, ChannelObserver, DisplayManager, DisplayManagerOptions,
//! };
//!
//! let mut manager = DisplayManager::new(DisplayManagerOptions::default());
//! let (observer, mut events) = ChannelObserver::channel();
//! manager.add_observer(Box::new(observer));
//!
//! let panel = parse_display_spec("1920x1080", 1).unwrap();
//! manager.on_native_displays_changed(vec![panel]).unwrap();
//!
//! assert_eq!(manager.active_display_ids(), vec![1]);
//! assert!(events.try_recv().is_ok());
//! ```

pub mod bootstrap;
pub mod delegate;
pub mod geometry;
pub mod info;
pub mod layout;
pub mod logical;
pub mod manager;
pub mod mode;
pub mod observer;
pub mod reconcile;
pub mod registry;
pub mod topology;

pub use bootstrap::{
    parse_display_spec, parse_display_spec_list, SpecParseError, SyntheticIdAllocator,
};
pub use delegate::{DisplayConfigurator, DisplayDelegate, LoggingDelegate, MultipleDisplayState};
pub use geometry::{Insets, Point, Rect, Size};
pub use info::{
    ColorProfile, DisplayMode, PhysicalDisplayRecord, Rotation, RotationSource,
    TouchCalibrationData, TouchSupport,
};
pub use layout::{
    DisplayIdList, DisplayPlacement, Layout, LayoutStore, Position, MINIMUM_OVERLAP_FOR_INVALID_OFFSET,
};
pub use logical::LogicalDisplay;
pub use manager::{DisplayManager, DisplayManagerOptions};
pub use mode::{ModeChange, ModeSelector};
pub use observer::{ChannelObserver, DisplayEvent, DisplayObserver, ObserverBus, ObserverId};
pub use reconcile::{reconcile, DisplayMetric, ReconcileResult};
pub use registry::{DisplayProperties, DisplayRegistry};
pub use topology::{MultiDisplayMode, ResolvedMode};

use thiserror::Error;

/// Stable 64-bit display identifier
pub type DisplayId = i64;

/// Sentinel for "no display"
pub const INVALID_DISPLAY_ID: DisplayId = -1;

/// Reserved id of the synthetic unified display
pub const UNIFIED_DISPLAY_ID: DisplayId = -10;

/// First id handed out to displays created from textual specs
pub const SYNTHETIC_DISPLAY_ID_START: DisplayId = 2_200_000_000;

/// Display topology result type
pub type Result<T> = std::result::Result<T, DisplayError>;

/// Display topology error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DisplayError {
    /// Requested mode is not in the display's candidate list
    #[error("Unsupported display mode for {display_id}: {mode}")]
    UnsupportedMode { display_id: DisplayId, mode: String },

    /// No record exists for the id
    #[error("Display not found: {0}")]
    DisplayNotFound(DisplayId),

    /// Display is known but not part of the active set
    #[error("Display is not active: {0}")]
    DisplayNotActive(DisplayId),

    /// A reconciliation pass was requested while one is running
    #[error("Display update requested while an update is in progress")]
    ReentrantUpdate,

    /// Layout does not fit the current set of displays
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// Bootstrap spec could not be parsed
    #[error("Display spec error: {0}")]
    Spec(#[from] SpecParseError),
}
