//! # lamco-display-topology
//!
//! Display topology reconciliation engine.
//!
//! Tracks every physical display the system has seen, decides which logical
//! displays are active for the current multi-display mode (extended, mirrored
//! or unified), places them with persisted layouts, and tells observers
//! exactly what was added, removed or changed after each hardware event or
//! user request.
//!
//! # Architecture
//!
//! ```text
//! lamco-display-topology
//!   ├─> display   (registry, mode selection, layouts, topology, reconciliation)
//!   ├─> config    (TOML settings, persisted display properties and layouts)
//!   ├─> control   (line-oriented command loop over the manager)
//!   └─> utils     (user-facing error formatting)
//! ```
//!
//! # Data Flow
//!
//! **Hardware Path:** native records → Registry → Topology → Reconciler → Observers
//!
//! **User Path:** command → DisplayManager setter → Registry → same pass as above

#![warn(clippy::all)]

/// Configuration loading and persisted display state
pub mod config;

/// Interactive command loop
pub mod control;

/// Display registry, layouts, topology and reconciliation
pub mod display;

/// Utility functions
pub mod utils;
