//! Utility Functions
//!
//! User-friendly error formatting for the binary.
//!
//! ```rust,no_run
//! use lamco_display_topology::utils::format_user_error;
//!
//! fn run() -> anyhow::Result<()> {
//!     anyhow::bail!("Failed to read config file: display.toml")
//! }
//!
//! if let Err(e) = run() {
//!     eprintln!("{}", format_user_error(&e));
//! }
//! ```

pub mod errors;

pub use errors::format_user_error;
