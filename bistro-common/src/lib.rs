//! Utilities shared across the Bistro crates.
//!
//! Depends on nothing else in the workspace; the binary and every library
//! crate may use it.
//!
//! # Overview
//!
//! - [`observability`]: one-time `tracing` initialisation with a rolling file
//!   sink and optional stderr mirroring.
//!
//! # Examples
//!
//! ```rust
//! use bistro_common::observability::{LogConfig, LogFormat};
//!
//! let cfg = LogConfig {
//!     app_name: "bistro-doc",
//!     format: LogFormat::Json,
//!     ..LogConfig::default()
//! };
//! assert_eq!(cfg.default_filter, "info");
//! ```

pub mod observability;
