//! Core functionality module
//!
//! Configuration, error types, and the detection loop itself.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `snapshot` - Per-tick device snapshot and event diffing
//! - `detector` - One detection tick across both transports

pub mod config;
pub mod detector;
pub mod error;
pub mod snapshot;
