//! Android Device Monitor Library
//!
//! Detects Android devices attached over the debug bridge (`adb`) and the
//! bootloader protocol (`fastboot`), works out which mode each one is in,
//! collects what the current mode exposes about it, and reports devices
//! connecting, disconnecting and changing mode between polls.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration, error types, snapshots and the detection tick
//! - [`device`] - Process plumbing, output parsing, mode classification,
//!   record building and reboots
//! - [`ui`] - Event types and the background `DeviceMonitor`
//! - [`cli`] - Command-line interface (only used by the binary)
//! - [`testdb`] - Scripted process runner, fixtures and detection scenarios
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use droid_monitor::core::config::Config;
//! use droid_monitor::core::detector::DeviceDetector;
//! use droid_monitor::device::SystemProcessRunner;
//!
//! let config = Config::load_default().unwrap_or_default();
//! let mut detector = DeviceDetector::from_config(SystemProcessRunner::new(), &config);
//!
//! let report = detector.tick();
//! for event in &report.events {
//!     println!("{}", event);
//! }
//! for record in detector.snapshot().iter() {
//!     println!("{} {} {}", record.serial, record.mode, record.display_name());
//! }
//! ```
//!
//! # Testing Without a Device
//!
//! ```rust,no_run
//! use droid_monitor::testdb::{ScenarioLibrary, ScenarioRunner};
//!
//! let summary = ScenarioRunner::new().run_all(&ScenarioLibrary::all());
//! println!("Passed: {}/{}", summary.passed, summary.total);
//! ```
//!
//! # Features
//!
//! - **Mode classification** - ADB, recovery, legacy fastboot and fastbootd
//! - **Per-mode attributes** - Android build data in ADB mode, bootloader
//!   product, version and lock state in fastboot modes
//! - **Change events** - Connect, disconnect and mode change per poll tick
//! - **Bounded probes** - Every tool call has a timeout and is killed on expiry
//! - **Reboots** - Between system, recovery, bootloader, fastbootd and EDL

pub mod cli;
pub mod core;
pub mod device;
pub mod testdb;
pub mod ui;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
