//! Test Database Module
//!
//! Tooling for exercising the detection engine without any phone attached.
//!
//! # Features
//!
//! - **Scripted runner**: a `ProcessRunner` that answers from a table of
//!   command lines instead of spawning processes
//! - **Fixtures**: realistic tool output for phones in each mode
//! - **Scenarios**: multi-tick fleets with the events each tick must produce
//! - **Scenario runner**: replays scenarios through the real detector
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use droid_monitor::testdb::{ScenarioLibrary, ScenarioRunner};
//!
//! let summary = ScenarioRunner::new().run_all(&ScenarioLibrary::all());
//! println!("Passed: {}/{}", summary.passed, summary.total);
//! ```
//!
//! # Available Scenarios
//!
//! - `no_devices` - nothing attached
//! - `single_adb` - one debug-mode phone, second tick silent
//! - `fastbootd_listing` - userspace fastboot flagged by the listing
//! - `legacy_fastboot` - legacy bootloader after negative probes
//! - `mode_cycle` - connect, reboot to fastbootd, unplug
//! - `mixed_fleet` - every listing-derived mode at once
//! - `missing_fastboot` - bootloader tool cannot be started
//! - `hotplug_churn` - devices plugged and unplugged between ticks
//! - `dual_visibility` - same serial on both listings

pub mod fixtures;
pub mod mock_runner;
pub mod runner;
pub mod scenarios;

pub use mock_runner::ScriptedRunner;
pub use runner::{ScenarioResult, ScenarioRunner, TestSummary};
pub use scenarios::{ExpectedEvent, ScenarioLibrary, TestScenario, TickStep};
