//! UI Support Module
//!
//! Frontend-agnostic plumbing for showing live device state: the event types
//! a frontend consumes and the background monitor that produces them.
//!
//! # Architecture
//!
//! - [`events`] - Device and monitor events, plus formatting helpers
//! - [`device_monitor`] - Background detection loop with a channel-based
//!   control surface
//!
//! # Threading Model
//!
//! 1. **Event Channel** - The monitor thread sends `UiEvent`s that the
//!    frontend polls without blocking
//! 2. **Control Channel** - Refresh and stop requests are queued to the
//!    monitor thread, so ticks never overlap
//! 3. **Atomic State** - Running state and loop phase are readable from any
//!    thread without locking
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use droid_monitor::core::detector::DeviceDetector;
//! use droid_monitor::device::{SystemProcessRunner, TransportSettings};
//! use droid_monitor::ui::{DeviceMonitor, MonitorConfig, UiEvent};
//! use std::time::Duration;
//!
//! let detector = DeviceDetector::new(SystemProcessRunner::new(), TransportSettings::default());
//! let monitor = DeviceMonitor::with_config(detector, MonitorConfig::fast());
//! monitor.start_monitoring().unwrap();
//!
//! loop {
//!     if let Some(UiEvent::Device(event)) = monitor.recv_event_timeout(Duration::from_secs(1)) {
//!         println!("{}", event);
//!     }
//!     # break;
//! }
//! ```

pub mod device_monitor;
pub mod events;

pub use device_monitor::{DeviceMonitor, MonitorConfig, MonitorState};
pub use events::{format_duration, DeviceEvent, MonitorEvent, UiEvent};
