//! Device interaction module
//!
//! Everything that talks to phones through the external `adb` and
//! `fastboot` tools, plus the value types describing what was found.
//!
//! # Submodules
//!
//! - `record` - `DeviceMode`, `DeviceRecord` and related enums
//! - `traits` - `ProcessRunner` and `DownloadModeProbe` seams
//! - `process` - `SystemProcessRunner`, the real process runner
//! - `extract` - getvar response parsing and derived-value parsers
//! - `rules` - ordered matching tables (manufacturer, lock state)
//! - `transport` - listing parsers and per-tick command plumbing
//! - `classifier` - mode classification for one serial
//! - `builder` - fills a `DeviceRecord` for a classified serial
//! - `reboot` - reboot planning and execution
//!
//! # Architecture
//!
//! All process invocations go through a `ProcessRunner`, so the classifier,
//! builder and reboot tool work the same against `SystemProcessRunner` and
//! against the scripted fake in `testdb`.

pub mod builder;
pub mod classifier;
pub mod extract;
pub mod process;
pub mod reboot;
pub mod record;
pub mod rules;
pub mod traits;
pub mod transport;

pub use classifier::{Classification, ModeClassifier, Visibility};
pub use process::SystemProcessRunner;
pub use reboot::{failure_hint, plan_reboot, RebootPlan, RebootTarget, RebootTool};
pub use record::{BatteryStatus, DeviceMode, DeviceRecord, LockState, UnlockAbility};
pub use traits::{CommandOutput, DownloadModeProbe, ProcessRunner, RunStatus, UsbEnumerationStub};
pub use transport::{ProbeResult, Tool, TransportSession, TransportSettings};
