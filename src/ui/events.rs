//! UI Events Module
//!
//! Event types produced by the detection engine and consumed by a
//! presentation layer. All of them are plain data, safe to send through
//! channels to any frontend.

use std::fmt;
use std::time::Duration;

use crate::device::{DeviceMode, DeviceRecord};

// =============================================================================
// Device Events
// =============================================================================

/// Change in the set of attached devices between two poll ticks
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A serial appeared that was not visible on the previous tick
    Connected {
        /// Full record built on this tick
        record: DeviceRecord,
    },

    /// A known serial is now in a different mode
    ModeChanged {
        serial: String,
        /// Mode on the previous tick
        previous: DeviceMode,
        /// Mode on this tick
        mode: DeviceMode,
    },

    /// A serial visible on the previous tick is gone
    Disconnected { serial: String },
}

impl DeviceEvent {
    /// Serial the event is about
    pub fn serial(&self) -> &str {
        match self {
            DeviceEvent::Connected { record } => &record.serial,
            DeviceEvent::ModeChanged { serial, .. } => serial,
            DeviceEvent::Disconnected { serial } => serial,
        }
    }

    /// Short tag used by line-oriented output
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceEvent::Connected { .. } => "connected",
            DeviceEvent::ModeChanged { .. } => "mode-changed",
            DeviceEvent::Disconnected { .. } => "disconnected",
        }
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceEvent::Connected { record } => write!(
                f,
                "Device connected: {} ({}) [{}]",
                record.serial,
                record.display_name(),
                record.mode
            ),
            DeviceEvent::ModeChanged {
                serial,
                previous,
                mode,
            } => write!(f, "Device {} changed mode: {} -> {}", serial, previous, mode),
            DeviceEvent::Disconnected { serial } => write!(f, "Device disconnected: {}", serial),
        }
    }
}

// =============================================================================
// Monitor Events
// =============================================================================

/// Lifecycle notifications from the background monitor
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Monitoring started
    Started {
        /// Interval between ticks
        poll_interval: Duration,
    },

    /// A tick finished
    TickCompleted {
        /// Devices visible after the tick
        devices: usize,
        /// Wall time of the tick
        duration: Duration,
    },

    /// A helper tool could not be started during a tick
    TransportUnavailable {
        /// Tool name
        tool: &'static str,
    },

    /// Monitoring stopped
    Stopped,
}

// =============================================================================
// Combined Event Type
// =============================================================================

/// Everything the monitor can send to a frontend
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Device set changed
    Device(DeviceEvent),
    /// Monitor lifecycle
    Monitor(MonitorEvent),
}

impl From<DeviceEvent> for UiEvent {
    fn from(event: DeviceEvent) -> Self {
        UiEvent::Device(event)
    }
}

impl From<MonitorEvent> for UiEvent {
    fn from(event: MonitorEvent) -> Self {
        UiEvent::Monitor(event)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Format a duration for event lines ("850ms", "2.3s", "1m 5s")
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(2300)), "2.3s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_event_serial_and_display() {
        let record = DeviceRecord::new("ABC123", DeviceMode::Adb);
        let connected = DeviceEvent::Connected { record };
        assert_eq!(connected.serial(), "ABC123");
        assert_eq!(connected.kind(), "connected");
        assert_eq!(connected.to_string(), "Device connected: ABC123 (ABC123) [ADB]");

        let changed = DeviceEvent::ModeChanged {
            serial: "ABC123".into(),
            previous: DeviceMode::Adb,
            mode: DeviceMode::Fastbootd,
        };
        assert_eq!(
            changed.to_string(),
            "Device ABC123 changed mode: ADB -> Fastbootd"
        );
    }

    #[test]
    fn test_ui_event_conversions() {
        let ui: UiEvent = DeviceEvent::Disconnected {
            serial: "X".into(),
        }
        .into();
        assert!(matches!(ui, UiEvent::Device(_)));

        let ui: UiEvent = MonitorEvent::Stopped.into();
        assert!(matches!(ui, UiEvent::Monitor(MonitorEvent::Stopped)));
    }
}
