//! Error types for the device monitor
//!
//! The detection engine itself never surfaces these to its caller: probe
//! failures become empty attributes and diagnostics on the record. These
//! variants are used by the process layer's `into_result`, the reboot tool,
//! the monitor control surface and the CLI.

use thiserror::Error;

/// Main error type for the device monitor
#[derive(Error, Debug)]
pub enum DetectorError {
    /// Helper binary missing or not executable
    #[error("Tool '{tool}' is unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    /// Command did not finish in time and was killed
    #[error("Command '{command}' timed out after {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// Command ran and exited non-zero
    #[error("Command '{command}' failed with exit code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Command was terminated by a signal
    #[error("Command '{command}' was terminated by a signal")]
    Signaled { command: String },

    /// No device with this serial is currently attached
    #[error("Device '{0}' not found. Check the cable and that the device is authorized.")]
    DeviceNotFound(String),

    /// The requested reboot cannot be issued from the device's current mode
    #[error("Cannot reboot from {from} to {to}")]
    UnsupportedReboot { from: String, to: String },

    /// The device is already in the requested mode
    #[error("Device is already in {0} mode")]
    AlreadyInMode(String),

    /// Monitor control was used while monitoring is stopped
    #[error("Device monitor is not running")]
    MonitorNotRunning,

    /// General I/O error
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration problem
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DetectorError>;

impl From<std::io::Error> for DetectorError {
    fn from(err: std::io::Error) -> Self {
        DetectorError::Io(err.to_string())
    }
}

impl From<crate::core::config::ConfigError> for DetectorError {
    fn from(err: crate::core::config::ConfigError) -> Self {
        DetectorError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DetectorError::Timeout {
            command: "fastboot devices".to_string(),
            timeout_ms: 3000,
        };
        assert_eq!(
            err.to_string(),
            "Command 'fastboot devices' timed out after 3000 ms"
        );

        let err = DetectorError::UnsupportedReboot {
            from: "Fastboot".to_string(),
            to: "EDL".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot reboot from Fastboot to EDL");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DetectorError = io.into();
        assert!(matches!(err, DetectorError::Io(ref msg) if msg.contains("missing")));
    }
}
