//! Abstraction traits for testability
//!
//! The detection engine never touches the OS directly. Every external tool
//! invocation goes through a `ProcessRunner`, so the whole engine can be
//! driven by a scripted fake in tests (see `testdb::ScriptedRunner`).
//!
//! # Architecture
//!
//! - `ProcessRunner` - runs a program with arguments and a timeout
//! - `CommandOutput` / `RunStatus` - what a run produced and how it ended
//! - `DownloadModeProbe` - hardware-level download mode detection hook
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use droid_monitor::device::{ProcessRunner, SystemProcessRunner};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let runner = SystemProcessRunner::new();
//! let output = runner.run(Path::new("adb"), &["devices"], Duration::from_secs(3));
//! if output.success() {
//!     println!("{}", output.stdout);
//! }
//! ```

use crate::core::error::{DetectorError, Result};
use std::path::Path;
use std::time::Duration;

/// How a process run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Process exited on its own with this code
    Exited(i32),
    /// Process was terminated by a signal (or crashed) without an exit code
    Signaled,
    /// Process exceeded its timeout and was killed
    TimedOut,
    /// Process could not be started (missing binary, permission denied)
    SpawnFailed(String),
}

/// Captured result of one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: RunStatus,
}

impl CommandOutput {
    /// A run that exited with `code`
    pub fn exited(code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            status: RunStatus::Exited(code),
        }
    }

    /// The designated timeout result; partial output is discarded
    pub fn timed_out() -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            status: RunStatus::TimedOut,
        }
    }

    /// A run that never started
    pub fn spawn_failed(reason: &str) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            status: RunStatus::SpawnFailed(reason.to_string()),
        }
    }

    /// A run killed by a signal
    pub fn signaled(stdout: &str, stderr: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            status: RunStatus::Signaled,
        }
    }

    /// Exited with code 0
    pub fn success(&self) -> bool {
        self.status == RunStatus::Exited(0)
    }

    pub fn is_timed_out(&self) -> bool {
        self.status == RunStatus::TimedOut
    }

    pub fn is_spawn_failure(&self) -> bool {
        matches!(self.status, RunStatus::SpawnFailed(_))
    }

    /// Exit code, if the process exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            RunStatus::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// stderr followed by stdout
    ///
    /// The bootloader tool prints variable values on stderr, so parsers that
    /// do not care which stream a line came from read this.
    pub fn combined(&self) -> String {
        match (self.stderr.is_empty(), self.stdout.is_empty()) {
            (true, _) => self.stdout.clone(),
            (_, true) => self.stderr.clone(),
            _ => format!("{}\n{}", self.stderr, self.stdout),
        }
    }

    /// Convert into stdout on success or a typed error otherwise
    pub fn into_result(self, command: &str, timeout: Duration) -> Result<String> {
        match self.status {
            RunStatus::Exited(0) => Ok(self.stdout),
            RunStatus::Exited(code) => Err(DetectorError::CommandFailed {
                command: command.to_string(),
                code,
                stderr: self.stderr.trim().to_string(),
            }),
            RunStatus::Signaled => Err(DetectorError::Signaled {
                command: command.to_string(),
            }),
            RunStatus::TimedOut => Err(DetectorError::Timeout {
                command: command.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            RunStatus::SpawnFailed(reason) => Err(DetectorError::ToolUnavailable {
                tool: command.split_whitespace().next().unwrap_or(command).to_string(),
                reason,
            }),
        }
    }
}

/// Trait for running external programs
///
/// Implementations must enforce the timeout by killing the child, must not
/// leak handles across calls, and must never panic on command failure.
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args`, waiting at most `timeout`
    fn run(&self, program: &Path, args: &[&str], timeout: Duration) -> CommandOutput;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, program: &Path, args: &[&str], timeout: Duration) -> CommandOutput {
        (**self).run(program, args, timeout)
    }
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for std::sync::Arc<R> {
    fn run(&self, program: &Path, args: &[&str], timeout: Duration) -> CommandOutput {
        (**self).run(program, args, timeout)
    }
}

/// Hook for download modes that need USB-level enumeration
pub trait DownloadModeProbe: Send + Sync {
    /// Human-readable probe name, used in logs
    fn name(&self) -> &'static str;

    /// Whether `serial` is currently attached in this download mode
    fn detect(&self, serial: &str) -> bool;
}

/// Download-mode probe for modes that require USB enumeration
///
/// USB-level enumeration is not implemented, so this always reports
/// "not detected".
#[derive(Debug, Clone, Copy)]
pub struct UsbEnumerationStub {
    name: &'static str,
}

impl UsbEnumerationStub {
    /// Qualcomm EDL (9008) probe
    pub fn edl() -> Self {
        Self { name: "edl-9008" }
    }

    /// MediaTek download-agent probe
    pub fn mtk_da() -> Self {
        Self { name: "mtk-da" }
    }
}

impl DownloadModeProbe for UsbEnumerationStub {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&self, _serial: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_status_helpers() {
        let ok = CommandOutput::exited(0, "out", "");
        assert!(ok.success());
        assert_eq!(ok.exit_code(), Some(0));

        let failed = CommandOutput::exited(1, "", "boom");
        assert!(!failed.success());
        assert_eq!(failed.exit_code(), Some(1));

        let timeout = CommandOutput::timed_out();
        assert!(timeout.is_timed_out());
        assert_eq!(timeout.exit_code(), None);
        assert!(timeout.stdout.is_empty());

        let missing = CommandOutput::spawn_failed("not found");
        assert!(missing.is_spawn_failure());
        assert!(!missing.success());
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(CommandOutput::exited(0, "a", "").combined(), "a");
        assert_eq!(CommandOutput::exited(0, "", "b").combined(), "b");
        assert_eq!(CommandOutput::exited(0, "a", "b").combined(), "b\na");
    }

    #[test]
    fn test_into_result_variants() {
        let timeout = Duration::from_millis(1500);

        assert_eq!(
            CommandOutput::exited(0, "fine", "")
                .into_result("adb reboot", timeout)
                .unwrap(),
            "fine"
        );

        let err = CommandOutput::exited(1, "", "error: no devices\n")
            .into_result("adb reboot", timeout)
            .unwrap_err();
        assert!(matches!(
            err,
            DetectorError::CommandFailed { code: 1, ref stderr, .. } if stderr == "error: no devices"
        ));

        let err = CommandOutput::timed_out()
            .into_result("adb reboot", timeout)
            .unwrap_err();
        assert!(matches!(err, DetectorError::Timeout { timeout_ms: 1500, .. }));

        let err = CommandOutput::spawn_failed("No such file or directory")
            .into_result("fastboot devices", timeout)
            .unwrap_err();
        assert!(matches!(err, DetectorError::ToolUnavailable { ref tool, .. } if tool == "fastboot"));
    }

    #[test]
    fn test_download_mode_stubs_never_detect() {
        let edl = UsbEnumerationStub::edl();
        let mtk = UsbEnumerationStub::mtk_da();
        assert_eq!(edl.name(), "edl-9008");
        assert_eq!(mtk.name(), "mtk-da");
        assert!(!edl.detect("ABC123"));
        assert!(!mtk.detect("ABC123"));
    }
}
