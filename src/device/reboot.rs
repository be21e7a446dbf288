//! Reboot tool
//!
//! Plans and issues mode-switch reboots. Planning is pure: given the current
//! mode, the target and whether root is available it yields the exact tool
//! and arguments, or a typed refusal. Execution goes through the same
//! `TransportSession` the detector uses.

use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};

use crate::core::error::{DetectorError, Result};
use crate::device::record::{DeviceMode, DeviceRecord};
use crate::device::traits::ProcessRunner;
use crate::device::transport::{Tool, TransportSession, TransportSettings};

/// Mode a device can be asked to reboot into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RebootTarget {
    System,
    Recovery,
    Bootloader,
    Fastbootd,
    Edl,
    Shutdown,
}

impl RebootTarget {
    pub const ALL: [RebootTarget; 6] = [
        RebootTarget::System,
        RebootTarget::Recovery,
        RebootTarget::Bootloader,
        RebootTarget::Fastbootd,
        RebootTarget::Edl,
        RebootTarget::Shutdown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RebootTarget::System => "system",
            RebootTarget::Recovery => "recovery",
            RebootTarget::Bootloader => "bootloader",
            RebootTarget::Fastbootd => "fastbootd",
            RebootTarget::Edl => "edl",
            RebootTarget::Shutdown => "shutdown",
        }
    }

    /// What the user should expect after the command is sent
    pub fn follow_up(&self) -> &'static str {
        match self {
            RebootTarget::System => "Device is restarting into the system",
            RebootTarget::Recovery => "Device is restarting into recovery",
            RebootTarget::Bootloader => "Device is restarting into the bootloader",
            RebootTarget::Fastbootd => "Device is restarting into fastbootd (Android 10+ only)",
            RebootTarget::Edl => "Device is entering EDL; it will show up as a 9008 port",
            RebootTarget::Shutdown => "Device is powering off",
        }
    }
}

impl fmt::Display for RebootTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RebootTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let alias = match lowered.as_str() {
            "fastboot" => "bootloader",
            "poweroff" | "off" => "shutdown",
            other => other,
        };
        RebootTarget::ALL
            .iter()
            .copied()
            .find(|t| t.name() == alias)
            .ok_or_else(|| {
                let names: Vec<_> = RebootTarget::ALL.iter().map(|t| t.name()).collect();
                format!("unknown reboot target '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// A concrete reboot command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebootPlan {
    pub tool: Tool,
    pub args: Vec<String>,
}

impl RebootPlan {
    fn adb(serial: &str, rest: &[&str]) -> Self {
        Self::with_serial(Tool::Adb, serial, rest)
    }

    fn fastboot(serial: &str, rest: &[&str]) -> Self {
        Self::with_serial(Tool::Fastboot, serial, rest)
    }

    fn with_serial(tool: Tool, serial: &str, rest: &[&str]) -> Self {
        let mut args = vec!["-s".to_string(), serial.to_string()];
        args.extend(rest.iter().map(|a| a.to_string()));
        Self { tool, args }
    }

    /// Command line as it would be typed
    pub fn command_line(&self) -> String {
        format!("{} {}", self.tool.name(), self.args.join(" "))
    }
}

/// Work out how to reboot `serial` from `mode` into `target`
pub fn plan_reboot(
    serial: &str,
    mode: DeviceMode,
    target: RebootTarget,
    has_root: bool,
) -> Result<RebootPlan> {
    let unsupported = || DetectorError::UnsupportedReboot {
        from: mode.label().to_string(),
        to: target.name().to_string(),
    };

    match mode {
        DeviceMode::Adb | DeviceMode::Recovery => {
            if mode == DeviceMode::Recovery && target == RebootTarget::Recovery {
                return Err(DetectorError::AlreadyInMode(mode.label().to_string()));
            }
            let shell_command = match target {
                RebootTarget::System => "reboot",
                RebootTarget::Recovery => "reboot recovery",
                RebootTarget::Bootloader => "reboot bootloader",
                RebootTarget::Fastbootd => "reboot fastboot",
                RebootTarget::Edl => "reboot edl",
                RebootTarget::Shutdown => "reboot -p",
            };
            if has_root {
                let wrapped = format!("su -c \"{}\"", shell_command);
                return Ok(RebootPlan::adb(serial, &["shell", &wrapped]));
            }
            let plan = match target {
                RebootTarget::Shutdown => RebootPlan::adb(serial, &["shell", shell_command]),
                _ => {
                    let words: Vec<&str> = shell_command.split(' ').collect();
                    RebootPlan::adb(serial, &words)
                }
            };
            Ok(plan)
        }
        DeviceMode::Fastboot | DeviceMode::Fastbootd => {
            let command = match target {
                RebootTarget::System => "reboot",
                RebootTarget::Recovery => "reboot-recovery",
                RebootTarget::Bootloader => "reboot-bootloader",
                RebootTarget::Fastbootd if mode == DeviceMode::Fastbootd => {
                    return Err(DetectorError::AlreadyInMode(mode.label().to_string()))
                }
                RebootTarget::Fastbootd => "reboot-fastboot",
                RebootTarget::Shutdown => "shutdown",
                RebootTarget::Edl => return Err(unsupported()),
            };
            Ok(RebootPlan::fastboot(serial, &[command]))
        }
        DeviceMode::Unknown | DeviceMode::Edl9008 | DeviceMode::MtkDa => Err(unsupported()),
    }
}

/// Suggestion for a failed reboot, based on the tool's error text
pub fn failure_hint(err: &DetectorError) -> Option<&'static str> {
    let text = match err {
        DetectorError::CommandFailed { stderr, .. } => stderr.to_lowercase(),
        DetectorError::ToolUnavailable { .. } => {
            return Some("Helper tool not found: check [tools] in the configuration")
        }
        DetectorError::Timeout { .. } => {
            return Some("Device did not answer in time: it may be rebooting already")
        }
        _ => return None,
    };

    if text.contains("no permissions") {
        Some("Check USB debugging authorization or reconnect the device")
    } else if text.contains("device not found") || text.contains("no devices") {
        Some("The device may have been disconnected")
    } else if text.contains("command not found") || text.contains("unknown command") {
        Some("This device does not support that reboot command")
    } else {
        None
    }
}

/// Issues reboots through a process runner
pub struct RebootTool<R: ProcessRunner> {
    runner: R,
    settings: TransportSettings,
}

impl<R: ProcessRunner> RebootTool<R> {
    pub fn new(runner: R, settings: TransportSettings) -> Self {
        Self { runner, settings }
    }

    /// Whether the device grants a root shell
    pub fn has_root(&self, serial: &str) -> bool {
        let session = TransportSession::new(&self.runner, &self.settings);
        let probe = session.adb_shell(serial, "su -c \"echo root\"");
        probe.value() == "root"
    }

    /// Reboot the device described by `record` into `target`
    ///
    /// Returns the plan that was executed.
    pub fn reboot(&self, record: &DeviceRecord, target: RebootTarget) -> Result<RebootPlan> {
        let has_root = record.mode == DeviceMode::Adb && self.has_root(&record.serial);
        let plan = plan_reboot(&record.serial, record.mode, target, has_root)?;
        debug!("reboot plan for {}: {}", record.serial, plan.command_line());

        let session = TransportSession::new(&self.runner, &self.settings);
        let args: Vec<&str> = plan.args.iter().map(String::as_str).collect();
        let output = session.run_checked(plan.tool, &args, self.settings.timeouts.reboot())?;

        // Some bootloaders exit 0 and only print the failure
        let lowered = output.to_lowercase();
        if lowered.contains("error") || lowered.contains("failed") {
            warn!("reboot of {} reported: {}", record.serial, output.trim());
            return Err(DetectorError::CommandFailed {
                command: plan.command_line(),
                code: 0,
                stderr: output.trim().to_string(),
            });
        }

        info!("{}: {}", record.serial, target.follow_up());
        Ok(plan)
    }
}
