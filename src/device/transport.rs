//! Transport plumbing for the debug bridge and the bootloader tool
//!
//! A `TransportSession` is created for one poll tick. It knows where the two
//! helper binaries live and how long each kind of command may take, and it
//! turns raw `CommandOutput`s into `ProbeResult`s. When a helper binary cannot
//! be started, the session marks that transport unavailable and every later
//! call to it in the same tick short-circuits without spawning anything.
//!
//! # Listings
//!
//! - `parse_adb_devices` - `adb devices` into serial + state pairs
//! - `parse_fastboot_devices` - `fastboot devices -l` into serials plus the
//!   tick's `ModeCache`

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, trace, warn};

use crate::core::config::{Config, TimeoutConfig};
use crate::core::error::Result;
use crate::device::extract::{clean_property, extract_var, looks_like_adb_error};
use crate::device::traits::{CommandOutput, ProcessRunner, RunStatus};

// ============================================================================
// Debug bridge listing
// ============================================================================

/// State column of an `adb devices` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdbState {
    Device,
    Recovery,
    Sideload,
    Unauthorized,
    Offline,
    Other(String),
}

impl AdbState {
    pub fn parse(state: &str) -> Self {
        match state {
            "device" => AdbState::Device,
            "recovery" => AdbState::Recovery,
            "sideload" => AdbState::Sideload,
            "unauthorized" => AdbState::Unauthorized,
            "offline" => AdbState::Offline,
            other => AdbState::Other(other.to_string()),
        }
    }

    /// Device is running recovery (or sideload, which only recovery offers)
    pub fn is_recovery(&self) -> bool {
        matches!(self, AdbState::Recovery | AdbState::Sideload)
    }
}

/// One serial seen by the debug bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbEntry {
    pub serial: String,
    pub state: AdbState,
}

/// Parse `adb devices` output
///
/// Device rows are `SERIAL<TAB>STATE`. Anything else (the header, daemon
/// start-up chatter, server restart notices, blank lines) is ignored.
pub fn parse_adb_devices(output: &str) -> Vec<AdbEntry> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let (serial, rest) = line.split_once('\t')?;
            let serial = serial.trim();
            let state = rest.split_whitespace().next()?;
            if serial.is_empty() || serial.contains(char::is_whitespace) {
                return None;
            }
            Some(AdbEntry {
                serial: serial.to_string(),
                state: AdbState::parse(state),
            })
        })
        .collect()
}

// ============================================================================
// Bootloader listing
// ============================================================================

/// Per-tick record of which bootloader serials are known to be userspace
///
/// Only filled from the verbose listing. A missing entry means "not known",
/// and the classifier then falls back to explicit probes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeCache {
    entries: HashMap<String, bool>,
}

impl ModeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, serial: &str, is_userspace: bool) {
        self.entries.insert(serial.to_string(), is_userspace);
    }

    pub fn get(&self, serial: &str) -> Option<bool> {
        self.entries.get(serial).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serials on the bootloader transport plus the tick's mode cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastbootListing {
    pub serials: Vec<String>,
    pub mode_cache: ModeCache,
}

/// Parse `fastboot devices -l` output
///
/// Lines look like `SERIAL   fastboot usb:1-1` or `SERIAL   fastbootd ...`.
pub fn parse_fastboot_devices(output: &str) -> FastbootListing {
    let mut listing = FastbootListing::default();

    for line in output.lines().map(str::trim) {
        let mut parts = line.split_whitespace();
        let Some(serial) = parts.next() else {
            continue;
        };
        let tokens: Vec<&str> = parts.collect();
        if !tokens
            .iter()
            .any(|t| *t == "fastboot" || *t == "fastbootd")
        {
            continue;
        }
        if listing.serials.iter().any(|s| s == serial) {
            continue;
        }

        if tokens.contains(&"fastbootd") {
            listing.mode_cache.insert(serial, true);
        }
        listing.serials.push(serial.to_string());
    }

    listing
}

// ============================================================================
// Probe results
// ============================================================================

/// Outcome of a single attribute probe
///
/// Every variant other than `Value` reads as an empty attribute; they are
/// kept apart so the record can carry a useful diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// Command succeeded and produced a value
    Value(String),
    /// Command succeeded but the value was not in its output
    Missing,
    /// Command ran and failed (non-zero exit, signal, or bridge error text)
    Failed { code: Option<i32>, message: String },
    /// Command was killed after its timeout
    TimedOut,
    /// Helper binary could not be started this tick
    Unavailable,
}

impl ProbeResult {
    /// The value, or empty for every other outcome
    pub fn value(&self) -> &str {
        match self {
            ProbeResult::Value(v) => v,
            _ => "",
        }
    }

    pub fn into_value(self) -> String {
        match self {
            ProbeResult::Value(v) => v,
            _ => String::new(),
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, ProbeResult::Value(_))
    }

    /// Diagnostic line for failures worth showing; `None` for values and parse misses
    pub fn diagnostic(&self, label: &str) -> Option<String> {
        match self {
            ProbeResult::Failed {
                code: Some(code),
                message,
            } => Some(format!("{}: exit {}: {}", label, code, message)),
            ProbeResult::Failed {
                code: None,
                message,
            } => Some(format!("{}: {}", label, message)),
            ProbeResult::TimedOut => Some(format!("{}: timed out", label)),
            _ => None,
        }
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string()
}

// ============================================================================
// Session
// ============================================================================

/// Which helper binary a command goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Adb,
    Fastboot,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Adb => "adb",
            Tool::Fastboot => "fastboot",
        }
    }
}

/// Tool locations and timeouts shared by every session
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub adb_path: PathBuf,
    pub fastboot_path: PathBuf,
    pub timeouts: TimeoutConfig,
}

impl TransportSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            adb_path: config.tools.adb_path.clone(),
            fastboot_path: config.tools.fastboot_path.clone(),
            timeouts: config.timeouts.clone(),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Command plumbing for one poll tick
pub struct TransportSession<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    settings: &'a TransportSettings,
    adb_available: AtomicBool,
    fastboot_available: AtomicBool,
}

impl<'a, R: ProcessRunner + ?Sized> TransportSession<'a, R> {
    pub fn new(runner: &'a R, settings: &'a TransportSettings) -> Self {
        Self {
            runner,
            settings,
            adb_available: AtomicBool::new(true),
            fastboot_available: AtomicBool::new(true),
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        self.settings
    }

    /// Whether the tool has not (yet) failed to start this tick
    pub fn is_available(&self, tool: Tool) -> bool {
        self.flag(tool).load(Ordering::Acquire)
    }

    fn flag(&self, tool: Tool) -> &AtomicBool {
        match tool {
            Tool::Adb => &self.adb_available,
            Tool::Fastboot => &self.fastboot_available,
        }
    }

    fn path(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Adb => &self.settings.adb_path,
            Tool::Fastboot => &self.settings.fastboot_path,
        }
    }

    /// Run a tool, or return `None` if it is unavailable this tick
    pub fn run(&self, tool: Tool, args: &[&str], timeout: Duration) -> Option<CommandOutput> {
        if !self.is_available(tool) {
            trace!("{} unavailable, skipping: {}", tool.name(), args.join(" "));
            return None;
        }

        let output = self.runner.run(self.path(tool), args, timeout);
        if let RunStatus::SpawnFailed(reason) = &output.status {
            // Only the first failure in a tick is worth a warning
            if self.flag(tool).swap(false, Ordering::AcqRel) {
                warn!(
                    "{} is unavailable ({}); skipping it until the next poll",
                    tool.name(),
                    reason
                );
            }
            return None;
        }
        Some(output)
    }

    /// Run a tool and convert the outcome into a typed result
    ///
    /// Used outside the detection tick, where callers want hard errors. On
    /// success the combined stderr and stdout text is returned.
    pub fn run_checked(&self, tool: Tool, args: &[&str], timeout: Duration) -> Result<String> {
        let command = format!("{} {}", tool.name(), args.join(" "));
        let output = self.runner.run(self.path(tool), args, timeout);
        let text = output.combined();
        output.into_result(&command, timeout).map(|_| text)
    }

    // ------------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------------

    /// Serials on the debug bridge; empty when the command fails or times out
    pub fn list_adb(&self) -> Vec<AdbEntry> {
        match self.run(Tool::Adb, &["devices"], self.settings.timeouts.listing()) {
            Some(output) if output.success() => parse_adb_devices(&output.stdout),
            Some(output) => {
                debug!("adb devices failed: {:?} {}", output.status, output.stderr.trim());
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Serials on the bootloader transport; empty when the command fails or times out
    pub fn list_fastboot(&self) -> FastbootListing {
        match self.run(
            Tool::Fastboot,
            &["devices", "-l"],
            self.settings.timeouts.listing(),
        ) {
            Some(output) if output.success() => parse_fastboot_devices(&output.combined()),
            Some(output) => {
                debug!(
                    "fastboot devices failed: {:?} {}",
                    output.status,
                    output.stderr.trim()
                );
                FastbootListing::default()
            }
            None => FastbootListing::default(),
        }
    }

    // ------------------------------------------------------------------------
    // Debug bridge probes
    // ------------------------------------------------------------------------

    /// `adb -s SERIAL shell getprop PROP`
    pub fn getprop(&self, serial: &str, prop: &str) -> ProbeResult {
        let args = ["-s", serial, "shell", "getprop", prop];
        let output = self.run(Tool::Adb, &args, self.settings.timeouts.probe());
        to_adb_probe(output, &args, clean_property)
    }

    /// `adb -s SERIAL shell COMMAND`, value is the trimmed stdout
    pub fn adb_shell(&self, serial: &str, command: &str) -> ProbeResult {
        let args = ["-s", serial, "shell", command];
        let output = self.run(Tool::Adb, &args, self.settings.timeouts.shell());
        to_adb_probe(output, &args, |stdout| stdout.trim().to_string())
    }

    // ------------------------------------------------------------------------
    // Bootloader probes
    // ------------------------------------------------------------------------

    /// `fastboot -s SERIAL getvar VAR`
    pub fn getvar(&self, serial: &str, var: &str) -> ProbeResult {
        let args = ["-s", serial, "getvar", var];
        let output = self.run(Tool::Fastboot, &args, self.settings.timeouts.probe());
        to_fastboot_probe(output, &args, |text| extract_var(var, text))
    }

    /// `fastboot -s SERIAL oem COMMAND`, value is the whole response
    pub fn fastboot_oem(&self, serial: &str, command: &str) -> ProbeResult {
        let args = ["-s", serial, "oem", command];
        let output = self.run(Tool::Fastboot, &args, self.settings.timeouts.shell());
        to_fastboot_probe(output, &args, |text| text.trim().to_string())
    }
}

fn to_adb_probe(
    output: Option<CommandOutput>,
    args: &[&str],
    parse: impl FnOnce(&str) -> String,
) -> ProbeResult {
    let Some(output) = output else {
        return ProbeResult::Unavailable;
    };
    match output.status {
        RunStatus::Exited(0) if looks_like_adb_error(&output.stdout) => ProbeResult::Failed {
            code: None,
            message: first_line(&output.stdout),
        },
        RunStatus::Exited(0) => non_empty(parse(&output.stdout)),
        _ => failure(&output, Tool::Adb, args),
    }
}

/// The bootloader tool reports values on stderr, so parse the combined text
fn to_fastboot_probe(
    output: Option<CommandOutput>,
    args: &[&str],
    parse: impl FnOnce(&str) -> String,
) -> ProbeResult {
    let Some(output) = output else {
        return ProbeResult::Unavailable;
    };
    match output.status {
        RunStatus::Exited(0) => non_empty(parse(&output.combined())),
        _ => failure(&output, Tool::Fastboot, args),
    }
}

fn non_empty(value: String) -> ProbeResult {
    if value.is_empty() {
        ProbeResult::Missing
    } else {
        ProbeResult::Value(value)
    }
}

fn failure(output: &CommandOutput, tool: Tool, args: &[&str]) -> ProbeResult {
    match &output.status {
        RunStatus::TimedOut => {
            debug!("{} {} timed out", tool.name(), args.join(" "));
            ProbeResult::TimedOut
        }
        RunStatus::SpawnFailed(_) => ProbeResult::Unavailable,
        RunStatus::Signaled => {
            warn!("{} {} crashed (terminated by signal)", tool.name(), args.join(" "));
            ProbeResult::Failed {
                code: None,
                message: "terminated by signal".to_string(),
            }
        }
        RunStatus::Exited(code) => ProbeResult::Failed {
            code: Some(*code),
            message: first_line(&output.combined()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdb::ScriptedRunner;
    use std::sync::{Mutex, Once, PoisonError};

    /// Keeps every log line emitted by this test binary
    struct CaptureLogger {
        lines: Mutex<Vec<(log::Level, String)>>,
    }

    impl log::Log for CaptureLogger {
        fn enabled(&self, _: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            self.lines
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    static CAPTURE: CaptureLogger = CaptureLogger {
        lines: Mutex::new(Vec::new()),
    };

    fn logged(level: log::Level, needle: &str) -> bool {
        static INSTALL: Once = Once::new();
        INSTALL.call_once(|| {
            let _ = log::set_logger(&CAPTURE);
            log::set_max_level(log::LevelFilter::Trace);
        });
        CAPTURE
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }

    #[test]
    fn test_parse_adb_devices() {
        let output = "* daemon not running; starting now at tcp:5037\n\
                      * daemon started successfully\n\
                      List of devices attached\n\
                      ABC123\tdevice\n\
                      REC1\trecovery\n\
                      NEW1\tunauthorized\n\
                      \n";
        let entries = parse_adb_devices(output);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].serial, "ABC123");
        assert_eq!(entries[0].state, AdbState::Device);
        assert!(entries[1].state.is_recovery());
        assert_eq!(entries[2].state, AdbState::Unauthorized);
    }

    #[test]
    fn test_parse_adb_devices_ignores_server_chatter() {
        let output = "adb server is out of date.  killing...\n\
                      * daemon started successfully *\n\
                      List of devices attached\n\
                      ABC\tdevice\n";
        assert_eq!(
            parse_adb_devices(output),
            vec![AdbEntry {
                serial: "ABC".to_string(),
                state: AdbState::Device,
            }]
        );
    }

    #[test]
    fn test_parse_adb_devices_empty() {
        assert!(parse_adb_devices("List of devices attached\n\n").is_empty());
        assert!(parse_adb_devices("").is_empty());
    }

    #[test]
    fn test_parse_fastboot_devices_with_mode_cache() {
        let output = "FB1            fastboot usb:1-1\n\
                      FBD1           fastbootd usb:1-2\n\
                      < waiting for any device >\n";
        let listing = parse_fastboot_devices(output);
        assert_eq!(listing.serials, vec!["FB1", "FBD1"]);
        assert_eq!(listing.mode_cache.get("FBD1"), Some(true));
        assert_eq!(listing.mode_cache.get("FB1"), None);
        assert_eq!(listing.mode_cache.len(), 1);
    }

    #[test]
    fn test_parse_fastboot_devices_dedups() {
        let listing = parse_fastboot_devices("A\tfastboot\nA\tfastboot\n");
        assert_eq!(listing.serials, vec!["A"]);
    }

    #[test]
    fn test_probe_result_accessors() {
        let value = ProbeResult::Value("x".into());
        assert_eq!(value.value(), "x");
        assert!(value.diagnostic("p").is_none());
        assert_eq!(ProbeResult::Missing.value(), "");
        assert!(ProbeResult::Missing.diagnostic("p").is_none());
        assert_eq!(
            ProbeResult::TimedOut.diagnostic("getvar product").as_deref(),
            Some("getvar product: timed out")
        );
        let failed = ProbeResult::Failed {
            code: Some(1),
            message: "FAILED".into(),
        };
        assert_eq!(failed.diagnostic("oem").as_deref(), Some("oem: exit 1: FAILED"));
    }

    #[test]
    fn test_getvar_reads_stderr() {
        let runner = ScriptedRunner::new();
        runner.respond_fastboot(
            "-s FB1 getvar product",
            CommandOutput::exited(0, "", "product: sunfish\nFinished. Total time: 0.001s\n"),
        );
        let settings = TransportSettings::default();
        let session = TransportSession::new(&runner, &settings);
        assert_eq!(session.getvar("FB1", "product"), ProbeResult::Value("sunfish".into()));
    }

    #[test]
    fn test_getvar_failure_is_not_parsed() {
        let runner = ScriptedRunner::new();
        runner.respond_fastboot(
            "-s FB1 getvar product",
            CommandOutput::exited(1, "", "product: bogus\nFAILED (remote: error)\n"),
        );
        let settings = TransportSettings::default();
        let session = TransportSession::new(&runner, &settings);
        let result = session.getvar("FB1", "product");
        assert!(matches!(result, ProbeResult::Failed { code: Some(1), .. }));
        assert_eq!(result.value(), "");
    }

    #[test]
    fn test_adb_error_text_is_failure() {
        let runner = ScriptedRunner::new();
        runner.respond_adb(
            "-s ABC shell getprop ro.product.model",
            CommandOutput::exited(0, "error: device offline\n", ""),
        );
        let settings = TransportSettings::default();
        let session = TransportSession::new(&runner, &settings);
        assert!(matches!(
            session.getprop("ABC", "ro.product.model"),
            ProbeResult::Failed { code: None, .. }
        ));
    }

    #[test]
    fn test_crashed_and_timed_out_queries_are_logged() {
        // Install the logger before anything is emitted
        logged(log::Level::Trace, "");
        let runner = ScriptedRunner::new();
        runner.respond_adb(
            "-s CRASH1 shell getprop ro.product.model",
            CommandOutput::signaled("", ""),
        );
        runner.hang("fastboot -s SLOW1 getvar product");
        let mut settings = TransportSettings::default();
        settings.timeouts.probe_ms = 50;
        let session = TransportSession::new(&runner, &settings);

        let crashed = session.getprop("CRASH1", "ro.product.model");
        assert_eq!(
            crashed.diagnostic("getprop").as_deref(),
            Some("getprop: terminated by signal")
        );
        assert!(logged(log::Level::Warn, "adb -s CRASH1 shell getprop"));

        assert_eq!(session.getvar("SLOW1", "product"), ProbeResult::TimedOut);
        assert!(logged(log::Level::Debug, "fastboot -s SLOW1 getvar product timed out"));
    }

    #[test]
    fn test_unavailable_tool_short_circuits() {
        let runner = ScriptedRunner::new();
        runner.set_unavailable("fastboot", true);
        let settings = TransportSettings::default();
        let session = TransportSession::new(&runner, &settings);

        assert!(session.list_fastboot().serials.is_empty());
        assert!(!session.is_available(Tool::Fastboot));
        assert_eq!(session.getvar("X", "product"), ProbeResult::Unavailable);
        assert_eq!(runner.call_count("fastboot"), 1);
        assert!(session.is_available(Tool::Adb));
    }

    #[test]
    fn test_listing_timeout_is_zero_devices() {
        let runner = ScriptedRunner::new();
        runner.respond_adb("devices", CommandOutput::timed_out());
        let settings = TransportSettings::default();
        let session = TransportSession::new(&runner, &settings);
        assert!(session.list_adb().is_empty());
        assert!(session.is_available(Tool::Adb));
    }
}
