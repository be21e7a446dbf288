//! Mode classification
//!
//! Decides which mode a visible serial is in, and for bootloader devices
//! resolves the userspace variant and the bootloader lock state.
//!
//! # Decision order
//!
//! 1. Debug bridge listing says recovery/sideload: `Recovery`
//! 2. Debug bridge answers a basic property query: `Adb`
//! 3. Bootloader listing contains the serial: `Fastbootd` or `Fastboot`
//! 4. EDL download probe: `Edl9008`
//! 5. Vendor download probe: `MtkDa`
//! 6. Otherwise `Unknown`

use log::debug;

use crate::device::extract::{is_present_value, parse_yes_no};
use crate::device::record::{DeviceMode, LockState, UnlockAbility};
use crate::device::rules::{
    lock_state_from, unlock_ability_from, Rule, BOOT_INFO_RULES, DEVICE_INFO_RULES,
    UNLOCKED_VAR_RULES,
};
use crate::device::traits::{DownloadModeProbe, ProcessRunner, UsbEnumerationStub};
use crate::device::transport::{AdbState, ModeCache, ProbeResult, TransportSession};

/// Property used to confirm the debug bridge is really talking to the OS
pub const ADB_LIVENESS_PROP: &str = "ro.build.version.sdk";

/// Where a serial showed up this tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visibility {
    /// State from the debug bridge listing, if listed there
    pub debug: Option<AdbState>,
    /// Listed by the bootloader tool
    pub bootloader: bool,
}

impl Visibility {
    pub fn debug(state: AdbState) -> Self {
        Self {
            debug: Some(state),
            bootloader: false,
        }
    }

    pub fn bootloader() -> Self {
        Self {
            debug: None,
            bootloader: true,
        }
    }
}

/// Result of classifying one serial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub mode: DeviceMode,
    pub diagnostics: Vec<String>,
}

/// Checks for the userspace bootloader variant, tried in order when the
/// listing did not already say so
type UserspaceCheck = (&'static str, fn(&str) -> bool);

const USERSPACE_CHECKS: &[UserspaceCheck] = &[
    ("is-userspace", is_affirmative),
    ("current-slot", is_present_value),
    ("has-slot:system", is_present_value),
];

fn is_affirmative(value: &str) -> bool {
    parse_yes_no(value) == Some(true)
}

/// Mode classifier with pluggable download-mode probes
pub struct ModeClassifier {
    edl: Box<dyn DownloadModeProbe>,
    vendor_download: Box<dyn DownloadModeProbe>,
}

impl ModeClassifier {
    pub fn new() -> Self {
        Self {
            edl: Box::new(UsbEnumerationStub::edl()),
            vendor_download: Box::new(UsbEnumerationStub::mtk_da()),
        }
    }

    /// Replace the download-mode probes
    pub fn with_download_probes(
        mut self,
        edl: Box<dyn DownloadModeProbe>,
        vendor_download: Box<dyn DownloadModeProbe>,
    ) -> Self {
        self.edl = edl;
        self.vendor_download = vendor_download;
        self
    }

    /// Classify one serial
    pub fn classify<R: ProcessRunner + ?Sized>(
        &self,
        session: &TransportSession<'_, R>,
        serial: &str,
        visibility: &Visibility,
        mode_cache: &ModeCache,
    ) -> Classification {
        let mut diagnostics = Vec::new();

        if let Some(state) = &visibility.debug {
            if state.is_recovery() {
                return Classification {
                    mode: DeviceMode::Recovery,
                    diagnostics,
                };
            }

            let probe = session.getprop(serial, ADB_LIVENESS_PROP);
            if probe.is_value() {
                return Classification {
                    mode: DeviceMode::Adb,
                    diagnostics,
                };
            }
            if let Some(d) = probe.diagnostic("getprop") {
                diagnostics.push(d);
            }
            if !matches!(state, AdbState::Device) {
                diagnostics.push(format!("debug bridge reports state '{}'", adb_state_label(state)));
            }
        }

        if visibility.bootloader {
            let userspace = is_userspace(session, serial, mode_cache);
            let mode = if userspace {
                DeviceMode::Fastbootd
            } else {
                DeviceMode::Fastboot
            };
            return Classification { mode, diagnostics };
        }

        for (probe, mode) in [
            (&self.edl, DeviceMode::Edl9008),
            (&self.vendor_download, DeviceMode::MtkDa),
        ] {
            if probe.detect(serial) {
                debug!("{} matched by {} probe", serial, probe.name());
                return Classification { mode, diagnostics };
            }
        }

        Classification {
            mode: DeviceMode::Unknown,
            diagnostics,
        }
    }
}

impl Default for ModeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn adb_state_label(state: &AdbState) -> &str {
    match state {
        AdbState::Device => "device",
        AdbState::Recovery => "recovery",
        AdbState::Sideload => "sideload",
        AdbState::Unauthorized => "unauthorized",
        AdbState::Offline => "offline",
        AdbState::Other(s) => s,
    }
}

/// Whether a bootloader device runs the userspace variant
///
/// The tick's mode cache is authoritative; only serials it does not cover
/// are probed.
pub fn is_userspace<R: ProcessRunner + ?Sized>(
    session: &TransportSession<'_, R>,
    serial: &str,
    mode_cache: &ModeCache,
) -> bool {
    if let Some(cached) = mode_cache.get(serial) {
        return cached;
    }

    for (var, accept) in USERSPACE_CHECKS {
        let probe = session.getvar(serial, var);
        if accept(probe.value()) {
            debug!("{} is userspace fastboot ({} = {})", serial, var, probe.value());
            return true;
        }
    }
    false
}

/// Bootloader lock state and unlock capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockResolution {
    pub state: LockState,
    pub ability: UnlockAbility,
    /// Which query gave the answer
    pub source: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
enum LockQuery {
    Oem(&'static str),
    Var(&'static str),
}

/// Lock-state queries in priority order
fn lock_queries() -> [(&'static str, LockQuery, &'static [Rule<LockState>]); 3] {
    [
        ("oem device-info", LockQuery::Oem("device-info"), DEVICE_INFO_RULES),
        ("oem boot-info", LockQuery::Oem("boot-info"), BOOT_INFO_RULES),
        ("getvar unlocked", LockQuery::Var("unlocked"), UNLOCKED_VAR_RULES),
    ]
}

/// Resolve the bootloader lock state, first conclusive query wins
///
/// The last fallback reads the OEM-unlocking capability. It fills
/// `ability` only and leaves `state` as `Unknown`.
pub fn resolve_lock_state<R: ProcessRunner + ?Sized>(
    session: &TransportSession<'_, R>,
    serial: &str,
) -> LockResolution {
    for (source, query, rules) in lock_queries() {
        let probe = match query {
            LockQuery::Oem(command) => session.fastboot_oem(serial, command),
            LockQuery::Var(var) => session.getvar(serial, var),
        };
        if let ProbeResult::Value(text) = &probe {
            if let Some(state) = lock_state_from(rules, text) {
                debug!("{} lock state {} via {}", serial, state, source);
                return LockResolution {
                    state,
                    ability: UnlockAbility::Unknown,
                    source: Some(source),
                };
            }
        }
    }

    let ability = unlock_ability_from(session.getvar(serial, "unlock_ability").value());
    LockResolution {
        state: LockState::Unknown,
        ability,
        source: (ability != UnlockAbility::Unknown).then_some("getvar unlock_ability"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::traits::CommandOutput;
    use crate::device::transport::TransportSettings;
    use crate::testdb::ScriptedRunner;

    struct AlwaysDetect(&'static str);

    impl DownloadModeProbe for AlwaysDetect {
        fn name(&self) -> &'static str {
            self.0
        }
        fn detect(&self, _serial: &str) -> bool {
            true
        }
    }

    fn classify(runner: &ScriptedRunner, serial: &str, vis: Visibility, cache: &ModeCache) -> DeviceMode {
        let settings = TransportSettings::default();
        let session = TransportSession::new(runner, &settings);
        ModeClassifier::new().classify(&session, serial, &vis, cache).mode
    }

    #[test]
    fn test_fastbootd_from_mode_cache() {
        let runner = ScriptedRunner::new();
        let mut cache = ModeCache::new();
        cache.insert("FB1", true);
        assert_eq!(
            classify(&runner, "FB1", Visibility::bootloader(), &cache),
            DeviceMode::Fastbootd
        );
        // Cache is authoritative, nothing was probed
        assert_eq!(runner.call_count("fastboot"), 0);
    }

    #[test]
    fn test_fastboot_when_all_probes_negative() {
        let runner = ScriptedRunner::new();
        runner.respond_fastboot(
            "-s FB1 getvar is-userspace",
            CommandOutput::exited(0, "", "is-userspace: no\nFinished. Total time: 0.001s"),
        );
        runner.respond_fastboot(
            "-s FB1 getvar current-slot",
            CommandOutput::exited(1, "", "getvar:current-slot FAILED (remote: 'Variable not found')"),
        );
        runner.respond_fastboot(
            "-s FB1 getvar has-slot:system",
            CommandOutput::exited(0, "", "has-slot:system: \nFinished. Total time: 0.001s"),
        );
        assert_eq!(
            classify(&runner, "FB1", Visibility::bootloader(), &ModeCache::new()),
            DeviceMode::Fastboot
        );
        assert_eq!(runner.call_count("fastboot"), 3);
    }

    #[test]
    fn test_fastbootd_from_fallback_probe() {
        let runner = ScriptedRunner::new();
        runner.respond_fastboot(
            "-s FB1 getvar current-slot",
            CommandOutput::exited(0, "", "current-slot: a\nFinished. Total time: 0.001s"),
        );
        assert_eq!(
            classify(&runner, "FB1", Visibility::bootloader(), &ModeCache::new()),
            DeviceMode::Fastbootd
        );
    }

    #[test]
    fn test_not_found_slot_is_rejected() {
        let runner = ScriptedRunner::new();
        runner.respond_fastboot(
            "-s FB1 getvar has-slot:system",
            CommandOutput::exited(0, "", "has-slot:system: not found"),
        );
        assert_eq!(
            classify(&runner, "FB1", Visibility::bootloader(), &ModeCache::new()),
            DeviceMode::Fastboot
        );
    }

    #[test]
    fn test_adb_requires_property_answer() {
        let runner = ScriptedRunner::new();
        runner.respond_adb(
            "-s ABC123 shell getprop ro.build.version.sdk",
            CommandOutput::exited(0, "34\n", ""),
        );
        assert_eq!(
            classify(&runner, "ABC123", Visibility::debug(AdbState::Device), &ModeCache::new()),
            DeviceMode::Adb
        );
    }

    #[test]
    fn test_unauthorized_device_is_unknown() {
        let runner = ScriptedRunner::new();
        runner.respond_adb(
            "-s NEW1 shell getprop ro.build.version.sdk",
            CommandOutput::exited(1, "", "error: device unauthorized."),
        );
        let settings = TransportSettings::default();
        let session = TransportSession::new(&runner, &settings);
        let result = ModeClassifier::new().classify(
            &session,
            "NEW1",
            &Visibility::debug(AdbState::Unauthorized),
            &ModeCache::new(),
        );
        assert_eq!(result.mode, DeviceMode::Unknown);
        assert_eq!(result.diagnostics.len(), 2);
    }

    #[test]
    fn test_recovery_from_listing_state() {
        let runner = ScriptedRunner::new();
        assert_eq!(
            classify(&runner, "R1", Visibility::debug(AdbState::Sideload), &ModeCache::new()),
            DeviceMode::Recovery
        );
        assert_eq!(runner.call_count("adb"), 0);
    }

    #[test]
    fn test_download_probes_in_order() {
        let runner = ScriptedRunner::new();
        let settings = TransportSettings::default();
        let session = TransportSession::new(&runner, &settings);
        let vis = Visibility::default();

        let stubbed = ModeClassifier::new();
        assert_eq!(
            stubbed.classify(&session, "X", &vis, &ModeCache::new()).mode,
            DeviceMode::Unknown
        );

        let edl = ModeClassifier::new()
            .with_download_probes(Box::new(AlwaysDetect("edl")), Box::new(AlwaysDetect("mtk")));
        assert_eq!(
            edl.classify(&session, "X", &vis, &ModeCache::new()).mode,
            DeviceMode::Edl9008
        );

        let mtk = ModeClassifier::new().with_download_probes(
            Box::new(UsbEnumerationStub::edl()),
            Box::new(AlwaysDetect("mtk")),
        );
        assert_eq!(
            mtk.classify(&session, "X", &vis, &ModeCache::new()).mode,
            DeviceMode::MtkDa
        );
    }

    fn lock(runner: &ScriptedRunner) -> LockResolution {
        let settings = TransportSettings::default();
        let session = TransportSession::new(runner, &settings);
        resolve_lock_state(&session, "FB1")
    }

    #[test]
    fn test_lock_from_device_info() {
        let runner = ScriptedRunner::new();
        runner.respond_fastboot(
            "-s FB1 oem device-info",
            CommandOutput::exited(0, "", "(bootloader) Device unlocked: true\nOKAY [ 0.010s]"),
        );
        let res = lock(&runner);
        assert_eq!(res.state, LockState::Unlocked);
        assert_eq!(res.source, Some("oem device-info"));
    }

    #[test]
    fn test_lock_from_boot_info_fallback() {
        let runner = ScriptedRunner::new();
        runner.respond_fastboot(
            "-s FB1 oem boot-info",
            CommandOutput::exited(0, "", "(bootloader) Bootloader: LOCKED\nOKAY"),
        );
        assert_eq!(lock(&runner).state, LockState::Locked);
    }

    #[test]
    fn test_lock_from_unlocked_var() {
        let runner = ScriptedRunner::new();
        runner.respond_fastboot(
            "-s FB1 getvar unlocked",
            CommandOutput::exited(0, "", "unlocked: yes\nFinished. Total time: 0.000s"),
        );
        let res = lock(&runner);
        assert_eq!(res.state, LockState::Unlocked);
        assert_eq!(res.source, Some("getvar unlocked"));
    }

    #[test]
    fn test_unlock_ability_does_not_set_lock_state() {
        let runner = ScriptedRunner::new();
        runner.respond_fastboot(
            "-s FB1 getvar unlock_ability",
            CommandOutput::exited(0, "", "unlock_ability: 1\nFinished. Total time: 0.000s"),
        );
        let res = lock(&runner);
        assert_eq!(res.state, LockState::Unknown);
        assert_eq!(res.ability, UnlockAbility::Unlockable);
    }

    #[test]
    fn test_lock_unknown_when_nothing_answers() {
        let res = lock(&ScriptedRunner::new());
        assert_eq!(res.state, LockState::Unknown);
        assert_eq!(res.ability, UnlockAbility::Unknown);
        assert_eq!(res.source, None);
    }
}
