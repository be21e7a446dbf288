//! Device snapshot builder
//!
//! Given a serial and its classified mode, issues the probe battery for that
//! mode and assembles a `DeviceRecord`. Probes are independent: a failed or
//! timed-out probe leaves its attribute empty, adds a diagnostic line, and the
//! remaining probes still run.

use log::debug;

use crate::device::classifier::resolve_lock_state;
use crate::device::extract::{
    format_cores, format_memory_kb, parse_battery_level, parse_core_count,
    parse_meminfo_total_kb, parse_subscriber_id,
};
use crate::device::record::{BatteryStatus, DeviceMode, DeviceRecord, BOOTLOADER_VERSION_UNAVAILABLE};
use crate::device::rules::infer_manufacturer;
use crate::device::traits::ProcessRunner;
use crate::device::transport::{ProbeResult, TransportSession};

/// Shell pipelines used for derived debug-bridge attributes
pub mod shell {
    pub const CPU_CORES: &str = "cat /proc/cpuinfo | grep -i processor | wc -l";
    pub const SU_BINARY: &str = "which su";
    pub const MEM_TOTAL: &str = "cat /proc/meminfo | grep MemTotal";
    pub const BATTERY_LEVEL: &str = "dumpsys battery | grep level";
    pub const SUBSCRIBER_ID: &str = "service call iphonesubinfo 1";
}

/// Builds records for one tick's session
pub struct SnapshotBuilder<'s, 'a, R: ProcessRunner + ?Sized> {
    session: &'s TransportSession<'a, R>,
}

impl<'s, 'a, R: ProcessRunner + ?Sized> SnapshotBuilder<'s, 'a, R> {
    pub fn new(session: &'s TransportSession<'a, R>) -> Self {
        Self { session }
    }

    /// Build the record for `serial` in `mode`
    pub fn build(&self, serial: &str, mode: DeviceMode) -> DeviceRecord {
        let mut record = DeviceRecord::new(serial, mode);
        match mode {
            DeviceMode::Adb => self.fill_debug(&mut record, true),
            DeviceMode::Recovery => self.fill_debug(&mut record, false),
            DeviceMode::Fastboot | DeviceMode::Fastbootd => self.fill_bootloader(&mut record),
            DeviceMode::Unknown | DeviceMode::Edl9008 | DeviceMode::MtkDa => {}
        }
        record
    }

    // ------------------------------------------------------------------------
    // Debug bridge
    // ------------------------------------------------------------------------

    fn fill_debug(&self, record: &mut DeviceRecord, with_battery: bool) {
        let serial = record.serial.clone();
        let props: [(&str, &mut String); 7] = [
            ("ro.product.manufacturer", &mut record.manufacturer),
            ("ro.product.model", &mut record.model),
            ("ro.product.device", &mut record.device_name),
            ("ro.product.name", &mut record.product_name),
            ("ro.build.version.release", &mut record.android_version),
            ("ro.build.display.id", &mut record.build_number),
            ("ro.boot.wifimacaddr", &mut record.wifi_mac),
        ];

        let mut diagnostics = Vec::new();
        for (prop, field) in props {
            let probe = self.session.getprop(&serial, prop);
            note(&mut diagnostics, &probe, prop);
            *field = probe.into_value();
        }

        let probe = self.session.adb_shell(&serial, shell::CPU_CORES);
        note(&mut diagnostics, &probe, "cpu cores");
        if let Some(cores) = parse_core_count(probe.value()) {
            record.cpu_info = format_cores(cores);
        }

        // `which su` prints a path only when the binary exists
        let probe = self.session.adb_shell(&serial, shell::SU_BINARY);
        record.is_rooted = probe.value().contains("/su");

        let probe = self.session.adb_shell(&serial, shell::MEM_TOTAL);
        note(&mut diagnostics, &probe, "meminfo");
        if let Some(kb) = parse_meminfo_total_kb(probe.value()) {
            record.ram_size = format_memory_kb(kb);
        }

        if with_battery {
            let probe = self.session.adb_shell(&serial, shell::BATTERY_LEVEL);
            note(&mut diagnostics, &probe, "battery");
            if let Some(level) = parse_battery_level(probe.value()) {
                record.battery = BatteryStatus::Level(level);
            }
        }

        let probe = self.session.adb_shell(&serial, shell::SUBSCRIBER_ID);
        note(&mut diagnostics, &probe, "subscriber id");
        record.imei = parse_subscriber_id(probe.value());

        record.diagnostics.extend(diagnostics);
        debug!(
            "{}: built debug record ({} {})",
            serial, record.manufacturer, record.model
        );
    }

    // ------------------------------------------------------------------------
    // Bootloader
    // ------------------------------------------------------------------------

    fn fill_bootloader(&self, record: &mut DeviceRecord) {
        let serial = record.serial.clone();
        let mut diagnostics = Vec::new();

        record.product_name = self.getvar(&serial, "product", &mut diagnostics);
        record.variant = self.getvar(&serial, "variant", &mut diagnostics);

        record.hw_version = self.getvar(&serial, "hw-version", &mut diagnostics);
        if record.hw_version.is_empty() {
            record.hw_version = self.getvar(&serial, "hw_version", &mut diagnostics);
        }

        let version = self.getvar(&serial, "version-bootloader", &mut diagnostics);
        record.bootloader_version = if version.is_empty() {
            BOOTLOADER_VERSION_UNAVAILABLE.to_string()
        } else {
            version
        };

        let lock = resolve_lock_state(self.session, &serial);
        record.bootloader_lock = lock.state;
        record.unlock_ability = lock.ability;

        record.battery = if record.mode == DeviceMode::Fastbootd {
            BatteryStatus::from_bootloader_value(&self.getvar(
                &serial,
                "battery-status",
                &mut diagnostics,
            ))
        } else {
            BatteryStatus::Unsupported
        };

        record.manufacturer = infer_manufacturer(&record.product_name);
        record.model = record.product_name.clone();

        record.diagnostics.extend(diagnostics);
        debug!(
            "{}: built bootloader record (product '{}', lock {})",
            serial, record.product_name, record.bootloader_lock
        );
    }

    fn getvar(&self, serial: &str, var: &str, diagnostics: &mut Vec<String>) -> String {
        let probe = self.session.getvar(serial, var);
        note(diagnostics, &probe, var);
        probe.into_value()
    }
}

fn note(diagnostics: &mut Vec<String>, probe: &ProbeResult, label: &str) {
    if let Some(line) = probe.diagnostic(label) {
        diagnostics.push(line);
    }
}
