//! Canned device fixtures
//!
//! Helpers that script a `ScriptedRunner` with realistic tool output for a
//! device in a given mode, plus the listing output for a whole tick.

use crate::device::builder::shell;
use crate::device::classifier::ADB_LIVENESS_PROP;
use crate::device::traits::CommandOutput;
use crate::testdb::ScriptedRunner;

/// Trailer the bootloader tool prints after every command
const FASTBOOT_TRAILER: &str = "Finished. Total time: 0.004s";

/// A device answering on the debug bridge
#[derive(Debug, Clone)]
pub struct AdbFixture {
    pub serial: String,
    /// `(property, value)` pairs answered by getprop
    pub props: Vec<(&'static str, String)>,
    pub cpu_cores: u32,
    pub mem_total_kb: u64,
    pub battery_level: u8,
    /// Raw subscriber-info parcel dump
    pub subscriber_parcel: String,
    /// Path printed by `which su`, if rooted
    pub su_path: Option<String>,
}

/// A device answering on the bootloader transport
#[derive(Debug, Clone)]
pub struct FastbootFixture {
    pub serial: String,
    /// `(variable, value)` pairs answered by getvar
    pub vars: Vec<(&'static str, String)>,
    /// Response to `oem device-info`, if supported
    pub device_info: Option<String>,
}

const PIXEL_PARCEL: &str = "Result: Parcel(\n  \
    0x00000000: 00000000 0000000f 00350033 00390034 '........3.5.4.9.'\n  \
    0x00000010: 00350030 00300030 00320036 00390035 '0.5.0.0.0.6.2.5.9.'\n  \
    0x00000020: 00320031 00000034                   '1.2.4...        ')";

/// Pixel 7 on Android 14
pub fn pixel_adb(serial: &str) -> AdbFixture {
    AdbFixture {
        serial: serial.to_string(),
        props: vec![
            (ADB_LIVENESS_PROP, "34".to_string()),
            ("ro.product.manufacturer", "Google".to_string()),
            ("ro.product.model", "Pixel 7".to_string()),
            ("ro.product.device", "panther".to_string()),
            ("ro.product.name", "panther".to_string()),
            ("ro.build.version.release", "14".to_string()),
            ("ro.build.display.id", "UQ1A.240205.004".to_string()),
            ("ro.boot.wifimacaddr", "02:00:00:44:55:66".to_string()),
        ],
        cpu_cores: 8,
        mem_total_kb: 7_812_345,
        battery_level: 85,
        subscriber_parcel: PIXEL_PARCEL.to_string(),
        su_path: None,
    }
}

/// Rooted Redmi on Android 9, no modem
pub fn rooted_redmi_adb(serial: &str) -> AdbFixture {
    AdbFixture {
        serial: serial.to_string(),
        props: vec![
            (ADB_LIVENESS_PROP, "28".to_string()),
            ("ro.product.manufacturer", "Xiaomi".to_string()),
            ("ro.product.model", "Redmi Note 7".to_string()),
            ("ro.product.device", "lavender".to_string()),
            ("ro.product.name", "lavender".to_string()),
            ("ro.build.version.release", "9".to_string()),
            ("ro.build.display.id", "PKQ1.180904.001".to_string()),
        ],
        cpu_cores: 8,
        mem_total_kb: 3_849_216,
        battery_level: 40,
        subscriber_parcel: "Result: Parcel(ffffffff '....')".to_string(),
        su_path: Some("/system/xbin/su".to_string()),
    }
}

/// Redmi Note 12 in userspace fastboot, bootloader unlocked
pub fn redmi_fastbootd(serial: &str) -> FastbootFixture {
    FastbootFixture {
        serial: serial.to_string(),
        vars: vec![
            ("is-userspace", "yes".to_string()),
            ("product", "Redmi Note 12".to_string()),
            ("variant", "global".to_string()),
            ("hw-version", "V1.0".to_string()),
            ("version-bootloader", "unknown".to_string()),
            ("battery-status", "ok".to_string()),
        ],
        device_info: Some("(bootloader) Device unlocked: true".to_string()),
    }
}

/// Pixel 4a in legacy fastboot, locked, OEM unlocking allowed
pub fn pixel_fastboot(serial: &str) -> FastbootFixture {
    FastbootFixture {
        serial: serial.to_string(),
        vars: vec![
            ("is-userspace", "no".to_string()),
            ("product", "sunfish".to_string()),
            ("hw-version", "MP1.0".to_string()),
            ("version-bootloader", "s5-0.5-9825683".to_string()),
            ("unlocked", "no".to_string()),
            ("unlock_ability", "1".to_string()),
        ],
        device_info: None,
    }
}

/// Script every debug-bridge probe for one device
pub fn script_adb_device(runner: &ScriptedRunner, device: &AdbFixture) {
    let s = &device.serial;
    for (prop, value) in &device.props {
        runner.respond_adb(
            &format!("-s {} shell getprop {}", s, prop),
            CommandOutput::exited(0, &format!("{}\n", value), ""),
        );
    }

    let shell_reply = |command: &str, output: CommandOutput| {
        runner.respond_adb(&format!("-s {} shell {}", s, command), output);
    };
    shell_reply(
        shell::CPU_CORES,
        CommandOutput::exited(0, &format!("{}\n", device.cpu_cores), ""),
    );
    shell_reply(
        shell::MEM_TOTAL,
        CommandOutput::exited(0, &format!("MemTotal:        {} kB\n", device.mem_total_kb), ""),
    );
    shell_reply(
        shell::BATTERY_LEVEL,
        CommandOutput::exited(0, &format!("  level: {}\n", device.battery_level), ""),
    );
    shell_reply(
        shell::SUBSCRIBER_ID,
        CommandOutput::exited(0, &device.subscriber_parcel, ""),
    );
    match &device.su_path {
        Some(path) => shell_reply(shell::SU_BINARY, CommandOutput::exited(0, &format!("{}\n", path), "")),
        None => shell_reply(shell::SU_BINARY, CommandOutput::exited(1, "", "")),
    }
}

/// Script every bootloader probe for one device
///
/// Unscripted variables answer like a real bootloader that does not know them.
pub fn script_fastboot_device(runner: &ScriptedRunner, device: &FastbootFixture) {
    let s = &device.serial;
    for (var, value) in &device.vars {
        runner.respond_fastboot(
            &format!("-s {} getvar {}", s, var),
            CommandOutput::exited(0, "", &format!("{}: {}\n{}\n", var, value, FASTBOOT_TRAILER)),
        );
    }
    if let Some(info) = &device.device_info {
        runner.respond_fastboot(
            &format!("-s {} oem device-info", s),
            CommandOutput::exited(0, "", &format!("{}\nOKAY [  0.010s]\n{}\n", info, FASTBOOT_TRAILER)),
        );
    }
}

/// Script both listings for the next tick
///
/// `adb` holds `(serial, state)` pairs; `fastboot` holds `(serial, mode)`
/// pairs where mode is `fastboot` or `fastbootd`.
pub fn set_listings(runner: &ScriptedRunner, adb: &[(&str, &str)], fastboot: &[(&str, &str)]) {
    let mut adb_out = String::from("List of devices attached\n");
    for (serial, state) in adb {
        adb_out.push_str(&format!("{}\t{}\n", serial, state));
    }
    adb_out.push('\n');
    runner.respond_adb("devices", CommandOutput::exited(0, &adb_out, ""));

    let fastboot_out: String = fastboot
        .iter()
        .enumerate()
        .map(|(i, (serial, mode))| format!("{:<16}{} usb:1-{}\n", serial, mode, i + 1))
        .collect();
    runner.respond_fastboot("devices -l", CommandOutput::exited(0, &fastboot_out, ""));
}
