//! Device record and mode types
//!
//! A `DeviceRecord` is rebuilt from scratch on every poll tick; nothing in
//! it is carried over from the previous tick.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Operating mode of an attached device
///
/// The ordering of the variants carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceMode {
    #[default]
    Unknown,
    /// Normal OS with debug bridge available
    Adb,
    /// Legacy bootloader fastboot
    Fastboot,
    /// Userspace fastboot running from the system image
    Fastbootd,
    /// Qualcomm emergency download mode
    Edl9008,
    /// MediaTek download agent mode
    MtkDa,
    /// Recovery or sideload, reported by the debug bridge listing
    Recovery,
}

impl DeviceMode {
    /// Short label for lists and event lines
    pub fn label(&self) -> &'static str {
        match self {
            DeviceMode::Unknown => "Unknown",
            DeviceMode::Adb => "ADB",
            DeviceMode::Fastboot => "Fastboot",
            DeviceMode::Fastbootd => "Fastbootd",
            DeviceMode::Edl9008 => "EDL 9008",
            DeviceMode::MtkDa => "MTK DA",
            DeviceMode::Recovery => "Recovery",
        }
    }

    /// One-line description of what the mode allows
    pub fn description(&self) -> &'static str {
        match self {
            DeviceMode::Unknown => "Unrecognized device mode",
            DeviceMode::Adb => "Android debug mode, ADB commands available",
            DeviceMode::Fastboot => "Bootloader mode, partitions can be flashed",
            DeviceMode::Fastbootd => {
                "Userspace fastboot (Android 10+), logical system partitions can be flashed"
            }
            DeviceMode::Edl9008 => "Emergency download mode for low-level repair",
            DeviceMode::MtkDa => "MediaTek download mode",
            DeviceMode::Recovery => "Recovery mode",
        }
    }

    /// Whether the mode is served by the bootloader transport
    pub fn is_bootloader(&self) -> bool {
        matches!(self, DeviceMode::Fastboot | DeviceMode::Fastbootd)
    }

    /// Whether the mode is served by the debug transport
    pub fn is_debug(&self) -> bool {
        matches!(self, DeviceMode::Adb | DeviceMode::Recovery)
    }
}

impl Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bootloader lock state
///
/// `Unknown` must not be read as either locked or unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LockState {
    Locked,
    Unlocked,
    #[default]
    Unknown,
}

impl Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LockState::Locked => "locked",
            LockState::Unlocked => "unlocked",
            LockState::Unknown => "unknown",
        })
    }
}

/// Whether the bootloader may be unlocked (OEM unlocking enabled)
///
/// Kept separate from `LockState`: an unlockable bootloader may still be locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnlockAbility {
    Unlockable,
    NotUnlockable,
    #[default]
    Unknown,
}

impl Display for UnlockAbility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnlockAbility::Unlockable => "unlockable",
            UnlockAbility::NotUnlockable => "not unlockable",
            UnlockAbility::Unknown => "unknown",
        })
    }
}

/// Battery information as far as the current mode exposes it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BatteryStatus {
    /// Charge percentage from the OS battery service
    Level(u8),
    /// Bootloader reports a low battery
    Low,
    /// Bootloader reports the battery is fine
    Ok,
    /// Any other non-empty report
    Other(String),
    #[default]
    Unknown,
    /// The mode cannot report battery state at all
    Unsupported,
}

impl BatteryStatus {
    /// Map a bootloader battery-status value
    pub fn from_bootloader_value(value: &str) -> Self {
        let value = value.trim();
        match value.to_lowercase().as_str() {
            "" => BatteryStatus::Unknown,
            "low" => BatteryStatus::Low,
            "ok" | "good" | "normal" => BatteryStatus::Ok,
            _ => BatteryStatus::Other(value.to_string()),
        }
    }
}

impl Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryStatus::Level(level) => write!(f, "{}%", level),
            BatteryStatus::Low => f.write_str("low"),
            BatteryStatus::Ok => f.write_str("ok"),
            BatteryStatus::Other(value) => f.write_str(value),
            BatteryStatus::Unknown => f.write_str("unknown"),
            BatteryStatus::Unsupported => f.write_str("unsupported in this mode"),
        }
    }
}

/// Sentinel reported when the bootloader version cannot be read
pub const BOOTLOADER_VERSION_UNAVAILABLE: &str = "unavailable";

/// Sentinel reported when no manufacturer can be inferred
pub const UNKNOWN_MANUFACTURER: &str = "unknown";

/// Everything known about one attached device at one poll tick
///
/// String attributes are empty when the device did not report them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Transport-assigned serial number
    pub serial: String,
    pub mode: DeviceMode,

    pub manufacturer: String,
    pub model: String,
    /// Device codename (ro.product.device)
    pub device_name: String,
    pub android_version: String,
    pub build_number: String,
    pub product_name: String,
    pub variant: String,
    pub hw_version: String,
    pub bootloader_version: String,
    pub cpu_info: String,
    pub ram_size: String,
    pub battery: BatteryStatus,
    pub imei: String,
    pub wifi_mac: String,

    pub bootloader_lock: LockState,
    pub unlock_ability: UnlockAbility,
    pub is_fastbootd_mode: bool,
    pub is_rooted: bool,

    /// Raw error text from failed probes, for display only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl DeviceRecord {
    /// Create a bare record with only identity fields set
    pub fn new(serial: &str, mode: DeviceMode) -> Self {
        Self {
            serial: serial.to_string(),
            mode,
            is_fastbootd_mode: mode == DeviceMode::Fastbootd,
            ..Default::default()
        }
    }

    /// Whether the bootloader is known to be unlocked
    pub fn is_bootloader_unlocked(&self) -> bool {
        self.bootloader_lock == LockState::Unlocked
    }

    /// Name shown in lists: model, then product name, then serial
    pub fn display_name(&self) -> &str {
        if !self.model.is_empty() {
            &self.model
        } else if !self.product_name.is_empty() {
            &self.product_name
        } else {
            &self.serial
        }
    }

    /// Whether this Android version ships userspace fastboot
    ///
    /// `None` when the version is empty or unparseable.
    pub fn supports_fastbootd(&self) -> Option<bool> {
        android_major_version(&self.android_version).map(|major| major >= 10)
    }

    /// Multi-line summary suited to the record's transport
    pub fn summary(&self) -> String {
        if self.mode.is_bootloader() {
            self.bootloader_summary()
        } else {
            self.debug_summary()
        }
    }

    fn debug_summary(&self) -> String {
        let mut out = String::new();
        out.push_str("Device Info:\n");
        push_line(&mut out, "Serial", &self.serial);
        push_line(&mut out, "Manufacturer", &self.manufacturer);
        push_line(&mut out, "Model", &self.model);
        push_line(&mut out, "Device", &self.device_name);
        let android = match self.supports_fastbootd() {
            Some(true) => format!("{} (supports fastbootd)", self.android_version),
            Some(false) => format!("{} (legacy fastboot only)", self.android_version),
            None => self.android_version.clone(),
        };
        push_line(&mut out, "Android", &android);
        push_line(&mut out, "Build", &self.build_number);
        push_line(&mut out, "IMEI", &self.imei);
        push_line(&mut out, "Wi-Fi MAC", &self.wifi_mac);
        push_line(&mut out, "CPU", &self.cpu_info);
        push_line(&mut out, "RAM", &self.ram_size);
        push_line(&mut out, "Battery", &self.battery.to_string());
        push_line(&mut out, "Rooted", if self.is_rooted { "yes" } else { "no" });
        push_line(&mut out, "Mode", self.mode.label());
        out
    }

    fn bootloader_summary(&self) -> String {
        let variant = if self.is_fastbootd_mode {
            "Fastbootd"
        } else {
            "Legacy fastboot"
        };
        let mut out = String::new();
        out.push_str("Fastboot Device Info:\n");
        push_line(&mut out, "Serial", &self.serial);
        push_line(&mut out, "Product", &self.product_name);
        push_line(&mut out, "Variant", &self.variant);
        push_line(&mut out, "HW version", &self.hw_version);
        push_line(&mut out, "Bootloader", &self.bootloader_version);
        push_line(&mut out, "Lock state", &self.bootloader_lock.to_string());
        push_line(&mut out, "OEM unlocking", &self.unlock_ability.to_string());
        push_line(&mut out, "Mode", variant);
        push_line(&mut out, "Battery", &self.battery.to_string());
        push_line(&mut out, "Manufacturer", &self.manufacturer);
        out
    }
}

fn push_line(out: &mut String, label: &str, value: &str) {
    let value = if value.is_empty() { "unknown" } else { value };
    out.push_str(&format!("   {}: {}\n", label, value));
}

/// Leading integer of an Android release string ("14", "8.1.0", "13 QPR2")
fn android_major_version(version: &str) -> Option<u32> {
    let digits: String = version
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
