//! Predefined detection scenarios
//!
//! Each scenario is a small fleet of scripted devices plus a sequence of
//! ticks. A tick says what the two listings show and which events the
//! detector must emit for it, in order.

use crate::device::DeviceMode;
use crate::testdb::fixtures::{
    pixel_adb, pixel_fastboot, redmi_fastbootd, rooted_redmi_adb, AdbFixture, FastbootFixture,
};
use crate::ui::events::DeviceEvent;

/// An event the detector is expected to emit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedEvent {
    Connected(String, DeviceMode),
    ModeChanged(String, DeviceMode),
    Disconnected(String),
}

impl ExpectedEvent {
    pub fn matches(&self, event: &DeviceEvent) -> bool {
        match (self, event) {
            (ExpectedEvent::Connected(serial, mode), DeviceEvent::Connected { record }) => {
                record.serial == *serial && record.mode == *mode
            }
            (
                ExpectedEvent::ModeChanged(serial, mode),
                DeviceEvent::ModeChanged {
                    serial: actual,
                    mode: actual_mode,
                    ..
                },
            ) => actual == serial && actual_mode == mode,
            (ExpectedEvent::Disconnected(serial), DeviceEvent::Disconnected { serial: actual }) => {
                actual == serial
            }
            _ => false,
        }
    }
}

fn connected(serial: &str, mode: DeviceMode) -> ExpectedEvent {
    ExpectedEvent::Connected(serial.to_string(), mode)
}

fn mode_changed(serial: &str, mode: DeviceMode) -> ExpectedEvent {
    ExpectedEvent::ModeChanged(serial.to_string(), mode)
}

fn disconnected(serial: &str) -> ExpectedEvent {
    ExpectedEvent::Disconnected(serial.to_string())
}

/// Listing state and expectations for one tick
#[derive(Debug, Clone, Default)]
pub struct TickStep {
    /// `(serial, state)` lines of the debug bridge listing
    pub adb: Vec<(String, String)>,
    /// `(serial, mode)` lines of the bootloader listing
    pub fastboot: Vec<(String, String)>,
    /// Tools that cannot be started during this tick
    pub missing_tools: Vec<&'static str>,
    pub expected: Vec<ExpectedEvent>,
}

impl TickStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adb(mut self, serial: &str, state: &str) -> Self {
        self.adb.push((serial.to_string(), state.to_string()));
        self
    }

    pub fn fastboot(mut self, serial: &str, mode: &str) -> Self {
        self.fastboot.push((serial.to_string(), mode.to_string()));
        self
    }

    pub fn missing(mut self, tool: &'static str) -> Self {
        self.missing_tools.push(tool);
        self
    }

    pub fn expect(mut self, events: Vec<ExpectedEvent>) -> Self {
        self.expected = events;
        self
    }
}

/// A complete detection scenario
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    pub adb_devices: Vec<AdbFixture>,
    pub fastboot_devices: Vec<FastbootFixture>,
    pub ticks: Vec<TickStep>,
}

impl TestScenario {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            adb_devices: Vec::new(),
            fastboot_devices: Vec::new(),
            ticks: Vec::new(),
        }
    }

    pub fn with_adb_device(mut self, device: AdbFixture) -> Self {
        self.adb_devices.push(device);
        self
    }

    pub fn with_fastboot_device(mut self, device: FastbootFixture) -> Self {
        self.fastboot_devices.push(device);
        self
    }

    pub fn tick(mut self, step: TickStep) -> Self {
        self.ticks.push(step);
        self
    }
}

/// Collection of all predefined scenarios
pub struct ScenarioLibrary;

impl ScenarioLibrary {
    /// Nothing attached, ever
    pub fn no_devices() -> TestScenario {
        TestScenario::new("no_devices", "No devices on either transport")
            .tick(TickStep::new())
            .tick(TickStep::new())
    }

    /// One phone on the debug bridge, seen twice
    pub fn single_adb() -> TestScenario {
        TestScenario::new("single_adb", "One device in debug mode; second tick is silent")
            .with_adb_device(pixel_adb("ABC123"))
            .tick(
                TickStep::new()
                    .adb("ABC123", "device")
                    .expect(vec![connected("ABC123", DeviceMode::Adb)]),
            )
            .tick(TickStep::new().adb("ABC123", "device"))
    }

    /// Userspace fastboot announced by the verbose listing
    pub fn fastbootd_listing() -> TestScenario {
        TestScenario::new("fastbootd_listing", "Userspace fastboot flagged by the listing")
            .with_fastboot_device(redmi_fastbootd("FBD1"))
            .tick(
                TickStep::new()
                    .fastboot("FBD1", "fastbootd")
                    .expect(vec![connected("FBD1", DeviceMode::Fastbootd)]),
            )
    }

    /// Legacy bootloader, every userspace probe negative
    pub fn legacy_fastboot() -> TestScenario {
        TestScenario::new("legacy_fastboot", "Legacy bootloader after all userspace probes fail")
            .with_fastboot_device(pixel_fastboot("FB1"))
            .tick(
                TickStep::new()
                    .fastboot("FB1", "fastboot")
                    .expect(vec![connected("FB1", DeviceMode::Fastboot)]),
            )
    }

    /// Debug mode, then fastbootd, then unplugged
    pub fn mode_cycle() -> TestScenario {
        TestScenario::new("mode_cycle", "Connect, reboot to fastbootd, unplug")
            .with_adb_device(pixel_adb("ABC123"))
            .with_fastboot_device(redmi_fastbootd("ABC123"))
            .tick(TickStep::new())
            .tick(
                TickStep::new()
                    .adb("ABC123", "device")
                    .expect(vec![connected("ABC123", DeviceMode::Adb)]),
            )
            .tick(
                TickStep::new()
                    .fastboot("ABC123", "fastbootd")
                    .expect(vec![mode_changed("ABC123", DeviceMode::Fastbootd)]),
            )
            .tick(TickStep::new().expect(vec![disconnected("ABC123")]))
    }

    /// Every mode the listings can produce, at once
    pub fn mixed_fleet() -> TestScenario {
        TestScenario::new("mixed_fleet", "Five devices across both transports")
            .with_adb_device(pixel_adb("ABC123"))
            .with_fastboot_device(pixel_fastboot("FB1"))
            .with_fastboot_device(redmi_fastbootd("FBD1"))
            .tick(
                TickStep::new()
                    .fastboot("FB1", "fastboot")
                    .fastboot("FBD1", "fastbootd")
                    .adb("ABC123", "device")
                    .adb("NEW1", "unauthorized")
                    .adb("REC1", "recovery")
                    .expect(vec![
                        connected("FB1", DeviceMode::Fastboot),
                        connected("FBD1", DeviceMode::Fastbootd),
                        connected("ABC123", DeviceMode::Adb),
                        connected("NEW1", DeviceMode::Unknown),
                        connected("REC1", DeviceMode::Recovery),
                    ]),
            )
    }

    /// Bootloader tool missing; the debug bridge still works
    pub fn missing_fastboot() -> TestScenario {
        TestScenario::new("missing_fastboot", "Bootloader tool cannot be started")
            .with_adb_device(rooted_redmi_adb("RED1"))
            .tick(
                TickStep::new()
                    .missing("fastboot")
                    .fastboot("FB1", "fastboot")
                    .adb("RED1", "device")
                    .expect(vec![connected("RED1", DeviceMode::Adb)]),
            )
    }

    /// Devices coming and going between ticks
    pub fn hotplug_churn() -> TestScenario {
        TestScenario::new("hotplug_churn", "Devices plugged and unplugged between ticks")
            .with_adb_device(pixel_adb("A1"))
            .with_adb_device(rooted_redmi_adb("B1"))
            .with_fastboot_device(pixel_fastboot("C1"))
            .tick(
                TickStep::new()
                    .adb("A1", "device")
                    .adb("B1", "device")
                    .expect(vec![
                        connected("A1", DeviceMode::Adb),
                        connected("B1", DeviceMode::Adb),
                    ]),
            )
            .tick(
                TickStep::new()
                    .fastboot("C1", "fastboot")
                    .adb("B1", "device")
                    .expect(vec![connected("C1", DeviceMode::Fastboot), disconnected("A1")]),
            )
            .tick(
                TickStep::new()
                    .adb("A1", "device")
                    .expect(vec![
                        connected("A1", DeviceMode::Adb),
                        disconnected("C1"),
                        disconnected("B1"),
                    ]),
            )
    }

    /// Same serial on both listings in one tick
    pub fn dual_visibility() -> TestScenario {
        TestScenario::new("dual_visibility", "Serial listed by both tools; debug bridge wins")
            .with_adb_device(pixel_adb("DUP"))
            .with_fastboot_device(pixel_fastboot("DUP"))
            .tick(
                TickStep::new()
                    .fastboot("DUP", "fastboot")
                    .adb("DUP", "device")
                    .expect(vec![connected("DUP", DeviceMode::Adb)]),
            )
    }

    /// All scenarios
    pub fn all() -> Vec<TestScenario> {
        vec![
            Self::no_devices(),
            Self::single_adb(),
            Self::fastbootd_listing(),
            Self::legacy_fastboot(),
            Self::mode_cycle(),
            Self::mixed_fleet(),
            Self::missing_fastboot(),
            Self::hotplug_churn(),
            Self::dual_visibility(),
        ]
    }

    /// Find a scenario by name
    pub fn by_name(name: &str) -> Option<TestScenario> {
        Self::all().into_iter().find(|s| s.name == name)
    }

    pub fn names() -> Vec<String> {
        Self::all().into_iter().map(|s| s.name).collect()
    }
}
