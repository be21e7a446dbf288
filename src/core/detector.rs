//! Device detection
//!
//! `DeviceDetector` runs one poll tick at a time:
//!
//! 1. list the bootloader transport (filling the tick's mode cache) and build
//!    a record per serial,
//! 2. list the debug bridge and build a record per serial,
//! 3. merge both into a new `Snapshot` (debug bridge wins on a clash),
//! 4. diff it against the previous snapshot,
//! 5. keep the new snapshot for the next tick.
//!
//! Nothing in a tick is fatal. A failing listing counts as zero devices, a
//! failing probe leaves an attribute empty, and a panic while probing one
//! device is contained to that device.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::core::config::Config;
use crate::core::snapshot::{diff_snapshots, Snapshot};
use crate::device::builder::SnapshotBuilder;
use crate::device::classifier::{Classification, ModeClassifier, Visibility};
use crate::device::transport::{ModeCache, Tool, TransportSession, TransportSettings};
use crate::device::{DeviceMode, DeviceRecord, ProcessRunner};
use crate::ui::events::DeviceEvent;

/// What one tick saw and produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Events in emission order
    pub events: Vec<DeviceEvent>,
    /// Serials listed by the bootloader tool
    pub fastboot_devices: usize,
    /// Serials listed by the debug bridge
    pub adb_devices: usize,
    /// Whether each tool could be started this tick
    pub fastboot_available: bool,
    pub adb_available: bool,
    /// Devices in the merged snapshot
    pub total_devices: usize,
    pub duration: Duration,
}

impl TickReport {
    /// One-line summary for logs and CLI output
    pub fn summary(&self) -> String {
        let transport = |name: &str, count: usize, available: bool| {
            if available {
                format!("{} {}", count, name)
            } else {
                format!("{} unavailable", name)
            }
        };
        format!(
            "{} device(s): {}, {} ({} event(s))",
            self.total_devices,
            transport("adb", self.adb_devices, self.adb_available),
            transport("fastboot", self.fastboot_devices, self.fastboot_available),
            self.events.len()
        )
    }
}

/// Polls both transports and tracks the previous snapshot
pub struct DeviceDetector<R: ProcessRunner> {
    runner: R,
    settings: TransportSettings,
    classifier: ModeClassifier,
    parallel_probes: bool,
    previous: Snapshot,
}

impl<R: ProcessRunner> DeviceDetector<R> {
    pub fn new(runner: R, settings: TransportSettings) -> Self {
        Self {
            runner,
            settings,
            classifier: ModeClassifier::new(),
            parallel_probes: false,
            previous: Snapshot::new(),
        }
    }

    /// Build a detector from the loaded configuration
    pub fn from_config(runner: R, config: &Config) -> Self {
        Self::new(runner, TransportSettings::from_config(config))
            .with_parallel_probes(config.monitor.parallel_probes)
    }

    /// Probe different devices concurrently
    ///
    /// Each device's own probe sequence still runs in order.
    pub fn with_parallel_probes(mut self, parallel: bool) -> Self {
        self.parallel_probes = parallel;
        self
    }

    pub fn with_classifier(mut self, classifier: ModeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Snapshot from the last completed tick
    pub fn snapshot(&self) -> &Snapshot {
        &self.previous
    }

    /// Forget the previous snapshot; the next tick reports every device as new
    pub fn reset(&mut self) {
        self.previous = Snapshot::new();
    }

    /// Run one full poll tick
    pub fn tick(&mut self) -> TickReport {
        let (snapshot, mut report) = self.scan();
        report.events = diff_snapshots(&self.previous, &snapshot);

        for event in &report.events {
            match event {
                DeviceEvent::Connected { record } => info!(
                    "Device connected: {} ({}) in {} mode",
                    record.serial,
                    record.display_name(),
                    record.mode
                ),
                DeviceEvent::ModeChanged {
                    serial,
                    previous,
                    mode,
                } => info!("Device {} changed mode: {} -> {}", serial, previous, mode),
                DeviceEvent::Disconnected { serial } => info!("Device disconnected: {}", serial),
            }
        }

        self.previous = snapshot;
        report
    }

    /// List and probe every device without diffing or storing the result
    pub fn scan(&self) -> (Snapshot, TickReport) {
        let started = Instant::now();
        let session = TransportSession::new(&self.runner, &self.settings);

        let listing = session.list_fastboot();
        let bootloader_targets: Vec<(String, Visibility)> = listing
            .serials
            .iter()
            .map(|serial| (serial.clone(), Visibility::bootloader()))
            .collect();
        let bootloader_records =
            self.probe_all(&session, &bootloader_targets, &listing.mode_cache);

        let adb_entries = session.list_adb();
        // A serial on both transports keeps its bootloader membership, so a
        // failed debug probe still classifies from the bootloader listing
        let debug_targets: Vec<(String, Visibility)> = adb_entries
            .iter()
            .map(|entry| {
                let mut visibility = Visibility::debug(entry.state.clone());
                visibility.bootloader = listing.serials.contains(&entry.serial);
                (entry.serial.clone(), visibility)
            })
            .collect();
        let debug_records = self.probe_all(&session, &debug_targets, &listing.mode_cache);

        let snapshot = Snapshot::merge(bootloader_records, debug_records);

        let report = TickReport {
            events: Vec::new(),
            fastboot_devices: bootloader_targets.len(),
            adb_devices: debug_targets.len(),
            fastboot_available: session.is_available(Tool::Fastboot),
            adb_available: session.is_available(Tool::Adb),
            total_devices: snapshot.len(),
            duration: started.elapsed(),
        };
        debug!("tick: {} in {:?}", report.summary(), report.duration);
        (snapshot, report)
    }

    fn probe_all(
        &self,
        session: &TransportSession<'_, R>,
        targets: &[(String, Visibility)],
        mode_cache: &ModeCache,
    ) -> Vec<DeviceRecord> {
        if self.parallel_probes && targets.len() > 1 {
            targets
                .par_iter()
                .map(|(serial, vis)| self.probe_device(session, serial, vis, mode_cache))
                .collect()
        } else {
            targets
                .iter()
                .map(|(serial, vis)| self.probe_device(session, serial, vis, mode_cache))
                .collect()
        }
    }

    /// Classify and build one device; panics stay inside this device
    fn probe_device(
        &self,
        session: &TransportSession<'_, R>,
        serial: &str,
        visibility: &Visibility,
        mode_cache: &ModeCache,
    ) -> DeviceRecord {
        let classification = catch_unwind(AssertUnwindSafe(|| {
            self.classifier
                .classify(session, serial, visibility, mode_cache)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!("{}: classification panicked: {}", serial, message);
            Classification {
                mode: DeviceMode::Unknown,
                diagnostics: vec![format!("classification failed: {}", message)],
            }
        });

        let mode = classification.mode;
        let mut record = catch_unwind(AssertUnwindSafe(|| {
            SnapshotBuilder::new(session).build(serial, mode)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!("{}: building record panicked: {}", serial, message);
            let mut record = DeviceRecord::new(serial, mode);
            record
                .diagnostics
                .push(format!("probing failed: {}", message));
            record
        });

        if !classification.diagnostics.is_empty() {
            let mut diagnostics = classification.diagnostics;
            diagnostics.append(&mut record.diagnostics);
            record.diagnostics = diagnostics;
        }
        record
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
