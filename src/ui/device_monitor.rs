//! Device Monitor Module
//!
//! Runs the detection loop on a background thread and forwards its events to
//! a frontend over a channel. One tick runs at a time: the worker thread is
//! the only caller of `DeviceDetector::tick`, and out-of-band refreshes are
//! queued to it instead of running alongside a timer tick.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use log::{debug, info, warn};

use crate::core::config::Config;
use crate::core::detector::DeviceDetector;
use crate::core::error::{DetectorError, Result};
use crate::device::{DeviceRecord, ProcessRunner};
use crate::ui::events::{MonitorEvent, UiEvent};

// =============================================================================
// Monitor State
// =============================================================================

/// Where the detection loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MonitorState {
    /// Monitoring is off
    Stopped = 0,
    /// Waiting for the next tick
    Idle = 1,
    /// A tick is in flight
    Polling = 2,
}

impl MonitorState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => MonitorState::Idle,
            2 => MonitorState::Polling,
            _ => MonitorState::Stopped,
        }
    }
}

// =============================================================================
// Monitor Configuration
// =============================================================================

/// Configuration for the device monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between the end of one tick and the start of the next (in milliseconds)
    pub poll_interval_ms: u64,
    /// Whether to emit a `TickCompleted` event after every tick
    pub report_ticks: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            report_ticks: true,
        }
    }
}

impl MonitorConfig {
    /// Faster polling, for interactive frontends
    pub fn fast() -> Self {
        Self {
            poll_interval_ms: 500,
            ..Default::default()
        }
    }

    /// Slower polling, for background monitoring
    pub fn slow() -> Self {
        Self {
            poll_interval_ms: 5000,
            ..Default::default()
        }
    }

    /// Take the poll interval from the `[monitor]` section
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval_ms: config.monitor.poll_interval_ms,
            ..Default::default()
        }
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set whether tick reports are emitted
    pub fn report_ticks(mut self, report: bool) -> Self {
        self.report_ticks = report;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// Device Monitor
// =============================================================================

enum Control {
    Refresh,
    Stop,
}

/// State shared between the monitor handle and its worker thread
struct Shared<R: ProcessRunner> {
    detector: Mutex<DeviceDetector<R>>,
    devices: RwLock<Vec<DeviceRecord>>,
    state: AtomicU8,
    event_tx: Sender<UiEvent>,
}

impl<R: ProcessRunner> Shared<R> {
    fn set_state(&self, state: MonitorState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn emit(&self, event: impl Into<UiEvent>) {
        // The receiver lives as long as the monitor handle
        let _ = self.event_tx.send(event.into());
    }

    fn run_tick(&self, report_ticks: bool) {
        self.set_state(MonitorState::Polling);
        let report = {
            let mut detector = self.detector.lock().unwrap_or_else(PoisonError::into_inner);
            let report = detector.tick();
            *self.devices.write().unwrap_or_else(PoisonError::into_inner) =
                detector.snapshot().iter().cloned().collect();
            report
        };
        self.set_state(MonitorState::Idle);

        if !report.fastboot_available {
            self.emit(MonitorEvent::TransportUnavailable { tool: "fastboot" });
        }
        if !report.adb_available {
            self.emit(MonitorEvent::TransportUnavailable { tool: "adb" });
        }
        for event in report.events {
            self.emit(event);
        }
        if report_ticks {
            self.emit(MonitorEvent::TickCompleted {
                devices: report.total_devices,
                duration: report.duration,
            });
        }
    }
}

/// Background device monitor
///
/// Owns a `DeviceDetector` and ticks it on a fixed interval once started.
/// Events are delivered through `try_recv_event`, `recv_event_timeout` and
/// `drain_events`.
pub struct DeviceMonitor<R: ProcessRunner + 'static> {
    config: MonitorConfig,
    shared: Arc<Shared<R>>,
    event_rx: Receiver<UiEvent>,
    control_tx: Mutex<Option<Sender<Control>>>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
    is_running: AtomicBool,
}

impl<R: ProcessRunner + 'static> DeviceMonitor<R> {
    /// Create a monitor with default configuration
    pub fn new(detector: DeviceDetector<R>) -> Self {
        Self::with_config(detector, MonitorConfig::default())
    }

    /// Create a monitor with custom configuration
    pub fn with_config(detector: DeviceDetector<R>, config: MonitorConfig) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            config,
            shared: Arc::new(Shared {
                detector: Mutex::new(detector),
                devices: RwLock::new(Vec::new()),
                state: AtomicU8::new(MonitorState::Stopped as u8),
                event_tx,
            }),
            event_rx,
            control_tx: Mutex::new(None),
            thread_handle: Mutex::new(None),
            is_running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start the detection loop
    ///
    /// Calling this while already running keeps the existing loop.
    pub fn start_monitoring(&self) -> Result<()> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Device monitor already running");
            return Ok(());
        }

        let (control_tx, control_rx) = unbounded();
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        shared.set_state(MonitorState::Idle);

        let handle = thread::Builder::new()
            .name("device-monitor".to_string())
            .spawn(move || Self::monitor_loop(shared, config, control_rx))
            .map_err(|e| {
                self.is_running.store(false, Ordering::SeqCst);
                self.shared.set_state(MonitorState::Stopped);
                DetectorError::Io(format!("failed to spawn monitor thread: {}", e))
            })?;

        *self.control_tx.lock().unwrap_or_else(PoisonError::into_inner) = Some(control_tx);
        *self.thread_handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!(
            "Device monitor started (interval {} ms)",
            self.config.poll_interval_ms
        );
        Ok(())
    }

    /// Stop the detection loop and wait for the in-flight tick to finish
    pub fn stop_monitoring(&self) {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping device monitor...");
        if let Some(tx) = self
            .control_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = tx.send(Control::Stop);
        }
        if let Some(handle) = self
            .thread_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            if handle.join().is_err() {
                warn!("Device monitor thread panicked");
            }
        }
        self.shared.set_state(MonitorState::Stopped);
        info!("Device monitor stopped");
    }

    /// Run one tick as soon as the current one (if any) finishes
    pub fn force_refresh(&self) -> Result<()> {
        let control = self.control_tx.lock().unwrap_or_else(PoisonError::into_inner);
        match control.as_ref() {
            Some(tx) => tx
                .send(Control::Refresh)
                .map_err(|_| DetectorError::MonitorNotRunning),
            None => Err(DetectorError::MonitorNotRunning),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> MonitorState {
        MonitorState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    /// Devices from the last completed tick
    pub fn connected_devices(&self) -> Vec<DeviceRecord> {
        self.shared
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get a device from the last completed tick by serial
    pub fn get_device(&self, serial: &str) -> Option<DeviceRecord> {
        self.shared
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|record| record.serial == serial)
            .cloned()
    }

    pub fn device_count(&self) -> usize {
        self.shared
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Try to receive the next event (non-blocking)
    pub fn try_recv_event(&self) -> Option<UiEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive event with timeout
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<UiEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Drain all pending events
    pub fn drain_events(&self) -> Vec<UiEvent> {
        self.event_rx.try_iter().collect()
    }

    fn monitor_loop(shared: Arc<Shared<R>>, config: MonitorConfig, control_rx: Receiver<Control>) {
        let poll_interval = config.poll_interval();
        shared.emit(MonitorEvent::Started { poll_interval });

        loop {
            shared.run_tick(config.report_ticks);

            select! {
                recv(control_rx) -> message => match message {
                    Ok(Control::Refresh) => {
                        // Collapse refreshes queued during the tick into one
                        if control_rx.try_iter().any(|m| matches!(m, Control::Stop)) {
                            break;
                        }
                        debug!("Forced refresh");
                    }
                    Ok(Control::Stop) | Err(_) => break,
                },
                default(poll_interval) => {}
            }
        }

        shared.set_state(MonitorState::Stopped);
        shared.emit(MonitorEvent::Stopped);
        debug!("Monitor loop exited");
    }
}

impl<R: ProcessRunner + 'static> Drop for DeviceMonitor<R> {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::transport::TransportSettings;
    use crate::device::DeviceMode;
    use crate::testdb::fixtures::{pixel_adb, script_adb_device, set_listings};
    use crate::testdb::ScriptedRunner;
    use crate::ui::events::DeviceEvent;
    use std::time::Instant;

    type TestMonitor = DeviceMonitor<Arc<ScriptedRunner>>;

    fn monitor(interval_ms: u64) -> (Arc<ScriptedRunner>, TestMonitor) {
        let runner = Arc::new(ScriptedRunner::new());
        set_listings(&runner, &[], &[]);
        let detector = DeviceDetector::new(Arc::clone(&runner), TransportSettings::default());
        let monitor = DeviceMonitor::with_config(
            detector,
            MonitorConfig::default().with_poll_interval(interval_ms),
        );
        (runner, monitor)
    }

    fn wait_for(monitor: &TestMonitor, pred: impl Fn(&UiEvent) -> bool) -> Option<UiEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(event) = monitor.recv_event_timeout(Duration::from_millis(50)) {
                if pred(&event) {
                    return Some(event);
                }
            }
        }
        None
    }

    fn is_tick(event: &UiEvent) -> bool {
        matches!(event, UiEvent::Monitor(MonitorEvent::TickCompleted { .. }))
    }

    #[test]
    fn test_monitor_config_presets() {
        assert_eq!(MonitorConfig::default().poll_interval_ms, 2000);
        assert_eq!(MonitorConfig::fast().poll_interval_ms, 500);
        assert_eq!(MonitorConfig::slow().poll_interval_ms, 5000);

        let config = MonitorConfig::default().with_poll_interval(1000).report_ticks(false);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(!config.report_ticks);
    }

    #[test]
    fn test_new_monitor_is_stopped() {
        let (_runner, monitor) = monitor(50);
        assert!(!monitor.is_running());
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(monitor.device_count(), 0);
        assert!(monitor.try_recv_event().is_none());
    }

    #[test]
    fn test_connect_event_delivered() {
        let (runner, monitor) = monitor(50);
        script_adb_device(&runner, &pixel_adb("ABC123"));
        set_listings(&runner, &[("ABC123", "device")], &[]);

        monitor.start_monitoring().unwrap();
        let event = wait_for(&monitor, |e| matches!(e, UiEvent::Device(_))).unwrap();
        match event {
            UiEvent::Device(DeviceEvent::Connected { record }) => {
                assert_eq!(record.serial, "ABC123");
                assert_eq!(record.mode, DeviceMode::Adb);
            }
            other => panic!("unexpected event {:?}", other),
        }

        wait_for(&monitor, is_tick).unwrap();
        assert_eq!(monitor.get_device("ABC123").unwrap().model, "Pixel 7");
        monitor.stop_monitoring();
    }

    #[test]
    fn test_start_is_idempotent() {
        let (_runner, monitor) = monitor(50);
        monitor.start_monitoring().unwrap();
        monitor.start_monitoring().unwrap();
        assert!(monitor.is_running());
        monitor.stop_monitoring();

        let started = monitor
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, UiEvent::Monitor(MonitorEvent::Started { .. })))
            .count();
        assert_eq!(started, 1);
    }

    #[test]
    fn test_stop_emits_stopped() {
        let (_runner, monitor) = monitor(50);
        monitor.start_monitoring().unwrap();
        wait_for(&monitor, is_tick).unwrap();
        monitor.stop_monitoring();

        assert!(!monitor.is_running());
        assert_eq!(monitor.state(), MonitorState::Stopped);
        let events = monitor.drain_events();
        assert_eq!(events.last(), Some(&UiEvent::Monitor(MonitorEvent::Stopped)));

        // Stopping twice is a no-op
        monitor.stop_monitoring();
        assert!(monitor.drain_events().is_empty());
    }

    #[test]
    fn test_force_refresh_requires_running_monitor() {
        let (_runner, monitor) = monitor(50);
        assert!(matches!(
            monitor.force_refresh(),
            Err(DetectorError::MonitorNotRunning)
        ));
    }

    #[test]
    fn test_force_refresh_runs_tick_out_of_band() {
        let (runner, monitor) = monitor(60_000);
        script_adb_device(&runner, &pixel_adb("ABC123"));

        monitor.start_monitoring().unwrap();
        wait_for(&monitor, is_tick).unwrap();

        set_listings(&runner, &[("ABC123", "device")], &[]);
        let started = Instant::now();
        monitor.force_refresh().unwrap();
        let event = wait_for(&monitor, |e| matches!(e, UiEvent::Device(_))).unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(event, UiEvent::Device(DeviceEvent::Connected { .. })));
        monitor.stop_monitoring();
    }

    #[test]
    fn test_missing_tool_reported() {
        let (runner, monitor) = monitor(50);
        runner.set_unavailable("fastboot", true);

        monitor.start_monitoring().unwrap();
        let event = wait_for(&monitor, |e| {
            matches!(e, UiEvent::Monitor(MonitorEvent::TransportUnavailable { .. }))
        });
        assert_eq!(
            event,
            Some(UiEvent::Monitor(MonitorEvent::TransportUnavailable {
                tool: "fastboot"
            }))
        );
    }

    #[test]
    fn test_drop_stops_worker() {
        let (runner, monitor) = monitor(20);
        monitor.start_monitoring().unwrap();
        wait_for(&monitor, is_tick).unwrap();
        drop(monitor);

        // No further ticks once the monitor is gone
        let calls = runner.call_count("adb");
        thread::sleep(Duration::from_millis(100));
        assert_eq!(runner.call_count("adb"), calls);
    }
}
