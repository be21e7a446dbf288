//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    device_row, print_divider, print_error, print_header, print_info, print_success,
    print_warning, ScanSpinner,
};
use crate::cli::{Args, Commands};
use crate::core::config::{get_config_path, init_config, open_config_in_editor, Config};
use crate::core::detector::DeviceDetector;
use crate::core::error::DetectorError;
use crate::device::{failure_hint, DeviceRecord, RebootTarget, RebootTool, SystemProcessRunner};
use crate::device::transport::TransportSettings;
use crate::testdb::{ScenarioLibrary, ScenarioRunner};
use crate::ui::{format_duration, DeviceMonitor, MonitorConfig, MonitorEvent, UiEvent};
use anyhow::{anyhow, Result};
use dialoguer::Confirm;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long `watch` waits for an event before re-checking the shutdown flag
const WATCH_POLL: Duration = Duration::from_millis(200);

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        None | Some(Commands::List { json: false }) => list_devices(config, false)?,
        Some(Commands::List { json: true }) => list_devices(config, true)?,
        Some(Commands::Info { serial, json }) => device_info(config, serial, *json)?,
        Some(Commands::Watch { interval }) => watch_devices(config, *interval, shutdown_flag)?,
        Some(Commands::Reboot {
            serial,
            target,
            yes,
        }) => reboot_device(config, serial, target, *yes)?,
        Some(Commands::Simulate {
            scenario,
            list,
            verbose,
        }) => {
            if *list {
                list_scenarios();
            } else {
                simulate(scenario.as_deref(), *verbose)?;
            }
        }
        Some(Commands::Config { path, reset }) => handle_config_command(*path, *reset)?,
        Some(Commands::GenerateConfig { output }) => generate_config_file(output.clone())?,
        Some(Commands::ShowConfig) => show_config(config),
    }

    Ok(())
}

/// Process runner configured from the `[timeouts]` section
fn system_runner(config: &Config) -> SystemProcessRunner {
    SystemProcessRunner::new().with_kill_grace(config.timeouts.kill_grace())
}

fn detector(config: &Config) -> DeviceDetector<SystemProcessRunner> {
    DeviceDetector::from_config(system_runner(config), config)
}

/// Run one detection tick behind a spinner
fn scan_once(config: &Config, quiet: bool) -> Vec<DeviceRecord> {
    let spinner = if quiet {
        None
    } else {
        Some(ScanSpinner::new("Scanning for devices..."))
    };

    let mut detector = detector(config);
    let report = detector.tick();
    let records: Vec<DeviceRecord> = detector.snapshot().iter().cloned().collect();

    if let Some(spinner) = spinner {
        if !report.adb_available {
            spinner.log(&format!(
                "adb could not be started ({})",
                config.tools.adb_path.display()
            ));
        }
        if !report.fastboot_available {
            spinner.log(&format!(
                "fastboot could not be started ({})",
                config.tools.fastboot_path.display()
            ));
        }
        if !report.adb_available && !report.fastboot_available {
            spinner.finish_with_error("Neither adb nor fastboot could be started");
        } else {
            spinner.finish_with_summary(records.len());
        }
    }
    debug!("{}", report.summary());
    records
}

/// List attached devices
pub fn list_devices(config: &Config, json: bool) -> Result<()> {
    let records = scan_once(config, json);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        print_info("No devices found.");
        println!();
        println!("  Make sure your device is:");
        println!("    1. Connected via USB cable");
        println!("    2. In system mode with USB debugging enabled, or in fastboot mode");
        println!("    3. Authorized (accept the RSA fingerprint prompt on the phone)");
        println!();
        return Ok(());
    }

    println!();
    for (i, record) in records.iter().enumerate() {
        println!("  {}", device_row(i, record));
    }
    println!();
    Ok(())
}

/// Show one device in detail
pub fn device_info(config: &Config, serial: &str, json: bool) -> Result<()> {
    let records = scan_once(config, json);
    let record = records
        .into_iter()
        .find(|r| r.serial == serial)
        .ok_or_else(|| DetectorError::DeviceNotFound(serial.to_string()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    print_header(&format!("{} ({})", record.display_name(), record.mode.label()));
    println!("  {}", record.mode.description());
    println!();
    for line in record.summary().lines() {
        println!("  {}", line);
    }
    if !record.diagnostics.is_empty() {
        print_divider();
        println!("  Probe diagnostics:");
        for diagnostic in &record.diagnostics {
            print_warning(diagnostic);
        }
    }
    println!();
    Ok(())
}

/// Watch for device changes until Ctrl+C
pub fn watch_devices(
    config: &Config,
    interval_ms: Option<u64>,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<()> {
    let mut monitor_config = MonitorConfig::from_config(config).report_ticks(false);
    if let Some(ms) = interval_ms {
        if ms == 0 {
            return Err(anyhow!("--interval must be greater than zero"));
        }
        monitor_config = monitor_config.with_poll_interval(ms);
    }

    let monitor = DeviceMonitor::with_config(detector(config), monitor_config);
    monitor.start_monitoring()?;
    println!();
    print_info("Watching for devices. Press Ctrl+C to stop.");
    println!();

    let mut reported_missing: HashSet<&'static str> = HashSet::new();
    while !shutdown_flag.load(Ordering::SeqCst) {
        let Some(event) = monitor.recv_event_timeout(WATCH_POLL) else {
            continue;
        };
        let stamp = chrono::Local::now().format("%H:%M:%S");
        match event {
            UiEvent::Device(event) => println!("  [{}] {}", stamp, event),
            UiEvent::Monitor(MonitorEvent::TransportUnavailable { tool }) => {
                if reported_missing.insert(tool) {
                    print_warning(&format!(
                        "{} could not be started; its devices will not be listed",
                        tool
                    ));
                }
            }
            UiEvent::Monitor(MonitorEvent::Started { poll_interval }) => {
                debug!("Polling every {}", format_duration(poll_interval));
            }
            UiEvent::Monitor(_) => {}
        }
    }

    monitor.stop_monitoring();
    println!();
    print_info(&format!("Stopped. {} device(s) attached.", monitor.device_count()));
    Ok(())
}

/// Reboot a device into another mode
pub fn reboot_device(config: &Config, serial: &str, target: &str, yes: bool) -> Result<()> {
    let target: RebootTarget = target.parse().map_err(|e: String| anyhow!(e))?;

    let records = scan_once(config, false);
    let record = records
        .into_iter()
        .find(|r| r.serial == serial)
        .ok_or_else(|| DetectorError::DeviceNotFound(serial.to_string()))?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Reboot {} ({}, {}) into {}?",
                record.display_name(),
                record.serial,
                record.mode.label(),
                target
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            print_info("Reboot cancelled.");
            return Ok(());
        }
    }

    let tool = RebootTool::new(system_runner(config), TransportSettings::from_config(config));
    match tool.reboot(&record, target) {
        Ok(plan) => {
            info!("Sent: {}", plan.command_line());
            print_success(target.follow_up());
            Ok(())
        }
        Err(e) => {
            error!("Reboot failed: {}", e);
            if let Some(hint) = failure_hint(&e) {
                print_info(hint);
            }
            Err(e.into())
        }
    }
}

/// Print the scenario catalogue
pub fn list_scenarios() {
    print_header("Detection Scenarios");
    for scenario in ScenarioLibrary::all() {
        println!(
            "  {:<20} {} tick(s)  {}",
            scenario.name,
            scenario.ticks.len(),
            scenario.description
        );
    }
    println!();
}

/// Replay one scenario, or all of them, through the detector
pub fn simulate(name: Option<&str>, verbose: bool) -> Result<()> {
    let scenarios = match name {
        Some(name) => vec![ScenarioLibrary::by_name(name).ok_or_else(|| {
            anyhow!(
                "unknown scenario '{}' (available: {})",
                name,
                ScenarioLibrary::names().join(", ")
            )
        })?],
        None => ScenarioLibrary::all(),
    };

    let summary = ScenarioRunner::new().run_all(&scenarios);
    for result in &summary.results {
        if result.passed {
            print_success(&format!("{} ({})", result.name, format_duration(result.duration)));
        } else {
            print_error(&result.name);
            for failure in &result.failures {
                println!("      {}", failure);
            }
        }

        if verbose {
            for (i, tick) in result.ticks.iter().enumerate() {
                println!("      tick {}: {}", i + 1, tick.summary());
                for event in &tick.events {
                    println!("        {}", event);
                }
            }
        }
    }

    println!();
    println!(
        "  Passed: {}/{} ({:.0}%)",
        summary.passed,
        summary.total,
        summary.pass_rate()
    );

    if summary.failed > 0 {
        return Err(anyhow!(
            "{} scenario(s) failed: {}",
            summary.failed,
            summary.failed_scenarios().join(", ")
        ));
    }
    Ok(())
}

/// Handle the `config` command - open, show path, or reset the config file
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                std::fs::remove_file(&config_path)?;
                info!("Removed existing config file");
            }
        }
        let path = init_config()?;
        info!("Created fresh config file at: {}", path.display());
        return Ok(());
    }

    if show_path {
        let path = Config::get_active_config_path();
        println!("{}", path.display());
        if path.exists() {
            info!("Config file exists at: {}", path.display());
        } else {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    info!("Opening configuration file in default editor...");
    match open_config_in_editor() {
        Ok(path) => {
            info!("Config file: {}", path.display());
            info!("Save the file after editing to apply changes.");
            info!("Run 'droid-monitor show-config' to verify your settings.");
        }
        Err(e) => {
            error!("Failed to open config file: {}", e);
            if let Some(path) = get_config_path() {
                info!("You can manually edit the config at: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            if path.exists() {
                warn!("Overwriting existing file: {}", path.display());
            }
            std::fs::write(&path, Config::generate_default_config())?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to set tool paths, poll interval and timeouts.");
    info!("");
    info!("Quick tip: Run 'droid-monitor config' to open the config in your editor.");

    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[tools]");
    info!("  adb_path = \"{}\"", config.tools.adb_path.display());
    info!("  fastboot_path = \"{}\"", config.tools.fastboot_path.display());
    info!("");
    info!("[monitor]");
    info!("  poll_interval_ms = {}", config.monitor.poll_interval_ms);
    info!("  parallel_probes = {}", config.monitor.parallel_probes);
    info!("");
    info!("[timeouts]");
    info!("  listing_ms = {}", config.timeouts.listing_ms);
    info!("  probe_ms = {}", config.timeouts.probe_ms);
    info!("  shell_ms = {}", config.timeouts.shell_ms);
    info!("  reboot_ms = {}", config.timeouts.reboot_ms);
    info!("  kill_grace_ms = {}", config.timeouts.kill_grace_ms);
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}
