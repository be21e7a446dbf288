//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Detect and classify Android devices attached over adb and fastboot
#[derive(Parser, Debug)]
#[command(name = "droid-monitor")]
#[command(author = "Vihaan Reddy M")]
#[command(version)]
#[command(about = "Detect Android devices over adb and fastboot, classify their mode, and watch for changes", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the adb binary (overrides config)
    #[arg(long, global = true, value_name = "PATH")]
    pub adb: Option<PathBuf>,

    /// Path to the fastboot binary (overrides config)
    #[arg(long, global = true, value_name = "PATH")]
    pub fastboot: Option<PathBuf>,

    /// Probe devices in parallel (overrides config)
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List attached devices and their modes
    List {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show everything known about one device
    Info {
        /// Device serial number
        serial: String,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Watch for devices connecting, disconnecting and changing mode
    ///
    /// Runs until interrupted with Ctrl+C.
    Watch {
        /// Poll interval in milliseconds (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Reboot a device into another mode
    ///
    /// Targets: system, recovery, bootloader (alias: fastboot), fastbootd,
    /// edl, shutdown (aliases: poweroff, off).
    Reboot {
        /// Device serial number
        serial: String,

        /// Target mode
        target: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Replay a scripted device scenario through the detector
    ///
    /// No real device or tools are used; the scenario's scripted tool output
    /// is fed to the detection engine tick by tick.
    Simulate {
        /// Scenario name (see --list); runs every scenario when omitted
        scenario: Option<String>,

        /// List available scenarios
        #[arg(long)]
        list: bool,

        /// Print every event, not just failures
        #[arg(short, long)]
        verbose: bool,
    },

    /// Open the configuration file in your default editor
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\droid_monitor\config.toml
    /// - Linux: ~/.config/droid_monitor/config.toml
    /// - macOS: ~/Library/Application Support/droid_monitor/config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Show the config file path without opening it
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reboot() {
        let args = Args::parse_from(["droid-monitor", "reboot", "ABC123", "bootloader", "--yes"]);
        match args.command {
            Some(Commands::Reboot {
                serial,
                target,
                yes,
            }) => {
                assert_eq!(serial, "ABC123");
                assert_eq!(target, "bootloader");
                assert!(yes);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let args = Args::parse_from([
            "droid-monitor",
            "list",
            "--json",
            "--adb",
            "/opt/platform-tools/adb",
            "--log-level",
            "debug",
        ]);
        assert!(matches!(args.command, Some(Commands::List { json: true })));
        assert_eq!(args.adb, Some(PathBuf::from("/opt/platform-tools/adb")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.fastboot.is_none());
    }

    #[test]
    fn test_no_subcommand() {
        let args = Args::parse_from(["droid-monitor"]);
        assert!(args.command.is_none());
    }
}
