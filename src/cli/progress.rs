//! Progress and console output utilities for the CLI
//!
//! Key features:
//! - A spinner shown while a detection tick is in flight, which suspends
//!   cleanly when something is logged
//! - Consistent visual styling for status lines and device tables
//! - The log writer that tees to console and file

use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

use crate::device::DeviceRecord;

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Get the spinner style for detection ticks
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║ {} ║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a section divider
pub fn print_divider() {
    println!();
    println!("{}", "─".repeat(60));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

/// One table row for `list`
pub fn device_row(index: usize, record: &DeviceRecord) -> String {
    format!(
        "[{}] {:<20} {:<10} {}",
        index + 1,
        record.serial,
        record.mode.label(),
        record.display_name()
    )
}

// ============================================================================
// Spinner for detection ticks
// ============================================================================

/// Spinner shown while devices are listed and probed
pub struct ScanSpinner {
    spinner: ProgressBar,
    start_time: Instant,
}

impl ScanSpinner {
    pub fn new(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner.set_message(message.to_string());

        Self {
            spinner,
            start_time: Instant::now(),
        }
    }

    /// Log a line while suspending the spinner
    pub fn log(&self, msg: &str) {
        self.spinner.suspend(|| {
            println!("  → {}", msg);
        });
    }

    /// Finish with a summary message
    pub fn finish_with_summary(&self, devices: usize) {
        self.spinner.finish_with_message(format!(
            "✓ Found {} device(s) in {:.1}s",
            devices,
            self.start_time.elapsed().as_secs_f64()
        ));
    }

    /// Finish with an error message
    pub fn finish_with_error(&self, msg: &str) {
        self.spinner.abandon_with_message(format!("✗ {}", msg));
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================
