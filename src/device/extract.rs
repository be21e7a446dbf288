//! Attribute extraction from raw tool output
//!
//! Pure text parsing. Nothing here raises: a value that cannot be found is
//! returned as an empty string (or `None` for typed values), and callers
//! treat that as "not supported by this device".

use regex::Regex;
use std::sync::OnceLock;

/// Elapsed-time annotation appended by the bootloader tool, e.g. `[ 0.012s]`
fn timing_annotation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\s*\d+(?:\.\d+)?\s*s\s*\]").expect("valid regex"))
}

/// `MemTotal:  7812345 kB`
fn meminfo_total() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*MemTotal:\s*(\d+)\s*kB").expect("valid regex"))
}

/// `  level: 85`
fn battery_level() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*level:\s*(\d+)\s*$").expect("valid regex"))
}

/// Prefix some bootloaders put in front of every info line
const BOOTLOADER_PREFIX: &str = "(bootloader)";

/// Success marker the bootloader tool appends after a value
const OKAY_TOKEN: &str = "OKAY";

/// Banners that mean the "value" is really the tool's own trailer
const NOISE_MARKERS: &[&str] = &["Finished.", "Total time"];

/// Extract the value of `var_name` from a bootloader tool response
///
/// Looks for a line that starts with `"<var_name>:"` (after an optional
/// `(bootloader)` prefix), strips trailing status tokens, and rejects values
/// that are only the tool's timing banner. Returns an empty string when the
/// variable is absent.
pub fn extract_var(var_name: &str, response: &str) -> String {
    let key = format!("{}:", var_name);

    for line in response.lines() {
        let line = line.trim();
        let line = line
            .strip_prefix(BOOTLOADER_PREFIX)
            .map(str::trim_start)
            .unwrap_or(line);

        if let Some(rest) = line.strip_prefix(&key) {
            let value = strip_status_tokens(rest);
            if is_noise(&value) {
                return String::new();
            }
            return value;
        }
    }

    String::new()
}

/// Remove the success marker and timing annotation from a value
fn strip_status_tokens(raw: &str) -> String {
    let without_timing = timing_annotation().replace_all(raw, " ");

    let mut kept = Vec::new();
    for token in without_timing.split_whitespace() {
        if token == OKAY_TOKEN {
            break;
        }
        kept.push(token);
    }
    kept.join(" ")
}

fn is_noise(value: &str) -> bool {
    NOISE_MARKERS.iter().any(|marker| value.contains(marker))
}

/// Interpret yes/no style values
pub fn parse_yes_no(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Whether a variable value is present and not an explicit "not found"
pub fn is_present_value(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.to_lowercase().contains("not found")
}

/// Trimmed single-line value of a property query, empty when blank
pub fn clean_property(stdout: &str) -> String {
    stdout.lines().next().unwrap_or("").trim().to_string()
}

/// Parse the processor count printed by `... | wc -l`
pub fn parse_core_count(output: &str) -> Option<u32> {
    output.trim().parse::<u32>().ok().filter(|count| *count > 0)
}

/// Format a core count for display
pub fn format_cores(count: u32) -> String {
    format!("{} cores", count)
}

/// Total memory in kB from a meminfo line
pub fn parse_meminfo_total_kb(output: &str) -> Option<u64> {
    meminfo_total()
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Human-readable size of a kB amount
pub fn format_memory_kb(kb: u64) -> String {
    let gb = kb as f64 / (1024.0 * 1024.0);
    if gb >= 1.0 {
        format!("{:.1} GB", gb)
    } else {
        format!("{} MB", kb / 1024)
    }
}

/// Battery percentage from a battery service dump
pub fn parse_battery_level(output: &str) -> Option<u8> {
    battery_level()
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .filter(|level| *level <= 100)
}

/// Shortest and longest identifier accepted from the subscriber-info parcel
const IMEI_MIN_DIGITS: usize = 14;
const IMEI_MAX_DIGITS: usize = 17;

/// Extract the device identifier from a `service call iphonesubinfo` parcel dump
///
/// Stages, in order:
/// 1. take the quoted text column of every line,
/// 2. drop the first line (parcel header),
/// 3. delete the `.` padding between UTF-16 characters,
/// 4. keep the first whitespace-separated field of each line,
/// 5. concatenate.
///
/// The result is accepted only if it is all digits of a plausible length.
pub fn parse_subscriber_id(parcel: &str) -> String {
    let joined: String = parcel
        .lines()
        .map(quoted_column)
        .skip(1)
        .map(|column| column.replace('.', ""))
        .filter_map(|column| column.split_whitespace().next().map(str::to_string))
        .collect();

    let valid = (IMEI_MIN_DIGITS..=IMEI_MAX_DIGITS).contains(&joined.len())
        && joined.chars().all(|c| c.is_ascii_digit());
    if valid {
        joined
    } else {
        String::new()
    }
}

/// Text between the first pair of single quotes on a line
fn quoted_column(line: &str) -> &str {
    let mut parts = line.split('\'');
    parts.next();
    parts.next().unwrap_or("")
}

/// Output that signals a failed debug-bridge command even with exit code 0
pub fn looks_like_adb_error(output: &str) -> bool {
    let lower = output.trim_start().to_lowercase();
    lower.starts_with("error:")
        || lower.contains("device unauthorized")
        || lower.contains("device offline")
        || lower.contains("no devices/emulators found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_var_same_line_status() {
        assert_eq!(
            extract_var("battery-status", "battery-status: low OKAY [ 0.012s]"),
            "low"
        );
    }

    #[test]
    fn test_extract_var_finished_banner_on_next_line() {
        assert_eq!(
            extract_var(
                "battery-status",
                "battery-status: low\nFinished. Total time: 0.012s"
            ),
            "low"
        );
    }

    #[test]
    fn test_extract_var_failure_banner_only() {
        let response = "getvar:battery-status FAILED (remote: 'GetVar Variable Not found')\n\
                        Finished. Total time: 0.002s";
        assert_eq!(extract_var("battery-status", response), "");
    }

    #[test]
    fn test_extract_var_value_is_banner() {
        assert_eq!(
            extract_var("product", "product: Finished. Total time: 0.001s"),
            ""
        );
    }

    #[test]
    fn test_extract_var_bootloader_prefix() {
        let response = "(bootloader) unlocked: yes\nOKAY [  0.001s]\nFinished. Total time: 0.001s";
        assert_eq!(extract_var("unlocked", response), "yes");
    }

    #[test]
    fn test_extract_var_does_not_match_longer_names() {
        let response = "hw-version-extra: 2\nhw-version: rev_1.0";
        assert_eq!(extract_var("hw-version", response), "rev_1.0");
        assert_eq!(extract_var("hw_version", response), "");
    }

    #[test]
    fn test_extract_var_keeps_inner_spaces() {
        assert_eq!(
            extract_var("version-bootloader", "version-bootloader: slider-1.2 beta"),
            "slider-1.2 beta"
        );
    }

    #[test]
    fn test_extract_var_with_partition_argument() {
        assert_eq!(extract_var("has-slot:system", "has-slot:system: yes"), "yes");
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("yes"), Some(true));
        assert_eq!(parse_yes_no(" No "), Some(false));
        assert_eq!(parse_yes_no("1"), Some(true));
        assert_eq!(parse_yes_no("maybe"), None);
        assert_eq!(parse_yes_no(""), None);
    }

    #[test]
    fn test_is_present_value() {
        assert!(is_present_value("a"));
        assert!(!is_present_value(""));
        assert!(!is_present_value("Variable not found"));
        assert!(!is_present_value("NOT FOUND"));
    }

    #[test]
    fn test_core_count() {
        assert_eq!(parse_core_count("8\n"), Some(8));
        assert_eq!(parse_core_count("0"), None);
        assert_eq!(parse_core_count("cat: /proc/cpuinfo: denied"), None);
        assert_eq!(format_cores(8), "8 cores");
    }

    #[test]
    fn test_meminfo() {
        assert_eq!(
            parse_meminfo_total_kb("MemTotal:        7812345 kB\n"),
            Some(7812345)
        );
        assert_eq!(parse_meminfo_total_kb("MemFree: 1 kB"), None);
        assert_eq!(format_memory_kb(7812345), "7.5 GB");
        assert_eq!(format_memory_kb(524288), "512 MB");
    }

    #[test]
    fn test_battery_level() {
        let dump = "Current Battery Service state:\n  AC powered: false\n  level: 85\n  scale: 100\n";
        assert_eq!(parse_battery_level(dump), Some(85));
        assert_eq!(parse_battery_level("  level: 250"), None);
        assert_eq!(parse_battery_level(""), None);
    }

    #[test]
    fn test_subscriber_id_from_parcel() {
        let parcel = "Result: Parcel(\n\
            \x20 0x00000000: 00000000 0000000f 00350033 00390034 '........3.5.4.9.'\n\
            \x20 0x00000010: 00350030 00300030 00320036 00390035 '0.5.0.0.0.6.2.5.9.'\n\
            \x20 0x00000020: 00320031 00000034                   '1.2.4...        ')";
        assert_eq!(parse_subscriber_id(parcel), "3549050006259124");
    }

    #[test]
    fn test_subscriber_id_rejects_error_parcels() {
        let parcel = "Result: Parcel(\n\
            \x20 0x00000000: ffffffe0 0000004e 00650052 00750071 '....N...R.e.q.u.'\n\
            \x20 0x00000010: 00720069 00730065 00520020 00410045 'i.r.e.s. .R.E.A.')";
        assert_eq!(parse_subscriber_id(parcel), "");
        assert_eq!(parse_subscriber_id(""), "");
    }

    #[test]
    fn test_adb_error_detection() {
        assert!(looks_like_adb_error("error: device unauthorized."));
        assert!(looks_like_adb_error("adb: device offline"));
        assert!(!looks_like_adb_error("34"));
    }
}
