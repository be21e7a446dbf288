//! Device snapshots and change detection
//!
//! A `Snapshot` is the set of devices visible at one poll tick, keyed by
//! serial. `diff_snapshots` compares two of them without touching either and
//! returns the events a frontend needs to hear about.

use std::collections::HashMap;

use crate::device::DeviceRecord;
use crate::ui::events::DeviceEvent;

/// Devices visible at one poll tick
///
/// Lookup is by serial. Iteration follows insertion order so event and list
/// output stays stable between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: HashMap<String, DeviceRecord>,
    order: Vec<String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the two transports' records for one tick
    ///
    /// Bootloader records go in first. A debug-bridge record for the same
    /// serial replaces it in place.
    pub fn merge(bootloader: Vec<DeviceRecord>, debug: Vec<DeviceRecord>) -> Self {
        let mut snapshot = Self::new();
        for record in bootloader.into_iter().chain(debug) {
            snapshot.insert(record);
        }
        snapshot
    }

    /// Insert a record, replacing any record with the same serial
    pub fn insert(&mut self, record: DeviceRecord) -> Option<DeviceRecord> {
        let serial = record.serial.clone();
        let previous = self.records.insert(serial.clone(), record);
        if previous.is_none() {
            self.order.push(serial);
        }
        previous
    }

    pub fn get(&self, serial: &str) -> Option<&DeviceRecord> {
        self.records.get(serial)
    }

    pub fn contains(&self, serial: &str) -> bool {
        self.records.contains_key(serial)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.order.iter().filter_map(|serial| self.records.get(serial))
    }

    pub fn serials(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Records in insertion order, consuming the snapshot
    pub fn into_records(mut self) -> Vec<DeviceRecord> {
        self.order
            .iter()
            .filter_map(|serial| self.records.remove(serial))
            .collect()
    }
}

/// Events that turn `previous` into `current`
///
/// Connects and mode changes come first, in `current` order; disconnects
/// follow, in `previous` order.
pub fn diff_snapshots(previous: &Snapshot, current: &Snapshot) -> Vec<DeviceEvent> {
    let mut events = Vec::new();

    for record in current.iter() {
        match previous.get(&record.serial) {
            None => events.push(DeviceEvent::Connected {
                record: record.clone(),
            }),
            Some(old) if old.mode != record.mode => events.push(DeviceEvent::ModeChanged {
                serial: record.serial.clone(),
                previous: old.mode,
                mode: record.mode,
            }),
            Some(_) => {}
        }
    }

    for serial in previous.serials() {
        if !current.contains(serial) {
            events.push(DeviceEvent::Disconnected {
                serial: serial.to_string(),
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceMode;

    fn snap(devices: &[(&str, DeviceMode)]) -> Snapshot {
        let mut s = Snapshot::new();
        for (serial, mode) in devices {
            s.insert(DeviceRecord::new(serial, *mode));
        }
        s
    }

    #[test]
    fn test_merge_debug_wins() {
        let mut fastboot = DeviceRecord::new("DUP", DeviceMode::Fastboot);
        fastboot.product_name = "from-fastboot".into();
        let bootloader = vec![DeviceRecord::new("FB1", DeviceMode::Fastboot), fastboot];
        let debug = vec![
            DeviceRecord::new("DUP", DeviceMode::Adb),
            DeviceRecord::new("ADB1", DeviceMode::Adb),
        ];

        let merged = Snapshot::merge(bootloader, debug);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("DUP").unwrap().mode, DeviceMode::Adb);
        assert!(merged.get("DUP").unwrap().product_name.is_empty());
        let order: Vec<_> = merged.serials().collect();
        assert_eq!(order, vec!["FB1", "DUP", "ADB1"]);
    }

    #[test]
    fn test_into_records_keeps_order() {
        let s = snap(&[("B", DeviceMode::Adb), ("A", DeviceMode::Fastboot)]);
        let serials: Vec<_> = s.into_records().into_iter().map(|r| r.serial).collect();
        assert_eq!(serials, vec!["B", "A"]);
    }

    #[test]
    fn test_diff_connect_change_disconnect() {
        let prev = snap(&[("A", DeviceMode::Adb), ("B", DeviceMode::Fastboot)]);
        let cur = snap(&[("B", DeviceMode::Fastbootd), ("C", DeviceMode::Adb)]);

        let events = diff_snapshots(&prev, &cur);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            DeviceEvent::ModeChanged {
                serial: "B".into(),
                previous: DeviceMode::Fastboot,
                mode: DeviceMode::Fastbootd,
            }
        );
        assert!(matches!(&events[1], DeviceEvent::Connected { record } if record.serial == "C"));
        assert_eq!(
            events[2],
            DeviceEvent::Disconnected {
                serial: "A".into()
            }
        );
    }

    #[test]
    fn test_identical_snapshots_produce_no_events() {
        let s = snap(&[("A", DeviceMode::Adb), ("B", DeviceMode::Fastbootd)]);
        assert!(diff_snapshots(&s, &s.clone()).is_empty());
    }

    #[test]
    fn test_attribute_change_is_not_an_event() {
        let prev = snap(&[("A", DeviceMode::Adb)]);
        let mut cur = prev.clone();
        let mut record = DeviceRecord::new("A", DeviceMode::Adb);
        record.battery = crate::device::BatteryStatus::Level(12);
        cur.insert(record);
        assert!(diff_snapshots(&prev, &cur).is_empty());
    }

    /// Connected/disconnected events match set differences exactly, for every
    /// pair of subsets of a small serial pool.
    #[test]
    fn test_diff_matches_set_difference_exhaustively() {
        let pool = ["A", "B", "C", "D"];
        let modes = [DeviceMode::Adb, DeviceMode::Fastboot];

        for prev_mask in 0u32..16 {
            for cur_mask in 0u32..16 {
                for mode_mask in 0u32..16 {
                    let pick = |mask: u32| -> Vec<(&str, DeviceMode)> {
                        pool.iter()
                            .enumerate()
                            .filter(|(i, _)| mask & (1 << i) != 0)
                            .map(|(i, s)| (*s, modes[((mode_mask >> i) & 1) as usize]))
                            .collect()
                    };
                    let prev = snap(
                        &pick(prev_mask)
                            .into_iter()
                            .map(|(s, _)| (s, DeviceMode::Adb))
                            .collect::<Vec<_>>(),
                    );
                    let cur = snap(&pick(cur_mask));
                    let events = diff_snapshots(&prev, &cur);

                    for event in &events {
                        match event {
                            DeviceEvent::Connected { record } => {
                                assert!(!prev.contains(&record.serial));
                                assert!(cur.contains(&record.serial));
                            }
                            DeviceEvent::Disconnected { serial } => {
                                assert!(prev.contains(serial));
                                assert!(!cur.contains(serial));
                            }
                            DeviceEvent::ModeChanged {
                                serial,
                                previous,
                                mode,
                            } => {
                                assert_ne!(previous, mode);
                                assert_eq!(cur.get(serial).unwrap().mode, *mode);
                            }
                        }
                    }

                    let connected = events.iter().filter(|e| e.kind() == "connected").count();
                    let disconnected = events.iter().filter(|e| e.kind() == "disconnected").count();
                    let expected_connected = cur.serials().filter(|s| !prev.contains(s)).count();
                    let expected_disconnected = prev.serials().filter(|s| !cur.contains(s)).count();
                    assert_eq!(connected, expected_connected);
                    assert_eq!(disconnected, expected_disconnected);

                    // Each serial appears in at most one event
                    let mut serials: Vec<_> = events.iter().map(|e| e.serial()).collect();
                    serials.sort_unstable();
                    serials.dedup();
                    assert_eq!(serials.len(), events.len());

                    // Applying the same snapshot twice is silent
                    assert!(diff_snapshots(&cur, &cur).is_empty());
                }
            }
        }
    }
}
