//! Diffs consecutive snapshots and emits change events (spec §4.7).
//!
//! The detector owns the only long-lived mutable state besides the
//! published snapshot itself: `prev_online`, `prev_mismatched`, and the
//! per-port error-trend ring. All of it is private to the single writer
//! (the orchestrator) — nothing here is shared with the HTTP read side.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{DeviceStatus, PortErrors, PortKey};
use crate::snapshot::Snapshot;
use crate::speed::Speed;

const TREND_WINDOW: usize = 3;
const COOLDOWN: Duration = Duration::minutes(30);

#[derive(Debug, Clone, Serialize)]
pub struct DeviceEventPayload {
    pub name: String,
    pub ip: String,
    pub mac: Option<String>,
    pub expected_speed: String,
    pub actual_speed: Option<Speed>,
    pub switch_name: Option<String>,
    pub port_name: Option<String>,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceEventPayload {
    fn from_status(ip: &str, status: &DeviceStatus) -> Self {
        DeviceEventPayload {
            name: status.name.clone(),
            ip: ip.to_string(),
            mac: status.mac.clone(),
            expected_speed: status.expected_speed.clone(),
            actual_speed: status.actual_speed.clone(),
            switch_name: status.switch_name.clone(),
            port_name: status.port_name.clone(),
            online: status.online,
            last_seen: status.last_seen,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DevicePayload {
    pub action: &'static str,
    pub device: DeviceEventPayload,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortTrendPayload {
    pub port: PortErrors,
    pub error_history: Vec<u64>,
    pub cooldown_minutes: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Device(DevicePayload),
    PortTrend(PortTrendPayload),
}

#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: &'static str,
    pub payload: EventPayload,
}

/// Fixed-capacity ring of the last three error totals for one port.
#[derive(Debug, Clone, Default)]
struct ErrorRing {
    values: VecDeque<u64>,
}

impl ErrorRing {
    fn push(&mut self, value: u64) {
        if self.values.len() == TREND_WINDOW {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    fn is_strictly_rising(&self) -> bool {
        self.values.len() == TREND_WINDOW
            && self.values[0] < self.values[1]
            && self.values[1] < self.values[2]
    }

    fn as_vec(&self) -> Vec<u64> {
        self.values.iter().copied().collect()
    }
}

/// Owns the previous-cycle memory that `detect` diffs against.
#[derive(Debug, Default)]
pub struct EventDetector {
    prev_online: HashSet<String>,
    prev_mismatched: HashSet<String>,
    error_history: HashMap<PortKey, ErrorRing>,
    last_notified: HashMap<PortKey, DateTime<Utc>>,
}

impl EventDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs all three detectors against `snapshot` and advances the
    /// previous-state memory. Events are returned in the fixed order
    /// required by spec §5: offline, online, mismatch, trend.
    pub fn detect(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        events.extend(self.detect_liveness_transitions(snapshot));
        events.extend(self.detect_mismatch_transitions(snapshot));
        events.extend(self.detect_port_trends(snapshot, now));
        events
    }

    fn detect_liveness_transitions(&mut self, snapshot: &Snapshot) -> Vec<Event> {
        let cur_online: HashSet<String> = snapshot
            .devices
            .iter()
            .filter(|(_, d)| d.online)
            .map(|(ip, _)| ip.clone())
            .collect();

        let mut events = Vec::new();

        for ip in self.prev_online.difference(&cur_online) {
            if let Some(status) = snapshot.devices.get(ip) {
                events.push(Event {
                    event_type: "device_offline",
                    payload: EventPayload::Device(DevicePayload {
                        action: "device_offline",
                        device: DeviceEventPayload::from_status(ip, status),
                        message: format!("{} went offline", status.name),
                    }),
                });
            }
        }

        // Suppress the flood on the very first cycle, when prev_online is
        // still empty and every online device would otherwise look "new".
        if !self.prev_online.is_empty() {
            for ip in cur_online.difference(&self.prev_online) {
                if let Some(status) = snapshot.devices.get(ip) {
                    events.push(Event {
                        event_type: "device_online",
                        payload: EventPayload::Device(DevicePayload {
                            action: "device_online",
                            device: DeviceEventPayload::from_status(ip, status),
                            message: format!("{} came online", status.name),
                        }),
                    });
                }
            }
        }

        self.prev_online = cur_online;
        events
    }

    fn detect_mismatch_transitions(&mut self, snapshot: &Snapshot) -> Vec<Event> {
        let cur_mismatched: HashSet<String> = snapshot
            .devices
            .iter()
            .filter(|(_, d)| d.is_mismatched())
            .map(|(ip, _)| ip.clone())
            .collect();

        let mut events = Vec::new();

        for ip in cur_mismatched.difference(&self.prev_mismatched) {
            if let Some(status) = snapshot.devices.get(ip) {
                events.push(Event {
                    event_type: "device_speed_mismatch",
                    payload: EventPayload::Device(DevicePayload {
                        action: "mismatch_detected",
                        device: DeviceEventPayload::from_status(ip, status),
                        message: format!(
                            "{} negotiated {:?} but expected {}",
                            status.name, status.actual_speed, status.expected_speed
                        ),
                    }),
                });
            }
        }

        for ip in self.prev_mismatched.difference(&cur_mismatched) {
            if let Some(status) = snapshot.devices.get(ip) {
                events.push(Event {
                    event_type: "device_speed_mismatch",
                    payload: EventPayload::Device(DevicePayload {
                        action: "mismatch_fixed",
                        device: DeviceEventPayload::from_status(ip, status),
                        message: format!("{} speed mismatch resolved", status.name),
                    }),
                });
            }
        }

        self.prev_mismatched = cur_mismatched;
        events
    }

    fn detect_port_trends(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();

        for port in &snapshot.ports {
            let key: PortKey = (port.switch_name.clone(), port.port_name.clone());
            let ring = self.error_history.entry(key.clone()).or_default();
            ring.push(port.total_errors());

            if !ring.is_strictly_rising() {
                continue;
            }

            let on_cooldown = self
                .last_notified
                .get(&key)
                .is_some_and(|last| now - *last < COOLDOWN);
            if on_cooldown {
                continue;
            }

            events.push(Event {
                event_type: "port_errors_rising",
                payload: EventPayload::PortTrend(PortTrendPayload {
                    port: port.clone(),
                    error_history: ring.as_vec(),
                    cooldown_minutes: COOLDOWN.num_minutes(),
                    message: format!(
                        "{}/{} error counters rising",
                        port.switch_name, port.port_name
                    ),
                }),
            });
            self.last_notified.insert(key, now);
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkStatus;
    use std::collections::HashMap as Map;

    fn port(switch: &str, name: &str, total: u64) -> PortErrors {
        PortErrors {
            switch_name: switch.to_string(),
            port_name: name.to_string(),
            device_name: None,
            link_status: LinkStatus::Up,
            speed: None,
            full_duplex: true,
            rx_bytes: 0,
            tx_bytes: 0,
            rx_dropped: total,
            tx_dropped: 0,
            rx_errors: 0,
            tx_errors: 0,
            rx_fcs_errors: 0,
            tx_fcs_errors: 0,
            rx_pause: 0,
            tx_pause: 0,
            rx_fragment: 0,
            has_issues: total > 0,
        }
    }

    fn device(name: &str, online: bool) -> DeviceStatus {
        DeviceStatus {
            name: name.to_string(),
            display_address: "10.0.0.5".to_string(),
            mac: Some("AA:AA:AA:AA:AA:AA".to_string()),
            expected_speed: "1Gbps".to_string(),
            actual_speed: None,
            switch_name: None,
            port_name: None,
            speed_match: false,
            online,
            last_seen: None,
        }
    }

    fn snap(devices: Vec<(&str, DeviceStatus)>, ports: Vec<PortErrors>) -> Snapshot {
        let mut map = Map::new();
        for (ip, status) in devices {
            map.insert(ip.to_string(), status);
        }
        Snapshot { devices: map, ports }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    /// Invariant 10: first cycle never emits device_online.
    #[test]
    fn first_cycle_suppresses_online_flood() {
        let mut detector = EventDetector::new();
        let snapshot = snap(vec![("10.0.0.5", device("srv", true))], vec![]);
        let events = detector.detect(&snapshot, now());
        assert!(events.is_empty());
    }

    #[test]
    fn offline_transition_emits_after_seen_online() {
        let mut detector = EventDetector::new();
        let online = snap(vec![("10.0.0.5", device("srv", true))], vec![]);
        detector.detect(&online, now());

        let offline = snap(vec![("10.0.0.5", device("srv", false))], vec![]);
        let events = detector.detect(&offline, now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "device_offline");
    }

    /// Invariant 9: [0,1,2] rises once, [2,2,3] never rises, and a rising
    /// run longer than the window is suppressed by cooldown.
    #[test]
    fn rising_sequence_emits_once_then_cooldown_suppresses() {
        let mut detector = EventDetector::new();
        let readings = [0u64, 5, 10, 15, 20, 25];
        let mut emitted = 0;
        for (i, total) in readings.iter().enumerate() {
            let snapshot = snap(vec![], vec![port("sw1", "ether7", *total)]);
            let events = detector.detect(&snapshot, now() + Duration::seconds(i as i64));
            emitted += events.iter().filter(|e| e.event_type == "port_errors_rising").count();
        }
        assert_eq!(emitted, 1);
    }

    #[test]
    fn flat_sequence_never_rises() {
        let mut detector = EventDetector::new();
        for total in [2u64, 2, 3] {
            let snapshot = snap(vec![], vec![port("sw1", "ether7", total)]);
            let events = detector.detect(&snapshot, now());
            assert!(events.iter().all(|e| e.event_type != "port_errors_rising"));
        }
    }

    #[test]
    fn cooldown_expires_after_thirty_minutes() {
        let mut detector = EventDetector::new();
        for (i, total) in [0u64, 1, 2].into_iter().enumerate() {
            let snapshot = snap(vec![], vec![port("sw1", "ether7", total)]);
            detector.detect(&snapshot, now() + Duration::seconds(i as i64));
        }
        // New rising window, just past the cooldown boundary.
        let later = now() + Duration::minutes(31);
        for (i, total) in [10u64, 20, 30].into_iter().enumerate() {
            let snapshot = snap(vec![], vec![port("sw1", "ether7", total)]);
            let events = detector.detect(&snapshot, later + Duration::seconds(i as i64));
            if i == 2 {
                assert_eq!(events.len(), 1);
            }
        }
    }
}
