//! Joins per-switch raw tables and the inventory into a single consistent
//! view: one [`DeviceStatus`] per configured device and one [`PortErrors`]
//! per ethernet interface. Three deterministic passes (spec §4.4):
//!
//! - Pass A seeds a `DeviceStatus` per inventory device, carrying
//!   `last_seen` forward from the previous cycle.
//! - Pass B builds the global MAC -> IP index, with ARP always winning
//!   over DHCP, and DHCP only filling gaps left by the inventory.
//! - Pass C attributes each switch's bridge hosts to a device and port,
//!   then emits the per-interface `PortErrors` rows.
//!
//! This module has no knowledge of the network — it consumes
//! [`SwitchSnapshot`] values already collected by [`crate::switch_client`],
//! which is what makes it straightforward to test against literal fixture
//! data (spec §8).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::{DeviceStatus, InventoryDevice, LinkStatus, PortErrors};
use crate::speed::normalize;
use crate::switch_client::SwitchSnapshot;

/// An inventory device paired with its resolved IP (spec §4.3's output).
#[derive(Debug, Clone)]
pub struct ResolvedDevice {
    pub device: InventoryDevice,
    pub resolved_ip: String,
}

/// The joined view produced by one poll cycle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub devices: HashMap<String, DeviceStatus>,
    pub ports: Vec<PortErrors>,
}

/// Builds a fresh [`Snapshot`] from this cycle's resolved devices and
/// reachable switch data, carrying `last_seen` forward from `previous`.
///
/// `uplink_label_exclusions` is the site-specific heuristic from spec §9
/// Open Question 2: a neighbor identity containing any of these substrings
/// (case-insensitive) is not used to label its uplink port.
pub fn build(
    resolved_devices: &[ResolvedDevice],
    switches: &[SwitchSnapshot],
    previous: &HashMap<String, DeviceStatus>,
    uplink_label_exclusions: &[String],
    now: DateTime<Utc>,
) -> Snapshot {
    let (mut devices, device_config) = seed_devices(resolved_devices, previous);
    let mac_to_ip = build_mac_ip_index(resolved_devices, switches);

    let mut ports = Vec::new();
    for switch in switches {
        attribute_switch(switch, &mac_to_ip, &device_config, &mut devices, now);
        ports.extend(emit_port_errors(switch, &devices, uplink_label_exclusions));
    }

    Snapshot { devices, ports }
}

/// Pass A: seed one `DeviceStatus` per inventory device, keyed by resolved
/// IP, carrying `last_seen` forward.
fn seed_devices(
    resolved_devices: &[ResolvedDevice],
    previous: &HashMap<String, DeviceStatus>,
) -> (HashMap<String, DeviceStatus>, HashMap<String, InventoryDevice>) {
    let mut devices = HashMap::with_capacity(resolved_devices.len());
    let mut device_config = HashMap::with_capacity(resolved_devices.len());

    for rd in resolved_devices {
        let last_seen = previous.get(&rd.resolved_ip).and_then(|s| s.last_seen);
        devices.insert(
            rd.resolved_ip.clone(),
            DeviceStatus::seed(&rd.device, last_seen),
        );
        device_config.insert(rd.resolved_ip.clone(), rd.device.clone());
    }

    (devices, device_config)
}

/// Pass B: the global MAC -> IP index. Configured MACs seed it; ARP
/// entries from every reachable switch always overwrite; DHCP leases only
/// fill a gap left by both the inventory and ARP (spec §4.4).
fn build_mac_ip_index(
    resolved_devices: &[ResolvedDevice],
    switches: &[SwitchSnapshot],
) -> HashMap<String, String> {
    let mut mac_to_ip: HashMap<String, String> = HashMap::new();
    let mut ip_to_mac: HashMap<String, String> = HashMap::new();

    for rd in resolved_devices {
        if let Some(mac) = &rd.device.mac {
            let mac = mac.to_uppercase();
            mac_to_ip.insert(mac.clone(), rd.resolved_ip.clone());
            ip_to_mac.insert(rd.resolved_ip.clone(), mac);
        }
    }

    for switch in switches {
        for entry in &switch.arp {
            let mac = entry.mac.to_uppercase();
            let ip = entry.ip.to_string();
            mac_to_ip.insert(mac.clone(), ip.clone());
            ip_to_mac.insert(ip, mac);
        }
    }

    for switch in switches {
        for lease in &switch.dhcp {
            let mac = lease.mac.to_uppercase();
            let ip = lease.ip.to_string();
            if !mac_to_ip.contains_key(&mac) && !ip_to_mac.contains_key(&ip) {
                mac_to_ip.insert(mac.clone(), ip.clone());
                ip_to_mac.insert(ip, mac);
            }
        }
    }

    mac_to_ip
}

/// Pass C, attribution half: walk this switch's bridge hosts, resolve each
/// MAC to a device via the global index, and adopt a port per the pinned
/// / auto-discover rule in spec §4.4.
fn attribute_switch(
    switch: &SwitchSnapshot,
    mac_to_ip: &HashMap<String, String>,
    device_config: &HashMap<String, InventoryDevice>,
    devices: &mut HashMap<String, DeviceStatus>,
    now: DateTime<Utc>,
) {
    let mac_to_port: HashMap<&str, &str> = switch
        .bridge_hosts
        .iter()
        .map(|h| (h.mac.as_str(), h.interface.as_str()))
        .collect();

    let port_info: HashMap<&str, &crate::model::InterfaceInfo> = switch
        .interfaces
        .iter()
        .map(|i| (i.name.as_str(), i))
        .collect();

    for (&mac, &port) in &mac_to_port {
        let Some(ip) = mac_to_ip.get(mac) else { continue };
        let Some(status) = devices.get_mut(ip) else { continue };

        status.mac = Some(mac.to_string());
        status.online = true;
        status.last_seen = Some(now);

        let cfg = device_config.get(ip);
        match cfg {
            Some(cfg) if cfg.is_pinned() => {
                if cfg.switch.as_deref() == Some(switch.identity.as_str()) {
                    let pinned_port = cfg.port.as_deref().unwrap();
                    status.port_name = Some(pinned_port.to_string());
                    status.switch_name = Some(switch.identity.clone());
                    if let Some(info) = port_info.get(pinned_port) {
                        apply_speed(status, info);
                    }
                }
                // Pinned to a different switch: this switch's sighting of
                // the MAC does not attribute a port (spec §4.4).
            }
            _ => {
                let is_access_port = !switch.uplink_ports.contains_key(port);
                if is_access_port && status.port_name.is_none() {
                    status.port_name = Some(port.to_string());
                    status.switch_name = Some(switch.identity.clone());
                    if let Some(info) = port_info.get(port) {
                        apply_speed(status, info);
                    }
                }
            }
        }
    }
}

fn apply_speed(status: &mut DeviceStatus, info: &crate::model::InterfaceInfo) {
    let actual = info.negotiated_speed.as_deref().and_then(normalize);
    let expected = normalize(&status.expected_speed);
    status.speed_match = actual.is_some() && actual == expected;
    status.actual_speed = actual;
}

/// Pass C, port-errors half: for each ethernet interface, label it with the
/// attributed device/neighbor and compute `has_issues`.
fn emit_port_errors(
    switch: &SwitchSnapshot,
    devices: &HashMap<String, DeviceStatus>,
    uplink_label_exclusions: &[String],
) -> Vec<PortErrors> {
    let mut port_to_device: HashMap<&str, String> = HashMap::new();

    for (port, identity) in &switch.uplink_ports {
        let lower = identity.to_lowercase();
        let excluded = uplink_label_exclusions
            .iter()
            .any(|pat| lower.contains(&pat.to_lowercase()));
        if !excluded {
            port_to_device.insert(port.as_str(), identity.clone());
        }
    }

    for status in devices.values() {
        if status.switch_name.as_deref() == Some(switch.identity.as_str()) {
            if let Some(port_name) = &status.port_name {
                port_to_device.insert(port_name.as_str(), status.name.clone());
            }
        }
    }

    switch
        .interfaces
        .iter()
        .map(|iface| {
            PortErrors {
                switch_name: switch.identity.clone(),
                port_name: iface.name.clone(),
                device_name: port_to_device.get(iface.name.as_str()).cloned(),
                link_status: if iface.running {
                    LinkStatus::Up
                } else {
                    LinkStatus::Down
                },
                speed: iface.negotiated_speed.as_deref().and_then(normalize),
                full_duplex: iface.full_duplex,
                rx_bytes: iface.rx_bytes,
                tx_bytes: iface.tx_bytes,
                rx_dropped: iface.rx_dropped,
                tx_dropped: iface.tx_dropped,
                rx_errors: iface.rx_errors,
                tx_errors: iface.tx_errors,
                rx_fcs_errors: iface.rx_fcs_errors,
                tx_fcs_errors: iface.tx_fcs_errors,
                rx_pause: iface.rx_pause,
                tx_pause: iface.tx_pause,
                rx_fragment: iface.rx_fragment,
                has_issues: false,
            }
            .finalize()
        })
        .collect()
}

impl Snapshot {
    /// `get_all_devices` (spec §6).
    pub fn all_devices(&self) -> Vec<DeviceStatus> {
        self.devices.values().cloned().collect()
    }

    /// `get_mismatched_devices` (spec §6).
    pub fn mismatched_devices(&self) -> Vec<DeviceStatus> {
        self.devices.values().filter(|d| d.is_mismatched()).cloned().collect()
    }

    /// `get_matched_devices` (spec §6): online and speed-matched, sorted by
    /// resolved IP in dotted-quad numeric order.
    pub fn matched_devices(&self) -> Vec<DeviceStatus> {
        let mut matched: Vec<(&String, &DeviceStatus)> = self
            .devices
            .iter()
            .filter(|(_, d)| d.online && d.speed_match)
            .collect();
        matched.sort_by_key(|(ip, _)| ip_sort_key(ip));
        matched.into_iter().map(|(_, d)| d.clone()).collect()
    }

    /// `get_offline_devices` (spec §6).
    pub fn offline_devices(&self) -> Vec<DeviceStatus> {
        self.devices.values().filter(|d| !d.online).cloned().collect()
    }

    /// `get_all_ports` (spec §6).
    pub fn all_ports(&self) -> Vec<PortErrors> {
        self.ports.clone()
    }

    /// `get_ports_with_errors` (spec §6).
    pub fn ports_with_errors(&self) -> Vec<PortErrors> {
        self.ports.iter().filter(|p| p.has_issues).cloned().collect()
    }

    /// `get_healthy_ports` (spec §6): up ports, sorted by
    /// `(switch_name ASC, rx_bytes+tx_bytes DESC)`.
    pub fn healthy_ports(&self) -> Vec<PortErrors> {
        let mut ports: Vec<PortErrors> = self
            .ports
            .iter()
            .filter(|p| p.link_status == LinkStatus::Up)
            .cloned()
            .collect();
        ports.sort_by(|a, b| {
            a.switch_name
                .cmp(&b.switch_name)
                .then((b.rx_bytes + b.tx_bytes).cmp(&(a.rx_bytes + a.tx_bytes)))
        });
        ports
    }
}

/// Sort key giving dotted-quad IPs their numeric order; anything that
/// doesn't parse (an unresolved hostname) sorts after all real addresses.
fn ip_sort_key(ip: &str) -> (u32, &str) {
    match ip.parse::<std::net::Ipv4Addr>() {
        Ok(addr) => (u32::from(addr), ""),
        Err(_) => (u32::MAX, ip),
    }
}
