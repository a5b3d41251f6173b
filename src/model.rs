//! Data types shared across the polling pipeline.
//!
//! Raw per-switch tables (`ArpEntry`, `DhcpLease`, `BridgeHost`,
//! `NeighborEntry`, `InterfaceInfo`) are produced by [`crate::switch_client`]
//! and consumed only by [`crate::snapshot`]. The derived view types
//! (`DeviceStatus`, `PortErrors`, `SwitchStatus`, `SystemStatus`) are what
//! gets published and exposed over the HTTP API.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::speed::Speed;

/// One endpoint device from `devices.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryDevice {
    pub name: String,
    /// Literal IP or DNS name, as written in the inventory file.
    pub ip: String,
    pub expected_speed: String,
    pub mac: Option<String>,
    /// Expected switch identity; pins attribution when paired with `port`.
    #[serde(default)]
    pub switch: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
}

impl InventoryDevice {
    pub fn is_pinned(&self) -> bool {
        self.switch.is_some() && self.port.is_some()
    }
}

/// One switch from `switches.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct InventorySwitch {
    pub name: String,
    pub host: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_management_port")]
    pub port: u16,
}

fn default_management_port() -> u16 {
    8728
}

/// ARP table row: IP-to-MAC mapping learned from address resolution.
#[derive(Debug, Clone)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    /// Upper-case canonical form, e.g. `AA:BB:CC:DD:EE:FF`.
    pub mac: String,
    pub interface: String,
}

/// DHCP lease row: IP-to-MAC mapping from the switch's own DHCP server.
#[derive(Debug, Clone)]
pub struct DhcpLease {
    pub ip: Ipv4Addr,
    pub mac: String,
}

/// Bridge host table row: MAC-to-port mapping.
#[derive(Debug, Clone)]
pub struct BridgeHost {
    pub mac: String,
    pub interface: String,
    pub bridge: String,
}

/// Neighbor discovery row. A non-empty `identity` marks `interface` as an
/// uplink to another network device.
#[derive(Debug, Clone)]
pub struct NeighborEntry {
    pub interface: String,
    pub identity: String,
}

/// One `interface/ethernet` row, with its negotiated link parameters and
/// counters.
#[derive(Debug, Clone, Default)]
pub struct InterfaceInfo {
    pub name: String,
    pub kind: String,
    pub running: bool,
    pub negotiated_speed: Option<String>,
    pub full_duplex: bool,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_fcs_errors: u64,
    pub tx_fcs_errors: u64,
    pub rx_pause: u64,
    pub tx_pause: u64,
    pub rx_fragment: u64,
}

/// Derived, one per inventory device, keyed by resolved IP.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub name: String,
    /// Original inventory address (IP literal or DNS name), for display.
    pub display_address: String,
    pub mac: Option<String>,
    pub expected_speed: String,
    pub actual_speed: Option<Speed>,
    pub switch_name: Option<String>,
    pub port_name: Option<String>,
    pub speed_match: bool,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceStatus {
    pub fn seed(device: &InventoryDevice, last_seen: Option<DateTime<Utc>>) -> Self {
        DeviceStatus {
            name: device.name.clone(),
            display_address: device.ip.clone(),
            mac: None,
            expected_speed: device.expected_speed.clone(),
            actual_speed: None,
            switch_name: None,
            port_name: None,
            speed_match: false,
            online: false,
            last_seen,
        }
    }

    pub fn is_mismatched(&self) -> bool {
        self.online && self.actual_speed.is_some() && !self.speed_match
    }
}

/// Derived, one per ethernet interface per switch per cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PortErrors {
    pub switch_name: String,
    pub port_name: String,
    /// The attributed endpoint name, or the neighbor identity if this is an
    /// uplink not overridden by an endpoint attribution.
    pub device_name: Option<String>,
    pub link_status: LinkStatus,
    pub speed: Option<Speed>,
    pub full_duplex: bool,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_fcs_errors: u64,
    pub tx_fcs_errors: u64,
    pub rx_pause: u64,
    pub tx_pause: u64,
    pub rx_fragment: u64,
    pub has_issues: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Up,
    Down,
}

impl PortErrors {
    /// Total error counter used by the trend detector (spec §4.7).
    pub fn total_errors(&self) -> u64 {
        self.rx_dropped
            + self.tx_dropped
            + self.rx_errors
            + self.tx_errors
            + self.rx_fcs_errors
            + self.tx_fcs_errors
            + self.rx_pause
            + self.tx_pause
            + self.rx_fragment
    }

    fn compute_has_issues(&self) -> bool {
        self.rx_dropped > 0
            || self.tx_dropped > 0
            || self.rx_errors > 0
            || self.tx_errors > 0
            || self.rx_fcs_errors > 0
            || self.tx_fcs_errors > 0
            || self.rx_pause > 0
            || self.rx_fragment > 0
            || !self.full_duplex
    }

    /// Recompute and store `has_issues` per the invariant in spec §3. Called
    /// once at construction time by the snapshot builder.
    pub fn finalize(mut self) -> Self {
        self.has_issues = self.compute_has_issues();
        self
    }
}

/// Key identifying a port across cycles for the error trend ring (§4.7).
pub type PortKey = (String, String);

#[derive(Debug, Clone, Serialize)]
pub struct SwitchStatus {
    pub name: String,
    pub host: String,
    pub connected: bool,
    pub error: Option<String>,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub total_devices: usize,
    pub online_devices: usize,
    pub mismatched_speeds: usize,
    pub ports_with_errors: usize,
    pub switches_connected: usize,
    pub switches_total: usize,
    pub last_update: Option<DateTime<Utc>>,
}
