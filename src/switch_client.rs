//! One RouterOS session per switch per cycle.
//!
//! `fetch_all` scopes an entire session: connect, issue queries, close — no
//! pooling across cycles (spec §4.1), so a crashed session only ever costs
//! one switch one cycle. Every per-query failure is logged and degrades to
//! an empty result rather than aborting the remaining queries (spec §7).

mod protocol;

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error};

use crate::error::SwitchError;
use crate::model::{ArpEntry, BridgeHost, DhcpLease, InterfaceInfo, InventorySwitch, NeighborEntry};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const QUERY_TIMEOUT: Duration = Duration::from_secs(8);

/// Everything `fetch_all` collects from one switch in one cycle.
#[derive(Debug, Clone, Default)]
pub struct SwitchSnapshot {
    pub identity: String,
    pub arp: Vec<ArpEntry>,
    pub dhcp: Vec<DhcpLease>,
    pub bridge_hosts: Vec<BridgeHost>,
    pub interfaces: Vec<InterfaceInfo>,
    /// Physical port name -> neighbor identity, for ports with a non-empty
    /// neighbor discovery identity.
    pub uplink_ports: HashMap<String, String>,
}

pub struct SwitchClient {
    config: InventorySwitch,
}

/// A scoped RouterOS connection: one TCP session, closed on every exit path.
struct Session {
    stream: TcpStream,
}

impl SwitchClient {
    pub fn new(config: InventorySwitch) -> Self {
        SwitchClient { config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Connects, runs every table query, and closes the session. Connection
    /// failure is the only error this returns — a query failure after a
    /// successful connect degrades to an empty table for that query.
    pub async fn fetch_all(&self) -> Result<SwitchSnapshot, SwitchError> {
        let mut session = self.connect().await?;

        let identity = session
            .query_identity()
            .await
            .unwrap_or_else(|| self.config.name.clone());
        let arp = session.query_arp().await.unwrap_or_default();
        let dhcp = session.query_dhcp_leases().await.unwrap_or_default();
        let bridge_hosts = session.query_bridge_hosts().await.unwrap_or_default();
        let uplink_ports = session.query_neighbors().await.unwrap_or_default();
        let interfaces = session.query_interfaces().await.unwrap_or_default();

        session.close().await;

        Ok(SwitchSnapshot {
            identity,
            arp,
            dhcp,
            bridge_hosts,
            interfaces,
            uplink_ports,
        })
    }

    /// Opens its own session and pings each of `ips` with `count=1`. Used
    /// only by the Liveness Verifier against the first configured switch
    /// (spec §4.5). Returns an error only if the connection itself fails —
    /// the caller treats that as "skip verification this cycle."
    pub async fn ping_multiple(&self, ips: &[String]) -> Result<HashMap<String, bool>, SwitchError> {
        let mut session = self.connect().await?;
        let mut results = HashMap::new();
        for ip in ips {
            let reachable = session.ping_once(ip).await.unwrap_or(false);
            results.insert(ip.clone(), reachable);
        }
        session.close().await;
        Ok(results)
    }

    async fn connect(&self) -> Result<Session, SwitchError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| SwitchError::ConnectTimeout {
                host: self.config.host.clone(),
                port: self.config.port,
            })?
            .map_err(|source| SwitchError::Connect {
                host: self.config.host.clone(),
                port: self.config.port,
                source,
            })?;

        let mut session = Session { stream };
        session
            .login(&self.config.username, &self.config.password)
            .await?;
        Ok(session)
    }
}

impl Session {
    async fn login(&mut self, username: &str, password: &str) -> Result<(), SwitchError> {
        let words = vec![
            "/login".to_string(),
            format!("=name={username}"),
            format!("=password={password}"),
        ];
        protocol::write_sentence(&mut self.stream, &words).await?;
        let reply = protocol::read_sentence(&mut self.stream).await?;
        if reply.first().map(String::as_str) == Some("!trap") {
            return Err(SwitchError::LoginRejected(
                "invalid credentials".to_string(),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "login trap"),
            ));
        }
        Ok(())
    }

    async fn close(mut self) {
        let _ = protocol::write_sentence(&mut self.stream, &["/quit".to_string()]).await;
    }

    /// Issues `path` with no attribute words and collects every `!re`
    /// sentence until `!done`. A timeout or I/O error is logged and yields
    /// an empty result — other queries on this session still proceed
    /// (spec §4.1, §7 "Missing optional table").
    async fn run_query(&mut self, path: &str) -> Option<Vec<HashMap<String, String>>> {
        let command = format!("/{path}/print");
        if let Err(err) = protocol::write_sentence(&mut self.stream, &[command]).await {
            error!(%path, %err, "failed to send query");
            return None;
        }

        match timeout(QUERY_TIMEOUT, Self::collect_replies(&mut self.stream)).await {
            Ok(Ok(rows)) => Some(rows),
            Ok(Err(err)) => {
                error!(%path, %err, "query failed");
                None
            }
            Err(_) => {
                error!(%path, "query timed out");
                None
            }
        }
    }

    async fn collect_replies(
        stream: &mut TcpStream,
    ) -> Result<Vec<HashMap<String, String>>, SwitchError> {
        let mut rows = Vec::new();
        loop {
            let sentence = protocol::read_sentence(stream).await?;
            match sentence.first().map(String::as_str) {
                Some("!re") => rows.push(protocol::reply_to_map(&sentence)),
                Some("!done") => return Ok(rows),
                Some("!trap") => return Ok(rows),
                _ => return Ok(rows),
            }
        }
    }

    async fn query_identity(&mut self) -> Option<String> {
        let rows = self.run_query("system/identity").await?;
        rows.first()?.get("name").cloned()
    }

    async fn query_arp(&mut self) -> Option<Vec<ArpEntry>> {
        let rows = self.run_query("ip/arp").await?;
        Some(
            rows.into_iter()
                .filter_map(|row| {
                    let ip = row.get("address")?.parse::<Ipv4Addr>().ok()?;
                    let mac = row.get("mac-address")?.to_uppercase();
                    Some(ArpEntry {
                        ip,
                        mac,
                        interface: row.get("interface").cloned().unwrap_or_default(),
                    })
                })
                .collect(),
        )
    }

    async fn query_dhcp_leases(&mut self) -> Option<Vec<DhcpLease>> {
        let rows = self.run_query("ip/dhcp-server/lease").await?;
        Some(
            rows.into_iter()
                .filter_map(|row| {
                    let ip = row.get("address")?.parse::<Ipv4Addr>().ok()?;
                    let mac = row.get("mac-address")?.to_uppercase();
                    Some(DhcpLease { ip, mac })
                })
                .collect(),
        )
    }

    async fn query_bridge_hosts(&mut self) -> Option<Vec<BridgeHost>> {
        let rows = self.run_query("interface/bridge/host").await?;
        Some(
            rows.into_iter()
                .filter_map(|row| {
                    let mac = row.get("mac-address")?.to_uppercase();
                    let interface = row.get("on-interface")?.clone();
                    Some(BridgeHost {
                        mac,
                        interface,
                        bridge: row.get("bridge").cloned().unwrap_or_default(),
                    })
                })
                .collect(),
        )
    }

    /// Builds the physical-port -> neighbor-identity map from `ip/neighbor`.
    /// The `interface` field may be a comma-joined list of bridge members;
    /// the first segment is the physical port. A port that resolves to the
    /// literal `"bridge"` is discarded (spec §4.1).
    async fn query_neighbors(&mut self) -> Option<HashMap<String, String>> {
        let rows = self.run_query("ip/neighbor").await?;
        let mut uplinks = HashMap::new();
        for row in rows {
            let identity = row.get("identity").cloned().unwrap_or_default();
            if identity.is_empty() {
                continue;
            }
            let Some(interface_field) = row.get("interface") else {
                continue;
            };
            let port = interface_field
                .split(',')
                .next()
                .unwrap_or(interface_field)
                .to_string();
            if port == "bridge" {
                continue;
            }
            uplinks.insert(port, identity);
        }
        Some(uplinks)
    }

    async fn query_interfaces(&mut self) -> Option<Vec<InterfaceInfo>> {
        let rows = self.run_query("interface/ethernet").await?;
        let mut interfaces = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.get("name").cloned().unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let running = row.get("running").map(String::as_str) == Some("true");

            let (negotiated_speed, full_duplex) = if running {
                self.query_monitor(&name).await.unwrap_or((None, true))
            } else {
                (None, true)
            };

            interfaces.push(InterfaceInfo {
                name: name.clone(),
                kind: "ethernet".to_string(),
                running,
                negotiated_speed,
                full_duplex,
                rx_bytes: parse_counter(&row, "rx-bytes"),
                tx_bytes: parse_counter(&row, "tx-bytes"),
                rx_dropped: parse_counter(&row, "rx-overflow"),
                tx_dropped: parse_counter(&row, "tx-drop-packet"),
                rx_errors: parse_counter(&row, "rx-error-events"),
                tx_errors: parse_counter(&row, "tx-underrun"),
                rx_fcs_errors: parse_counter(&row, "rx-fcs-error"),
                tx_fcs_errors: parse_counter(&row, "tx-collision")
                    + parse_counter(&row, "tx-late-collision"),
                rx_pause: parse_counter(&row, "rx-pause"),
                tx_pause: parse_counter(&row, "tx-pause"),
                rx_fragment: parse_counter(&row, "rx-fragment"),
            });
        }
        Some(interfaces)
    }

    /// The `monitor`-style `once` call for a single `running` interface,
    /// yielding negotiated rate and duplex. Both default to (none, full
    /// duplex) if absent (spec §4.1).
    async fn query_monitor(&mut self, interface: &str) -> Option<(Option<String>, bool)> {
        let command = "/interface/ethernet/monitor".to_string();
        let words = vec![command, format!("=numbers={interface}"), "=once=".to_string()];
        if let Err(err) = protocol::write_sentence(&mut self.stream, &words).await {
            debug!(%interface, %err, "monitor call failed to send");
            return None;
        }
        match timeout(QUERY_TIMEOUT, Self::collect_replies(&mut self.stream)).await {
            Ok(Ok(rows)) => {
                let row = rows.into_iter().next()?;
                let rate = row.get("rate").cloned();
                let full_duplex = row
                    .get("full-duplex")
                    .map(|v| v == "true")
                    .unwrap_or(true);
                Some((rate, full_duplex))
            }
            _ => None,
        }
    }

    /// Issues `/ping =address=<ip> =count=1` and reports whether any result
    /// row had `received > 0`.
    async fn ping_once(&mut self, ip: &str) -> Option<bool> {
        let words = vec![
            "/ping".to_string(),
            format!("=address={ip}"),
            "=count=1".to_string(),
        ];
        if let Err(err) = protocol::write_sentence(&mut self.stream, &words).await {
            debug!(%ip, %err, "ping failed to send");
            return None;
        }
        match timeout(QUERY_TIMEOUT, Self::collect_replies(&mut self.stream)).await {
            Ok(Ok(rows)) => Some(rows.iter().any(|row| {
                row.get("received")
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(0)
                    > 0
            })),
            _ => None,
        }
    }
}

/// Parses a RouterOS counter field, coercing any non-numeric or missing
/// value to zero (spec §7 "Malformed counter").
fn parse_counter(row: &HashMap<String, String>, key: &str) -> u64 {
    row.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
}
