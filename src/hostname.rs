//! Resolves inventory addresses (IP literal or DNS name) to the IP used to
//! key the snapshot and match ARP/DHCP tables.

use std::net::Ipv4Addr;

use tracing::warn;

/// Resolves `address` to an IPv4 literal.
///
/// If `address` already parses as a dotted-quad, it is returned unchanged.
/// Otherwise a DNS lookup is attempted; on failure the original string is
/// returned and a warning is logged — the caller is then left with a
/// `resolved_ip` equal to the unresolved name, which will never match an
/// ARP/DHCP entry, so the device simply stays offline (spec §4.3, §7).
pub async fn resolve(address: &str) -> String {
    if address.parse::<Ipv4Addr>().is_ok() {
        return address.to_string();
    }

    match tokio::net::lookup_host((address, 0)).await {
        Ok(mut addrs) => {
            if let Some(resolved) = addrs.find_map(|a| match a.ip() {
                std::net::IpAddr::V4(v4) => Some(v4),
                std::net::IpAddr::V6(_) => None,
            }) {
                return resolved.to_string();
            }
            warn!(%address, "DNS resolution returned no A record");
            address.to_string()
        }
        Err(err) => {
            warn!(%address, %err, "could not resolve hostname");
            address.to_string()
        }
    }
}
