//! Re-pings devices Pass C marked online to purge stale ARP/bridge entries
//! (spec §4.5). RouterOS tables keep a MAC around for minutes after the
//! device actually disappears; an active probe is the only way to catch
//! that within one poll interval.

use tracing::warn;

use crate::model::InventorySwitch;
use crate::snapshot::Snapshot;
use crate::switch_client::SwitchClient;

/// Pings every device `snapshot` marked online through the first
/// configured switch (the router — it must reach every subnet). A ping
/// that doesn't come back forces that device offline for this cycle;
/// `last_seen` is untouched since it was already carried over in Pass A.
///
/// If the router itself can't be reached, verification is skipped for the
/// whole cycle — failing open, since forcing every device offline on a
/// transient router hiccup would be worse than one stale cycle.
pub async fn verify(switches: &[InventorySwitch], snapshot: &mut Snapshot) {
    let Some(router) = switches.first() else {
        return;
    };

    let online_ips: Vec<String> = snapshot
        .devices
        .iter()
        .filter(|(_, status)| status.online)
        .map(|(ip, _)| ip.clone())
        .collect();

    if online_ips.is_empty() {
        return;
    }

    let client = SwitchClient::new(router.clone());
    match client.ping_multiple(&online_ips).await {
        Ok(results) => {
            for (ip, reachable) in results {
                if !reachable {
                    if let Some(status) = snapshot.devices.get_mut(&ip) {
                        status.online = false;
                    }
                }
            }
        }
        Err(err) => {
            warn!(%err, router = router.name, "liveness verifier could not reach router; skipping this cycle");
        }
    }
}
