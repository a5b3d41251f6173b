//! Drives the periodic collection: fan out to every switch, join into a
//! snapshot, verify liveness, publish, then detect and notify (spec §4.9).
//!
//! Overlap is prevented by wrapping the mutable pipeline state in a
//! `tokio::sync::Mutex` and using `try_lock`: a tick that fires while the
//! previous cycle is still in flight is dropped rather than queued, per
//! spec §4.9 and §5's "cycles are totally ordered, no overlap."

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::events::EventDetector;
use crate::model::{InventoryDevice, InventorySwitch, SwitchStatus};
use crate::notify::NotificationSink;
use crate::snapshot::{self, ResolvedDevice};
use crate::state::SharedState;
use crate::switch_client::SwitchClient;
use crate::{hostname, liveness};

struct Pipeline {
    switches: Vec<InventorySwitch>,
    devices: Vec<InventoryDevice>,
    uplink_label_exclusions: Vec<String>,
    shared: Arc<SharedState>,
    events: EventDetector,
    sink: NotificationSink,
}

impl Pipeline {
    async fn collect_once(&mut self) {
        let now = Utc::now();
        info!("starting poll cycle");

        let resolved_devices = resolve_all(&self.devices).await;

        let fetches = self.switches.iter().map(|switch| {
            let client = SwitchClient::new(switch.clone());
            let switch = switch.clone();
            async move {
                let result = client.fetch_all().await;
                (switch, result)
            }
        });
        let results = futures::future::join_all(fetches).await;

        let mut switch_snapshots = Vec::new();
        let mut switch_statuses = Vec::new();
        for (switch, result) in results {
            match result {
                Ok(snap) => {
                    switch_statuses.push(SwitchStatus {
                        name: snap.identity.clone(),
                        host: switch.host.clone(),
                        connected: true,
                        error: None,
                        last_check: now,
                    });
                    switch_snapshots.push(snap);
                }
                Err(err) => {
                    error!(switch = %switch.name, %err, "switch unreachable this cycle");
                    switch_statuses.push(SwitchStatus {
                        name: switch.name.clone(),
                        host: switch.host.clone(),
                        connected: false,
                        error: Some(err.to_string()),
                        last_check: now,
                    });
                }
            }
        }

        let previous_devices = self.shared.snapshot().devices.clone();
        let mut snapshot = snapshot::build(
            &resolved_devices,
            &switch_snapshots,
            &previous_devices,
            &self.uplink_label_exclusions,
            now,
        );

        liveness::verify(&self.switches, &mut snapshot).await;

        self.shared.publish(snapshot.clone(), switch_statuses, now);

        let events = self.events.detect(&snapshot, now);
        self.sink.send_all(&events, now).await;

        info!(
            devices = snapshot.devices.len(),
            ports = snapshot.ports.len(),
            events = events.len(),
            "poll cycle complete"
        );
    }
}

async fn resolve_all(devices: &[InventoryDevice]) -> Vec<ResolvedDevice> {
    let lookups = devices.iter().map(|device| async move {
        let resolved_ip = hostname::resolve(&device.ip).await;
        ResolvedDevice {
            device: device.clone(),
            resolved_ip,
        }
    });
    futures::future::join_all(lookups).await
}

/// Shared handle used both by the background poll loop and by the
/// `/api/refresh` handler — both paths go through the same overlap guard.
#[derive(Clone)]
pub struct OrchestratorHandle {
    pipeline: Arc<tokio::sync::Mutex<Pipeline>>,
    poll_interval: Duration,
}

impl OrchestratorHandle {
    pub fn new(
        settings: &Settings,
        switches: Vec<InventorySwitch>,
        devices: Vec<InventoryDevice>,
        shared: Arc<SharedState>,
    ) -> Self {
        let sink = NotificationSink::new(settings.webhook_url.clone());
        let pipeline = Pipeline {
            switches,
            devices,
            uplink_label_exclusions: settings.uplink_label_exclusions.clone(),
            shared,
            events: EventDetector::new(),
            sink,
        };
        OrchestratorHandle {
            pipeline: Arc::new(tokio::sync::Mutex::new(pipeline)),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
        }
    }

    /// Runs the initial immediate collection, then ticks forever at the
    /// configured interval. Never returns.
    pub async fn run(self) {
        self.try_collect().await;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.tick().await; // interval's own first tick fires immediately; consume it since we already ran one
        loop {
            ticker.tick().await;
            self.try_collect().await;
        }
    }

    /// `trigger_refresh` (spec §6): runs one collection synchronously,
    /// through the same overlap guard as the background loop.
    pub async fn trigger_refresh(&self) {
        self.try_collect().await;
    }

    async fn try_collect(&self) {
        match self.pipeline.try_lock() {
            Ok(mut pipeline) => pipeline.collect_once().await,
            Err(_) => warn!("previous poll cycle still running; dropping this tick"),
        }
    }
}
