//! Holds the published snapshot and exposes it to many readers without
//! ever letting one observe a half-built cycle (spec §4.6).
//!
//! `SharedState` is the only thing shared between the orchestrator (the
//! single writer) and the HTTP API (many readers): an `ArcSwap` per
//! published field. Strategy (b) from spec §9 — readers are wait-free,
//! and a collection in progress never blocks a request.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

use crate::model::{SwitchStatus, SystemStatus};
use crate::snapshot::Snapshot;

pub struct SharedState {
    snapshot: ArcSwap<Snapshot>,
    switch_statuses: ArcSwap<Vec<SwitchStatus>>,
    last_update: ArcSwap<Option<DateTime<Utc>>>,
}

impl Default for SharedState {
    fn default() -> Self {
        SharedState {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            switch_statuses: ArcSwap::from_pointee(Vec::new()),
            last_update: ArcSwap::from_pointee(None),
        }
    }
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub fn switch_statuses(&self) -> Arc<Vec<SwitchStatus>> {
        self.switch_statuses.load_full()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.load_full()
    }

    /// Atomically publishes the result of one completed cycle.
    pub fn publish(&self, snapshot: Snapshot, switch_statuses: Vec<SwitchStatus>, now: DateTime<Utc>) {
        self.snapshot.store(Arc::new(snapshot));
        self.switch_statuses.store(Arc::new(switch_statuses));
        self.last_update.store(Arc::new(Some(now)));
    }

    /// `get_system_status` (spec §6): aggregate counts over the currently
    /// published snapshot and switch statuses.
    pub fn system_status(&self) -> SystemStatus {
        let snapshot = self.snapshot();
        let switches = self.switch_statuses();
        SystemStatus {
            total_devices: snapshot.devices.len(),
            online_devices: snapshot.devices.values().filter(|d| d.online).count(),
            mismatched_speeds: snapshot.devices.values().filter(|d| d.is_mismatched()).count(),
            ports_with_errors: snapshot.ports.iter().filter(|p| p.has_issues).count(),
            switches_connected: switches.iter().filter(|s| s.connected).count(),
            switches_total: switches.len(),
            last_update: self.last_update(),
        }
    }
}
