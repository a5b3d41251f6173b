//! Serializes events to the external webhook collaborator (spec §4.8).
//!
//! Best-effort alerting, not durable delivery: a non-2xx response or a
//! transport error is logged and dropped, never retried, and never allowed
//! to block the orchestrator's next cycle.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::warn;

use crate::events::Event;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct NotificationSink {
    client: reqwest::Client,
    url: Option<String>,
}

impl NotificationSink {
    pub fn new(url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .expect("reqwest client builds with no custom TLS config");
        NotificationSink { client, url }
    }

    /// Posts every event in order, independently of one another — one
    /// failed delivery does not skip the rest of the batch.
    pub async fn send_all(&self, events: &[Event], now: DateTime<Utc>) {
        for event in events {
            self.send(event, now).await;
        }
    }

    async fn send(&self, event: &Event, now: DateTime<Utc>) {
        let Some(url) = &self.url else { return };

        let envelope = json!({
            "event_type": event.event_type,
            "timestamp": now.to_rfc3339(),
            "data": event.payload,
        });

        match self.client.post(url).json(&envelope).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(event_type = event.event_type, status = %response.status(), "webhook returned a non-2xx response");
            }
            Err(err) => {
                warn!(event_type = event.event_type, %err, "webhook request failed");
            }
        }
    }
}
