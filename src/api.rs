//! Read-only HTTP surface over the published snapshot (spec §4.11, §6).
//!
//! Every handler here is a thin wrapper around a pure query method on
//! [`crate::snapshot::Snapshot`] or [`SharedState`] — no state-engine logic
//! lives in this module, so the core stays testable without starting a
//! server (spec §1).

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::model::{DeviceStatus, PortErrors, SwitchStatus, SystemStatus};
use crate::orchestrator::OrchestratorHandle;
use crate::state::SharedState;

#[derive(Clone)]
struct AppState {
    shared: Arc<SharedState>,
    orchestrator: OrchestratorHandle,
}

pub fn router(shared: Arc<SharedState>, orchestrator: OrchestratorHandle) -> Router {
    let state = AppState { shared, orchestrator };

    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/devices", get(get_all_devices))
        .route("/api/devices/mismatched", get(get_mismatched_devices))
        .route("/api/devices/matched", get(get_matched_devices))
        .route("/api/devices/offline", get(get_offline_devices))
        .route("/api/ports", get(get_all_ports))
        .route("/api/ports/errors", get(get_ports_with_errors))
        .route("/api/ports/healthy", get(get_healthy_ports))
        .route("/api/switches", get(get_switch_statuses))
        .route("/api/status", get(get_system_status))
        .route("/api/refresh", post(trigger_refresh))
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({ "service": "nlnetstat", "status": "running" }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_all_devices(State(state): State<AppState>) -> Json<Vec<DeviceStatus>> {
    Json(state.shared.snapshot().all_devices())
}

async fn get_mismatched_devices(State(state): State<AppState>) -> Json<Vec<DeviceStatus>> {
    Json(state.shared.snapshot().mismatched_devices())
}

async fn get_matched_devices(State(state): State<AppState>) -> Json<Vec<DeviceStatus>> {
    Json(state.shared.snapshot().matched_devices())
}

async fn get_offline_devices(State(state): State<AppState>) -> Json<Vec<DeviceStatus>> {
    Json(state.shared.snapshot().offline_devices())
}

async fn get_all_ports(State(state): State<AppState>) -> Json<Vec<PortErrors>> {
    Json(state.shared.snapshot().all_ports())
}

async fn get_ports_with_errors(State(state): State<AppState>) -> Json<Vec<PortErrors>> {
    Json(state.shared.snapshot().ports_with_errors())
}

async fn get_healthy_ports(State(state): State<AppState>) -> Json<Vec<PortErrors>> {
    Json(state.shared.snapshot().healthy_ports())
}

async fn get_switch_statuses(State(state): State<AppState>) -> Json<Vec<SwitchStatus>> {
    Json((*state.shared.switch_statuses()).clone())
}

async fn get_system_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(state.shared.system_status())
}

async fn trigger_refresh(State(state): State<AppState>) -> impl IntoResponse {
    state.orchestrator.trigger_refresh().await;
    Json(json!({ "status": "refreshed" }))
}
