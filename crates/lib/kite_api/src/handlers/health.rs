//! Health endpoint shared by every service.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use kite_core::store::Backend;
use tracing::warn;

use crate::HealthState;
use crate::models::HealthResponse;

async fn check(service: &str, what: &str, backend: Option<&Arc<dyn Backend>>) -> Option<bool> {
    let backend = backend?;
    match backend.ping().await {
        Ok(()) => Some(true),
        Err(e) => {
            warn!(service, backend = what, error = %e, "health check: backend unreachable");
            Some(false)
        }
    }
}

fn label(ok: bool) -> String {
    if ok { "ok" } else { "error" }.into()
}

/// `GET /health` — service liveness plus a round-trip to each storage
/// backend the service has.
pub async fn health_handler(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = check(state.service, "database", state.database.as_ref()).await;
    let storage = check(state.service, "object storage", state.storage.as_ref()).await;

    let healthy = database.unwrap_or(true) && storage.unwrap_or(true);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if healthy { "OK" } else { "ERROR" }.into(),
            service: state.service.into(),
            database: database.map(label),
            storage: storage.map(label),
        }),
    )
}
