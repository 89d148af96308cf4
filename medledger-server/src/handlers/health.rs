use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::server::MedLedgerServer;

/// Liveness probe, reporting database reachability.
#[utoipa::path(get, path = "/health", tag = "health",
    responses((status = 200, description = "Service health")))]
pub async fn health_check(State(server): State<MedLedgerServer>) -> Json<Value> {
    let database = server.db().is_healthy().await;
    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
