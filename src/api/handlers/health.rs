use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
    pub version: String,
}

fn label(ok: bool, up: &str, down: &str) -> String {
    if ok { up.to_string() } else { down.to_string() }
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (db_ok, storage_ok) = state.coordinator.health().await;

    Json(HealthResponse {
        status: label(db_ok && storage_ok, "ok", "degraded"),
        database: label(db_ok, "connected", "disconnected"),
        storage: label(storage_ok, "ready", "unavailable"),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
