use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::server::QuillServer;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Current timestamp in RFC3339 format
    pub timestamp: String,
    pub version: String,
    pub tenant: String,
    /// Authorization schema version this process checks against
    pub schema_version: String,
}

/// Liveness probe. Does not call the authorization engine.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(server): State<QuillServer>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tenant: server.authorizer.tenant().to_string(),
        schema_version: server.authorizer.schema_version().to_string(),
    })
}
