//! Shared request state and health check.

use axum::{http::StatusCode, Json};
use serde_json::json;

use crate::services::AuthService;

/// Shared application state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    /// Prefix for links in outgoing email; ends with `/`.
    pub public_base_url: String,
}

impl AppState {
    pub fn auth_service(&self) -> &AuthService {
        &self.auth_service
    }
    pub fn base_url(&self) -> &str {
        &self.public_base_url
    }
}

/// GET /health: liveness check.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "rolodex" })),
    )
}
