// handlers/public - endpoints served without authentication

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - service description
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Page Canvas API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Page storage with versioning and restore",
            "provider": state.provider.kind().as_str(),
            "auth": state.auth.is_some(),
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "pages": "/api/pages[/:name] (protected)",
                "versions": "/api/pages/:name/versions[/:version] (protected)",
            }
        }
    }))
}

/// GET /health - liveness
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "provider": state.provider.kind().as_str(),
        }
    }))
}
