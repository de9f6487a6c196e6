use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status plus the active backends.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "outreach-api",
        "store": format!("{:?}", state.config.store_backend).to_lowercase(),
        "outreach": format!("{:?}", state.config.outreach_backend).to_lowercase(),
    }))
}
