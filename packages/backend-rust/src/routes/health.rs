use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
    timestamp: String,
    uptime: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
    started_at: String,
}

async fn root(State(state): State<AppState>) -> Response {
    let store = match state.store() {
        None => "unconfigured",
        Some(store) => match store.ping().await {
            Ok(()) => "connected",
            Err(err) => {
                tracing::warn!(error = %err, "store health check failed");
                "disconnected"
            }
        },
    };
    let ok = store == "connected";

    let response = HealthResponse {
        status: if ok { "ok" } else { "degraded" },
        store,
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
    };

    let status_code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    let started_at: chrono::DateTime<chrono::Utc> = state.started_at_system().into();
    Json(LivenessResponse {
        status: "healthy",
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
        started_at: started_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
    .into_response()
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
