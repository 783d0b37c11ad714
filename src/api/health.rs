use std::{sync::Arc, time::Instant};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::AppState;

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let started = Instant::now();
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let backend = state.storage.name();

    let ping_started = Instant::now();
    let ping = state.storage.ping();
    let storage_ms = elapsed_ms(ping_started);

    match ping {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "storage": { "backend": backend, "connected": true },
                "timing": {
                    "storageResponseMs": storage_ms,
                    "totalResponseMs": elapsed_ms(started),
                },
                "timestamp": timestamp,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, backend, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "storage": { "backend": backend, "connected": false },
                    "error": e.to_string(),
                    "timing": {
                        "storageResponseMs": storage_ms,
                        "totalResponseMs": elapsed_ms(started),
                    },
                    "timestamp": timestamp,
                })),
            )
                .into_response()
        }
    }
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics disabled").into_response(),
    }
}
