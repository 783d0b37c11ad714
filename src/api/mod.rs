//! HTTP surface: router construction and shared state.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use outlay_core::StorageBackend;
use tower_http::trace::TraceLayer;

use crate::{auth::require_auth, telemetry::track_metrics, token::TokenSigner};

pub mod expenses;
pub mod health;
pub mod payload;
pub mod users;

pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub tokens: TokenSigner,
    pub cookie_secure: bool,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(storage: Arc<dyn StorageBackend>, tokens: TokenSigner) -> Self {
        Self {
            storage,
            tokens,
            cookie_secure: false,
            metrics: None,
        }
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(users::me))
        .route("/api/expenses", get(expenses::list).post(expenses::create))
        .route("/api/expenses/summary", get(expenses::summary))
        .route(
            "/api/expenses/:id",
            get(expenses::get_one)
                .put(expenses::update)
                .delete(expenses::delete),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/auth/register", post(users::register))
        .route("/api/auth/login", post(users::login))
        .route("/api/auth/logout", post(users::logout))
        .route("/api/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .merge(protected)
        .layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
