//! fallguard-monitor library
//!
//! Fall confirmation service: geometry classifier, per-entity debounce,
//! single-slot human confirmation and rotating caregiver notification,
//! behind an axum HTTP surface.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod confirm;
pub mod detection;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod replay;

pub use error::{ApiError, Error, Result};
pub use monitor::FallMonitor;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<FallMonitor>,
}

impl AppState {
    pub fn new(monitor: Arc<FallMonitor>) -> Self {
        Self { monitor }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/detect", post(api::detect))
        .route("/api/confirm_fall", post(api::confirm_fall))
        .route("/api/deny_fall", post(api::deny_fall))
        .route("/api/status", get(api::status))
        .route("/api/events", get(api::event_stream));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
