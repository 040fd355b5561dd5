//! API module - HTTP handlers and routes

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::cleanpay::EntryManager;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<EntryManager>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::health_check))
        // Config entries
        .route(
            "/api/entries",
            get(handlers::list_entries).post(handlers::create_entry),
        )
        .route(
            "/api/entries/:id",
            get(handlers::get_entry).delete(handlers::delete_entry),
        )
        .route("/api/entries/:id/reload", post(handlers::reload_entry))
        .route("/api/entries/:id/refresh", post(handlers::refresh_entry))
        // Sensors
        .route("/api/sensors", get(handlers::list_sensors))
        .route("/api/sensors/:unique_id", get(handlers::get_sensor))
}
