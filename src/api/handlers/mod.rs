//! HTTP handlers module

mod entries;
mod sensors;

pub use self::entries::*;
pub use self::sensors::*;

use axum::{response::IntoResponse, Json};
use serde::Serialize;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "cleanpay-bridge".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SuccessResponse {
    pub fn with_id(message: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            id: Some(id.into()),
        }
    }
}
