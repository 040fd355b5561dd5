//! Config entry handlers
//!
//! Setup form, listing, unload, reload and on-demand refresh.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::SuccessResponse;
use crate::api::AppState;
use crate::cleanpay::manager::EntryError;
use crate::error::AppError;
use crate::models::{Credentials, EntrySummary};

/// POST /api/entries - Setup form submit (user_id, api_key, site_code)
pub async fn create_entry(
    State(state): State<AppState>,
    Json(form): Json<Credentials>,
) -> impl IntoResponse {
    if form.user_id.trim().is_empty() || form.api_key.is_empty() || form.site_code.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "ok": false,
                "errors": { "base": "missing_fields" },
            })),
        );
    }

    match state.manager.create_entry(form).await {
        Ok(entry) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "ok": true,
                "entry": entry.summary(),
            })),
        ),
        Err(EntryError::AlreadyConfigured(unique_id)) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "ok": false,
                "abort": "already_configured",
                "unique_id": unique_id,
            })),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "ok": false,
                "errors": { "base": e.form_error() },
                "error": e.to_string(),
            })),
        ),
    }
}

/// GET /api/entries - List all entries
pub async fn list_entries(State(state): State<AppState>) -> Json<Vec<EntrySummary>> {
    let entries = state.manager.list_entries().await;
    Json(entries.iter().map(|e| e.summary()).collect())
}

/// GET /api/entries/:id - Get a single entry
pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EntrySummary>, AppError> {
    state
        .manager
        .get_entry(&id)
        .await
        .map(|entry| Json(entry.summary()))
        .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", id)))
}

/// DELETE /api/entries/:id - Unload an entry
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.manager.unload_entry(&id).await?;
    Ok(Json(SuccessResponse::with_id("Entry unloaded", id)))
}

/// POST /api/entries/:id/reload - Set up again; the old entry stays if that fails
pub async fn reload_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EntrySummary>, AppError> {
    let entry = state.manager.reload_entry(&id).await?;
    Ok(Json(entry.summary()))
}

/// POST /api/entries/:id/refresh - Refresh now
pub async fn refresh_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EntrySummary>, AppError> {
    state.manager.refresh_entry(&id).await?;
    let entry = state
        .manager
        .get_entry(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", id)))?;
    Ok(Json(entry.summary()))
}
