//! Sensor state handlers

use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::AppState;
use crate::error::AppError;
use crate::sensor::SensorState;

/// GET /api/sensors - Current state of every sensor
pub async fn list_sensors(State(state): State<AppState>) -> Json<Vec<SensorState>> {
    let sensors = state.manager.sensors().await;
    Json(sensors.iter().map(|s| s.state()).collect())
}

/// GET /api/sensors/:unique_id - Current state of one sensor
pub async fn get_sensor(
    State(state): State<AppState>,
    Path(unique_id): Path<String>,
) -> Result<Json<SensorState>, AppError> {
    state
        .manager
        .find_sensor(&unique_id)
        .await
        .map(|sensor| Json(sensor.state()))
        .ok_or_else(|| AppError::NotFound(format!("Sensor {} not found", unique_id)))
}
