//! Pure projections from a machine record to a sensor value

use serde::Serialize;

use crate::models::MachineRecord;
use crate::sensor::descriptor::SensorKind;

/// Native value of a sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Text(String),
    Minutes(u32),
}

/// Map a raw CleanPay status code to its label; unknown codes pass through
pub fn status_to_text(code: &str) -> String {
    match code {
        "7" => "Available",
        "4" => "Running",
        "5" => "Finished",
        other => other,
    }
    .to_string()
}

/// Seconds remaining to whole minutes, rounded up. Missing or negative is 0.
pub fn time_left_minutes(time_left: Option<i64>) -> u32 {
    let seconds = time_left.unwrap_or(0).max(0) as u64;
    u32::try_from(seconds.div_ceil(60)).unwrap_or(u32::MAX)
}

impl SensorKind {
    pub fn project(self, record: &MachineRecord) -> SensorValue {
        match self {
            SensorKind::Status => SensorValue::Text(status_to_text(&record.status_code)),
            SensorKind::TimeLeft => SensorValue::Minutes(time_left_minutes(record.time_left)),
        }
    }
}
