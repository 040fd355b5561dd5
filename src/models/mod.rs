//! Data models for the CleanPay bridge

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Machine Models
// ============================================================================

/// Which list of the room a machine belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    Washer,
    Dryer,
}

impl MachineKind {
    /// Washers first, then dryers
    pub const ALL: [MachineKind; 2] = [MachineKind::Washer, MachineKind::Dryer];

    pub fn as_str(&self) -> &'static str {
        match self {
            MachineKind::Washer => "washer",
            MachineKind::Dryer => "dryer",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            MachineKind::Washer => "Washer",
            MachineKind::Dryer => "Dryer",
        }
    }
}

impl fmt::Display for MachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One washer or dryer as reported by the room status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub label_id: String,
    /// Raw status code ("7", "4", "5", ...)
    #[serde(rename = "status", deserialize_with = "string_or_number")]
    pub status_code: String,
    #[serde(default)]
    pub status_text: String,
    /// Seconds remaining, absent or zero when idle
    #[serde(rename = "left_time", default, deserialize_with = "optional_seconds")]
    pub time_left: Option<i64>,
}

/// Room status as fetched in one refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatusSnapshot {
    #[serde(default)]
    pub washers: Vec<MachineRecord>,
    #[serde(default)]
    pub dryers: Vec<MachineRecord>,
}

impl RoomStatusSnapshot {
    pub fn machines(&self, kind: MachineKind) -> &[MachineRecord] {
        match kind {
            MachineKind::Washer => &self.washers,
            MachineKind::Dryer => &self.dryers,
        }
    }

    pub fn machines_mut(&mut self, kind: MachineKind) -> &mut Vec<MachineRecord> {
        match kind {
            MachineKind::Washer => &mut self.washers,
            MachineKind::Dryer => &mut self.dryers,
        }
    }

    /// label_ids that appear more than once in the given list
    pub fn duplicate_label_ids(&self, kind: MachineKind) -> Vec<&str> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in self.machines(kind) {
            *counts.entry(record.label_id.as_str()).or_default() += 1;
        }

        let mut duplicates: Vec<&str> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(label_id, _)| label_id)
            .collect();
        duplicates.sort_unstable();
        duplicates
    }
}

/// Accepts `"4"` as well as `4` on the wire
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

/// Accepts `600`, `600.0`, `"600"`; `""` and null read as absent
pub(crate) fn optional_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(n)) => Ok(Some(n)),
        Some(Raw::Float(f)) => Ok(Some(f as i64)),
        Some(Raw::Str(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid left_time {:?}", s)))
        }
    }
}

// ============================================================================
// Config Entry Models
// ============================================================================

/// Setup-time credentials, also the body of the setup form
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub api_key: String,
    pub site_code: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("api_key", &"***")
            .field("site_code", &self.site_code)
            .finish()
    }
}

/// Entry as listed by the API (never includes the api_key)
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub unique_id: String,
    pub title: String,
    pub user_id: String,
    pub site_code: String,
    pub sensor_count: usize,
    pub last_update_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}
