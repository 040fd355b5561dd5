//! CleanPay API client
//!
//! `RoomApi` is the seam the coordinator talks to; `CleanPayClient` is the
//! reqwest-backed implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::models::{optional_seconds, string_or_number, Credentials, MachineKind, RoomStatusSnapshot};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("CleanPay API error (HTTP {status}): {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}

/// Authenticated handle returned by `RoomApi::authenticate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
}

#[async_trait]
pub trait RoomApi: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, ApiError>;

    async fn fetch_room_status(
        &self,
        session: &Session,
        site_code: &str,
    ) -> Result<RoomStatusSnapshot, ApiError>;

    /// Enrichment pass run after every successful fetch
    async fn refresh(
        &self,
        _session: &Session,
        _site_code: &str,
        _snapshot: &mut RoomStatusSnapshot,
    ) -> Result<(), ApiError> {
        Ok(())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    userid: &'a str,
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct MachineDetail {
    #[serde(deserialize_with = "string_or_number")]
    label_id: String,
    status_text: Option<String>,
    #[serde(default, deserialize_with = "optional_seconds")]
    left_time: Option<i64>,
}

/// Machine details, split per list like the room status (label_ids repeat across lists)
#[derive(Debug, Default, Deserialize)]
struct MachineDetails {
    #[serde(default)]
    washers: Vec<MachineDetail>,
    #[serde(default)]
    dryers: Vec<MachineDetail>,
}

impl MachineDetails {
    fn for_kind(&self, kind: MachineKind) -> &[MachineDetail] {
        match kind {
            MachineKind::Washer => &self.washers,
            MachineKind::Dryer => &self.dryers,
        }
    }
}

/// Fold per-machine details into the snapshot, matched by label_id
fn merge_details(snapshot: &mut RoomStatusSnapshot, details: &MachineDetails) {
    for kind in MachineKind::ALL {
        for detail in details.for_kind(kind) {
            for record in snapshot
                .machines_mut(kind)
                .iter_mut()
                .filter(|r| r.label_id == detail.label_id)
            {
                if let Some(text) = &detail.status_text {
                    record.status_text = text.clone();
                }
                if detail.left_time.is_some() {
                    record.time_left = detail.left_time;
                }
            }
        }
    }
}

// ============================================================================
// CleanPay Client
// ============================================================================

/// HTTP client for the CleanPay laundry API
pub struct CleanPayClient {
    base_url: Url,
    http_client: Client,
}

impl CleanPayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        // Url::join drops the last path segment unless it ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ApiError::Request(format!("Invalid base URL {}: {}", normalized, e)))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Request(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// `{base}/api/rooms/{site_code}/{leaf}` with the site code escaped as one segment
    fn room_endpoint(&self, site_code: &str, leaf: &str) -> Result<Url, ApiError> {
        // path_segments_mut skips "." and ".." instead of escaping them
        if matches!(site_code, "" | "." | "..") {
            return Err(ApiError::Request(format!("Invalid site code {:?}", site_code)));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Request(format!("Base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "rooms", site_code, leaf]);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        url: Url,
        what: &str,
    ) -> Result<T, ApiError> {
        let resp = self
            .http_client
            .get(url)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| ApiError::Request(format!("{} request failed: {}", what, e)))?;

        read_json(resp, what).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T, ApiError> {
    let status = resp.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::Auth(format!(
            "{} rejected with HTTP {}",
            what,
            status.as_u16()
        )));
    }

    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    resp.json::<T>()
        .await
        .map_err(|e| ApiError::Parse(format!("{} parse failed: {}", what, e)))
}

#[async_trait]
impl RoomApi for CleanPayClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let url = self.endpoint("api/login")?;
        let body = LoginRequest {
            userid: &credentials.user_id,
            api_key: &credentials.api_key,
        };

        let resp = self
            .http_client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Request(format!("Login request failed: {}", e)))?;

        let login: LoginResponse = read_json(resp, "Login").await?;
        if login.token.is_empty() {
            return Err(ApiError::Auth("Login returned an empty token".to_string()));
        }

        tracing::debug!("[CleanPay] Logged in as {}", credentials.user_id);
        Ok(Session { token: login.token })
    }

    async fn fetch_room_status(
        &self,
        session: &Session,
        site_code: &str,
    ) -> Result<RoomStatusSnapshot, ApiError> {
        let url = self.room_endpoint(site_code, "status")?;
        self.get_json(session, url, "Room status").await
    }

    async fn refresh(
        &self,
        session: &Session,
        site_code: &str,
        snapshot: &mut RoomStatusSnapshot,
    ) -> Result<(), ApiError> {
        let url = self.room_endpoint(site_code, "machines")?;
        let details: MachineDetails = self.get_json(session, url, "Machine details").await?;

        merge_details(snapshot, &details);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MachineRecord;

    fn record(label_id: &str, status: &str) -> MachineRecord {
        MachineRecord {
            label_id: label_id.to_string(),
            status_code: status.to_string(),
            status_text: String::new(),
            time_left: None,
        }
    }

    #[test]
    fn test_merge_details_by_label_and_kind() {
        let mut snapshot = RoomStatusSnapshot {
            washers: vec![record("1", "4"), record("2", "7")],
            dryers: vec![record("1", "5")],
        };
        let details: MachineDetails = serde_json::from_str(
            r#"{
                "washers": [{"label_id": 1, "status_text": "Washing", "left_time": 600}],
                "dryers": [{"label_id": "1", "status_text": "Done"}]
            }"#,
        )
        .unwrap();

        merge_details(&mut snapshot, &details);

        assert_eq!(snapshot.washers[0].status_text, "Washing");
        assert_eq!(snapshot.washers[0].time_left, Some(600));
        assert_eq!(snapshot.washers[1].status_text, "");
        assert_eq!(snapshot.dryers[0].status_text, "Done");
        assert_eq!(snapshot.dryers[0].time_left, None);
    }

    #[test]
    fn test_merge_ignores_unknown_machines() {
        let mut snapshot = RoomStatusSnapshot {
            washers: vec![record("1", "7")],
            dryers: vec![],
        };
        let original = snapshot.clone();
        let details: MachineDetails = serde_json::from_str(
            r#"{"washers": [{"label_id": "9", "left_time": 60}]}"#,
        )
        .unwrap();

        merge_details(&mut snapshot, &details);
        assert_eq!(snapshot, original);
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client =
            CleanPayClient::new("https://cleanpay.example/v2", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.endpoint("api/login").unwrap().as_str(),
            "https://cleanpay.example/v2/api/login"
        );
    }

    #[test]
    fn test_merge_accepts_quoted_left_time() {
        let mut snapshot = RoomStatusSnapshot {
            washers: vec![record("1", "4"), record("2", "7")],
            dryers: vec![],
        };
        let details: MachineDetails = serde_json::from_str(
            r#"{"washers": [
                {"label_id": "1", "left_time": "300"},
                {"label_id": "2", "left_time": ""}
            ]}"#,
        )
        .unwrap();

        merge_details(&mut snapshot, &details);
        assert_eq!(snapshot.washers[0].time_left, Some(300));
        assert_eq!(snapshot.washers[1].time_left, None);
    }

    #[test]
    fn test_room_endpoint_escapes_site_code() {
        let client =
            CleanPayClient::new("https://cleanpay.example/v2", Duration::from_secs(5)).unwrap();
        let url = |site: &str| client.room_endpoint(site, "status").unwrap().to_string();

        assert_eq!(url("SR01"), "https://cleanpay.example/v2/api/rooms/SR01/status");
        assert_eq!(url("SR#1"), "https://cleanpay.example/v2/api/rooms/SR%231/status");
        assert_eq!(url("A?b=1"), "https://cleanpay.example/v2/api/rooms/A%3Fb=1/status");
        assert_eq!(
            url("../../admin"),
            "https://cleanpay.example/v2/api/rooms/..%2F..%2Fadmin/status"
        );
        assert_eq!(url("ABC 12"), "https://cleanpay.example/v2/api/rooms/ABC%2012/status");
    }

    #[test]
    fn test_room_endpoint_on_bare_host() {
        let client = CleanPayClient::new("https://cleanpay.example", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.room_endpoint("SR01", "machines").unwrap().as_str(),
            "https://cleanpay.example/api/rooms/SR01/machines"
        );
    }

    #[test]
    fn test_room_endpoint_rejects_dot_segments() {
        let client =
            CleanPayClient::new("https://cleanpay.example/v2", Duration::from_secs(5)).unwrap();
        for site in ["", ".", ".."] {
            assert!(matches!(
                client.room_endpoint(site, "status"),
                Err(ApiError::Request(_))
            ));
        }
    }

    #[test]
    fn test_invalid_base_url() {
        let result = CleanPayClient::new("not a url", Duration::from_secs(5));
        assert!(matches!(result, Err(ApiError::Request(_))));
    }
}
