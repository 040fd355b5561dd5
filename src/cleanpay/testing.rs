//! Scripted in-memory `RoomApi` for tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cleanpay::client::{ApiError, RoomApi, Session};
use crate::models::{Credentials, MachineRecord, RoomStatusSnapshot};

pub fn machine(label_id: &str, status: &str, time_left: Option<i64>) -> MachineRecord {
    MachineRecord {
        label_id: label_id.to_string(),
        status_code: status.to_string(),
        status_text: format!("status {}", status),
        time_left,
    }
}

pub fn room(washers: Vec<MachineRecord>, dryers: Vec<MachineRecord>) -> RoomStatusSnapshot {
    RoomStatusSnapshot { washers, dryers }
}

pub fn credentials(user_id: &str, site_code: &str) -> Credentials {
    Credentials {
        user_id: user_id.to_string(),
        api_key: "test-api-key".to_string(),
        site_code: site_code.to_string(),
    }
}

pub struct FakeRoomApi {
    response: Mutex<Result<RoomStatusSnapshot, ApiError>>,
    enrich_error: Mutex<Option<ApiError>>,
    fetch_delay: Mutex<Option<Duration>>,
    reject_auth: AtomicBool,
    auth_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    enrich_calls: AtomicUsize,
}

impl FakeRoomApi {
    pub fn new(snapshot: RoomStatusSnapshot) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(snapshot)),
            enrich_error: Mutex::new(None),
            fetch_delay: Mutex::new(None),
            reject_auth: AtomicBool::new(false),
            auth_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            enrich_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_snapshot(&self, snapshot: RoomStatusSnapshot) {
        *self.response.lock().unwrap() = Ok(snapshot);
    }

    pub fn fail_with(&self, error: ApiError) {
        *self.response.lock().unwrap() = Err(error);
    }

    pub fn fail_enrichment_with(&self, error: ApiError) {
        *self.enrich_error.lock().unwrap() = Some(error);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn reject_auth(&self, reject: bool) {
        self.reject_auth.store(reject, Ordering::SeqCst);
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn enrich_calls(&self) -> usize {
        self.enrich_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoomApi for FakeRoomApi {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_auth.load(Ordering::SeqCst) {
            return Err(ApiError::Auth("invalid api key".to_string()));
        }
        Ok(Session {
            token: format!("token-{}", credentials.user_id),
        })
    }

    async fn fetch_room_status(
        &self,
        _session: &Session,
        _site_code: &str,
    ) -> Result<RoomStatusSnapshot, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.response.lock().unwrap().clone()
    }

    async fn refresh(
        &self,
        _session: &Session,
        _site_code: &str,
        _snapshot: &mut RoomStatusSnapshot,
    ) -> Result<(), ApiError> {
        self.enrich_calls.fetch_add(1, Ordering::SeqCst);
        match self.enrich_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
