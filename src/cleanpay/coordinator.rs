//! RoomCoordinator: holds the latest room status for one config entry
//!
//! `refresh()` logs in (reusing the cached session), fetches the room status,
//! runs the enrichment pass and swaps the shared snapshot. Failures never
//! overwrite the previous snapshot. Scheduling and serialization of refreshes
//! belong to `RoomSyncer`.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::cleanpay::client::{ApiError, RoomApi, Session};
use crate::models::{Credentials, MachineKind, RoomStatusSnapshot};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A refresh failed; the cause is kept for diagnostics
#[derive(Debug, Clone, Error)]
#[error("Error communicating with CleanPay: {source}")]
pub struct UpdateFailed {
    #[source]
    pub source: ApiError,
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("First refresh failed: {0}")]
    FirstRefresh(#[source] UpdateFailed),
}

#[derive(Debug, Default)]
struct CoordinatorState {
    data: Option<Arc<RoomStatusSnapshot>>,
    last_update_success: bool,
    last_error: Option<ApiError>,
    last_updated: Option<DateTime<Utc>>,
}

pub struct RoomCoordinator {
    /// Unique ID of the owning config entry
    entry_id: String,
    api: Arc<dyn RoomApi>,
    credentials: Credentials,
    update_interval: Duration,
    session: RwLock<Option<Session>>,
    state: RwLock<CoordinatorState>,
}

impl RoomCoordinator {
    pub fn new(
        entry_id: impl Into<String>,
        api: Arc<dyn RoomApi>,
        credentials: Credentials,
        update_interval: Duration,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            api,
            credentials,
            update_interval,
            session: RwLock::new(None),
            state: RwLock::new(CoordinatorState::default()),
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Latest successful snapshot, `None` before the first success
    pub fn data(&self) -> Option<Arc<RoomStatusSnapshot>> {
        self.read_state(|s| s.data.clone())
    }

    /// Snapshot and last refresh outcome, read together
    pub fn current(&self) -> (Option<Arc<RoomStatusSnapshot>>, bool) {
        self.read_state(|s| (s.data.clone(), s.last_update_success))
    }

    pub fn last_update_success(&self) -> bool {
        self.read_state(|s| s.last_update_success)
    }

    pub fn last_error(&self) -> Option<ApiError> {
        self.read_state(|s| s.last_error.clone())
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.read_state(|s| s.last_updated)
    }

    /// Fetch a fresh snapshot and make it the current one
    pub async fn refresh(&self) -> Result<Arc<RoomStatusSnapshot>, UpdateFailed> {
        match self.fetch().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                {
                    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                    state.data = Some(snapshot.clone());
                    state.last_update_success = true;
                    state.last_error = None;
                    state.last_updated = Some(Utc::now());
                }

                tracing::debug!(
                    "[Coordinator] {} refreshed: {} washers, {} dryers",
                    self.entry_id,
                    snapshot.washers.len(),
                    snapshot.dryers.len()
                );
                Ok(snapshot)
            }
            Err(source) => {
                if source.is_auth() {
                    *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
                }

                {
                    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                    state.last_update_success = false;
                    state.last_error = Some(source.clone());
                }

                tracing::warn!("[Coordinator] {} refresh failed: {}", self.entry_id, source);
                Err(UpdateFailed { source })
            }
        }
    }

    /// First refresh of an entry; without data there is nothing to set up
    pub async fn initial_refresh(&self) -> Result<Arc<RoomStatusSnapshot>, SetupError> {
        self.refresh().await.map_err(SetupError::FirstRefresh)
    }

    async fn fetch(&self) -> Result<RoomStatusSnapshot, ApiError> {
        let session = self.session().await?;
        let site_code = &self.credentials.site_code;

        let mut snapshot = self.api.fetch_room_status(&session, site_code).await?;
        self.api.refresh(&session, site_code, &mut snapshot).await?;

        for kind in MachineKind::ALL {
            let duplicates = snapshot.duplicate_label_ids(kind);
            if !duplicates.is_empty() {
                tracing::warn!(
                    "[Coordinator] {} reported duplicate {} label_ids: {:?}",
                    site_code,
                    kind,
                    duplicates
                );
            }
        }

        Ok(snapshot)
    }

    async fn session(&self) -> Result<Session, ApiError> {
        let cached = self
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(session) = cached {
            return Ok(session);
        }

        let session = self.api.authenticate(&self.credentials).await?;
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(session)
    }

    fn read_state<T>(&self, f: impl FnOnce(&CoordinatorState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }
}
