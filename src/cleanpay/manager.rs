//! EntryManager: config entry lifecycle
//!
//! Manages one coordinator + syncer + sensor set per configured room,
//! handles the setup form (credential test, uniqueness), setup, unload and
//! reload.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::cleanpay::client::{ApiError, RoomApi};
use crate::cleanpay::coordinator::{RoomCoordinator, SetupError, UpdateFailed};
use crate::cleanpay::sync::RoomSyncer;
use crate::entry_id::entry_unique_id;
use crate::models::{Credentials, EntrySummary, RoomStatusSnapshot};
use crate::sensor::entity::LookupError;
use crate::sensor::{build_entities, MachineSensor};

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("Invalid credentials: {0}")]
    InvalidAuth(#[source] ApiError),

    #[error("Cannot connect to CleanPay: {0}")]
    CannotConnect(#[source] ApiError),

    #[error("Credential check failed: {0}")]
    Unknown(#[source] ApiError),

    #[error("Entry already configured: {0}")]
    AlreadyConfigured(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("Sensor setup failed: {0}")]
    Entities(#[from] LookupError),

    #[error(transparent)]
    Refresh(#[from] UpdateFailed),
}

impl EntryError {
    /// Error key shown on the setup form
    pub fn form_error(&self) -> &'static str {
        match self {
            EntryError::InvalidAuth(_) => "invalid_auth",
            EntryError::CannotConnect(_) => "cannot_connect",
            _ => "unknown",
        }
    }
}

/// A set-up room: coordinator, its scheduler and the sensors built from the first snapshot
pub struct ConfigEntry {
    pub unique_id: String,
    pub title: String,
    pub credentials: Credentials,
    pub coordinator: Arc<RoomCoordinator>,
    pub syncer: Arc<RoomSyncer>,
    pub sensors: Vec<Arc<MachineSensor>>,
    pub created_at: DateTime<Utc>,
}

impl ConfigEntry {
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            unique_id: self.unique_id.clone(),
            title: self.title.clone(),
            user_id: self.credentials.user_id.clone(),
            site_code: self.credentials.site_code.clone(),
            sensor_count: self.sensors.len(),
            last_update_success: self.coordinator.last_update_success(),
            last_updated: self.coordinator.last_updated(),
            last_error: self.coordinator.last_error().map(|e| e.to_string()),
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for ConfigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigEntry")
            .field("unique_id", &self.unique_id)
            .field("title", &self.title)
            .field("credentials", &self.credentials)
            .field("sensors", &self.sensors.len())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

pub struct EntryManager {
    /// unique_id → ConfigEntry
    entries: RwLock<HashMap<String, Arc<ConfigEntry>>>,
    api: Arc<dyn RoomApi>,
    update_interval: Duration,
}

impl EntryManager {
    pub fn new(api: Arc<dyn RoomApi>, update_interval: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            api,
            update_interval,
        }
    }

    /// Check credentials by logging in once
    pub async fn validate_credentials(&self, credentials: &Credentials) -> Result<(), EntryError> {
        match self.api.authenticate(credentials).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(
                    "[EntryManager] Credential check for {} failed: {}",
                    credentials.user_id,
                    e
                );
                Err(match e {
                    ApiError::Auth(_) => EntryError::InvalidAuth(e),
                    ApiError::Request(_) => EntryError::CannotConnect(e),
                    _ => EntryError::Unknown(e),
                })
            }
        }
    }

    /// Setup form submit
    /// 1. Credential test
    /// 2. Abort if the unique ID is taken
    /// 3. Set up the entry
    pub async fn create_entry(&self, credentials: Credentials) -> Result<Arc<ConfigEntry>, EntryError> {
        self.validate_credentials(&credentials).await?;

        let unique_id = entry_unique_id(&credentials.user_id, &credentials.site_code);
        if self.entries.read().await.contains_key(&unique_id) {
            return Err(EntryError::AlreadyConfigured(unique_id));
        }

        self.setup_entry(unique_id, credentials).await
    }

    /// Set up an entry from stored configuration, without the credential test
    pub async fn setup_configured(&self, credentials: Credentials) -> Result<Arc<ConfigEntry>, EntryError> {
        let unique_id = entry_unique_id(&credentials.user_id, &credentials.site_code);
        self.setup_entry(unique_id, credentials).await
    }

    /// First refresh (fatal on failure), register, start the syncer
    async fn setup_entry(
        &self,
        unique_id: String,
        credentials: Credentials,
    ) -> Result<Arc<ConfigEntry>, EntryError> {
        let entry = self.build_entry(unique_id.clone(), credentials).await?;

        {
            let mut map = self.entries.write().await;
            if map.contains_key(&unique_id) {
                return Err(EntryError::AlreadyConfigured(unique_id));
            }
            map.insert(unique_id.clone(), entry.clone());
        }

        start_syncer(&entry);
        tracing::info!(
            "[EntryManager] Set up entry {} ({} sensors)",
            unique_id,
            entry.sensors.len()
        );
        Ok(entry)
    }

    /// Coordinator with its first snapshot, sensors and an idle syncer
    async fn build_entry(
        &self,
        unique_id: String,
        credentials: Credentials,
    ) -> Result<Arc<ConfigEntry>, EntryError> {
        let coordinator = Arc::new(RoomCoordinator::new(
            unique_id.clone(),
            self.api.clone(),
            credentials.clone(),
            self.update_interval,
        ));

        coordinator.initial_refresh().await?;

        let sensors: Vec<Arc<MachineSensor>> = build_entities(&coordinator)?
            .into_iter()
            .map(Arc::new)
            .collect();

        Ok(Arc::new(ConfigEntry {
            unique_id,
            title: credentials.site_code.clone(),
            credentials,
            syncer: Arc::new(RoomSyncer::new(coordinator.clone())),
            coordinator,
            sensors,
            created_at: Utc::now(),
        }))
    }

    /// Remove an entry and stop its syncer
    pub async fn unload_entry(&self, unique_id: &str) -> Result<Arc<ConfigEntry>, EntryError> {
        let entry = {
            let mut map = self.entries.write().await;
            map.remove(unique_id)
        }
        .ok_or_else(|| EntryError::NotFound(unique_id.to_string()))?;

        entry.syncer.stop();
        tracing::info!("[EntryManager] Unloaded entry {}", unique_id);
        Ok(entry)
    }

    /// Set the entry up again with the same credentials.
    /// The previous entry keeps running until the new one is ready; if setup
    /// fails it stays registered and the error is returned.
    pub async fn reload_entry(&self, unique_id: &str) -> Result<Arc<ConfigEntry>, EntryError> {
        let previous = self
            .get_entry(unique_id)
            .await
            .ok_or_else(|| EntryError::NotFound(unique_id.to_string()))?;

        let entry = match self
            .build_entry(previous.unique_id.clone(), previous.credentials.clone())
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    "[EntryManager] Reload of {} failed, keeping previous entry: {}",
                    unique_id,
                    e
                );
                return Err(e);
            }
        };

        {
            let mut map = self.entries.write().await;
            // Unloaded or replaced while the new entry was being built
            let unchanged = map
                .get(unique_id)
                .is_some_and(|current| Arc::ptr_eq(current, &previous));
            if !unchanged {
                return Err(EntryError::NotFound(unique_id.to_string()));
            }
            map.insert(unique_id.to_string(), entry.clone());
        }

        previous.syncer.stop();
        start_syncer(&entry);
        tracing::info!(
            "[EntryManager] Reloaded entry {} ({} sensors)",
            unique_id,
            entry.sensors.len()
        );
        Ok(entry)
    }

    /// On-demand refresh, serialized with the scheduled one
    pub async fn refresh_entry(&self, unique_id: &str) -> Result<Arc<RoomStatusSnapshot>, EntryError> {
        let entry = self
            .get_entry(unique_id)
            .await
            .ok_or_else(|| EntryError::NotFound(unique_id.to_string()))?;

        Ok(entry.syncer.request_refresh().await?)
    }

    pub async fn get_entry(&self, unique_id: &str) -> Option<Arc<ConfigEntry>> {
        let map = self.entries.read().await;
        map.get(unique_id).cloned()
    }

    /// All entries, ordered by unique ID
    pub async fn list_entries(&self) -> Vec<Arc<ConfigEntry>> {
        let map = self.entries.read().await;
        let mut entries: Vec<Arc<ConfigEntry>> = map.values().cloned().collect();
        entries.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        entries
    }

    /// All registered sensors across entries
    pub async fn sensors(&self) -> Vec<Arc<MachineSensor>> {
        self.list_entries()
            .await
            .iter()
            .flat_map(|entry| entry.sensors.iter().cloned())
            .collect()
    }

    pub async fn find_sensor(&self, unique_id: &str) -> Option<Arc<MachineSensor>> {
        let map = self.entries.read().await;
        map.values()
            .flat_map(|entry| entry.sensors.iter())
            .find(|sensor| sensor.unique_id() == unique_id)
            .cloned()
    }
}

fn start_syncer(entry: &ConfigEntry) {
    let syncer = entry.syncer.clone();
    tokio::spawn(async move {
        syncer.start().await;
    });
}
