//! RoomSyncer: periodic refresh for one config entry
//!
//! Runs in a background tokio task. Every `update_interval` (5 minutes by
//! default) it refreshes the coordinator. Refreshes never overlap: a request
//! arriving while one is in flight waits for it and returns its outcome.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::cleanpay::client::ApiError;
use crate::cleanpay::coordinator::{RoomCoordinator, UpdateFailed};
use crate::models::RoomStatusSnapshot;

pub struct RoomSyncer {
    coordinator: Arc<RoomCoordinator>,
    in_flight: Mutex<()>,
    shutdown: watch::Sender<bool>,
}

impl RoomSyncer {
    pub fn new(coordinator: Arc<RoomCoordinator>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            coordinator,
            in_flight: Mutex::new(()),
            shutdown,
        }
    }

    /// Start the refresh loop; returns once `stop()` is called
    pub async fn start(self: Arc<Self>) {
        let period = self.coordinator.update_interval();
        let entry_id = self.coordinator.entry_id().to_string();
        tracing::info!(
            "[RoomSync] {} starting background refresh (interval: {}s)",
            entry_id,
            period.as_secs()
        );

        let mut shutdown = self.shutdown.subscribe();
        // First refresh already happened during setup
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            // Failure is recorded on the coordinator; try again next tick
            let _ = self.request_refresh().await;
        }

        tracing::info!("[RoomSync] {} stopped", entry_id);
    }

    /// Refresh now, or join the refresh already in flight
    pub async fn request_refresh(&self) -> Result<Arc<RoomStatusSnapshot>, UpdateFailed> {
        match self.in_flight.try_lock() {
            Ok(_guard) => self.coordinator.refresh().await,
            Err(_) => {
                tracing::debug!(
                    "[RoomSync] {} refresh already in flight, waiting",
                    self.coordinator.entry_id()
                );
                let _guard = self.in_flight.lock().await;
                self.last_outcome()
            }
        }
    }

    fn last_outcome(&self) -> Result<Arc<RoomStatusSnapshot>, UpdateFailed> {
        match (self.coordinator.data(), self.coordinator.last_error()) {
            (Some(snapshot), None) => Ok(snapshot),
            (_, Some(source)) => Err(UpdateFailed { source }),
            (None, None) => Err(UpdateFailed {
                source: ApiError::Request("No refresh has completed".to_string()),
            }),
        }
    }

    /// Stop the loop at its next wake-up; an in-flight refresh is left to finish
    pub fn stop(&self) {
        // send() drops the value while no receiver exists, i.e. before start() subscribes
        self.shutdown.send_replace(true);
    }
}
