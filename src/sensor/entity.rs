//! Machine sensors backed by a shared coordinator
//!
//! A sensor holds only its descriptor and an `Arc` to the coordinator; every
//! render resolves the machine again in the coordinator's current snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::cleanpay::coordinator::RoomCoordinator;
use crate::models::{MachineKind, MachineRecord, RoomStatusSnapshot};
use crate::sensor::descriptor::{DeviceClass, SensorDescriptor};
use crate::sensor::projection::SensorValue;

pub const DOMAIN: &str = "cleanpay_ha";
pub const ATTRIBUTION: &str = "Data provided by CleanPay";
pub const MANUFACTURER: &str = "CleanPay App";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("No {machine} with label_id {label_id} in current room status")]
    NotFound {
        machine: MachineKind,
        label_id: String,
    },

    #[error("{count} {machine}s share label_id {label_id}")]
    Ambiguous {
        machine: MachineKind,
        label_id: String,
        count: usize,
    },

    #[error("Coordinator has no room status yet")]
    NoData,

    #[error("Last refresh failed")]
    RefreshFailed,
}

/// Find the single record with `label_id` in the given list
pub fn resolve<'a>(
    snapshot: &'a RoomStatusSnapshot,
    machine: MachineKind,
    label_id: &str,
) -> Result<&'a MachineRecord, LookupError> {
    let mut matches = snapshot
        .machines(machine)
        .iter()
        .filter(|r| r.label_id == label_id);

    let first = matches.next().ok_or_else(|| LookupError::NotFound {
        machine,
        label_id: label_id.to_string(),
    })?;

    let extra = matches.count();
    if extra > 0 {
        return Err(LookupError::Ambiguous {
            machine,
            label_id: label_id.to_string(),
            count: extra + 1,
        });
    }

    Ok(first)
}

// ============================================================================
// Rendered state
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<(String, String)>,
    pub manufacturer: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorAttributes {
    pub label_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorState {
    pub unique_id: String,
    pub entry_id: String,
    pub name: String,
    pub icon: &'static str,
    pub device_class: DeviceClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    pub available: bool,
    pub value: Option<SensorValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<SensorAttributes>,
    pub attribution: &'static str,
    pub device: DeviceInfo,
}

// ============================================================================
// Machine Sensor
// ============================================================================

pub struct MachineSensor {
    coordinator: Arc<RoomCoordinator>,
    descriptor: SensorDescriptor,
    unique_id: String,
    device: DeviceInfo,
    /// Availability at the last render, to log only on change
    was_available: AtomicBool,
}

impl MachineSensor {
    pub fn new(coordinator: Arc<RoomCoordinator>, descriptor: SensorDescriptor) -> Self {
        let entry_id = coordinator.entry_id();
        let unique_id = format!("{}-cleanpay-{}", entry_id, descriptor.key);
        let device = DeviceInfo {
            identifiers: vec![(
                DOMAIN.to_string(),
                format!("{}_laundryroom_{}", entry_id, descriptor.label_id),
            )],
            manufacturer: MANUFACTURER.to_string(),
            name: format!(
                "CleanPay Laundry Room {} {}",
                descriptor.machine.title(),
                descriptor.label_id
            ),
        };

        Self {
            coordinator,
            descriptor,
            unique_id,
            device,
            was_available: AtomicBool::new(true),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn descriptor(&self) -> &SensorDescriptor {
        &self.descriptor
    }

    /// This sensor's machine in the coordinator's current snapshot,
    /// provided the last refresh succeeded
    pub fn appliance(&self) -> Result<MachineRecord, LookupError> {
        let (snapshot, last_update_success) = self.coordinator.current();
        if !last_update_success {
            return Err(LookupError::RefreshFailed);
        }
        let snapshot = snapshot.ok_or(LookupError::NoData)?;
        resolve(&snapshot, self.descriptor.machine, &self.descriptor.label_id).cloned()
    }

    pub fn native_value(&self) -> Option<SensorValue> {
        self.appliance()
            .ok()
            .map(|record| self.descriptor.kind.project(&record))
    }

    pub fn extra_state_attributes(&self) -> Option<SensorAttributes> {
        self.appliance().ok().map(attributes)
    }

    /// Unavailable after a failed refresh or when the machine cannot be resolved
    pub fn available(&self) -> bool {
        self.appliance().is_ok()
    }

    /// Render value, attributes and availability from one snapshot read
    pub fn state(&self) -> SensorState {
        let resolved = self.appliance();
        self.note_availability(&resolved);

        let descriptor = self.descriptor();
        let record = resolved.ok();
        SensorState {
            unique_id: self.unique_id.clone(),
            entry_id: self.coordinator.entry_id().to_string(),
            name: descriptor.name.clone(),
            icon: descriptor.icon(),
            device_class: descriptor.device_class(),
            unit_of_measurement: descriptor.unit(),
            available: record.is_some(),
            value: record.as_ref().map(|r| descriptor.kind.project(r)),
            attributes: record.map(attributes),
            attribution: ATTRIBUTION,
            device: self.device.clone(),
        }
    }

    fn note_availability(&self, resolved: &Result<MachineRecord, LookupError>) {
        let available = resolved.is_ok();
        if self.was_available.swap(available, Ordering::Relaxed) == available {
            return;
        }
        match resolved {
            Ok(_) => tracing::info!("[Sensor] {} available again", self.unique_id),
            Err(e) => tracing::warn!("[Sensor] {} unavailable: {}", self.unique_id, e),
        }
    }
}

fn attributes(record: MachineRecord) -> SensorAttributes {
    SensorAttributes {
        label_id: record.label_id,
        status: record.status_text,
    }
}

/// Create washer sensors then dryer sensors from the coordinator's current data
pub fn build_entities(coordinator: &Arc<RoomCoordinator>) -> Result<Vec<MachineSensor>, LookupError> {
    let snapshot = coordinator.data().ok_or(LookupError::NoData)?;

    let sensors = MachineKind::ALL
        .iter()
        .flat_map(|kind| {
            snapshot
                .machines(*kind)
                .iter()
                .flat_map(move |record| SensorDescriptor::for_machine(*kind, &record.label_id))
        })
        .map(|descriptor| MachineSensor::new(coordinator.clone(), descriptor))
        .collect();

    Ok(sensors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanpay::client::ApiError;
    use crate::cleanpay::coordinator::DEFAULT_UPDATE_INTERVAL;
    use crate::cleanpay::testing::{credentials, machine, room, FakeRoomApi};
    use crate::sensor::descriptor::SensorKind;
    use tokio_test::{assert_err, assert_ok};

    async fn setup(snapshot: RoomStatusSnapshot) -> (Arc<FakeRoomApi>, Arc<RoomCoordinator>) {
        let api = FakeRoomApi::new(snapshot);
        let coordinator = Arc::new(RoomCoordinator::new(
            "user-sr01",
            api.clone(),
            credentials("user", "SR01"),
            DEFAULT_UPDATE_INTERVAL,
        ));
        coordinator.initial_refresh().await.unwrap();
        (api, coordinator)
    }

    #[test]
    fn test_resolve_unique_match() {
        let snapshot = room(
            vec![machine("1", "4", Some(600)), machine("2", "7", None)],
            vec![machine("1", "5", None)],
        );

        let record = assert_ok!(resolve(&snapshot, MachineKind::Washer, "2"));
        assert_eq!(record.status_code, "7");

        let record = assert_ok!(resolve(&snapshot, MachineKind::Dryer, "1"));
        assert_eq!(record.status_code, "5");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let snapshot = room(vec![machine("1", "4", Some(600))], vec![]);
        let first = resolve(&snapshot, MachineKind::Washer, "1").unwrap().clone();
        let second = resolve(&snapshot, MachineKind::Washer, "1").unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_not_found() {
        let snapshot = room(vec![machine("1", "4", None)], vec![]);

        let err = assert_err!(resolve(&snapshot, MachineKind::Dryer, "1"));
        assert_eq!(
            err,
            LookupError::NotFound {
                machine: MachineKind::Dryer,
                label_id: "1".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_duplicate_is_ambiguous() {
        let snapshot = room(
            vec![machine("1", "4", None), machine("1", "7", None)],
            vec![],
        );

        let err = assert_err!(resolve(&snapshot, MachineKind::Washer, "1"));
        assert_eq!(
            err,
            LookupError::Ambiguous {
                machine: MachineKind::Washer,
                label_id: "1".to_string(),
                count: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_build_entities_washers_then_dryers() {
        let (_, coordinator) = setup(room(
            vec![machine("1", "4", Some(600)), machine("2", "7", None)],
            vec![machine("1", "5", None)],
        ))
        .await;

        let sensors = build_entities(&coordinator).unwrap();
        let keys: Vec<&str> = sensors.iter().map(|s| s.descriptor().key.as_str()).collect();

        assert_eq!(
            keys,
            vec![
                "cleanpay_washer_1",
                "cleanpay_washer_1_timeleft",
                "cleanpay_washer_2",
                "cleanpay_washer_2_timeleft",
                "cleanpay_dryer_1",
                "cleanpay_dryer_1_timeleft",
            ]
        );
        assert_eq!(sensors[0].unique_id(), "user-sr01-cleanpay-cleanpay_washer_1");
    }

    #[tokio::test]
    async fn test_build_entities_without_data() {
        let api = FakeRoomApi::new(room(vec![], vec![]));
        let coordinator = Arc::new(RoomCoordinator::new(
            "user-sr01",
            api,
            credentials("user", "SR01"),
            DEFAULT_UPDATE_INTERVAL,
        ));

        assert_eq!(build_entities(&coordinator).err(), Some(LookupError::NoData));
    }

    #[tokio::test]
    async fn test_running_washer_values() {
        let (_, coordinator) = setup(room(vec![machine("1", "4", Some(600))], vec![])).await;
        let sensors = build_entities(&coordinator).unwrap();

        assert_eq!(
            sensors[0].native_value(),
            Some(SensorValue::Text("Running".to_string()))
        );
        assert_eq!(sensors[1].native_value(), Some(SensorValue::Minutes(10)));

        let attrs = sensors[0].extra_state_attributes().unwrap();
        assert_eq!(attrs.label_id, "1");
        assert_eq!(attrs.status, "status 4");
    }

    #[tokio::test]
    async fn test_values_follow_latest_snapshot() {
        let (api, coordinator) = setup(room(vec![machine("1", "4", Some(600))], vec![])).await;
        let sensors = build_entities(&coordinator).unwrap();

        api.set_snapshot(room(vec![machine("1", "5", None)], vec![]));
        coordinator.refresh().await.unwrap();

        assert_eq!(
            sensors[0].native_value(),
            Some(SensorValue::Text("Finished".to_string()))
        );
        assert_eq!(sensors[1].native_value(), Some(SensorValue::Minutes(0)));
    }

    #[tokio::test]
    async fn test_unavailable_after_failed_refresh_then_recovers() {
        let (api, coordinator) = setup(room(vec![machine("1", "7", None)], vec![])).await;
        let sensors = build_entities(&coordinator).unwrap();
        assert!(sensors[0].available());

        api.fail_with(ApiError::Request("timeout".to_string()));
        coordinator.refresh().await.unwrap_err();
        let state = sensors[0].state();
        assert!(!state.available);
        assert_eq!(state.value, None);
        assert!(state.attributes.is_none());
        assert_eq!(sensors[0].appliance(), Err(LookupError::RefreshFailed));

        api.set_snapshot(room(vec![machine("1", "4", Some(120))], vec![]));
        coordinator.refresh().await.unwrap();
        let state = sensors[1].state();
        assert!(state.available);
        assert_eq!(state.value, Some(SensorValue::Minutes(2)));
    }

    #[tokio::test]
    async fn test_machine_gone_makes_sensor_unavailable() {
        let (api, coordinator) = setup(room(vec![machine("1", "7", None)], vec![])).await;
        let sensors = build_entities(&coordinator).unwrap();

        api.set_snapshot(room(vec![machine("2", "7", None)], vec![]));
        coordinator.refresh().await.unwrap();

        let state = sensors[0].state();
        assert!(!state.available);
        assert_eq!(state.value, None);
        assert!(state.attributes.is_none());
    }

    #[tokio::test]
    async fn test_availability_change_tracked_once() {
        let (api, coordinator) = setup(room(vec![machine("1", "7", None)], vec![])).await;
        let sensors = build_entities(&coordinator).unwrap();
        let sensor = &sensors[0];

        api.set_snapshot(room(vec![], vec![]));
        coordinator.refresh().await.unwrap();
        assert!(!sensor.state().available);
        assert!(!sensor.was_available.load(Ordering::Relaxed));
        assert!(!sensor.state().available);
        assert!(!sensor.was_available.load(Ordering::Relaxed));

        api.set_snapshot(room(vec![machine("1", "4", Some(30))], vec![]));
        coordinator.refresh().await.unwrap();
        let state = sensor.state();
        assert!(state.available);
        assert!(sensor.was_available.load(Ordering::Relaxed));
        assert_eq!(state.value, Some(SensorValue::Text("Running".to_string())));
        assert_eq!(state.attributes.unwrap().status, "status 4");
    }

    #[tokio::test]
    async fn test_state_metadata() {
        let (_, coordinator) = setup(room(vec![], vec![machine("4", "5", None)])).await;
        let sensors = build_entities(&coordinator).unwrap();

        let state = sensors[1].state();
        assert_eq!(sensors[1].descriptor().kind, SensorKind::TimeLeft);
        assert_eq!(state.name, "CleanPay Dryer 4 Time Left");
        assert_eq!(state.icon, "mdi:tumble-dryer");
        assert_eq!(state.device_class, DeviceClass::Duration);
        assert_eq!(state.unit_of_measurement, Some("min"));
        assert_eq!(state.device.name, "CleanPay Laundry Room Dryer 4");
        assert_eq!(
            state.device.identifiers,
            vec![(DOMAIN.to_string(), "user-sr01_laundryroom_4".to_string())]
        );
    }
}
