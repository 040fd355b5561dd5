//! Static sensor descriptors, one per (machine, attribute)

use serde::Serialize;

use crate::models::MachineKind;

pub const ICON_WASHING_MACHINE: &str = "mdi:washing-machine";
pub const ICON_DRYING_MACHINE: &str = "mdi:tumble-dryer";
pub const UNIT_MINUTES: &str = "min";

/// Which attribute of a machine a sensor shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Status,
    TimeLeft,
}

impl SensorKind {
    pub const ALL: [SensorKind; 2] = [SensorKind::Status, SensorKind::TimeLeft];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Enum,
    Duration,
}

/// Binds one attribute of one machine; built once at setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDescriptor {
    pub key: String,
    pub name: String,
    pub label_id: String,
    pub machine: MachineKind,
    pub kind: SensorKind,
}

impl SensorDescriptor {
    pub fn new(machine: MachineKind, label_id: &str, kind: SensorKind) -> Self {
        let base_key = format!("cleanpay_{}_{}", machine.as_str(), label_id);
        let base_name = format!("CleanPay {} {}", machine.title(), label_id);

        let (key, name) = match kind {
            SensorKind::Status => (base_key, base_name),
            SensorKind::TimeLeft => (
                format!("{}_timeleft", base_key),
                format!("{} Time Left", base_name),
            ),
        };

        Self {
            key,
            name,
            label_id: label_id.to_string(),
            machine,
            kind,
        }
    }

    /// Status and time-left descriptors for one machine
    pub fn for_machine(machine: MachineKind, label_id: &str) -> Vec<Self> {
        SensorKind::ALL
            .iter()
            .map(|kind| Self::new(machine, label_id, *kind))
            .collect()
    }

    pub fn device_class(&self) -> DeviceClass {
        match self.kind {
            SensorKind::Status => DeviceClass::Enum,
            SensorKind::TimeLeft => DeviceClass::Duration,
        }
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self.kind {
            SensorKind::Status => None,
            SensorKind::TimeLeft => Some(UNIT_MINUTES),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.machine {
            MachineKind::Washer => ICON_WASHING_MACHINE,
            MachineKind::Dryer => ICON_DRYING_MACHINE,
        }
    }
}
