//! Sensor platform: one status and one time-left sensor per machine
//!
//! - `descriptor`: static per-sensor definitions
//! - `projection`: pure record -> value functions
//! - `entity`: coordinator-backed sensors, lookup, rendering

pub mod descriptor;
pub mod entity;
pub mod projection;

pub use entity::{build_entities, MachineSensor, SensorState};
