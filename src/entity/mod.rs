//! Entity model exposed to the host.
//!
//! Every SimpliSafe-backed entity implements [`Entity`]. The host reads
//! identity from [`EntityInfo`], the on/off state from [`Entity::is_on`],
//! and drives updates through the two hooks:
//! - [`Entity::on_rest_refresh`] after each REST poll
//! - [`Entity::on_push_event`] for push events the entity subscribed to
//!
//! State writes are pushed to the host through a [`StateNotifier`] that the
//! coordinator installs at registration time.

pub mod binary_state;
pub mod notifier;

pub use binary_state::BinaryState;
pub use notifier::{StateChange, StateNotifier};

use crate::vendor::{PushEvent, PushEventType};
use serde::Serialize;
use strum::Display;

/// Host platform an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    BinarySensor,
    Camera,
}

/// Device class hint for binary sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceClass {
    Battery,
    Door,
    Gas,
    Moisture,
    Motion,
    Occupancy,
    Safety,
    Smoke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityCategory {
    Diagnostic,
}

/// Identity and presentation of an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInfo {
    pub unique_id: String,
    pub name: String,
    pub platform: Platform,
    pub system_id: u64,
    /// Serial of the backing device; push events naming a different serial
    /// are not delivered.
    pub device_serial: String,
    pub device_name: String,
    pub device_class: Option<DeviceClass>,
    pub category: Option<EntityCategory>,
}

impl EntityInfo {
    /// Identity of the device itself; the unique id is the device serial.
    pub fn for_device(
        platform: Platform,
        system_id: u64,
        serial: &str,
        device_name: &str,
        name: &str,
    ) -> Self {
        Self {
            unique_id: serial.to_string(),
            name: name.to_string(),
            platform,
            system_id,
            device_serial: serial.to_string(),
            device_name: device_name.to_string(),
            device_class: None,
            category: None,
        }
    }

    /// Append a suffix to the unique id (`{serial}-{suffix}`).
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.unique_id = format!("{}-{}", self.unique_id, suffix);
        self
    }

    pub fn with_device_class(mut self, device_class: DeviceClass) -> Self {
        self.device_class = Some(device_class);
        self
    }

    pub fn with_category(mut self, category: EntityCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Whether a push event is addressed to this entity's system and device.
    pub fn accepts(&self, event: &PushEvent) -> bool {
        if event.system_id != self.system_id {
            return false;
        }
        match &event.sensor_serial {
            Some(serial) => *serial == self.device_serial,
            None => true,
        }
    }
}

/// Capability set every entity provides to the host.
pub trait Entity: Send + Sync + 'static {
    fn info(&self) -> &EntityInfo;

    fn is_on(&self) -> bool;

    /// Push event types this entity wants to receive.
    fn subscribed_events(&self) -> &[PushEventType] {
        &[]
    }

    /// Called after each REST refresh of the session's device records.
    fn on_rest_refresh(&self);

    /// Called for each push event that matches [`Entity::subscribed_events`]
    /// and [`EntityInfo::accepts`].
    fn on_push_event(&self, _event: &PushEvent) {}

    /// Install the notifier used to publish state writes.
    fn set_notifier(&self, notifier: StateNotifier);

    /// Publish the current state without changing it.
    fn publish_state(&self);
}
