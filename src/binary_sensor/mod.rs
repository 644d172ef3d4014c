//! Binary sensor platform.
//!
//! Builds, for every current-generation system in a session:
//! - a triggered sensor for each entry/motion/safety sensor
//! - a diagnostic battery sensor for each battery-powered sensor
//! - a motion sensor for each camera
//! - a doorbell sensor for each doorbell camera

pub mod passthrough;
pub mod transient;

pub use passthrough::{PassthroughBinarySensor, PassthroughField};
pub use transient::{DEFAULT_CLEAR_DELAY, TransientBinarySensor, TransientKind};

use crate::entity::{DeviceClass, Entity};
use crate::session::SetupContext;
use crate::vendor::DeviceType;
use log::info;
use std::sync::Arc;

/// Sensor types that report a low-battery flag.
pub const SUPPORTED_BATTERY_SENSOR_TYPES: &[DeviceType] = &[
    DeviceType::CarbonMonoxide,
    DeviceType::Entry,
    DeviceType::GlassBreak,
    DeviceType::Keypad,
    DeviceType::Leak,
    DeviceType::LockKeypad,
    DeviceType::Motion,
    DeviceType::Siren,
    DeviceType::Smoke,
    DeviceType::Temperature,
];

/// Device class for sensor types that report a triggered flag.
pub fn triggered_device_class(device_type: DeviceType) -> Option<DeviceClass> {
    match device_type {
        DeviceType::CarbonMonoxide => Some(DeviceClass::Gas),
        DeviceType::Entry => Some(DeviceClass::Door),
        DeviceType::GlassBreak => Some(DeviceClass::Safety),
        DeviceType::Leak => Some(DeviceClass::Moisture),
        DeviceType::Motion => Some(DeviceClass::Motion),
        DeviceType::Siren => Some(DeviceClass::Safety),
        DeviceType::Smoke => Some(DeviceClass::Smoke),
        _ => None,
    }
}

/// Build the binary sensor entities for a session.
pub fn setup_entry(ctx: &SetupContext) -> Vec<Arc<dyn Entity>> {
    let mut sensors: Vec<Arc<dyn Entity>> = Vec::new();

    for system in ctx.session.systems() {
        if system.is_legacy() {
            info!(
                "Skipping sensor setup for V2 system: {}",
                system.system_id()
            );
            continue;
        }

        for device in system.sensors() {
            let device_type = device.read().device_type;

            if let Some(device_class) = triggered_device_class(device_type) {
                sensors.push(Arc::new(PassthroughBinarySensor::triggered(
                    system,
                    device.clone(),
                    device_class,
                )));
            }
            if SUPPORTED_BATTERY_SENSOR_TYPES.contains(&device_type) {
                sensors.push(Arc::new(PassthroughBinarySensor::battery(
                    system,
                    device.clone(),
                )));
            }
        }

        for camera in system.cameras() {
            sensors.push(Arc::new(TransientBinarySensor::new(
                system,
                camera.clone(),
                TransientKind::Motion,
                ctx.clear_delay,
            )));
            if camera.read().is_doorbell() {
                sensors.push(Arc::new(TransientBinarySensor::new(
                    system,
                    camera.clone(),
                    TransientKind::Doorbell,
                    ctx.clear_delay,
                )));
            }
        }
    }

    sensors
}
