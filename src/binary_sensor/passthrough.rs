//! Binary sensors that mirror a boolean field of a sensor record.

use crate::entity::{
    BinaryState, DeviceClass, Entity, EntityCategory, EntityInfo, Platform, StateNotifier,
};
use crate::vendor::{DeviceRef, SensorRecord, System};

/// Which record field the sensor mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughField {
    Triggered,
    LowBattery,
}

impl PassthroughField {
    fn read(self, record: &SensorRecord) -> bool {
        match self {
            PassthroughField::Triggered => record.triggered,
            PassthroughField::LowBattery => record.low_battery,
        }
    }
}

/// A sensor whose state is the device field, republished on every refresh.
pub struct PassthroughBinarySensor {
    info: EntityInfo,
    field: PassthroughField,
    device: DeviceRef<SensorRecord>,
    state: BinaryState,
}

impl PassthroughBinarySensor {
    /// Whether the sensor has been triggered (door open, leak, smoke...).
    pub fn triggered(
        system: &System,
        device: DeviceRef<SensorRecord>,
        device_class: DeviceClass,
    ) -> Self {
        let info = {
            let record = device.read();
            EntityInfo::for_device(
                Platform::BinarySensor,
                system.system_id(),
                &record.serial,
                &record.name,
                &record.name,
            )
            .with_device_class(device_class)
        };
        Self::new(info, PassthroughField::Triggered, device)
    }

    /// Diagnostic low-battery sensor.
    pub fn battery(system: &System, device: DeviceRef<SensorRecord>) -> Self {
        let info = {
            let record = device.read();
            EntityInfo::for_device(
                Platform::BinarySensor,
                system.system_id(),
                &record.serial,
                &record.name,
                "Battery",
            )
            .with_suffix("battery")
            .with_device_class(DeviceClass::Battery)
            .with_category(EntityCategory::Diagnostic)
        };
        Self::new(info, PassthroughField::LowBattery, device)
    }

    fn new(info: EntityInfo, field: PassthroughField, device: DeviceRef<SensorRecord>) -> Self {
        let initial = field.read(&device.read());
        Self {
            info,
            field,
            device,
            state: BinaryState::new(initial),
        }
    }
}

impl Entity for PassthroughBinarySensor {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn is_on(&self) -> bool {
        self.state.get()
    }

    fn on_rest_refresh(&self) {
        let value = self.field.read(&self.device.read());
        self.state.write(value);
    }

    fn set_notifier(&self, notifier: StateNotifier) {
        self.state.set_notifier(notifier);
    }

    fn publish_state(&self) {
        self.state.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::{DeviceType, SystemSnapshot, SystemState};
    use tokio::sync::mpsc;

    fn system() -> System {
        System::from_snapshot(SystemSnapshot {
            system_id: 5,
            version: 3,
            state: SystemState::Off,
            sensors: vec![SensorRecord {
                serial: "s1".to_string(),
                name: "Back Door".to_string(),
                device_type: DeviceType::Entry,
                triggered: false,
                low_battery: true,
            }],
            cameras: vec![],
        })
    }

    #[test]
    fn test_initial_state_from_record() {
        let system = system();
        let device = system.sensor("s1").unwrap().clone();

        let triggered =
            PassthroughBinarySensor::triggered(&system, device.clone(), DeviceClass::Door);
        let battery = PassthroughBinarySensor::battery(&system, device);

        assert!(!triggered.is_on());
        assert!(battery.is_on());
        assert_eq!(triggered.info().unique_id, "s1");
        assert_eq!(triggered.info().name, "Back Door");
        assert_eq!(battery.info().unique_id, "s1-battery");
        assert_eq!(battery.info().name, "Battery");
        assert_eq!(battery.info().category, Some(EntityCategory::Diagnostic));
    }

    #[test]
    fn test_refresh_mirrors_record_exactly() {
        let system = system();
        let device = system.sensor("s1").unwrap().clone();
        let sensor =
            PassthroughBinarySensor::triggered(&system, device.clone(), DeviceClass::Door);

        for value in [true, true, false, true, false] {
            device.write().triggered = value;
            sensor.on_rest_refresh();
            assert_eq!(sensor.is_on(), value);
        }
    }

    #[test]
    fn test_refresh_publishes_every_tick() {
        let system = system();
        let device = system.sensor("s1").unwrap().clone();
        let sensor = PassthroughBinarySensor::battery(&system, device.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        sensor.set_notifier(StateNotifier::new(tx, sensor.info().unique_id.clone()));

        sensor.on_rest_refresh();
        device.write().low_battery = false;
        sensor.on_rest_refresh();

        assert!(rx.try_recv().unwrap().is_on);
        assert!(!rx.try_recv().unwrap().is_on);
        assert!(rx.try_recv().is_err());
    }
}
