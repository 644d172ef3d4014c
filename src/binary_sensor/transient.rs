//! Motion and doorbell sensors driven by push events.
//!
//! Camera motion and doorbell presses cannot be read through the REST API;
//! they only arrive as push events. The sensor turns on when an event
//! arrives and a delayed clear turns it off again.
//!
//! ```text
//!            event                       clear fires
//!  IDLE ───────────────► ACTIVE ─────────────────────► IDLE
//!                         │  ▲
//!                         └──┘ event: publish again and
//!                              schedule another clear
//! ```
//!
//! A new event does not cancel the clear scheduled by an earlier one, so the
//! earliest pending clear turns the sensor off even if a later event is
//! still within its window.

use crate::entity::{BinaryState, DeviceClass, Entity, EntityInfo, Platform, StateNotifier};
use crate::vendor::{CameraRecord, DeviceRef, PushEvent, PushEventType, System};
use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Default time a motion or doorbell sensor stays on after an event.
pub const DEFAULT_CLEAR_DELAY: Duration = Duration::from_secs(30);

/// Which camera event drives the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Motion,
    Doorbell,
}

impl TransientKind {
    pub fn event_type(self) -> PushEventType {
        match self {
            TransientKind::Motion => PushEventType::CameraMotionDetected,
            TransientKind::Doorbell => PushEventType::DoorbellDetected,
        }
    }

    fn name(self) -> &'static str {
        match self {
            TransientKind::Motion => "Motion",
            TransientKind::Doorbell => "Doorbell",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            TransientKind::Motion => "motion",
            TransientKind::Doorbell => "doorbell",
        }
    }

    fn device_class(self) -> DeviceClass {
        match self {
            TransientKind::Motion => DeviceClass::Motion,
            TransientKind::Doorbell => DeviceClass::Occupancy,
        }
    }
}

/// Binary sensor that is on for a fixed window after each camera event.
pub struct TransientBinarySensor {
    info: EntityInfo,
    events: [PushEventType; 1],
    device: DeviceRef<CameraRecord>,
    clear_delay: Duration,
    state: Arc<BinaryState>,
    pending_clears: Arc<AtomicUsize>,
}

impl TransientBinarySensor {
    pub fn new(
        system: &System,
        device: DeviceRef<CameraRecord>,
        kind: TransientKind,
        clear_delay: Duration,
    ) -> Self {
        let info = {
            let record = device.read();
            EntityInfo::for_device(
                Platform::BinarySensor,
                system.system_id(),
                &record.serial,
                &record.name,
                kind.name(),
            )
            .with_suffix(kind.suffix())
            .with_device_class(kind.device_class())
        };

        Self {
            info,
            events: [kind.event_type()],
            device,
            clear_delay,
            state: Arc::new(BinaryState::new(false)),
            pending_clears: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of clears scheduled but not yet fired.
    pub fn pending_clears(&self) -> usize {
        self.pending_clears.load(Ordering::SeqCst)
    }

    /// Turn the sensor on and schedule the clear.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self) {
        self.state.write(true);
        self.schedule_clear();
    }

    fn schedule_clear(&self) {
        let deadline = Instant::now() + self.clear_delay;
        let state = self.state.clone();
        let pending = self.pending_clears.clone();
        let unique_id = self.info.unique_id.clone();

        pending.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            pending.fetch_sub(1, Ordering::SeqCst);
            state.write(false);
            debug!("[Sensor] {} cleared", unique_id);
        });
    }
}

impl Entity for TransientBinarySensor {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn is_on(&self) -> bool {
        self.state.get()
    }

    fn subscribed_events(&self) -> &[PushEventType] {
        &self.events
    }

    /// Camera sensor status cannot be read through the REST API.
    fn on_rest_refresh(&self) {}

    fn on_push_event(&self, event: &PushEvent) {
        info!(
            "[Sensor] {} ({}): {}",
            self.info.name,
            self.device.read().name,
            event
        );
        self.trigger();
    }

    fn set_notifier(&self, notifier: StateNotifier) {
        self.state.set_notifier(notifier);
    }

    fn publish_state(&self) {
        self.state.publish();
    }
}
