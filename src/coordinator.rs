//! Entity registration table for one session.
//!
//! The coordinator owns every entity built by the platform setup functions,
//! wires their state notifiers, and fans out REST refresh ticks and push
//! events.

use crate::binary_sensor;
use crate::camera::{self, SimpliSafeCamera};
use crate::entity::{Entity, EntityInfo, StateChange, StateNotifier};
use crate::session::SetupContext;
use crate::vendor::PushEvent;
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub struct Coordinator {
    entities: Vec<Arc<dyn Entity>>,
    cameras: Vec<Arc<SimpliSafeCamera>>,
}

impl Coordinator {
    /// Run every platform's setup for the session and register the result.
    ///
    /// State writes from all entities are sent to `tx`.
    pub fn setup(ctx: &SetupContext, tx: UnboundedSender<StateChange>) -> Self {
        let mut entities = binary_sensor::setup_entry(ctx);
        let cameras = camera::setup_entry(ctx);
        entities.extend(
            cameras
                .iter()
                .map(|camera| camera.clone() as Arc<dyn Entity>),
        );

        for entity in &entities {
            entity.set_notifier(StateNotifier::new(
                tx.clone(),
                entity.info().unique_id.clone(),
            ));
        }

        info!(
            "Registered {} entities ({} cameras) for entry {}",
            entities.len(),
            cameras.len(),
            ctx.session.entry_id()
        );

        Self { entities, cameras }
    }

    pub fn entities(&self) -> &[Arc<dyn Entity>] {
        &self.entities
    }

    pub fn cameras(&self) -> &[Arc<SimpliSafeCamera>] {
        &self.cameras
    }

    pub fn entity(&self, unique_id: &str) -> Option<&Arc<dyn Entity>> {
        self.entities
            .iter()
            .find(|entity| entity.info().unique_id == unique_id)
    }

    pub fn camera(&self, unique_id: &str) -> Option<&Arc<SimpliSafeCamera>> {
        self.cameras
            .iter()
            .find(|camera| camera.info().unique_id == unique_id)
    }

    /// Identity of every registered entity.
    pub fn infos(&self) -> Vec<EntityInfo> {
        self.entities
            .iter()
            .map(|entity| entity.info().clone())
            .collect()
    }

    /// Publish every entity's current state.
    pub fn publish_all(&self) {
        for entity in &self.entities {
            entity.publish_state();
        }
    }

    /// Notify all entities that the device records were refreshed.
    pub fn refresh(&self) {
        for entity in &self.entities {
            entity.on_rest_refresh();
        }
    }

    /// Deliver a push event to every entity it is addressed to.
    ///
    /// Returns the number of entities that received it.
    pub fn dispatch(&self, event: &PushEvent) -> usize {
        let mut delivered = 0;
        for entity in &self.entities {
            if entity.subscribed_events().contains(&event.event_type)
                && entity.info().accepts(event)
            {
                entity.on_push_event(event);
                delivered += 1;
            }
        }

        if delivered == 0 {
            debug!("[Push] No entity subscribed to {}", event);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, fixture_snapshot};
    use crate::vendor::PushEventType;
    use tokio::sync::mpsc;

    fn coordinator() -> (Coordinator, mpsc::UnboundedReceiver<StateChange>, SetupContext) {
        let (ctx, _grabber) = context(fixture_snapshot());
        let (tx, rx) = mpsc::unbounded_channel();
        (Coordinator::setup(&ctx, tx), rx, ctx)
    }

    #[test]
    fn test_setup_registers_all_platforms() {
        let (coordinator, _rx, _ctx) = coordinator();
        assert_eq!(coordinator.entities().len(), 8);
        assert_eq!(coordinator.cameras().len(), 2);
        assert!(coordinator.camera("doorbell1-camera").is_some());
        assert!(coordinator.entity("legacy1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_routes_by_type_system_and_serial() {
        let (coordinator, _rx, _ctx) = coordinator();

        let doorbell = PushEvent::new(PushEventType::DoorbellDetected, 1, Some("doorbell1"));
        assert_eq!(coordinator.dispatch(&doorbell), 1);
        assert!(coordinator.entity("doorbell1-doorbell").unwrap().is_on());
        assert!(!coordinator.entity("doorbell1-motion").unwrap().is_on());

        let motion = PushEvent::new(PushEventType::CameraMotionDetected, 1, Some("cam1"));
        assert_eq!(coordinator.dispatch(&motion), 1);
        assert!(coordinator.entity("cam1-motion").unwrap().is_on());

        let wrong_system = PushEvent::new(PushEventType::CameraMotionDetected, 2, Some("cam1"));
        assert_eq!(coordinator.dispatch(&wrong_system), 0);

        let unrelated = PushEvent::new(PushEventType::Other("armed_away".to_string()), 1, None);
        assert_eq!(coordinator.dispatch(&unrelated), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_wide_motion_event_reaches_all_cameras() {
        let (coordinator, _rx, _ctx) = coordinator();
        let motion = PushEvent::new(PushEventType::CameraMotionDetected, 1, None);
        assert_eq!(coordinator.dispatch(&motion), 2);
    }

    #[test]
    fn test_refresh_publishes_passthrough_states() {
        let (coordinator, mut rx, ctx) = coordinator();
        let system = ctx.session.system(1).unwrap();
        system.sensor("entry1").unwrap().write().triggered = true;

        coordinator.refresh();

        let changes: Vec<StateChange> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        // transient sensors do not publish on refresh
        assert_eq!(changes.len(), 5);
        let entry = changes
            .iter()
            .find(|change| change.unique_id == "entry1")
            .unwrap();
        assert!(entry.is_on);
        assert_eq!(entry.version, 1);
    }

    #[test]
    fn test_publish_all() {
        let (coordinator, mut rx, _ctx) = coordinator();
        coordinator.publish_all();
        let count = std::iter::from_fn(|| rx.try_recv().ok()).count();
        assert_eq!(count, coordinator.entities().len());
    }
}
