//! State change notifier for pushing entity updates to the host.
//!
//! When an entity's observable state is written, the host must hear about
//! it immediately so subscribers (MQTT, dashboards) see the change without
//! waiting for the next poll.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;

/// A single state write for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub unique_id: String,
    pub is_on: bool,
    /// Entity state version after the write.
    pub version: u32,
    pub timestamp: DateTime<Utc>,
}

/// Publishes state writes for one entity.
///
/// This is the bridge between entities and whatever the host uses to
/// distribute state. Sending never blocks; a closed receiver means the host
/// has shut down and the write is dropped.
///
/// # Usage
/// ```ignore
/// // In the entity's state write:
/// if let Some(notifier) = self.notifier.read().as_ref() {
///     notifier.notify(value, version);
/// }
/// ```
#[derive(Clone)]
pub struct StateNotifier {
    tx: UnboundedSender<StateChange>,
    unique_id: String,
}

impl StateNotifier {
    /// Create a notifier for the entity with the given unique id.
    pub fn new(tx: UnboundedSender<StateChange>, unique_id: impl Into<String>) -> Self {
        Self {
            tx,
            unique_id: unique_id.into(),
        }
    }

    /// Notify the host that the entity state was written.
    pub fn notify(&self, is_on: bool, version: u32) {
        let change = StateChange {
            unique_id: self.unique_id.clone(),
            is_on,
            version,
            timestamp: Utc::now(),
        };
        if self.tx.send(change).is_err() {
            log::debug!(
                "[Entity] {}: state receiver closed, dropping update",
                self.unique_id
            );
        }
    }
}
