//! Shared on/off state for entities.
//!
//! Provides thread-safe state that entities write from REST refreshes,
//! push events and delayed clears, and that the host reads.
//!
//! Every write is pushed to the host through the configured
//! [`StateNotifier`], mirroring how a host entity writes its state after
//! each update even when the value did not change.

use super::notifier::StateNotifier;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Thread-safe binary entity state.
///
/// The version is incremented each time the value actually changes, so
/// consumers can detect changes without comparing values.
pub struct BinaryState {
    state: AtomicBool,
    version: AtomicU32,
    /// Set after entity registration via `set_notifier()`.
    notifier: RwLock<Option<StateNotifier>>,
}

impl BinaryState {
    /// Create a new state holder with the given initial value.
    pub fn new(initial: bool) -> Self {
        Self {
            state: AtomicBool::new(initial),
            version: AtomicU32::new(0),
            notifier: RwLock::new(None),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    /// Version number, bumped on every value change.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    /// Write the value and publish it.
    ///
    /// Publishes even when the value is unchanged; returns whether it
    /// changed.
    pub fn write(&self, value: bool) -> bool {
        let old = self.state.swap(value, Ordering::SeqCst);
        let changed = old != value;
        let version = if changed {
            self.version.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.version()
        };
        self.publish_with(value, version);
        changed
    }

    /// Publish the current value without modifying it.
    pub fn publish(&self) {
        self.publish_with(self.get(), self.version());
    }

    pub fn set_notifier(&self, notifier: StateNotifier) {
        *self.notifier.write() = Some(notifier);
    }

    fn publish_with(&self, value: bool, version: u32) {
        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.notify(value, version);
        }
    }
}
