//! Config-entry scoped session state.
//!
//! A [`Session`] is one authenticated connection to a SimpliSafe account.
//! Instead of a global table keyed by entry id, the session is handed to the
//! platform setup functions inside a [`SetupContext`].

use crate::camera::ffmpeg::FrameGrabber;
use crate::error::{BridgeError, Result};
use crate::vendor::{System, SystemSnapshot};
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Serialized form of the account data returned by a REST refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub access_token: String,
    pub systems: Vec<SystemSnapshot>,
}

impl SessionSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BridgeError::InvalidSnapshot(e.to_string()))
    }
}

/// One authenticated SimpliSafe account.
pub struct Session {
    entry_id: String,
    systems: BTreeMap<u64, Arc<System>>,
    access_token: RwLock<String>,
}

impl Session {
    pub fn new(entry_id: impl Into<String>, snapshot: SessionSnapshot) -> Self {
        let systems = snapshot
            .systems
            .into_iter()
            .map(|system| (system.system_id, Arc::new(System::from_snapshot(system))))
            .collect();

        Self {
            entry_id: entry_id.into(),
            systems,
            access_token: RwLock::new(snapshot.access_token),
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn systems(&self) -> impl Iterator<Item = &Arc<System>> {
        self.systems.values()
    }

    pub fn system(&self, system_id: u64) -> Option<&Arc<System>> {
        self.systems.get(&system_id)
    }

    /// Current bearer token for media requests.
    pub fn access_token(&self) -> String {
        self.access_token.read().clone()
    }

    /// Apply a REST refresh to the existing records.
    pub fn apply_snapshot(&self, snapshot: &SessionSnapshot) {
        if !snapshot.access_token.is_empty() {
            *self.access_token.write() = snapshot.access_token.clone();
        }

        for system in &snapshot.systems {
            match self.systems.get(&system.system_id) {
                Some(existing) => existing.apply(system),
                None => debug!(
                    "[Vendor] Entry {}: ignoring new system {} until reload",
                    self.entry_id, system.system_id
                ),
            }
        }
    }
}

/// Everything a platform needs to build its entities for one session.
#[derive(Clone)]
pub struct SetupContext {
    pub session: Arc<Session>,
    pub grabber: Arc<dyn FrameGrabber>,
    /// How long motion and doorbell sensors stay on after an event.
    pub clear_delay: Duration,
}
