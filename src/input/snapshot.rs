//! REST snapshot source.
//!
//! The daemon does not talk to the SimpliSafe REST API itself; an external
//! poller writes the systems response to a JSON file which is re-read on
//! every refresh tick.

use crate::error::{BridgeError, Result};
use crate::session::SessionSnapshot;
use log::debug;
use std::path::{Path, PathBuf};

pub struct SnapshotSource {
    path: PathBuf,
    access_token: Option<String>,
}

impl SnapshotSource {
    /// `access_token`, when set, replaces the token found in the file.
    pub fn new(path: impl Into<PathBuf>, access_token: Option<String>) -> Self {
        Self {
            path: path.into(),
            access_token,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<SessionSnapshot> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            BridgeError::InvalidSnapshot(format!("{}: {}", self.path.display(), e))
        })?;

        let mut snapshot = SessionSnapshot::from_json(&content)?;
        if let Some(token) = &self.access_token {
            snapshot.access_token = token.clone();
        }

        debug!(
            "[Vendor] Loaded snapshot with {} system(s) from {}",
            snapshot.systems.len(),
            self.path.display()
        );
        Ok(snapshot)
    }
}
