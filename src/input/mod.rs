//! Input sources feeding the session.
//!
//! - `snapshot`: REST refresh data read from a JSON dump
//! - `push`: websocket push events

pub mod push;
pub mod snapshot;

pub use push::PushListener;
pub use snapshot::SnapshotSource;
