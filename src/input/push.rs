//! Websocket push channel.
//!
//! Connects to the push endpoint with the session's bearer token, parses
//! each text frame as a [`PushEvent`] and forwards it to the coordinator.
//! Connection errors are logged and retried; delivery problems never reach
//! the entities.

use crate::error::{BridgeError, Result};
use crate::session::Session;
use crate::vendor::PushEvent;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_util::sync::CancellationToken;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Parse one push message.
pub fn parse_push_message(text: &str) -> Result<PushEvent> {
    serde_json::from_str(text).map_err(|e| BridgeError::PushChannelError(e.to_string()))
}

pub struct PushListener {
    url: String,
    session: Arc<Session>,
}

impl PushListener {
    pub fn new(url: impl Into<String>, session: Arc<Session>) -> Self {
        Self {
            url: url.into(),
            session,
        }
    }

    /// Receive events until `cancel` fires or the receiver is dropped.
    pub async fn run(self, tx: mpsc::Sender<PushEvent>, cancel: CancellationToken) {
        info!("[Push] Starting push listener for {}", self.url);

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.listen(&tx) => outcome,
            };

            match outcome {
                Ok(()) => warn!("[Push] Connection closed by server"),
                Err(BridgeError::PushChannelError(e)) if tx.is_closed() => {
                    debug!("[Push] Event receiver gone: {}", e);
                    break;
                }
                Err(e) => error!("[Push] {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }

        info!("[Push] Push listener stopped");
    }

    async fn listen(&self, tx: &mpsc::Sender<PushEvent>) -> Result<()> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::PushChannelError(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.session.access_token()))
            .map_err(|e| BridgeError::PushChannelError(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (mut socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| BridgeError::PushChannelError(format!("connect failed: {}", e)))?;
        info!("[Push] Connected");

        while let Some(message) = socket.next().await {
            let message =
                message.map_err(|e| BridgeError::PushChannelError(format!("read failed: {}", e)))?;

            match message {
                Message::Text(text) => match parse_push_message(text.as_str()) {
                    Ok(event) => {
                        debug!("[Push] Received {}", event);
                        tx.send(event).await.map_err(|_| {
                            BridgeError::PushChannelError("event channel closed".to_string())
                        })?;
                    }
                    Err(e) => warn!("[Push] Ignoring malformed event: {}", e),
                },
                Message::Close(frame) => {
                    debug!("[Push] Close frame: {:?}", frame);
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::PushEventType;

    #[test]
    fn test_parse_motion_event() {
        let event = parse_push_message(
            r#"{"event_type":"camera_motion_detected","system_id":1,"sensor_serial":"cam1"}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, PushEventType::CameraMotionDetected);
        assert_eq!(event.system_id, 1);
    }

    #[test]
    fn test_parse_malformed_event() {
        let err = parse_push_message(r#"{"event_type":"doorbell_detected"}"#).unwrap_err();
        assert!(matches!(err, BridgeError::PushChannelError(_)));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let snapshot = crate::test_support::fixture_snapshot();
        let session = Arc::new(Session::new("test", snapshot));
        // Nothing listens on port 9; the connect fails and the listener waits to retry
        let listener = PushListener::new("ws://127.0.0.1:9/events", session);
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(listener.run(tx, cancel.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
