//! Shared fixtures for unit tests.

use crate::camera::ffmpeg::{FrameGrabber, StreamInput, StreamProcess};
use crate::error::{BridgeError, Result};
use crate::session::{Session, SessionSnapshot, SetupContext};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};

/// One current system with sensors and cameras, one legacy system.
pub fn fixture_snapshot() -> SessionSnapshot {
    SessionSnapshot::from_json(
        r#"{
            "access_token": "fixture-token",
            "systems": [
                {
                    "system_id": 1,
                    "version": 3,
                    "state": "off",
                    "sensors": [
                        {"serial": "entry1", "name": "Front Door", "type": 5},
                        {"serial": "keypad1", "name": "Keypad", "type": 1, "low_battery": true},
                        {"serial": "panic1", "name": "Panic", "type": 3}
                    ],
                    "cameras": [
                        {"serial": "cam1", "name": "Living Room", "camera_type": "camera",
                         "status": "online", "subscription_enabled": true,
                         "shutter_open_when_off": true,
                         "shutter_open_when_home": false,
                         "shutter_open_when_away": false},
                        {"serial": "doorbell1", "name": "Front Porch", "camera_type": "doorbell",
                         "status": "online", "subscription_enabled": true,
                         "shutter_open_when_off": true,
                         "shutter_open_when_home": true,
                         "shutter_open_when_away": true}
                    ]
                },
                {
                    "system_id": 2,
                    "version": 2,
                    "state": "home",
                    "sensors": [
                        {"serial": "legacy1", "name": "Old Door", "type": 5}
                    ],
                    "cameras": [
                        {"serial": "legacycam", "name": "Old Camera", "status": "online"}
                    ]
                }
            ]
        }"#,
    )
    .expect("fixture snapshot is valid")
}

pub fn context(snapshot: SessionSnapshot) -> (SetupContext, Arc<FakeGrabber>) {
    let grabber = Arc::new(FakeGrabber::default());
    let ctx = SetupContext {
        session: Arc::new(Session::new("test-entry", snapshot)),
        grabber: grabber.clone(),
        clear_delay: Duration::from_secs(30),
    };
    (ctx, grabber)
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Frame grabber that serves queued images and streams.
#[derive(Default)]
pub struct FakeGrabber {
    images: Mutex<VecDeque<Vec<u8>>>,
    streams: Mutex<VecDeque<BoxedReader>>,
    last_input: Mutex<Option<StreamInput>>,
    grab_calls: AtomicUsize,
    grab_delay: Mutex<Duration>,
    releases: Arc<AtomicUsize>,
}

impl FakeGrabber {
    pub fn queue_images(&self, images: Vec<Vec<u8>>) {
        self.images.lock().extend(images);
    }

    /// Make every grab take `delay` before returning.
    pub fn set_grab_delay(&self, delay: Duration) {
        *self.grab_delay.lock() = delay;
    }

    pub fn queue_stream<R>(&self, reader: R)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.streams.lock().push_back(Box::new(reader));
    }

    pub fn grab_calls(&self) -> usize {
        self.grab_calls.load(Ordering::SeqCst)
    }

    /// Total close + abort calls across all streams.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn last_input(&self) -> Option<StreamInput> {
        self.last_input.lock().clone()
    }
}

#[async_trait]
impl FrameGrabber for FakeGrabber {
    async fn grab_image(&self, input: &StreamInput) -> Result<Vec<u8>> {
        self.grab_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock() = Some(input.clone());
        let delay = *self.grab_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.images
            .lock()
            .pop_front()
            .ok_or_else(|| BridgeError::FfmpegFailed("no frame queued".to_string()))
    }

    async fn open_mjpeg(&self, input: &StreamInput) -> Result<Box<dyn StreamProcess>> {
        *self.last_input.lock() = Some(input.clone());
        let reader = self
            .streams
            .lock()
            .pop_front()
            .ok_or_else(|| BridgeError::FfmpegSpawnFailed("no stream queued".to_string()))?;
        Ok(Box::new(FakeStream {
            reader,
            releases: self.releases.clone(),
        }))
    }

    fn stream_content_type(&self) -> &str {
        "multipart/x-mixed-replace;boundary=ffmpeg"
    }
}

struct FakeStream {
    reader: BoxedReader,
    releases: Arc<AtomicUsize>,
}

impl AsyncRead for FakeStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

#[async_trait]
impl StreamProcess for FakeStream {
    async fn close(&mut self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn abort(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
