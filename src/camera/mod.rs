//! Camera platform.
//!
//! One [`SimpliSafeCamera`] per camera on a current-generation system. The
//! camera serves still images and MJPEG streams through a [`FrameGrabber`],
//! honouring the privacy shutter: while the shutter is closed the last
//! cached image is served and no stream request reaches the camera.

pub mod ffmpeg;
pub mod stream;

pub use ffmpeg::{FfmpegManager, FrameGrabber, StreamInput, StreamProcess};
pub use stream::StreamGuard;

use crate::entity::{BinaryState, Entity, EntityInfo, Platform, StateNotifier};
use crate::error::{BridgeError, Result};
use crate::session::{Session, SetupContext};
use crate::vendor::{CameraRecord, DeviceRef, System, SystemState};
use log::{info, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::io::AsyncWrite;

/// Build the camera entities for a session.
pub fn setup_entry(ctx: &SetupContext) -> Vec<Arc<SimpliSafeCamera>> {
    let mut cameras = Vec::new();

    for system in ctx.session.systems() {
        if system.is_legacy() {
            info!(
                "Skipping camera setup for V2 system: {}",
                system.system_id()
            );
            continue;
        }

        for device in system.cameras() {
            cameras.push(Arc::new(SimpliSafeCamera::new(
                ctx.session.clone(),
                system.clone(),
                device.clone(),
                ctx.grabber.clone(),
            )));
        }
    }

    cameras
}

/// A SimpliCam or video doorbell camera.
pub struct SimpliSafeCamera {
    info: EntityInfo,
    session: Arc<Session>,
    system: Arc<System>,
    device: DeviceRef<CameraRecord>,
    grabber: Arc<dyn FrameGrabber>,
    last_image: Arc<RwLock<Option<Vec<u8>>>>,
    /// Online and subscribed.
    state: BinaryState,
}

impl SimpliSafeCamera {
    pub fn new(
        session: Arc<Session>,
        system: Arc<System>,
        device: DeviceRef<CameraRecord>,
        grabber: Arc<dyn FrameGrabber>,
    ) -> Self {
        let (info, initial) = {
            let record = device.read();
            let info = EntityInfo::for_device(
                Platform::Camera,
                system.system_id(),
                &record.serial,
                &record.name,
                "Camera",
            )
            .with_suffix("camera");
            (info, Self::available(&record))
        };

        Self {
            info,
            session,
            system,
            device,
            grabber,
            last_image: Arc::new(RwLock::new(None)),
            state: BinaryState::new(initial),
        }
    }

    fn available(record: &CameraRecord) -> bool {
        record.is_online() && record.subscription_enabled
    }

    /// Whether the privacy shutter is open under the current arm state.
    ///
    /// Off, home and away use the camera's per-state setting; any other
    /// state (alarm, delays, unknown) counts as open.
    pub fn is_shutter_open(&self) -> bool {
        let device = self.device.read();
        match self.system.state() {
            SystemState::Off => device.shutter_open_when_off,
            SystemState::Home => device.shutter_open_when_home,
            SystemState::Away => device.shutter_open_when_away,
            _ => true,
        }
    }

    /// Authenticated input for the camera's media stream.
    pub fn stream_input(&self) -> StreamInput {
        StreamInput::new(self.device.read().video_url(), self.session.access_token())
    }

    /// ffmpeg input string for hosts that run their own stream worker.
    pub fn stream_source(&self) -> String {
        self.stream_input().to_string()
    }

    pub fn stream_content_type(&self) -> &str {
        self.grabber.stream_content_type()
    }

    /// Most recently fetched image, if any.
    pub fn cached_image(&self) -> Option<Vec<u8>> {
        self.last_image.read().clone()
    }

    /// Return a still image.
    ///
    /// With the shutter closed this returns the cached image (possibly
    /// `None`) without touching the camera. Otherwise a frame is grabbed,
    /// cached and returned. The grab runs in its own task: if the caller
    /// goes away the grab still completes and refreshes the cache.
    pub async fn fetch_still_image(&self) -> Result<Option<Vec<u8>>> {
        if !self.is_shutter_open() {
            return Ok(self.cached_image());
        }

        let input = self.stream_input();
        let grabber = self.grabber.clone();
        let cache = self.last_image.clone();

        let grab = tokio::spawn(async move {
            let image = grabber.grab_image(&input).await?;
            *cache.write() = Some(image.clone());
            Ok::<_, BridgeError>(image)
        });

        match grab.await {
            Ok(result) => result.map(Some),
            Err(e) => Err(BridgeError::StreamError(format!("frame grab task failed: {}", e))),
        }
    }

    /// Proxy a live MJPEG stream into `writer`.
    ///
    /// The stream process is released exactly once however the proxy ends:
    /// normal end of stream, client disconnect, a mid-stream error, or this
    /// future being dropped.
    pub async fn open_stream<W>(&self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let input = self.stream_input();
        let process = self.grabber.open_mjpeg(&input).await?;
        let mut guard = StreamGuard::new(process, self.info.unique_id.clone());

        let result = guard.proxy(writer).await;
        if let Err(e) = guard.release().await {
            warn!(
                "[Camera] {}: failed to stop stream process: {}",
                self.info.unique_id, e
            );
        }
        result
    }
}

impl Entity for SimpliSafeCamera {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn is_on(&self) -> bool {
        self.state.get()
    }

    fn on_rest_refresh(&self) {
        let available = Self::available(&self.device.read());
        self.state.write(available);
    }

    fn set_notifier(&self, notifier: StateNotifier) {
        self.state.set_notifier(notifier);
    }

    fn publish_state(&self) {
        self.state.publish();
    }
}
