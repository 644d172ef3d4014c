//! FFmpeg frame grabs and MJPEG streams.
//!
//! Both operations run `ffmpeg` as a subprocess with `kill_on_drop`, so a
//! process is never left behind when the owning future is dropped.

use crate::config::FfmpegConfig;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use log::{debug, warn};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};

/// Content type of the `mpjpeg` muxer output.
pub const DEFAULT_STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace;boundary=ffmpeg";

/// Input arguments for an authenticated camera stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInput {
    pub url: String,
    pub access_token: String,
}

impl StreamInput {
    pub fn new(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: access_token.into(),
        }
    }

    /// ffmpeg input arguments: read at native rate with a bearer token.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-re".to_string(),
            "-headers".to_string(),
            format!("Authorization: Bearer {}", self.access_token),
            "-i".to_string(),
            self.url.clone(),
        ]
    }
}

impl fmt::Display for StreamInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "-re -headers \"Authorization: Bearer {}\" -i \"{}\"",
            self.access_token, self.url
        )
    }
}

/// A running stream process whose output can be read.
///
/// Implementations release the underlying process in either [`close`] or
/// [`abort`]; callers invoke exactly one of them.
///
/// [`close`]: StreamProcess::close
/// [`abort`]: StreamProcess::abort
#[async_trait]
pub trait StreamProcess: AsyncRead + Send + Unpin {
    /// Stop the process and wait for it to exit.
    async fn close(&mut self) -> Result<()>;

    /// Stop the process without waiting. Used from `Drop`.
    fn abort(&mut self);
}

/// Frame-grab utility used by camera entities.
#[async_trait]
pub trait FrameGrabber: Send + Sync + 'static {
    /// Grab a single JPEG frame.
    async fn grab_image(&self, input: &StreamInput) -> Result<Vec<u8>>;

    /// Start an MJPEG stream.
    async fn open_mjpeg(&self, input: &StreamInput) -> Result<Box<dyn StreamProcess>>;

    /// Content type of the stream produced by [`FrameGrabber::open_mjpeg`].
    fn stream_content_type(&self) -> &str;
}

/// Owns the ffmpeg binary path and options.
#[derive(Debug, Clone)]
pub struct FfmpegManager {
    binary: String,
    grab_timeout: Duration,
    content_type: String,
}

impl FfmpegManager {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            grab_timeout: Duration::from_secs(config.grab_timeout_secs),
            content_type: config.stream_content_type.clone(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command(&self, input: &StreamInput) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(input.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl FrameGrabber for FfmpegManager {
    async fn grab_image(&self, input: &StreamInput) -> Result<Vec<u8>> {
        let child = self
            .command(input)
            .args([
                "-an",
                "-frames:v",
                "1",
                "-c:v",
                "mjpeg",
                "-f",
                "image2pipe",
                "-loglevel",
                "error",
                "-",
            ])
            .spawn()
            .map_err(|e| BridgeError::FfmpegSpawnFailed(e.to_string()))?;

        // On timeout the child is dropped and kill_on_drop stops it
        let output = tokio::time::timeout(self.grab_timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!(
                    "[Camera] Frame grab from {} timed out, ffmpeg killed",
                    input.url
                );
                BridgeError::FfmpegTimeout(self.grab_timeout.as_secs())
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::FfmpegFailed(stderr.trim().to_string()));
        }
        if output.stdout.is_empty() {
            return Err(BridgeError::EmptyFrame);
        }

        debug!(
            "[Camera] Grabbed {} byte frame from {}",
            output.stdout.len(),
            input.url
        );
        Ok(output.stdout)
    }

    async fn open_mjpeg(&self, input: &StreamInput) -> Result<Box<dyn StreamProcess>> {
        let mut child = self
            .command(input)
            .args([
                "-an",
                "-c:v",
                "mjpeg",
                "-q:v",
                "5",
                "-f",
                "mpjpeg",
                "-loglevel",
                "error",
                "-",
            ])
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BridgeError::FfmpegSpawnFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::StreamError("ffmpeg stdout not captured".to_string()))?;

        debug!("[Camera] MJPEG stream started for {}", input.url);
        Ok(Box::new(FfmpegStream { child, stdout }))
    }

    fn stream_content_type(&self) -> &str {
        &self.content_type
    }
}

/// A live `ffmpeg` MJPEG process.
struct FfmpegStream {
    child: Child,
    stdout: ChildStdout,
}

impl AsyncRead for FfmpegStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

#[async_trait]
impl StreamProcess for FfmpegStream {
    async fn close(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_none() {
            self.child.kill().await?;
        }
        Ok(())
    }

    fn abort(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("[Camera] ffmpeg already stopped: {}", e);
        }
    }
}
