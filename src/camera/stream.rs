//! Scoped ownership of a live stream process.

use super::ffmpeg::StreamProcess;
use crate::error::{BridgeError, Result};
use log::{debug, warn};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

const PROXY_CHUNK_SIZE: usize = 16 * 1024;

/// Owns a stream process for the duration of one stream request.
///
/// The process is released exactly once: by [`StreamGuard::release`] on
/// the normal path, or by `Drop` when the owning future is cancelled.
pub struct StreamGuard {
    process: Option<Box<dyn StreamProcess>>,
    label: String,
}

impl StreamGuard {
    pub fn new(process: Box<dyn StreamProcess>, label: impl Into<String>) -> Self {
        Self {
            process: Some(process),
            label: label.into(),
        }
    }

    /// Copy the process output into `writer` until the process ends or the
    /// client goes away.
    ///
    /// A client disconnect ends the proxy normally. Returns the number of
    /// bytes delivered.
    pub async fn proxy<W>(&mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| BridgeError::StreamError("stream already released".to_string()))?;

        let mut buf = vec![0u8; PROXY_CHUNK_SIZE];
        let mut total = 0u64;

        loop {
            let n = process
                .read(&mut buf)
                .await
                .map_err(|e| BridgeError::StreamError(format!("read failed: {}", e)))?;
            if n == 0 {
                debug!("[Camera] {}: stream ended after {} bytes", self.label, total);
                break;
            }

            match writer.write_all(&buf[..n]).await {
                Ok(()) => total += n as u64,
                Err(e) if is_disconnect(&e) => {
                    debug!(
                        "[Camera] {}: client disconnected after {} bytes",
                        self.label, total
                    );
                    break;
                }
                Err(e) => {
                    return Err(BridgeError::StreamError(format!("write failed: {}", e)));
                }
            }
        }

        if let Err(e) = writer.flush().await
            && !is_disconnect(&e)
        {
            return Err(BridgeError::StreamError(format!("flush failed: {}", e)));
        }

        Ok(total)
    }

    /// Stop the process and wait for it to exit.
    pub async fn release(mut self) -> Result<()> {
        match self.process.take() {
            Some(mut process) => process.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            warn!("[Camera] {}: stream dropped, aborting ffmpeg", self.label);
            process.abort();
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::WriteZero
    )
}
