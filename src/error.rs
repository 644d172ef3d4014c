use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Failed to spawn ffmpeg: {0}")]
    FfmpegSpawnFailed(String),

    #[error("ffmpeg exited with an error: {0}")]
    FfmpegFailed(String),

    #[error("ffmpeg timed out after {0}s")]
    FfmpegTimeout(u64),

    #[error("ffmpeg returned an empty frame")]
    EmptyFrame,

    #[error("Camera stream error: {0}")]
    StreamError(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Push channel error: {0}")]
    PushChannelError(String),

    #[error("MQTT error: {0}")]
    MqttError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
