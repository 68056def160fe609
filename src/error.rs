//! Error types for volumetric decode operations
//!
//! The taxonomy follows the operation boundaries: `Source` for fetch/read
//! failures before any parsing, `Format` (and the attribute variants) for
//! structural problems in an opened container, `ChannelNotFound` for a name
//! with no node, and `Codec`/`EngineUnavailable`/`InvalidOutput` for the
//! engine round-trip.

use std::fmt;
use thiserror::Error;

/// Main error type for hvol operations
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The container bytes could not be fetched or read from their source.
    #[error("source error: {0}")]
    Source(String),

    /// The byte buffer is not a valid container, or lacks an expected
    /// structural element.
    #[error("invalid container format: {0}")]
    Format(String),

    #[error("missing attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid attribute {name}: {message}")]
    InvalidAttribute { name: String, message: String },

    /// The requested channel has no node under the "Channels" group.
    #[error("channel not found: {channel}")]
    ChannelNotFound { channel: String },

    /// The transcode binary could not be located or failed its version probe.
    #[error("codec engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Staging, transcoding, or readback against the engine failed. Engine
    /// state after this error is suspect; prefer a fresh handle for retries.
    #[error("codec error during {stage}: {message}")]
    Codec { stage: CodecStage, message: String },

    /// The engine returned a buffer that cannot carry the requested samples.
    #[error("invalid decode output: {0}")]
    InvalidOutput(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Phase of the engine round-trip that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecStage {
    /// Writing the compressed payload into the engine's input space
    Staging,
    /// Running the transcode command
    Transcode,
    /// Reading the named output buffer back out
    Readback,
}

impl fmt::Display for CodecStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodecStage::Staging => "staging",
            CodecStage::Transcode => "transcode",
            CodecStage::Readback => "readback",
        };
        write!(f, "{}", name)
    }
}

impl VolumeError {
    /// Create a channel-not-found error.
    pub fn channel_not_found(channel: impl Into<String>) -> Self {
        Self::ChannelNotFound {
            channel: channel.into(),
        }
    }

    /// Create a codec error for a given round-trip stage.
    pub fn codec(stage: CodecStage, message: impl Into<String>) -> Self {
        Self::Codec {
            stage,
            message: message.into(),
        }
    }

    /// True when the error means the channel name simply does not exist,
    /// as opposed to a malformed container or a failed decode.
    pub fn is_channel_not_found(&self) -> bool {
        matches!(self, Self::ChannelNotFound { .. })
    }
}

/// Specialized Result type for hvol operations
pub type Result<T> = std::result::Result<T, VolumeError>;

impl From<bincode::Error> for VolumeError {
    fn from(err: bincode::Error) -> Self {
        VolumeError::Format(err.to_string())
    }
}

impl From<serde_json::Error> for VolumeError {
    fn from(err: serde_json::Error) -> Self {
        VolumeError::Format(err.to_string())
    }
}
