//! Error types for tone construction and playback

use thiserror::Error;

/// Errors raised by an output sink or the device behind it
#[derive(Debug, Error)]
pub enum SinkError {
    /// No output device is available
    #[error("no audio output device available")]
    NoDevice,

    /// A named device was requested but not found
    #[error("audio output device '{0}' not found")]
    DeviceNotFound(String),

    /// Failed to query or initialize the device
    #[error("device init error: {0}")]
    DeviceInit(String),

    /// Failed to build the output stream
    #[error("stream create error: {0}")]
    StreamCreate(String),

    /// Starting or stopping playback failed
    #[error("playback error: {0}")]
    Playback(String),

    /// Writing sample data failed
    #[error("write error: {0}")]
    Write(String),
}

/// Errors surfaced to callers of the tone API
#[derive(Debug, Error)]
pub enum ToneError {
    /// Frequency outside the playable range
    #[error("frequency {frequency} out of range ({min} ..= {max})")]
    FrequencyOutOfRange { frequency: f32, min: f32, max: f32 },

    /// The tone was already started once
    #[error("tone already playing")]
    AlreadyStarted,

    /// The output sink could not be opened or written
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The playback thread could not be spawned
    #[error("failed to spawn tone thread: {0}")]
    Spawn(#[from] std::io::Error),
}
