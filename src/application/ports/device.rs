//! Device stream port interfaces

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::capture::FrameData;

/// Device acquisition errors. Surfaced to the user, never silently swallowed.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("Device access denied")]
    PermissionDenied,

    #[error("No capture device available")]
    NoDevice,

    #[error("Device failure: {0}")]
    Unknown(String),
}

/// Port for camera acquisition.
///
/// The returned stream is exclusively owned by the session that acquired it;
/// ownership moves into the session and is never shared or duplicated.
#[async_trait]
pub trait VideoDevice: Send + Sync {
    type Stream: VideoStream;

    /// Request the camera from the platform
    async fn acquire(&self) -> Result<Self::Stream, DeviceError>;
}

/// A live, exclusively owned video stream handle
#[async_trait]
pub trait VideoStream: Send {
    /// Current negotiated native resolution. May change between captures if
    /// the device re-negotiates.
    fn native_size(&self) -> (u32, u32);

    /// Rasterize the current frame into a still image at the stream's native
    /// resolution, never the on-screen display size.
    async fn capture_frame(&mut self) -> Result<FrameData, DeviceError>;

    /// Release the device. Idempotent; invoked on every exit path so an open
    /// device indicator is never leaked to the user.
    async fn release(&mut self);
}

/// Port for microphone acquisition
#[async_trait]
pub trait AudioDevice: Send + Sync {
    type Stream: AudioStream + 'static;

    /// Request the microphone from the platform
    async fn acquire(&self) -> Result<Self::Stream, DeviceError>;
}

/// A live, exclusively owned audio stream handle.
///
/// Chunk emission is event-driven: the recording's chunks arrive on an
/// explicit inbound channel, and consumers are agnostic to the underlying
/// callback mechanism.
#[async_trait]
pub trait AudioStream: Send {
    /// Sample rate of the emitted PCM in Hz
    fn sample_rate(&self) -> u32;

    /// Take the inbound chunk channel for this recording. Called once per
    /// recording; a second call yields a closed, empty channel.
    fn take_chunks(&mut self) -> mpsc::UnboundedReceiver<Vec<u8>>;

    /// Halt recording and wait for the recorder to confirm finalization.
    /// Trailing chunks are flushed to the channel and the channel is closed.
    async fn finalize(&mut self) -> Result<(), DeviceError>;

    /// Release the device. Idempotent.
    async fn release(&mut self);
}
