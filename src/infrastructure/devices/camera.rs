//! Camera adapter using nokhwa
//!
//! The camera handle is managed on a dedicated thread to avoid Send/Sync
//! issues with the platform capture APIs, which are not thread-safe. The
//! stream handle talks to that thread over a command channel.

use std::io::Cursor;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tokio::sync::oneshot;

use crate::application::ports::{DeviceError, VideoDevice, VideoStream};
use crate::domain::capture::FrameData;

enum Command {
    Capture(oneshot::Sender<Result<FrameData, DeviceError>>),
    Release,
}

/// Camera device backed by nokhwa, always opened at the highest resolution
/// the device negotiates.
pub struct NokhwaCamera {
    index: u32,
}

impl NokhwaCamera {
    /// Adapter for the given camera index (0 is the platform default)
    pub fn new(index: u32) -> Self {
        Self { index }
    }

    fn map_error(e: &nokhwa::NokhwaError) -> DeviceError {
        let text = e.to_string().to_lowercase();
        if text.contains("permission") || text.contains("denied") || text.contains("access") {
            DeviceError::PermissionDenied
        } else if text.contains("not found") || text.contains("no device") {
            DeviceError::NoDevice
        } else {
            DeviceError::Unknown(e.to_string())
        }
    }

    fn grab_frame(camera: &mut Camera, size: &StdMutex<(u32, u32)>) -> Result<FrameData, DeviceError> {
        let buffer = camera.frame().map_err(|e| Self::map_error(&e))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| Self::map_error(&e))?;

        let (width, height) = (decoded.width(), decoded.height());
        // Resolution may be re-negotiated mid-stream; record what this frame
        // actually measures.
        *size.lock().unwrap() = (width, height);

        let rgb = image::RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| DeviceError::Unknown("frame buffer size mismatch".into()))?;

        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(rgb)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| DeviceError::Unknown(e.to_string()))?;

        Ok(FrameData::new(png, width, height))
    }
}

#[async_trait]
impl VideoDevice for NokhwaCamera {
    type Stream = NokhwaStream;

    async fn acquire(&self) -> Result<NokhwaStream, DeviceError> {
        let index = self.index;
        let size = Arc::new(StdMutex::new((0u32, 0u32)));
        let size_for_thread = Arc::clone(&size);
        let (commands_tx, commands_rx) = std_mpsc::channel::<Command>();
        let (started_tx, started_rx) = oneshot::channel::<Result<(), DeviceError>>();

        std::thread::spawn(move || {
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
            let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
                Ok(camera) => camera,
                Err(e) => {
                    let _ = started_tx.send(Err(NokhwaCamera::map_error(&e)));
                    return;
                }
            };
            if let Err(e) = camera.open_stream() {
                let _ = started_tx.send(Err(NokhwaCamera::map_error(&e)));
                return;
            }

            let resolution = camera.resolution();
            *size_for_thread.lock().unwrap() = (resolution.width(), resolution.height());
            let _ = started_tx.send(Ok(()));

            while let Ok(command) = commands_rx.recv() {
                match command {
                    Command::Capture(reply) => {
                        let _ = reply.send(NokhwaCamera::grab_frame(&mut camera, &size_for_thread));
                    }
                    Command::Release => break,
                }
            }
            let _ = camera.stop_stream();
        });

        match started_rx.await {
            Ok(Ok(())) => Ok(NokhwaStream {
                commands: commands_tx,
                size,
                released: false,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::Unknown("camera thread exited".into())),
        }
    }
}

/// Live stream handle tied to the camera thread
pub struct NokhwaStream {
    commands: std_mpsc::Sender<Command>,
    size: Arc<StdMutex<(u32, u32)>>,
    released: bool,
}

#[async_trait]
impl VideoStream for NokhwaStream {
    fn native_size(&self) -> (u32, u32) {
        *self.size.lock().unwrap()
    }

    async fn capture_frame(&mut self) -> Result<FrameData, DeviceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Capture(reply_tx))
            .map_err(|_| DeviceError::Unknown("camera thread exited".into()))?;
        reply_rx
            .await
            .map_err(|_| DeviceError::Unknown("camera thread exited".into()))?
    }

    async fn release(&mut self) {
        if !self.released {
            self.released = true;
            // Thread already gone means already released
            let _ = self.commands.send(Command::Release);
        }
    }
}

impl Drop for NokhwaStream {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.commands.send(Command::Release);
        }
    }
}
