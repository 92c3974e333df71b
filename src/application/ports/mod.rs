//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod device;
pub mod gateway;

// Re-export common types
pub use device::{AudioDevice, AudioStream, DeviceError, VideoDevice, VideoStream};
pub use gateway::{ApiGateway, ApiResponse, MultipartForm, PartBody};
