//! Application layer: port traits and use cases
//!
//! Use cases are generic over their ports so they can be driven by mock
//! devices and gateways in tests and by the real adapters in the CLI.

pub mod audio;
pub mod panels;
pub mod ports;
pub mod vision;

pub use audio::{AudioReport, AudioStudio, AudioStudioError, StopOutcome};
pub use panels::{PanelError, Panels};
pub use vision::{CaptureOutcome, VisionReport, VisionStudio, VisionStudioError};
