//! Capture value objects: still frames and assembled audio clips

mod clip;
mod frame;

pub use clip::{AudioClip, ChunkBuffer, ClipEncodeError};
pub use frame::FrameData;
