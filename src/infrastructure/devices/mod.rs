//! Capture device adapters

mod camera;
mod microphone;

pub use camera::{NokhwaCamera, NokhwaStream};
pub use microphone::{CpalMicStream, CpalMicrophone};
