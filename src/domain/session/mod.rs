//! Media session state machines
//!
//! One session per modality; each owns its device stream handle for the span
//! from acquisition to release and enforces the at-most-one-in-flight
//! capture invariant through its transitions.

mod audio;
mod vision;

pub use audio::{AudioSession, AudioState, TranscriptStatus};
pub use vision::{VisionSession, VisionState};

use thiserror::Error;

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidTransition {
    pub current_state: &'static str,
    pub action: &'static str,
}
