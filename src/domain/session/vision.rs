//! Vision session state machine

use std::fmt;

use super::InvalidTransition;

/// Vision session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VisionState {
    #[default]
    Idle,
    Streaming,
    Capturing,
    AwaitingInference,
    Error,
}

impl VisionState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Capturing => "capturing",
            Self::AwaitingInference => "awaiting-inference",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for VisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vision session entity.
/// Manages state transitions for the capture-and-inference lifecycle.
///
/// State machine:
///   IDLE -> STREAMING (start_streaming)
///   STREAMING -> CAPTURING (begin_capture)
///   CAPTURING -> AWAITING_INFERENCE (await_inference)
///   AWAITING_INFERENCE -> STREAMING (settle)
///   STREAMING -> IDLE (stop)
///   any -> ERROR (fail)
///   ERROR -> IDLE (reset)
///
/// A capture attempted while one is in flight (CAPTURING or
/// AWAITING_INFERENCE) is rejected, not queued. Stop is likewise rejected
/// while a request is in flight, so responses always land in the state that
/// issued them.
#[derive(Debug, Default)]
pub struct VisionSession {
    state: VisionState,
}

impl VisionSession {
    /// Create a new session in idle state
    pub fn new() -> Self {
        Self {
            state: VisionState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> VisionState {
        self.state
    }

    /// Check whether a capture request is currently in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            VisionState::Capturing | VisionState::AwaitingInference
        )
    }

    /// Transition from IDLE to STREAMING
    pub fn start_streaming(&mut self) -> Result<(), InvalidTransition> {
        if self.state != VisionState::Idle {
            return Err(InvalidTransition {
                current_state: self.state.as_str(),
                action: "start streaming",
            });
        }
        self.state = VisionState::Streaming;
        Ok(())
    }

    /// Transition from STREAMING to CAPTURING
    pub fn begin_capture(&mut self) -> Result<(), InvalidTransition> {
        if self.state != VisionState::Streaming {
            return Err(InvalidTransition {
                current_state: self.state.as_str(),
                action: "begin capture",
            });
        }
        self.state = VisionState::Capturing;
        Ok(())
    }

    /// Transition from CAPTURING to AWAITING_INFERENCE
    pub fn await_inference(&mut self) -> Result<(), InvalidTransition> {
        if self.state != VisionState::Capturing {
            return Err(InvalidTransition {
                current_state: self.state.as_str(),
                action: "submit capture",
            });
        }
        self.state = VisionState::AwaitingInference;
        Ok(())
    }

    /// Transition from AWAITING_INFERENCE back to STREAMING
    pub fn settle(&mut self) -> Result<(), InvalidTransition> {
        if self.state != VisionState::AwaitingInference {
            return Err(InvalidTransition {
                current_state: self.state.as_str(),
                action: "settle inference",
            });
        }
        self.state = VisionState::Streaming;
        Ok(())
    }

    /// Transition from STREAMING to IDLE.
    /// Rejected while a capture is in flight: there is no mid-flight abort.
    pub fn stop(&mut self) -> Result<(), InvalidTransition> {
        if self.state != VisionState::Streaming {
            return Err(InvalidTransition {
                current_state: self.state.as_str(),
                action: "stop streaming",
            });
        }
        self.state = VisionState::Idle;
        Ok(())
    }

    /// Transition to ERROR from any state
    pub fn fail(&mut self) {
        self.state = VisionState::Error;
    }

    /// Transition from ERROR to IDLE (explicit user retry)
    pub fn reset(&mut self) -> Result<(), InvalidTransition> {
        if self.state != VisionState::Error {
            return Err(InvalidTransition {
                current_state: self.state.as_str(),
                action: "reset",
            });
        }
        self.state = VisionState::Idle;
        Ok(())
    }
}
