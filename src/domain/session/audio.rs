//! Audio session state machine and transcript board

use std::fmt;

use super::InvalidTransition;

/// Audio session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioState {
    #[default]
    Idle,
    Recording,
    Stopping,
    Error,
}

impl AudioState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AudioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audio session entity.
///
/// State machine:
///   IDLE -> RECORDING (start)
///   RECORDING -> STOPPING (stop)
///   STOPPING -> IDLE (finish)
///   any -> ERROR (fail)
///   ERROR -> IDLE (reset)
///
/// The recording loop is independent of transcription: the session returns
/// to IDLE as soon as the clip is assembled, whether or not the transcription
/// request has completed. Transcript progress is tracked on the
/// [`TranscriptStatus`] board instead.
#[derive(Debug, Default)]
pub struct AudioSession {
    state: AudioState,
}

impl AudioSession {
    /// Create a new session in idle state
    pub fn new() -> Self {
        Self {
            state: AudioState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> AudioState {
        self.state
    }

    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        self.state == AudioState::Recording
    }

    /// Transition from IDLE to RECORDING
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        if self.state != AudioState::Idle {
            return Err(InvalidTransition {
                current_state: self.state.as_str(),
                action: "start recording",
            });
        }
        self.state = AudioState::Recording;
        Ok(())
    }

    /// Transition from RECORDING to STOPPING
    pub fn stop(&mut self) -> Result<(), InvalidTransition> {
        if self.state != AudioState::Recording {
            return Err(InvalidTransition {
                current_state: self.state.as_str(),
                action: "stop recording",
            });
        }
        self.state = AudioState::Stopping;
        Ok(())
    }

    /// Transition from STOPPING to IDLE once the clip is assembled
    pub fn finish(&mut self) -> Result<(), InvalidTransition> {
        if self.state != AudioState::Stopping {
            return Err(InvalidTransition {
                current_state: self.state.as_str(),
                action: "finish stopping",
            });
        }
        self.state = AudioState::Idle;
        Ok(())
    }

    /// Transition to ERROR from any state
    pub fn fail(&mut self) {
        self.state = AudioState::Error;
    }

    /// Transition from ERROR to IDLE (explicit user retry)
    pub fn reset(&mut self) -> Result<(), InvalidTransition> {
        if self.state != AudioState::Error {
            return Err(InvalidTransition {
                current_state: self.state.as_str(),
                action: "reset",
            });
        }
        self.state = AudioState::Idle;
        Ok(())
    }
}

/// Transcript board status, tracked separately from the recording loop.
///
/// Distinguishes "recording idle, awaiting transcript" (`Pending`) from
/// "recording idle, transcript settled" (`Settled`/`NoSpeech`). An empty
/// transcript settles as `NoSpeech` so it never silently blanks a previously
/// displayed transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptStatus {
    /// No transcription has been requested yet
    #[default]
    Idle,
    /// A clip has been submitted; the transcript has not arrived
    Pending,
    /// A non-empty transcript arrived and is displayed
    Settled,
    /// The transcription settled with no speech detected
    NoSpeech,
}

impl TranscriptStatus {
    /// Whether a transcription request is still outstanding
    pub fn is_pending(&self) -> bool {
        *self == Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_idle() {
        let session = AudioSession::new();
        assert_eq!(session.state(), AudioState::Idle);
        assert!(!session.is_recording());
    }

    #[test]
    fn full_recording_cycle() {
        let mut session = AudioSession::new();
        session.start().unwrap();
        assert!(session.is_recording());

        session.stop().unwrap();
        assert_eq!(session.state(), AudioState::Stopping);

        session.finish().unwrap();
        assert_eq!(session.state(), AudioState::Idle);

        // Loop: a new recording may start immediately
        session.start().unwrap();
        assert!(session.is_recording());
    }

    #[test]
    fn double_start_is_rejected() {
        let mut session = AudioSession::new();
        session.start().unwrap();

        let err = session.start().unwrap_err();
        assert_eq!(err.current_state, "recording");
        assert!(session.is_recording());
    }

    #[test]
    fn stop_from_idle_fails() {
        let mut session = AudioSession::new();
        assert!(session.stop().is_err());
        assert_eq!(session.state(), AudioState::Idle);
    }

    #[test]
    fn finish_from_recording_fails() {
        let mut session = AudioSession::new();
        session.start().unwrap();
        assert!(session.finish().is_err());
    }

    #[test]
    fn fail_and_reset() {
        let mut session = AudioSession::new();
        session.start().unwrap();
        session.fail();
        assert_eq!(session.state(), AudioState::Error);

        session.reset().unwrap();
        assert_eq!(session.state(), AudioState::Idle);
    }

    #[test]
    fn transcript_status_default_is_idle() {
        assert_eq!(TranscriptStatus::default(), TranscriptStatus::Idle);
        assert!(!TranscriptStatus::default().is_pending());
        assert!(TranscriptStatus::Pending.is_pending());
    }

    #[test]
    fn state_display() {
        assert_eq!(AudioState::Idle.to_string(), "idle");
        assert_eq!(AudioState::Stopping.to_string(), "stopping");
    }
}
