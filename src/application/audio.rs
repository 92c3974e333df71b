//! Audio capture and transcription use case

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::domain::capture::{AudioClip, ChunkBuffer};
use crate::domain::session::{AudioSession, AudioState, InvalidTransition, TranscriptStatus};

use super::ports::{ApiGateway, ApiResponse, AudioDevice, AudioStream, DeviceError, MultipartForm};

/// Transcription endpoint for assembled clips
pub const AUDIO_ASR_PATH: &str = "/audio/asr";

/// Errors from the audio studio use case
#[derive(Debug, Error)]
pub enum AudioStudioError {
    #[error("Device stream failed: {0}")]
    Device(#[from] DeviceError),

    #[error("Invalid state transition: {0}")]
    InvalidState(#[from] InvalidTransition),
}

/// Outcome of one stop action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The assembled clip was submitted for transcription
    Submitted,
    /// A previous transcription was still in flight; the newer clip was
    /// dropped rather than queued behind it
    DroppedBusy,
}

/// Wire shape of the transcription response
#[derive(Debug, Clone, Default, Deserialize)]
struct AsrResponse {
    text: Option<String>,
}

/// Snapshot of the audio session for presentation
#[derive(Debug, Clone, Default)]
pub struct AudioReport {
    pub state: AudioState,
    pub transcript: TranscriptStatus,
    pub text: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Board {
    session: AudioSession,
    transcript: TranscriptStatus,
    text: Option<String>,
    last_error: Option<String>,
    in_flight: bool,
}

struct Recording<S> {
    stream: S,
    pump: JoinHandle<()>,
}

/// Audio studio use case.
///
/// Drives the Idle -> Recording -> Stopping -> Idle loop. Emitted chunks are
/// pumped from the recording's inbound channel into the session buffer in
/// arrival order; the clip is assembled once, at stop time. Transcription is
/// fire-and-forget relative to the recording lifecycle: the session is ready
/// for a new recording while the transcript is still pending.
pub struct AudioStudio<A, G>
where
    A: AudioDevice,
    G: ApiGateway + 'static,
{
    mic: A,
    gateway: Arc<G>,
    request_timeout: Duration,
    board: Arc<Mutex<Board>>,
    buffer: Arc<StdMutex<ChunkBuffer>>,
    recording: Arc<Mutex<Option<Recording<A::Stream>>>>,
}

impl<A, G> AudioStudio<A, G>
where
    A: AudioDevice,
    G: ApiGateway + 'static,
{
    /// Create a new studio around a microphone and a gateway
    pub fn new(mic: A, gateway: Arc<G>, request_timeout: Duration) -> Self {
        Self {
            mic,
            gateway,
            request_timeout,
            board: Arc::new(Mutex::new(Board::default())),
            buffer: Arc::new(StdMutex::new(ChunkBuffer::new())),
            recording: Arc::new(Mutex::new(None)),
        }
    }

    /// Get the current session state
    pub async fn state(&self) -> AudioState {
        self.board.lock().await.session.state()
    }

    /// Snapshot the session for presentation
    pub async fn report(&self) -> AudioReport {
        let board = self.board.lock().await;
        AudioReport {
            state: board.session.state(),
            transcript: board.transcript,
            text: board.text.clone(),
            last_error: board.last_error.clone(),
        }
    }

    /// Acquire the microphone and begin recording.
    ///
    /// A start while a previous transcription is still outstanding is
    /// permitted; a second start while already recording is rejected. On
    /// acquisition failure the session moves to the error state and no
    /// network call is made.
    pub async fn start(&self) -> Result<(), AudioStudioError> {
        {
            let mut board = self.board.lock().await;
            board.session.start()?;
        }

        match self.mic.acquire().await {
            Ok(mut stream) => {
                let mut chunks = stream.take_chunks();
                let buffer = Arc::clone(&self.buffer);
                // Consume chunks as they arrive, in emission order
                let pump = tokio::spawn(async move {
                    while let Some(chunk) = chunks.recv().await {
                        buffer.lock().unwrap().push(chunk);
                    }
                });
                *self.recording.lock().await = Some(Recording { stream, pump });
                Ok(())
            }
            Err(e) => {
                let mut board = self.board.lock().await;
                board.session.fail();
                board.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Stop recording, assemble the clip, and submit it for transcription.
    ///
    /// The session returns to idle as soon as the clip is assembled; the
    /// transcription request completes on its own task. If a previous
    /// request is still in flight the new clip is dropped, not queued.
    pub async fn stop(&self) -> Result<StopOutcome, AudioStudioError> {
        {
            let mut board = self.board.lock().await;
            board.session.stop()?;
        }

        let recording = self.recording.lock().await.take();
        let Some(mut recording) = recording else {
            let mut board = self.board.lock().await;
            board.session.fail();
            board.last_error = Some("no active recording stream".to_string());
            return Err(DeviceError::Unknown("no active recording stream".into()).into());
        };

        let finalized = recording.stream.finalize().await;
        // The recorder closed the channel on finalization; the pump drains
        // any trailing chunks and exits.
        let _ = recording.pump.await;
        recording.stream.release().await;

        if let Err(e) = finalized {
            self.buffer.lock().unwrap().clear();
            let mut board = self.board.lock().await;
            board.session.fail();
            board.last_error = Some(e.to_string());
            return Err(e.into());
        }

        let sample_rate = recording.stream.sample_rate();
        let clip = self.buffer.lock().unwrap().assemble(sample_rate);

        {
            let mut board = self.board.lock().await;
            let _ = board.session.finish();
            if board.in_flight {
                return Ok(StopOutcome::DroppedBusy);
            }
            board.in_flight = true;
            board.transcript = TranscriptStatus::Pending;
        }

        self.spawn_transcription(clip);
        Ok(StopOutcome::Submitted)
    }

    /// Recover from the error state back to idle. The displayed transcript
    /// is retained.
    pub async fn reset(&self) -> Result<(), InvalidTransition> {
        {
            let mut board = self.board.lock().await;
            board.session.reset()?;
            board.last_error = None;
        }
        Self::teardown_live_recording(&self.recording, &self.buffer).await;
        Ok(())
    }

    /// Abort any live recording and release its stream. Invoked on every
    /// Error transition so a held microphone never outlives the error state.
    async fn teardown_live_recording(
        recording: &Mutex<Option<Recording<A::Stream>>>,
        buffer: &StdMutex<ChunkBuffer>,
    ) {
        if let Some(mut live) = recording.lock().await.take() {
            live.pump.abort();
            live.stream.release().await;
        }
        buffer.lock().unwrap().clear();
    }

    fn spawn_transcription(&self, clip: AudioClip) {
        let gateway = Arc::clone(&self.gateway);
        let board = Arc::clone(&self.board);
        let buffer = Arc::clone(&self.buffer);
        let recording = Arc::clone(&self.recording);
        let request_timeout = self.request_timeout;

        tokio::spawn(async move {
            let sample_rate = clip.sample_rate();
            let wav = match clip.to_wav() {
                Ok(wav) => wav,
                Err(e) => {
                    Self::teardown_live_recording(&recording, &buffer).await;
                    let mut board = board.lock().await;
                    board.in_flight = false;
                    board.session.fail();
                    board.last_error = Some(e.to_string());
                    board.transcript = TranscriptStatus::Idle;
                    return;
                }
            };

            let form = MultipartForm::new()
                .bytes("audio", wav, "clip.wav", "audio/wav")
                .text("sample_rate", sample_rate.to_string());

            let response = match tokio::time::timeout(
                request_timeout,
                gateway.submit_multipart(AUDIO_ASR_PATH, form),
            )
            .await
            {
                Ok(response) => response,
                Err(_) => ApiResponse::TransportFailed("transcription request timed out".into()),
            };

            match response {
                ApiResponse::TransportFailed(reason) => {
                    // The error transition takes any recording started since
                    // down with it; the stream must not outlive the state.
                    Self::teardown_live_recording(&recording, &buffer).await;
                    let mut board = board.lock().await;
                    board.in_flight = false;
                    board.session.fail();
                    board.last_error = Some(format!("transcription request failed: {}", reason));
                    board.transcript = if board.text.is_some() {
                        TranscriptStatus::Settled
                    } else {
                        TranscriptStatus::Idle
                    };
                }
                other => {
                    let mut board = board.lock().await;
                    board.in_flight = false;
                    match other {
                        ApiResponse::Ok(value) => {
                            let decoded: AsrResponse =
                                serde_json::from_value(value).unwrap_or_default();
                            match decoded.text {
                                Some(text) if !text.trim().is_empty() => {
                                    board.text = Some(text);
                                    board.transcript = TranscriptStatus::Settled;
                                    board.last_error = None;
                                }
                                // Empty text is valid but never silently
                                // blanks a previously displayed transcript
                                _ => board.transcript = TranscriptStatus::NoSpeech,
                            }
                        }
                        _ => board.transcript = TranscriptStatus::NoSpeech,
                    }
                }
            }
        });
    }
}
