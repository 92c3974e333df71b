//! Vision capture and inference use case

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::overlay::Overlay;
use crate::domain::session::{InvalidTransition, VisionSession, VisionState};

use super::ports::{
    ApiGateway, ApiResponse, DeviceError, MultipartForm, VideoDevice, VideoStream,
};

/// Inference endpoint for still frames
pub const VISION_INFER_PATH: &str = "/vision/infer";

/// Errors from the vision studio use case
#[derive(Debug, Error)]
pub enum VisionStudioError {
    #[error("Device stream failed: {0}")]
    Device(#[from] DeviceError),

    #[error("Invalid state transition: {0}")]
    InvalidState(#[from] InvalidTransition),
}

/// Outcome of one capture action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A result arrived and was applied to the session
    Applied,
    /// The backend answered with no data; previous displayed state kept
    NoData,
    /// A capture was already in flight; state and request unchanged
    Rejected,
    /// The capture failed; the session is in the error state
    Failed,
}

/// Wire shape of the inference response. Every field is optional: a
/// well-formed response missing fields renders as "unknown", never a failure.
#[derive(Debug, Clone, Default, Deserialize)]
struct InferResponse {
    pred: Option<String>,
    score: Option<f64>,
    faces: Option<Vec<crate::domain::overlay::BoundingBox>>,
    image_png_b64: Option<String>,
}

/// Snapshot of the vision session for presentation
#[derive(Debug, Clone, Default)]
pub struct VisionReport {
    pub state: VisionState,
    pub label: Option<String>,
    pub score: Option<f64>,
    pub overlay: Overlay,
    pub annotated_png: Option<Vec<u8>>,
    pub last_frame_png: Option<Vec<u8>>,
    pub last_error: Option<String>,
}

impl VisionReport {
    /// Prediction headline, e.g. `cat (0.920)`. Unknown fields render as
    /// placeholders; returns `None` before any result has arrived.
    pub fn headline(&self) -> Option<String> {
        if self.label.is_none() && self.score.is_none() {
            return None;
        }
        let label = self.label.as_deref().unwrap_or("unknown");
        match self.score {
            Some(score) => Some(format!("{} ({:.3})", label, score)),
            None => Some(format!("{} (?)", label)),
        }
    }
}

#[derive(Debug, Default)]
struct Board {
    session: VisionSession,
    label: Option<String>,
    score: Option<f64>,
    overlay: Overlay,
    annotated_png: Option<Vec<u8>>,
    last_frame_png: Option<Vec<u8>>,
    last_error: Option<String>,
}

/// Vision studio use case.
///
/// Owns the camera stream for the span of a session and drives the
/// Idle -> Streaming -> Capturing -> AwaitingInference -> Streaming loop.
/// At most one capture request is in flight at a time; a capture issued
/// while one is outstanding is rejected, not queued.
pub struct VisionStudio<V, G>
where
    V: VideoDevice,
    G: ApiGateway,
{
    camera: V,
    gateway: Arc<G>,
    request_timeout: Duration,
    board: Mutex<Board>,
    stream: Mutex<Option<V::Stream>>,
}

impl<V, G> VisionStudio<V, G>
where
    V: VideoDevice,
    G: ApiGateway,
{
    /// Create a new studio around a camera and a gateway
    pub fn new(camera: V, gateway: Arc<G>, request_timeout: Duration) -> Self {
        Self {
            camera,
            gateway,
            request_timeout,
            board: Mutex::new(Board::default()),
            stream: Mutex::new(None),
        }
    }

    /// Get the current session state
    pub async fn state(&self) -> VisionState {
        self.board.lock().await.session.state()
    }

    /// Snapshot the session for presentation
    pub async fn report(&self) -> VisionReport {
        let board = self.board.lock().await;
        VisionReport {
            state: board.session.state(),
            label: board.label.clone(),
            score: board.score,
            overlay: board.overlay.clone(),
            annotated_png: board.annotated_png.clone(),
            last_frame_png: board.last_frame_png.clone(),
            last_error: board.last_error.clone(),
        }
    }

    /// Acquire the camera and begin streaming.
    /// On acquisition failure the session moves to the error state and no
    /// network call is made.
    pub async fn start(&self) -> Result<(), VisionStudioError> {
        {
            let mut board = self.board.lock().await;
            board.session.start_streaming()?;
        }

        match self.camera.acquire().await {
            Ok(stream) => {
                *self.stream.lock().await = Some(stream);
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

    /// Capture the current frame and submit it for inference.
    ///
    /// Returns [`CaptureOutcome::Rejected`] without side effects when a
    /// capture is already in flight. Device and transport failures move the
    /// session to the error state but leave the previous prediction and
    /// overlay visible.
    pub async fn capture(&self, return_image: bool) -> CaptureOutcome {
        // Transition first: a concurrent capture sees Capturing or
        // AwaitingInference and is rejected rather than queued behind us.
        if self.board.lock().await.session.begin_capture().is_err() {
            return CaptureOutcome::Rejected;
        }

        // Rasterize the current frame at native resolution
        let frame = {
            let mut guard = self.stream.lock().await;
            match guard.as_mut() {
                Some(stream) => stream.capture_frame().await,
                None => Err(DeviceError::Unknown("stream not acquired".into())),
            }
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                self.fail(format!("frame capture failed: {}", e)).await;
                return CaptureOutcome::Failed;
            }
        };

        let frame_size = (frame.width(), frame.height());
        {
            let mut board = self.board.lock().await;
            if board.session.await_inference().is_err() {
                // An error transition raced the capture; leave it be.
                return CaptureOutcome::Failed;
            }
            board.last_frame_png = Some(frame.png().to_vec());
        }

        let form = MultipartForm::new()
            .bytes("image", frame.into_png(), "frame.png", "image/png")
            .text("return_image", if return_image { "true" } else { "false" });

        let response = match tokio::time::timeout(
            self.request_timeout,
            self.gateway.submit_multipart(VISION_INFER_PATH, form),
        )
        .await
        {
            Ok(response) => response,
            Err(_) => {
                self.fail("inference request timed out".to_string()).await;
                return CaptureOutcome::Failed;
            }
        };

        match response {
            ApiResponse::TransportFailed(reason) => {
                self.fail(format!("inference request failed: {}", reason))
                    .await;
                CaptureOutcome::Failed
            }
            ApiResponse::Empty => {
                // Empty success: keep the previous displayed state intact
                let mut board = self.board.lock().await;
                let _ = board.session.settle();
                CaptureOutcome::NoData
            }
            ApiResponse::Ok(value) => {
                let decoded: InferResponse = serde_json::from_value(value).unwrap_or_default();

                // The authoritative overlay space is the live stream's
                // current native size; it may have re-negotiated since the
                // request was sent.
                let native = {
                    let guard = self.stream.lock().await;
                    guard
                        .as_ref()
                        .map(|s| s.native_size())
                        .unwrap_or(frame_size)
                };

                let annotated = decoded.image_png_b64.as_deref().and_then(|b64| {
                    base64::engine::general_purpose::STANDARD.decode(b64).ok()
                });

                let mut board = self.board.lock().await;
                board.label = decoded.pred;
                board.score = decoded.score;
                board.overlay.reconcile(
                    native.0,
                    native.1,
                    decoded.faces.as_deref().unwrap_or(&[]),
                );
                if annotated.is_some() {
                    board.annotated_png = annotated;
                }
                board.last_error = None;
                let _ = board.session.settle();
                CaptureOutcome::Applied
            }
        }
    }

    /// Stop streaming and release the camera.
    /// Rejected while a capture is in flight: there is no mid-flight abort.
    pub async fn stop(&self) -> Result<(), InvalidTransition> {
        {
            let mut board = self.board.lock().await;
            board.session.stop()?;
        }
        self.release_stream().await;
        Ok(())
    }

    /// Recover from the error state back to idle. Displayed results are
    /// retained: stale-but-available beats blank.
    pub async fn reset(&self) -> Result<(), InvalidTransition> {
        {
            let mut board = self.board.lock().await;
            board.session.reset()?;
            board.last_error = None;
        }
        self.release_stream().await;
        Ok(())
    }

    async fn fail(&self, reason: String) {
        self.release_stream().await;
        let mut board = self.board.lock().await;
        board.session.fail();
        board.last_error = Some(reason);
    }

    async fn release_stream(&self) {
        if let Some(mut stream) = self.stream.lock().await.take() {
            stream.release().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capture::FrameData;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Semaphore;

    struct MockCamera {
        deny: Option<DeviceError>,
        size: Arc<StdMutex<(u32, u32)>>,
        releases: Arc<AtomicUsize>,
    }

    impl MockCamera {
        fn new() -> Self {
            Self {
                deny: None,
                size: Arc::new(StdMutex::new((640, 480))),
                releases: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn denying(err: DeviceError) -> Self {
            Self {
                deny: Some(err),
                ..Self::new()
            }
        }
    }

    struct MockStream {
        size: Arc<StdMutex<(u32, u32)>>,
        releases: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VideoDevice for MockCamera {
        type Stream = MockStream;

        async fn acquire(&self) -> Result<MockStream, DeviceError> {
            match &self.deny {
                Some(err) => Err(err.clone()),
                None => Ok(MockStream {
                    size: Arc::clone(&self.size),
                    releases: Arc::clone(&self.releases),
                }),
            }
        }
    }

    #[async_trait]
    impl VideoStream for MockStream {
        fn native_size(&self) -> (u32, u32) {
            *self.size.lock().unwrap()
        }

        async fn capture_frame(&mut self) -> Result<FrameData, DeviceError> {
            let (w, h) = self.native_size();
            Ok(FrameData::new(vec![0x89, b'P', b'N', b'G'], w, h))
        }

        async fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Replays a scripted queue of responses; falls back to Empty.
    struct ScriptedGateway {
        responses: StdMutex<VecDeque<ApiResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(responses: Vec<ApiResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: StdMutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ApiGateway for ScriptedGateway {
        async fn submit_json(&self, _path: &str, _body: &Value) -> ApiResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ApiResponse::Empty
        }

        async fn submit_multipart(&self, _path: &str, _form: MultipartForm) -> ApiResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ApiResponse::Empty)
        }

        async fn fetch_json(&self, _path: &str) -> ApiResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ApiResponse::Empty
        }
    }

    /// Holds every multipart submission until the test releases the gate.
    struct GatedGateway {
        gate: Semaphore,
        calls: AtomicUsize,
        response: ApiResponse,
    }

    impl GatedGateway {
        fn new(response: ApiResponse) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                calls: AtomicUsize::new(0),
                response,
            })
        }
    }

    #[async_trait]
    impl ApiGateway for GatedGateway {
        async fn submit_json(&self, _path: &str, _body: &Value) -> ApiResponse {
            ApiResponse::Empty
        }

        async fn submit_multipart(&self, _path: &str, _form: MultipartForm) -> ApiResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await.unwrap();
            permit.forget();
            self.response.clone()
        }

        async fn fetch_json(&self, _path: &str) -> ApiResponse {
            ApiResponse::Empty
        }
    }

    fn cat_response() -> ApiResponse {
        ApiResponse::Ok(json!({
            "pred": "cat",
            "score": 0.92,
            "faces": [{"x1": 10, "y1": 10, "x2": 50, "y2": 50}]
        }))
    }

    async fn wait_for_state<V, G>(studio: &VisionStudio<V, G>, state: VisionState)
    where
        V: VideoDevice,
        G: ApiGateway,
    {
        for _ in 0..200 {
            if studio.state().await == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("session never reached {} state", state);
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn full_capture_cycle_applies_result() {
        let gateway = ScriptedGateway::new(vec![cat_response()]);
        let studio = VisionStudio::new(MockCamera::new(), Arc::clone(&gateway), TIMEOUT);

        studio.start().await.unwrap();
        assert_eq!(studio.state().await, VisionState::Streaming);

        let outcome = studio.capture(false).await;
        assert_eq!(outcome, CaptureOutcome::Applied);
        assert_eq!(studio.state().await, VisionState::Streaming);

        let report = studio.report().await;
        assert_eq!(report.label.as_deref(), Some("cat"));
        assert_eq!(report.score, Some(0.92));
        assert_eq!(report.headline().as_deref(), Some("cat (0.920)"));

        // Overlay registered in native frame space
        assert_eq!(report.overlay.dimensions(), (640, 480));
        let boxes = report.overlay.boxes();
        assert_eq!(boxes.len(), 1);
        assert_eq!((boxes[0].x1, boxes[0].y1), (10.0, 10.0));
        assert_eq!((boxes[0].x2, boxes[0].y2), (50.0, 50.0));
    }

    #[tokio::test]
    async fn capture_while_in_flight_is_rejected() {
        let gateway = GatedGateway::new(cat_response());
        let studio = Arc::new(VisionStudio::new(
            MockCamera::new(),
            Arc::clone(&gateway),
            TIMEOUT,
        ));

        studio.start().await.unwrap();

        let first = {
            let studio = Arc::clone(&studio);
            tokio::spawn(async move { studio.capture(false).await })
        };
        wait_for_state(&*studio, VisionState::AwaitingInference).await;

        // Second capture is a no-op: state and in-flight request unchanged
        assert_eq!(studio.capture(false).await, CaptureOutcome::Rejected);
        assert_eq!(studio.state().await, VisionState::AwaitingInference);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        gateway.gate.add_permits(1);
        assert_eq!(first.await.unwrap(), CaptureOutcome::Applied);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permission_denied_reaches_error_without_network_call() {
        let gateway = ScriptedGateway::new(vec![]);
        let studio = VisionStudio::new(
            MockCamera::denying(DeviceError::PermissionDenied),
            Arc::clone(&gateway),
            TIMEOUT,
        );

        let err = studio.start().await.unwrap_err();
        assert!(matches!(
            err,
            VisionStudioError::Device(DeviceError::PermissionDenied)
        ));
        assert_eq!(studio.state().await, VisionState::Error);
        assert_eq!(gateway.calls(), 0);

        let report = studio.report().await;
        assert!(report.last_error.is_some());
    }

    #[tokio::test]
    async fn empty_response_keeps_previous_display() {
        let gateway = ScriptedGateway::new(vec![cat_response(), ApiResponse::Empty]);
        let studio = VisionStudio::new(MockCamera::new(), gateway, TIMEOUT);

        studio.start().await.unwrap();
        assert_eq!(studio.capture(false).await, CaptureOutcome::Applied);
        assert_eq!(studio.capture(false).await, CaptureOutcome::NoData);

        // Empty success is not an error and does not blank the display
        let report = studio.report().await;
        assert_eq!(report.state, VisionState::Streaming);
        assert_eq!(report.label.as_deref(), Some("cat"));
        assert!(!report.overlay.is_clear());
    }

    #[tokio::test]
    async fn transport_failure_keeps_stale_results_visible() {
        let camera = MockCamera::new();
        let releases = Arc::clone(&camera.releases);
        let gateway = ScriptedGateway::new(vec![
            cat_response(),
            ApiResponse::TransportFailed("connection refused".into()),
        ]);
        let studio = VisionStudio::new(camera, gateway, TIMEOUT);

        studio.start().await.unwrap();
        assert_eq!(studio.capture(false).await, CaptureOutcome::Applied);
        assert_eq!(studio.capture(false).await, CaptureOutcome::Failed);

        let report = studio.report().await;
        assert_eq!(report.state, VisionState::Error);
        assert!(report.last_error.is_some());
        // Previous prediction and overlay remain visible
        assert_eq!(report.label.as_deref(), Some("cat"));
        assert_eq!(report.overlay.boxes().len(), 1);
        // The stream was released on the error exit path
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        // Explicit retry recovers to idle
        studio.reset().await.unwrap();
        assert_eq!(studio.state().await, VisionState::Idle);
    }

    #[tokio::test]
    async fn response_without_boxes_clears_overlay() {
        let gateway = ScriptedGateway::new(vec![
            cat_response(),
            ApiResponse::Ok(json!({"pred": "dog", "score": 0.5})),
        ]);
        let studio = VisionStudio::new(MockCamera::new(), gateway, TIMEOUT);

        studio.start().await.unwrap();
        studio.capture(false).await;
        assert!(!studio.report().await.overlay.is_clear());

        studio.capture(false).await;
        let report = studio.report().await;
        assert!(report.overlay.is_clear());
        assert_eq!(report.overlay.dimensions(), (640, 480));
        assert_eq!(report.label.as_deref(), Some("dog"));
    }

    #[tokio::test]
    async fn stop_during_awaiting_inference_is_rejected() {
        let gateway = GatedGateway::new(cat_response());
        let studio = Arc::new(VisionStudio::new(
            MockCamera::new(),
            Arc::clone(&gateway),
            TIMEOUT,
        ));

        studio.start().await.unwrap();
        let pending = {
            let studio = Arc::clone(&studio);
            tokio::spawn(async move { studio.capture(false).await })
        };
        wait_for_state(&*studio, VisionState::AwaitingInference).await;

        assert!(studio.stop().await.is_err());
        assert_eq!(studio.state().await, VisionState::AwaitingInference);

        gateway.gate.add_permits(1);
        pending.await.unwrap();
        studio.stop().await.unwrap();
        assert_eq!(studio.state().await, VisionState::Idle);
    }

    #[tokio::test]
    async fn stop_releases_the_stream() {
        let camera = MockCamera::new();
        let releases = Arc::clone(&camera.releases);
        let studio = VisionStudio::new(camera, ScriptedGateway::new(vec![]), TIMEOUT);

        studio.start().await.unwrap();
        studio.stop().await.unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overlay_follows_renegotiated_native_size() {
        let camera = MockCamera::new();
        let size = Arc::clone(&camera.size);
        let gateway = GatedGateway::new(cat_response());
        let studio = Arc::new(VisionStudio::new(camera, Arc::clone(&gateway), TIMEOUT));

        studio.start().await.unwrap();
        let pending = {
            let studio = Arc::clone(&studio);
            tokio::spawn(async move { studio.capture(false).await })
        };
        wait_for_state(&*studio, VisionState::AwaitingInference).await;

        // Device re-negotiates while the request is in flight
        *size.lock().unwrap() = (1920, 1080);
        gateway.gate.add_permits(1);
        assert_eq!(pending.await.unwrap(), CaptureOutcome::Applied);

        assert_eq!(studio.report().await.overlay.dimensions(), (1920, 1080));
    }

    #[tokio::test]
    async fn malformed_payload_renders_as_unknown() {
        let gateway = ScriptedGateway::new(vec![ApiResponse::Ok(json!({"score": "high"}))]);
        let studio = VisionStudio::new(MockCamera::new(), gateway, TIMEOUT);

        studio.start().await.unwrap();
        assert_eq!(studio.capture(false).await, CaptureOutcome::Applied);

        let report = studio.report().await;
        assert_eq!(report.state, VisionState::Streaming);
        assert!(report.label.is_none());
        assert!(report.score.is_none());
        assert_eq!(report.headline(), None);
    }
}
