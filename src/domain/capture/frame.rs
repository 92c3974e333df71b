//! Captured frame value object

/// Value object representing one still frame rasterized from a live video
/// stream, ready for inference submission.
///
/// The frame is encoded at the stream's native pixel dimensions at capture
/// time, never the on-screen display size; returned annotations are
/// registered against these dimensions.
#[derive(Debug, Clone)]
pub struct FrameData {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl FrameData {
    /// Create a frame from PNG bytes and native dimensions
    pub fn new(png: Vec<u8>, width: u32, height: u32) -> Self {
        Self { png, width, height }
    }

    /// Get the PNG-encoded frame
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Consume and return the PNG bytes
    pub fn into_png(self) -> Vec<u8> {
        self.png
    }

    /// Native width in pixels at capture time
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Native height in pixels at capture time
    pub fn height(&self) -> u32 {
        self.height
    }
}
