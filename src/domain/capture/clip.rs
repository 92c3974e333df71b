//! Audio clip assembly

use std::io::Cursor;

use thiserror::Error;

/// Error wrapping an assembled clip into a WAV container
#[derive(Debug, Clone, Error)]
#[error("Failed to encode WAV clip: {0}")]
pub struct ClipEncodeError(pub String);

/// Ordered accumulation of binary chunks for the duration of one recording.
///
/// Chunks are appended in arrival order and concatenated into a single clip
/// only at stop time; `assemble` clears the buffer so it is never shared
/// across recordings.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
}

impl ChunkBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    /// Append one emitted chunk in arrival order
    pub fn push(&mut self, chunk: Vec<u8>) {
        self.chunks.push(chunk);
    }

    /// Number of buffered chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the buffer holds no chunks
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Discard all buffered chunks
    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Concatenate all buffered chunks, in order, into one clip and clear
    /// the buffer. A zero-chunk recording assembles an empty-but-valid clip.
    pub fn assemble(&mut self, sample_rate: u32) -> AudioClip {
        let total: usize = self.chunks.iter().map(Vec::len).sum();
        let mut pcm = Vec::with_capacity(total);
        for chunk in self.chunks.drain(..) {
            pcm.extend_from_slice(&chunk);
        }
        AudioClip::new(pcm, sample_rate)
    }
}

/// Value object representing one assembled audio clip: mono signed 16-bit
/// little-endian PCM plus the sample rate it was captured at.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pcm: Vec<u8>,
    sample_rate: u32,
}

impl AudioClip {
    /// Create a clip from raw PCM bytes.
    ///
    /// `pcm` must hold whole s16le samples: an odd byte count would leave a
    /// trailing byte that never reaches the WAV container.
    pub fn new(pcm: Vec<u8>, sample_rate: u32) -> Self {
        debug_assert!(
            pcm.len() % 2 == 0,
            "clip PCM must be sample-aligned s16le"
        );
        Self { pcm, sample_rate }
    }

    /// Raw PCM bytes (s16le, mono)
    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether the clip holds no samples
    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    /// Wrap the PCM into a WAV container for submission.
    /// An empty clip produces a valid zero-sample WAV.
    pub fn to_wav(&self) -> Result<Vec<u8>, ClipEncodeError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| ClipEncodeError(e.to_string()))?;
            for sample in self.pcm.chunks_exact(2) {
                let value = i16::from_le_bytes([sample[0], sample[1]]);
                writer
                    .write_sample(value)
                    .map_err(|e| ClipEncodeError(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| ClipEncodeError(e.to_string()))?;
        }
        Ok(cursor.into_inner())
    }
}
