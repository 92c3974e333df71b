//! Microphone adapter using cpal
//!
//! The cpal stream is not Send, so it lives on a dedicated thread for the
//! lifetime of one recording. Captured buffers are downmixed to mono s16le
//! and emitted as chunks over the stream's inbound channel; dropping the
//! stream drops the callback's sender, which closes the channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tokio::sync::{mpsc, oneshot};

use crate::application::ports::{AudioDevice, AudioStream, DeviceError};

/// Preferred capture rate for speech
const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Microphone device backed by cpal. Requests 16 kHz mono; falls back to
/// whatever the device supports, reporting the actual rate on the stream.
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }

    fn map_error(text: String) -> DeviceError {
        let lowered = text.to_lowercase();
        if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("access")
        {
            DeviceError::PermissionDenied
        } else if lowered.contains("no device")
            || lowered.contains("not available")
            || lowered.contains("not found")
        {
            DeviceError::NoDevice
        } else {
            DeviceError::Unknown(text)
        }
    }

    /// Pick a capture configuration: i16 or f32 only, mono over stereo,
    /// ranges that include 16 kHz over those that do not.
    fn pick_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), DeviceError> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| Self::map_error(e.to_string()))?;

        let mut best: Option<cpal::SupportedStreamConfigRange> = None;
        for config in supported {
            if config.sample_format() != SampleFormat::I16
                && config.sample_format() != SampleFormat::F32
            {
                continue;
            }

            let includes_target = config.min_sample_rate().0 <= TARGET_SAMPLE_RATE
                && config.max_sample_rate().0 >= TARGET_SAMPLE_RATE;

            let better = match &best {
                None => true,
                Some(current) => {
                    let fewer_channels = config.channels() < current.channels();
                    let better_rate =
                        includes_target && current.min_sample_rate().0 > TARGET_SAMPLE_RATE;
                    fewer_channels || better_rate
                }
            };
            if better {
                best = Some(config);
            }
        }

        let range = best.ok_or_else(|| {
            DeviceError::Unknown("no usable input configuration found".to_string())
        })?;

        let sample_rate = if range.min_sample_rate().0 <= TARGET_SAMPLE_RATE
            && range.max_sample_rate().0 >= TARGET_SAMPLE_RATE
        {
            SampleRate(TARGET_SAMPLE_RATE)
        } else {
            range.min_sample_rate()
        };

        let sample_format = range.sample_format();
        let config = StreamConfig {
            channels: range.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        Ok((config, sample_format))
    }

    /// Downmix interleaved i16 samples to mono s16le bytes
    fn downmix_to_bytes(samples: &[i16], channels: u16) -> Vec<u8> {
        if channels <= 1 {
            return samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        }
        samples
            .chunks(channels as usize)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }

    fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
        samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect()
    }
}

impl Default for CpalMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioDevice for CpalMicrophone {
    type Stream = CpalMicStream;

    async fn acquire(&self) -> Result<CpalMicStream, DeviceError> {
        let (chunks_tx, chunks_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (started_tx, started_rx) = oneshot::channel::<Result<u32, DeviceError>>();
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_input_device() {
                Some(device) => device,
                None => {
                    let _ = started_tx.send(Err(DeviceError::NoDevice));
                    return;
                }
            };

            let (config, sample_format) = match CpalMicrophone::pick_config(&device) {
                Ok(picked) => picked,
                Err(e) => {
                    let _ = started_tx.send(Err(e));
                    return;
                }
            };
            let sample_rate = config.sample_rate.0;
            let channels = config.channels;

            // The callback owns the only chunk sender; dropping the stream
            // closes the channel.
            let stream_result = match sample_format {
                SampleFormat::I16 => device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let _ = chunks_tx.send(CpalMicrophone::downmix_to_bytes(data, channels));
                    },
                    |err| eprintln!("Audio stream error: {}", err),
                    None,
                ),
                SampleFormat::F32 => device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let i16_data = CpalMicrophone::f32_to_i16(data);
                        let _ =
                            chunks_tx.send(CpalMicrophone::downmix_to_bytes(&i16_data, channels));
                    },
                    |err| eprintln!("Audio stream error: {}", err),
                    None,
                ),
                other => {
                    let _ = started_tx.send(Err(DeviceError::Unknown(format!(
                        "unsupported sample format: {:?}",
                        other
                    ))));
                    return;
                }
            };

            let stream = match stream_result {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = started_tx.send(Err(CpalMicrophone::map_error(e.to_string())));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = started_tx.send(Err(CpalMicrophone::map_error(e.to_string())));
                return;
            }

            let _ = started_tx.send(Ok(sample_rate));

            while !stop_for_thread.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }

            drop(stream);
            let _ = done_tx.send(());
        });

        match started_rx.await {
            Ok(Ok(sample_rate)) => Ok(CpalMicStream {
                sample_rate,
                chunks: Some(chunks_rx),
                stop,
                done: Some(done_rx),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::Unknown("recorder thread exited".into())),
        }
    }
}

/// Live recording handle tied to the recorder thread
pub struct CpalMicStream {
    sample_rate: u32,
    chunks: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    stop: Arc<AtomicBool>,
    done: Option<oneshot::Receiver<()>>,
}

#[async_trait]
impl AudioStream for CpalMicStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn take_chunks(&mut self) -> mpsc::UnboundedReceiver<Vec<u8>> {
        self.chunks.take().unwrap_or_else(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            drop(tx);
            rx
        })
    }

    async fn finalize(&mut self) -> Result<(), DeviceError> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(done) = self.done.take() {
            // Err means the thread is already gone, which still counts as
            // finalized.
            let _ = done.await;
        }
        Ok(())
    }

    async fn release(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for CpalMicStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_passes_through_as_le_bytes() {
        let bytes = CpalMicrophone::downmix_to_bytes(&[100, 200, 300], 1);
        assert_eq!(bytes, vec![100, 0, 200, 0, 44, 1]);
    }

    #[test]
    fn stereo_downmix_averages_pairs() {
        let bytes = CpalMicrophone::downmix_to_bytes(&[100, 200, 300, 400], 2);
        // Averages are 150 and 350
        assert_eq!(bytes, vec![150, 0, 94, 1]);
    }

    #[test]
    fn f32_conversion_clamps_out_of_range() {
        let samples = CpalMicrophone::f32_to_i16(&[0.0, 1.0, -1.0, 2.0]);
        assert_eq!(samples, vec![0, 32767, -32767, 32767]);
    }
}
