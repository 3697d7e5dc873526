use hound::{SampleFormat, WavReader};
use log::info;
use std::path::Path;

use super::AudioFrame;
use crate::error::Result;

/// A WAV file decoded to f32 and cut into fixed-size frames, for running the
/// live pipeline offline.
pub struct WavSource {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
}

impl WavSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = WavReader::open(path.as_ref())?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => {
                reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?
            }
            SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        info!(
            "Loaded {:?}: {} Hz, {} channel(s), {} samples",
            path.as_ref(),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self::from_interleaved(samples, spec.channels as usize, spec.sample_rate))
    }

    pub fn from_interleaved(samples: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
        Self { samples, channels: channels.max(1), sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (self.samples.len() / self.channels) as f32 / self.sample_rate as f32
    }

    /// Consecutive frames of `frame_size` samples per channel. A trailing
    /// partial frame is yielded as-is so the analyzer can reject it.
    pub fn frames(&self, frame_size: usize) -> impl Iterator<Item = AudioFrame> + '_ {
        let block = frame_size.max(1) * self.channels;
        self.samples
            .chunks(block)
            .map(move |chunk| AudioFrame::from_interleaved(chunk, self.channels, self.sample_rate))
    }
}
