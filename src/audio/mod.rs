pub mod backend;
pub mod fft;
pub mod metrics;
pub mod processor;
pub mod state;
pub mod wav;
pub mod window;

pub use backend::{
    CpalBackend, FaultReporter, FrameSink, InputBackend, InputStream, StreamFormat, StreamLink,
    StreamRequest, SyntheticBackend,
};
pub use fft::SpectrumAnalyzer;
pub use metrics::SignalMetrics;
pub use processor::{AudioCapture, CaptureCommand, FramePipeline, SessionState};
pub use state::{AnalysisSnapshot, AnalysisState};
pub use wav::WavSource;
pub use window::hann_window;

/// One block of captured samples, stored planar: all of channel 0, then
/// channel 1, and so on.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
}

impl AudioFrame {
    /// Build a frame from planar samples. Trailing samples that do not fill
    /// a whole channel are dropped.
    pub fn from_planar(mut samples: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let per_channel = samples.len() / channels;
        samples.truncate(per_channel * channels);
        Self { samples, channels, sample_rate }
    }

    /// Build a frame from interleaved samples (the layout audio devices deliver).
    pub fn from_interleaved(data: &[f32], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let per_channel = data.len() / channels;
        let mut samples = Vec::with_capacity(per_channel * channels);
        for ch in 0..channels {
            samples.extend(data.chunks_exact(channels).map(|frame| frame[ch]));
        }
        Self { samples, channels, sample_rate }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, channels: 1, sample_rate }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        if index >= self.channels {
            return None;
        }
        let len = self.len();
        Some(&self.samples[index * len..(index + 1) * len])
    }

    pub fn first_channel(&self) -> &[f32] {
        &self.samples[..self.len()]
    }

    /// Every sample across all channels.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_is_split_per_channel() {
        let frame = AudioFrame::from_interleaved(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0], 2, 48000);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.first_channel(), &[1.0, 2.0, 3.0]);
        assert_eq!(frame.channel(1), Some(&[-1.0, -2.0, -3.0][..]));
        assert_eq!(frame.channel(2), None);
        assert_eq!(frame.sample_rate(), 48000);
    }

    #[test]
    fn test_partial_interleaved_frame_is_dropped() {
        let frame = AudioFrame::from_interleaved(&[1.0, 2.0, 3.0], 2, 44100);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.samples(), &[1.0, 2.0]);
    }

    #[test]
    fn test_planar_truncates_ragged_tail() {
        let frame = AudioFrame::from_planar(vec![0.0; 7], 2, 44100);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.samples().len(), 6);
    }
}
