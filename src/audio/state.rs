use std::sync::{Arc, RwLock};

use super::SignalMetrics;

/// One published view of the analysis pipeline.
///
/// Every field comes from the same analysed frame, so the spectrum length,
/// FFT size and sample rate always agree with the peak frequency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisSnapshot {
    pub spectrum: Vec<f32>,
    pub peak_amplitude: f32,
    pub peak_magnitude: f32,
    pub peak_frequency_hz: f32,
    pub max_frequency_hz: f32,
    pub listening: bool,
    pub sample_rate: u32,
    pub fft_size: usize,
    /// Frames analysed since capture started. Zero while listening means no
    /// signal has arrived yet.
    pub frames_analyzed: u64,
}

impl AnalysisSnapshot {
    /// The defaults published while capture is stopped.
    pub fn stopped() -> Self {
        Self::default()
    }

    /// Listening, but no frame analysed yet.
    pub fn awaiting_signal(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            listening: true,
            sample_rate,
            fft_size,
            max_frequency_hz: SignalMetrics::max_frequency(sample_rate, fft_size),
            ..Self::default()
        }
    }

    pub fn is_stopped(&self) -> bool {
        !self.listening
    }

    pub fn has_signal(&self) -> bool {
        self.listening && self.frames_analyzed > 0
    }
}

/// Shared handle to the latest snapshot.
///
/// Writers swap in a whole new `Arc<AnalysisSnapshot>`; readers clone the
/// current `Arc` and never hold the lock while they use it.
#[derive(Debug, Default)]
pub struct AnalysisState {
    current: RwLock<Arc<AnalysisSnapshot>>,
}

impl AnalysisState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Arc<AnalysisSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn publish(&self, snapshot: AnalysisSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    pub fn reset(&self) {
        self.publish(AnalysisSnapshot::stopped());
    }

    pub fn is_listening(&self) -> bool {
        self.snapshot().listening
    }
}
