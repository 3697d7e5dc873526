use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::HashMap;
use std::sync::Arc;

use super::{hann_window, AudioFrame};
use crate::config::MAX_FFT_ORDER;
use crate::error::{AnalysisError, Result};

/// Plan, window and scratch space for one FFT size.
struct FftResources {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

/// Turns audio frames into a normalized linear magnitude spectrum.
///
/// FFT plans and window coefficients are built the first time a size is
/// requested and kept for the life of the analyzer. The analyzer is owned by
/// a single thread, so none of this is locked.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f32>,
    resources: HashMap<usize, FftResources>,
    truncate_to_half: bool,
}

impl SpectrumAnalyzer {
    pub fn new(truncate_to_half: bool) -> Self {
        Self {
            planner: FftPlanner::new(),
            resources: HashMap::new(),
            truncate_to_half,
        }
    }

    pub fn truncate_to_half(&self) -> bool {
        self.truncate_to_half
    }

    /// Number of spectrum values `analyze` returns for an FFT of `fft_size`.
    pub fn spectrum_len(&self, fft_size: usize) -> usize {
        let bins = fft_size / 2;
        if self.truncate_to_half {
            bins / 2
        } else {
            bins
        }
    }

    /// Magnitude spectrum of the first `2^order` samples of the frame's
    /// first channel. Bin `k` is `k * sample_rate / N` Hz.
    ///
    /// Values follow the packed real-FFT convention, whose raw output is
    /// twice the DFT, divided by `N`: a full-scale sine centred on a bin
    /// reads 0.5 under the Hann window.
    pub fn analyze(&mut self, frame: &AudioFrame, order: u32) -> Result<Vec<f32>> {
        if order == 0 || order > MAX_FFT_ORDER {
            return Err(AnalysisError::InvalidFftOrder(order));
        }
        let n = 1usize << order;
        let available = frame.len();
        if available < n {
            return Err(AnalysisError::InsufficientSamples { required: n, available });
        }

        let spectrum_len = self.spectrum_len(n);
        let res = self.resources_for(n)?;

        for ((slot, &sample), &w) in res
            .buffer
            .iter_mut()
            .zip(&frame.first_channel()[..n])
            .zip(&res.window)
        {
            *slot = Complex::new(sample * w, 0.0);
        }

        res.fft.process_with_scratch(&mut res.buffer, &mut res.scratch);

        // Real-FFT packing keeps the Nyquist residue in bin 0's imaginary slot.
        res.buffer[0].im = 0.0;

        // Packed real-FFT output is 2·X[k]; normalized by sample count.
        let scale = 2.0 / n as f32;
        let mut spectrum = Vec::new();
        spectrum
            .try_reserve_exact(spectrum_len)
            .map_err(|_| AnalysisError::AllocationFailure { fft_size: n })?;
        spectrum.extend(res.buffer[..spectrum_len].iter().map(|c| c.norm() * scale));

        Ok(spectrum)
    }

    fn resources_for(&mut self, n: usize) -> Result<&mut FftResources> {
        if !self.resources.contains_key(&n) {
            let fft = self.planner.plan_fft_forward(n);
            let buffer = zeroed(n).ok_or(AnalysisError::AllocationFailure { fft_size: n })?;
            let scratch = zeroed(fft.get_inplace_scratch_len())
                .ok_or(AnalysisError::AllocationFailure { fft_size: n })?;
            log::debug!("Planned FFT of size {}", n);
            self.resources.insert(
                n,
                FftResources { fft, window: hann_window(n), buffer, scratch },
            );
        }
        self.resources
            .get_mut(&n)
            .ok_or(AnalysisError::AllocationFailure { fft_size: n })
    }
}

fn zeroed(len: usize) -> Option<Vec<Complex<f32>>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).ok()?;
    v.resize(len, Complex::new(0.0, 0.0));
    Some(v)
}

impl Drop for SpectrumAnalyzer {
    fn drop(&mut self) {
        if !self.resources.is_empty() {
            log::debug!("Releasing {} FFT plan(s)", self.resources.len());
        }
    }
}
