use super::AudioFrame;

/// Scalar features derived from a raw frame and its spectrum.
///
/// Every function returns 0.0 for empty input and never yields NaN.
pub struct SignalMetrics;

impl SignalMetrics {
    /// Largest absolute sample across every channel of the frame.
    pub fn peak_amplitude(frame: &AudioFrame) -> f32 {
        Self::peak_abs(frame.samples())
    }

    pub fn peak_abs(samples: &[f32]) -> f32 {
        samples
            .iter()
            .map(|s| s.abs())
            .filter(|s| s.is_finite())
            .fold(0.0f32, f32::max)
    }

    /// `(peak_magnitude, peak_frequency_hz)` of a spectrum computed with an
    /// FFT of size `fft_size`. Ties go to the lowest bin.
    pub fn peak_magnitude_and_frequency(
        spectrum: &[f32],
        sample_rate: u32,
        fft_size: usize,
    ) -> (f32, f32) {
        if fft_size == 0 {
            return (0.0, 0.0);
        }

        let mut peak_index = 0;
        let mut peak = 0.0f32;
        for (i, &value) in spectrum.iter().enumerate() {
            if value.is_finite() && value > peak {
                peak = value;
                peak_index = i;
            }
        }

        (peak, Self::bin_frequency(peak_index, sample_rate, fft_size))
    }

    /// Frequency of the highest bin, `(N/2 - 1) * sample_rate / N`.
    pub fn max_frequency(sample_rate: u32, fft_size: usize) -> f32 {
        if fft_size < 2 {
            return 0.0;
        }
        Self::bin_frequency(fft_size / 2 - 1, sample_rate, fft_size)
    }

    pub fn bin_frequency(index: usize, sample_rate: u32, fft_size: usize) -> f32 {
        if fft_size == 0 {
            return 0.0;
        }
        (index as f64 * sample_rate as f64 / fft_size as f64) as f32
    }
}
