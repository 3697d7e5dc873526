use std::f32::consts::PI;

/// Periodic Hann window of `size` coefficients: `w[i] = 0.5 - 0.5 cos(2πi/size)`.
///
/// Unlike the symmetric form, the last coefficient is not forced to zero,
/// which keeps the window exact for FFT frames that repeat end-to-end.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * PI * i as f32 / size as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}
