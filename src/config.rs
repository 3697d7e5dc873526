use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AnalysisError, Result};

/// Largest supported FFT order (2^16 samples).
pub const MAX_FFT_ORDER: u32 = 16;

/// Startup parameters for capture, analysis and the render tick.
///
/// Read once at startup; nothing reloads it mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// log2 of the FFT size (M). The capture frame size is `2^M`.
    pub fft_order: u32,
    /// Keep only the lower half of the magnitude bins.
    pub truncate_to_half: bool,
    /// Requested device sample rate. `None` uses the device default.
    pub sample_rate: Option<u32>,
    /// Render ticks per second.
    pub desired_framerate: f64,
    /// Capacity of the capture -> analysis frame queue.
    pub frame_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fft_order: 9,
            truncate_to_half: false,
            sample_rate: None,
            desired_framerate: 30.0,
            frame_queue: 4,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fft_order == 0 || self.fft_order > MAX_FFT_ORDER {
            return Err(AnalysisError::InvalidFftOrder(self.fft_order));
        }
        if !self.desired_framerate.is_finite() || self.desired_framerate <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "desired_framerate must be positive, got {}",
                self.desired_framerate
            )));
        }
        if self.frame_queue == 0 {
            return Err(AnalysisError::InvalidConfig(
                "frame_queue must hold at least one frame".to_string(),
            ));
        }
        if self.sample_rate == Some(0) {
            return Err(AnalysisError::InvalidConfig(
                "sample_rate must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `2^fft_order`, or 0 when the order does not fit a `usize` shift.
    pub fn fft_size(&self) -> usize {
        1usize.checked_shl(self.fft_order).unwrap_or(0)
    }

    /// Seconds between render ticks, `1 / desired_framerate`.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.desired_framerate)
    }
}
