use thiserror::Error;

/// Errors produced by the analysis pipeline and capture layer.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The frame holds fewer samples per channel than the FFT size needs.
    /// The frame is skipped and the published state is left untouched.
    #[error("frame has {available} samples per channel, FFT needs {required}")]
    InsufficientSamples { required: usize, available: usize },

    #[error(
        "invalid FFT order {0}: must be between 1 and {max}",
        max = crate::config::MAX_FFT_ORDER
    )]
    InvalidFftOrder(u32),

    /// FFT scratch or plan storage could not be allocated. Fatal for the analyzer.
    #[error("failed to allocate FFT resources for size {fft_size}")]
    AllocationFailure { fft_size: usize },

    #[error("audio capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// The input stream broke after it was started. Ends the session.
    #[error("audio input stream failed: {0}")]
    StreamFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
