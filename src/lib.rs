//! Audio analysis core for an audio-reactive visualizer.
//!
//! Microphone frames are windowed, transformed with an FFT and reduced to a
//! magnitude spectrum plus a few scalar features. The result is published as
//! an [`audio::AnalysisSnapshot`] that a render loop reads at its own rate.

pub mod audio;
pub mod config;
pub mod error;
pub mod render;

pub use audio::{
    AnalysisSnapshot, AnalysisState, AudioCapture, AudioFrame, CaptureCommand, SessionState,
    SignalMetrics, SpectrumAnalyzer,
};
pub use config::Config;
pub use error::{AnalysisError, Result};
