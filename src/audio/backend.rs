use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use crossbeam_channel::{Sender, TrySendError};
use log::{info, warn};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::AudioFrame;
use crate::error::{AnalysisError, Result};

/// What the capture session asks of a backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamRequest {
    /// Preferred sample rate; the device default is used when `None`.
    pub sample_rate: Option<u32>,
    /// Samples per channel in every delivered frame.
    pub frame_size: usize,
}

/// Format the backend actually opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: usize,
}

/// A live input subscription. Dropping it releases the device and stops
/// every further call into the frame sink.
pub trait InputStream {
    fn format(&self) -> StreamFormat;
}

/// Source of captured audio.
///
/// `open` is called on the capture thread, and the returned stream stays on
/// that thread, so streams do not need to be `Send`.
pub trait InputBackend: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self, request: StreamRequest, link: StreamLink) -> Result<Box<dyn InputStream>>;
}

/// Channels connecting an open stream to its capture session: captured
/// frames one way, stream faults the other.
#[derive(Clone)]
pub struct StreamLink {
    frames: Sender<AudioFrame>,
    faults: Sender<AnalysisError>,
    dropped: Arc<AtomicU64>,
}

impl StreamLink {
    pub fn new(
        frames: Sender<AudioFrame>,
        faults: Sender<AnalysisError>,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        Self { frames, faults, dropped }
    }

    pub fn sink(&self, format: StreamFormat, frame_size: usize) -> FrameSink {
        FrameSink::new(self.frames.clone(), format, frame_size, Arc::clone(&self.dropped))
    }

    pub fn fault_reporter(&self) -> FaultReporter {
        FaultReporter { faults: self.faults.clone() }
    }
}

/// Hands a broken-stream error to the capture session. Never blocks, so it
/// is safe to call from an audio callback.
#[derive(Clone)]
pub struct FaultReporter {
    faults: Sender<AnalysisError>,
}

impl FaultReporter {
    pub fn report(&self, err: AnalysisError) {
        warn!("Audio stream error: {}", err);
        // A fault already queued ends the session just the same.
        let _ = self.faults.try_send(err);
    }
}

/// Cuts arbitrary-sized interleaved callback buffers into fixed-size frames
/// and hands them to the analysis queue without ever blocking.
pub struct FrameSink {
    sender: Sender<AudioFrame>,
    format: StreamFormat,
    frame_size: usize,
    pending: Vec<f32>,
    dropped: Arc<AtomicU64>,
    closed: bool,
}

impl FrameSink {
    pub fn new(
        sender: Sender<AudioFrame>,
        format: StreamFormat,
        frame_size: usize,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        let channels = format.channels.max(1);
        Self {
            sender,
            format: StreamFormat { channels, ..format },
            frame_size,
            pending: Vec::with_capacity(frame_size * channels * 2),
            dropped,
            closed: false,
        }
    }

    pub fn push_interleaved(&mut self, data: &[f32]) {
        self.push_samples(data.iter().copied());
    }

    pub fn push_samples<I: IntoIterator<Item = f32>>(&mut self, samples: I) {
        if self.closed {
            return;
        }
        self.pending.extend(samples);

        let block = self.frame_size * self.format.channels;
        if block == 0 {
            self.pending.clear();
            return;
        }

        let mut consumed = 0;
        while self.pending.len() - consumed >= block {
            let frame = AudioFrame::from_interleaved(
                &self.pending[consumed..consumed + block],
                self.format.channels,
                self.format.sample_rate,
            );
            consumed += block;

            match self.sender.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.closed = true;
                    break;
                }
            }
        }
        self.pending.drain(..consumed);
        if self.closed {
            self.pending.clear();
        }
    }
}

/// Microphone input through the default cpal host.
#[derive(Debug, Default)]
pub struct CpalBackend;

struct CpalStream {
    stream: Stream,
    format: StreamFormat,
}

impl InputStream for CpalStream {
    fn format(&self) -> StreamFormat {
        self.format
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("Failed to pause input stream: {}", e);
        }
        info!("Input stream released");
    }
}

fn unavailable<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> AnalysisError + '_ {
    move |e| AnalysisError::CaptureUnavailable(format!("{}: {}", context, e))
}

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    fn choose_config(
        device: &Device,
        sample_rate: Option<u32>,
    ) -> Result<(SampleFormat, StreamConfig)> {
        let default = device
            .default_input_config()
            .map_err(unavailable("failed to get default input config"))?;

        if let Some(rate) = sample_rate {
            if rate != default.sample_rate().0 {
                let matching = device
                    .supported_input_configs()
                    .map_err(unavailable("failed to query input configs"))?
                    .filter(|range| range.sample_format() == default.sample_format())
                    .find(|range| {
                        range.min_sample_rate().0 <= rate && rate <= range.max_sample_rate().0
                    });

                match matching {
                    Some(range) => {
                        let supported = range.with_sample_rate(SampleRate(rate));
                        return Ok((supported.sample_format(), supported.into()));
                    }
                    None => warn!(
                        "Sample rate {} Hz not supported, using device default {} Hz",
                        rate,
                        default.sample_rate().0
                    ),
                }
            }
        }

        Ok((default.sample_format(), default.into()))
    }
}

impl InputBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&self, request: StreamRequest, link: StreamLink) -> Result<Box<dyn InputStream>> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            AnalysisError::CaptureUnavailable("no input device available".to_string())
        })?;

        info!("Using audio device: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));

        let (sample_format, config) = Self::choose_config(&device, request.sample_rate)?;
        let format = StreamFormat {
            sample_rate: config.sample_rate.0,
            channels: config.channels as usize,
        };
        info!(
            "Creating input stream with {} channels at {} Hz ({:?})",
            format.channels, format.sample_rate, sample_format
        );

        let mut sink = link.sink(format, request.frame_size);
        let faults = link.fault_reporter();
        let err_fn = move |err: cpal::StreamError| {
            faults.report(AnalysisError::StreamFailed(err.to_string()))
        };

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| sink.push_interleaved(data),
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    sink.push_samples(data.iter().map(|&s| s as f32 / i16::MAX as f32))
                },
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    sink.push_samples(
                        data.iter().map(|&s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0),
                    )
                },
                err_fn,
                None,
            ),
            other => {
                return Err(AnalysisError::CaptureUnavailable(format!(
                    "unsupported sample format: {:?}",
                    other
                )))
            }
        }
        .map_err(unavailable("failed to build input stream"))?;

        stream.play().map_err(unavailable("failed to start input stream"))?;

        Ok(Box::new(CpalStream { stream, format }))
    }
}

/// Deterministic sine source standing in for a microphone.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    pub frequency: f32,
    pub amplitude: f32,
    pub sample_rate: u32,
    pub channels: usize,
    /// Delay between delivered frames. `None` paces frames in real time.
    pub interval: Option<Duration>,
    /// Report the stream as lost after this many frames.
    pub fail_after: Option<u64>,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            amplitude: 0.5,
            sample_rate: 44100,
            channels: 1,
            interval: None,
            fail_after: None,
        }
    }
}

impl SyntheticBackend {
    pub fn sine(frequency: f32, amplitude: f32) -> Self {
        Self { frequency, amplitude, ..Self::default() }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn failing_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }
}

struct SyntheticStream {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    format: StreamFormat,
}

impl InputStream for SyntheticStream {
    fn format(&self) -> StreamFormat {
        self.format
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Synthetic input thread panicked");
            }
        }
    }
}

impl InputBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&self, request: StreamRequest, link: StreamLink) -> Result<Box<dyn InputStream>> {
        let format = StreamFormat {
            sample_rate: request.sample_rate.unwrap_or(self.sample_rate),
            channels: self.channels.max(1),
        };
        if format.sample_rate == 0 || request.frame_size == 0 {
            return Err(AnalysisError::CaptureUnavailable(
                "synthetic source needs a non-zero rate and frame size".to_string(),
            ));
        }

        let interval = self.interval.unwrap_or_else(|| {
            Duration::from_secs_f64(request.frame_size as f64 / format.sample_rate as f64)
        });
        let step = 2.0 * PI * self.frequency / format.sample_rate as f32;
        let amplitude = self.amplitude;
        let frame_size = request.frame_size;
        let fail_after = self.fail_after;

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let mut sink = link.sink(format, frame_size);
        let faults = link.fault_reporter();

        let worker = thread::Builder::new()
            .name("synthetic-input".to_string())
            .spawn(move || {
                let mut phase = 0.0f32;
                let mut delivered = 0u64;
                let mut block = Vec::with_capacity(frame_size * format.channels);
                while flag.load(Ordering::SeqCst) {
                    if fail_after.is_some_and(|limit| delivered >= limit) {
                        faults.report(AnalysisError::StreamFailed(
                            "synthetic input lost".to_string(),
                        ));
                        break;
                    }
                    block.clear();
                    for _ in 0..frame_size {
                        let value = amplitude * phase.sin();
                        block.extend(std::iter::repeat(value).take(format.channels));
                        phase = (phase + step) % (2.0 * PI);
                    }
                    sink.push_interleaved(&block);
                    delivered += 1;
                    thread::sleep(interval);
                }
            })
            .map_err(unavailable("failed to spawn synthetic input"))?;

        info!(
            "Synthetic input: {} Hz sine at {} Hz sample rate",
            self.frequency, format.sample_rate
        );
        Ok(Box::new(SyntheticStream { running, worker: Some(worker), format }))
    }
}
