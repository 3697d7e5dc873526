use crossbeam_channel::{select, Receiver, Sender};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use super::backend::{InputBackend, StreamFormat, StreamLink, StreamRequest};
use super::{AnalysisSnapshot, AnalysisState, AudioFrame, SignalMetrics, SpectrumAnalyzer};
use crate::config::Config;
use crate::error::{AnalysisError, Result};

/// Runs one frame through the analyzer and metrics and builds the snapshot
/// to publish for it.
pub struct FramePipeline {
    analyzer: SpectrumAnalyzer,
    fft_order: u32,
}

impl FramePipeline {
    pub fn new(fft_order: u32, truncate_to_half: bool) -> Self {
        Self {
            analyzer: SpectrumAnalyzer::new(truncate_to_half),
            fft_order,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.fft_order, config.truncate_to_half)
    }

    /// `2^fft_order`, or 0 for an order too large to shift.
    pub fn fft_size(&self) -> usize {
        1usize.checked_shl(self.fft_order).unwrap_or(0)
    }

    pub fn process(&mut self, frame: &AudioFrame) -> Result<AnalysisSnapshot> {
        let spectrum = self.analyzer.analyze(frame, self.fft_order)?;
        let fft_size = self.fft_size();
        let sample_rate = frame.sample_rate();
        let (peak_magnitude, peak_frequency_hz) =
            SignalMetrics::peak_magnitude_and_frequency(&spectrum, sample_rate, fft_size);

        Ok(AnalysisSnapshot {
            peak_amplitude: SignalMetrics::peak_amplitude(frame),
            peak_magnitude,
            peak_frequency_hz,
            max_frequency_hz: SignalMetrics::max_frequency(sample_rate, fft_size),
            listening: true,
            sample_rate,
            fft_size,
            frames_analyzed: 0,
            spectrum,
        })
    }
}

/// Lifecycle of the hardware input subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Listening,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Starting,
            2 => SessionState::Listening,
            _ => SessionState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Stopped => 0,
            SessionState::Starting => 1,
            SessionState::Listening => 2,
        }
    }
}

/// Commands an input controller (key press, tap, ...) sends to the capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Start,
    Stop,
    Toggle,
}

/// Threads and channels owned by one active capture.
struct CaptureSession {
    format: StreamFormat,
    capture_shutdown: Sender<()>,
    capture_thread: Option<JoinHandle<()>>,
    worker_shutdown: Sender<()>,
    worker_thread: Option<JoinHandle<()>>,
    dropped: Arc<AtomicU64>,
}

impl CaptureSession {
    /// Stops the analysis worker first so nothing publishes after this
    /// returns, then releases the input. Both joins finish before return.
    fn shutdown(mut self) {
        let _ = self.worker_shutdown.send(());
        if let Some(handle) = self.worker_thread.take() {
            if handle.join().is_err() {
                warn!("Analysis thread panicked");
            }
        }

        let _ = self.capture_shutdown.send(());
        if let Some(handle) = self.capture_thread.take() {
            if handle.join().is_err() {
                warn!("Capture thread panicked");
            }
        }

        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!("{} frame(s) dropped while analysis was busy", dropped);
        }
    }
}

/// Session phase plus the error that ended the last session, shared with
/// the analysis worker.
struct SessionHealth {
    phase: AtomicU8,
    fault: Mutex<Option<AnalysisError>>,
}

impl SessionHealth {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(SessionState::Stopped.as_u8()),
            fault: Mutex::new(None),
        }
    }

    fn phase(&self) -> SessionState {
        SessionState::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn set_phase(&self, phase: SessionState) {
        self.phase.store(phase.as_u8(), Ordering::SeqCst);
    }

    /// Starting -> Listening. Fails if the session already died.
    fn promote(&self) -> bool {
        self.phase
            .compare_exchange(
                SessionState::Starting.as_u8(),
                SessionState::Listening.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Records why the session ended and takes it down to stopped.
    fn fail(&self, err: AnalysisError, state: &AnalysisState) {
        error!("Audio capture stopped: {}", err);
        *self.lock_fault() = Some(err);
        state.reset();
        self.set_phase(SessionState::Stopped);
    }

    fn take_fault(&self) -> Option<AnalysisError> {
        self.lock_fault().take()
    }

    fn lock_fault(&self) -> MutexGuard<'_, Option<AnalysisError>> {
        match self.fault.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Continuous input capture feeding the analysis pipeline.
///
/// Frames flow from the backend's callback over a bounded channel to a
/// single analysis thread, which publishes one snapshot per frame into the
/// shared [`AnalysisState`]. At most one session is active at a time.
///
/// A broken input stream or a fatal analyzer error ends the session on its
/// own: the phase drops to [`SessionState::Stopped`], the state is reset and
/// the error waits in [`AudioCapture::take_error`].
pub struct AudioCapture {
    backend: Arc<dyn InputBackend>,
    state: Arc<AnalysisState>,
    config: Config,
    session: Mutex<Option<CaptureSession>>,
    health: Arc<SessionHealth>,
}

impl AudioCapture {
    pub fn new(
        backend: Arc<dyn InputBackend>,
        state: Arc<AnalysisState>,
        config: Config,
    ) -> Self {
        Self {
            backend,
            state,
            config,
            session: Mutex::new(None),
            health: Arc::new(SessionHealth::new()),
        }
    }

    pub fn state(&self) -> &Arc<AnalysisState> {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session_state(&self) -> SessionState {
        self.health.phase()
    }

    pub fn is_listening(&self) -> bool {
        self.session_state() == SessionState::Listening
    }

    /// The error that ended the last session, if it ended on its own.
    /// Cleared by reading it and by the next `start`.
    pub fn take_error(&self) -> Option<AnalysisError> {
        self.health.take_fault()
    }

    /// Format of the active stream, if any.
    pub fn stream_format(&self) -> Option<StreamFormat> {
        if !self.is_listening() {
            return None;
        }
        self.lock_session().as_ref().map(|s| s.format)
    }

    pub fn apply(&self, command: CaptureCommand) -> Result<SessionState> {
        match command {
            CaptureCommand::Start => self.start_default().map(|_| ()),
            CaptureCommand::Stop => {
                self.stop();
                Ok(())
            }
            CaptureCommand::Toggle => {
                if self.is_listening() {
                    self.stop();
                    Ok(())
                } else {
                    self.start_default().map(|_| ())
                }
            }
        }?;
        Ok(self.session_state())
    }

    /// Starts capture with the configured sample rate and a frame size of
    /// one FFT window.
    pub fn start_default(&self) -> Result<StreamFormat> {
        self.start(self.config.sample_rate, self.config.fft_size())
    }

    /// Starts capture. A no-op returning the current format when already
    /// listening. On failure the published state stays at stopped defaults.
    pub fn start(&self, sample_rate: Option<u32>, frame_size: usize) -> Result<StreamFormat> {
        let mut slot = self.lock_session();
        if let Some(session) = slot.as_ref() {
            if self.is_listening() {
                debug!("Capture already listening");
                return Ok(session.format);
            }
        }
        if let Some(ended) = slot.take() {
            debug!("Cleaning up a capture session that ended on its own");
            ended.shutdown();
        }

        self.config.validate()?;
        if frame_size == 0 {
            return Err(AnalysisError::InvalidConfig(
                "frame_size must be at least one sample".to_string(),
            ));
        }

        self.health.take_fault();
        self.health.set_phase(SessionState::Starting);
        info!("Starting audio capture via {} backend", self.backend.name());

        let session = match self.open_session(StreamRequest { sample_rate, frame_size }) {
            Ok(session) => session,
            Err(e) => {
                self.state.reset();
                self.health.set_phase(SessionState::Stopped);
                error!("Failed to start audio capture: {}", e);
                return Err(e);
            }
        };

        if !self.health.promote() {
            session.shutdown();
            self.state.reset();
            return Err(self.health.take_fault().unwrap_or_else(|| {
                AnalysisError::StreamFailed("input ended while starting".to_string())
            }));
        }

        let format = session.format;
        *slot = Some(session);
        info!(
            "Listening: {} Hz, {} channel(s), {} samples per frame",
            format.sample_rate, format.channels, frame_size
        );
        Ok(format)
    }

    /// Stops capture and resets the published state. Safe to call from any
    /// thread and when already stopped; once it returns, nothing writes to
    /// the state until the next `start`.
    pub fn stop(&self) {
        let mut slot = self.lock_session();
        if let Some(session) = slot.take() {
            session.shutdown();
            info!("Audio input stopped");
        }
        self.state.reset();
        self.health.set_phase(SessionState::Stopped);
    }

    fn open_session(&self, request: StreamRequest) -> Result<CaptureSession> {
        let (frames_tx, frames_rx) = crossbeam_channel::bounded(self.config.frame_queue);
        let (faults_tx, faults_rx) = crossbeam_channel::bounded(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (capture_shutdown, capture_shutdown_rx) = crossbeam_channel::bounded(1);
        let dropped = Arc::new(AtomicU64::new(0));

        let backend = Arc::clone(&self.backend);
        let link = StreamLink::new(frames_tx, faults_tx, Arc::clone(&dropped));
        let capture_thread = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || match backend.open(request, link) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(stream.format()));
                    let _ = capture_shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| {
                AnalysisError::CaptureUnavailable(format!("failed to spawn capture thread: {}", e))
            })?;

        let opened: Result<StreamFormat> = ready_rx.recv().unwrap_or_else(|_| {
            Err(AnalysisError::CaptureUnavailable("capture thread exited".to_string()))
        });

        let format = match opened {
            Ok(format) => format,
            Err(e) => {
                let _ = capture_thread.join();
                return Err(e);
            }
        };

        let fft_size = self.config.fft_size();
        if request.frame_size < fft_size {
            warn!(
                "Frame size {} is smaller than the FFT size {}; frames will be skipped",
                request.frame_size, fft_size
            );
        }
        self.state.publish(AnalysisSnapshot::awaiting_signal(format.sample_rate, fft_size));

        let (worker_shutdown, worker_shutdown_rx) = crossbeam_channel::bounded(1);
        let worker = AnalysisWorker {
            pipeline: FramePipeline::from_config(&self.config),
            frames: frames_rx,
            faults: faults_rx,
            shutdown: worker_shutdown_rx,
            state: Arc::clone(&self.state),
            health: Arc::clone(&self.health),
        };
        let worker_thread = match thread::Builder::new()
            .name("audio-analysis".to_string())
            .spawn(move || worker.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                let _ = capture_shutdown.send(());
                let _ = capture_thread.join();
                return Err(AnalysisError::CaptureUnavailable(format!(
                    "failed to spawn analysis thread: {}",
                    e
                )));
            }
        };

        Ok(CaptureSession {
            format,
            capture_shutdown,
            capture_thread: Some(capture_thread),
            worker_shutdown,
            worker_thread: Some(worker_thread),
            dropped,
        })
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<CaptureSession>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Single consumer of captured frames. Each frame is fully analysed and
/// published before the next one is taken off the queue.
struct AnalysisWorker {
    pipeline: FramePipeline,
    frames: Receiver<AudioFrame>,
    faults: Receiver<AnalysisError>,
    shutdown: Receiver<()>,
    state: Arc<AnalysisState>,
    health: Arc<SessionHealth>,
}

impl AnalysisWorker {
    fn run(self) {
        let AnalysisWorker { mut pipeline, frames, faults, shutdown, state, health } = self;
        let closed = || AnalysisError::StreamFailed("input stream closed".to_string());
        let mut frames_analyzed = 0u64;
        let fault = loop {
            select! {
                recv(shutdown) -> _ => break None,
                recv(faults) -> msg => break Some(msg.unwrap_or_else(|_| closed())),
                recv(frames) -> msg => {
                    let frame = match msg {
                        Ok(frame) => frame,
                        Err(_) => break Some(faults.try_recv().unwrap_or_else(|_| closed())),
                    };
                    match pipeline.process(&frame) {
                        Ok(mut snapshot) => {
                            frames_analyzed += 1;
                            snapshot.frames_analyzed = frames_analyzed;
                            state.publish(snapshot);
                        }
                        Err(AnalysisError::InsufficientSamples { required, available }) => {
                            debug!("Skipping short frame ({} of {} samples)", available, required);
                        }
                        Err(e) => break Some(e),
                    }
                }
            }
        };
        if let Some(err) = fault {
            health.fail(err, &state);
        }
        debug!("Analysis thread exiting after {} frame(s)", frames_analyzed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::InputStream;
    use crate::config::MAX_FFT_ORDER;
    use crate::audio::SyntheticBackend;
    use std::time::{Duration, Instant};

    struct UnavailableBackend;

    impl InputBackend for UnavailableBackend {
        fn name(&self) -> &str {
            "unavailable"
        }

        fn open(&self, _: StreamRequest, _: StreamLink) -> Result<Box<dyn InputStream>> {
            Err(AnalysisError::CaptureUnavailable("permission denied".to_string()))
        }
    }

    fn synthetic_backend(frequency: f32) -> SyntheticBackend {
        SyntheticBackend::sine(frequency, 0.8).with_interval(Duration::from_millis(2))
    }

    fn capture_with(backend: SyntheticBackend, config: Config) -> AudioCapture {
        AudioCapture::new(Arc::new(backend), AnalysisState::new(), config)
    }

    fn synthetic_capture(frequency: f32) -> AudioCapture {
        capture_with(synthetic_backend(frequency), Config::default())
    }

    fn wait_for<F: Fn(&AnalysisSnapshot) -> bool>(
        state: &AnalysisState,
        predicate: F,
    ) -> Arc<AnalysisSnapshot> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snap = state.snapshot();
            if predicate(&snap) {
                return snap;
            }
            assert!(Instant::now() < deadline, "timed out waiting for state, last: {:?}", snap);
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn wait_until_stopped(capture: &AudioCapture) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while capture.session_state() != SessionState::Stopped {
            assert!(Instant::now() < deadline, "session never left {:?}", capture.session_state());
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_pipeline_thousand_hz_scenario() {
        let n = 512;
        let samples: Vec<f32> = (0..n)
            .map(|i| 0.8 * (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 44100.0).sin())
            .collect();
        let mut pipeline = FramePipeline::new(9, false);
        let snap = pipeline.process(&AudioFrame::mono(samples, 44100)).unwrap();

        assert_eq!(snap.spectrum.len(), 256);
        assert!((snap.peak_amplitude - 0.8).abs() <= 1e-3);
        assert!((snap.peak_frequency_hz - 1000.0).abs() <= 44100.0 / 512.0);
        assert!((snap.max_frequency_hz - 21994.3).abs() < 0.1);
        assert!(snap.listening);
    }

    #[test]
    fn test_pipeline_silence() {
        let mut pipeline = FramePipeline::new(9, false);
        let snap = pipeline.process(&AudioFrame::mono(vec![0.0; 512], 44100)).unwrap();
        assert!(snap.spectrum.iter().all(|&v| v == 0.0));
        assert_eq!(snap.peak_amplitude, 0.0);
        assert_eq!((snap.peak_magnitude, snap.peak_frequency_hz), (0.0, 0.0));
    }

    #[test]
    fn test_capture_publishes_analysis() {
        let capture = synthetic_capture(1000.0);
        assert_eq!(capture.config().tick_period(), Config::default().tick_period());
        let format = capture.start(Some(44100), 512).unwrap();
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(capture.session_state(), SessionState::Listening);

        let snap = wait_for(capture.state(), |s| s.frames_analyzed >= 3);
        assert!(snap.listening);
        assert_eq!(snap.spectrum.len(), 256);
        assert!((snap.peak_frequency_hz - 1000.0).abs() <= 44100.0 / 512.0);
        assert!((snap.peak_amplitude - 0.8).abs() < 0.01);

        capture.stop();
    }

    #[test]
    fn test_stop_resets_and_is_idempotent() {
        let capture = synthetic_capture(440.0);
        capture.start(Some(44100), 512).unwrap();
        wait_for(capture.state(), |s| s.has_signal());

        capture.stop();
        let once = capture.state().snapshot();
        assert_eq!(*once, AnalysisSnapshot::stopped());
        assert_eq!(capture.session_state(), SessionState::Stopped);

        capture.stop();
        assert_eq!(*capture.state().snapshot(), *once);
    }

    #[test]
    fn test_no_writes_after_stop_returns() {
        let capture = synthetic_capture(440.0);
        capture.start(Some(44100), 512).unwrap();
        wait_for(capture.state(), |s| s.has_signal());

        capture.stop();
        let after_stop = capture.state().snapshot();
        thread::sleep(Duration::from_millis(30));
        assert!(Arc::ptr_eq(&after_stop, &capture.state().snapshot()));
    }

    #[test]
    fn test_second_start_is_noop() {
        let capture = synthetic_capture(440.0);
        let first = capture.start(Some(44100), 512).unwrap();
        wait_for(capture.state(), |s| s.frames_analyzed >= 2);

        let second = capture.start(Some(48000), 1024).unwrap();
        assert_eq!(first, second);

        // Same session keeps counting frames.
        let snap = wait_for(capture.state(), |s| s.frames_analyzed >= 5);
        assert_eq!(snap.sample_rate, 44100);
        capture.stop();
    }

    #[test]
    fn test_unavailable_backend_reports_error() {
        let backend = Arc::new(UnavailableBackend);
        let capture = AudioCapture::new(backend, AnalysisState::new(), Config::default());
        match capture.start(None, 512) {
            Err(AnalysisError::CaptureUnavailable(msg)) => assert!(msg.contains("permission")),
            other => panic!("expected CaptureUnavailable, got {:?}", other.map(|_| ())),
        }
        assert_eq!(capture.session_state(), SessionState::Stopped);
        assert_eq!(*capture.state().snapshot(), AnalysisSnapshot::stopped());
    }

    #[test]
    fn test_short_frames_leave_state_untouched() {
        let capture = synthetic_capture(440.0);
        capture.start(Some(44100), 100).unwrap();
        thread::sleep(Duration::from_millis(30));

        let snap = capture.state().snapshot();
        assert_eq!(*snap, AnalysisSnapshot::awaiting_signal(44100, 512));
        assert!(!snap.has_signal());
        capture.stop();
    }

    #[test]
    fn test_toggle_command() {
        let capture = synthetic_capture(440.0);
        assert_eq!(capture.apply(CaptureCommand::Toggle).unwrap(), SessionState::Listening);
        assert!(capture.state().is_listening());
        assert_eq!(capture.apply(CaptureCommand::Toggle).unwrap(), SessionState::Stopped);
        assert!(!capture.state().is_listening());
        assert_eq!(capture.apply(CaptureCommand::Stop).unwrap(), SessionState::Stopped);
    }

    #[test]
    fn test_stop_from_another_thread() {
        let capture = Arc::new(synthetic_capture(440.0));
        capture.start(Some(44100), 512).unwrap();
        wait_for(capture.state(), |s| s.has_signal());

        let remote = Arc::clone(&capture);
        thread::spawn(move || remote.stop()).join().unwrap();
        assert_eq!(*capture.state().snapshot(), AnalysisSnapshot::stopped());
        assert!(capture.stream_format().is_none());
    }

    #[test]
    fn test_lost_stream_stops_session_and_keeps_error() {
        let capture = capture_with(synthetic_backend(440.0).failing_after(10), Config::default());
        capture.start(Some(44100), 512).unwrap();
        wait_until_stopped(&capture);

        assert!(!capture.is_listening());
        assert!(capture.stream_format().is_none());
        assert_eq!(*capture.state().snapshot(), AnalysisSnapshot::stopped());
        match capture.take_error() {
            Some(AnalysisError::StreamFailed(msg)) => assert!(msg.contains("lost")),
            other => panic!("expected StreamFailed, got {:?}", other),
        }
        assert!(capture.take_error().is_none());

        // The dead session is cleaned up and a new one starts.
        capture.start(Some(44100), 512).unwrap();
        wait_until_stopped(&capture);
        assert!(matches!(capture.take_error(), Some(AnalysisError::StreamFailed(_))));
        capture.stop();
        assert!(capture.take_error().is_none());
    }

    #[test]
    fn test_toggle_after_failure_starts_again() {
        let capture = capture_with(synthetic_backend(440.0).failing_after(20), Config::default());
        capture.apply(CaptureCommand::Start).unwrap();
        wait_until_stopped(&capture);
        capture.take_error();

        let phase = capture.apply(CaptureCommand::Toggle).unwrap();
        assert_ne!(phase, SessionState::Starting);
        capture.stop();
        assert_eq!(capture.session_state(), SessionState::Stopped);
    }

    #[test]
    fn test_fatal_analyzer_error_ends_session() {
        let state = AnalysisState::new();
        state.publish(AnalysisSnapshot::awaiting_signal(44100, 512));
        let health = Arc::new(SessionHealth::new());
        health.set_phase(SessionState::Listening);

        let (frames_tx, frames) = crossbeam_channel::bounded(1);
        let (_faults_tx, faults) = crossbeam_channel::bounded(1);
        let (_shutdown_tx, shutdown) = crossbeam_channel::bounded(1);
        frames_tx.send(AudioFrame::mono(vec![0.0; 512], 44100)).unwrap();

        let worker = AnalysisWorker {
            pipeline: FramePipeline::new(MAX_FFT_ORDER + 1, false),
            frames,
            faults,
            shutdown,
            state: Arc::clone(&state),
            health: Arc::clone(&health),
        };
        thread::spawn(move || worker.run()).join().unwrap();

        assert_eq!(health.phase(), SessionState::Stopped);
        assert_eq!(*state.snapshot(), AnalysisSnapshot::stopped());
        assert!(matches!(
            health.take_fault(),
            Some(AnalysisError::InvalidFftOrder(order)) if order == MAX_FFT_ORDER + 1
        ));
    }

    #[test]
    fn test_shutdown_is_not_reported_as_fault() {
        let state = AnalysisState::new();
        let health = Arc::new(SessionHealth::new());
        let (_frames_tx, frames) = crossbeam_channel::bounded::<AudioFrame>(1);
        let (_faults_tx, faults) = crossbeam_channel::bounded(1);
        let (shutdown_tx, shutdown) = crossbeam_channel::bounded(1);
        shutdown_tx.send(()).unwrap();

        let worker = AnalysisWorker {
            pipeline: FramePipeline::new(9, false),
            frames,
            faults,
            shutdown,
            state,
            health: Arc::clone(&health),
        };
        worker.run();
        assert!(health.take_fault().is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected_before_opening_input() {
        let config = Config { fft_order: 70, ..Config::default() };
        let capture = capture_with(synthetic_backend(440.0), config);
        assert!(matches!(capture.start_default(), Err(AnalysisError::InvalidFftOrder(70))));
        assert_eq!(capture.session_state(), SessionState::Stopped);
        assert_eq!(*capture.state().snapshot(), AnalysisSnapshot::stopped());

        let capture = synthetic_capture(440.0);
        assert!(matches!(capture.start(None, 0), Err(AnalysisError::InvalidConfig(_))));
        assert!(capture.stream_format().is_none());
    }

    #[test]
    fn test_pipeline_with_oversized_order_reports_error() {
        let mut pipeline = FramePipeline::new(70, false);
        assert_eq!(pipeline.fft_size(), 0);
        let frame = AudioFrame::mono(vec![0.0; 512], 44100);
        assert!(matches!(pipeline.process(&frame), Err(AnalysisError::InvalidFftOrder(70))));
    }
}
