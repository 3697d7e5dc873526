//! Consumer side of the analysis state: a fixed-rate render tick and a
//! terminal spectrum view. Neither ever writes to the shared state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::{AnalysisSnapshot, AnalysisState};

/// Fixed-period ticker driving the render loop.
pub struct RenderClock {
    period: Duration,
    started: Instant,
    last_tick: Option<Instant>,
    next_deadline: Instant,
}

/// What the renderer gets every tick.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    /// Monotonic seconds since the clock started.
    pub elapsed: f64,
    /// Frame rate measured from the gap to the previous tick.
    pub measured_fps: f64,
    pub index: u64,
}

impl RenderClock {
    pub fn new(desired_framerate: f64) -> Self {
        let period = if desired_framerate.is_finite() && desired_framerate > 0.0 {
            Duration::from_secs_f64(1.0 / desired_framerate)
        } else {
            Duration::from_secs_f64(1.0 / 30.0)
        };
        Self::with_period(period)
    }

    pub fn with_period(period: Duration) -> Self {
        let now = Instant::now();
        Self { period, started: now, last_tick: None, next_deadline: now }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Sleeps until the next deadline and returns the tick. Late ticks are
    /// not made up; the schedule restarts from now.
    pub fn wait(&mut self, index: u64) -> Tick {
        let now = Instant::now();
        if self.next_deadline > now {
            thread::sleep(self.next_deadline - now);
        }

        let now = Instant::now();
        self.next_deadline = if now > self.next_deadline + self.period {
            now + self.period
        } else {
            self.next_deadline + self.period
        };

        let measured_fps = match self.last_tick.replace(now) {
            Some(prev) => {
                let gap = (now - prev).as_secs_f64();
                if gap > 0.0 { 1.0 / gap } else { 0.0 }
            }
            None => 0.0,
        };

        Tick {
            elapsed: (now - self.started).as_secs_f64(),
            measured_fps,
            index,
        }
    }
}

/// Calls `draw` once per tick with whatever snapshot is published, until
/// `running` is cleared. Returns the number of ticks rendered.
pub fn run_render_loop<F>(
    state: &AnalysisState,
    clock: &mut RenderClock,
    running: &Arc<AtomicBool>,
    mut draw: F,
) -> u64
where
    F: FnMut(&AnalysisSnapshot, Tick),
{
    let mut index = 0;
    while running.load(Ordering::SeqCst) {
        let tick = clock.wait(index);
        let snapshot = state.snapshot();
        draw(&snapshot, tick);
        index += 1;
    }
    index
}

/// Maps a snapshot onto a row of bars for a text display.
///
/// Bars are rescaled by the snapshot's peak magnitude, which is a display
/// choice; the published spectrum itself is only scaled by `1/N`.
#[derive(Debug, Clone)]
pub struct SpectrumView {
    pub bars: usize,
}

const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

impl SpectrumView {
    pub fn new(bars: usize) -> Self {
        Self { bars: bars.max(1) }
    }

    /// Spectrum rescaled into [0, 1] by the peak magnitude. All zeros when
    /// there is no peak.
    pub fn normalized(snapshot: &AnalysisSnapshot) -> Vec<f32> {
        let peak = snapshot.peak_magnitude;
        if !(peak.is_finite() && peak > 0.0) {
            return vec![0.0; snapshot.spectrum.len()];
        }
        snapshot
            .spectrum
            .iter()
            .map(|&v| (v / peak).clamp(0.0, 1.0))
            .collect()
    }

    /// `bars` levels, each the max of its slice of the normalized spectrum.
    pub fn levels(&self, snapshot: &AnalysisSnapshot) -> Vec<f32> {
        let normalized = Self::normalized(snapshot);
        if normalized.is_empty() {
            return vec![0.0; self.bars];
        }
        (0..self.bars)
            .map(|bar| {
                let start = bar * normalized.len() / self.bars;
                let end = ((bar + 1) * normalized.len() / self.bars)
                    .max(start + 1)
                    .min(normalized.len());
                normalized[start.min(end - 1)..end].iter().copied().fold(0.0f32, f32::max)
            })
            .collect()
    }

    pub fn render_bars(&self, snapshot: &AnalysisSnapshot) -> String {
        self.levels(snapshot)
            .into_iter()
            .map(|level| LEVELS[(level * (LEVELS.len() - 1) as f32).round() as usize])
            .collect()
    }

    pub fn render_stats(snapshot: &AnalysisSnapshot, tick: Tick) -> String {
        if snapshot.is_stopped() {
            return format!("stopped | {:6.2} fps", tick.measured_fps);
        }
        if !snapshot.has_signal() {
            return format!("listening, waiting for signal | {:6.2} fps", tick.measured_fps);
        }
        format!(
            "peak {:8.1} Hz | mag {:.4} | amp {:.3} | max {:7.1} Hz | {:6.2} fps",
            snapshot.peak_frequency_hz,
            snapshot.peak_magnitude,
            snapshot.peak_amplitude,
            snapshot.max_frequency_hz,
            tick.measured_fps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(spectrum: Vec<f32>, peak: f32) -> AnalysisSnapshot {
        AnalysisSnapshot {
            spectrum,
            peak_magnitude: peak,
            listening: true,
            frames_analyzed: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_clock_period_from_framerate() {
        let clock = RenderClock::new(30.0);
        assert!((clock.period().as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);
        let fallback = RenderClock::new(0.0);
        assert_eq!(fallback.period(), clock.period());
    }

    #[test]
    fn test_clock_ticks_are_monotonic() {
        let mut clock = RenderClock::with_period(Duration::from_millis(2));
        let a = clock.wait(0);
        let b = clock.wait(1);
        let c = clock.wait(2);
        assert!(a.elapsed <= b.elapsed && b.elapsed <= c.elapsed);
        assert_eq!(a.measured_fps, 0.0);
        assert!(c.measured_fps > 0.0);
    }

    #[test]
    fn test_normalized_guards_zero_peak() {
        let silent = snapshot(vec![0.0; 4], 0.0);
        assert_eq!(SpectrumView::normalized(&silent), vec![0.0; 4]);

        let loud = snapshot(vec![0.1, 0.4, 0.2, 0.0], 0.4);
        let n = SpectrumView::normalized(&loud);
        assert_eq!(n[1], 1.0);
        assert!((n[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_levels_downsample_by_max() {
        let view = SpectrumView::new(2);
        let snap = snapshot(vec![0.1, 0.4, 0.2, 0.0], 0.4);
        assert_eq!(view.levels(&snap), vec![1.0, 0.5]);
        assert_eq!(view.render_bars(&snap).chars().count(), 2);
    }

    #[test]
    fn test_more_bars_than_bins() {
        let view = SpectrumView::new(8);
        let snap = snapshot(vec![0.5, 1.0], 1.0);
        let levels = view.levels(&snap);
        assert_eq!(levels.len(), 8);
        assert!(levels.iter().all(|&l| (0.0..=1.0).contains(&l)));
    }

    #[test]
    fn test_stats_distinguish_stopped_and_waiting() {
        let tick = Tick { elapsed: 0.0, measured_fps: 30.0, index: 0 };
        let stopped = SpectrumView::render_stats(&AnalysisSnapshot::stopped(), tick);
        assert!(stopped.starts_with("stopped"));
        let waiting = AnalysisSnapshot::awaiting_signal(44100, 512);
        assert!(SpectrumView::render_stats(&waiting, tick).contains("waiting"));
    }

    #[test]
    fn test_render_loop_reads_latest_snapshot() {
        let state = AnalysisState::new();
        state.publish(snapshot(vec![1.0; 8], 1.0));
        let running = Arc::new(AtomicBool::new(true));
        let mut clock = RenderClock::with_period(Duration::from_millis(1));

        let flag = Arc::clone(&running);
        let ticks = run_render_loop(&state, &mut clock, &running, |snap, tick| {
            assert_eq!(snap.spectrum.len(), 8);
            if tick.index == 4 {
                flag.store(false, Ordering::SeqCst);
            }
        });
        assert_eq!(ticks, 5);
    }
}
