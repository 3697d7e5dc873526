use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use synesthesia::audio::{CpalBackend, InputBackend, SyntheticBackend};
use synesthesia::render::{run_render_loop, RenderClock, SpectrumView};
use synesthesia::{AnalysisState, AudioCapture, CaptureCommand, Config};

#[derive(Parser)]
#[command(name = "synesthesia")]
#[command(
    about = "Live microphone spectrum in the terminal. Enter toggles listening, q + Enter quits."
)]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// log2 of the FFT size (8 = 256, 9 = 512, 10 = 1024)
    #[arg(long)]
    fft_order: Option<u32>,

    /// Requested input sample rate (device default if omitted)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Render ticks per second
    #[arg(long)]
    fps: Option<f64>,

    /// Only keep the lower half of the spectrum
    #[arg(long)]
    truncate_half: bool,

    /// Use a generated sine at this frequency instead of the microphone
    #[arg(long, value_name = "HZ")]
    synthetic: Option<f32>,

    /// Number of spectrum bars to draw
    #[arg(long, default_value = "64")]
    bars: usize,
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(order) = args.fft_order {
        config.fft_order = order;
    }
    if let Some(rate) = args.sample_rate {
        config.sample_rate = Some(rate);
    }
    if let Some(fps) = args.fps {
        config.desired_framerate = fps;
    }
    if args.truncate_half {
        config.truncate_to_half = true;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = build_config(&args)?;
    info!("Starting synesthesia with {:?}", config);

    let backend: Arc<dyn InputBackend> = match args.synthetic {
        Some(freq) => Arc::new(SyntheticBackend::sine(freq, 0.5)),
        None => Arc::new(CpalBackend::new()),
    };

    let state = AnalysisState::new();
    let capture = Arc::new(AudioCapture::new(backend, Arc::clone(&state), config));

    capture.start_default().map_err(|e| {
        anyhow::anyhow!(
            "{}. Check that an input device is connected and that recording is \
             permitted, or run with --synthetic <HZ>.",
            e
        )
    })?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let capture = Arc::clone(&capture);
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().eq_ignore_ascii_case("q") {
                    break;
                }
                match capture.apply(CaptureCommand::Toggle) {
                    Ok(session) => info!("Capture is now {:?}", session),
                    Err(e) => warn!("Toggle failed: {}", e),
                }
            }
            running.store(false, Ordering::SeqCst);
        });
    }

    let view = SpectrumView::new(args.bars);
    let mut clock = RenderClock::new(capture.config().desired_framerate);
    let mut stdout = std::io::stdout();
    let mut failure = None;

    run_render_loop(&state, &mut clock, &running, |snapshot, tick| {
        if let Some(e) = capture.take_error() {
            failure = Some(e);
            running.store(false, Ordering::SeqCst);
            return;
        }
        let _ = write!(
            stdout,
            "\r{} {}\x1b[K",
            view.render_bars(snapshot),
            SpectrumView::render_stats(snapshot, tick)
        );
        let _ = stdout.flush();
    });

    println!();
    capture.stop();
    if let Some(e) = failure {
        return Err(anyhow::anyhow!("{}. Audio input was lost; restart to listen again.", e));
    }
    info!("Exiting after {:.1}s", clock.elapsed());
    Ok(())
}
