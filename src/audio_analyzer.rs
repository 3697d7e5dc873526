use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};

use synesthesia::audio::{FramePipeline, WavSource};
use synesthesia::{AnalysisError, Config};

/// Runs a WAV file through the live analysis pipeline and writes per-frame
/// results as JSON.
#[derive(Parser)]
#[command(name = "synesthesia-audio-analyzer")]
struct Args {
    /// WAV file to analyze
    audio_file: String,

    /// Output JSON file path
    #[arg(long, short, default_value = "analysis_results.json")]
    output: String,

    /// log2 of the FFT size; also the frame size
    #[arg(long, default_value = "9")]
    fft_order: u32,

    /// Only keep the lower half of the spectrum
    #[arg(long)]
    truncate_half: bool,

    /// Include the full spectrum of every frame
    #[arg(long)]
    with_spectrum: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct FrameRecord {
    index: usize,
    time_s: f32,
    peak_amplitude: f32,
    peak_magnitude: f32,
    peak_frequency_hz: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    spectrum: Option<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Summary {
    file: String,
    sample_rate: u32,
    channels: usize,
    duration_seconds: f32,
    fft_size: usize,
    max_frequency_hz: f32,
    frames_analyzed: usize,
    frames_skipped: usize,
    loudest_amplitude: f32,
    strongest_frequency_hz: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnalysisResults {
    summary: Summary,
    frames: Vec<FrameRecord>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config {
        fft_order: args.fft_order,
        truncate_to_half: args.truncate_half,
        ..Config::default()
    };
    config.validate()?;

    let source = WavSource::open(&args.audio_file)?;
    let fft_size = config.fft_size();
    let mut pipeline = FramePipeline::from_config(&config);
    let frame_secs = fft_size as f32 / source.sample_rate().max(1) as f32;

    let mut frames = Vec::new();
    let mut skipped = 0;
    let mut max_frequency_hz = 0.0;
    let mut strongest = (0.0f32, 0.0f32);
    let mut loudest = 0.0f32;

    for (index, frame) in source.frames(fft_size).enumerate() {
        let snapshot = match pipeline.process(&frame) {
            Ok(snapshot) => snapshot,
            Err(AnalysisError::InsufficientSamples { available, .. }) => {
                debug!("Skipping trailing frame {} ({} samples)", index, available);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        max_frequency_hz = snapshot.max_frequency_hz;
        loudest = loudest.max(snapshot.peak_amplitude);
        if snapshot.peak_magnitude > strongest.0 {
            strongest = (snapshot.peak_magnitude, snapshot.peak_frequency_hz);
        }

        frames.push(FrameRecord {
            index,
            time_s: index as f32 * frame_secs,
            peak_amplitude: snapshot.peak_amplitude,
            peak_magnitude: snapshot.peak_magnitude,
            peak_frequency_hz: snapshot.peak_frequency_hz,
            spectrum: args.with_spectrum.then(|| snapshot.spectrum.clone()),
        });
    }

    let results = AnalysisResults {
        summary: Summary {
            file: args.audio_file.clone(),
            sample_rate: source.sample_rate(),
            channels: source.channels(),
            duration_seconds: source.duration_secs(),
            fft_size,
            max_frequency_hz,
            frames_analyzed: frames.len(),
            frames_skipped: skipped,
            loudest_amplitude: loudest,
            strongest_frequency_hz: strongest.1,
        },
        frames,
    };

    let mut writer = BufWriter::new(File::create(&args.output)?);
    serde_json::to_writer_pretty(&mut writer, &results)?;
    writer.flush()?;

    info!(
        "Analyzed {} frame(s) of {}, strongest peak at {:.1} Hz; results written to {}",
        results.summary.frames_analyzed,
        args.audio_file,
        results.summary.strongest_frequency_hz,
        args.output
    );
    Ok(())
}
