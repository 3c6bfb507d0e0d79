//! Bandscope CLI - drives the band engine and prints a coarse text spectrum
//!
//! Feeds either a synthetic tone or (with the `capture` feature) the default
//! input device into the engine and renders the band array as a line of
//! block characters at a fixed refresh rate.

use anyhow::Context;
use bandscope::{BandEngine, EngineConfig, SampleWriter};
use clap::Parser;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Parser, Debug)]
#[command(name = "bandscope-cli")]
#[command(about = "Real-time frequency band visualiser", long_about = None)]
struct Cli {
    /// TOML engine configuration (defaults when omitted)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Frequency of the synthetic test tone in Hz
    #[arg(short, long, default_value_t = 1000.0)]
    tone: f32,

    /// Sweep the tone up to this frequency over the run
    #[arg(long)]
    sweep_to: Option<f32>,

    /// Capture from the default input device instead of a synthetic tone
    #[cfg(feature = "capture")]
    #[arg(long)]
    capture: bool,

    /// Run time in seconds
    #[arg(short, long, default_value_t = 5.0)]
    duration: f32,

    /// Number of text columns in the rendering
    #[arg(long, default_value_t = 64)]
    columns: usize,

    /// Renders per second
    #[arg(long, default_value_t = 10)]
    refresh: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    #[cfg_attr(not(feature = "capture"), allow(unused_mut))]
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    #[cfg(feature = "capture")]
    if args.capture {
        let device = bandscope::audio::AudioInput::probe_default_device()?;
        config.sample_rate = device.sample_rate as f32;
        config.channels = usize::from(device.channels);
    }

    let sample_rate = config.sample_rate;
    let channels = config.channels;
    let (mut engine, writer) = BandEngine::new(config)?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut feeder: Option<JoinHandle<()>> = None;

    #[cfg(feature = "capture")]
    let mut _input = None;

    #[cfg(feature = "capture")]
    let use_capture = args.capture;
    #[cfg(not(feature = "capture"))]
    let use_capture = false;

    if use_capture {
        #[cfg(feature = "capture")]
        {
            let input = bandscope::audio::AudioInput::from_default_device(writer)?;
            input.start()?;
            _input = Some(input);
        }
    } else {
        let tone = ToneSource {
            start_hz: args.tone,
            end_hz: args.sweep_to.unwrap_or(args.tone),
            sweep_secs: args.duration.max(0.1),
            sample_rate,
            channels,
        };
        feeder = Some(spawn_feeder(tone, writer, Arc::clone(&stop))?);
    }

    engine.start()?;

    let reader = engine.reader();
    let mut bands = vec![0.0; reader.band_count()];
    let frame_time = Duration::from_secs_f32(1.0 / args.refresh.max(1) as f32);
    let deadline = Instant::now() + Duration::from_secs_f32(args.duration.max(0.0));

    while Instant::now() < deadline {
        std::thread::sleep(frame_time);
        reader.get_frequencies(&mut bands)?;
        println!("{}", render(&bands, args.columns));
    }

    stop.store(true, Ordering::Release);
    if let Some(handle) = feeder {
        let _ = handle.join();
    }
    engine.stop()?;

    let stats = engine.stats();
    tracing::info!(
        "{} cycles: {} published, {} underruns, {} stale, {} overruns",
        stats.cycles,
        stats.published,
        stats.underruns,
        stats.stale,
        stats.overruns
    );
    Ok(())
}

/// Sine (optionally swept) written in real time
struct ToneSource {
    start_hz: f32,
    end_hz: f32,
    sweep_secs: f32,
    sample_rate: f32,
    channels: usize,
}

fn spawn_feeder(
    tone: ToneSource,
    mut writer: SampleWriter,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("bandscope-tone".into())
        .spawn(move || {
            const BLOCK: usize = 256;
            let block_time = Duration::from_secs_f32(BLOCK as f32 / tone.sample_rate);
            let mut phase = 0.0f32;
            let mut elapsed = 0.0f32;
            let mut buffer = vec![0.0f32; BLOCK * tone.channels];

            while !stop.load(Ordering::Acquire) {
                let t = (elapsed / tone.sweep_secs).min(1.0);
                let freq = tone.start_hz + (tone.end_hz - tone.start_hz) * t;
                let step = 2.0 * PI * freq / tone.sample_rate;

                for frame in buffer.chunks_mut(tone.channels) {
                    frame.fill(0.5 * phase.sin());
                    phase = (phase + step) % (2.0 * PI);
                }
                writer.write_interleaved(&buffer);

                elapsed += block_time.as_secs_f32();
                std::thread::sleep(block_time);
            }
        })
        .context("spawning tone generator")?;
    Ok(handle)
}

/// Collapse the band array into `columns` cells, each showing its loudest band
fn render(bands: &[f32], columns: usize) -> String {
    let columns = columns.clamp(1, bands.len().max(1));
    (0..columns)
        .map(|c| {
            let start = c * bands.len() / columns;
            let end = ((c + 1) * bands.len() / columns).max(start + 1);
            let peak = bands[start..end.min(bands.len())]
                .iter()
                .fold(0.0f32, |acc, &v| acc.max(v));
            let level = (peak.clamp(0.0, 1.0) * (BLOCKS.len() - 1) as f32).round() as usize;
            BLOCKS[level]
        })
        .collect()
}
