//! Pareq CLI Application
//!
//! Runs offline equalizer sessions: `analyze` pushes a synthesized tone
//! through the filter chain and the spectrum analyzer, `response` prints the
//! chain's frequency response.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pareq_core::domain::audio::Channel;
use pareq_core::domain::config::EqConfig;
use pareq_core::domain::response::{Rect, ResponseCurve};
use pareq_core::domain::settings::{ParamId, ParameterTree};
use pareq_infra::audio::{EqProcessor, EqSession, PollingContext};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "pareq")]
#[command(about = "Three-band parametric equalizer with spectrum analysis", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a test tone through a session and report the spectrum peak
    Analyze {
        /// Tone frequency in Hz
        #[arg(long, default_value_t = 1000.0)]
        frequency: f32,

        /// Tone amplitude (linear, 0..1)
        #[arg(long, default_value_t = 0.5)]
        amplitude: f32,

        /// Length of the rendered tone in seconds
        #[arg(long, default_value_t = 1.0)]
        duration: f64,

        /// Samples per host callback
        #[arg(long, default_value_t = 480)]
        host_block: usize,

        #[command(flatten)]
        chain: ChainArgs,
    },
    /// Print the filter chain's frequency response as JSON
    Response {
        /// Number of log-spaced points between 20 Hz and 20 kHz
        #[arg(long, default_value_t = 200)]
        points: usize,

        #[command(flatten)]
        chain: ChainArgs,
    },
}

/// Filter settings applied to the parameter store before the session starts
#[derive(Args)]
struct ChainArgs {
    /// Peak centre frequency in Hz
    #[arg(long)]
    peak_freq: Option<f32>,

    /// Peak gain in dB
    #[arg(long, allow_hyphen_values = true)]
    peak_gain: Option<f32>,

    /// Peak quality (Q)
    #[arg(long)]
    peak_q: Option<f32>,

    /// Low-cut frequency in Hz
    #[arg(long)]
    low_cut: Option<f32>,

    /// High-cut frequency in Hz
    #[arg(long)]
    high_cut: Option<f32>,

    /// Low-cut slope in dB/oct (12, 24, 36 or 48)
    #[arg(long, value_parser = parse_slope)]
    low_slope: Option<f32>,

    /// High-cut slope in dB/oct (12, 24, 36 or 48)
    #[arg(long, value_parser = parse_slope)]
    high_slope: Option<f32>,

    #[arg(long)]
    bypass_low: bool,

    #[arg(long)]
    bypass_peak: bool,

    #[arg(long)]
    bypass_high: bool,
}

/// Map a dB/oct value to its slope parameter index
fn parse_slope(value: &str) -> std::result::Result<f32, String> {
    match value.trim_end_matches("dB").trim() {
        "12" => Ok(0.0),
        "24" => Ok(1.0),
        "36" => Ok(2.0),
        "48" => Ok(3.0),
        other => Err(format!("unsupported slope {other}, expected 12, 24, 36 or 48")),
    }
}

impl ChainArgs {
    fn apply(&self, tree: &ParameterTree) {
        let values = [
            (ParamId::PeakFreq, self.peak_freq),
            (ParamId::PeakGain, self.peak_gain),
            (ParamId::PeakQuality, self.peak_q),
            (ParamId::LowCutFreq, self.low_cut),
            (ParamId::HighCutFreq, self.high_cut),
            (ParamId::LowCutSlope, self.low_slope),
            (ParamId::HighCutSlope, self.high_slope),
        ];
        for (id, value) in values.into_iter().filter_map(|(id, v)| v.map(|v| (id, v))) {
            tree.set_value(id, value);
        }

        tree.set_bool(ParamId::LowCutBypassed, self.bypass_low);
        tree.set_bool(ParamId::PeakBypassed, self.bypass_peak);
        tree.set_bool(ParamId::HighCutBypassed, self.bypass_high);
    }
}

#[derive(Serialize)]
struct ChannelReport {
    channel: &'static str,
    peak_frequency_hz: Option<f64>,
    dropped_blocks: usize,
}

#[derive(Serialize)]
struct AnalyzeReport {
    sample_rate: u32,
    fft_size: usize,
    tone_hz: f32,
    ticks: usize,
    chain_generation: u64,
    channels: Vec<ChannelReport>,
}

#[derive(Serialize)]
struct ResponseReport<'a> {
    sample_rate: u32,
    chain_generation: u64,
    curve: &'a ResponseCurve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_ref()).await?;

    match cli.command {
        Commands::Analyze {
            frequency,
            amplitude,
            duration,
            host_block,
            chain,
        } => run_analyze(&config, &chain, frequency, amplitude, duration, host_block),
        Commands::Response { points, chain } => run_response(&config, &chain, points),
    }
}

/// Explicit paths must load; the default location falls back to defaults
async fn load_config(path: Option<&PathBuf>) -> Result<EqConfig> {
    match path {
        Some(path) => EqConfig::load_from_file(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => match dirs::config_dir() {
            Some(dir) => Ok(EqConfig::load_or_default(dir.join("pareq").join("config.toml")).await),
            None => {
                debug!("No user config directory, using defaults");
                Ok(EqConfig::default())
            }
        },
    }
}

fn prepare(config: &EqConfig, chain: &ChainArgs) -> Result<(EqProcessor, PollingContext)> {
    let tree = Arc::new(ParameterTree::new());
    chain.apply(&tree);
    let session = EqSession::prepare(config, tree, f64::from(config.audio.sample_rate))
        .context("failed to prepare session")?;
    Ok(session)
}

fn run_analyze(
    config: &EqConfig,
    chain: &ChainArgs,
    frequency: f32,
    amplitude: f32,
    duration: f64,
    host_block: usize,
) -> Result<()> {
    let (mut processor, mut polling) = prepare(config, chain)?;
    let sample_rate = f64::from(config.audio.sample_rate);
    let bounds = Rect::new(0.0, 0.0, 600.0, 240.0);

    let total_samples = (duration.max(0.0) * sample_rate) as usize;
    let host_block = host_block.max(1);
    let samples_per_tick = (sample_rate / f64::from(config.polling.rate_hz)).max(1.0) as usize;
    info!(
        frequency,
        total_samples,
        host_block,
        samples_per_tick,
        "Rendering test tone"
    );

    let phase_step = 2.0 * std::f64::consts::PI * f64::from(frequency) / sample_rate;
    let mut left = vec![0.0f32; host_block];
    let mut right = vec![0.0f32; host_block];
    let mut rendered = 0usize;
    let mut since_tick = 0usize;
    let mut ticks = 0usize;

    polling.tick(bounds);
    ticks += 1;
    while rendered < total_samples {
        let len = host_block.min(total_samples - rendered);
        for (i, (l, r)) in left[..len].iter_mut().zip(right[..len].iter_mut()).enumerate() {
            let sample = amplitude * ((rendered + i) as f64 * phase_step).sin() as f32;
            *l = sample;
            *r = sample;
        }
        processor.ingest_stereo(&mut left[..len], &mut right[..len], sample_rate);

        rendered += len;
        since_tick += len;
        if since_tick >= samples_per_tick {
            polling.tick(bounds);
            since_tick -= samples_per_tick;
            ticks += 1;
        }
    }
    polling.tick(bounds);
    ticks += 1;

    let report = AnalyzeReport {
        sample_rate: config.audio.sample_rate,
        fft_size: config.analyzer.fft_order.size(),
        tone_hz: frequency,
        ticks,
        chain_generation: polling.engine().generation(),
        channels: Channel::ALL
            .iter()
            .map(|&channel| ChannelReport {
                channel: channel.name(),
                peak_frequency_hz: polling.peak_frequency(channel),
                dropped_blocks: processor.accumulator(channel).dropped_count(),
            })
            .collect(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_response(config: &EqConfig, chain: &ChainArgs, points: usize) -> Result<()> {
    let (_processor, mut polling) = prepare(config, chain)?;
    polling.tick(Rect::new(0.0, 0.0, points as f32, 1.0));

    let chain_generation = polling.engine().generation();
    let report = ResponseReport {
        sample_rate: config.audio.sample_rate,
        chain_generation,
        curve: polling.response_curve(points),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
