//! Headless tick loop over a synthetic instrument
//!
//! Drives the pipeline the way the viewer does and prints one line per tick.
//! Useful for tuning detection and demo bands without hardware attached.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mring::trace::{Instrument, Resonance, SyntheticSweep};
use mring::{Pipeline, PipelineConfig, TickOutput};

#[derive(Parser, Debug)]
#[command(
    name = "mring-replay",
    about = "Run the resonance tracking pipeline against a synthetic sweep source"
)]
struct Cli {
    /// Configuration file (defaults to the nearest mring.toml, then built-in values)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// Ticks the resonance dwells on each frequency before hopping
    #[arg(long, default_value_t = 10)]
    dwell: u64,

    /// Calibrate before the first tick
    #[arg(long)]
    calibrate: bool,

    /// Emit one JSON object per tick instead of text
    #[arg(long)]
    json: bool,

    /// Noise amplitude in dB
    #[arg(long, default_value_t = 0.05)]
    noise: f64,

    /// Seed for the noise generator
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Delay between ticks in milliseconds
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,
}

fn main() -> ExitCode {
    pretty_env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let hops = hop_targets(&config);

    let source = SyntheticSweep::new(config.sweep, -20.0)
        .with_tilt(-1.5)
        .with_noise(cli.noise, cli.seed)
        .with_resonance(Resonance::new(hops[0], 3.0, 0.02));
    let mut instrument = Instrument::new(source);

    let mut pipeline = Pipeline::new(config).context("invalid configuration")?;

    if cli.calibrate {
        let baseline = instrument
            .calibrate(pipeline.config().calibration.ave_num, &pipeline.shared_baseline())
            .context("calibration failed")?;
        log::info!(
            "Calibrated on {} sweeps at {:.1} sweeps/s",
            baseline.sweeps(),
            baseline.sampling_rate()
        );
    }

    let dwell = cli.dwell.max(1);
    for tick in 0..cli.ticks {
        let center = hops[((tick / dwell) as usize) % hops.len()];
        {
            let mut guard = instrument.exclusive()?;
            if let Some(resonance) = guard.resonances_mut().first_mut() {
                resonance.center = center;
            }
        }

        match pipeline.tick(&mut instrument) {
            Ok(out) => report(tick, &out, cli.json)?,
            Err(e) => log::warn!("Tick {} failed: {}", tick, e),
        }

        if cli.interval_ms > 0 {
            thread::sleep(Duration::from_millis(cli.interval_ms));
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(Some(path))
            .with_context(|| format!("failed to load {}", path.display())),
        None => PipelineConfig::discover().context("failed to load configuration"),
    }
}

/// Band targets when demo bands exist, otherwise quarter points of the window
fn hop_targets(config: &PipelineConfig) -> Vec<f64> {
    if !config.demo.bands.is_empty() {
        return config.demo.bands.iter().map(|b| b.target_freq).collect();
    }

    let freqs = config.sweep.frequencies();
    let window = config.detection_window();
    [1, 2, 3]
        .iter()
        .filter_map(|q| freqs.get(window.lo + window.len() * q / 4).copied())
        .chain(std::iter::once(config.sweep.start_freq))
        .collect()
}

fn report(tick: u64, out: &TickOutput, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(out)?);
        return Ok(());
    }

    let band = out
        .active_band
        .map_or_else(|| "-".to_string(), |b| b.to_string());
    println!(
        "{:>5}  fps {:>8.1}  peak {:>8.3} MHz  -> {:>8.3} MHz  band {:>2}  {}",
        tick,
        out.frame.sampling_rate,
        out.peak,
        out.quantized,
        band,
        out.frame.peak_log()
    );
    Ok(())
}
