//! Micro Features CLI - extract frontend features from WAV files

use anyhow::{bail, Context, Result};
use clap::Parser;
use micro_frontend::{Frontend, FrontendConfig};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ENV_PREFIX: &str = "MICRO_FEATURES";

#[derive(Debug, Parser)]
#[command(name = "micro-features")]
#[command(about = "Compute micro speech features for 16 kHz mono WAV files", version)]
struct Args {
    /// Frontend configuration file (TOML, JSON, YAML, ...)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Print raw 16-bit values instead of scaled floats
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Input WAV files
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// Logs go to stderr so stdout stays a clean JSON-lines stream
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.context("Failed to set tracing subscriber")
}

/// Defaults, then the optional file, then `MICRO_FEATURES_*` variables
fn load_config(path: Option<&Path>) -> Result<FrontendConfig> {
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&FrontendConfig::default())?);
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .context("Failed to load configuration")?
        .try_deserialize()
        .context("Invalid frontend configuration")
}

fn read_wav(path: &Path, config: &FrontendConfig) -> Result<Vec<i16>> {
    let reader = hound::WavReader::open(path).with_context(|| format!("open {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1
        || spec.sample_rate != config.sample_rate
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        bail!(
            "{}: expected {} Hz 16-bit mono PCM, got {} Hz {}-bit {} channel(s)",
            path.display(),
            config.sample_rate,
            spec.sample_rate,
            spec.bits_per_sample,
            spec.channels
        );
    }

    reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("decode {}", path.display()))
}

#[derive(Serialize)]
struct FrameRecord<'a, T> {
    file: &'a str,
    frame: usize,
    features: T,
}

/// Feed whole steps of `samples` and return the produced frames
fn extract(frontend: &mut Frontend, samples: &[i16]) -> Result<Vec<Vec<u16>>> {
    let mut frames = Vec::new();
    for chunk in samples.chunks_exact(frontend.step_size()) {
        let output = frontend.process_samples(chunk)?;
        if !output.is_empty() {
            frames.push(output.values);
        }
    }
    Ok(frames)
}

fn run(args: &Args, out: &mut impl Write) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let mut frontend = Frontend::new(config).context("Failed to build frontend")?;
    debug!(?config, "Loaded frontend configuration");

    for path in &args.files {
        let samples = read_wav(path, &config)?;
        frontend.reset();
        let frames = extract(&mut frontend, &samples)?;

        let file = path.to_string_lossy();
        for (frame, values) in frames.iter().enumerate() {
            let line = if args.raw {
                serde_json::to_string(&FrameRecord {
                    file: &file,
                    frame,
                    features: values,
                })?
            } else {
                let features: Vec<f64> = values
                    .iter()
                    .map(|&v| f64::from(f32::from(v) * micro_frontend::FEATURE_SCALE))
                    .collect();
                serde_json::to_string(&FrameRecord {
                    file: &file,
                    frame,
                    features,
                })?
            };
            writeln!(out, "{line}")?;
        }

        info!(
            file = %file,
            chunks = samples.len() / frontend.step_size(),
            frames = frames.len(),
            "Processed file"
        );
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    info!("=== micro-features v{} ===", env!("CARGO_PKG_VERSION"));
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    run(&args, &mut out)
}
