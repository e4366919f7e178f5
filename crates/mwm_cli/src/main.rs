use std::f64::consts::PI;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};
use mwm_core::{
    CacheStore, Component, FileStore, MemoryStore, ModeLabel, Provenance, SampleQuality, SampleSet,
    Samples, Sequential, SweepExecutor, ThreadPool, WaveguideConfig,
};

#[derive(Parser, Debug)]
#[command(name = "mwm", about = "Metallic waveguide mode dispersion sampler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Log progress (repeat for debug output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute (or load from cache) the samples for a configuration
    Compute(CommonArgs),
    /// Evaluate the interpolated propagation constant of one mode
    Query {
        #[command(flatten)]
        common: CommonArgs,
        /// Mode label, e.g. "M,0,1"
        #[arg(short, long)]
        label: String,
        /// Vacuum wavelength in µm
        #[arg(short, long)]
        wavelength: f64,
        /// Imaginary part of the angular frequency (µm⁻¹, <= 0)
        #[arg(long, default_value_t = 0.0)]
        imag: f64,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: PathBuf,
    /// Worker threads (1 runs sweeps on the main thread)
    #[arg(short, long, default_value_t = 2)]
    threads: usize,
    /// Cache directory (defaults to ~/.mwm)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Compute without reading or writing the on-disk cache
    #[arg(long)]
    no_cache: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(level).init();

    match cli.command {
        Command::Compute(common) => {
            let config = load_config(&common)?;
            let (samples, set, provenance) = obtain(&common, &config)?;
            print_summary(&samples, &set, provenance);
        }
        Command::Query {
            common,
            label,
            wavelength,
            imag,
        } => {
            let label: ModeLabel = label.parse().context("Failed to parse mode label")?;
            if !(wavelength > 0.0) {
                anyhow::bail!("wavelength must be positive, got {}", wavelength);
            }
            let config = load_config(&common)?;
            let (samples, set, _) = obtain(&common, &config)?;
            let funcs = samples
                .interpolation(&set, &config.interpolation_bounds())
                .context("Failed to build interpolation")?;
            let wr = 2.0 * PI / wavelength;
            let beta = funcs
                .beta_at(label, wr, imag)
                .with_context(|| format!("Failed to evaluate {} at w = {} + {}i", label, wr, imag))?;
            let quality = funcs.get(label, Component::Real)?.quality(wr, imag)?;
            println!("{} w = {:.8} {:+.8}i", label, wr, imag);
            println!("beta = {:.8} {:+.8}i", beta.re, beta.im);
            if quality == SampleQuality::Reconstructed {
                println!("note: nearby samples did not converge; value is reconstructed");
            }
        }
    }
    Ok(())
}

fn load_config(common: &CommonArgs) -> Result<WaveguideConfig> {
    WaveguideConfig::from_path(&common.config)
        .with_context(|| format!("Failed to load config {}", common.config.display()))
}

fn obtain(common: &CommonArgs, config: &WaveguideConfig) -> Result<(Samples, SampleSet, Provenance)> {
    let samples = Samples::from_config(config).context("Failed to set up samples")?;
    info!("configuration key {}", samples.key());

    let executor: Box<dyn SweepExecutor> = if common.threads <= 1 {
        Box::new(Sequential)
    } else {
        Box::new(ThreadPool::new(common.threads).context("Failed to start worker pool")?)
    };
    let store: Box<dyn CacheStore> = if common.no_cache {
        Box::new(MemoryStore::new())
    } else {
        match &common.cache_dir {
            Some(dir) => Box::new(FileStore::new(dir)),
            None => Box::new(FileStore::at_default_root()?),
        }
    };

    let (set, provenance) = samples
        .compute_or_load(store.as_ref(), executor.as_ref())
        .context("Failed to obtain samples")?;
    Ok((samples, set, provenance))
}

fn print_summary(samples: &Samples, set: &SampleSet, provenance: Provenance) {
    let (rows, cols) = samples.grid().shape();
    println!("{} ({}, {} x {} grid)", samples.key(), provenance, rows, cols);
    for label in set.labels() {
        let convs = &set.convs[label];
        let converged = convs.iter().filter(|&&ok| ok).count();
        let beta = set.betas[label][(0, 0)];
        println!(
            "  {}  beta(ws[0]) = {:.8} {:+.8}i  converged {}/{}",
            label,
            beta.re,
            beta.im,
            converged,
            convs.len()
        );
    }
}
