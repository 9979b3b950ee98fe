//! photonyield CLI
//!
//! Replays transport step traces through the photon yield pipeline and
//! inspects the resulting per-event datasets.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Args, Parser, Subcommand};

use log::{debug, info, warn};
use photonyield_core::{
    worker_rng, PhotonYieldEstimator, StepPipeline, VolumeKind, VolumeTable, YieldConfig,
};
use photonyield_io::{
    read_photons, read_trace, EventTrace, OutputFormat, RunAggregator, DEFAULT_FLUSH_ROWS,
    DEFAULT_OUTPUT_STEM,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    PhotonIo(#[from] photonyield_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] photonyield_core::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] photonyield_core::ConfigError),

    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Calibration constants, loaded from JSON and overridden per flag.
#[derive(Args, Debug)]
struct CalibrationArgs {
    /// JSON file with `YieldConfig` fields (missing fields keep defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scintillation photons per MeV
    #[arg(long)]
    scintillation_yield: Option<f64>,

    /// Photon collection efficiency [0, 1]
    #[arg(long)]
    collection_efficiency: Option<f64>,

    /// Refractive index of the Cerenkov fibers
    #[arg(long)]
    refractive_index: Option<f64>,

    /// Cerenkov photons per cm at beta = 1
    #[arg(long)]
    cerenkov_constant: Option<f64>,
}

impl CalibrationArgs {
    fn resolve(&self) -> Result<YieldConfig> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => YieldConfig::default(),
        };
        if let Some(v) = self.scintillation_yield {
            config = config.with_scintillation_yield(v);
        }
        if let Some(v) = self.collection_efficiency {
            config = config.with_collection_efficiency(v);
        }
        if let Some(v) = self.refractive_index {
            config = config.with_refractive_index(v);
        }
        if let Some(v) = self.cerenkov_constant {
            config = config.with_cerenkov_constant(v);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Optical photon yield estimation for fiber calorimeters.
#[derive(Parser)]
#[command(name = "photonyield")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a step trace and write one photon row per event
    Replay {
        /// Step trace CSV
        input: PathBuf,

        /// Output dataset (.csv, .bin, .h5)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of parallel workers
        #[arg(short, long, default_value = "1")]
        workers: usize,

        /// Base seed; worker streams are derived from it
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Rows buffered per worker before merging
        #[arg(long, default_value_t = DEFAULT_FLUSH_ROWS)]
        flush_rows: usize,

        #[command(flatten)]
        calibration: CalibrationArgs,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show statistics of a photon dataset
    Info {
        /// Photon dataset
        input: PathBuf,
    },

    /// Evaluate the photon yield of a single step
    Yield {
        /// Deposited energy (MeV)
        #[arg(long, default_value = "0.0")]
        edep: f64,

        /// Particle charge (units of e)
        #[arg(long, default_value = "-1.0", allow_hyphen_values = true)]
        charge: f64,

        /// Momentum magnitude (MeV)
        #[arg(long, default_value = "20000.0")]
        momentum: f64,

        /// Total energy (MeV)
        #[arg(long, default_value = "20000.5")]
        total_energy: f64,

        /// Step length (mm)
        #[arg(long, default_value = "10.0")]
        step_mm: f64,

        /// Seed for the sampled counts
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Number of samples to draw
        #[arg(short, long, default_value = "1")]
        samples: usize,

        #[command(flatten)]
        calibration: CalibrationArgs,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            input,
            output,
            workers,
            seed,
            flush_rows,
            calibration,
            json,
            verbose,
        } => {
            let config = calibration.resolve()?;
            let estimator = PhotonYieldEstimator::new(config)?;
            let output = output.unwrap_or_else(|| {
                PathBuf::from(DEFAULT_OUTPUT_STEM).with_extension(OutputFormat::Csv.extension())
            });
            let workers = workers.max(1);

            if verbose {
                eprintln!("Reading trace: {}", input.display());
                eprintln!("Workers: {}", workers);
                eprintln!("Seed: {}", seed);
                eprintln!("Calibration: {:?}", config);
            }

            let start = Instant::now();
            let events = read_trace(&input)?;
            if verbose {
                eprintln!("  {} events loaded", events.len());
                eprintln!("Writing output to: {}", output.display());
            }

            info!(
                "Replaying {} events from {} across {} worker(s)",
                events.len(),
                input.display(),
                workers
            );
            let run = RunAggregator::new(&output).with_flush_rows(flush_rows);
            run.begin_run()?;

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()?;
            let chunk = events.len().div_ceil(workers).max(1);
            let table = VolumeTable::fiber_default();
            let replayed = pool.install(|| {
                events
                    .par_chunks(chunk)
                    .enumerate()
                    .map(|(worker, events)| {
                        replay_worker(worker, events, &run, estimator, &table, seed)
                    })
                    .collect::<Result<Vec<usize>>>()
            });

            let per_worker = match replayed {
                Ok(counts) => counts,
                Err(e) => {
                    if let Err(close) = run.end_run() {
                        warn!("Could not close {}: {}", output.display(), close);
                    }
                    return Err(e);
                }
            };
            let summary = run.end_run()?;
            let elapsed = start.elapsed();

            if verbose {
                for (worker, count) in per_worker.iter().enumerate() {
                    eprintln!("  worker {}: {} events", worker, count);
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Replayed {} events in {:.2}s",
                    summary.events,
                    elapsed.as_secs_f64()
                );
                println!("Output: {} ({})", summary.path.display(), summary.format);
                println!(
                    "Scintillation photons: {} total, {:.1} per event",
                    summary.scint_total,
                    summary.scint_mean()
                );
                println!(
                    "Cerenkov photons: {} total, {:.1} per event",
                    summary.cerenkov_total,
                    summary.cerenkov_mean()
                );
            }
        }

        Commands::Info { input } => {
            let table = read_photons(&input)?;
            let stats = table.statistics();

            println!("File: {}", input.display());
            println!("Format: {}", OutputFormat::from_path(&input));
            println!("Events: {}", stats.events);
            if !table.is_empty() {
                println!(
                    "ScintPhoton: total {}, mean {:.2}, std {:.2}, max {}",
                    stats.scint_total, stats.scint_mean, stats.scint_std, stats.scint_max
                );
                println!(
                    "CerenkovPhoton: total {}, mean {:.2}, std {:.2}, max {}",
                    stats.cerenkov_total,
                    stats.cerenkov_mean,
                    stats.cerenkov_std,
                    stats.cerenkov_max
                );
            }
            print_calibration(&input)?;
        }

        Commands::Yield {
            edep,
            charge,
            momentum,
            total_energy,
            step_mm,
            seed,
            samples,
            calibration,
        } => {
            let estimator = PhotonYieldEstimator::new(calibration.resolve()?)?;
            let mut rng = worker_rng(seed, 0);

            println!("Scintillation mean: {:.3}", estimator.scintillation_mean(edep));
            match PhotonYieldEstimator::cerenkov_beta(momentum, total_energy) {
                Some(beta) => println!(
                    "Cerenkov: beta {:.6} (threshold {:.6}), {:.3} photons/cm",
                    beta,
                    estimator.beta_threshold(),
                    estimator.cerenkov_density(beta)
                ),
                None => println!("Cerenkov: beta undefined"),
            }
            println!(
                "Cerenkov mean: {:.3}",
                estimator.cerenkov_mean(charge, momentum, total_energy, step_mm)
            );

            for i in 0..samples.max(1) {
                let scint = estimator.scintillation_yield(edep, &mut rng);
                let cerenkov =
                    estimator.cerenkov_yield(charge, momentum, total_energy, step_mm, &mut rng);
                println!("sample {}: ScintPhoton={} CerenkovPhoton={}", i, scint, cerenkov);
            }
        }
    }

    Ok(())
}

/// Drives one worker's share of the trace through its own pipeline.
fn replay_worker(
    worker: usize,
    events: &[EventTrace],
    run: &RunAggregator,
    estimator: PhotonYieldEstimator,
    table: &VolumeTable,
    seed: u64,
) -> Result<usize> {
    let mut pipeline =
        StepPipeline::with_estimator(estimator, table, worker_rng(seed, worker as u64));
    let mut handle = run.worker()?;
    let mut scored = 0usize;

    for event in events {
        pipeline.begin_event();
        for step in &event.steps {
            if pipeline.per_step(&step.as_step_record())? != VolumeKind::None {
                scored += 1;
            }
        }
        handle.record_event(pipeline.end_event()?)?;
    }

    debug!(
        "Worker {} replayed {} events ({} scoring steps)",
        worker,
        events.len(),
        scored
    );
    Ok(handle.end_run()?)
}

#[cfg(feature = "hdf5")]
fn print_calibration(input: &Path) -> Result<()> {
    if OutputFormat::from_path(input) != OutputFormat::Hdf5 {
        return Ok(());
    }
    match photonyield_io::hdf5::read_calibration_hdf5(input)? {
        Some(config) => println!("Calibration: {:?}", config),
        None => info!("No calibration attributes in {}", input.display()),
    }
    Ok(())
}

#[cfg(not(feature = "hdf5"))]
#[allow(clippy::unnecessary_wraps)]
fn print_calibration(input: &Path) -> Result<()> {
    debug!("Calibration attributes not read from {}", input.display());
    Ok(())
}
