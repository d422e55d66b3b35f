//! Ring Escape command line
//!
//! Renders frame sequences, dumps event streams, or runs batches of videos.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use ring_escape::{CancelToken, SimulationConfig, VideoJob, run_batch};

/// Rotating ring ball simulation and frame renderer
#[derive(Parser)]
#[command(name = "ring-escape", version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Simulate and render one video into a frame sequence
    Render {
        /// JSON config file
        #[arg(short, long)]
        config: PathBuf,
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
        /// Render threads
        #[arg(short, long, default_value_t = 1)]
        workers: usize,
        /// Override the config seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run the physics only and print the events as JSON
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Render several configs in parallel, one directory per config
    Batch {
        #[arg(short, long, num_args = 1.., required = true)]
        config: Vec<PathBuf>,
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().cmd {
        Cmd::Render {
            config,
            out,
            workers,
            seed,
        } => render(&config, &out, workers, seed),
        Cmd::Simulate { config, seed } => simulate(&config, seed),
        Cmd::Batch { config, out } => batch(&config, &out),
    }
}

fn load(path: &Path, seed: Option<u64>) -> Result<SimulationConfig> {
    let mut config = SimulationConfig::from_path(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    if let Some(seed) = seed {
        config.seed = seed;
    }
    Ok(config)
}

/// Job id from the config file name
fn job_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

fn render(config_path: &Path, out: &Path, workers: usize, seed: Option<u64>) -> Result<()> {
    let config = load(config_path, seed)?;
    let job = VideoJob::new(job_id(config_path), config)?.with_workers(workers);
    let report = job
        .run_to_dir(out, &CancelToken::new())
        .with_context(|| format!("rendering into {}", out.display()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn simulate(config_path: &Path, seed: Option<u64>) -> Result<()> {
    let config = load(config_path, seed)?;
    let job = VideoJob::new(job_id(config_path), config)?;
    let report = job.simulate(&CancelToken::new())?;
    println!("{}", serde_json::to_string_pretty(&report.events)?);
    Ok(())
}

fn batch(configs: &[PathBuf], out: &Path) -> Result<()> {
    let jobs = configs
        .iter()
        .map(|path| Ok(VideoJob::new(job_id(path), load(path, None)?)?))
        .collect::<Result<Vec<_>>>()?;

    let mut failed = 0;
    for (id, result) in run_batch(&jobs, out, &CancelToken::new()) {
        match result {
            Ok(report) => println!(
                "{id}: {} frames, {} events in {:.2}s",
                report.frame_count, report.event_count, report.elapsed_secs
            ),
            Err(e) => {
                eprintln!("{id}: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} jobs failed", jobs.len());
    }
    Ok(())
}
