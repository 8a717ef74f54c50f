//! Command-line front end: parses parameters, runs one or more replicate
//! simulations in parallel and writes their reports.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use rayon::prelude::*;

use sim_core::{Config, NullReporter, RunHistory, SimError, simulate};

mod args;
mod logger;
mod output;

use args::{Cli, replicate_seeds};
use output::FileReporter;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logger::init(cli.verbose).context("Failed to install the logger")?;

    anyhow::ensure!(cli.runs > 0, "At least one run is required.");
    let cfg = cli.to_config()?;
    let seeds = replicate_seeds(cfg.seed, cli.runs);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads.unwrap_or(0))
        .build()
        .context("Failed to build the worker pool")?;
    info!(
        "{} run(s) of the {} model on {} thread(s)",
        seeds.len(),
        cfg.model,
        pool.current_num_threads()
    );

    let results: Vec<(u64, Result<RunHistory, SimError>)> = pool.install(|| {
        seeds
            .par_iter()
            .map(|&seed| {
                let cfg = Config { seed, ..cfg.clone() };
                (seed, run_one(cfg, &cli.output_dir, &cli.prefix))
            })
            .collect()
    });

    let mut failed = 0;
    for (seed, result) in &results {
        match result {
            Ok(history) => summarize(*seed, history, cfg.discard),
            Err(err) => {
                error!("seed {seed}: {err}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        error!("{failed} of {} run(s) failed", results.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_one(cfg: Config, output_dir: &Path, prefix: &str) -> Result<RunHistory, SimError> {
    if cfg.discard {
        simulate(cfg, &mut NullReporter)
    } else {
        let mut reporter = FileReporter::new(output_dir, prefix, cfg.seed);
        simulate(cfg, &mut reporter)
    }
}

fn summarize(seed: u64, history: &RunHistory, discard: bool) {
    let speciations: usize = history.speciation_per_t.iter().sum();
    let extinctions: usize = history.extinctions_per_t.iter().sum();
    info!(
        "seed {seed}: {} steps, {speciations} speciations, {extinctions} extinctions, {} species left",
        history.steps(),
        history.final_species().unwrap_or(0)
    );
    // Nothing was written, so the last tree only survives in the log.
    if discard && let Some((t, newick)) = history.newick.last() {
        info!("seed {seed}: t={t} {newick}");
    }
}
