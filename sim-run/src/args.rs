use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::{Rng, SeedableRng, rngs::StdRng};

use sim_core::{Config, Model};

#[derive(Debug, Parser)]
#[command(name = "sim-run")]
#[command(about = "Spatial speciation simulations on random geometric landscapes")]
#[command(version)]
pub struct Cli {
    /// RON file with simulation parameters; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Model: neutral, phylo, traits, logistic, fuzzy (or 0-4)
    #[arg(long)]
    pub model: Option<Model>,

    /// Seed of the run, or master seed of the replicates
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of steps, rounded down to a power of two
    #[arg(short = 't', long)]
    pub t_max: Option<usize>,

    /// Number of sites
    #[arg(short = 'c', long)]
    pub communities: Option<usize>,

    /// Trait dimensionality
    #[arg(short = 'n', long)]
    pub traits: Option<usize>,

    /// Extinction probability per population and step
    #[arg(short = 'e', long)]
    pub ext_max: Option<f64>,

    /// Base migration probability
    #[arg(short = 'm', long)]
    pub mig_max: Option<f64>,

    /// Migration attenuation strength
    #[arg(short = 'a', long)]
    pub aleph: Option<f64>,

    /// Speciation probability per group and step
    #[arg(short = 's', long)]
    pub speciation: Option<f64>,

    /// Base of the logistic speciation rate
    #[arg(long)]
    pub speciation_exp: Option<f64>,

    /// Connection radius of the landscape
    #[arg(short = 'r', long)]
    pub radius: Option<f64>,

    /// Standard deviation of the trait noise
    #[arg(long)]
    pub white_noise_std: Option<f64>,

    /// Relocate every population at the midpoint step
    #[arg(long)]
    pub shuffle: bool,

    /// Do not write any result file
    #[arg(long)]
    pub discard: bool,

    /// Number of replicate runs
    #[arg(long, default_value = "1")]
    pub runs: usize,

    /// Worker threads for replicates (defaults to one per core)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Directory receiving the result files
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,

    /// File name prefix of the result files
    #[arg(long, default_value = "w")]
    pub prefix: String,

    /// Log every snapshot
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Loads the config file, if any, and applies the flag overrides.
    pub fn to_config(&self) -> Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                ron::from_str::<Config>(&text)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => Config::default(),
        };

        if let Some(model) = self.model {
            cfg.model = model;
        }
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if let Some(t_max) = self.t_max {
            cfg.t_max = t_max;
        }
        if let Some(communities) = self.communities {
            cfg.communities = communities;
        }
        if let Some(traits) = self.traits {
            cfg.traits = traits;
        }
        if let Some(ext_max) = self.ext_max {
            cfg.ext_max = ext_max;
        }
        if let Some(mig_max) = self.mig_max {
            cfg.mig_max = mig_max;
        }
        if let Some(aleph) = self.aleph {
            cfg.aleph = aleph;
        }
        if let Some(speciation) = self.speciation {
            cfg.speciation = speciation;
        }
        if let Some(speciation_exp) = self.speciation_exp {
            cfg.speciation_exp = speciation_exp;
        }
        if let Some(radius) = self.radius {
            cfg.radius = radius;
        }
        if let Some(std) = self.white_noise_std {
            cfg.white_noise_std = std;
        }
        cfg.shuffle |= self.shuffle;
        cfg.discard |= self.discard;

        cfg.validate().context("Invalid simulation parameters")?;
        Ok(cfg)
    }
}

/// Seeds of the replicate runs.
///
/// A single run uses `master` verbatim. Otherwise `runs` distinct seeds are
/// drawn from a generator seeded with `master`, so output file names never
/// collide.
pub fn replicate_seeds(master: u64, runs: usize) -> Vec<u64> {
    if runs == 1 {
        return vec![master];
    }
    let mut rng = StdRng::seed_from_u64(master);
    let mut seen = BTreeSet::new();
    let mut seeds = Vec::with_capacity(runs);
    while seeds.len() < runs {
        let seed: u64 = rng.random();
        if seen.insert(seed) {
            seeds.push(seed);
        }
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sim-run").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&["--model", "neutral", "--seed", "7", "-c", "16", "-e", "0.1", "--shuffle"]);
        let cfg = cli.to_config().unwrap();
        assert_eq!(cfg.model, Model::Neutral);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.communities, 16);
        assert_eq!(cfg.ext_max, 0.1);
        assert!(cfg.shuffle);
        assert!(!cfg.discard);
        assert_eq!(cfg.t_max, Config::default().t_max);
    }

    #[test]
    fn numeric_model_codes_are_accepted() {
        let cli = parse(&["--model", "2"]);
        assert_eq!(cli.model, Some(Model::TraitDistance));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cli = parse(&["-m", "1.5"]);
        assert!(cli.to_config().is_err());
        assert!(Cli::try_parse_from(["sim-run", "--model", "bogus"]).is_err());
    }

    #[test]
    fn config_file_is_loaded_then_overridden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.ron");
        fs::write(&path, "(model: trait_distance, seed: 9, communities: 32, aleph: 2.5)").unwrap();

        let cli = parse(&["--config", path.to_str().unwrap(), "--seed", "11"]);
        let cfg = cli.to_config().unwrap();
        assert_eq!(cfg.model, Model::TraitDistance);
        assert_eq!(cfg.communities, 32);
        assert_eq!(cfg.aleph, 2.5);
        assert_eq!(cfg.seed, 11);
        assert_eq!(cfg.radius, Config::default().radius);
    }

    #[test]
    fn replicate_seeds_are_distinct_and_reproducible() {
        assert_eq!(replicate_seeds(42, 1), vec![42]);
        let seeds = replicate_seeds(42, 20);
        assert_eq!(seeds.len(), 20);
        assert_eq!(seeds.iter().collect::<BTreeSet<_>>().len(), 20);
        assert_eq!(seeds, replicate_seeds(42, 20));
        assert!(replicate_seeds(42, 0).is_empty());
    }
}
