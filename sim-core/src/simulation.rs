//! Simulation driver: landscape setup, the time loop and its bookkeeping.

use log::{debug, info};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::Normal;

use crate::{
    config::{Config, TRAIT_RADIUS, is_power_of_two},
    error::SimError,
    network::Network,
    phases::{drift_phase, extinction_phase, migration_phase, shuffle_phase, speciation_phase},
    point::Point,
    report::Reporter,
    species_tree::SpeciesTree,
    traits::random_in_sphere,
    types::Date,
};

/// Per-step record of one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunHistory {
    pub seed: u64,
    /// Landscape draws needed to obtain a connected one.
    pub attempts: usize,
    /// Effective (power-of-two) number of steps.
    pub t_max: Date,
    pub speciation_per_t: Vec<usize>,
    pub extinctions_per_t: Vec<usize>,
    pub species_per_t: Vec<usize>,
    /// Newick string of the tree at every snapshot step.
    pub newick: Vec<(Date, String)>,
}

impl RunHistory {
    /// Number of steps executed.
    pub fn steps(&self) -> usize {
        self.species_per_t.len()
    }

    /// Surviving species after the last executed step.
    pub fn final_species(&self) -> Option<usize> {
        self.species_per_t.last().copied()
    }
}

/// Draws random geometric landscapes until one is connected.
///
/// ### Returns
/// The landscape and the number of draws it took.
///
/// ### Errors
/// [`SimError::LandscapeNotConnected`] after `max_attempts` disconnected
/// draws.
pub fn build_landscape(
    communities: usize,
    radius: f64,
    max_attempts: usize,
    rng: &mut impl Rng,
) -> Result<(Network<Point>, usize), SimError> {
    let mut landscape = Network::new();
    for attempt in 1..=max_attempts {
        landscape.random_geometric(communities, radius, rng);
        if landscape.is_connected() {
            debug!(
                "connected landscape of {} sites and {} edges after {attempt} attempts",
                landscape.order(),
                landscape.size()
            );
            return Ok((landscape, attempt));
        }
    }
    Err(SimError::LandscapeNotConnected {
        attempts: max_attempts,
    })
}

/// State of one simulation run.
///
/// Owns the landscape, the species tree and the random stream, so
/// independent runs share nothing.
#[derive(Debug)]
pub struct Simulation {
    cfg: Config,
    rng: StdRng,
    landscape: Network<Point>,
    tree: SpeciesTree,
    noise: Normal<f64>,
    /// Occupied (species, site) pairs over all tips.
    populations: usize,
    t: Date,
    t_max: Date,
    history: RunHistory,
}

impl Simulation {
    /// Validates `cfg`, builds a connected landscape and seeds a single
    /// species occupying every site with a random trait vector.
    ///
    /// ### Errors
    /// - [`SimError::Config`] for out-of-range parameters.
    /// - [`SimError::LandscapeNotConnected`] if the landscape retry cap
    ///   was hit.
    /// - [`SimError::TraitSamplingExhausted`] if no initial trait vector
    ///   could be drawn.
    pub fn new(cfg: Config) -> Result<Self, SimError> {
        cfg.validate()?;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let noise = Normal::new(0.0, cfg.white_noise_std)?;

        let (landscape, attempts) =
            build_landscape(cfg.communities, cfg.radius, cfg.max_network_attempts, &mut rng)?;

        // Traits are only read by the trait models; the rest start at the origin.
        let traits = if cfg.model.has_traits() {
            random_in_sphere(&mut rng, cfg.traits, TRAIT_RADIUS, cfg.max_trait_attempts)?
        } else {
            vec![0.0; cfg.traits]
        };
        let mut tree = SpeciesTree::new(traits);
        if let Some(species) = tree.species_mut(0) {
            species.add_all(landscape.vertices().copied());
        }
        let populations = landscape.order();

        let t_max = cfg.effective_t_max();
        let history = RunHistory {
            seed: cfg.seed,
            attempts,
            t_max,
            ..RunHistory::default()
        };

        Ok(Self {
            cfg,
            rng,
            landscape,
            tree,
            noise,
            populations,
            t: 0,
            t_max,
            history,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn landscape(&self) -> &Network<Point> {
        &self.landscape
    }

    pub fn tree(&self) -> &SpeciesTree {
        &self.tree
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn populations(&self) -> usize {
        self.populations
    }

    /// Next step to execute.
    pub fn t(&self) -> Date {
        self.t
    }

    /// `true` once every step ran or every population died out.
    pub fn is_finished(&self) -> bool {
        self.t > self.t_max || self.populations == 0
    }

    /// Runs one time step: shuffle (midpoint only, if enabled), migration,
    /// extinction, speciation, drift (trait models only) and pruning. At
    /// power-of-two steps the tips are stamped and a snapshot is reported.
    ///
    /// ### Errors
    /// Distribution construction failures and reporter I/O errors.
    pub fn step_once(&mut self, reporter: &mut impl Reporter) -> Result<(), SimError> {
        let t = self.t;
        let cfg = &self.cfg;

        if cfg.shuffle && t == self.t_max / 2 {
            let lost = shuffle_phase(&mut self.tree, &self.landscape, &mut self.rng);
            self.populations -= lost;
            debug!("t={t}: shuffle lost {lost} populations");
        }

        // Extinction sees the sites gained by migration, and speciation
        // regroups what extinction left.
        self.populations += migration_phase(&mut self.tree, &self.landscape, cfg, t, &mut self.rng);
        let removed = extinction_phase(&mut self.tree, self.populations, cfg, &mut self.rng)?;
        self.populations -= removed;
        let speciations = speciation_phase(&mut self.tree, &self.landscape, cfg, t, &mut self.rng)?;

        if cfg.model.has_traits() {
            drift_phase(&mut self.tree, &self.noise, cfg.max_trait_attempts, &mut self.rng);
        }

        // Prune empty tips, including lineages born empty this step.
        let extinct = self.tree.remove_extinct(t);
        debug_assert_eq!(self.populations, self.tree.total_population());

        self.history.speciation_per_t.push(speciations);
        self.history.extinctions_per_t.push(extinct.len());
        self.history.species_per_t.push(self.tree.num_species());

        if is_power_of_two(t) {
            self.tree.stop(t);
            let newick = self.tree.newick();
            debug!(
                "t={t}: {} species, {} populations, {newick}",
                self.tree.num_species(),
                self.populations
            );
            self.history.newick.push((t, newick));
            reporter.snapshot(self.cfg.seed, t, &self.tree)?;
        }

        self.t += 1;
        Ok(())
    }

    /// Runs every remaining step and hands the history to `reporter`.
    ///
    /// The landscape is reported first if no step ran yet.
    pub fn run(mut self, reporter: &mut impl Reporter) -> Result<RunHistory, SimError> {
        info!(
            "seed {}: {} model, {} sites, t_max {}",
            self.cfg.seed,
            self.cfg.model,
            self.landscape.order(),
            self.t_max
        );
        if self.t == 0 {
            reporter.landscape(self.cfg.seed, &self.landscape)?;
        }

        while !self.is_finished() {
            self.step_once(reporter)?;
        }

        reporter.finish(&self.cfg, &self.history)?;
        info!(
            "seed {}: finished after {} steps with {} species",
            self.cfg.seed,
            self.history.steps(),
            self.tree.num_species()
        );
        Ok(self.history)
    }
}

/// Builds and runs a simulation in one go.
pub fn simulate(cfg: Config, reporter: &mut impl Reporter) -> Result<RunHistory, SimError> {
    Simulation::new(cfg)?.run(reporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::report::{NullReporter, RecordingReporter};

    fn quiet(model: Model) -> Config {
        Config {
            model,
            seed: 42,
            t_max: 512,
            communities: 64,
            traits: 10,
            radius: 0.20,
            ext_max: 0.0,
            mig_max: 0.0,
            speciation: 0.0,
            ..Config::default()
        }
    }

    #[test]
    fn accepted_landscape_is_connected_with_requested_order() {
        let mut rng = StdRng::seed_from_u64(42);
        for communities in [1, 2, 16, 64] {
            let (net, attempts) = build_landscape(communities, 0.3, 100_000, &mut rng).unwrap();
            assert!(attempts >= 1);
            assert!(net.is_connected());
            assert_eq!(net.order(), communities);
        }
    }

    #[test]
    fn landscape_cap_is_reported() {
        let mut rng = StdRng::seed_from_u64(42);
        let res = build_landscape(50, 1e-9, 3, &mut rng);
        assert!(matches!(
            res,
            Err(SimError::LandscapeNotConnected { attempts: 3 })
        ));
    }

    #[test]
    fn invalid_config_is_rejected_before_setup() {
        let cfg = Config {
            ext_max: 2.0,
            ..Config::default()
        };
        assert!(matches!(Simulation::new(cfg), Err(SimError::Config(_))));
    }

    #[test]
    fn zero_rates_keep_a_single_species_throughout() {
        let sim = Simulation::new(quiet(Model::Neutral)).unwrap();
        let landscape = sim.landscape().clone();
        assert_eq!(sim.populations(), 64);

        let mut reporter = RecordingReporter::default();
        let mut sim = sim;
        while !sim.is_finished() {
            sim.step_once(&mut reporter).unwrap();
        }

        assert_eq!(sim.landscape(), &landscape);
        assert_eq!(sim.populations(), 64);
        let history = sim.history();
        assert_eq!(history.steps(), 513);
        assert!(history.speciation_per_t.iter().all(|&n| n == 0));
        assert!(history.extinctions_per_t.iter().all(|&n| n == 0));
        assert!(history.species_per_t.iter().all(|&n| n == 1));

        // Snapshots at 1, 2, 4, ..., 512.
        let dates: Vec<Date> = history.newick.iter().map(|(t, _)| *t).collect();
        assert_eq!(dates, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512]);
        assert_eq!(history.newick.last().unwrap().1, "species0:0;");
        assert_eq!(reporter.snapshots.len(), 10);
    }

    #[test]
    fn single_site_keeps_exactly_one_species() {
        let cfg = Config {
            model: Model::PhyloDistance,
            communities: 1,
            t_max: 64,
            ext_max: 0.0,
            ..Config::default()
        };
        let sim = Simulation::new(cfg).unwrap();
        assert_eq!(sim.history().attempts, 1);

        let mut reporter = NullReporter;
        let history = sim.run(&mut reporter).unwrap();
        assert_eq!(history.steps(), 65);
        // A lone site is a single group: a split hands it to the new
        // lineage and the old one is pruned, so exactly one species remains.
        assert!(history.species_per_t.iter().all(|&n| n == 1));
        assert!(history.speciation_per_t.iter().all(|&n| n <= 1));
    }

    #[test]
    fn run_stops_when_everything_dies() {
        let cfg = Config {
            model: Model::Neutral,
            ext_max: 1.0,
            t_max: 64,
            communities: 16,
            radius: 0.5,
            ..Config::default()
        };
        let mut reporter = RecordingReporter::default();
        let history = simulate(cfg, &mut reporter).unwrap();
        assert_eq!(history.steps(), 1);
        assert_eq!(history.final_species(), Some(0));
        assert_eq!(history.extinctions_per_t, vec![1]);
        assert!(reporter.graphml.is_some());
        assert!(reporter.report.is_some());
    }

    #[test]
    fn same_seed_gives_same_history() {
        for model in Model::ALL {
            let cfg = Config {
                model,
                seed: 7,
                t_max: 64,
                communities: 32,
                radius: 0.3,
                traits: 4,
                ..Config::default()
            };
            let a = simulate(cfg.clone(), &mut NullReporter).unwrap();
            let b = simulate(cfg, &mut NullReporter).unwrap();
            assert_eq!(a, b);
            assert!(a.steps() <= 65);
        }
    }

    #[test]
    fn busy_runs_keep_tree_consistent() {
        let cfg = Config {
            model: Model::TraitDistance,
            seed: 3,
            t_max: 128,
            communities: 48,
            radius: 0.25,
            traits: 3,
            ext_max: 0.1,
            mig_max: 0.3,
            aleph: 2.0,
            speciation: 0.1,
            ..Config::default()
        };
        let mut sim = Simulation::new(cfg).unwrap();
        let mut reporter = NullReporter;
        while !sim.is_finished() {
            sim.step_once(&mut reporter).unwrap();
            assert!(sim.tree().strictly_binary());
            assert_eq!(sim.populations(), sim.tree().total_population());
            assert!(sim.tree().tips().all(|s| !s.is_extinct()));
        }
    }

    #[test]
    fn midpoint_shuffle_keeps_population_bookkeeping() {
        let cfg = Config {
            model: Model::PhyloDistance,
            seed: 13,
            t_max: 32,
            communities: 40,
            radius: 0.3,
            ext_max: 0.02,
            mig_max: 0.2,
            speciation: 0.05,
            shuffle: true,
            ..Config::default()
        };
        let mut sim = Simulation::new(cfg).unwrap();
        let mut reporter = NullReporter;

        while sim.t() < 16 {
            sim.step_once(&mut reporter).unwrap();
        }
        assert_eq!(sim.populations(), sim.tree().total_population());

        // Step 16 is the midpoint of 32: every site is redrawn first.
        sim.step_once(&mut reporter).unwrap();
        assert_eq!(sim.populations(), sim.tree().total_population());

        while !sim.is_finished() {
            sim.step_once(&mut reporter).unwrap();
            assert_eq!(sim.populations(), sim.tree().total_population());
            assert!(sim.tree().strictly_binary());
            assert!(sim.tree().tips().all(|s| s.locations().all(|p| sim.landscape().has_vertex(p))));
        }
        assert_eq!(sim.history().steps(), 33);
    }

    #[test]
    fn shuffle_can_only_shrink_ranges() {
        let cfg = Config {
            model: Model::Neutral,
            seed: 2,
            t_max: 4,
            communities: 30,
            radius: 0.4,
            ext_max: 0.0,
            mig_max: 0.0,
            speciation: 0.0,
            shuffle: true,
            ..Config::default()
        };
        let mut sim = Simulation::new(cfg).unwrap();
        let mut reporter = NullReporter;
        sim.step_once(&mut reporter).unwrap();
        sim.step_once(&mut reporter).unwrap();
        assert_eq!(sim.populations(), 30);

        // t = 2 is the midpoint; without migration nothing refills the gaps.
        sim.step_once(&mut reporter).unwrap();
        assert!(sim.populations() <= 30);
        assert!(sim.populations() >= 1);
        assert_eq!(sim.populations(), sim.tree().total_population());
        assert_eq!(sim.tree().num_species(), 1);
    }

    #[test]
    fn logistic_run_stays_consistent() {
        let cfg = Config {
            model: Model::LogisticSpeciation,
            seed: 17,
            t_max: 128,
            communities: 48,
            radius: 0.25,
            ext_max: 0.05,
            mig_max: 0.3,
            speciation: 0.3,
            speciation_exp: 1.2,
            ..Config::default()
        };
        let mut sim = Simulation::new(cfg).unwrap();
        let mut reporter = RecordingReporter::default();
        while !sim.is_finished() {
            sim.step_once(&mut reporter).unwrap();
            assert_eq!(sim.populations(), sim.tree().total_population());
            assert!(sim.tree().strictly_binary());
        }

        let history = sim.history();
        assert!(history.steps() <= 129);
        let cfg = sim.config();
        let speciations: usize = history.speciation_per_t.iter().sum();
        let extinctions: usize = history.extinctions_per_t.iter().sum();
        // Every lineage beyond the first came from a split.
        assert_eq!(1 + speciations, extinctions + history.final_species().unwrap());
        assert!((1..50).all(|n| cfg.speciation_rate(n) < cfg.speciation_rate(n - 1)));
    }

    #[test]
    fn neutral_runs_ignore_trait_dimension() {
        let cfg = Config {
            model: Model::Neutral,
            traits: 16,
            t_max: 8,
            communities: 16,
            radius: 0.5,
            ..Config::default()
        };
        let sim = Simulation::new(cfg).unwrap();
        assert!(sim.tree().tips().all(|s| s.traits() == [0.0; 16]));
        assert!(sim.run(&mut NullReporter).is_ok());
    }
}
