use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, model::Model, traits::ball_acceptance};

/// Radius of the trait ball every trait vector must stay inside.
pub const TRAIT_RADIUS: f64 = 0.5;

/// Attempt cap over expected attempts required for initial trait sampling.
/// Missing the ball this many expected rounds in a row has odds of `e^-20`.
pub const TRAIT_SAMPLING_MARGIN: f64 = 20.0;

/// Parameters of one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: Model,
    pub seed: u64,
    /// Number of time steps; rounded down to a power of two by
    /// [`Config::effective_t_max`].
    pub t_max: usize,
    /// Number of sites in the landscape.
    pub communities: usize,
    /// Dimensionality of the trait vectors.
    pub traits: usize,
    /// Per-population extinction probability per step.
    pub ext_max: f64,
    /// Base migration probability into a neighboring site.
    pub mig_max: f64,
    /// Migration attenuation strength.
    pub aleph: f64,
    /// Per-group speciation probability per step.
    pub speciation: f64,
    /// Base of the logistic speciation rate.
    pub speciation_exp: f64,
    /// Connection threshold of the random geometric landscape.
    pub radius: f64,
    /// Standard deviation of the trait noise.
    pub white_noise_std: f64,
    /// Relocate all populations at the midpoint step.
    pub shuffle: bool,
    /// Run without writing any result file.
    pub discard: bool,
    /// Landscape draws before the run is abandoned.
    pub max_network_attempts: usize,
    /// Rejection-sampling attempts for trait vectors.
    pub max_trait_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Model::PhyloDistance,
            seed: 42,
            t_max: 512,
            communities: 64,
            traits: 10,
            ext_max: 0.05,
            mig_max: 0.04,
            aleph: 10.0,
            speciation: 0.04,
            speciation_exp: 1.02,
            radius: 0.20,
            white_noise_std: 0.01,
            shuffle: false,
            discard: false,
            max_network_attempts: 100_000,
            max_trait_attempts: 10_000,
        }
    }
}

impl Config {
    /// `t_max` rounded down to the nearest power of two (`0` stays `0`).
    pub fn effective_t_max(&self) -> usize {
        floor_power_of_two(self.t_max)
    }

    /// Checks every parameter against its admissible range.
    ///
    /// ### Errors
    /// The first offending parameter, as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("ext_max", self.ext_max),
            ("mig_max", self.mig_max),
            ("speciation", self.speciation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::NotAProbability { name, value });
            }
        }
        for (name, value) in [
            ("aleph", self.aleph),
            ("white_noise_std", self.white_noise_std),
            ("speciation_exp", self.speciation_exp),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(ConfigError::Radius(self.radius));
        }
        if self.communities == 0 {
            return Err(ConfigError::NoSites);
        }
        if self.model.has_traits() {
            let expected = 1.0 / ball_acceptance(self.traits);
            if expected * TRAIT_SAMPLING_MARGIN > self.max_trait_attempts as f64 {
                return Err(ConfigError::TraitDimension {
                    traits: self.traits,
                    max_attempts: self.max_trait_attempts,
                });
            }
        }
        // With se >= 1 the rate peaks at s; below 1 it tends to 2s.
        if self.model.has_logistic_rate()
            && self.speciation_exp < 1.0
            && 2.0 * self.speciation > 1.0
        {
            return Err(ConfigError::LogisticRate {
                speciation: self.speciation,
                speciation_exp: self.speciation_exp,
            });
        }
        Ok(())
    }

    /// Speciation probability per group given the current species count.
    ///
    /// Logistic models use `2 s / (1 + se^n)`, which equals `s` for a
    /// single lineage at `se = 1` and shrinks as `n` grows when `se > 1`.
    pub fn speciation_rate(&self, num_species: usize) -> f64 {
        if self.model.has_logistic_rate() {
            let n = i32::try_from(num_species).unwrap_or(i32::MAX);
            (2.0 * self.speciation) / (1.0 + self.speciation_exp.powi(n))
        } else {
            self.speciation
        }
    }
}

/// Returns `true` for `1, 2, 4, 8, ...`.
#[inline]
pub fn is_power_of_two(n: usize) -> bool {
    n.is_power_of_two()
}

/// Largest power of two not above `n`, or `0` for `0`.
pub fn floor_power_of_two(n: usize) -> usize {
    if n == 0 { 0 } else { 1 << n.ilog2() }
}
