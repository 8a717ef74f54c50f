//! Error types for simulation setup and execution.

use thiserror::Error;

/// Invalid simulation parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A probability lies outside `[0, 1]`.
    #[error("{name} must be a probability in [0, 1], got {value}")]
    NotAProbability { name: &'static str, value: f64 },

    /// A quantity that must not be negative is.
    #[error("{name} must be non-negative and finite, got {value}")]
    Negative { name: &'static str, value: f64 },

    /// The network radius must be strictly positive.
    #[error("radius must be positive and finite, got {0}")]
    Radius(f64),

    /// The landscape needs at least one site.
    #[error("the landscape needs at least one site")]
    NoSites,

    /// Initial trait vectors of this dimension are unlikely to be drawn
    /// within the attempt cap.
    #[error(
        "{traits} trait dimensions need more than {max_attempts} sampling attempts; \
         raise max_trait_attempts or lower traits"
    )]
    TraitDimension { traits: usize, max_attempts: usize },

    /// The logistic speciation rate would exceed 1 for some species count.
    #[error("logistic rate 2 * {speciation} / (1 + {speciation_exp}^n) can exceed 1")]
    LogisticRate { speciation: f64, speciation_exp: f64 },
}

/// Errors that stop a single simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    /// No connected landscape was drawn within the attempt cap.
    #[error("no connected landscape after {attempts} attempts")]
    LandscapeNotConnected { attempts: usize },

    /// Parameters were rejected before the run started.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Initial trait vector could not be sampled inside the trait ball.
    #[error("no trait vector inside the trait ball after {attempts} attempts")]
    TraitSamplingExhausted { attempts: usize },

    /// A binomial distribution could not be built.
    #[error("binomial distribution: {0}")]
    Binomial(#[from] rand_distr::BinomialError),

    /// The trait-noise distribution could not be built.
    #[error("normal distribution: {0}")]
    Normal(#[from] rand_distr::NormalError),

    /// A reporter failed to write its output.
    #[error("report output failed: {0}")]
    Io(#[from] std::io::Error),
}
