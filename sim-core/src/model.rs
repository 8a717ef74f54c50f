use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Model variants of the simulation.
///
/// The variant decides how migration is attenuated by co-occurring species,
/// whether traits drift, and whether the speciation rate is logistic in the
/// number of species.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    Neutral,
    #[default]
    PhyloDistance,
    TraitDistance,
    LogisticSpeciation,
    FuzzyTraits,
}

impl Model {
    pub const ALL: [Model; 5] = [
        Model::Neutral,
        Model::PhyloDistance,
        Model::TraitDistance,
        Model::LogisticSpeciation,
        Model::FuzzyTraits,
    ];

    /// Display name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Model::Neutral => "neutral",
            Model::PhyloDistance => "phylogenetic distance",
            Model::TraitDistance => "euclidean traits",
            Model::LogisticSpeciation => "logistic",
            Model::FuzzyTraits => "fuzzy traits",
        }
    }

    /// Short identifier accepted on the command line.
    pub fn key(self) -> &'static str {
        match self {
            Model::Neutral => "neutral",
            Model::PhyloDistance => "phylo",
            Model::TraitDistance => "traits",
            Model::LogisticSpeciation => "logistic",
            Model::FuzzyTraits => "fuzzy",
        }
    }

    /// Species carry drifting trait vectors.
    pub fn has_traits(self) -> bool {
        matches!(self, Model::TraitDistance | Model::FuzzyTraits)
    }

    /// Migration is attenuated by `exp(-aleph * delta)`.
    pub fn has_aleph(self) -> bool {
        matches!(self, Model::PhyloDistance | Model::TraitDistance)
    }

    /// Speciation rate shrinks with the number of species.
    pub fn has_logistic_rate(self) -> bool {
        matches!(self, Model::LogisticSpeciation)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Model {
    type Err = String;

    /// Accepts the short key, the display name, or the numeric code `0..=4`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<usize>() {
            return Model::ALL
                .get(code)
                .copied()
                .ok_or_else(|| format!("unknown model code {code}, expected 0..=4"));
        }
        Model::ALL
            .into_iter()
            .find(|m| m.key().eq_ignore_ascii_case(s) || m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown model '{s}'"))
    }
}
