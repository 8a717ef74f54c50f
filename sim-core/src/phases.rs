//! Per-step simulation phases.
//!
//! One time step applies, in this order:
//! 1. [`shuffle_phase`] - only at the midpoint step and only if enabled.
//! 2. [`migration_phase`] - species spread into neighboring sites.
//! 3. [`extinction_phase`] - random local extinctions.
//! 4. [`speciation_phase`] - disjoint dispersal groups split off.
//! 5. [`drift_phase`] - trait vectors receive bounded noise (trait models).
//!
//! Pruning of extinct tips and reporting are driven by
//! [`crate::simulation::Simulation`]. Every phase reads and mutates the
//! same tree, so they never run concurrently.

use std::collections::BTreeSet;

use log::warn;
use rand::Rng;
use rand_distr::{Binomial, Distribution, Normal};

use crate::{
    config::{Config, TRAIT_RADIUS},
    error::SimError,
    model::Model,
    network::Network,
    point::Point,
    species_tree::SpeciesTree,
    traits::{euclidean_distance, white_noise},
    types::{Date, SpeciesId},
};

/// Relocates every population to a random site.
///
/// For each tip species and each of its occupied sites (snapshot taken
/// before the move), the site is vacated and one uniformly drawn landscape
/// vertex is occupied instead. Draws can collide, so populations may only
/// shrink.
///
/// ### Returns
/// The number of populations lost over all species.
pub fn shuffle_phase(
    tree: &mut SpeciesTree,
    landscape: &Network<Point>,
    rng: &mut impl Rng,
) -> usize {
    let mut lost = 0;
    for id in tree.tip_ids() {
        let Some(species) = tree.species_mut(id) else {
            continue;
        };
        let before = species.population_count();
        // Relocated populations can land on an occupied site and merge.
        let sites: Vec<Point> = species.locations().copied().collect();
        for site in sites {
            let Some(&target) = landscape.random_vertex(rng) else {
                break;
            };
            species.remove_from(&site);
            species.add_to(target);
        }
        lost += before - species.population_count();
    }
    lost
}

/// Affinity between two co-occurring species in trait space: `1 - d`.
///
/// Trait vectors live in a ball of radius `0.5`, so the distance `d` is
/// always in `[0, 1]`; anything else is a bug upstream.
pub fn trait_affinity(a: &[f64], b: &[f64]) -> f64 {
    let dist = euclidean_distance(a, b);
    debug_assert!(
        (0.0..=1.0).contains(&dist),
        "trait distance {dist} outside [0, 1]"
    );
    1.0 - dist
}

/// Affinity between two co-occurring species in phylogenetic time:
/// `1 / (t - mrca)`.
///
/// A missing ancestor (no shared parent) contributes nothing.
pub fn phylo_affinity(mrca: Option<Date>, t: Date) -> f64 {
    match mrca {
        None => 0.0,
        Some(m) => {
            debug_assert!(m < t, "common ancestor dated {m} at step {t}");
            1.0 / t.saturating_sub(m).max(1) as f64
        }
    }
}

/// Probability that species `id` colonizes `site` at step `t`.
///
/// Starts from `cfg.mig_max`. For attenuated models it is multiplied by
/// `exp(-aleph * delta)`, where `delta` sums the affinity of `id` to every
/// other tip species already occupying `site`.
///
/// ### Parameters
/// - `tree` - Current species tree; only read access is required.
/// - `cfg` - Run parameters (model, base rate, attenuation strength).
/// - `id` - Migrating species.
/// - `site` - Candidate destination.
/// - `t` - Current time step.
pub fn migration_probability(
    tree: &SpeciesTree,
    cfg: &Config,
    id: SpeciesId,
    site: &Point,
    t: Date,
) -> f64 {
    let mut mig = cfg.mig_max;
    if !cfg.model.has_aleph() {
        return mig;
    }
    let Some(s0) = tree.species(id) else {
        return mig;
    };

    let delta: f64 = tree
        .tips()
        .filter(|s1| s1.id() != id && s1.is_occupied(site))
        .map(|s1| match cfg.model {
            Model::TraitDistance => trait_affinity(s0.traits(), s1.traits()),
            Model::PhyloDistance => phylo_affinity(tree.mrca_date(id, s1.id()), t),
            _ => 0.0,
        })
        .sum();

    mig *= (-cfg.aleph * delta).exp();
    mig
}

/// Lets every tip species spread into neighboring sites.
///
/// For each species, every landscape neighbor of an occupied site that the
/// species does not occupy yet is colonized with
/// [`migration_probability`]. Sites colonized during the pass do not emit
/// migrants themselves until the next step.
///
/// ### Returns
/// The number of populations gained.
pub fn migration_phase(
    tree: &mut SpeciesTree,
    landscape: &Network<Point>,
    cfg: &Config,
    t: Date,
    rng: &mut impl Rng,
) -> usize {
    let mut gained = 0;
    for id in tree.tip_ids() {
        // Sites colonized this pass do not emit migrants until the next step.
        let mut added: BTreeSet<Point> = BTreeSet::new();
        {
            let Some(species) = tree.species(id) else {
                continue;
            };
            for site in species.locations() {
                for next in landscape.neighbors(site) {
                    if species.is_occupied(next) || added.contains(next) {
                        continue;
                    }
                    let p = migration_probability(tree, cfg, id, next, t);
                    if rng.random::<f64>() < p {
                        added.insert(*next);
                    }
                }
            }
        }

        // Apply
        gained += added.len();
        if let Some(species) = tree.species_mut(id) {
            species.add_all(added);
        }
    }
    gained
}

/// Locates the `k`-th element of a flattened sequence of buckets.
///
/// ### Returns
/// The bucket key and the offset of `k` inside that bucket, or `None` if
/// `k` is past the end.
pub fn pick_flattened<K: Copy>(
    sizes: impl IntoIterator<Item = (K, usize)>,
    mut k: usize,
) -> Option<(K, usize)> {
    for (key, size) in sizes {
        if k < size {
            return Some((key, k));
        }
        k -= size;
    }
    None
}

/// Draws and applies local extinctions.
///
/// The number of events is `Binomial(populations, cfg.ext_max)`. Each event
/// vacates one (species, site) pair chosen uniformly among all occupied
/// pairs at that moment.
///
/// ### Parameters
/// - `populations` - Current total number of occupied (species, site)
///   pairs.
///
/// ### Returns
/// The number of populations removed.
///
/// ### Errors
/// [`SimError::Binomial`] if `cfg.ext_max` is not a probability.
pub fn extinction_phase(
    tree: &mut SpeciesTree,
    populations: usize,
    cfg: &Config,
    rng: &mut impl Rng,
) -> Result<usize, SimError> {
    debug_assert_eq!(populations, tree.total_population());
    let events = Binomial::new(populations as u64, cfg.ext_max)?.sample(rng) as usize;

    let mut remaining = populations;
    let mut removed = 0;
    for _ in 0..events {
        if remaining == 0 {
            break;
        }
        // One uniform pick over every (species, site) pair still alive.
        let k = rng.random_range(0..remaining);
        let sizes: Vec<(SpeciesId, usize)> = tree
            .tips()
            .map(|s| (s.id(), s.population_count()))
            .collect();
        let Some((id, offset)) = pick_flattened(sizes, k) else {
            break;
        };
        if let Some(species) = tree.species_mut(id) {
            let site = species.locations().nth(offset).copied();
            if let Some(site) = site {
                species.remove_from(&site);
                remaining -= 1;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// Recomputes dispersal groups and draws speciation events.
///
/// Every tip species regroups its sites against `landscape`. The number of
/// events is `Binomial(total groups, rate)` where the rate comes from
/// [`Config::speciation_rate`]. Each event picks one (species, group) pair
/// uniformly from the groups counted at the start of the phase, splits the
/// species in the tree at date `t`, and moves the group's sites to the new
/// species. A group picked twice has nothing left to move the second time,
/// so its new species is born empty and is pruned at the end of the step.
///
/// ### Returns
/// The number of speciation events.
///
/// ### Errors
/// [`SimError::Binomial`] if the rate is not a probability.
pub fn speciation_phase(
    tree: &mut SpeciesTree,
    landscape: &Network<Point>,
    cfg: &Config,
    t: Date,
    rng: &mut impl Rng,
) -> Result<usize, SimError> {
    // Regroup
    let mut groups: Vec<(SpeciesId, usize)> = Vec::with_capacity(tree.num_species());
    for species in tree.tips_mut() {
        let n = species.recompute_groups(landscape);
        groups.push((species.id(), n));
    }
    let total: usize = groups.iter().map(|&(_, n)| n).sum();
    if total == 0 {
        return Ok(0);
    }

    // Draw events
    let rate = cfg.speciation_rate(tree.num_species());
    let events = Binomial::new(total as u64, rate)?.sample(rng) as usize;

    for _ in 0..events {
        let k = rng.random_range(0..total);
        let Some((parent, group)) = pick_flattened(groups.iter().copied(), k) else {
            continue;
        };
        // The picked group moves to the new lineage.
        let child = tree.speciate(parent, t);
        let sites = tree
            .species_mut(parent)
            .map(|s| s.extract_group(group))
            .unwrap_or_default();
        if let Some(species) = tree.species_mut(child) {
            species.add_all(sites);
        }
    }
    Ok(events)
}

/// Applies bounded normal noise to every tip's trait vector.
///
/// ### Returns
/// The number of species whose vector could not move within
/// `max_attempts` draws and was left unchanged.
pub fn drift_phase(
    tree: &mut SpeciesTree,
    noise: &Normal<f64>,
    max_attempts: usize,
    rng: &mut impl Rng,
) -> usize {
    let mut stuck = 0;
    for species in tree.tips_mut() {
        // A vector with no accepted draw keeps its value.
        if !white_noise(species.traits_mut(), rng, noise, TRAIT_RADIUS, max_attempts) {
            stuck += 1;
        }
    }
    if stuck > 0 {
        warn!("trait drift gave up on {stuck} species after {max_attempts} attempts");
    }
    stuck
}
