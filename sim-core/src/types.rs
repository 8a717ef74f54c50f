/// Identifier for a node in a [`crate::phylogeny::Phylogeny`].
///
/// This is an index into the phylogeny's node arena, and is only meaningful
/// within the lifetime of a given `Phylogeny` instance. Handles of pruned
/// nodes are never handed out again.
pub type NodeId = usize;

/// Unique, monotonically increasing identifier of a species within one run.
pub type SpeciesId = usize;

/// Dispersal-group tag assigned by [`crate::species::Species::recompute_groups`].
pub type GroupId = usize;

/// Discrete simulation time step.
pub type Date = usize;
