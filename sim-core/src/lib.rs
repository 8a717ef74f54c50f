//! Core library of a spatial speciation simulator.
//!
//! Species occupy sites of a random geometric landscape, migrate between
//! neighboring sites, go locally extinct and split when their range breaks
//! into disjoint groups. The phylogeny of the extant species is tracked
//! throughout and reported as Newick strings.
//!
//! Main components:
//! - [`point`] - 2-D sites with a total order.
//! - [`network`] - adjacency-set graph and random geometric landscapes.
//! - [`phylogeny`] - arena of branch nodes addressed by stable handles.
//! - [`species`] - occupied sites, dispersal groups and traits of a species.
//! - [`species_tree`] - speciation and pruning of extinct tips.
//! - [`traits`] - trait vectors inside a bounded ball.
//! - [`model`] - model variants.
//! - [`config`] - run parameters.
//! - [`phases`] - per-step migration, extinction, speciation and drift.
//! - [`simulation`] - setup and the time loop.
//! - [`report`] - reporters and XML renderers.
//! - [`error`] - error types.
//! - [`types`] - shared type aliases and IDs.

pub mod config;
pub mod error;
pub mod model;
pub mod network;
pub mod phases;
pub mod phylogeny;
pub mod point;
pub mod report;
pub mod simulation;
pub mod species;
pub mod species_tree;
pub mod traits;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, SimError};
pub use model::Model;
pub use report::{NullReporter, RecordingReporter, Reporter};
pub use simulation::{RunHistory, Simulation, simulate};
