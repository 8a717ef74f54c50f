//! Result reporting.
//!
//! A [`Reporter`] receives the landscape once it is built, a snapshot of the
//! species tree at every power-of-two step, and the finished run history.
//! The renderers in this module produce the flat XML formats; where the
//! bytes end up is the reporter's business.

use std::io::{self, Write};

use crate::{
    config::Config,
    network::Network,
    point::Point,
    simulation::RunHistory,
    species::Species,
    species_tree::SpeciesTree,
    types::Date,
};

/// Sink for the outputs of one run.
///
/// Every hook defaults to doing nothing.
pub trait Reporter {
    /// Called once, right after a connected landscape was drawn.
    fn landscape(&mut self, _seed: u64, _landscape: &Network<Point>) -> io::Result<()> {
        Ok(())
    }

    /// Called at every snapshot step, after the tips were stamped with `t`.
    fn snapshot(&mut self, _seed: u64, _t: Date, _tree: &SpeciesTree) -> io::Result<()> {
        Ok(())
    }

    /// Called once the time loop has ended.
    fn finish(&mut self, _cfg: &Config, _history: &RunHistory) -> io::Result<()> {
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {}

/// Keeps every rendered document in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub graphml: Option<String>,
    pub snapshots: Vec<(Date, String)>,
    pub report: Option<String>,
}

fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> io::Result<String> {
    let mut buf = Vec::new();
    f(&mut buf)?;
    String::from_utf8(buf).map_err(io::Error::other)
}

impl Reporter for RecordingReporter {
    fn landscape(&mut self, _seed: u64, landscape: &Network<Point>) -> io::Result<()> {
        self.graphml = Some(render(|w| write_graphml(w, landscape))?);
        Ok(())
    }

    fn snapshot(&mut self, _seed: u64, t: Date, tree: &SpeciesTree) -> io::Result<()> {
        let doc = render(|w| write_species_snapshot(w, t, tree))?;
        self.snapshots.push((t, doc));
        Ok(())
    }

    fn finish(&mut self, cfg: &Config, history: &RunHistory) -> io::Result<()> {
        self.report = Some(render(|w| write_run_report(w, cfg, history))?);
        Ok(())
    }
}

/// Writes the landscape as a directed GraphML graph.
///
/// Vertices are identified by their `(x, y)` rendering; each symmetric
/// edge appears once per direction.
pub fn write_graphml(w: &mut impl Write, net: &Network<Point>) -> io::Result<()> {
    writeln!(w, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        w,
        concat!(
            r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns""#,
            r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#,
            r#" xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns "#,
            r#"http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd">"#
        )
    )?;
    writeln!(w, r#"  <graph id="network" edgedefault="directed">"#)?;
    for v in net.vertices() {
        writeln!(w, r#"    <node id="{v}"/>"#)?;
    }
    for (v, neighbors) in net.iter() {
        for n in neighbors {
            writeln!(w, r#"    <edge source="{v}" target="{n}"/>"#)?;
        }
    }
    writeln!(w, "  </graph>\n</graphml>")
}

/// Writes the per-run report: parameters, Newick snapshots and the three
/// per-step series.
///
/// Model-specific parameters only appear for the models that use them.
pub fn write_run_report(w: &mut impl Write, cfg: &Config, history: &RunHistory) -> io::Result<()> {
    let model = cfg.model;

    writeln!(w, "<wagner>")?;
    writeln!(w, "   <version>{}</version>", env!("CARGO_PKG_VERSION"))?;
    writeln!(w, "   <model>{}</model>", model.name())?;
    writeln!(w, "   <shuffle>{}</shuffle>", u8::from(cfg.shuffle))?;
    writeln!(w, "   <master_seed>{}</master_seed>", history.seed)?;
    writeln!(w, "   <t_max>{}</t_max>", history.t_max)?;
    writeln!(w, "   <communities>{}</communities>", cfg.communities)?;
    writeln!(w, "   <radius>{}</radius>", cfg.radius)?;
    writeln!(w, "   <attempts>{}</attempts>", history.attempts)?;
    if model.has_traits() {
        writeln!(w, "   <num_traits>{}</num_traits>", cfg.traits)?;
        writeln!(w, "   <white_noise_std>{}</white_noise_std>", cfg.white_noise_std)?;
    }
    if model.has_aleph() {
        writeln!(w, "   <aleph>{}</aleph>", cfg.aleph)?;
    }
    writeln!(w, "   <speciation>{}</speciation>", cfg.speciation)?;
    if model.has_logistic_rate() {
        writeln!(w, "   <speciation_exp>{}</speciation_exp>", cfg.speciation_exp)?;
    }
    writeln!(w, "   <migration>{}</migration>", cfg.mig_max)?;
    writeln!(w, "   <extinction>{}</extinction>", cfg.ext_max)?;

    for (t, newick) in &history.newick {
        writeln!(w, "   <newick><t>{t}</t>{newick}</newick>")?;
    }

    for (tag, series) in [
        ("speciation_per_t", &history.speciation_per_t),
        ("extinctions_per_t", &history.extinctions_per_t),
        ("species_per_t", &history.species_per_t),
    ] {
        write!(w, "   <{tag}> ")?;
        for n in series {
            write!(w, "{n} ")?;
        }
        writeln!(w, "</{tag}>")?;
    }
    writeln!(w, "</wagner>")
}

/// One `<species>` line: id, centroid, every site with its group tag and
/// the trait vector.
///
/// Sites that have not been grouped since they were occupied carry the
/// group `-1`.
pub fn write_species_info(w: &mut impl Write, species: &Species) -> io::Result<()> {
    write!(w, "<species> <id>{}</id> <centroid>", species.id())?;
    if let Some(c) = species.centroid() {
        write!(w, "{c}")?;
    }
    write!(w, "</centroid> <locations>")?;
    for (p, group) in species.grouped_locations() {
        match group {
            Some(g) => write!(w, " <vertex><position>{p}</position><group>{g}</group></vertex>")?,
            None => write!(w, " <vertex><position>{p}</position><group>-1</group></vertex>")?,
        }
    }
    write!(w, "</locations> <traits>")?;
    for x in species.traits() {
        write!(w, " {x}")?;
    }
    write!(w, "</traits></species>")
}

/// Writes every extant species at step `t`.
pub fn write_species_snapshot(w: &mut impl Write, t: Date, tree: &SpeciesTree) -> io::Result<()> {
    writeln!(w, "<extant_species>")?;
    writeln!(w, "  <t>{t}</t>")?;
    for species in tree.tips() {
        write!(w, "  ")?;
        write_species_info(w, species)?;
        writeln!(w)?;
    }
    writeln!(w, "</extant_species>")
}
