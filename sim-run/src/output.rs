//! Report files on disk.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use sim_core::{
    Config, RunHistory,
    network::Network,
    point::Point,
    report::{Reporter, write_graphml, write_run_report, write_species_snapshot},
    species_tree::SpeciesTree,
    types::Date,
};

/// Writes the landscape, the per-snapshot species lists and the run report
/// of one run as separate files, all named after the run's seed.
#[derive(Debug, Clone)]
pub struct FileReporter {
    dir: PathBuf,
    prefix: String,
    seed: u64,
}

impl FileReporter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, seed: u64) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            seed,
        }
    }

    /// `<prefix>-network-<seed>.graphml`
    pub fn network_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}-network-{}.graphml", self.prefix, self.seed))
    }

    /// `<prefix>-<seed>.xml`
    pub fn report_path(&self) -> PathBuf {
        self.dir.join(format!("{}-{}.xml", self.prefix, self.seed))
    }

    /// `<prefix>-species-<seed>-t<t>.xml`
    pub fn species_path(&self, t: Date) -> PathBuf {
        self.dir
            .join(format!("{}-species-{}-t{t}.xml", self.prefix, self.seed))
    }

    fn write_to(
        &self,
        path: PathBuf,
        f: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
    ) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut out = BufWriter::new(File::create(path)?);
        f(&mut out)?;
        out.flush()
    }
}

impl Reporter for FileReporter {
    fn landscape(&mut self, _seed: u64, landscape: &Network<Point>) -> io::Result<()> {
        self.write_to(self.network_path(), |w| write_graphml(w, landscape))
    }

    fn snapshot(&mut self, _seed: u64, t: Date, tree: &SpeciesTree) -> io::Result<()> {
        self.write_to(self.species_path(t), |w| {
            write_species_snapshot(w, t, tree)
        })
    }

    fn finish(&mut self, cfg: &Config, history: &RunHistory) -> io::Result<()> {
        self.write_to(self.report_path(), |w| write_run_report(w, cfg, history))
    }
}
