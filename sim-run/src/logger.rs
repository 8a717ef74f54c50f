use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Metadata, Record};

/// Prints `LEVEL [module] message` lines. Warnings and errors go to stderr,
/// everything else to stdout.
pub struct MinimalLogger {
    level: LevelFilter,
}

impl MinimalLogger {
    pub fn new(verbose: bool) -> Self {
        let level = if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        Self { level }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

fn colored_level(level: Level) -> ColoredString {
    let name = level.to_string();
    match level {
        Level::Error => name.red(),
        Level::Warn => name.yellow(),
        Level::Info => name.cyan(),
        Level::Debug => name.purple(),
        Level::Trace => name.normal(),
    }
}

/// Message body of a record: its module path relative to the simulation
/// crates, then the message. Records from the front end carry no module.
fn format_body(record: &Record) -> String {
    match record.target().strip_prefix("sim_core::") {
        Some(module) => format!("[{module}] {}", record.args()),
        None => record.args().to_string(),
    }
}

impl log::Log for MinimalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!("{:<5} {}", colored_level(record.level()), format_body(record));
        if record.level() <= Level::Warn {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    fn flush(&self) {}
}

/// Installs a [`MinimalLogger`] at `Debug` when `verbose`, `Info` otherwise.
pub fn init(verbose: bool) -> Result<(), log::SetLoggerError> {
    let logger = MinimalLogger::new(verbose);
    log::set_max_level(logger.level());
    log::set_boxed_logger(Box::new(logger))
}
