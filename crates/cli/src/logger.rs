//! Stderr logger for the `diagram` binary.
//!
//! Every line carries a timestamp and a short id for the run, so output from
//! several runs piped into one file can be told apart.

use anyhow::Result;
use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use std::io::Write;
use uuid::Uuid;

pub struct DiagramLogger {
    level: LevelFilter,
    run_id: String,
}

impl DiagramLogger {
    pub fn new(level: LevelFilter) -> Self {
        let uuid = Uuid::new_v4().to_string();
        let run_id = uuid.split('-').next().unwrap_or("unknown").to_string();
        Self { level, run_id }
    }

    /// Installs the logger; `verbosity` is the number of `-v` flags
    pub fn init(verbosity: u8) -> Result<()> {
        let level = level_for(verbosity);
        let logger = Self::new(level);
        let run_id = logger.run_id.clone();
        log::set_boxed_logger(Box::new(logger))
            .map(|()| log::set_max_level(level))
            .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))?;
        log::debug!("logger initialized for run {run_id}");
        Ok(())
    }

    fn format(&self, record: &Record) -> String {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        format!(
            "{} {} {:<5} [{}] {}",
            timestamp,
            self.run_id,
            record.level(),
            record.target(),
            record.args()
        )
    }
}

pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

impl Log for DiagramLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = self.format(record);
            // a closed stderr is not worth failing over
            let _ = writeln!(std::io::stderr().lock(), "{line}");
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
