//! Timestamped logger behind the `log` facade.
//!
//! Lines go to stderr and, when a log file is configured, are appended to it
//! as well. Multi-line messages are split so every line carries its own stamp.

use chrono::Utc;
use log_dep::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use once_cell::sync::OnceCell;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::Path,
    sync::Mutex,
};

static LOGGER: OnceCell<Logger> = OnceCell::new();

pub fn timestamped(data: &str) -> String {
    format!("[{}] {}", Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"), data)
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().append(true).create(true).open(path)
}

pub struct Logger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(level: LevelFilter, log_file: Option<&Path>) -> io::Result<Logger> {
        let file = match log_file {
            Some(path) => Some(Mutex::new(open_append(path)?)),
            None => None,
        };
        Ok(Logger { level, file })
    }

    fn format_line(record: &Record, line: &str) -> String {
        match record.level() {
            Level::Info => timestamped(line),
            level => timestamped(&format!("{level}: {line}")),
        }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();
        let mut stderr = io::stderr().lock();
        let mut file = self.file.as_ref().and_then(|file| file.lock().ok());
        for line in message.split('\n') {
            let line = Logger::format_line(record, line);
            // Nowhere left to report a failed log write.
            let _ = writeln!(stderr, "{line}");
            if let Some(file) = file.as_mut() {
                let _ = writeln!(file, "{line}");
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Some(Ok(mut file)) = self.file.as_ref().map(|file| file.lock()) {
            let _ = file.flush();
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Could not open log file: {0}")]
    Open(#[from] io::Error),
    #[error("Logger already initialized.")]
    AlreadyInitialized,
    #[error("{0}")]
    SetLogger(#[from] SetLoggerError),
}

/// Installs the process-wide logger. Can only succeed once.
pub fn init(level: LevelFilter, log_file: Option<&Path>) -> Result<(), InitError> {
    let logger = LOGGER
        .try_insert(Logger::new(level, log_file)?)
        .map_err(|_| InitError::AlreadyInitialized)?;
    log_dep::set_logger(logger)?;
    log_dep::set_max_level(level);
    Ok(())
}
