//! # Session logger
//!
//! Routes the `log` records of an executable, and of the libraries it runs
//! (gain table design, wiring, simulation), to stdout and to the session's
//! log file. Each record is stamped with the seconds elapsed since the
//! session epoch, so lines from the parallel gain design and the simulation
//! can be placed on one timeline.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{self, info, Record};
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal
use crate::session::{self, Session};

pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Targets which are capped at `Info`, their debug output drowns the
/// executable's own.
const QUIET_TARGETS: [&str; 2] = ["rayon", "rayon_core"];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Could not open the session log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger has already been set: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Start logging for the session.
///
/// `min_level` must be `Info` or more verbose so that construction summaries
/// always reach the log file. Only one logger may be set per process.
pub fn logger_init(min_level: LevelFilter, session: &Session) -> Result<(), LoggerInitError> {
    check_min_level(min_level)?;

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let dispatch = QUIET_TARGETS
        .iter()
        .fold(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("{}{}", prefix(record), message))
                })
                .level(min_level),
            |d, target| d.level_for(*target, LevelFilter::Info)
        );

    dispatch
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_min_level(min_level: LevelFilter) -> Result<(), LoggerInitError> {
    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    Ok(())
}

/// Timestamp and level tag of a record. Debug and trace records also carry
/// their target, which names the module that emitted them.
fn prefix(record: &Record) -> String {
    let elapsed = session::get_elapsed_seconds();

    if record.level() > log::Level::Info {
        format!("[{:10.6} {}] {}: ", elapsed, level_to_str(record.level()), record.target())
    }
    else {
        format!("[{:10.6} {}] ", elapsed, level_to_str(record.level()))
    }
}

fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}
