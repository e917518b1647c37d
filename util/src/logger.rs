//! Logger setup for the follower executables
//!
//! Everything goes through one `fern` dispatch. Modules which log on every
//! control cycle are listed separately so their output can be turned up for
//! a debugging run without flooding the log with every other module's trace.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{self, info};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Log levels for an execution.
#[derive(Debug, Clone, Copy)]
pub struct LogLevels<'a> {
    /// Level for every target not in `cycle_targets`
    pub min_level: LevelFilter,

    /// Module paths which log on every cycle, submodules included
    pub cycle_targets: &'a [&'static str],

    pub cycle_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The session log must include `INFO` messages, found a minimum level of `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution, writing to stdout and the
/// session's log file.
///
/// # Notes
///
/// - `levels.min_level` must be `Info` or more verbose, so the state
///   transitions of the follower always reach the session log.
/// - Only one logger can be set per process, a second call returns
///   `FernInitError`.
pub fn logger_init(
    levels: &LogLevels,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    if levels.min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(levels.min_level));
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    dispatch(levels)
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!(
        "    Log level: {:?}, per cycle: {:?}",
        levels.min_level, levels.cycle_level
    );
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

/// Initialise a stdout only logger, for tests and benchmarks which have no
/// session.
///
/// Any minimum level is accepted, including `Off`.
pub fn logger_init_stdout(levels: &LogLevels) -> Result<(), LoggerInitError> {
    dispatch(levels)
        .chain(std::io::stdout())
        .apply()
        .map_err(LoggerInitError::FernInitError)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Formatting and level filters shared by every output.
fn dispatch(levels: &LogLevels) -> fern::Dispatch {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            // If debug or trace include the target, otherwise don't include it
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    record.target(),
                    message
                ))
            }
            else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    message
                ))
            }
        })
        .level(levels.min_level);

    for target in levels.cycle_targets {
        dispatch = dispatch.level_for(*target, levels.cycle_level);
    }

    dispatch
}

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info => "INF".normal(),
        log::Level::Warn => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold(),
    }
}
