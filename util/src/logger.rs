//! # Session logger
//!
//! Log output for the bridge goes to two sinks: stdout, coloured and
//! filtered to the requested level, and the session's log file, plain text
//! and always at trace level so a quiet console never loses the record of a
//! run.
//!
//! Timestamps are seconds since the session epoch, which keeps the log
//! aligned with the record stamps produced during the same run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use fern;
use log::{self, info};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(#[from] log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise logging for this execution.
///
/// `stdout_level` bounds what reaches the console. The session's log file
/// always receives everything down to trace, so a run can be diagnosed
/// after the fact without re-running it at a noisier level.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    stdout_level: LevelFilter,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    let stdout_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            // Below debug the target just adds noise on the console
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    session::get_elapsed_seconds(),
                    coloured_level_tag(record.level()),
                    record.target(),
                    message
                ))
            }
            else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    session::get_elapsed_seconds(),
                    coloured_level_tag(record.level()),
                    message
                ))
            }
        })
        .level(stdout_level)
        .chain(std::io::stdout());

    let file_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            // No colour escapes in the file, it is read offline
            out.finish(format_args!(
                "[{:10.6} {}] {}: {}",
                session::get_elapsed_seconds(),
                level_tag(record.level()),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Trace)
        .chain(
            fern::log_file(session.log_file_path.clone())
                .map_err(LoggerInitError::LogFileInitError)?,
        );

    fern::Dispatch::new()
        // The socket monitor threads are chatty below info
        .level_for("zmq", LevelFilter::Info)
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Stdout log level: {:?}", stdout_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the plain string representation of a log level
fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Trace => "TRC",
        log::Level::Debug => "DBG",
        log::Level::Info => "INF",
        log::Level::Warn => "WRN",
        log::Level::Error => "ERR",
    }
}

/// Get the coloured string representation of a log level
fn coloured_level_tag(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => level_tag(level).dimmed().italic(),
        log::Level::Debug => level_tag(level).dimmed(),
        log::Level::Info => level_tag(level).normal(),
        log::Level::Warn => level_tag(level).yellow(),
        log::Level::Error => level_tag(level).red().bold(),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_tags_are_fixed_width() {
        let levels = [
            log::Level::Trace,
            log::Level::Debug,
            log::Level::Info,
            log::Level::Warn,
            log::Level::Error,
        ];

        for level in levels.iter() {
            assert_eq!(level_tag(*level).len(), 3);
        }
    }
}
