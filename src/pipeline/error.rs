//! Error types and reporting for pipeline stations.

use crate::error::LarynxError;
use std::fmt;

/// Errors that can occur during station processing.
#[derive(Debug, Clone)]
pub enum StationError {
    /// Recoverable error that allows the station to continue processing.
    Recoverable(String),
    /// Fatal error that tears the recording session down.
    Fatal(String),
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StationError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

/// Trait for reporting station errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a station.
    fn report(&self, station: &str, error: &StationError);
}

/// Simple error reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, station: &str, error: &StationError) {
        eprintln!("larynx: [{}] {}", station, error);
    }
}

/// Reporter that forwards fatal errors to the controller's watchdog.
///
/// Recoverable errors are logged and processing continues; fatal errors are
/// sent down the channel so the controller can tear the session down and
/// surface the failure, never leaving the state machine stuck mid-session.
pub struct ChannelReporter {
    fatal_tx: crossbeam_channel::Sender<LarynxError>,
}

impl ChannelReporter {
    pub fn new(fatal_tx: crossbeam_channel::Sender<LarynxError>) -> Self {
        Self { fatal_tx }
    }
}

impl ErrorReporter for ChannelReporter {
    fn report(&self, station: &str, error: &StationError) {
        match error {
            StationError::Recoverable(_) => {
                eprintln!("larynx: [{}] {}", station, error);
            }
            StationError::Fatal(msg) => {
                eprintln!("larynx: [{}] {}", station, error);
                // Watchdog gone means teardown already happened; nothing to do.
                let _ = self.fatal_tx.send(LarynxError::Engine {
                    message: format!("{station}: {msg}"),
                });
            }
        }
    }
}
