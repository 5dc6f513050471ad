//! Error taxonomy for replay sessions.

use std::error::Error;
use std::fmt;
use std::io;

use delve_core::{FormatError, InputError};
use delve_log::LogError;
use delve_session::Divergence;

/// Errors from opening or driving a replay cursor.
///
/// Format problems and divergence are deliberately distinct variants:
/// the first means "this file is corrupt", the second means "this
/// replay does not match the recorded game".
#[derive(Debug)]
pub enum ReplayError {
    /// The log's bytes are malformed.
    Format(FormatError),
    /// A result fingerprint did not match the replayed simulation.
    Divergence(Divergence),
    /// Reading the log file failed.
    Io(io::Error),
    /// The cursor hit a fatal error earlier and is in its terminal
    /// failed state; the session cannot continue.
    Failed,
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "this recording cannot be replayed: {e}"),
            Self::Divergence(d) => {
                write!(f, "this replay does not match the recorded game: {d}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Failed => write!(f, "replay session already failed"),
        }
    }
}

impl Error for ReplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Format(e) => Some(e),
            Self::Divergence(d) => Some(d),
            Self::Io(e) => Some(e),
            Self::Failed => None,
        }
    }
}

impl From<FormatError> for ReplayError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<Divergence> for ReplayError {
    fn from(d: Divergence) -> Self {
        Self::Divergence(d)
    }
}

impl From<io::Error> for ReplayError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<LogError> for ReplayError {
    fn from(e: LogError) -> Self {
        match e {
            LogError::Io(io) => Self::Io(io),
            LogError::Format(fe) => Self::Format(fe),
            // A reader never takes the write lock; anything else from
            // the log layer is an I/O-shaped failure.
            other => Self::Io(io::Error::other(other.to_string())),
        }
    }
}

impl From<InputError> for ReplayError {
    fn from(e: InputError) -> Self {
        match e {
            InputError::Format(fe) => Self::Format(fe),
            InputError::Exhausted => Self::Format(FormatError::Truncated {
                detail: "simulation requested more input than was recorded".into(),
            }),
            InputError::Write(io) => Self::Io(io),
        }
    }
}
