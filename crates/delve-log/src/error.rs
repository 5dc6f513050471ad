//! Error type for log writing and reading.

use std::error::Error;
use std::fmt;
use std::io;

use delve_core::FormatError;

/// Errors from the log writer and the read-side tokenizer.
#[derive(Debug)]
pub enum LogError {
    /// An I/O failure against the underlying file. Fatal to the writer:
    /// the log is load-bearing for crash recovery, so a writer that
    /// failed a write refuses all further operations.
    Io(io::Error),
    /// A structural problem in the file's bytes.
    Format(FormatError),
    /// Another writer holds the exclusive lock. Retryable; never
    /// conflated with an I/O failure.
    LockHeld,
    /// An earlier write failed and the writer refuses to continue.
    Poisoned,
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Format(e) => write!(f, "format error: {e}"),
            Self::LockHeld => write!(f, "log is locked by another writer"),
            Self::Poisoned => write!(f, "log writer poisoned by an earlier write failure"),
        }
    }
}

impl Error for LogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Format(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LogError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FormatError> for LogError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}
