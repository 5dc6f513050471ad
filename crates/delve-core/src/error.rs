//! Error types shared across the workspace.
//!
//! Format problems are always distinguished from I/O failures and from
//! replay divergence so callers can explain "this file is corrupt",
//! "this write failed", and "this replay does not match the recorded
//! game" as three different conditions.

use std::error::Error;
use std::fmt;
use std::io;

/// A structural problem in a log file's bytes.
///
/// Always fatal to the current open or parse attempt, reported to the
/// caller, never silently skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// The fixed-width header at offset 0 could not be parsed.
    BadHeader {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A body line starts with a tag this build does not recognize.
    UnknownTag {
        /// The unrecognized tag character.
        tag: char,
    },
    /// A token ended before all of its fields were present.
    Truncated {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A numeric field could not be parsed or was out of range.
    BadNumber {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A base64, compression, or diff-opcode payload was undecodable.
    BadEncoding {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A command index lies outside the recorded command table.
    UnknownCommand {
        /// The out-of-range index.
        index: u16,
        /// Number of entries in the recorded table.
        table_len: usize,
    },
    /// A recorded token's tag does not match the primitive the
    /// simulation asked for during replay.
    TokenMismatch {
        /// Tag of the primitive the simulation requested.
        expected: char,
        /// Tag of the token actually found in the log.
        found: char,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadHeader { detail } => write!(f, "bad header: {detail}"),
            Self::UnknownTag { tag } => write!(f, "unknown token tag '{tag}'"),
            Self::Truncated { detail } => write!(f, "truncated token: {detail}"),
            Self::BadNumber { detail } => write!(f, "bad number: {detail}"),
            Self::BadEncoding { detail } => write!(f, "bad encoding: {detail}"),
            Self::UnknownCommand { index, table_len } => write!(
                f,
                "command index {index} outside the recorded table of {table_len} commands"
            ),
            Self::TokenMismatch { expected, found } => write!(
                f,
                "recorded token '{found}' does not answer a '{expected}' prompt"
            ),
        }
    }
}

impl Error for FormatError {}

/// An error surfaced to the simulation from an `ask(...)` call.
///
/// The simulation propagates these with `?`; it never needs to know
/// whether it is being recorded or replayed.
#[derive(Debug)]
pub enum InputError {
    /// The recorded answer was malformed or answered a different
    /// primitive (replay mode only).
    Format(FormatError),
    /// The log holds no more recorded input and no live collaborator is
    /// available to fall through to.
    Exhausted,
    /// Appending the answer to the log failed (live mode only). Fatal:
    /// the log is load-bearing for crash recovery.
    Write(io::Error),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "recorded input unusable: {e}"),
            Self::Exhausted => write!(f, "no more recorded input"),
            Self::Write(e) => write!(f, "failed to record answer: {e}"),
        }
    }
}

impl Error for InputError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Format(e) => Some(e),
            Self::Write(e) => Some(e),
            Self::Exhausted => None,
        }
    }
}

impl From<FormatError> for InputError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<io::Error> for InputError {
    fn from(e: io::Error) -> Self {
        Self::Write(e)
    }
}
