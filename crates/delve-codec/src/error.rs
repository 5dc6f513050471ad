//! Error types for the codec and diff engines.

use std::error::Error;
use std::fmt;

use delve_core::FormatError;

/// Errors from base64 decoding and the compression pre-pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// A byte outside the 64-symbol alphabet (and not padding).
    BadSymbol {
        /// The offending byte.
        byte: u8,
    },
    /// Padding in the middle of the text, or a quantum with too much of it.
    BadPadding,
    /// Encoded text length is not a multiple of the 4-byte quantum.
    BadLength {
        /// The offending length.
        len: usize,
    },
    /// The `$<len>$` size prefix was malformed.
    BadSizePrefix {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The compressed payload failed to inflate.
    Inflate {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The inflated payload's size disagrees with the `$<len>$` prefix.
    SizeMismatch {
        /// Size promised by the prefix.
        expected: usize,
        /// Size actually produced.
        actual: usize,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSymbol { byte } => write!(f, "byte {byte:#04x} is not a base64 symbol"),
            Self::BadPadding => write!(f, "misplaced base64 padding"),
            Self::BadLength { len } => {
                write!(f, "base64 text length {len} is not a multiple of 4")
            }
            Self::BadSizePrefix { detail } => write!(f, "bad size prefix: {detail}"),
            Self::Inflate { detail } => write!(f, "inflate failed: {detail}"),
            Self::SizeMismatch { expected, actual } => {
                write!(
                    f,
                    "inflated size {actual} does not match size prefix {expected}"
                )
            }
        }
    }
}

impl Error for CodecError {}

impl From<CodecError> for FormatError {
    fn from(e: CodecError) -> Self {
        FormatError::BadEncoding {
            detail: e.to_string(),
        }
    }
}

/// Errors from applying a diff opcode stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffError {
    /// The stream ended inside an opcode or its operand.
    Truncated {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A COPY would read past the end of the old buffer.
    CopyOutOfRange {
        /// Read cursor at the time of the COPY.
        cursor: usize,
        /// Requested run length.
        len: usize,
        /// Length of the old buffer.
        old_len: usize,
    },
    /// A SEEK targets an offset past the end of the old buffer.
    SeekOutOfRange {
        /// The requested absolute offset.
        offset: usize,
        /// Length of the old buffer.
        old_len: usize,
    },
    /// A SEEK opcode whose operand-size field is not 4.
    BadSeekOperand {
        /// The operand size found.
        len: usize,
    },
    /// The reserved opcode tag 3 was encountered.
    UnknownOpcode,
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { detail } => write!(f, "truncated diff stream: {detail}"),
            Self::CopyOutOfRange {
                cursor,
                len,
                old_len,
            } => write!(
                f,
                "COPY of {len} bytes at cursor {cursor} exceeds old buffer of {old_len}"
            ),
            Self::SeekOutOfRange { offset, old_len } => {
                write!(f, "SEEK to {offset} exceeds old buffer of {old_len}")
            }
            Self::BadSeekOperand { len } => {
                write!(f, "SEEK operand size {len} (expected 4)")
            }
            Self::UnknownOpcode => write!(f, "reserved diff opcode tag 3"),
        }
    }
}

impl Error for DiffError {}

impl From<DiffError> for FormatError {
    fn from(e: DiffError) -> Self {
        FormatError::BadEncoding {
            detail: e.to_string(),
        }
    }
}
