//! The fixed-width status header at offset zero.
//!
//! ```text
//! NHGAME <status:4ascii> <valid_length:8hex> <action_count:8hex> <version:8hex>\n
//! ```
//!
//! Exactly [`HEADER_LEN`] bytes, rewritten in place on every command
//! boundary and at finish. Every other byte of the file is append-only.

use std::fmt;

use delve_core::FormatError;

/// Magic word opening every log file.
pub const MAGIC: &str = "NHGAME";

/// Current format version, recorded in the header's version field.
///
/// History:
/// - v1: initial format.
pub const FORMAT_VERSION: u32 = 1;

/// Exact byte length of the header, newline included.
pub const HEADER_LEN: usize = 39;

/// Lifecycle status of a log, stored as a four-letter word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogStatus {
    /// The game is being played; the file is exclusively locked.
    InProgress,
    /// The game was suspended to be resumed later.
    Saved,
    /// The game ended; the log is complete.
    Done,
}

impl LogStatus {
    /// The four-letter status word written into the header.
    pub fn word(self) -> &'static str {
        match self {
            Self::InProgress => "inpr",
            Self::Saved => "save",
            Self::Done => "done",
        }
    }

    /// Parse a status word.
    pub fn from_word(word: &str) -> Result<Self, FormatError> {
        match word {
            "inpr" => Ok(Self::InProgress),
            "save" => Ok(Self::Saved),
            "done" => Ok(Self::Done),
            other => Err(FormatError::BadHeader {
                detail: format!("unknown status word '{other}'"),
            }),
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())
    }
}

/// The parsed fixed-width header.
///
/// # Examples
///
/// ```
/// use delve_log::{Header, LogStatus, HEADER_LEN};
///
/// let header = Header::new();
/// let bytes = header.encode();
/// assert_eq!(bytes.len(), HEADER_LEN);
/// assert!(bytes.starts_with(b"NHGAME inpr 00000000 00000000"));
/// assert_eq!(Header::decode(&bytes).unwrap(), header);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Lifecycle status of the log.
    pub status: LogStatus,
    /// Absolute byte offset up to which the file is known-good.
    pub valid_length: u32,
    /// Number of commands recorded so far.
    pub action_count: u32,
    /// Format version the file was written with.
    pub version: u32,
}

impl Header {
    /// A fresh header for a just-created log: in progress, nothing
    /// valid yet.
    pub fn new() -> Self {
        Self {
            status: LogStatus::InProgress,
            valid_length: 0,
            action_count: 0,
            version: FORMAT_VERSION,
        }
    }

    /// Encode to the exact [`HEADER_LEN`]-byte wire form.
    pub fn encode(&self) -> Vec<u8> {
        let text = format!(
            "{MAGIC} {} {:08x} {:08x} {:08x}\n",
            self.status.word(),
            self.valid_length,
            self.action_count,
            self.version,
        );
        debug_assert_eq!(text.len(), HEADER_LEN);
        text.into_bytes()
    }

    /// Decode and validate a header from the start of a file.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::BadHeader {
                detail: format!("file is {} bytes, header needs {HEADER_LEN}", bytes.len()),
            });
        }
        let text =
            std::str::from_utf8(&bytes[..HEADER_LEN]).map_err(|_| FormatError::BadHeader {
                detail: "header is not ASCII".into(),
            })?;
        let text = text.strip_suffix('\n').ok_or(FormatError::BadHeader {
            detail: "header missing terminating newline".into(),
        })?;

        let mut fields = text.split(' ');
        let magic = fields.next().unwrap_or_default();
        if magic != MAGIC {
            return Err(FormatError::BadHeader {
                detail: format!("bad magic '{magic}'"),
            });
        }
        let status = LogStatus::from_word(fields.next().unwrap_or_default())?;
        let valid_length = parse_field(fields.next(), "valid length")?;
        let action_count = parse_field(fields.next(), "action count")?;
        let version = parse_field(fields.next(), "version")?;
        if fields.next().is_some() {
            return Err(FormatError::BadHeader {
                detail: "trailing fields".into(),
            });
        }
        if version != FORMAT_VERSION {
            return Err(FormatError::BadHeader {
                detail: format!("unsupported format version {version}"),
            });
        }
        Ok(Self {
            status,
            valid_length,
            action_count,
            version,
        })
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_field(field: Option<&str>, what: &str) -> Result<u32, FormatError> {
    let field = field.ok_or_else(|| FormatError::BadHeader {
        detail: format!("missing {what} field"),
    })?;
    if field.len() != 8 {
        return Err(FormatError::BadHeader {
            detail: format!("{what} field is {} chars, expected 8", field.len()),
        });
    }
    u32::from_str_radix(field, 16).map_err(|_| FormatError::BadHeader {
        detail: format!("{what} field '{field}' is not hex"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_header_wire_shape() {
        let bytes = Header::new().encode();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            "NHGAME inpr 00000000 00000000 00000001\n"
        );
    }

    #[test]
    fn roundtrip_all_statuses() {
        for status in [LogStatus::InProgress, LogStatus::Saved, LogStatus::Done] {
            let header = Header {
                status,
                valid_length: 0xdead_beef,
                action_count: 42,
                version: FORMAT_VERSION,
            };
            assert_eq!(Header::decode(&header.encode()).unwrap(), header);
        }
    }

    #[test]
    fn short_file_rejected() {
        assert!(matches!(
            Header::decode(b"NHGAME inpr"),
            Err(FormatError::BadHeader { .. })
        ));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = Header::new().encode();
        bytes[0] = b'X';
        assert!(matches!(
            Header::decode(&bytes),
            Err(FormatError::BadHeader { .. })
        ));
    }

    #[test]
    fn unknown_status_rejected() {
        let bytes = b"NHGAME zzzz 00000000 00000000 00000001\n";
        assert!(matches!(
            Header::decode(bytes),
            Err(FormatError::BadHeader { .. })
        ));
    }

    #[test]
    fn future_version_rejected() {
        let bytes = b"NHGAME inpr 00000000 00000000 00000063\n";
        assert!(matches!(
            Header::decode(bytes),
            Err(FormatError::BadHeader { .. })
        ));
    }

    #[test]
    fn non_hex_field_rejected() {
        let bytes = b"NHGAME inpr 0000zzzz 00000000 00000001\n";
        assert!(matches!(
            Header::decode(bytes),
            Err(FormatError::BadHeader { .. })
        ));
    }
}
