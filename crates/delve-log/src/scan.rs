//! Read-side tokenization and the header-only status fast path.
//!
//! Readers never coordinate with the writer: the body is append-only
//! and the header is a fixed-size region re-read on each poll. Bytes
//! past the header's valid length are ignored, which is how a crashed
//! writer's torn tail reads as a log that simply ends early.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use delve_core::{FormatError, GameOption};

use crate::error::LogError;
use crate::header::{Header, LogStatus, HEADER_LEN};
use crate::wire::{parse_token, BodyToken};

/// A fully tokenized log: the header plus every body token with the
/// byte offset of its line.
#[derive(Clone, Debug)]
pub struct LogContents {
    /// The fixed header as last committed by the writer.
    pub header: Header,
    /// Body tokens in file order, each with its line's byte offset.
    pub tokens: Vec<(u64, BodyToken)>,
}

/// Tokenize an in-memory copy of a log file.
///
/// Only bytes up to the header's valid length are parsed; a trailing
/// partial line beyond it is the normal crash shape and is ignored,
/// while a partial line *inside* the valid region is a format error.
pub fn tokenize(bytes: &[u8]) -> Result<LogContents, FormatError> {
    let header = Header::decode(bytes)?;

    // valid_length == 0 is the just-created shape: the writer died
    // before committing its preamble. The body is simply empty.
    let valid = (header.valid_length as usize).max(HEADER_LEN);
    if valid > bytes.len() {
        return Err(FormatError::Truncated {
            detail: format!(
                "header claims {valid} valid bytes but the file has {}",
                bytes.len()
            ),
        });
    }

    let body = &bytes[HEADER_LEN..valid];
    let mut tokens = Vec::new();
    let mut offset = HEADER_LEN as u64;
    for line in body.split_inclusive(|&b| b == b'\n') {
        let Some(line) = line.strip_suffix(b"\n") else {
            return Err(FormatError::Truncated {
                detail: format!("partial token line at offset {offset} inside the valid region"),
            });
        };
        let text = std::str::from_utf8(line).map_err(|_| FormatError::BadEncoding {
            detail: format!("token line at offset {offset} is not ASCII"),
        })?;
        tokens.push((offset, parse_token(text)?));
        offset += line.len() as u64 + 1;
    }
    Ok(LogContents { header, tokens })
}

/// Read and tokenize a log file from disk.
pub fn read_log(path: &Path) -> Result<LogContents, LogError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    Ok(tokenize(&bytes)?)
}

/// What a game-listing UI needs to know about a log, without paying
/// for full tokenization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSummary {
    /// Lifecycle status from the header.
    pub status: LogStatus,
    /// Number of commands recorded.
    pub action_count: u32,
    /// Birth/game options from the preamble.
    pub options: Vec<GameOption>,
    /// Timezone offset from the preamble, if logged.
    pub timezone_offset: Option<i32>,
}

/// Longest preamble `query_status` will scan before giving up on
/// metadata. Identifying options sit at the very front of the body, so
/// this is generous.
const PREAMBLE_SCAN_LIMIT: usize = 64 * 1024;

/// Fast status query: read the fixed header, then scan only the
/// preamble (option and timezone lines) for identifying metadata.
///
/// Stops at the first token that is not preamble material, so a
/// million-turn game costs the same as a fresh one.
pub fn query_status(path: &Path) -> Result<GameSummary, LogError> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; HEADER_LEN + PREAMBLE_SCAN_LIMIT];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    summarize(&buf)
}

fn summarize(bytes: &[u8]) -> Result<GameSummary, LogError> {
    let header = Header::decode(bytes)?;
    let valid = (header.valid_length as usize).max(HEADER_LEN).min(bytes.len());

    let mut summary = GameSummary {
        status: header.status,
        action_count: header.action_count,
        options: Vec::new(),
        timezone_offset: None,
    };

    let body = &bytes[HEADER_LEN..valid];
    for line in body.split_inclusive(|&b| b == b'\n') {
        let Some(line) = line.strip_suffix(b"\n") else {
            break;
        };
        // Preamble tags only; the first command (or anything else)
        // ends the scan.
        if !matches!(line.first(), Some(b'!') | Some(b'T')) {
            break;
        }
        let text = std::str::from_utf8(line).map_err(|_| FormatError::BadEncoding {
            detail: "preamble line is not ASCII".into(),
        })?;
        match parse_token(text)? {
            BodyToken::Option(opt) => summary.options.push(opt),
            BodyToken::Timezone(offset) => summary.timezone_offset = Some(offset),
            _ => break,
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode_token;
    use delve_core::{Fingerprint, OptionValue};

    fn build_log(tokens: &[BodyToken]) -> Vec<u8> {
        let mut body = Vec::new();
        for token in tokens {
            body.extend_from_slice(encode_token(token).as_bytes());
            body.push(b'\n');
        }
        let header = Header {
            status: LogStatus::InProgress,
            valid_length: (HEADER_LEN + body.len()) as u32,
            action_count: 0,
            version: crate::header::FORMAT_VERSION,
        };
        let mut bytes = header.encode();
        bytes.extend_from_slice(&body);
        bytes
    }

    #[test]
    fn tokenize_preserves_order_and_offsets() {
        let tokens = vec![
            BodyToken::Timezone(3600),
            BodyToken::Fingerprint(Fingerprint(0xbeef)),
        ];
        let bytes = build_log(&tokens);
        let contents = tokenize(&bytes).unwrap();
        assert_eq!(contents.tokens.len(), 2);
        assert_eq!(contents.tokens[0].0, HEADER_LEN as u64);
        assert_eq!(contents.tokens[0].1, tokens[0]);
        assert_eq!(contents.tokens[1].1, tokens[1]);
    }

    #[test]
    fn bytes_beyond_valid_length_are_ignored() {
        let mut bytes = build_log(&[BodyToken::Timezone(0)]);
        // A torn tail: half a token line past the committed boundary.
        bytes.extend_from_slice(b">1a2b:3");
        let contents = tokenize(&bytes).unwrap();
        assert_eq!(contents.tokens.len(), 1);
    }

    #[test]
    fn partial_line_inside_valid_region_rejected() {
        let mut bytes = build_log(&[BodyToken::Timezone(0)]);
        bytes.extend_from_slice(b">1a2b:3");
        // A header that (wrongly) vouches for the torn tail.
        let bad = Header {
            status: LogStatus::InProgress,
            valid_length: bytes.len() as u32,
            action_count: 0,
            version: crate::header::FORMAT_VERSION,
        };
        bytes[..HEADER_LEN].copy_from_slice(&bad.encode());
        assert!(matches!(
            tokenize(&bytes),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn valid_length_past_file_end_rejected() {
        let mut bytes = build_log(&[BodyToken::Timezone(0)]);
        let bad = Header {
            status: LogStatus::InProgress,
            valid_length: bytes.len() as u32 + 100,
            action_count: 0,
            version: crate::header::FORMAT_VERSION,
        };
        bytes[..HEADER_LEN].copy_from_slice(&bad.encode());
        assert!(matches!(
            tokenize(&bytes),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn zero_valid_length_is_an_empty_body() {
        let mut bytes = Header::new().encode();
        bytes.extend_from_slice(b"garbage the writer never committed");
        let contents = tokenize(&bytes).unwrap();
        assert!(contents.tokens.is_empty());
    }

    #[test]
    fn summarize_collects_preamble_only() {
        let bytes = build_log(&[
            BodyToken::Option(GameOption {
                name: "role".into(),
                value: OptionValue::Text("caveman".into()),
            }),
            BodyToken::Timezone(-7200),
            BodyToken::Fingerprint(Fingerprint(1)),
            BodyToken::Option(GameOption {
                name: "late".into(),
                value: OptionValue::Bool(true),
            }),
        ]);
        let summary = summarize(&bytes).unwrap();
        assert_eq!(summary.status, LogStatus::InProgress);
        assert_eq!(summary.options.len(), 1);
        assert_eq!(summary.options[0].name, "role");
        assert_eq!(summary.timezone_offset, Some(-7200));
    }
}
