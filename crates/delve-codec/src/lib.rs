//! Byte-level codecs for the Delve log format.
//!
//! Two engines live here:
//!
//! - [`base64`] and [`pack`]: the text codec that embeds binary payloads
//!   in a line-oriented ASCII log, with an optional deflate pre-pass
//!   behind a `$<original-length>$` prefix.
//! - [`diff`]: the snapshot diff engine. Given two serializations of
//!   simulation state it produces a compact SEEK/COPY/EDIT opcode
//!   stream; applying the stream to the old buffer reproduces the new
//!   one byte for byte.
//!
//! All decoding is strict: any malformed input is a typed error, never
//! a best-effort result.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod base64;
pub mod diff;
pub mod error;
pub mod pack;

pub use diff::{apply, diff};
pub use error::{CodecError, DiffError};
pub use pack::{decode_packed, encode_packed, encoded_len_bound};
