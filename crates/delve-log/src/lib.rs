//! The Delve log file: a rewritable fixed-width header plus an
//! append-only body of newline-delimited ASCII tokens.
//!
//! The file is modelled as two logical regions with separate
//! capabilities (the mutable 39-byte status record at offset zero, and
//! the append-only body behind it) so sequential-writer assumptions
//! can never leak into header handling.
//!
//! - [`Header`] / [`LogStatus`]: the fixed status record.
//! - [`wire`]: text encoding and parsing of every body token.
//! - [`LogWriter`]: the exclusive writer used by a live game.
//! - [`scan`]: the read-only tokenizer and the [`query_status`] fast
//!   path.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod header;
pub mod scan;
pub mod wire;
pub mod writer;

pub use error::LogError;
pub use header::{Header, LogStatus, FORMAT_VERSION, HEADER_LEN, MAGIC};
pub use scan::{query_status, read_log, tokenize, GameSummary, LogContents};
pub use wire::BodyToken;
pub use writer::LogWriter;
