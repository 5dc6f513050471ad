//! Replay cursor and seek engine for Delve command logs.
//!
//! [`ReplayCursor`] reconstructs a simulation from a recorded log. It
//! steps forward by replaying commands through the same duality layer
//! the live game used, verifies every result fingerprint, and steps
//! backward by restoring the nearest prior snapshot (diffs are
//! one-directional) and replaying the remainder. A small cache of
//! materialized snapshots keeps interactive scrubbing from ever
//! walking the diff chain from the start.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cursor;
pub mod error;

pub use cursor::{CursorConfig, CursorState, ReplayCursor};
pub use error::ReplayError;
