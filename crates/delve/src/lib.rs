//! Delve: a deterministic command log and incremental-snapshot replay
//! engine for turn-based games.
//!
//! Delve records every piece of nondeterministic input a simulation
//! consumes (commands, prompt answers, external payloads) into an
//! append-only, crash-safe log, and reconstructs the simulation
//! byte-for-byte from that record. Periodic snapshots stored as diffs
//! against their predecessor let a viewer scrub to any point of a
//! million-turn game without replaying it from the start.
//!
//! This is the top-level facade crate re-exporting the public API from
//! all Delve sub-crates; for most users a single `delve` dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use delve::prelude::*;
//!
//! // The diff engine that keeps per-command log growth small: most
//! // state mutations touch a localized region of the serialization.
//! let before = b"@......d....$".to_vec();
//! let mut after = before.clone();
//! after[7] = b'.';
//! after[8] = b'@';
//!
//! let stream = delve::codec::diff(&before, &after);
//! assert_eq!(delve::codec::apply(&before, &stream).unwrap(), after);
//!
//! // The wire format every recorded answer travels through.
//! let token = InteractionToken::Direction(Direction::Southeast);
//! let line = delve::log::wire::encode_token(&delve::log::wire::BodyToken::Interaction(token));
//! assert_eq!(line, "d:3");
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `delve-core` | IDs, commands, interactions, collaborator traits |
//! | [`codec`] | `delve-codec` | Base64/packed codec and the snapshot diff engine |
//! | [`log`] | `delve-log` | Header, wire format, writer, tokenizer, status query |
//! | [`session`] | `delve-session` | Record/replay duality layer and determinism guard |
//! | [`replay`] | `delve-replay` | Replay cursor and seek engine |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`delve-core`).
///
/// Contains the command and interaction data model, the error
/// taxonomy, and the collaborator traits ([`types::Simulation`],
/// [`types::Prompter`], [`types::InputSource`], [`types::LogLock`]).
pub use delve_core as types;

/// Byte-level codecs (`delve-codec`).
///
/// The base64 text codec with its optional compression pre-pass, and
/// the SEEK/COPY/EDIT snapshot diff engine.
pub use delve_codec as codec;

/// The log file itself (`delve-log`).
///
/// Fixed rewritable header, append-only body, token wire format,
/// [`log::LogWriter`], the tokenizer, and [`log::query_status`].
pub use delve_log as log;

/// The record/replay duality layer (`delve-session`).
///
/// [`session::Session`] answers the simulation's questions from the
/// live prompter or from the log; [`session::GameSession`] drives a
/// live game's command loop.
pub use delve_session as session;

/// Replay cursor and seek engine (`delve-replay`).
///
/// [`replay::ReplayCursor`] scrubs a simulation through a recorded
/// log, verifying determinism at every move.
pub use delve_replay as replay;

/// Common imports for typical Delve usage.
///
/// ```rust
/// use delve::prelude::*;
/// ```
pub mod prelude {
    // Core data model and traits
    pub use delve_core::{
        CommandArg, CommandEffect, CommandId, CommandRecord, CommandTable, Direction, Fingerprint,
        GameClock, GameOption, Gesture, InputSource, InteractionToken, ItemLetter, KeyPress,
        LogLock, MenuEntry, MoveNumber, NewGameMeta, NullLock, OptionValue, Position, Prompter,
        Reply, Selection, Simulation, Transcript,
    };

    // Errors
    pub use delve_core::{FormatError, InputError};
    pub use delve_log::LogError;
    pub use delve_replay::ReplayError;
    pub use delve_session::{Divergence, SessionError};

    // Log surface
    pub use delve_log::{query_status, GameSummary, Header, LogStatus, LogWriter};

    // Live session
    pub use delve_session::{GameSession, Mode, Session, SessionConfig};

    // Replay
    pub use delve_replay::{CursorConfig, CursorState, ReplayCursor};
}
