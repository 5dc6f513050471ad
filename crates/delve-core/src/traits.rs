//! Collaborator traits connecting the engine to the surrounding game.

use std::fs::File;

use crate::command::{CommandEffect, CommandRecord, Direction, Position};
use crate::error::{FormatError, InputError};
use crate::id::Fingerprint;
use crate::interact::{Gesture, KeyPress, MenuEntry, Selection};

/// The simulation under record or replay.
///
/// The engine treats simulation state as an opaque byte blob; the
/// simulation owns its data model and its pseudo-random generator.
pub trait Simulation {
    /// Serialize the complete simulation state to an opaque byte buffer.
    ///
    /// Two states that behave identically must serialize identically:
    /// snapshot diffing and seek verification both compare these bytes.
    fn serialize_state(&self) -> Vec<u8>;

    /// Restore the simulation from a buffer previously produced by
    /// [`serialize_state`](Simulation::serialize_state).
    fn restore_state(&mut self, bytes: &[u8]) -> Result<(), FormatError>;

    /// A 16-bit digest of the pseudo-random generator's current state.
    ///
    /// Must be a pure function of generator state: sampling it must not
    /// advance the generator.
    fn rng_fingerprint(&self) -> Fingerprint;

    /// Apply one command, pulling any externally-sourced answers from
    /// `input`. The same implementation serves live play and replay.
    fn perform(
        &mut self,
        cmd: &CommandRecord,
        input: &mut dyn InputSource,
    ) -> Result<CommandEffect, InputError>;
}

/// The single call shape through which the simulation receives
/// externally-sourced data.
///
/// In live mode answers are solicited from a [`Prompter`] and appended
/// to the log; in replay mode they are read back from the log. The
/// simulation cannot tell the difference.
pub trait InputSource {
    /// Ask for a direction.
    fn ask_direction(&mut self, prompt: &str) -> Result<Direction, InputError>;

    /// Ask for a map position; also returns the terminating gesture.
    fn ask_position(&mut self, prompt: &str) -> Result<(Position, Gesture), InputError>;

    /// Ask for a key, with an optional repeat-count prefix.
    fn ask_key(&mut self, prompt: &str) -> Result<KeyPress, InputError>;

    /// Ask for a free-text line.
    fn ask_line(&mut self, prompt: &str) -> Result<String, InputError>;

    /// Ask a yes/no question. `default` is the answer a bare return
    /// gives in a live session; it is not recorded.
    fn ask_yes_no(&mut self, prompt: &str, default: bool) -> Result<bool, InputError>;

    /// Offer a menu and return the selected entry identifiers.
    fn ask_menu(&mut self, prompt: &str, entries: &[MenuEntry]) -> Result<Selection, InputError>;

    /// Offer an object list and return the selected identifiers.
    fn ask_objects(&mut self, prompt: &str, entries: &[MenuEntry])
        -> Result<Selection, InputError>;

    /// Request an external bones payload, if one exists.
    ///
    /// Bones files are nondeterministic input (another game's leavings
    /// found on disk), so their bytes are logged just like answers.
    fn ask_bones(&mut self) -> Result<Option<Vec<u8>>, InputError>;
}

/// A sink for human-readable renderings of answers.
///
/// Echoed in every mode so spectators see what happened regardless of
/// whether the session is live or replayed.
pub trait Transcript {
    /// Append one line to the transcript.
    fn echo(&mut self, line: &str);
}

/// The outcome of one live prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply<T> {
    /// The collaborator produced an answer.
    Answer(T),
    /// The prompt was cancelled mid-flight (a spectator reconnected, a
    /// server interrupted a stalled client). The entire primitive is
    /// retried; nothing is recorded.
    Cancelled,
}

/// The UI/network collaborator that solicits answers from a human or a
/// remote client.
///
/// Every method blocks until an answer or a cancellation is available;
/// timeouts are the collaborator's responsibility.
pub trait Prompter: Transcript {
    /// Solicit a direction.
    fn pick_direction(&mut self, prompt: &str) -> Reply<Direction>;

    /// Solicit a map position and terminating gesture.
    fn pick_position(&mut self, prompt: &str) -> Reply<(Position, Gesture)>;

    /// Solicit a key, with an optional count prefix.
    fn query_key(&mut self, prompt: &str) -> Reply<KeyPress>;

    /// Solicit a free-text line.
    fn get_line(&mut self, prompt: &str) -> Reply<String>;

    /// Solicit a yes/no answer.
    fn yes_no(&mut self, prompt: &str, default: bool) -> Reply<bool>;

    /// Display a menu and solicit a selection.
    fn display_menu(&mut self, prompt: &str, entries: &[MenuEntry]) -> Reply<Selection>;

    /// Display an object list and solicit a selection.
    fn display_objects(&mut self, prompt: &str, entries: &[MenuEntry]) -> Reply<Selection>;

    /// Fetch an external bones payload, if the host has one to offer.
    fn fetch_bones(&mut self) -> Option<Vec<u8>> {
        None
    }
}

/// Whole-file advisory locking, owned by a collaborator outside this
/// core.
///
/// Contention is a distinct, retryable condition, never an I/O
/// failure.
pub trait LogLock {
    /// Try to take the exclusive write lock. Returns `false` if another
    /// writer holds it.
    fn acquire_exclusive(&mut self, file: &File) -> bool;

    /// Release a previously acquired lock.
    fn release(&mut self, file: &File);
}

/// A no-op [`LogLock`] for single-process use and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLock;

impl LogLock for NullLock {
    fn acquire_exclusive(&mut self, _file: &File) -> bool {
        true
    }

    fn release(&mut self, _file: &File) {}
}
