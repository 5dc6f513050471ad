//! Strongly-typed identifiers used throughout the workspace.

use std::fmt;

/// Index of a command within a log, counting from 1.
///
/// `MoveNumber(0)` denotes the position immediately after the logged
/// new-game metadata, before the first command has been applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoveNumber(pub u64);

impl fmt::Display for MoveNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MoveNumber {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Index into the command-name table serialized at log creation.
///
/// Replay resolves a `CommandId` through the table recorded in the log,
/// never through the numbering of the running build, so two builds that
/// disagree on command numbering still replay each other's logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub u16);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for CommandId {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// In-game monotonic microsecond counter, sampled once per command.
///
/// This is simulation time, not wall-clock time: it advances only when
/// the simulation says game time passed, which keeps it identical
/// between a live run and its replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameClock(pub u64);

impl fmt::Display for GameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GameClock {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// A 16-bit digest of the simulation's pseudo-random generator state.
///
/// Sampled immediately after a command completes. For a given starting
/// state, command, and interaction answers, the fingerprint is a pure
/// function of the simulation; a mismatch during replay is conclusive
/// proof that two runs have diverged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u16);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl From<u16> for Fingerprint {
    fn from(v: u16) -> Self {
        Self(v)
    }
}
