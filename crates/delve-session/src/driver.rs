//! The `GameSession` handle driving a live game's command loop.
//!
//! One process-wide "current log" is exactly the kind of hidden global
//! this design refuses to have; instead the surrounding game owns a
//! `GameSession`, opened at game start and closed at game end, and
//! passes it wherever recording happens.

use std::error::Error;
use std::fmt;
use std::fs::File;

use delve_core::{
    CommandEffect, CommandRecord, CommandTable, InputError, LogLock, NewGameMeta, Prompter,
    Simulation,
};
use delve_log::{LogError, LogStatus, LogWriter};

use crate::guard;
use crate::session::Session;

/// Recording policy for a live session.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Append a snapshot diff after every this many time-consuming
    /// commands. `0` disables periodic snapshots, leaving only the
    /// initial one (seeking such a log degrades to forward replay from
    /// the start).
    pub snapshot_every: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { snapshot_every: 50 }
    }
}

/// Errors from driving one command end-to-end.
#[derive(Debug)]
pub enum SessionError {
    /// The log writer failed; the game cannot safely continue.
    Log(LogError),
    /// An interaction failed (a write while appending an answer, or
    /// unusable recorded input during a resume).
    Input(InputError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log(e) => write!(f, "log failure: {e}"),
            Self::Input(e) => write!(f, "interaction failure: {e}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Log(e) => Some(e),
            Self::Input(e) => Some(e),
        }
    }
}

impl From<LogError> for SessionError {
    fn from(e: LogError) -> Self {
        Self::Log(e)
    }
}

impl From<InputError> for SessionError {
    fn from(e: InputError) -> Self {
        Self::Input(e)
    }
}

/// The explicitly passed handle owning a live game's log.
pub struct GameSession {
    writer: LogWriter,
    config: SessionConfig,
    since_snapshot: u32,
}

impl GameSession {
    /// Start a new game: create the log and wrap it in a session.
    pub fn begin_new_game(
        file: File,
        meta: &NewGameMeta,
        table: &CommandTable,
        sim: &dyn Simulation,
        lock: Box<dyn LogLock>,
        config: SessionConfig,
    ) -> Result<Self, LogError> {
        let writer = LogWriter::begin(file, meta, table, sim, lock)?;
        Ok(Self::from_writer(writer, config))
    }

    /// Wrap an already-open writer (e.g. one reopened after a save).
    pub fn from_writer(writer: LogWriter, config: SessionConfig) -> Self {
        Self {
            writer,
            config,
            since_snapshot: 0,
        }
    }

    /// Drive one command end-to-end: append the header, run the
    /// simulation with a record-mode [`Session`], then either revert
    /// (no game time passed) or seal with a fingerprint and possibly a
    /// snapshot.
    ///
    /// On an interaction failure the half-recorded command is reverted
    /// best-effort before the error is returned, so the log never ends
    /// on an unterminated command unless the process dies outright.
    pub fn perform_command(
        &mut self,
        sim: &mut dyn Simulation,
        prompter: &mut dyn Prompter,
        rec: &CommandRecord,
    ) -> Result<CommandEffect, SessionError> {
        self.writer.append_command(rec)?;

        let mut session = Session::record(&mut self.writer, prompter);
        let effect = match sim.perform(rec, &mut session) {
            Ok(effect) => effect,
            Err(e) => {
                let _ = self.writer.revert_last_command();
                return Err(e.into());
            }
        };

        match effect {
            CommandEffect::NoTime => {
                self.writer.revert_last_command()?;
            }
            CommandEffect::TookTime => {
                guard::seal(&mut self.writer, sim)?;
                self.since_snapshot += 1;
                if self.config.snapshot_every > 0 && self.since_snapshot >= self.config.snapshot_every
                {
                    self.writer.append_snapshot(sim)?;
                    self.since_snapshot = 0;
                }
            }
        }
        Ok(effect)
    }

    /// Number of commands recorded so far.
    pub fn action_count(&self) -> u32 {
        self.writer.action_count()
    }

    /// Access to the underlying writer, for operations the command
    /// loop does not cover (an extra snapshot before saving, say).
    pub fn writer_mut(&mut self) -> &mut LogWriter {
        &mut self.writer
    }

    /// Write the terminal status and release the log.
    pub fn finish(self, status: LogStatus) -> Result<(), LogError> {
        self.writer.finish(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::{CommandArg, CommandId, Direction, NullLock};
    use delve_test_utils::{
        MockDungeon, ScriptedPrompter, ScriptedReply, CMD_LOOK, CMD_SEARCH, CMD_WALK,
    };

    fn fixture() -> (tempfile::TempDir, GameSession, MockDungeon, ScriptedPrompter) {
        let dir = tempfile::tempdir().unwrap();
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(dir.path().join("game.nhgame"))
            .unwrap();
        let sim = MockDungeon::new(42);
        let session = GameSession::begin_new_game(
            file,
            &NewGameMeta::default(),
            &MockDungeon::command_table(),
            &sim,
            Box::new(NullLock),
            SessionConfig { snapshot_every: 2 },
        )
        .unwrap();
        (dir, session, sim, ScriptedPrompter::new())
    }

    fn record(sim: &MockDungeon, command: u16, arg: CommandArg) -> CommandRecord {
        CommandRecord {
            clock: sim.clock(),
            command: CommandId(command),
            repeat: 1,
            arg,
        }
    }

    #[test]
    fn time_consuming_command_is_sealed() {
        let (_dir, mut session, mut sim, mut prompter) = fixture();
        let rec = record(&sim, CMD_WALK, CommandArg::Dir(Direction::East));
        let effect = session
            .perform_command(&mut sim, &mut prompter, &rec)
            .unwrap();
        assert_eq!(effect, CommandEffect::TookTime);
        assert_eq!(session.action_count(), 1);
    }

    #[test]
    fn no_time_command_is_reverted() {
        let (_dir, mut session, mut sim, mut prompter) = fixture();
        let rec = record(&sim, CMD_LOOK, CommandArg::None);
        let effect = session
            .perform_command(&mut sim, &mut prompter, &rec)
            .unwrap();
        assert_eq!(effect, CommandEffect::NoTime);
        assert_eq!(session.action_count(), 0);
    }

    #[test]
    fn snapshot_cadence_counts_only_time_consuming_commands() {
        let (_dir, mut session, mut sim, mut prompter) = fixture();
        let walk = |sim: &MockDungeon| record(sim, CMD_WALK, CommandArg::Dir(Direction::South));
        let look = |sim: &MockDungeon| record(sim, CMD_LOOK, CommandArg::None);

        let len_after = |session: &mut GameSession| session.writer_mut().valid_length();

        let rec = walk(&sim);
        session
            .perform_command(&mut sim, &mut prompter, &rec)
            .unwrap();
        let one = len_after(&mut session);
        let rec = look(&sim);
        session
            .perform_command(&mut sim, &mut prompter, &rec)
            .unwrap();
        // A free command neither advances the cadence nor the file.
        assert_eq!(len_after(&mut session), one);

        // Second walk hits snapshot_every = 2 and appends a diff line.
        let rec = walk(&sim);
        session
            .perform_command(&mut sim, &mut prompter, &rec)
            .unwrap();
        assert!(len_after(&mut session) > one);
        let rec = record(&sim, CMD_SEARCH, CommandArg::None);
        session
            .perform_command(&mut sim, &mut prompter, &rec)
            .unwrap();
        session.finish(LogStatus::Done).unwrap();
    }

    #[test]
    fn prompted_command_records_its_interaction() {
        let (_dir, mut session, mut sim, mut prompter) = fixture();
        prompter.push(ScriptedReply::Direction(Direction::Northwest));
        // Walk with no argument: the simulation must ask.
        let rec = record(&sim, CMD_WALK, CommandArg::None);
        session
            .perform_command(&mut sim, &mut prompter, &rec)
            .unwrap();
        assert_eq!(prompter.remaining(), 0);
        assert_eq!(prompter.transcript.len(), 1);
    }
}
