//! The exclusive log writer used by a live game.
//!
//! Ordering contract: every append writes one complete token line to
//! the end of the file, and only then rewrites the header's
//! valid-length (and action-count) fields. A process that dies between
//! the two leaves bytes past `valid_length` that every reader ignores,
//! so the log always parses up to the last completed boundary.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use delve_codec::diff;
use delve_core::{
    CommandRecord, CommandTable, Fingerprint, FormatError, InteractionToken, LogLock, NewGameMeta,
    Simulation,
};

use crate::error::LogError;
use crate::header::{Header, LogStatus, HEADER_LEN};
use crate::wire::{self, BodyToken};

/// The underlying file, exposed as exactly two capabilities: rewriting
/// the fixed-size header region and appending to the body.
///
/// Nothing else ever touches the file, which is what keeps the
/// append-only invariant honest.
struct LogFile {
    file: File,
    end: u64,
}

impl LogFile {
    fn rewrite_header(&mut self, header: &Header) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.encode())?;
        self.file.flush()
    }

    fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(self.end))?;
        self.file.write_all(bytes)?;
        self.file.flush()?;
        self.end += bytes.len() as u64;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.file.set_len(len)?;
        self.end = len;
        Ok(())
    }
}

/// Restore point captured when a command header is appended, so the
/// command can be reverted if it turns out to take no game time.
#[derive(Clone, Copy, Debug)]
struct Undo {
    valid_length: u32,
    action_count: u32,
}

/// The append-only writer owning a live game's log.
///
/// Created by [`begin`](LogWriter::begin), which writes the header, the
/// preamble (options, timezone, command table), and the initial
/// snapshot. Any write failure poisons the writer: the log is the sole
/// source of truth for crash recovery, so a silent partial write cannot
/// be tolerated and every later operation fails with
/// [`LogError::Poisoned`].
pub struct LogWriter {
    log: LogFile,
    header: Header,
    lock: Box<dyn LogLock>,
    locked: bool,
    prev_snapshot: Vec<u8>,
    undo: Option<Undo>,
    poisoned: bool,
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("locked", &self.locked)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl LogWriter {
    /// Create a log for a new game.
    ///
    /// Takes the exclusive lock, truncates the file, writes the header
    /// and preamble, and records the initial snapshot (a diff against
    /// the empty buffer). Returns [`LogError::LockHeld`] without
    /// touching the file if another writer owns it.
    pub fn begin(
        file: File,
        meta: &NewGameMeta,
        table: &CommandTable,
        sim: &dyn Simulation,
        mut lock: Box<dyn LogLock>,
    ) -> Result<Self, LogError> {
        if !lock.acquire_exclusive(&file) {
            return Err(LogError::LockHeld);
        }
        let mut writer = Self {
            log: LogFile { file, end: 0 },
            header: Header::new(),
            lock,
            locked: true,
            prev_snapshot: Vec::new(),
            undo: None,
            poisoned: false,
        };

        writer.try_io(|log| {
            log.truncate(0)?;
            log.append(&Header::new().encode())
        })?;

        for opt in &meta.options {
            writer.append_line(&BodyToken::Option(opt.clone()))?;
        }
        if let Some(offset) = meta.timezone_offset {
            writer.append_line(&BodyToken::Timezone(offset))?;
        }
        writer.append_line(&BodyToken::CommandTable(table.clone()))?;

        // Initial snapshot: the chain's base, diffed against nothing.
        let state = sim.serialize_state();
        let stream = diff(&[], &state);
        writer.append_line(&BodyToken::SnapshotDiff(stream))?;
        writer.prev_snapshot = state;

        writer.commit_header()?;
        Ok(writer)
    }

    /// Reopen a suspended log to continue its game.
    ///
    /// Tokenizes the existing content, truncates any torn tail past the
    /// committed valid length, reconstructs the snapshot-chain head so
    /// later diffs have their base, and flips the status back to
    /// in-progress. Returns the tokenized content alongside the writer
    /// so the caller can replay it before accepting new commands.
    ///
    /// A finished log cannot be reopened.
    pub fn reopen(
        mut file: File,
        mut lock: Box<dyn LogLock>,
    ) -> Result<(Self, crate::scan::LogContents), LogError> {
        if !lock.acquire_exclusive(&file) {
            return Err(LogError::LockHeld);
        }

        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        std::io::Read::read_to_end(&mut file, &mut bytes)?;
        let contents = crate::scan::tokenize(&bytes)?;
        if contents.header.status == LogStatus::Done {
            lock.release(&file);
            return Err(LogError::Format(FormatError::BadHeader {
                detail: "cannot reopen a finished log".into(),
            }));
        }

        let mut prev_snapshot = Vec::new();
        for (_, token) in &contents.tokens {
            if let BodyToken::SnapshotDiff(stream) = token {
                prev_snapshot = delve_codec::apply(&prev_snapshot, stream)
                    .map_err(FormatError::from)
                    .map_err(LogError::Format)?;
            }
        }

        let end = (contents.header.valid_length as u64).max(HEADER_LEN as u64);
        let mut writer = Self {
            log: LogFile { file, end },
            header: Header {
                status: LogStatus::InProgress,
                ..contents.header
            },
            lock,
            locked: true,
            prev_snapshot,
            undo: None,
            poisoned: false,
        };
        writer.try_io(|log| log.truncate(end))?;
        writer.try_io_header()?;
        Ok((writer, contents))
    }

    /// Append a command header and arm the revert point.
    pub fn append_command(&mut self, rec: &CommandRecord) -> Result<(), LogError> {
        self.check()?;
        self.undo = Some(Undo {
            valid_length: self.header.valid_length,
            action_count: self.header.action_count,
        });
        self.append_line(&BodyToken::Command(*rec))?;
        self.header.action_count += 1;
        self.commit_header()
    }

    /// Append one interaction token.
    pub fn append_interaction(&mut self, token: &InteractionToken) -> Result<(), LogError> {
        self.check()?;
        self.append_line(&BodyToken::Interaction(token.clone()))?;
        self.commit_header()
    }

    /// Append the result fingerprint that terminates the current
    /// command, and disarm the revert point.
    pub fn append_fingerprint(&mut self, fp: Fingerprint) -> Result<(), LogError> {
        self.check()?;
        self.append_line(&BodyToken::Fingerprint(fp))?;
        self.undo = None;
        self.commit_header()
    }

    /// Append an external bones payload (or its recorded absence).
    pub fn append_bones(&mut self, payload: Option<&[u8]>) -> Result<(), LogError> {
        self.check()?;
        self.append_line(&BodyToken::Bones(payload.map(<[u8]>::to_vec)))?;
        self.commit_header()
    }

    /// Serialize the simulation, diff it against the previous snapshot,
    /// and append the encoded diff.
    ///
    /// The superseded snapshot's raw bytes are dropped immediately;
    /// only its encoded diff persists in the file.
    pub fn append_snapshot(&mut self, sim: &dyn Simulation) -> Result<(), LogError> {
        self.check()?;
        let state = sim.serialize_state();
        let stream = diff(&self.prev_snapshot, &state);
        self.append_line(&BodyToken::SnapshotDiff(stream))?;
        self.prev_snapshot = state;
        self.commit_header()
    }

    /// Truncate the file back to the valid length recorded before the
    /// most recent command began.
    ///
    /// Used when a command turns out to take no game time and should
    /// not be recorded at all. A no-op when no command is pending,
    /// which makes it safe to call on any exit path.
    pub fn revert_last_command(&mut self) -> Result<(), LogError> {
        self.check()?;
        let Some(undo) = self.undo.take() else {
            return Ok(());
        };
        self.try_io(|log| log.truncate(undo.valid_length as u64))?;
        self.header.valid_length = undo.valid_length;
        self.header.action_count = undo.action_count;
        self.try_io_header()
    }

    /// Write the terminal status and final valid length, then release
    /// the exclusive lock.
    pub fn finish(mut self, status: LogStatus) -> Result<(), LogError> {
        self.check()?;
        self.header.status = status;
        self.try_io_header()?;
        self.release_lock();
        Ok(())
    }

    /// Number of commands recorded so far.
    pub fn action_count(&self) -> u32 {
        self.header.action_count
    }

    /// Byte offset up to which the log is known-good.
    pub fn valid_length(&self) -> u32 {
        self.header.valid_length
    }

    // ── Internals ───────────────────────────────────────────────

    fn check(&self) -> Result<(), LogError> {
        if self.poisoned {
            return Err(LogError::Poisoned);
        }
        Ok(())
    }

    fn append_line(&mut self, token: &BodyToken) -> Result<(), LogError> {
        let mut line = wire::encode_token(token);
        line.push('\n');
        self.try_io(|log| log.append(line.as_bytes()))
    }

    /// Advance the header's valid length to the current end of file and
    /// rewrite the fixed region.
    fn commit_header(&mut self) -> Result<(), LogError> {
        if self.log.end > u32::MAX as u64 {
            self.poisoned = true;
            return Err(LogError::Format(FormatError::BadHeader {
                detail: "log exceeds the 4 GiB the header can address".into(),
            }));
        }
        self.header.valid_length = self.log.end as u32;
        self.try_io_header()
    }

    fn try_io<T>(
        &mut self,
        op: impl FnOnce(&mut LogFile) -> std::io::Result<T>,
    ) -> Result<T, LogError> {
        match op(&mut self.log) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.poisoned = true;
                Err(LogError::Io(e))
            }
        }
    }

    fn try_io_header(&mut self) -> Result<(), LogError> {
        let header = self.header;
        self.try_io(|log| log.rewrite_header(&header))
    }

    fn release_lock(&mut self) {
        if self.locked {
            self.lock.release(&self.log.file);
            self.locked = false;
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        // A writer dropped without finish() leaves status IN_PROGRESS
        // (the crash-recovery shape) but must not leak the lock.
        self.release_lock();
    }
}
