//! The replay cursor: a stateful reader that scrubs a simulation
//! through a recorded log.

use std::path::Path;

use delve_codec::apply;
use delve_core::{
    CommandRecord, CommandTable, Fingerprint, FormatError, MoveNumber, Simulation, Transcript,
};
use delve_log::wire::BodyToken;
use delve_log::{read_log, tokenize, LogContents};
use delve_session::{guard, Session, TokenFeed};

use crate::error::ReplayError;

/// Tuning for a replay cursor.
#[derive(Clone, Copy, Debug)]
pub struct CursorConfig {
    /// Materialized snapshots kept for scrubbing. At least one is
    /// always kept (the minimum that makes backward stepping cheap);
    /// a few more make interactive back-and-forth scrubbing smooth.
    pub snapshot_cache: usize,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self { snapshot_cache: 4 }
    }
}

/// Where a cursor is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorState {
    /// At move zero: the simulation right after the logged new-game
    /// metadata, before the first command.
    AtStart,
    /// The last operation stepped forward and the cursor sits mid-log.
    SteppingForward,
    /// The last operation stepped backward and the cursor sits mid-log.
    SteppingBackward,
    /// A `goto` is in flight toward the given move.
    Seeking(MoveNumber),
    /// The token stream is exhausted (or a crashed log's last complete
    /// command was consumed).
    AtEnd,
    /// A malformed token, unknown command, or fingerprint mismatch was
    /// hit. Terminal, and distinct from [`AtEnd`](CursorState::AtEnd).
    Failed,
}

/// One complete recorded move: its command header, the token span of
/// its interactions, and the fingerprint that seals it.
#[derive(Clone, Debug)]
struct MoveEntry {
    record: CommandRecord,
    /// Index of the first interaction token (one past the command).
    span_start: usize,
    /// Index of the fingerprint token.
    span_end: usize,
    fingerprint: Fingerprint,
}

/// One snapshot in the diff chain.
#[derive(Clone, Copy, Debug)]
struct SnapEntry {
    /// Index of the diff token in the token stream.
    token_idx: usize,
    /// Number of moves completed when this snapshot was taken.
    mov: u64,
}

/// A small LRU of materialized snapshots, keyed by chain index.
struct SnapshotCache {
    cap: usize,
    entries: Vec<(usize, Vec<u8>, u64)>,
    tick: u64,
}

impl SnapshotCache {
    fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            entries: Vec::new(),
            tick: 0,
        }
    }

    /// Deepest cached chain index at or before `chain_idx`.
    fn best_at_or_before(&mut self, chain_idx: usize) -> Option<(usize, Vec<u8>)> {
        let best = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (idx, _, _))| *idx <= chain_idx)
            .max_by_key(|(_, (idx, _, _))| *idx)
            .map(|(i, _)| i)?;
        self.tick += 1;
        self.entries[best].2 = self.tick;
        Some((self.entries[best].0, self.entries[best].1.clone()))
    }

    fn insert(&mut self, chain_idx: usize, state: Vec<u8>) {
        self.tick += 1;
        if let Some(entry) = self.entries.iter_mut().find(|(idx, _, _)| *idx == chain_idx) {
            entry.1 = state;
            entry.2 = self.tick;
            return;
        }
        if self.entries.len() == self.cap {
            let oldest = self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, (_, _, tick))| *tick)
                .map(|(i, _)| i)
                .expect("cache is non-empty at capacity");
            self.entries.swap_remove(oldest);
        }
        self.entries.push((chain_idx, state, self.tick));
    }
}

/// The stateful reader reconstructing a simulation from a log.
///
/// Owns the simulation instance it drives; borrow it back with
/// [`sim`](ReplayCursor::sim) to inspect replayed state.
pub struct ReplayCursor<S: Simulation> {
    sim: S,
    tokens: Vec<(u64, BodyToken)>,
    table: CommandTable,
    moves: Vec<MoveEntry>,
    snaps: Vec<SnapEntry>,
    pos: u64,
    state: CursorState,
    cache: SnapshotCache,
    transcript: Option<Box<dyn Transcript>>,
}

impl<S: Simulation> std::fmt::Debug for ReplayCursor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayCursor")
            .field("pos", &self.pos)
            .field("state", &self.state)
            .field("moves", &self.moves.len())
            .field("snaps", &self.snaps.len())
            .finish_non_exhaustive()
    }
}

impl<S: Simulation> ReplayCursor<S> {
    /// Open a replay over an in-memory copy of a log file.
    ///
    /// The simulation instance may be in any state; it is restored to
    /// the log's initial snapshot before the cursor returns.
    pub fn open(bytes: &[u8], sim: S) -> Result<Self, ReplayError> {
        Self::with_config(tokenize(bytes)?, sim, CursorConfig::default())
    }

    /// Open a replay from a log file on disk.
    pub fn open_file(path: &Path, sim: S) -> Result<Self, ReplayError> {
        Self::with_config(read_log(path)?, sim, CursorConfig::default())
    }

    /// Open a replay over tokenized content with explicit tuning.
    pub fn with_config(
        contents: LogContents,
        sim: S,
        config: CursorConfig,
    ) -> Result<Self, ReplayError> {
        let LogContents { tokens, .. } = contents;
        let (table, moves, snaps) = build_index(&tokens)?;

        let mut cursor = Self {
            sim,
            tokens,
            table,
            moves,
            snaps,
            pos: 0,
            state: CursorState::AtStart,
            cache: SnapshotCache::new(config.snapshot_cache),
            transcript: None,
        };
        let initial = cursor.materialize(0)?;
        cursor.sim.restore_state(&initial)?;
        Ok(cursor)
    }

    /// Attach a transcript sink; replayed answers are echoed to it just
    /// as a live session would echo to its prompter.
    pub fn set_transcript(&mut self, transcript: Option<Box<dyn Transcript>>) {
        self.transcript = transcript;
    }

    /// The replayed simulation.
    pub fn sim(&self) -> &S {
        &self.sim
    }

    /// Consume the cursor, returning the simulation in its current
    /// replayed state.
    pub fn into_sim(self) -> S {
        self.sim
    }

    /// The move the cursor currently sits after.
    pub fn current_move(&self) -> MoveNumber {
        MoveNumber(self.pos)
    }

    /// Number of complete moves in the log.
    pub fn max_move(&self) -> MoveNumber {
        MoveNumber(self.moves.len() as u64)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Name of the next command the cursor would replay, resolved
    /// through the recorded table.
    pub fn next_pending_command_name(&self) -> Option<&str> {
        let entry = self.moves.get(self.pos as usize)?;
        self.table.name_of(entry.record.command)
    }

    /// Replay up to `n` commands forward. Returns how many were
    /// actually replayed (fewer only when the end is reached).
    pub fn step_forward(&mut self, n: u64) -> Result<u64, ReplayError> {
        self.check()?;
        self.state = CursorState::SteppingForward;
        let advanced = self.advance(n)?;
        self.settle(CursorState::SteppingForward);
        Ok(advanced)
    }

    /// Step up to `n` commands backward, by restoring the nearest
    /// prior snapshot and replaying forward to the target.
    pub fn step_backward(&mut self, n: u64) -> Result<u64, ReplayError> {
        self.check()?;
        self.state = CursorState::SteppingBackward;
        let target = self.pos.saturating_sub(n);
        let stepped = self.pos - target;
        self.restore_to(target)?;
        self.settle(CursorState::SteppingBackward);
        Ok(stepped)
    }

    /// Jump to an arbitrary move number.
    ///
    /// Forward or backward is chosen by comparing the target to the
    /// current position; snapshot-chain reconstruction keeps the cost
    /// proportional to the distance from the nearest snapshot, not to
    /// the length of the log.
    pub fn goto(&mut self, mov: MoveNumber) -> Result<(), ReplayError> {
        self.check()?;
        if mov > self.max_move() {
            return Err(ReplayError::Format(FormatError::BadNumber {
                detail: format!("move {mov} is past the end of a {}-move log", self.max_move()),
            }));
        }
        self.state = CursorState::Seeking(mov);
        if mov.0 >= self.pos {
            let distance = mov.0 - self.pos;
            self.advance(distance)?;
            self.settle(CursorState::SteppingForward);
        } else {
            self.restore_to(mov.0)?;
            self.settle(CursorState::SteppingBackward);
        }
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────

    fn check(&self) -> Result<(), ReplayError> {
        if self.state == CursorState::Failed {
            return Err(ReplayError::Failed);
        }
        Ok(())
    }

    /// Pick the resting state after a successful operation.
    fn settle(&mut self, moving: CursorState) {
        self.state = if self.pos == 0 {
            CursorState::AtStart
        } else if self.pos == self.moves.len() as u64 {
            CursorState::AtEnd
        } else {
            moving
        };
    }

    fn fail<T>(&mut self, err: ReplayError) -> Result<T, ReplayError> {
        self.state = CursorState::Failed;
        Err(err)
    }

    /// Replay `n` moves from the current position, stopping at the end.
    fn advance(&mut self, n: u64) -> Result<u64, ReplayError> {
        let mut advanced = 0;
        while advanced < n && (self.pos as usize) < self.moves.len() {
            if let Err(e) = self.replay_one() {
                return self.fail(e);
            }
            advanced += 1;
        }
        Ok(advanced)
    }

    /// Replay the single move at the current position and verify its
    /// fingerprint.
    fn replay_one(&mut self) -> Result<(), ReplayError> {
        let entry = self.moves[self.pos as usize].clone();
        let span = &self.tokens[entry.span_start..entry.span_end];

        let feed = TokenFeed::new(span);
        let mut session = Session::replay(feed, self.transcript.as_deref_mut());
        self.sim.perform(&entry.record, &mut session)?;

        if session.unconsumed() > 0 {
            let found = match &span[span.len() - session.unconsumed()].1 {
                BodyToken::Interaction(tok) => tok.tag(),
                _ => 'b',
            };
            return Err(FormatError::TokenMismatch {
                expected: '<',
                found,
            }
            .into());
        }

        guard::verify(MoveNumber(self.pos + 1), entry.fingerprint, &self.sim)?;
        self.pos += 1;
        Ok(())
    }

    /// Land exactly on `target` by restoring the nearest snapshot at or
    /// before it and replaying the remainder.
    fn restore_to(&mut self, target: u64) -> Result<(), ReplayError> {
        let chain_idx = self.snaps.partition_point(|s| s.mov <= target) - 1;
        let snap_mov = self.snaps[chain_idx].mov;

        let state = match self.materialize(chain_idx) {
            Ok(state) => state,
            Err(e) => return self.fail(e),
        };
        if let Err(e) = self.sim.restore_state(&state) {
            return self.fail(e.into());
        }
        self.pos = snap_mov;
        self.advance(target - snap_mov)?;
        Ok(())
    }

    /// Materialize the snapshot at `chain_idx`, reusing the deepest
    /// cached ancestor instead of walking the chain from the start.
    fn materialize(&mut self, chain_idx: usize) -> Result<Vec<u8>, ReplayError> {
        let (start, mut state) = match self.cache.best_at_or_before(chain_idx) {
            Some((cached_idx, state)) if cached_idx == chain_idx => return Ok(state),
            Some((cached_idx, state)) => (cached_idx + 1, state),
            None => (0, Vec::new()),
        };
        for snap in &self.snaps[start..=chain_idx] {
            let BodyToken::SnapshotDiff(stream) = &self.tokens[snap.token_idx].1 else {
                unreachable!("snapshot index points at a diff token");
            };
            state = apply(&state, stream).map_err(FormatError::from)?;
        }
        self.cache.insert(chain_idx, state.clone());
        Ok(state)
    }
}

/// Build the move and snapshot indices, validating token ordering and
/// command-table coverage as we go.
#[allow(clippy::type_complexity)]
fn build_index(
    tokens: &[(u64, BodyToken)],
) -> Result<(CommandTable, Vec<MoveEntry>, Vec<SnapEntry>), ReplayError> {
    let mut table: Option<CommandTable> = None;
    let mut moves = Vec::new();
    let mut snaps: Vec<SnapEntry> = Vec::new();
    let mut open: Option<(usize, CommandRecord)> = None;

    for (idx, (_, token)) in tokens.iter().enumerate() {
        match token {
            BodyToken::Option(_) | BodyToken::Timezone(_) => {
                // Options may be (re)logged mid-game; they carry no
                // replay semantics here.
                if open.is_some() {
                    return Err(mismatch_in_span(token).into());
                }
            }
            BodyToken::CommandTable(t) => {
                if open.is_some() {
                    return Err(mismatch_in_span(token).into());
                }
                if table.is_some() {
                    return Err(FormatError::BadHeader {
                        detail: "log contains a second command table".into(),
                    }
                    .into());
                }
                table = Some(t.clone());
            }
            BodyToken::Command(rec) => {
                if open.is_some() {
                    return Err(FormatError::TokenMismatch {
                        expected: '<',
                        found: '>',
                    }
                    .into());
                }
                let table = table.as_ref().ok_or(FormatError::BadHeader {
                    detail: "command recorded before the command table".into(),
                })?;
                table.resolve(rec.command)?;
                open = Some((idx, *rec));
            }
            BodyToken::Interaction(tok) => {
                if open.is_none() {
                    return Err(FormatError::TokenMismatch {
                        expected: '>',
                        found: tok.tag(),
                    }
                    .into());
                }
            }
            BodyToken::Bones(_) => {
                if open.is_none() {
                    return Err(FormatError::TokenMismatch {
                        expected: '>',
                        found: 'b',
                    }
                    .into());
                }
            }
            BodyToken::Fingerprint(fp) => {
                let Some((start, record)) = open.take() else {
                    return Err(FormatError::TokenMismatch {
                        expected: '>',
                        found: '<',
                    }
                    .into());
                };
                moves.push(MoveEntry {
                    record,
                    span_start: start + 1,
                    span_end: idx,
                    fingerprint: *fp,
                });
            }
            BodyToken::SnapshotDiff(_) => {
                if open.is_some() {
                    return Err(mismatch_in_span(token).into());
                }
                snaps.push(SnapEntry {
                    token_idx: idx,
                    mov: moves.len() as u64,
                });
            }
        }
    }
    // A trailing open command is the crash shape: its tokens were
    // committed but the move never completed. It is simply not a move.

    let table = table.ok_or(FormatError::BadHeader {
        detail: "log has no command table".into(),
    })?;
    if snaps.first().is_none_or(|s| s.mov != 0) {
        return Err(FormatError::BadHeader {
            detail: "log has no initial snapshot".into(),
        }
        .into());
    }
    Ok((table, moves, snaps))
}

fn mismatch_in_span(token: &BodyToken) -> FormatError {
    let found = match token {
        BodyToken::Option(_) => '!',
        BodyToken::CommandTable(_) => '#',
        BodyToken::Timezone(_) => 'T',
        BodyToken::SnapshotDiff(_) => 'f',
        _ => '?',
    };
    FormatError::TokenMismatch {
        expected: '<',
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keeps_deepest_ancestor() {
        let mut cache = SnapshotCache::new(2);
        cache.insert(0, vec![0]);
        cache.insert(3, vec![3]);
        assert_eq!(cache.best_at_or_before(5), Some((3, vec![3])));
        assert_eq!(cache.best_at_or_before(2), Some((0, vec![0])));
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let mut cache = SnapshotCache::new(2);
        cache.insert(0, vec![0]);
        cache.insert(1, vec![1]);
        // Touch 0 so 1 becomes the eviction candidate.
        let _ = cache.best_at_or_before(0);
        cache.insert(2, vec![2]);
        assert_eq!(cache.best_at_or_before(1), Some((0, vec![0])));
    }

    #[test]
    fn cache_capacity_is_at_least_one() {
        let mut cache = SnapshotCache::new(0);
        cache.insert(7, vec![7]);
        assert_eq!(cache.best_at_or_before(9), Some((7, vec![7])));
    }
}
