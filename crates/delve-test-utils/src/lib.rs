//! Test utilities and mock collaborators for Delve development.
//!
//! [`MockDungeon`] is a deliberately tiny but fully deterministic
//! simulation: a 16×16 byte grid, a hero position, a game clock, and a
//! seedable ChaCha generator. It exercises every interaction primitive
//! across its command repertoire, which is what the engine's
//! record/replay tests need.
//!
//! [`ScriptedPrompter`] plays the human: it answers prompts from a
//! queue and records everything echoed to it.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::VecDeque;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use smallvec::smallvec;

use delve_core::{
    CommandArg, CommandEffect, CommandRecord, CommandTable, Direction, Fingerprint, FormatError,
    GameClock, Gesture, InputError, InputSource, KeyPress, MenuEntry, Position, Prompter, Reply,
    Selection, Simulation, Transcript,
};

/// Width and height of the mock dungeon grid.
pub const GRID_SIDE: usize = 16;

/// The mock's command repertoire, in table order.
pub const COMMAND_NAMES: [&str; 9] = [
    "walk", "search", "quaff", "engrave", "travel", "drop", "descend", "zap", "look",
];

pub const CMD_WALK: u16 = 0;
pub const CMD_SEARCH: u16 = 1;
pub const CMD_QUAFF: u16 = 2;
pub const CMD_ENGRAVE: u16 = 3;
pub const CMD_TRAVEL: u16 = 4;
pub const CMD_DROP: u16 = 5;
pub const CMD_DESCEND: u16 = 6;
pub const CMD_ZAP: u16 = 7;
pub const CMD_LOOK: u16 = 8;

/// A minimal deterministic dungeon simulation.
///
/// All state mutations are pure functions of current state and the
/// answers pulled from the [`InputSource`], so a replay fed the
/// recorded answers reproduces the state byte for byte.
#[derive(Clone, Debug)]
pub struct MockDungeon {
    grid: Vec<u8>,
    hero: Position,
    clock: u64,
    rng: ChaCha8Rng,
    seed: [u8; 32],
}

impl MockDungeon {
    /// Create a dungeon from a numeric seed.
    pub fn new(seed: u64) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[..8].copy_from_slice(&seed.to_le_bytes());
        let mut rng = ChaCha8Rng::from_seed(seed_bytes);
        let mut grid = vec![0u8; GRID_SIDE * GRID_SIDE];
        rng.fill_bytes(&mut grid);
        Self {
            grid,
            hero: Position { x: 8, y: 8 },
            clock: 0,
            rng,
            seed: seed_bytes,
        }
    }

    /// The command table matching this mock's repertoire.
    pub fn command_table() -> CommandTable {
        CommandTable::from_names(COMMAND_NAMES).expect("repertoire is well-formed")
    }

    /// Current in-game clock, for building command records.
    pub fn clock(&self) -> GameClock {
        GameClock(self.clock)
    }

    pub fn hero(&self) -> Position {
        self.hero
    }

    /// Advance the generator and disturb the grid `n` times. Used by
    /// tests that need the state to move without running a command.
    pub fn scramble(&mut self, n: u32) {
        for _ in 0..n {
            self.roll_grid();
        }
    }

    fn roll_grid(&mut self) {
        let roll = self.rng.next_u32();
        let idx = (roll as usize) % self.grid.len();
        self.grid[idx] = self.grid[idx].wrapping_add((roll >> 8) as u8);
    }

    fn clamp(&self, pos: Position) -> Position {
        Position {
            x: pos.x % GRID_SIDE as u16,
            y: pos.y % GRID_SIDE as u16,
        }
    }

    fn hero_cell(&mut self) -> &mut u8 {
        let idx = self.hero.y as usize * GRID_SIDE + self.hero.x as usize;
        &mut self.grid[idx]
    }

    fn step(&mut self, dir: Direction) {
        let (dx, dy) = match dir {
            Direction::North => (0i32, -1i32),
            Direction::Northeast => (1, -1),
            Direction::East => (1, 0),
            Direction::Southeast => (1, 1),
            Direction::South => (0, 1),
            Direction::Southwest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::Northwest => (-1, -1),
            Direction::Up | Direction::Down | Direction::Here => (0, 0),
        };
        let side = GRID_SIDE as i32;
        self.hero.x = (self.hero.x as i32 + dx).rem_euclid(side) as u16;
        self.hero.y = (self.hero.y as i32 + dy).rem_euclid(side) as u16;
    }

    fn menu_entries() -> Vec<MenuEntry> {
        (1..=4)
            .map(|id| MenuEntry {
                id,
                label: format!("item {id}"),
            })
            .collect()
    }

    fn take_time(&mut self) -> CommandEffect {
        self.clock += 500;
        CommandEffect::TookTime
    }
}

impl Simulation for MockDungeon {
    fn serialize_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.grid.len());
        out.extend_from_slice(&self.seed);
        out.extend_from_slice(&self.rng.get_word_pos().to_le_bytes());
        out.extend_from_slice(&self.hero.x.to_le_bytes());
        out.extend_from_slice(&self.hero.y.to_le_bytes());
        out.extend_from_slice(&self.clock.to_le_bytes());
        out.extend_from_slice(&(self.grid.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.grid);
        out
    }

    fn restore_state(&mut self, bytes: &[u8]) -> Result<(), FormatError> {
        let truncated = |what: &str| FormatError::Truncated {
            detail: format!("mock state missing {what}"),
        };
        if bytes.len() < 32 + 16 + 2 + 2 + 8 + 4 {
            return Err(truncated("fixed fields"));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let word_pos = u128::from_le_bytes(bytes[32..48].try_into().expect("sized slice"));
        let x = u16::from_le_bytes([bytes[48], bytes[49]]);
        let y = u16::from_le_bytes([bytes[50], bytes[51]]);
        let clock = u64::from_le_bytes(bytes[52..60].try_into().expect("sized slice"));
        let grid_len = u32::from_le_bytes(bytes[60..64].try_into().expect("sized slice")) as usize;
        if bytes.len() != 64 + grid_len {
            return Err(truncated("grid"));
        }

        let mut rng = ChaCha8Rng::from_seed(seed);
        rng.set_word_pos(word_pos);
        self.seed = seed;
        self.rng = rng;
        self.hero = Position { x, y };
        self.clock = clock;
        self.grid = bytes[64..].to_vec();
        Ok(())
    }

    fn rng_fingerprint(&self) -> Fingerprint {
        // Sample a clone so the generator itself never advances.
        Fingerprint(self.rng.clone().next_u32() as u16)
    }

    fn perform(
        &mut self,
        cmd: &CommandRecord,
        input: &mut dyn InputSource,
    ) -> Result<CommandEffect, InputError> {
        match cmd.command.0 {
            CMD_WALK => {
                let dir = match cmd.arg {
                    CommandArg::Dir(d) => d,
                    _ => input.ask_direction("Walk in which direction?")?,
                };
                for _ in 0..cmd.repeat.max(1) {
                    self.step(dir);
                    self.roll_grid();
                }
                Ok(self.take_time())
            }
            CMD_SEARCH => {
                for _ in 0..cmd.repeat.max(1) {
                    self.roll_grid();
                }
                Ok(self.take_time())
            }
            CMD_QUAFF => {
                let picks = input.ask_menu("Quaff which potion?", &Self::menu_entries())?;
                for id in picks {
                    let idx = id as usize % self.grid.len();
                    self.grid[idx] = self.grid[idx].wrapping_add(id as u8);
                }
                self.roll_grid();
                Ok(self.take_time())
            }
            CMD_ENGRAVE => {
                let text = input.ask_line("Engrave what?")?;
                let append = input.ask_yes_no("Add to the existing engraving?", false)?;
                let mut cell = if append { *self.hero_cell() } else { 0 };
                for byte in text.bytes() {
                    cell = cell.wrapping_add(byte);
                }
                *self.hero_cell() = cell;
                Ok(self.take_time())
            }
            CMD_TRAVEL => {
                let (pos, gesture) = input.ask_position("Travel to where?")?;
                if gesture == Gesture::Peek {
                    return Ok(CommandEffect::NoTime);
                }
                self.hero = self.clamp(pos);
                self.roll_grid();
                Ok(self.take_time())
            }
            CMD_DROP => {
                let picks = input.ask_objects("Drop what?", &Self::menu_entries())?;
                for id in picks {
                    let idx = id as usize % self.grid.len();
                    self.grid[idx] ^= 0x40;
                }
                Ok(self.take_time())
            }
            CMD_DESCEND => {
                if let Some(bones) = input.ask_bones()? {
                    for (i, byte) in bones.iter().enumerate() {
                        let idx = i % self.grid.len();
                        self.grid[idx] ^= byte;
                    }
                }
                self.scramble(4);
                Ok(self.take_time())
            }
            CMD_ZAP => {
                let press = input.ask_key("Zap in which direction?")?;
                let idx = press.key as usize % self.grid.len();
                let charge = press.count.unwrap_or(1) as u8;
                self.grid[idx] = self.grid[idx].wrapping_mul(3).wrapping_add(charge);
                self.roll_grid();
                Ok(self.take_time())
            }
            CMD_LOOK => Ok(CommandEffect::NoTime),
            _ => Ok(CommandEffect::NoTime),
        }
    }
}

/// One queued answer for [`ScriptedPrompter`].
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    Direction(Direction),
    Position(Position, Gesture),
    Key(KeyPress),
    Line(String),
    YesNo(bool),
    Selection(Selection),
    /// Cancel the prompt mid-flight; the engine retries the primitive.
    Cancel,
}

/// A prompter that answers from a queue and records every echo.
///
/// Popping the wrong answer kind panics: a scripted test that asks the
/// wrong question is itself broken.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPrompter {
    replies: VecDeque<ScriptedReply>,
    bones: VecDeque<Option<Vec<u8>>>,
    pub transcript: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer.
    pub fn push(&mut self, reply: ScriptedReply) {
        self.replies.push_back(reply);
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, reply: ScriptedReply) -> Self {
        self.push(reply);
        self
    }

    /// Queue a bones payload for the next `fetch_bones` call.
    pub fn push_bones(&mut self, payload: Option<Vec<u8>>) {
        self.bones.push_back(payload);
    }

    /// Answers still queued.
    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    fn pop(&mut self, expected: &str) -> ScriptedReply {
        self.replies
            .pop_front()
            .unwrap_or_else(|| panic!("script exhausted while answering a {expected} prompt"))
    }
}

impl Transcript for ScriptedPrompter {
    fn echo(&mut self, line: &str) {
        self.transcript.push(line.to_string());
    }
}

impl Prompter for ScriptedPrompter {
    fn pick_direction(&mut self, _prompt: &str) -> Reply<Direction> {
        match self.pop("direction") {
            ScriptedReply::Direction(d) => Reply::Answer(d),
            ScriptedReply::Cancel => Reply::Cancelled,
            other => panic!("script answered a direction prompt with {other:?}"),
        }
    }

    fn pick_position(&mut self, _prompt: &str) -> Reply<(Position, Gesture)> {
        match self.pop("position") {
            ScriptedReply::Position(p, g) => Reply::Answer((p, g)),
            ScriptedReply::Cancel => Reply::Cancelled,
            other => panic!("script answered a position prompt with {other:?}"),
        }
    }

    fn query_key(&mut self, _prompt: &str) -> Reply<KeyPress> {
        match self.pop("key") {
            ScriptedReply::Key(k) => Reply::Answer(k),
            ScriptedReply::Cancel => Reply::Cancelled,
            other => panic!("script answered a key prompt with {other:?}"),
        }
    }

    fn get_line(&mut self, _prompt: &str) -> Reply<String> {
        match self.pop("line") {
            ScriptedReply::Line(text) => Reply::Answer(text),
            ScriptedReply::Cancel => Reply::Cancelled,
            other => panic!("script answered a line prompt with {other:?}"),
        }
    }

    fn yes_no(&mut self, _prompt: &str, _default: bool) -> Reply<bool> {
        match self.pop("yes/no") {
            ScriptedReply::YesNo(v) => Reply::Answer(v),
            ScriptedReply::Cancel => Reply::Cancelled,
            other => panic!("script answered a yes/no prompt with {other:?}"),
        }
    }

    fn display_menu(&mut self, _prompt: &str, _entries: &[MenuEntry]) -> Reply<Selection> {
        match self.pop("menu") {
            ScriptedReply::Selection(ids) => Reply::Answer(ids),
            ScriptedReply::Cancel => Reply::Cancelled,
            other => panic!("script answered a menu prompt with {other:?}"),
        }
    }

    fn display_objects(&mut self, _prompt: &str, _entries: &[MenuEntry]) -> Reply<Selection> {
        match self.pop("object list") {
            ScriptedReply::Selection(ids) => Reply::Answer(ids),
            ScriptedReply::Cancel => Reply::Cancelled,
            other => panic!("script answered an object prompt with {other:?}"),
        }
    }

    fn fetch_bones(&mut self) -> Option<Vec<u8>> {
        self.bones.pop_front().unwrap_or(None)
    }
}

/// A standalone transcript sink for replay-mode tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryTranscript {
    pub lines: Vec<String>,
}

impl Transcript for MemoryTranscript {
    fn echo(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// A convenient one-item selection.
pub fn pick(id: u32) -> Selection {
    smallvec![id]
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoInput;
    impl InputSource for NoInput {
        fn ask_direction(&mut self, _: &str) -> Result<Direction, InputError> {
            Err(InputError::Exhausted)
        }
        fn ask_position(&mut self, _: &str) -> Result<(Position, Gesture), InputError> {
            Err(InputError::Exhausted)
        }
        fn ask_key(&mut self, _: &str) -> Result<KeyPress, InputError> {
            Err(InputError::Exhausted)
        }
        fn ask_line(&mut self, _: &str) -> Result<String, InputError> {
            Err(InputError::Exhausted)
        }
        fn ask_yes_no(&mut self, _: &str, _: bool) -> Result<bool, InputError> {
            Err(InputError::Exhausted)
        }
        fn ask_menu(&mut self, _: &str, _: &[MenuEntry]) -> Result<Selection, InputError> {
            Err(InputError::Exhausted)
        }
        fn ask_objects(&mut self, _: &str, _: &[MenuEntry]) -> Result<Selection, InputError> {
            Err(InputError::Exhausted)
        }
        fn ask_bones(&mut self) -> Result<Option<Vec<u8>>, InputError> {
            Err(InputError::Exhausted)
        }
    }

    #[test]
    fn serialize_restore_roundtrip() {
        let mut dungeon = MockDungeon::new(99);
        dungeon.scramble(17);
        let state = dungeon.serialize_state();

        let mut other = MockDungeon::new(1);
        other.restore_state(&state).unwrap();
        assert_eq!(other.serialize_state(), state);
        assert_eq!(other.rng_fingerprint(), dungeon.rng_fingerprint());
    }

    #[test]
    fn fingerprint_is_pure() {
        let dungeon = MockDungeon::new(3);
        assert_eq!(dungeon.rng_fingerprint(), dungeon.rng_fingerprint());
    }

    #[test]
    fn fingerprint_tracks_generator_state() {
        let mut a = MockDungeon::new(3);
        let b = MockDungeon::new(3);
        a.scramble(1);
        assert_ne!(a.rng_fingerprint(), b.rng_fingerprint());
    }

    #[test]
    fn identical_seeds_walk_identically() {
        let mut a = MockDungeon::new(5);
        let mut b = MockDungeon::new(5);
        let cmd = CommandRecord {
            clock: GameClock(0),
            command: delve_core::CommandId(CMD_WALK),
            repeat: 3,
            arg: CommandArg::Dir(Direction::Southeast),
        };
        a.perform(&cmd, &mut NoInput).unwrap();
        b.perform(&cmd, &mut NoInput).unwrap();
        assert_eq!(a.serialize_state(), b.serialize_state());
    }

    #[test]
    fn look_takes_no_time() {
        let mut dungeon = MockDungeon::new(5);
        let before = dungeon.serialize_state();
        let cmd = CommandRecord {
            clock: GameClock(0),
            command: delve_core::CommandId(CMD_LOOK),
            repeat: 1,
            arg: CommandArg::None,
        };
        let effect = dungeon.perform(&cmd, &mut NoInput).unwrap();
        assert_eq!(effect, CommandEffect::NoTime);
        assert_eq!(dungeon.serialize_state(), before);
    }
}
