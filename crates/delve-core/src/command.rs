//! Command records, arguments, and the serialized command-name table.

use indexmap::IndexSet;

use crate::error::FormatError;
use crate::id::{CommandId, GameClock};
use crate::interact::ItemLetter;

/// A compass direction, including the vertical axis and "here".
///
/// The wire encoding is the variant's index, so the order of variants is
/// part of the log format and must never be rearranged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// North.
    North,
    /// Northeast.
    Northeast,
    /// East.
    East,
    /// Southeast.
    Southeast,
    /// South.
    South,
    /// Southwest.
    Southwest,
    /// West.
    West,
    /// Northwest.
    Northwest,
    /// Up a staircase or ladder.
    Up,
    /// Down a staircase or ladder.
    Down,
    /// The square the actor currently occupies.
    Here,
}

impl Direction {
    /// All directions, in wire order.
    pub const ALL: [Direction; 11] = [
        Direction::North,
        Direction::Northeast,
        Direction::East,
        Direction::Southeast,
        Direction::South,
        Direction::Southwest,
        Direction::West,
        Direction::Northwest,
        Direction::Up,
        Direction::Down,
        Direction::Here,
    ];

    /// The wire index of this direction.
    pub fn index(self) -> u8 {
        Self::ALL.iter().position(|&d| d == self).unwrap_or(0) as u8
    }

    /// Look up a direction by wire index.
    pub fn from_index(idx: u8) -> Result<Self, FormatError> {
        Self::ALL
            .get(idx as usize)
            .copied()
            .ok_or(FormatError::BadNumber {
                detail: format!("direction index {idx} out of range"),
            })
    }
}

/// A map coordinate.
///
/// # Examples
///
/// ```
/// use delve_core::Position;
///
/// let p = Position { x: 12, y: 4 };
/// assert_eq!(p.x, 12);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Position {
    /// Column, counting from the left edge of the map.
    pub x: u16,
    /// Row, counting from the top edge of the map.
    pub y: u16,
}

/// The zero-or-one typed argument carried by a command header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandArg {
    /// The command takes no argument.
    None,
    /// A direction argument (e.g. "fight west").
    Dir(Direction),
    /// A position argument (e.g. a travel destination).
    Pos(Position),
    /// An inventory-letter argument.
    Item(ItemLetter),
}

/// One simulation turn's worth of input: the command header.
///
/// Followed in the log by zero or more interaction tokens in the exact
/// order the simulation requested them, and terminated by a result
/// fingerprint.
///
/// # Examples
///
/// ```
/// use delve_core::{CommandArg, CommandId, CommandRecord, Direction, GameClock};
///
/// let rec = CommandRecord {
///     clock: GameClock(1_500_000),
///     command: CommandId(3),
///     repeat: 1,
///     arg: CommandArg::Dir(Direction::East),
/// };
/// assert_eq!(rec.repeat, 1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandRecord {
    /// In-game timestamp, sampled once when the command began.
    pub clock: GameClock,
    /// Index into the command table recorded at log creation.
    pub command: CommandId,
    /// Repeat count (1 for a plain command).
    pub repeat: u32,
    /// The command's typed argument, if any.
    pub arg: CommandArg,
}

/// Whether a completed command consumed game time.
///
/// Commands that consume no game time are reverted from the log rather
/// than recorded, so a log contains only moves that advanced the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandEffect {
    /// The command advanced game time and must stay in the log.
    TookTime,
    /// The command consumed no game time (e.g. a cancelled prompt or a
    /// help screen) and should be reverted.
    NoTime,
}

/// The ordered table of command names serialized once at log creation.
///
/// Replay resolves command indices through this table, so a log remains
/// replayable even when the recording and replaying builds number their
/// commands differently.
///
/// # Examples
///
/// ```
/// use delve_core::{CommandId, CommandTable};
///
/// let table = CommandTable::from_names(["move", "search", "quaff"]).unwrap();
/// assert_eq!(table.id_of("search"), Some(CommandId(1)));
/// assert_eq!(table.name_of(CommandId(2)), Some("quaff"));
/// assert_eq!(table.len(), 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandTable {
    names: IndexSet<String>,
}

impl CommandTable {
    /// Build a table from an ordered list of names.
    ///
    /// Duplicate names are rejected: the table must be a bijection
    /// between names and indices for replay to be unambiguous. Names
    /// may not contain newlines, which delimit them on the wire.
    pub fn from_names<I, S>(names: I) -> Result<Self, FormatError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = IndexSet::new();
        for name in names {
            let name = name.into();
            if name.contains('\n') {
                return Err(FormatError::BadHeader {
                    detail: format!("command name {name:?} contains a newline"),
                });
            }
            if !set.insert(name.clone()) {
                return Err(FormatError::BadHeader {
                    detail: format!("duplicate command name '{name}' in command table"),
                });
            }
        }
        if set.len() > u16::MAX as usize {
            return Err(FormatError::BadHeader {
                detail: format!("command table too large ({} entries)", set.len()),
            });
        }
        Ok(Self { names: set })
    }

    /// The id assigned to `name`, if present.
    pub fn id_of(&self, name: &str) -> Option<CommandId> {
        self.names.get_index_of(name).map(|i| CommandId(i as u16))
    }

    /// The name assigned to `id`, if in range.
    pub fn name_of(&self, id: CommandId) -> Option<&str> {
        self.names.get_index(id.0 as usize).map(|s| s.as_str())
    }

    /// Validate that a wire index refers to a recorded command.
    pub fn resolve(&self, id: CommandId) -> Result<&str, FormatError> {
        self.name_of(id).ok_or(FormatError::UnknownCommand {
            index: id.0,
            table_len: self.len(),
        })
    }

    /// Number of commands in the table.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over names in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }
}
