//! New-game metadata logged ahead of the first command.

/// The typed value of a birth or game option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    /// A boolean option.
    Bool(bool),
    /// An integer option.
    Int(i64),
    /// A free-text option.
    Text(String),
}

/// One birth/game option, logged because it shapes the simulation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameOption {
    /// Option name. Arbitrary bytes are allowed; the wire format
    /// base64-wraps it.
    pub name: String,
    /// The option's value.
    pub value: OptionValue,
}

/// Everything recorded in a log's preamble when a new game begins.
///
/// # Examples
///
/// ```
/// use delve_core::{GameOption, NewGameMeta, OptionValue};
///
/// let meta = NewGameMeta {
///     options: vec![GameOption {
///         name: "role".into(),
///         value: OptionValue::Text("valkyrie".into()),
///     }],
///     timezone_offset: Some(-18000),
/// };
/// assert_eq!(meta.options.len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewGameMeta {
    /// Birth and game options in the order they were set.
    pub options: Vec<GameOption>,
    /// The recording host's timezone offset in seconds east of UTC,
    /// logged once because the simulation's calendar consults it.
    pub timezone_offset: Option<i32>,
}
