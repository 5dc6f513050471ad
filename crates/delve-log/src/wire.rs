//! Text encoding and parsing of every body token.
//!
//! The body is a newline-delimited stream of tagged ASCII lines. Binary
//! payloads (free text, selections, diff opcodes, bones files) are
//! embedded through the packed base64 codec. Every encoding is
//! deterministic and lossless; every parse failure is a typed
//! [`FormatError`].
//!
//! | tag  | token                                            |
//! |------|--------------------------------------------------|
//! | `!`  | birth/game option                                |
//! | `#`  | command-name table                               |
//! | `TZ` | timezone offset                                  |
//! | `>`  | command header                                   |
//! | `k:` `d:` `p:` `l:` `y:` `m:` `o:` | interaction tokens |
//! | `<`  | result fingerprint                               |
//! | ` f:`| snapshot diff (note the leading space)           |
//! | ` b:`| external bones payload, `-` when absent          |

use delve_codec::{base64, pack};
use delve_core::{
    CommandArg, CommandId, CommandRecord, CommandTable, Direction, Fingerprint, FormatError,
    GameClock, GameOption, Gesture, InteractionToken, ItemLetter, KeyPress, OptionValue, Position,
    Selection,
};

/// One parsed line of the log body.
#[derive(Clone, Debug, PartialEq)]
pub enum BodyToken {
    /// `!`: a birth/game option.
    Option(GameOption),
    /// `#`: the command-name table serialized at log creation.
    CommandTable(CommandTable),
    /// `TZ`: the recording host's timezone offset in seconds.
    Timezone(i32),
    /// `>`: a command header.
    Command(CommandRecord),
    /// An interaction token.
    Interaction(InteractionToken),
    /// `<`: the result fingerprint terminating a command.
    Fingerprint(Fingerprint),
    /// ` f:`: decoded snapshot-diff opcode bytes.
    SnapshotDiff(Vec<u8>),
    /// ` b:`: an external bones payload, or its recorded absence.
    Bones(Option<Vec<u8>>),
}

// ── Encoding ────────────────────────────────────────────────────

/// Encode one token as a line of text, without the trailing newline.
pub fn encode_token(token: &BodyToken) -> String {
    match token {
        BodyToken::Option(opt) => encode_option(opt),
        BodyToken::CommandTable(table) => encode_command_table(table),
        BodyToken::Timezone(offset) => format!("TZ{offset}"),
        BodyToken::Command(rec) => encode_command(rec),
        BodyToken::Interaction(tok) => encode_interaction(tok),
        BodyToken::Fingerprint(fp) => format!("<{fp}"),
        BodyToken::SnapshotDiff(stream) => format!(" f:{}", pack::encode_packed(stream)),
        BodyToken::Bones(Some(bytes)) => format!(" b:{}", pack::encode_packed(bytes)),
        BodyToken::Bones(None) => " b:-".into(),
    }
}

fn encode_option(opt: &GameOption) -> String {
    let name = base64::encode(opt.name.as_bytes());
    match &opt.value {
        OptionValue::Bool(v) => format!("!{name}:b:{}", u8::from(*v)),
        OptionValue::Int(v) => format!("!{name}:i:{v}"),
        OptionValue::Text(v) => format!("!{name}:s:{}", base64::encode(v.as_bytes())),
    }
}

fn encode_command_table(table: &CommandTable) -> String {
    let joined = table.iter().collect::<Vec<_>>().join("\n");
    format!("#{}", pack::encode_packed(joined.as_bytes()))
}

fn encode_command(rec: &CommandRecord) -> String {
    let arg = match rec.arg {
        CommandArg::None => "-".into(),
        CommandArg::Dir(d) => format!("d:{:x}", d.index()),
        CommandArg::Pos(p) => format!("p:{:x}:{:x}", p.x, p.y),
        CommandArg::Item(l) => format!("i:{:02x}", l.0),
    };
    format!(
        ">{:x}:{:x}:{:x} {arg}",
        rec.clock.0,
        rec.command.0 as u32 + 1,
        rec.repeat,
    )
}

fn encode_selection(ids: &Selection) -> String {
    let mut bytes = Vec::with_capacity(ids.len() * 4);
    for id in ids {
        bytes.extend_from_slice(&id.to_le_bytes());
    }
    pack::encode_packed(&bytes)
}

fn encode_interaction(tok: &InteractionToken) -> String {
    match tok {
        InteractionToken::Key(KeyPress { key, count: None }) => format!("k:{key:02x}"),
        InteractionToken::Key(KeyPress {
            key,
            count: Some(n),
        }) => format!("k:{key:02x}:{n:x}"),
        InteractionToken::Direction(d) => format!("d:{:x}", d.index()),
        InteractionToken::Position { pos, gesture } => {
            format!("p:{:x}:{:x}:{:x}", pos.x, pos.y, gesture.index())
        }
        InteractionToken::Line(text) => format!("l:{}", pack::encode_packed(text.as_bytes())),
        InteractionToken::YesNo(v) => format!("y:{}", u8::from(*v)),
        InteractionToken::Menu(ids) => format!("m:{}", encode_selection(ids)),
        InteractionToken::Objects(ids) => format!("o:{}", encode_selection(ids)),
    }
}

// ── Parsing ─────────────────────────────────────────────────────

fn hex_field<T>(field: &str, what: &str, parse: fn(&str, u32) -> Result<T, std::num::ParseIntError>) -> Result<T, FormatError> {
    parse(field, 16).map_err(|_| FormatError::BadNumber {
        detail: format!("{what} '{field}' is not hex"),
    })
}

fn hex_u64(field: &str, what: &str) -> Result<u64, FormatError> {
    hex_field(field, what, u64::from_str_radix)
}

fn hex_u32(field: &str, what: &str) -> Result<u32, FormatError> {
    hex_field(field, what, u32::from_str_radix)
}

fn hex_u16(field: &str, what: &str) -> Result<u16, FormatError> {
    hex_field(field, what, u16::from_str_radix)
}

fn hex_u8(field: &str, what: &str) -> Result<u8, FormatError> {
    hex_field(field, what, u8::from_str_radix)
}

fn utf8(bytes: Vec<u8>, what: &str) -> Result<String, FormatError> {
    String::from_utf8(bytes).map_err(|_| FormatError::BadEncoding {
        detail: format!("{what} is not UTF-8"),
    })
}

/// Parse one body line (without its newline) into a token.
pub fn parse_token(line: &str) -> Result<BodyToken, FormatError> {
    let mut chars = line.chars();
    let tag = chars.next().ok_or(FormatError::Truncated {
        detail: "empty token line".into(),
    })?;
    let rest = chars.as_str();
    match tag {
        '!' => parse_option(rest),
        '#' => parse_command_table(rest),
        'T' => parse_timezone(line),
        '>' => parse_command(rest),
        '<' => Ok(BodyToken::Fingerprint(Fingerprint(hex_u16(
            rest,
            "fingerprint",
        )?))),
        ' ' => parse_neutral(rest),
        'k' | 'd' | 'p' | 'l' | 'y' | 'm' | 'o' => {
            let payload = rest.strip_prefix(':').ok_or(FormatError::Truncated {
                detail: format!("'{tag}' token missing ':' separator"),
            })?;
            parse_interaction(tag, payload).map(BodyToken::Interaction)
        }
        other => Err(FormatError::UnknownTag { tag: other }),
    }
}

fn parse_option(rest: &str) -> Result<BodyToken, FormatError> {
    let mut fields = rest.splitn(3, ':');
    let name_text = fields.next().unwrap_or_default();
    let kind = fields.next().ok_or(FormatError::Truncated {
        detail: "option missing type field".into(),
    })?;
    let value_text = fields.next().ok_or(FormatError::Truncated {
        detail: "option missing value field".into(),
    })?;
    let name = utf8(base64::decode(name_text)?, "option name")?;
    let value = match kind {
        "b" => match value_text {
            "0" => OptionValue::Bool(false),
            "1" => OptionValue::Bool(true),
            other => {
                return Err(FormatError::BadNumber {
                    detail: format!("boolean option value '{other}'"),
                })
            }
        },
        "i" => OptionValue::Int(value_text.parse().map_err(|_| FormatError::BadNumber {
            detail: format!("integer option value '{value_text}'"),
        })?),
        "s" => OptionValue::Text(utf8(base64::decode(value_text)?, "option value")?),
        other => {
            return Err(FormatError::BadEncoding {
                detail: format!("unknown option type '{other}'"),
            })
        }
    };
    Ok(BodyToken::Option(GameOption { name, value }))
}

fn parse_command_table(rest: &str) -> Result<BodyToken, FormatError> {
    let bytes = pack::decode_packed(rest)?;
    let table = if bytes.is_empty() {
        CommandTable::from_names(std::iter::empty::<String>())?
    } else {
        CommandTable::from_names(utf8(bytes, "command table")?.split('\n'))?
    };
    Ok(BodyToken::CommandTable(table))
}

fn parse_timezone(line: &str) -> Result<BodyToken, FormatError> {
    let digits = line.strip_prefix("TZ").ok_or(FormatError::UnknownTag {
        tag: line.chars().next().unwrap_or('?'),
    })?;
    let offset = digits.parse().map_err(|_| FormatError::BadNumber {
        detail: format!("timezone offset '{digits}'"),
    })?;
    Ok(BodyToken::Timezone(offset))
}

fn parse_command(rest: &str) -> Result<BodyToken, FormatError> {
    let (head, arg_text) = rest.split_once(' ').ok_or(FormatError::Truncated {
        detail: "command header missing argument field".into(),
    })?;
    let mut fields = head.split(':');
    let clock = GameClock(hex_u64(
        fields.next().unwrap_or_default(),
        "command timestamp",
    )?);
    let index_plus_one = hex_u32(
        fields.next().ok_or(FormatError::Truncated {
            detail: "command header missing index field".into(),
        })?,
        "command index",
    )?;
    let repeat = hex_u32(
        fields.next().ok_or(FormatError::Truncated {
            detail: "command header missing repeat field".into(),
        })?,
        "command repeat",
    )?;
    if fields.next().is_some() {
        return Err(FormatError::BadNumber {
            detail: "command header has trailing fields".into(),
        });
    }
    let index = index_plus_one
        .checked_sub(1)
        .filter(|&i| i <= u16::MAX as u32)
        .ok_or(FormatError::BadNumber {
            detail: format!("command index field {index_plus_one} out of range"),
        })?;

    let arg = parse_command_arg(arg_text)?;
    Ok(BodyToken::Command(CommandRecord {
        clock,
        command: CommandId(index as u16),
        repeat,
        arg,
    }))
}

fn parse_command_arg(text: &str) -> Result<CommandArg, FormatError> {
    if text == "-" {
        return Ok(CommandArg::None);
    }
    let (kind, payload) = text.split_once(':').ok_or(FormatError::Truncated {
        detail: format!("command argument '{text}' missing ':'"),
    })?;
    match kind {
        "d" => Ok(CommandArg::Dir(Direction::from_index(hex_u8(
            payload,
            "argument direction",
        )?)?)),
        "p" => {
            let (x, y) = payload.split_once(':').ok_or(FormatError::Truncated {
                detail: "position argument missing y field".into(),
            })?;
            Ok(CommandArg::Pos(Position {
                x: hex_u16(x, "argument x")?,
                y: hex_u16(y, "argument y")?,
            }))
        }
        "i" => Ok(CommandArg::Item(ItemLetter(hex_u8(
            payload,
            "argument item letter",
        )?))),
        other => Err(FormatError::BadEncoding {
            detail: format!("unknown command argument kind '{other}'"),
        }),
    }
}

fn parse_selection(payload: &str) -> Result<Selection, FormatError> {
    let bytes = pack::decode_packed(payload)?;
    if bytes.len() % 4 != 0 {
        return Err(FormatError::BadEncoding {
            detail: format!("selection payload of {} bytes is not id-aligned", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn parse_interaction(tag: char, payload: &str) -> Result<InteractionToken, FormatError> {
    match tag {
        'k' => {
            let (key_text, count) = match payload.split_once(':') {
                Some((k, n)) => (k, Some(hex_u32(n, "key count")?)),
                None => (payload, None),
            };
            Ok(InteractionToken::Key(KeyPress {
                key: hex_u8(key_text, "key")?,
                count,
            }))
        }
        'd' => Ok(InteractionToken::Direction(Direction::from_index(hex_u8(
            payload,
            "direction",
        )?)?)),
        'p' => {
            let mut fields = payload.split(':');
            let x = hex_u16(fields.next().unwrap_or_default(), "position x")?;
            let y = hex_u16(
                fields.next().ok_or(FormatError::Truncated {
                    detail: "position token missing y field".into(),
                })?,
                "position y",
            )?;
            let gesture_idx = hex_u8(
                fields.next().ok_or(FormatError::Truncated {
                    detail: "position token missing gesture field".into(),
                })?,
                "gesture",
            )?;
            let gesture = Gesture::ALL
                .get(gesture_idx as usize)
                .copied()
                .ok_or(FormatError::BadNumber {
                    detail: format!("gesture index {gesture_idx} out of range"),
                })?;
            Ok(InteractionToken::Position {
                pos: Position { x, y },
                gesture,
            })
        }
        'l' => Ok(InteractionToken::Line(utf8(
            pack::decode_packed(payload)?,
            "line token",
        )?)),
        'y' => match payload {
            "0" => Ok(InteractionToken::YesNo(false)),
            "1" => Ok(InteractionToken::YesNo(true)),
            other => Err(FormatError::BadNumber {
                detail: format!("yes/no value '{other}'"),
            }),
        },
        'm' => Ok(InteractionToken::Menu(parse_selection(payload)?)),
        'o' => Ok(InteractionToken::Objects(parse_selection(payload)?)),
        _ => Err(FormatError::UnknownTag { tag }),
    }
}

fn parse_neutral(rest: &str) -> Result<BodyToken, FormatError> {
    let (kind, payload) = rest.split_once(':').ok_or(FormatError::Truncated {
        detail: "neutral token missing ':' separator".into(),
    })?;
    match kind {
        "f" => Ok(BodyToken::SnapshotDiff(pack::decode_packed(payload)?)),
        "b" if payload == "-" => Ok(BodyToken::Bones(None)),
        "b" => Ok(BodyToken::Bones(Some(pack::decode_packed(payload)?))),
        other => Err(FormatError::UnknownTag {
            tag: other.chars().next().unwrap_or(' '),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use smallvec::smallvec;

    fn roundtrip(token: BodyToken) {
        let line = encode_token(&token);
        assert!(!line.contains('\n'), "token line contains a newline");
        assert_eq!(parse_token(&line).unwrap(), token);
    }

    #[test]
    fn roundtrip_options() {
        roundtrip(BodyToken::Option(GameOption {
            name: "autopickup".into(),
            value: OptionValue::Bool(true),
        }));
        roundtrip(BodyToken::Option(GameOption {
            name: "msg_history".into(),
            value: OptionValue::Int(-20),
        }));
        roundtrip(BodyToken::Option(GameOption {
            name: "name".into(),
            value: OptionValue::Text("Croesus: the rich".into()),
        }));
    }

    #[test]
    fn roundtrip_command_table() {
        let table = CommandTable::from_names(["move", "search", "quaff", "wear"]).unwrap();
        roundtrip(BodyToken::CommandTable(table));
        roundtrip(BodyToken::CommandTable(
            CommandTable::from_names(std::iter::empty::<String>()).unwrap(),
        ));
    }

    #[test]
    fn roundtrip_commands() {
        for arg in [
            CommandArg::None,
            CommandArg::Dir(Direction::Southwest),
            CommandArg::Pos(Position { x: 77, y: 20 }),
            CommandArg::Item(ItemLetter(b'q')),
        ] {
            roundtrip(BodyToken::Command(CommandRecord {
                clock: GameClock(123_456_789),
                command: CommandId(41),
                repeat: 20,
                arg,
            }));
        }
    }

    #[test]
    fn roundtrip_interactions() {
        for token in [
            InteractionToken::Key(KeyPress {
                key: 0x1b,
                count: None,
            }),
            InteractionToken::Key(KeyPress {
                key: b'j',
                count: Some(12),
            }),
            InteractionToken::Direction(Direction::Up),
            InteractionToken::Position {
                pos: Position { x: 3, y: 19 },
                gesture: Gesture::Travel,
            },
            InteractionToken::Line("Elbereth".into()),
            InteractionToken::Line(String::new()),
            InteractionToken::YesNo(false),
            InteractionToken::Menu(smallvec![4, 7, 19]),
            InteractionToken::Objects(smallvec![]),
        ] {
            roundtrip(BodyToken::Interaction(token));
        }
    }

    #[test]
    fn roundtrip_neutral_tokens() {
        roundtrip(BodyToken::Fingerprint(Fingerprint(0xabcd)));
        roundtrip(BodyToken::SnapshotDiff(vec![1, 2, 3, 255]));
        roundtrip(BodyToken::Bones(Some(b"ghost of dungeon past".to_vec())));
        roundtrip(BodyToken::Bones(None));
        roundtrip(BodyToken::Timezone(-18000));
    }

    #[test]
    fn fingerprint_wire_shape() {
        let line = encode_token(&BodyToken::Fingerprint(Fingerprint(0xabcd)));
        assert_eq!(line, "<abcd");
    }

    #[test]
    fn command_index_is_one_based_on_wire() {
        let line = encode_token(&BodyToken::Command(CommandRecord {
            clock: GameClock(0),
            command: CommandId(0),
            repeat: 1,
            arg: CommandArg::None,
        }));
        assert_eq!(line, ">0:1:1 -");
    }

    #[test]
    fn zero_command_index_field_rejected() {
        assert!(matches!(
            parse_token(">0:0:1 -"),
            Err(FormatError::BadNumber { .. })
        ));
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(matches!(
            parse_token("q:stuff"),
            Err(FormatError::UnknownTag { tag: 'q' })
        ));
    }

    #[test]
    fn empty_line_rejected() {
        assert!(matches!(
            parse_token(""),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn truncated_command_rejected() {
        assert!(matches!(
            parse_token(">1a2b:3"),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn misaligned_selection_rejected() {
        let line = format!("m:{}", pack::encode_packed(&[1, 2, 3]));
        assert!(matches!(
            parse_token(&line),
            Err(FormatError::BadEncoding { .. })
        ));
    }

    proptest! {
        #[test]
        fn roundtrip_any_key(key in any::<u8>(), count in prop::option::of(any::<u32>())) {
            roundtrip(BodyToken::Interaction(InteractionToken::Key(KeyPress {
                key,
                count,
            })));
        }

        #[test]
        fn roundtrip_any_line(text in "\\PC{0,80}") {
            roundtrip(BodyToken::Interaction(InteractionToken::Line(text)));
        }

        #[test]
        fn roundtrip_any_selection(ids in prop::collection::vec(any::<u32>(), 0..40)) {
            roundtrip(BodyToken::Interaction(InteractionToken::Menu(
                ids.into_iter().collect(),
            )));
        }

        #[test]
        fn roundtrip_any_fingerprint(v in any::<u16>()) {
            roundtrip(BodyToken::Fingerprint(Fingerprint(v)));
        }
    }
}
