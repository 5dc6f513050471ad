//! The `Session` type: one `ask(...)` shape, two sources of answers.

use delve_core::{
    Direction, FormatError, Gesture, InputError, InputSource, InteractionToken, KeyPress,
    MenuEntry, Position, Prompter, Reply, Selection, Transcript,
};
use delve_log::wire::BodyToken;
use delve_log::{LogError, LogWriter};

/// Which source of answers a session was constructed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Answers come from the live prompter and are appended to the log.
    Record,
    /// Answers come from recorded tokens; nothing is appended.
    Replay,
    /// Answers come from recorded tokens until they run out, then from
    /// the live prompter.
    Resume,
}

/// A read cursor over the recorded tokens of one command (or of a
/// log's unreplayed tail, in resume mode).
///
/// Yields interaction and bones tokens; anything else in the span is a
/// format error surfaced at the `ask` that hits it.
#[derive(Clone, Debug)]
pub struct TokenFeed<'a> {
    tokens: &'a [(u64, BodyToken)],
    pos: usize,
}

impl<'a> TokenFeed<'a> {
    /// A feed over a span of tokenized log content.
    pub fn new(tokens: &'a [(u64, BodyToken)]) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Tokens not yet consumed.
    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }

    fn next(&mut self) -> Option<&'a BodyToken> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }
}

struct Live<'a> {
    writer: &'a mut LogWriter,
    prompter: &'a mut dyn Prompter,
}

/// The duality layer around one simulation's external questions.
///
/// Constructed per command in one of three modes; implements
/// [`InputSource`], which is all the simulation ever sees.
pub struct Session<'a> {
    feed: Option<TokenFeed<'a>>,
    live: Option<Live<'a>>,
    transcript: Option<&'a mut (dyn Transcript + 'static)>,
}

impl<'a> Session<'a> {
    /// A live session: solicit, append, echo.
    pub fn record(writer: &'a mut LogWriter, prompter: &'a mut dyn Prompter) -> Self {
        Self {
            feed: None,
            live: Some(Live { writer, prompter }),
            transcript: None,
        }
    }

    /// A pure replay session: read back, echo, never append.
    pub fn replay(feed: TokenFeed<'a>, transcript: Option<&'a mut (dyn Transcript + 'static)>) -> Self {
        Self {
            feed: Some(feed),
            live: None,
            transcript,
        }
    }

    /// A resume session: replay until the recorded input runs out, then
    /// fall through to live mode.
    pub fn resume(
        feed: TokenFeed<'a>,
        writer: &'a mut LogWriter,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            feed: Some(feed),
            live: Some(Live { writer, prompter }),
            transcript: None,
        }
    }

    /// The session's current mode.
    ///
    /// A resume session that has exhausted its recorded input reports
    /// [`Mode::Record`]: the fall-through already happened.
    pub fn mode(&self) -> Mode {
        match (&self.feed, &self.live) {
            (Some(_), None) => Mode::Replay,
            (Some(_), Some(_)) => Mode::Resume,
            (None, Some(_)) => Mode::Record,
            (None, None) => unreachable!("session constructed without a source"),
        }
    }

    /// Recorded tokens not yet consumed, if any remain.
    pub fn unconsumed(&self) -> usize {
        self.feed.as_ref().map_or(0, TokenFeed::remaining)
    }

    /// Pull the next recorded token for the primitive tagged `tag`.
    ///
    /// `Ok(None)` means "solicit live": either this is a record-mode
    /// session, or a resume session whose recorded input just ran out.
    fn next_recorded(&mut self, tag: char) -> Result<Option<&'a BodyToken>, InputError> {
        let Some(feed) = self.feed.as_mut() else {
            return Ok(None);
        };
        match feed.next() {
            Some(token) => {
                let found = match token {
                    BodyToken::Interaction(tok) => tok.tag(),
                    BodyToken::Bones(_) => 'b',
                    // The cursor slices spans so that only interaction
                    // material lands in a feed; anything else is a
                    // malformed log.
                    BodyToken::Command(_) => '>',
                    BodyToken::Fingerprint(_) => '<',
                    BodyToken::SnapshotDiff(_) => 'f',
                    BodyToken::Option(_) => '!',
                    BodyToken::CommandTable(_) => '#',
                    BodyToken::Timezone(_) => 'T',
                };
                if found != tag {
                    return Err(FormatError::TokenMismatch {
                        expected: tag,
                        found,
                    }
                    .into());
                }
                Ok(Some(token))
            }
            None => {
                if self.live.is_some() {
                    // The no-more-recorded-input sentinel: fall through
                    // to live mode for this and all later asks.
                    self.feed = None;
                    Ok(None)
                } else {
                    Err(InputError::Exhausted)
                }
            }
        }
    }

    fn live(&mut self) -> &mut Live<'a> {
        self.live
            .as_mut()
            .expect("next_recorded returned None only with a live half present")
    }

    fn append(&mut self, token: &InteractionToken) -> Result<(), InputError> {
        self.live()
            .writer
            .append_interaction(token)
            .map_err(write_error)
    }

    fn echo(&mut self, line: &str) {
        if let Some(live) = self.live.as_mut() {
            live.prompter.echo(line);
        } else if let Some(transcript) = self.transcript.as_mut() {
            transcript.echo(line);
        }
    }
}

fn write_error(e: LogError) -> InputError {
    match e {
        LogError::Io(io) => InputError::Write(io),
        other => InputError::Write(std::io::Error::other(other.to_string())),
    }
}

fn render_direction(d: Direction) -> &'static str {
    match d {
        Direction::North => "north",
        Direction::Northeast => "northeast",
        Direction::East => "east",
        Direction::Southeast => "southeast",
        Direction::South => "south",
        Direction::Southwest => "southwest",
        Direction::West => "west",
        Direction::Northwest => "northwest",
        Direction::Up => "up",
        Direction::Down => "down",
        Direction::Here => "here",
    }
}

fn render_selection(ids: &Selection) -> String {
    if ids.is_empty() {
        "nothing".into()
    } else {
        ids.iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl InputSource for Session<'_> {
    fn ask_direction(&mut self, prompt: &str) -> Result<Direction, InputError> {
        let dir = match self.next_recorded('d')? {
            Some(BodyToken::Interaction(InteractionToken::Direction(d))) => *d,
            Some(_) => unreachable!("tag-checked by next_recorded"),
            None => {
                let live = self.live();
                let dir = loop {
                    match live.prompter.pick_direction(prompt) {
                        Reply::Answer(d) => break d,
                        Reply::Cancelled => continue,
                    }
                };
                self.append(&InteractionToken::Direction(dir))?;
                dir
            }
        };
        self.echo(&format!("{prompt} {}", render_direction(dir)));
        Ok(dir)
    }

    fn ask_position(&mut self, prompt: &str) -> Result<(Position, Gesture), InputError> {
        let (pos, gesture) = match self.next_recorded('p')? {
            Some(BodyToken::Interaction(InteractionToken::Position { pos, gesture })) => {
                (*pos, *gesture)
            }
            Some(_) => unreachable!("tag-checked by next_recorded"),
            None => {
                let live = self.live();
                let answer = loop {
                    match live.prompter.pick_position(prompt) {
                        Reply::Answer(a) => break a,
                        Reply::Cancelled => continue,
                    }
                };
                self.append(&InteractionToken::Position {
                    pos: answer.0,
                    gesture: answer.1,
                })?;
                answer
            }
        };
        self.echo(&format!("{prompt} ({}, {})", pos.x, pos.y));
        Ok((pos, gesture))
    }

    fn ask_key(&mut self, prompt: &str) -> Result<KeyPress, InputError> {
        let press = match self.next_recorded('k')? {
            Some(BodyToken::Interaction(InteractionToken::Key(press))) => *press,
            Some(_) => unreachable!("tag-checked by next_recorded"),
            None => {
                let live = self.live();
                let press = loop {
                    match live.prompter.query_key(prompt) {
                        Reply::Answer(k) => break k,
                        Reply::Cancelled => continue,
                    }
                };
                self.append(&InteractionToken::Key(press))?;
                press
            }
        };
        self.echo(&format!("{prompt} {:?}", press.key as char));
        Ok(press)
    }

    fn ask_line(&mut self, prompt: &str) -> Result<String, InputError> {
        let text = match self.next_recorded('l')? {
            Some(BodyToken::Interaction(InteractionToken::Line(text))) => text.clone(),
            Some(_) => unreachable!("tag-checked by next_recorded"),
            None => {
                let live = self.live();
                let text = loop {
                    match live.prompter.get_line(prompt) {
                        Reply::Answer(t) => break t,
                        Reply::Cancelled => continue,
                    }
                };
                self.append(&InteractionToken::Line(text.clone()))?;
                text
            }
        };
        self.echo(&format!("{prompt} \"{text}\""));
        Ok(text)
    }

    fn ask_yes_no(&mut self, prompt: &str, default: bool) -> Result<bool, InputError> {
        let answer = match self.next_recorded('y')? {
            Some(BodyToken::Interaction(InteractionToken::YesNo(v))) => *v,
            Some(_) => unreachable!("tag-checked by next_recorded"),
            None => {
                let live = self.live();
                let answer = loop {
                    match live.prompter.yes_no(prompt, default) {
                        Reply::Answer(v) => break v,
                        Reply::Cancelled => continue,
                    }
                };
                self.append(&InteractionToken::YesNo(answer))?;
                answer
            }
        };
        self.echo(&format!("{prompt} {}", if answer { "yes" } else { "no" }));
        Ok(answer)
    }

    fn ask_menu(&mut self, prompt: &str, entries: &[MenuEntry]) -> Result<Selection, InputError> {
        let picks = match self.next_recorded('m')? {
            Some(BodyToken::Interaction(InteractionToken::Menu(ids))) => ids.clone(),
            Some(_) => unreachable!("tag-checked by next_recorded"),
            None => {
                let live = self.live();
                let picks = loop {
                    match live.prompter.display_menu(prompt, entries) {
                        Reply::Answer(p) => break p,
                        Reply::Cancelled => continue,
                    }
                };
                self.append(&InteractionToken::Menu(picks.clone()))?;
                picks
            }
        };
        self.echo(&format!("{prompt} {}", render_selection(&picks)));
        Ok(picks)
    }

    fn ask_objects(
        &mut self,
        prompt: &str,
        entries: &[MenuEntry],
    ) -> Result<Selection, InputError> {
        let picks = match self.next_recorded('o')? {
            Some(BodyToken::Interaction(InteractionToken::Objects(ids))) => ids.clone(),
            Some(_) => unreachable!("tag-checked by next_recorded"),
            None => {
                let live = self.live();
                let picks = loop {
                    match live.prompter.display_objects(prompt, entries) {
                        Reply::Answer(p) => break p,
                        Reply::Cancelled => continue,
                    }
                };
                self.append(&InteractionToken::Objects(picks.clone()))?;
                picks
            }
        };
        self.echo(&format!("{prompt} {}", render_selection(&picks)));
        Ok(picks)
    }

    fn ask_bones(&mut self) -> Result<Option<Vec<u8>>, InputError> {
        match self.next_recorded('b')? {
            Some(BodyToken::Bones(payload)) => Ok(payload.clone()),
            Some(_) => unreachable!("tag-checked by next_recorded"),
            None => {
                let live = self.live();
                let payload = live.prompter.fetch_bones();
                live.writer
                    .append_bones(payload.as_deref())
                    .map_err(write_error)?;
                Ok(payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::{CommandTable, InteractionToken, NewGameMeta, NullLock};
    use delve_test_utils::{pick, MemoryTranscript, MockDungeon, ScriptedPrompter, ScriptedReply};
    use std::fs::File;

    fn writer_fixture() -> (tempfile::TempDir, LogWriter) {
        let dir = tempfile::tempdir().unwrap();
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(dir.path().join("game.nhgame"))
            .unwrap();
        let sim = MockDungeon::new(1);
        let writer = LogWriter::begin(
            file,
            &NewGameMeta::default(),
            &CommandTable::from_names(["walk"]).unwrap(),
            &sim,
            Box::new(NullLock),
        )
        .unwrap();
        (dir, writer)
    }

    fn interaction(token: InteractionToken) -> (u64, BodyToken) {
        (0, BodyToken::Interaction(token))
    }

    #[test]
    fn record_mode_appends_and_echoes() {
        let (_dir, mut writer) = writer_fixture();
        let mut prompter =
            ScriptedPrompter::new().with(ScriptedReply::Direction(Direction::North));
        let before = writer.valid_length();

        let mut session = Session::record(&mut writer, &mut prompter);
        assert_eq!(session.mode(), Mode::Record);
        let dir = session.ask_direction("Walk where?").unwrap();

        assert_eq!(dir, Direction::North);
        assert!(writer.valid_length() > before);
        assert_eq!(prompter.transcript, vec!["Walk where? north"]);
    }

    #[test]
    fn cancellation_retries_the_whole_primitive() {
        let (_dir, mut writer) = writer_fixture();
        let mut prompter = ScriptedPrompter::new()
            .with(ScriptedReply::Cancel)
            .with(ScriptedReply::Cancel)
            .with(ScriptedReply::YesNo(true));

        let mut session = Session::record(&mut writer, &mut prompter);
        let answer = session.ask_yes_no("Really attack?", false).unwrap();
        assert!(answer);
        assert_eq!(prompter.remaining(), 0);
    }

    #[test]
    fn replay_mode_reads_back_without_appending() {
        let (_dir, mut writer) = writer_fixture();
        let tokens = vec![
            interaction(InteractionToken::Direction(Direction::Southwest)),
            interaction(InteractionToken::YesNo(false)),
        ];
        let before = writer.valid_length();

        let mut transcript = MemoryTranscript::default();
        let mut session = Session::replay(TokenFeed::new(&tokens), Some(&mut transcript));
        assert_eq!(session.mode(), Mode::Replay);
        assert_eq!(
            session.ask_direction("Walk where?").unwrap(),
            Direction::Southwest
        );
        assert!(!session.ask_yes_no("Sure?", true).unwrap());

        assert_eq!(writer.valid_length(), before);
        assert_eq!(transcript.lines.len(), 2);
    }

    #[test]
    fn replay_tag_mismatch_is_a_format_error() {
        let tokens = vec![interaction(InteractionToken::YesNo(true))];
        let mut session = Session::replay(TokenFeed::new(&tokens), None);
        let err = session.ask_direction("Walk where?").unwrap_err();
        assert!(matches!(
            err,
            InputError::Format(FormatError::TokenMismatch {
                expected: 'd',
                found: 'y'
            })
        ));
    }

    #[test]
    fn pure_replay_exhaustion_is_an_error() {
        let tokens: Vec<(u64, BodyToken)> = Vec::new();
        let mut session = Session::replay(TokenFeed::new(&tokens), None);
        assert!(matches!(
            session.ask_line("Name?"),
            Err(InputError::Exhausted)
        ));
    }

    #[test]
    fn resume_falls_through_to_live_on_exhaustion() {
        let (_dir, mut writer) = writer_fixture();
        let tokens = vec![interaction(InteractionToken::Line("Croesus".into()))];
        let mut prompter = ScriptedPrompter::new().with(ScriptedReply::YesNo(true));

        let mut session = Session::resume(TokenFeed::new(&tokens), &mut writer, &mut prompter);
        assert_eq!(session.mode(), Mode::Resume);

        // First ask comes from the recording.
        assert_eq!(session.ask_line("Name?").unwrap(), "Croesus");
        // Second crosses the sentinel into live mode.
        assert!(session.ask_yes_no("Continue?", false).unwrap());
        assert_eq!(session.mode(), Mode::Record);
        assert_eq!(prompter.remaining(), 0);
    }

    #[test]
    fn replayed_answers_match_recorded_sequence() {
        // Record a command's worth of answers, then replay them through
        // a fresh session and compare what the simulation receives.
        let (_dir, mut writer) = writer_fixture();
        let mut prompter = ScriptedPrompter::new()
            .with(ScriptedReply::Key(KeyPress {
                key: b'w',
                count: Some(3),
            }))
            .with(ScriptedReply::Selection(pick(2)));

        let mut session = Session::record(&mut writer, &mut prompter);
        let press = session.ask_key("Zap?").unwrap();
        let picks = session.ask_menu("Pick?", &[]).unwrap();

        let tokens = vec![
            interaction(InteractionToken::Key(press)),
            interaction(InteractionToken::Menu(picks.clone())),
        ];
        let mut replay = Session::replay(TokenFeed::new(&tokens), None);
        assert_eq!(replay.ask_key("Zap?").unwrap(), press);
        assert_eq!(replay.ask_menu("Pick?", &[]).unwrap(), picks);
        assert_eq!(replay.unconsumed(), 0);
    }

    #[test]
    fn bones_roundtrip_through_both_modes() {
        let (_dir, mut writer) = writer_fixture();
        let mut prompter = ScriptedPrompter::new();
        prompter.push_bones(Some(b"old ghost".to_vec()));

        let mut session = Session::record(&mut writer, &mut prompter);
        let live = session.ask_bones().unwrap();
        assert_eq!(live.as_deref(), Some(b"old ghost".as_slice()));

        let tokens = vec![(0, BodyToken::Bones(live.clone()))];
        let mut replay = Session::replay(TokenFeed::new(&tokens), None);
        assert_eq!(replay.ask_bones().unwrap(), live);
    }

}
