//! Story continuation state machine.
//!
//! A session starts with no story. The first successful completion
//! creates one; Continue extends it from the stored completion, a new
//! opening line replaces it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::info;

use crate::completion::Completer;
use crate::skill::deadline::call_with_deadline;
use crate::skill::sanitize::Sanitizer;
use crate::skill::speech::{Reply, Speech};

/// Stand-in when a completion has no extractable sentence.
pub const CONTINUE_PLACEHOLDER: &str = "continuing.";

pub const INVITE_CONTINUE: &str = "Say, continue, to continue this story, or else begin a new one.";
pub const TIMEOUT_APOLOGY: &str = "Sorry, the story generator timed out. Please try again.";
pub const TIMEOUT_REPROMPT: &str = "Please try again.";

const COMPLETION_KEY: &str = "completion";
const LAST_SENTENCE_KEY: &str = "lastSentence";
const LEGACY_LAST_SENTENCE_KEY: &str = "lastsentence";

/// Sentence terminators. The ellipsis never survives sanitizing but is
/// still honoured for unsanitized input.
const TERMINATORS: &[char] = &['.', '?', '"', '!', '\u{2026}', ';'];

/// Per-session story state, carried in session attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryState {
    /// Sanitized text of the latest completion; empty before the first.
    pub completion: String,
    /// Last sentence of `completion`, spoken before the next continuation.
    pub last_sentence: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NoStory,
    HasStory,
}

impl StoryState {
    pub fn phase(&self) -> Phase {
        if self.completion.is_empty() {
            Phase::NoStory
        } else {
            Phase::HasStory
        }
    }

    /// Read from session attributes. Missing or non-string values read as empty.
    pub fn from_attributes(attributes: &Map<String, Value>) -> Self {
        Self {
            completion: read_string(attributes, COMPLETION_KEY).unwrap_or_default(),
            last_sentence: read_string(attributes, LAST_SENTENCE_KEY)
                .or_else(|| read_string(attributes, LEGACY_LAST_SENTENCE_KEY))
                .unwrap_or_default(),
        }
    }

    /// Write into session attributes, leaving unrelated keys alone.
    pub fn write_attributes(&self, attributes: &mut Map<String, Value>) {
        attributes.remove(LEGACY_LAST_SENTENCE_KEY);
        attributes.insert(
            COMPLETION_KEY.to_string(),
            Value::String(self.completion.clone()),
        );
        attributes.insert(
            LAST_SENTENCE_KEY.to_string(),
            Value::String(self.last_sentence.clone()),
        );
    }

    /// State after a successful completion.
    fn advance(completion: String) -> Self {
        let last_sentence = last_sentence(&completion);
        Self {
            completion,
            last_sentence,
        }
    }
}

fn read_string(attributes: &Map<String, Value>, key: &str) -> Option<String> {
    attributes.get(key)?.as_str().map(str::to_string)
}

/// Last sentence of `text`, terminator included, trimmed.
///
/// Sentences end at a run of terminators. Fragments that hold nothing but
/// punctuation and whitespace don't count.
pub fn last_sentence(text: &str) -> String {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !TERMINATORS.contains(&c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !TERMINATORS.contains(&next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        sentences.push(&text[start..end]);
        start = end;
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .rev()
        .map(str::trim)
        .find(|s| s.chars().any(is_wordy))
        .map(str::to_string)
        .unwrap_or_else(|| CONTINUE_PLACEHOLDER.to_string())
}

fn is_wordy(c: char) -> bool {
    !TERMINATORS.contains(&c) && !c.is_whitespace()
}

/// One story-advancing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryTurn<'a> {
    /// Start over from this opening line.
    Begin(&'a str),
    /// Extend the current story.
    Continue,
}

impl<'a> StoryTurn<'a> {
    /// The prompt sent to the completer for this turn.
    pub fn prompt(self, state: &'a StoryState) -> &'a str {
        match self {
            StoryTurn::Begin(line) => line,
            StoryTurn::Continue => &state.completion,
        }
    }
}

pub struct Storyteller {
    completer: Arc<dyn Completer>,
    sanitizer: Sanitizer,
    voice: String,
    deadline: Duration,
}

impl Storyteller {
    pub fn new(
        completer: Arc<dyn Completer>,
        sanitizer: Sanitizer,
        voice: String,
        deadline: Duration,
    ) -> Self {
        Self {
            completer,
            sanitizer,
            voice,
            deadline,
        }
    }

    /// Run one turn. On failure the state comes back untouched.
    pub async fn take_turn(&self, turn: StoryTurn<'_>, state: StoryState) -> (Reply, StoryState) {
        let prompt = turn.prompt(&state);
        info!(
            "📖 {} turn ({:?}), prompt of {} chars",
            turn_name(turn),
            state.phase(),
            prompt.len()
        );

        let generated = call_with_deadline(self.completer.as_ref(), prompt, self.deadline)
            .await
            .text()
            .map(|text| self.sanitizer.sanitize(&text))
            .filter(|text| !text.trim().is_empty());

        let Some(continuation) = generated else {
            let reply = Reply::speak(Speech::plain(TIMEOUT_APOLOGY))
                .reprompt(Speech::plain(TIMEOUT_REPROMPT));
            return (reply, state);
        };

        let prefix = match turn {
            StoryTurn::Begin(line) => self.sanitizer.sanitize(line),
            StoryTurn::Continue => state.last_sentence.clone(),
        };

        let mut speech = Speech::default();
        if !prefix.trim().is_empty() {
            speech = speech.voiced(&self.voice, prefix.trim());
        }
        let speech = speech
            .voiced(&self.voice, continuation.trim())
            .then(format!(" {INVITE_CONTINUE}"));

        let next = StoryState::advance(continuation);
        let reply = Reply::speak(speech).reprompt(Speech::plain(INVITE_CONTINUE));
        (reply, next)
    }
}

fn turn_name(turn: StoryTurn<'_>) -> &'static str {
    match turn {
        StoryTurn::Begin(_) => "begin",
        StoryTurn::Continue => "continue",
    }
}
