//! Voice platform request and response envelopes.
//!
//! Inbound JSON is decoded into an [`Event`], the tagged dispatch key.
//! Anything that can't be decoded becomes a [`RouteError`] for the error
//! handler, so a malformed request still gets a spoken reply.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::skill::speech::{Reply, Speech};

pub const UTTERANCE_INTENT: &str = "UtteranceIntent";
pub const CONTINUE_INTENT: &str = "ContinueIntent";
pub const HELP_INTENT: &str = "AMAZON.HelpIntent";
pub const CANCEL_INTENT: &str = "AMAZON.CancelIntent";
pub const STOP_INTENT: &str = "AMAZON.StopIntent";

/// Slot carrying the free-form story line.
pub const TEXT_SLOT: &str = "text";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub session: Option<Session>,
    pub request: Request,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    pub locale: Option<String>,
    pub intent: Option<Intent>,
    /// Why the session ended (SessionEndedRequest only).
    pub reason: Option<String>,
    pub error: Option<RequestError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default)]
    pub slots: HashMap<String, Slot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Slot {
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestError {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

/// Timestamps only feed logging, so anything that isn't RFC 3339 reads as absent.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::String(raw)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(&raw).ok();
    Ok(parsed.map(|t| t.with_timezone(&Utc)))
}

impl RequestEnvelope {
    /// Session attributes, empty when the platform sent none.
    pub fn attributes(&self) -> Map<String, Value> {
        self.session
            .as_ref()
            .and_then(|s| s.attributes.clone())
            .unwrap_or_default()
    }

    pub fn session_id(&self) -> &str {
        self.session.as_ref().map_or("", |s| s.session_id.as_str())
    }
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Launch,
    /// Start a new story with this opening line.
    Utterance(String),
    Continue,
    Help,
    Cancel,
    Stop,
    SessionEnded,
    /// An intent with no dedicated handler.
    Unrecognized(String),
}

impl Event {
    pub fn from_request(request: &Request) -> Result<Self, RouteError> {
        match request.kind.as_str() {
            "LaunchRequest" => Ok(Event::Launch),
            "SessionEndedRequest" => Ok(Event::SessionEnded),
            "IntentRequest" => {
                let intent = request.intent.as_ref().ok_or(RouteError::MissingIntent)?;
                Self::from_intent(intent)
            }
            other => Err(RouteError::UnsupportedRequest(other.to_string())),
        }
    }

    fn from_intent(intent: &Intent) -> Result<Self, RouteError> {
        let event = match intent.name.as_str() {
            UTTERANCE_INTENT => {
                let text = intent
                    .slots
                    .get(TEXT_SLOT)
                    .and_then(|slot| slot.value.as_deref())
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .ok_or_else(|| RouteError::MissingSlot {
                        intent: intent.name.clone(),
                        slot: TEXT_SLOT,
                    })?;
                Event::Utterance(text.to_string())
            }
            CONTINUE_INTENT => Event::Continue,
            HELP_INTENT => Event::Help,
            CANCEL_INTENT => Event::Cancel,
            STOP_INTENT => Event::Stop,
            name => Event::Unrecognized(name.to_string()),
        };
        Ok(event)
    }
}

/// Failure to turn a request into an [`Event`].
#[derive(Debug)]
pub enum RouteError {
    /// The body wasn't a request envelope at all.
    Malformed(String),
    /// An IntentRequest without an intent payload.
    MissingIntent,
    MissingSlot { intent: String, slot: &'static str },
    UnsupportedRequest(String),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Malformed(e) => write!(f, "malformed request envelope: {e}"),
            RouteError::MissingIntent => write!(f, "intent request carries no intent"),
            RouteError::MissingSlot { intent, slot } => {
                write!(f, "{intent} is missing a value for slot '{slot}'")
            }
            RouteError::UnsupportedRequest(kind) => write!(f, "no handler for request type {kind}"),
        }
    }
}

impl std::error::Error for RouteError {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub version: &'static str,
    pub session_attributes: Map<String, Value>,
    pub response: ResponseBody,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<OutputSpeech>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reprompt: Option<Reprompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_end_session: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct OutputSpeech {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub ssml: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reprompt {
    pub output_speech: OutputSpeech,
}

impl From<&Speech> for OutputSpeech {
    fn from(speech: &Speech) -> Self {
        Self {
            kind: "SSML",
            ssml: speech.to_ssml(),
        }
    }
}

impl From<&Speech> for Reprompt {
    fn from(speech: &Speech) -> Self {
        Self {
            output_speech: speech.into(),
        }
    }
}

impl ResponseEnvelope {
    pub fn new(reply: &Reply, session_attributes: Map<String, Value>) -> Self {
        Self {
            version: "1.0",
            session_attributes,
            response: ResponseBody {
                output_speech: reply.speech.as_ref().map(OutputSpeech::from),
                reprompt: reply.reprompt.as_ref().map(Reprompt::from),
                should_end_session: reply.end_session,
            },
        }
    }
}
