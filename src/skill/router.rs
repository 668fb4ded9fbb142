//! Intent routing.
//!
//! Handlers are tried in priority order and the first match is the only
//! one invoked: launch, story, help, cancel/stop, session end, then the
//! reflector for every other intent. Anything that fails to decode goes to
//! the error handler instead.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::skill::envelope::{Event, Request, RequestEnvelope, ResponseEnvelope, RouteError};
use crate::skill::report::{ErrorContext, ErrorReporter};
use crate::skill::speech::{Reply, Speech};
use crate::skill::story::{StoryState, StoryTurn, Storyteller};

pub const LAUNCH_PROMPT: &str = "Say the first line of a story.";
pub const HELP_TEXT: &str = "Start a story with an opening line, and I will keep it going. At the end, you can begin a new story, or say, continue, to continue the one we started.";
pub const GOODBYE: &str = "Goodbye!";
pub const ERROR_APOLOGY: &str = "Sorry, I had trouble doing what you asked. Please try again.";

/// The handler chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Launch,
    Story,
    Help,
    CancelStop,
    SessionEnded,
    Reflector,
    Error,
}

/// Pick the single handler for `event`.
pub fn select_handler(event: &Event) -> HandlerKind {
    match event {
        Event::Launch => HandlerKind::Launch,
        Event::Utterance(_) | Event::Continue => HandlerKind::Story,
        Event::Help => HandlerKind::Help,
        Event::Cancel | Event::Stop => HandlerKind::CancelStop,
        Event::SessionEnded => HandlerKind::SessionEnded,
        Event::Unrecognized(_) => HandlerKind::Reflector,
    }
}

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub handler: HandlerKind,
    pub reply: Reply,
    pub state: StoryState,
}

pub struct Skill {
    storyteller: Storyteller,
    reporter: Arc<dyn ErrorReporter>,
}

impl Skill {
    pub fn new(storyteller: Storyteller, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            storyteller,
            reporter,
        }
    }

    /// Handle a raw JSON body. Bodies that aren't envelopes get the error
    /// reply, with whatever session attributes they carried passed back.
    pub async fn handle_json(&self, body: Value) -> ResponseEnvelope {
        match RequestEnvelope::deserialize(&body) {
            Ok(envelope) => self.handle(envelope).await,
            Err(e) => {
                let field = |pointer: &str| body.pointer(pointer).and_then(Value::as_str);
                let context = ErrorContext {
                    request_id: field("/request/requestId").unwrap_or(""),
                    request_type: field("/request/type").unwrap_or(""),
                    session_id: field("/session/sessionId").unwrap_or(""),
                };
                let reply = self.handle_error(&context, &RouteError::Malformed(e.to_string()));
                let attributes = body
                    .pointer("/session/attributes")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                ResponseEnvelope::new(&reply, attributes)
            }
        }
    }

    pub async fn handle(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
        let request = &envelope.request;
        debug!(
            "Envelope v{} new_session={} locale={:?} timestamp={:?}",
            envelope.version,
            envelope.session.as_ref().is_some_and(|s| s.new),
            request.locale,
            request.timestamp
        );
        let mut attributes = envelope.attributes();
        let state = StoryState::from_attributes(&attributes);
        let turn = self.route(&envelope, state).await;
        info!(
            "🗣️ {} {} → {:?}",
            envelope.request.kind,
            envelope.request.request_id,
            turn.handler
        );
        if let Some(speech) = &turn.reply.speech {
            debug!("Speaking: {}", speech.text());
        }
        turn.state.write_attributes(&mut attributes);
        ResponseEnvelope::new(&turn.reply, attributes)
    }

    /// Decode and dispatch, falling back to the error handler.
    pub async fn route(&self, envelope: &RequestEnvelope, state: StoryState) -> Turn {
        match Event::from_request(&envelope.request) {
            Ok(event) => self.dispatch(event, &envelope.request, state).await,
            Err(e) => {
                let context = ErrorContext {
                    request_id: &envelope.request.request_id,
                    request_type: &envelope.request.kind,
                    session_id: envelope.session_id(),
                };
                Turn {
                    handler: HandlerKind::Error,
                    reply: self.handle_error(&context, &e),
                    state,
                }
            }
        }
    }

    async fn dispatch(&self, event: Event, request: &Request, state: StoryState) -> Turn {
        let handler = select_handler(&event);
        let (reply, state) = match event {
            Event::Launch => launch(),
            Event::Utterance(line) => {
                let turn = StoryTurn::Begin(&line);
                self.storyteller.take_turn(turn, state).await
            }
            Event::Continue => self.storyteller.take_turn(StoryTurn::Continue, state).await,
            Event::Help => (ask(HELP_TEXT), state),
            Event::Cancel | Event::Stop => (goodbye(), state),
            Event::SessionEnded => (session_ended(request), state),
            Event::Unrecognized(name) => (reflect(&name), state),
        };
        Turn {
            handler,
            reply,
            state,
        }
    }

    fn handle_error(&self, context: &ErrorContext<'_>, error: &RouteError) -> Reply {
        self.reporter.report(context, error);
        ask(ERROR_APOLOGY)
    }
}

/// Say `text` and keep listening, repeating it on silence.
fn ask(text: &str) -> Reply {
    Reply::speak(Speech::plain(text)).reprompt(Speech::plain(text))
}

fn launch() -> (Reply, StoryState) {
    (ask(LAUNCH_PROMPT), StoryState::default())
}

fn goodbye() -> Reply {
    Reply::speak(Speech::plain(GOODBYE)).end_session()
}

fn session_ended(request: &Request) -> Reply {
    let reason = request.reason.as_deref().unwrap_or("unknown");
    match &request.error {
        Some(e) => warn!("Session ended ({reason}): {} {}", e.kind, e.message),
        None => info!("👋 Session ended ({reason})"),
    }
    Reply::empty()
}

/// Echo the intent name back, for testing the interaction model.
fn reflect(intent_name: &str) -> Reply {
    Reply::speak(Speech::plain(format!("You just triggered {intent_name}.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_handler_priority() {
        assert_eq!(select_handler(&Event::Launch), HandlerKind::Launch);
        let utterance = Event::Utterance("x".into());
        assert_eq!(select_handler(&utterance), HandlerKind::Story);
        assert_eq!(select_handler(&Event::Continue), HandlerKind::Story);
        assert_eq!(select_handler(&Event::Help), HandlerKind::Help);
        assert_eq!(select_handler(&Event::Cancel), HandlerKind::CancelStop);
        assert_eq!(select_handler(&Event::Stop), HandlerKind::CancelStop);
        assert_eq!(
            select_handler(&Event::SessionEnded),
            HandlerKind::SessionEnded
        );
        let other = Event::Unrecognized("AMAZON.NavigateHomeIntent".into());
        assert_eq!(select_handler(&other), HandlerKind::Reflector);
    }

    #[test]
    fn test_launch_resets_story() {
        let (reply, state) = launch();
        assert_eq!(state, StoryState::default());
        assert_eq!(reply.speech.unwrap().text(), LAUNCH_PROMPT);
        assert_eq!(reply.reprompt.unwrap().text(), LAUNCH_PROMPT);
    }

    #[test]
    fn test_reflect_names_intent() {
        let reply = reflect("AMAZON.NavigateHomeIntent");
        assert_eq!(
            reply.speech.unwrap().text(),
            "You just triggered AMAZON.NavigateHomeIntent."
        );
        assert_eq!(reply.end_session, None);
    }
}
