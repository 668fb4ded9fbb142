//! Webhook endpoint the voice platform posts request envelopes to.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::skill::{ResponseEnvelope, Skill};

pub fn router(skill: Arc<Skill>) -> Router {
    Router::new()
        .route("/", post(handle_envelope))
        .route("/health", get(health_check))
        .with_state(skill)
}

async fn handle_envelope(
    State(skill): State<Arc<Skill>>,
    Json(body): Json<Value>,
) -> Json<ResponseEnvelope> {
    Json(skill.handle_json(body).await)
}

/// Health check handler
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{Completer, Error};
    use crate::skill::{Sanitizer, Storyteller, TracingReporter};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    struct EchoCompleter;

    #[async_trait]
    impl Completer for EchoCompleter {
        async fn complete(&self, prompt: &str) -> Result<String, Error> {
            Ok(format!("{prompt} and then it ended."))
        }
    }

    fn app() -> Router {
        let storyteller = Storyteller::new(
            Arc::new(EchoCompleter),
            Sanitizer::default(),
            "Joey".to_string(),
            Duration::from_secs(1),
        );
        router(Arc::new(Skill::new(storyteller, Arc::new(TracingReporter))))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "OK" }));
    }

    #[tokio::test]
    async fn test_posted_envelope_gets_response_envelope() {
        let envelope = json!({
            "version": "1.0",
            "session": { "new": true, "sessionId": "s-1", "attributes": {} },
            "request": {
                "type": "IntentRequest",
                "requestId": "r-1",
                "timestamp": "2021-03-01T10:15:30Z",
                "intent": {
                    "name": "UtteranceIntent",
                    "slots": { "text": { "name": "text", "value": "A knight set out" } }
                }
            }
        });
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(envelope.to_string()))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["version"], "1.0");
        assert_eq!(body["response"]["outputSpeech"]["type"], "SSML");
        let story = "a knight set out and then it ended.";
        assert_eq!(body["sessionAttributes"]["completion"], story);
        assert_eq!(body["sessionAttributes"]["lastSentence"], story);
        assert_eq!(body["response"]["shouldEndSession"], false);
    }

    #[tokio::test]
    async fn test_non_json_body_is_rejected() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
    }
}
