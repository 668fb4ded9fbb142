use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompletionParams;

/// Something that can continue a prompt.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, Error>;
}

pub struct Client {
    api_key: String,
    base_url: String,
    params: CompletionParams,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    frequency_penalty: f32,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    text: String,
}

impl Client {
    pub fn new(api_key: String, base_url: String, params: CompletionParams) -> Self {
        Self {
            api_key,
            base_url,
            params,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/engines/{}/completions",
            self.base_url,
            urlencoding::encode(&self.params.model)
        )
    }
}

#[async_trait]
impl Completer for Client {
    async fn complete(&self, prompt: &str) -> Result<String, Error> {
        let request = ApiRequest {
            prompt,
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            frequency_penalty: self.params.frequency_penalty,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        let choices = api_response.choices.len();
        debug!("Completion returned {choices} choice(s)");

        api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(Error::Empty)
    }
}

#[derive(Debug)]
pub enum Error {
    Http(String),
    Api(String),
    Parse(String),
    Empty,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
            Error::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for Error {}
