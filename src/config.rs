use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::skill::sanitize::{compile_word_filter, default_blocked_words};

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse JSON.
    ParseJson {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The API credential environment variable is unset or empty.
    MissingApiKey { var: String },
    /// The blocked word list did not compile.
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(
                    f,
                    "failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            Self::ParseJson { path, source } => {
                write!(
                    f,
                    "failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            Self::MissingApiKey { var } => {
                write!(f, "environment variable {var} is unset or empty")
            }
            Self::InvalidRegex { pattern, source } => {
                write!(f, "invalid regex pattern '{}': {}", pattern, source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            Self::MissingApiKey { .. } | Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Name of the environment variable holding the bearer credential.
    #[serde(default = "default_api_key_env")]
    api_key_env: String,
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    /// Model identifier, substituted into the endpoint path.
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_frequency_penalty")]
    frequency_penalty: f32,
    /// Deadline for one completion call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    /// Voice used to read generated story text.
    #[serde(default = "default_story_voice")]
    story_voice: String,
    /// Character repeated over a filtered word.
    #[serde(default = "default_placeholder")]
    placeholder: String,
    /// Words to filter. Empty means the built-in list.
    #[serde(default)]
    blocked_words: Vec<String>,
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
}

fn default_api_key_env() -> String {
    "GPT3KEY".to_string()
}

fn default_api_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "ada".to_string()
}

fn default_max_tokens() -> u32 {
    75
}

fn default_temperature() -> f32 {
    0.7
}

fn default_frequency_penalty() -> f32 {
    0.5
}

fn default_timeout_ms() -> u64 {
    6000
}

fn default_story_voice() -> String {
    "Joey".to_string()
}

fn default_placeholder() -> String {
    "o".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn parse_config_file(content: &str, path: &Path) -> Result<ConfigFile, ConfigError> {
    serde_json::from_str(content).map_err(|source| ConfigError::ParseJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Fixed parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub frequency_penalty: f32,
}

pub struct Config {
    pub api_key: String,
    pub api_base_url: String,
    pub completion: CompletionParams,
    pub timeout: Duration,
    pub story_voice: String,
    pub placeholder: char,
    /// Compiled whole-word, case-insensitive filter over `blocked_words`.
    pub word_filter: Regex,
    pub listen_addr: SocketAddr,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let file = parse_config_file(&content, path)?;
        Self::build(file, |var| std::env::var(var).ok())
    }

    /// All defaults, credential from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_json("{}", |var| std::env::var(var).ok())
    }

    /// Parse a JSON document, resolving the credential through `lookup`.
    pub fn from_json<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = parse_config_file(content, Path::new("<inline>"))?;
        Self::build(file, lookup)
    }

    fn build<F>(file: ConfigFile, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(&file.api_key_env)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                var: file.api_key_env.clone(),
            })?;

        if file.model.trim().is_empty() {
            return Err(ConfigError::Validation("model is required".into()));
        }
        if file.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "max_tokens must be greater than zero".into(),
            ));
        }
        if !(0.0..=2.0).contains(&file.temperature) {
            return Err(ConfigError::Validation(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(-2.0..=2.0).contains(&file.frequency_penalty) {
            return Err(ConfigError::Validation(
                "frequency_penalty must be between -2.0 and 2.0".into(),
            ));
        }
        if file.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        // The voice name is spliced into SSML attributes
        let voice_ok = file.story_voice.chars().all(|c| c.is_ascii_alphanumeric());
        if file.story_voice.is_empty() || !voice_ok {
            return Err(ConfigError::Validation(
                "story_voice must be a non-empty ASCII alphanumeric voice name".into(),
            ));
        }
        let mut placeholder_chars = file.placeholder.chars();
        let placeholder = match (placeholder_chars.next(), placeholder_chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => c,
            _ => {
                return Err(ConfigError::Validation(
                    "placeholder must be a single ASCII letter or digit".into(),
                ));
            }
        };

        let mut words: Vec<String> = file
            .blocked_words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            words = default_blocked_words();
        }
        let word_filter = match compile_word_filter(&words) {
            Ok(filter) => filter,
            Err((pattern, source)) => return Err(ConfigError::InvalidRegex { pattern, source }),
        };

        let listen_addr = file.listen_addr.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "listen_addr '{}' is not a socket address",
                file.listen_addr
            ))
        })?;

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            api_key,
            api_base_url: file.api_base_url.trim_end_matches('/').to_string(),
            completion: CompletionParams {
                model: file.model,
                max_tokens: file.max_tokens,
                temperature: file.temperature,
                frequency_penalty: file.frequency_penalty,
            },
            timeout: Duration::from_millis(file.timeout_ms),
            story_voice: file.story_voice,
            placeholder,
            word_filter,
            listen_addr,
            data_dir,
        })
    }
}
