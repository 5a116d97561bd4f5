//! Base trait and response schema for completion providers

use async_trait::async_trait;
use parley_core::Turn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Outcome of a completion call: the structured payload or a typed error.
pub type CompletionResult = Result<CompletionResponse, CompletionError>;

/// What went wrong during a completion call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// No turns were supplied; nothing was sent
    EmptyInput,
    /// No API key is configured; nothing was sent
    MissingApiKey,
    /// The request never produced an HTTP response
    Transport,
    /// The service answered with a non-success status
    Api { status: u16 },
    /// The service answered 2xx but the body was not a valid response
    Decode,
}

impl CompletionErrorKind {
    /// Local failures happen before any network traffic
    pub fn is_local(&self) -> bool {
        matches!(self, Self::EmptyInput | Self::MissingApiKey)
    }

    fn prefix(&self) -> &'static str {
        if self.is_local() {
            "Error"
        } else {
            "Error from OpenAI"
        }
    }
}

/// Error reported by a completion provider.
///
/// Rendered as `Error: ...` for local failures and `Error from OpenAI: ...`
/// for anything returned by or on the way to the service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {}", .kind.prefix(), .message)]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
}

impl CompletionError {
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn empty_input() -> Self {
        Self::new(
            CompletionErrorKind::EmptyInput,
            "Input messages list cannot be empty",
        )
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_decode() {
            CompletionErrorKind::Decode
        } else if let Some(status) = e.status() {
            CompletionErrorKind::Api {
                status: status.as_u16(),
            }
        } else {
            CompletionErrorKind::Transport
        };
        Self::new(kind, e.to_string())
    }
}

/// Structured response from the completion service.
///
/// Only the fields the relay reads are typed; everything else is kept in
/// `extra` so the raw payload can still be rendered. A typed field whose
/// JSON type does not match is moved to `extra` instead of failing the
/// whole response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct CompletionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<OutputItem>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One item of the response's `output` list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct OutputItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentItem>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One part of an output item's `content` list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct ContentItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Remove `key` from `map` and decode it as `T`. A value of the wrong type
/// is put back and `None` is returned.
fn take_typed<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = map.remove(key)?;
    match T::deserialize(&value) {
        Ok(typed) => Some(typed),
        Err(_) => {
            map.insert(key.to_string(), value);
            None
        }
    }
}

impl From<Map<String, Value>> for CompletionResponse {
    fn from(mut extra: Map<String, Value>) -> Self {
        let output = take_typed(&mut extra, "output");
        Self { output, extra }
    }
}

impl From<Map<String, Value>> for OutputItem {
    fn from(mut extra: Map<String, Value>) -> Self {
        let role = take_typed(&mut extra, "role");
        let content = take_typed(&mut extra, "content");
        Self {
            role,
            content,
            extra,
        }
    }
}

impl From<Map<String, Value>> for ContentItem {
    fn from(mut extra: Map<String, Value>) -> Self {
        let text = take_typed(&mut extra, "text");
        Self { text, extra }
    }
}

impl CompletionResponse {
    /// Convenience constructor for a single assistant message
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            output: Some(vec![OutputItem {
                role: Some("assistant".to_string()),
                content: Some(vec![ContentItem {
                    text: Some(text.into()),
                    extra: Map::new(),
                }]),
                extra: Map::new(),
            }]),
            extra: Map::new(),
        }
    }
}

impl fmt::Display for CompletionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// Trait for completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send the conversation so far and return the service's answer.
    ///
    /// Never fails out of band: every failure is an `Err` value, and an
    /// empty `turns` slice fails without contacting the service.
    async fn complete(&self, turns: &[Turn], instructions: Option<&str>) -> CompletionResult;

    /// Model identifier requests are sent with
    fn model(&self) -> String;
}
