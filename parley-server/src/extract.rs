//! Turning a completion result into the text shown to the user

use parley_providers::{CompletionResponse, CompletionResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Role stored when the response does not name one
pub const DEFAULT_ROLE: &str = "assistant";

/// Content used when a response has output but no readable text
pub const PARSE_FAILURE_PLACEHOLDER: &str = "Error: Could not parse AI response for frontend.";

/// How unrecognized responses are echoed back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionPolicy {
    /// Characters of the raw response included in the fallback message
    pub preview_chars: usize,
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self { preview_chars: 200 }
    }
}

/// The assistant turn produced for one exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub role: String,
    pub content: String,
}

impl Reply {
    /// Reply with the default role
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: DEFAULT_ROLE.to_string(),
            content: content.into(),
        }
    }
}

/// Pick the role and content to store and return, first match wins:
///
/// 1. an error is shown verbatim;
/// 2. the first text of the first output item, keeping its role if it has
///    one, or [`PARSE_FAILURE_PLACEHOLDER`] when that text is missing;
/// 3. anything else is echoed back as a truncated preview of the raw payload.
pub fn extract_reply(result: &CompletionResult, policy: &ExtractionPolicy) -> Reply {
    let response = match result {
        Err(e) => return Reply::assistant(e.to_string()),
        Ok(response) => response,
    };

    match response.output.as_deref() {
        Some([first, ..]) => {
            let role = first
                .role
                .clone()
                .unwrap_or_else(|| DEFAULT_ROLE.to_string());

            let content = match first.content.as_deref() {
                Some([item, ..]) => match &item.text {
                    Some(text) => text.clone(),
                    None => {
                        warn!("Parsed AI response, but 'text' field missing in content item");
                        PARSE_FAILURE_PLACEHOLDER.to_string()
                    }
                },
                _ => {
                    warn!("Parsed AI response, but 'content' list missing or empty in output item");
                    PARSE_FAILURE_PLACEHOLDER.to_string()
                }
            };

            Reply { role, content }
        }
        _ => {
            warn!(
                "AI response structure not recognized for content extraction. Raw: {}",
                response
            );
            Reply::assistant(unexpected_structure(response, policy.preview_chars))
        }
    }
}

fn unexpected_structure(response: &CompletionResponse, preview_chars: usize) -> String {
    let preview: String = response.to_string().chars().take(preview_chars).collect();
    format!("Received an unexpected response structure: {}...", preview)
}
