use chrono::{DateTime, Utc};
use parley_core::config::Config;
use parley_core::{SessionStore, Turn, DEFAULT_SESSION_ID};
use parley_providers::CompletionProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::extract::ExtractionPolicy;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub provider: Arc<dyn CompletionProvider>,
    pub settings: Arc<ChatSettings>,
}

impl AppState {
    pub fn new(
        store: Arc<SessionStore>,
        provider: Arc<dyn CompletionProvider>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            provider,
            settings: Arc::new(settings),
        }
    }
}

/// Per-process chat behaviour derived from the config
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub default_session: String,
    /// System-level directive sent with every completion call
    pub instructions: Option<String>,
    pub extraction: ExtractionPolicy,
}

impl ChatSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_session: config.chat.default_session.clone(),
            instructions: config
                .provider
                .instructions
                .clone()
                .filter(|text| !text.trim().is_empty()),
            extraction: ExtractionPolicy {
                preview_chars: config.chat.preview_chars,
            },
        }
    }

    /// Session named by the caller, or the default one
    pub fn resolve_session(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.default_session.clone(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            default_session: DEFAULT_SESSION_ID.to_string(),
            instructions: None,
            extraction: ExtractionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub user_message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<Turn>,
    /// Last append or clear; absent for a session never used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
