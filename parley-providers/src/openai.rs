//! OpenAI Responses API client

use async_trait::async_trait;
use parley_core::config::ProviderConfig;
use parley_core::Turn;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::base::{
    CompletionError, CompletionErrorKind, CompletionProvider, CompletionResponse,
    CompletionResult,
};

/// Responses API request format
#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a [Turn],
    /// Always false: the conversation is not kept server-side.
    store: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

/// Completion provider backed by `POST {api_base}/responses`
pub struct OpenAiResponsesClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiResponsesClient {
    /// Create a new client. `timeout` of `None` keeps reqwest's default.
    pub fn new(
        api_key: Option<String>,
        api_base: Option<String>,
        model: String,
        timeout: Option<Duration>,
    ) -> Self {
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        let api_base = api_base
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    /// Create a client from the provider section of the config
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            Some(config.api_key.clone()),
            Some(config.api_base.clone()),
            config.model.clone(),
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.api_base)
    }

    fn build_request<'a>(
        &'a self,
        turns: &'a [Turn],
        instructions: Option<&'a str>,
    ) -> ResponsesRequest<'a> {
        ResponsesRequest {
            model: &self.model,
            input: turns,
            store: false,
            instructions: instructions.filter(|text| !text.is_empty()),
        }
    }

    async fn send(
        &self,
        api_key: &str,
        request: &ResponsesRequest<'_>,
    ) -> Result<CompletionResponse, CompletionError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CompletionError::new(
                CompletionErrorKind::Api {
                    status: status.as_u16(),
                },
                format!("HTTP {}: {}", status, body),
            ));
        }

        // Only a body that is not a JSON object is a decode error; fields of
        // an unexpected type are left for reply extraction to judge.
        serde_json::from_str(&body).map_err(|e| {
            CompletionError::new(
                CompletionErrorKind::Decode,
                format!("response body is not a JSON object: {}", e),
            )
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiResponsesClient {
    async fn complete(&self, turns: &[Turn], instructions: Option<&str>) -> CompletionResult {
        if turns.is_empty() {
            warn!("complete called with an empty turn list");
            return Err(CompletionError::empty_input());
        }

        let Some(api_key) = self.api_key.as_deref() else {
            warn!("No API key configured for the completion provider");
            return Err(CompletionError::new(
                CompletionErrorKind::MissingApiKey,
                "no API key configured (set OPENAI_API_KEY)",
            ));
        };

        let request = self.build_request(turns, instructions);
        debug!(
            "Sending {} turn(s) to {} with model {}",
            turns.len(),
            self.api_base,
            self.model
        );

        let result = self.send(api_key, &request).await;
        if let Err(e) = &result {
            warn!("Error calling OpenAI Responses API: {}", e.message);
        }
        result
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
