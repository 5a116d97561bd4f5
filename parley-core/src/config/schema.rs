//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::session::DEFAULT_SESSION_ID;

/// Root configuration for parley
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Completion provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Chat handling configuration
    #[serde(default)]
    pub chat: ChatConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: String,
    /// Base URL of the API, without the `/responses` suffix
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// System-level instructions sent with every chat request
    #[serde(default)]
    pub instructions: Option<String>,
    /// Request timeout in seconds; unset means no timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4.1".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            model: default_model(),
            instructions: None,
            timeout_secs: None,
        }
    }
}

/// Chat handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Session used when a request does not name one
    #[serde(default = "default_session")]
    pub default_session: String,
    /// How many characters of an unrecognized response to echo back
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_session() -> String {
    DEFAULT_SESSION_ID.to_string()
}

fn default_preview_chars() -> usize {
    200
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_session: default_session(),
            preview_chars: default_preview_chars(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

impl Config {
    /// Copy of this config safe to print: the API key is masked
    pub fn redacted(&self) -> Config {
        let mut config = self.clone();
        if !config.provider.api_key.is_empty() {
            let tail: String = config
                .provider
                .api_key
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            config.provider.api_key = format!("****{}", tail);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.provider.model, "gpt-4.1");
        assert_eq!(config.chat.default_session, DEFAULT_SESSION_ID);
        assert_eq!(config.chat.preview_chars, 200);
        assert!(config.provider.instructions.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"provider":{"model":"gpt-4o-mini"}}"#).unwrap();
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.api_base, "https://api.openai.com/v1");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_redacted_masks_key() {
        let mut config = Config::default();
        config.provider.api_key = "sk-secret-abcd".to_string();
        assert_eq!(config.redacted().provider.api_key, "****abcd");
        assert!(Config::default().redacted().provider.api_key.is_empty());
    }
}
