//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push("server.host must not be empty".to_string());
    }
    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }
    if config.provider.api_base.trim().is_empty() {
        errors.push("provider.api_base must not be empty".to_string());
    }
    if config.provider.model.trim().is_empty() {
        errors.push("provider.model must not be empty".to_string());
    }
    if config.provider.timeout_secs == Some(0) {
        errors.push("provider.timeout_secs must be > 0 when set".to_string());
    }
    if config.chat.default_session.trim().is_empty() {
        errors.push("chat.default_session must not be empty".to_string());
    }
    if config.chat.preview_chars == 0 {
        errors.push("chat.preview_chars must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
