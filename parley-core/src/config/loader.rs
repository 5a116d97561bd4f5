//! Configuration loading and management

use super::schema::Config;
use super::validate::validate_config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Prefix for `PARLEY__SECTION__KEY` style overrides
const ENV_PREFIX: &str = "PARLEY__";

/// Configuration loader
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".parley"))
            .unwrap_or_else(|| PathBuf::from(".parley"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from file and environment
    pub fn load(&self) -> crate::Result<Config> {
        let config_path = self.config_path();
        let mut merged = serde_json::to_value(Config::default())?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file_value: Value = serde_json::from_str(&content)?;
            merge_values(&mut merged, file_value);
        }

        apply_alias_overrides(&mut merged);
        apply_path_overrides(&mut merged);

        let config: Config = serde_json::from_value(merged)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> crate::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), content)?;
        Ok(())
    }

    /// Path of the JSON config file
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a `.env` file from the working directory (or its parents) into the
/// process environment. Variables already set are left untouched.
///
/// Returns the path that was loaded, or `None` when there is no `.env`.
pub fn load_dotenv() -> crate::Result<Option<PathBuf>> {
    match dotenv::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_values(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return v;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(raw.to_string())
}

fn set_path_value(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Some(map) = current.as_object_mut() {
        map.insert(last.clone(), value);
    }
}

fn apply_alias_overrides(config: &mut Value) {
    let aliases = [
        ("OPENAI_API_KEY", "provider.api_key"),
        ("OPENAI_BASE_URL", "provider.api_base"),
    ];

    for (env_key, target_path) in aliases {
        if let Ok(value) = std::env::var(env_key) {
            let path: Vec<String> = target_path.split('.').map(ToString::to_string).collect();
            set_path_value(config, &path, Value::String(value));
        }
    }
}

fn apply_path_overrides(config: &mut Value) {
    for (key, value) in std::env::vars() {
        let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = suffix
            .split("__")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_lowercase())
            .collect();
        if segments.is_empty() {
            continue;
        }
        // String-typed keys stay strings even if they look like JSON.
        let parsed = match segments.last().map(String::as_str) {
            Some(
                "api_key" | "api_base" | "model" | "instructions" | "host" | "default_session",
            ) => Value::String(value),
            _ => parse_env_value(&value),
        };
        set_path_value(config, &segments, parsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    struct EnvVarGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self {
                key: key.to_string(),
                original,
            }
        }

        fn unset(key: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::remove_var(key);
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }

    fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_load_default_config() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.provider.model, "gpt-4.1");
        assert_eq!(config.server.port, 8001);
    }

    #[test]
    fn test_save_and_load_config() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());

        let mut config = Config::default();
        config.provider.model = "test-model".to_string();
        config.provider.instructions = Some("Please be very concise.".to_string());

        loader.save(&config).unwrap();
        let loaded = loader.load().unwrap();

        assert_eq!(loaded.provider.model, "test-model");
        assert_eq!(
            loaded.provider.instructions.as_deref(),
            Some("Please be very concise.")
        );
    }

    #[test]
    fn test_load_applies_alias_env_overrides() {
        let _lock = lock_env();
        let _key_guard = EnvVarGuard::set("OPENAI_API_KEY", "sk-openai-from-env");
        let _base_guard = EnvVarGuard::set("OPENAI_BASE_URL", "http://localhost:9999/v1");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.provider.api_key, "sk-openai-from-env");
        assert_eq!(config.provider.api_base, "http://localhost:9999/v1");
    }

    #[test]
    fn test_load_applies_path_env_overrides() {
        let _lock = lock_env();
        let _port_guard = EnvVarGuard::set("PARLEY__SERVER__PORT", "9100");
        let _model_guard = EnvVarGuard::set("PARLEY__PROVIDER__MODEL", "gpt-4o");
        let _preview_guard = EnvVarGuard::set("PARLEY__CHAT__PREVIEW_CHARS", "80");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.chat.preview_chars, 80);
    }

    #[test]
    fn test_path_env_overrides_alias_and_file() {
        let _lock = lock_env();
        let _alias_guard = EnvVarGuard::set("OPENAI_API_KEY", "sk-openai-alias");
        let _path_guard = EnvVarGuard::set("PARLEY__PROVIDER__API_KEY", "12345");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        std::fs::write(
            loader.config_path(),
            r#"{"provider":{"api_key":"sk-openai-file"}}"#,
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.provider.api_key, "12345");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let _lock = lock_env();
        let _key_guard = EnvVarGuard::unset("OPENAI_API_KEY");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        std::fs::write(
            loader.config_path(),
            r#"{"server":{"port":8080},"provider":{"api_key":"sk-file"}}"#,
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.provider.api_key, "sk-file");
    }

    #[test]
    fn test_numeric_looking_string_overrides_stay_strings() {
        let _lock = lock_env();
        let _session_guard = EnvVarGuard::set("PARLEY__CHAT__DEFAULT_SESSION", "42");
        let _model_guard = EnvVarGuard::set("PARLEY__PROVIDER__MODEL", "4");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.chat.default_session, "42");
        assert_eq!(config.provider.model, "4");
    }

    #[test]
    fn test_validation_rejects_zero_preview() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::set("PARLEY__CHAT__PREVIEW_CHARS", "0");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let err = loader.load().unwrap_err();
        assert!(err.to_string().contains("preview_chars"));
    }

    #[test]
    fn test_set_path_value_creates_parents() {
        let mut root = Value::Object(Map::new());
        set_path_value(
            &mut root,
            &["a".to_string(), "b".to_string()],
            Value::Bool(true),
        );
        assert_eq!(root, serde_json::json!({"a": {"b": true}}));
    }
}
