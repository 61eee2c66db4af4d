// Chatstream Engine — Client Configuration
//
// Resolution order: explicit override (CLI flag) > environment > default.
// Env vars: CHATSTREAM_ENDPOINT, CHATSTREAM_MODEL.

use crate::atoms::constants::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::atoms::error::{EngineError, EngineResult};

pub const ENV_ENDPOINT: &str = "CHATSTREAM_ENDPOINT";
pub const ENV_MODEL: &str = "CHATSTREAM_MODEL";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the chat service, without a trailing slash.
    pub endpoint: String,
    /// Model identifier sent with chat requests.
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ChatConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env_or(ENV_ENDPOINT, &defaults.endpoint),
            model: env_or(ENV_MODEL, &defaults.model),
        }
    }

    /// Apply CLI overrides on top of env/default values.
    pub fn with_overrides(mut self, endpoint: Option<String>, model: Option<String>) -> Self {
        if let Some(e) = endpoint {
            self.endpoint = e;
        }
        if let Some(m) = model {
            self.model = m;
        }
        self.endpoint = self.endpoint.trim_end_matches('/').to_string();
        self
    }

    /// Reject obviously broken endpoints before any request is attempted.
    pub fn validate(&self) -> EngineResult<()> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(EngineError::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.model.trim().is_empty() {
            return Err(EngineError::Config("model must not be empty".into()));
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_conventions() {
        let cfg = ChatConfig::default();
        assert_eq!(cfg.endpoint, "http://127.0.0.1:5000");
        assert_eq!(cfg.model, "tinyllama:latest");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn overrides_win_and_trailing_slash_is_stripped() {
        let cfg = ChatConfig::default()
            .with_overrides(Some("http://example.com:8080/".into()), Some("llama3".into()));
        assert_eq!(cfg.endpoint, "http://example.com:8080");
        assert_eq!(cfg.model, "llama3");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = ChatConfig::default().with_overrides(Some("ftp://nope".into()), None);
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));

        let cfg = ChatConfig::default().with_overrides(None, Some("  ".into()));
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));
    }
}
