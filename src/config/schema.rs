use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    /// Listener and role-selection settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Liveness probing
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Delays before web clients are told the relay is "Ready" again
    #[serde(default)]
    pub status: StatusConfig,

    /// LLM translation backend
    #[serde(default)]
    pub ai: AIConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request path that designates a browser-extension connection.
    /// Every other path is treated as a web client.
    #[serde(default = "default_extension_path")]
    pub extension_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            extension_path: default_extension_path(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_extension_path() -> String {
    "/extension".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between liveness sweeps. A connection silent for two sweeps is evicted.
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval(),
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_heartbeat_interval() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// After "Execution confirmed"
    #[serde(default = "default_confirmation_revert")]
    pub confirmation_revert_ms: u64,

    /// After an extension execution error
    #[serde(default = "default_error_revert")]
    pub error_revert_ms: u64,

    /// After an unsupported command, a translator failure, or no extension
    #[serde(default = "default_failure_revert")]
    pub failure_revert_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            confirmation_revert_ms: default_confirmation_revert(),
            error_revert_ms: default_error_revert(),
            failure_revert_ms: default_failure_revert(),
        }
    }
}

impl StatusConfig {
    pub fn confirmation_revert(&self) -> Duration {
        Duration::from_millis(self.confirmation_revert_ms)
    }

    pub fn error_revert(&self) -> Duration {
        Duration::from_millis(self.error_revert_ms)
    }

    pub fn failure_revert(&self) -> Duration {
        Duration::from_millis(self.failure_revert_ms)
    }
}

fn default_confirmation_revert() -> u64 {
    1500
}

fn default_error_revert() -> u64 {
    2000
}

fn default_failure_revert() -> u64 {
    1500
}

// ==================== AI Configuration ====================

/// API type for the provider
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    #[default]
    Openai,
    Anthropic,
    Ollama,
    Google,
}

/// AI Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name for this provider
    pub name: String,
    /// API type (determines request format)
    #[serde(default)]
    pub api_type: ApiType,
    /// Base URL for the API
    pub base_url: String,
    /// API key (optional for local providers like Ollama)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is not set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Available models for this provider
    #[serde(default)]
    pub models: Vec<String>,
}

impl ProviderConfig {
    /// Inline key first, then the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIConfig {
    /// LLM used for command translation (format: "provider_id:model_name")
    #[serde(default = "default_llm")]
    pub default_llm: Option<String>,

    /// Upper bound on a single translation request, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// AI providers configuration (key = provider id, value = config)
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_timeout() -> u64 {
    15
}

fn default_llm() -> Option<String> {
    Some("google:gemini-pro".to_string())
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert(
        "google".to_string(),
        ProviderConfig {
            name: "Google Gemini".to_string(),
            api_type: ApiType::Google,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            api_key_env: Some("GOOGLE_API_KEY".to_string()),
            models: vec!["gemini-pro".to_string()],
        },
    );
    providers
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            default_llm: default_llm(),
            timeout_seconds: default_timeout(),
            providers: default_providers(),
        }
    }
}

impl AIConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [server]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.extension_path, "/extension");
        assert_eq!(config.heartbeat.interval_secs, 15);
        assert_eq!(config.status.error_revert(), Duration::from_millis(2000));
        assert_eq!(config.ai.timeout(), Duration::from_secs(15));

        let config: RelayConfig = toml::from_str(
            r#"
            [ai]
            timeout_seconds = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.ai.timeout(), Duration::from_secs(10));
        assert_eq!(config.ai.default_llm.as_deref(), Some("google:gemini-pro"));
        assert!(config.ai.providers.contains_key("google"));
    }

    #[test]
    fn test_default_provider_is_gemini() {
        let config = RelayConfig::default();
        assert_eq!(config.ai.default_llm.as_deref(), Some("google:gemini-pro"));
        let google = &config.ai.providers["google"];
        assert_eq!(google.api_type, ApiType::Google);
        assert_eq!(google.api_key_env.as_deref(), Some("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_inline_api_key_wins() {
        let provider = ProviderConfig {
            name: "test".to_string(),
            api_type: ApiType::Openai,
            base_url: "https://api.example.com".to_string(),
            api_key: Some("inline".to_string()),
            api_key_env: Some("ALRIS_TEST_UNSET_KEY_VAR".to_string()),
            models: vec![],
        };
        assert_eq!(provider.resolve_api_key().as_deref(), Some("inline"));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let provider = ProviderConfig {
            name: "test".to_string(),
            api_type: ApiType::Ollama,
            base_url: "http://localhost:11434".to_string(),
            api_key: Some("  ".to_string()),
            api_key_env: None,
            models: vec![],
        };
        assert!(provider.resolve_api_key().is_none());
    }

    #[test]
    fn test_api_type_lowercase_serde() {
        let provider: ProviderConfig = toml::from_str(
            r#"
            name = "Claude"
            api_type = "anthropic"
            base_url = "https://api.anthropic.com"
            "#,
        )
        .unwrap();
        assert_eq!(provider.api_type, ApiType::Anthropic);
    }
}
