use crate::config::schema::{AIConfig, RelayConfig, ServerConfig};
use crate::error::{RelayError, Result};

/// Longest translation timeout we accept, in seconds.
const MAX_TRANSLATE_TIMEOUT_SECS: u64 = 120;

/// Longest heartbeat interval we accept, in seconds.
const MAX_HEARTBEAT_INTERVAL_SECS: u64 = 3600;

/// Validate the whole relay configuration
pub fn validate_config(config: &RelayConfig) -> Result<()> {
    validate_server(&config.server)?;

    if config.heartbeat.interval_secs == 0
        || config.heartbeat.interval_secs > MAX_HEARTBEAT_INTERVAL_SECS
    {
        return Err(RelayError::Validation(format!(
            "Heartbeat interval must be between 1 and {} seconds, got {}",
            MAX_HEARTBEAT_INTERVAL_SECS, config.heartbeat.interval_secs
        )));
    }

    validate_ai(&config.ai)
}

/// Validate listener settings and the extension path
pub fn validate_server(server: &ServerConfig) -> Result<()> {
    if server.host.trim().is_empty() {
        return Err(RelayError::Validation("Host cannot be empty".to_string()));
    }

    let path = server.extension_path.trim_end_matches('/');
    if !path.starts_with('/') {
        return Err(RelayError::Validation(format!(
            "Invalid extension path {:?}. Must start with '/' and name a path other than the root",
            server.extension_path
        )));
    }

    if path == "/api" || path.starts_with("/api/") {
        return Err(RelayError::Validation(format!(
            "Extension path {:?} collides with the HTTP API",
            server.extension_path
        )));
    }

    Ok(())
}

/// Validate translator settings
pub fn validate_ai(ai: &AIConfig) -> Result<()> {
    if ai.timeout_seconds == 0 || ai.timeout_seconds > MAX_TRANSLATE_TIMEOUT_SECS {
        return Err(RelayError::Validation(format!(
            "Translation timeout must be between 1 and {} seconds, got {}",
            MAX_TRANSLATE_TIMEOUT_SECS, ai.timeout_seconds
        )));
    }

    for (id, provider) in &ai.providers {
        if !provider.base_url.starts_with("http://") && !provider.base_url.starts_with("https://")
        {
            return Err(RelayError::Validation(format!(
                "Invalid base_url for provider '{}': {}. Must start with http:// or https://",
                id, provider.base_url
            )));
        }
    }

    if let Some(selection) = &ai.default_llm {
        let (provider_id, model) = selection.split_once(':').ok_or_else(|| {
            RelayError::Validation(format!(
                "Invalid default_llm format '{}'. Expected 'provider_id:model_name'",
                selection
            ))
        })?;
        if provider_id.is_empty() || model.is_empty() {
            return Err(RelayError::Validation(format!(
                "Invalid default_llm format '{}'. Expected 'provider_id:model_name'",
                selection
            )));
        }
        if !ai.providers.contains_key(provider_id) {
            return Err(RelayError::Validation(format!(
                "default_llm refers to unknown provider '{}'",
                provider_id
            )));
        }
    }

    Ok(())
}
