use crate::config::schema::RelayConfig;
use crate::error::{RelayError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that points at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ALRIS_CONFIG";

/// Get the configuration file path (`ALRIS_CONFIG`, else the platform config dir)
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .map(|p| p.join("alris-relay"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

/// Load configuration from the default path, creating it if it does not exist
pub fn load_config() -> Result<RelayConfig> {
    load_config_from(&get_config_path())
}

/// Load configuration from `config_path`, writing defaults there if missing
pub fn load_config_from(config_path: &Path) -> Result<RelayConfig> {
    if !config_path.exists() {
        tracing::info!(
            "Config file not found at {:?}, creating default",
            config_path
        );
        return init_config(config_path);
    }

    let content = fs::read_to_string(config_path).map_err(|e| {
        RelayError::Config(format!(
            "Failed to read config from {:?}: {}",
            config_path, e
        ))
    })?;

    let config: RelayConfig = toml::from_str(&content)?;

    tracing::info!("Loaded config from {:?}", config_path);
    Ok(config)
}

/// Save configuration to `config_path`
pub fn save_config(config: &RelayConfig, config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                RelayError::Config(format!(
                    "Failed to create config directory {:?}: {}",
                    parent, e
                ))
            })?;
        }
    }

    let content = toml::to_string_pretty(config)?;

    fs::write(config_path, content).map_err(|e| {
        RelayError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::info!("Saved config to {:?}", config_path);
    Ok(())
}

/// Initialize default configuration and save to file
pub fn init_config(config_path: &Path) -> Result<RelayConfig> {
    let config = RelayConfig::default();
    save_config(&config, config_path)?;
    Ok(config)
}

/// Apply `PORT`/`ALRIS_PORT`, `ALRIS_HOST` and `ALRIS_LLM` from the process environment.
pub fn apply_env_overrides(config: &mut RelayConfig) -> Result<()> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides using `lookup` as the variable source.
pub fn apply_overrides<F>(config: &mut RelayConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let port = lookup("ALRIS_PORT").or_else(|| lookup("PORT"));
    if let Some(port) = port {
        config.server.port = port.trim().parse().map_err(|_| {
            RelayError::Config(format!("Invalid port in environment: {:?}", port))
        })?;
    }

    if let Some(host) = lookup("ALRIS_HOST").filter(|h| !h.trim().is_empty()) {
        config.server.host = host;
    }

    if let Some(llm) = lookup("ALRIS_LLM").filter(|l| !l.trim().is_empty()) {
        config.ai.default_llm = Some(llm);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("alris-relay-test-{}-{}", name, uuid::Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_config_path() {
        let path = get_config_path();
        assert!(path.to_string_lossy().ends_with(".toml"));
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let path = temp_config_path("init");
        let config = load_config_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.server.port, 8080);

        let reloaded = load_config_from(&path).unwrap();
        assert_eq!(reloaded.server.extension_path, config.server.extension_path);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let path = temp_config_path("broken");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[server\nport = ").unwrap();
        let result = load_config_from(&path);
        assert!(matches!(result, Err(RelayError::TomlDeserialize(_))));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "9001"),
            ("ALRIS_HOST", "127.0.0.1"),
            ("ALRIS_LLM", "openai:gpt-4o-mini"),
        ]
        .into_iter()
        .collect();
        let mut config = RelayConfig::default();
        apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.ai.default_llm.as_deref(), Some("openai:gpt-4o-mini"));
    }

    #[test]
    fn test_alris_port_beats_port() {
        let mut config = RelayConfig::default();
        apply_overrides(&mut config, |k| match k {
            "ALRIS_PORT" => Some("7000".to_string()),
            "PORT" => Some("7001".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_bad_port_override_fails() {
        let mut config = RelayConfig::default();
        let result = apply_overrides(&mut config, |k| {
            (k == "PORT").then(|| "eighty".to_string())
        });
        assert!(matches!(result, Err(RelayError::Config(_))));
    }
}
