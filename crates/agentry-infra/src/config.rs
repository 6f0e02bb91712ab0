//! Configuration loader for Agentry.
//!
//! Reads `config.toml` from the data directory (`~/.agentry/` in production)
//! and deserializes it into [`AgentryConfig`]. Falls back to defaults when
//! the file is missing or malformed. The provider token never lives in the
//! config file; it comes from the `AGENTRY_PROVIDER_TOKEN` environment
//! variable.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use agentry_types::config::AgentryConfig;

/// Environment variable holding the remote provider API token.
pub const PROVIDER_TOKEN_ENV: &str = "AGENTRY_PROVIDER_TOKEN";

/// Resolve the data directory: `AGENTRY_DATA_DIR` if set, else `~/.agentry`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENTRY_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentry")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`AgentryConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(data_dir: &Path) -> AgentryConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AgentryConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AgentryConfig::default();
        }
    };

    match toml::from_str::<AgentryConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AgentryConfig::default()
        }
    }
}

/// Read the provider token from the environment.
pub fn provider_token() -> anyhow::Result<SecretString> {
    let token = std::env::var(PROVIDER_TOKEN_ENV).map_err(|_| {
        anyhow::anyhow!("{PROVIDER_TOKEN_ENV} is not set; export the provider API token first")
    })?;
    if token.trim().is_empty() {
        anyhow::bail!("{PROVIDER_TOKEN_ENV} is empty");
    }
    Ok(SecretString::from(token))
}
