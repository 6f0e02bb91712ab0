//! Configuration types for Agentry.
//!
//! Loaded from `{data_dir}/config.toml` by `agentry-infra`; every field has
//! a default so a missing or partial file still yields a working config.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentryConfig {
    pub registry: RegistryConfig,
    pub provider: ProviderConfig,
}

/// Registry behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How long a minted or confirmed credential is trusted without
    /// re-verification, in seconds.
    pub credential_ttl_secs: u64,
    /// First deployment-poll interval, in seconds.
    pub poll_initial_interval_secs: u64,
    /// Cap on the doubled poll interval, in seconds.
    pub poll_max_interval_secs: u64,
    /// Wall-clock budget for the whole deployment poll, in seconds. When
    /// exceeded the agent is marked failed.
    pub poll_budget_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            credential_ttl_secs: 900,
            poll_initial_interval_secs: 2,
            poll_max_interval_secs: 30,
            poll_budget_secs: 180,
        }
    }
}

/// Remote agent provider connection settings.
///
/// The API token itself is never stored in the config file; it comes from
/// the `AGENTRY_PROVIDER_TOKEN` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the provider's provisioning API.
    pub base_url: String,
    /// Provider project to create agents under.
    pub project_id: String,
    /// Model to back newly created agents.
    pub model_id: String,
    /// Provider region for new deployments.
    pub region: String,
    /// Per-request timeout for provider calls, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.digitalocean.com/v2/gen-ai".to_string(),
            project_id: String::new(),
            model_id: String::new(),
            region: "tor1".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentryConfig::default();
        assert_eq!(config.registry.credential_ttl_secs, 900);
        assert_eq!(config.registry.poll_budget_secs, 180);
        assert_eq!(config.provider.region, "tor1");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AgentryConfig = toml::from_str(
            r#"
[registry]
poll_budget_secs = 60
"#,
        )
        .unwrap();
        assert_eq!(config.registry.poll_budget_secs, 60);
        assert_eq!(config.registry.credential_ttl_secs, 900);
        assert_eq!(config.provider.request_timeout_secs, 30);
    }
}
