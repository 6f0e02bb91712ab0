//! GradientAgentClient -- concrete [`AgentProvider`] implementation for the
//! Gradient agent hosting platform.
//!
//! Provisioning calls (`/agents`, `/agents/{id}/api_keys`, ...) authenticate
//! with the platform token; chat completions go to the agent's own endpoint
//! with the per-agent access key. A 401 from the chat endpoint maps to
//! [`ProviderError::Unauthorized`] so the registry can distinguish credential
//! rejection from every other failure.
//!
//! The platform token is wrapped in [`secrecy::SecretString`] and is never
//! logged or included in `Debug` output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use agentry_core::remote::provider::AgentProvider;
use agentry_types::config::ProviderConfig;
use agentry_types::error::ProviderError;
use agentry_types::remote::{ChatAnswer, CreatedAgent, RemoteChatMessage, RemoteDeployment};

use super::types::{
    AgentEnvelope, ApiKeyEnvelope, ChatCompletionRequest, ChatCompletionResponse,
    CreateAgentRequest, CreateKeyRequest, WireChatMessage,
};

/// Gradient agent platform client.
pub struct GradientAgentClient {
    client: reqwest::Client,
    token: SecretString,
    base_url: String,
    project_id: String,
    model_id: String,
    region: String,
}

impl GradientAgentClient {
    /// Create a new client from the provider config and platform token.
    pub fn new(token: SecretString, config: &ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            token,
            base_url: config.base_url.clone(),
            project_id: config.project_id.clone(),
            model_id: config.model_id.clone(),
            region: config.region.clone(),
        }
    }

    /// Override the base URL (useful for testing or proxies).
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => ProviderError::Unauthorized,
            404 => ProviderError::NotFound(body),
            code => ProviderError::Api {
                status: code,
                message: body,
            },
        })
    }

    fn transport(err: reqwest::Error) -> ProviderError {
        ProviderError::Transport(err.to_string())
    }
}

// GradientAgentClient intentionally does NOT derive Debug so the platform
// token cannot leak through formatting.

impl AgentProvider for GradientAgentClient {
    async fn create_agent(&self, domain_name: &str) -> Result<CreatedAgent, ProviderError> {
        let body = CreateAgentRequest {
            name: sanitize_resource_name(&format!("support-agent-{domain_name}"), "support-agent"),
            instruction: agent_instruction(domain_name),
            model_uuid: self.model_id.clone(),
            project_id: self.project_id.clone(),
            region: self.region.clone(),
            temperature: 0.7,
            max_tokens: 4096,
            provide_citations: true,
            conversation_logs_enabled: true,
        };

        let response = self
            .client
            .post(self.url("/agents"))
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(Self::transport)?;
        let envelope: AgentEnvelope = Self::check(response)
            .await?
            .json()
            .await
            .map_err(Self::transport)?;

        Ok(CreatedAgent {
            agent_id: envelope.agent.uuid,
            endpoint_url: envelope.agent.deployment.and_then(|d| d.url),
        })
    }

    async fn deployment_status(&self, agent_id: &str) -> Result<RemoteDeployment, ProviderError> {
        let response = self
            .client
            .get(self.url(&format!("/agents/{agent_id}")))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(Self::transport)?;
        let envelope: AgentEnvelope = Self::check(response)
            .await?
            .json()
            .await
            .map_err(Self::transport)?;

        let deployment = envelope.agent.deployment.unwrap_or(super::types::DeploymentPayload {
            status: None,
            url: None,
        });
        Ok(RemoteDeployment {
            state: deployment.state(),
            endpoint_url: deployment.url,
        })
    }

    async fn mint_access_key(
        &self,
        agent_id: &str,
        key_name: &str,
    ) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.url(&format!("/agents/{agent_id}/api_keys")))
            .bearer_auth(self.token.expose_secret())
            .json(&CreateKeyRequest {
                name: key_name.to_string(),
            })
            .send()
            .await
            .map_err(Self::transport)?;

        // The dedicated mint endpoint is the only credential source; keys
        // embedded in list/describe responses are frequently stale.
        let envelope: ApiKeyEnvelope = Self::check(response)
            .await?
            .json()
            .await
            .map_err(Self::transport)?;

        Ok(envelope.api_key_info.secret_key)
    }

    async fn attach_knowledge_base(&self, agent_id: &str, kb_id: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.url(&format!("/agents/{agent_id}/knowledge_bases/{kb_id}")))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn chat_completion(
        &self,
        endpoint_url: &str,
        credential: &str,
        messages: &[RemoteChatMessage],
    ) -> Result<ChatAnswer, ProviderError> {
        let body = ChatCompletionRequest {
            messages: messages
                .iter()
                .map(|m| WireChatMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        };

        let url = format!("{}/api/v1/chat/completions", endpoint_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport)?;
        let completion: ChatCompletionResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(Self::transport)?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Api {
                status: 200,
                message: "chat completion returned no choices".to_string(),
            })?;

        Ok(ChatAnswer {
            content,
            model: completion.model,
        })
    }
}

/// System instruction for a newly provisioned support agent.
fn agent_instruction(domain_name: &str) -> String {
    format!(
        "You are a helpful customer support assistant for {domain_name}. \
         Answer questions accurately from the attached knowledge bases, \
         mention when information comes from the website, and say so \
         honestly when you do not know the answer."
    )
}

/// Sanitize a name to the platform's resource-name rules: lowercase,
/// `[a-z0-9_-]` only, no consecutive or leading/trailing hyphens, leading
/// alphanumeric, at most 63 characters, never empty.
pub fn sanitize_resource_name(name: &str, fallback: &str) -> String {
    let lowered = name.to_lowercase();
    let mut sanitized = String::with_capacity(lowered.len());
    let mut prev_was_hyphen = true; // treat start as hyphen to trim leading
    for c in lowered.chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            c
        } else {
            '-'
        };
        if c == '-' {
            if !prev_was_hyphen {
                sanitized.push('-');
            }
            prev_was_hyphen = true;
        } else {
            sanitized.push(c);
            prev_was_hyphen = false;
        }
    }
    if sanitized.ends_with('-') {
        sanitized.pop();
    }

    if !sanitized.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        sanitized = format!("{fallback}-{sanitized}");
    }
    sanitized.truncate(63);
    if sanitized.ends_with('-') {
        sanitized.pop();
    }
    if sanitized.is_empty() {
        sanitized = fallback.to_string();
    }
    sanitized
}
