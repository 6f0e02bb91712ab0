//! AgentProvider trait definition.
//!
//! This is the narrow contract the registry holds with the remote hosting
//! platform. Uses native async fn in traits (RPITIT, Rust 2024 edition).
//! The concrete HTTP client lives in agentry-infra.

use agentry_types::error::ProviderError;
use agentry_types::remote::{ChatAnswer, CreatedAgent, RemoteChatMessage, RemoteDeployment};

/// Trait for the remote agent hosting platform.
///
/// Credential minting is its own explicit operation with a single documented
/// response shape. Implementations must never infer credentials from
/// list/describe responses -- keys embedded there have proven stale.
pub trait AgentProvider: Send + Sync {
    /// Create a remote agent for a domain. The returned endpoint URL is
    /// usually absent until the deployment finishes.
    fn create_agent(
        &self,
        domain_name: &str,
    ) -> impl std::future::Future<Output = Result<CreatedAgent, ProviderError>> + Send;

    /// Query the deployment status of an agent.
    fn deployment_status(
        &self,
        agent_id: &str,
    ) -> impl std::future::Future<Output = Result<RemoteDeployment, ProviderError>> + Send;

    /// Mint a fresh access key for an agent endpoint. Returns the secret.
    fn mint_access_key(
        &self,
        agent_id: &str,
        key_name: &str,
    ) -> impl std::future::Future<Output = Result<String, ProviderError>> + Send;

    /// Attach a knowledge base to an agent. The remote API rejects this
    /// with not-found until the agent's deployment is running.
    fn attach_knowledge_base(
        &self,
        agent_id: &str,
        kb_id: &str,
    ) -> impl std::future::Future<Output = Result<(), ProviderError>> + Send;

    /// Send a chat completion to a deployed agent endpoint. Fails with
    /// [`ProviderError::Unauthorized`] when the credential is rejected,
    /// distinguishable from every other failure.
    fn chat_completion(
        &self,
        endpoint_url: &str,
        credential: &str,
        messages: &[RemoteChatMessage],
    ) -> impl std::future::Future<Output = Result<ChatAnswer, ProviderError>> + Send;
}
