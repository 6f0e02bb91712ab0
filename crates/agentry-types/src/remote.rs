//! Data shapes for remote agent provider interactions.
//!
//! These model the narrow contract the registry holds with the hosting
//! platform: agent creation, deployment status checks, credential minting,
//! knowledge-base attachment, and the chat completion call itself.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::session::TurnRole;

/// Result of a remote "create agent" call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedAgent {
    /// Provider-assigned agent identifier.
    pub agent_id: String,
    /// Endpoint URL, if the provider returned one immediately. Usually
    /// absent until the deployment finishes.
    pub endpoint_url: Option<String>,
}

/// Remote deployment state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteDeploymentState {
    Provisioning,
    Running,
    Failed,
}

impl fmt::Display for RemoteDeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteDeploymentState::Provisioning => write!(f, "provisioning"),
            RemoteDeploymentState::Running => write!(f, "running"),
            RemoteDeploymentState::Failed => write!(f, "failed"),
        }
    }
}

/// A deployment status report for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDeployment {
    pub state: RemoteDeploymentState,
    /// Endpoint URL once the deployment exposes one.
    pub endpoint_url: Option<String>,
}

/// One message in a remote chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteChatMessage {
    pub role: TurnRole,
    pub content: String,
}

impl RemoteChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// The answer returned by a remote chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub content: String,
    /// Model the provider reported serving the request, when available.
    pub model: Option<String>,
}
