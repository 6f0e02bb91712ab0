//! Wire types for the Gradient agent platform API.

use serde::{Deserialize, Serialize};

use agentry_types::remote::RemoteDeploymentState;

#[derive(Debug, Serialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub instruction: String,
    pub model_uuid: String,
    pub project_id: String,
    pub region: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub provide_citations: bool,
    pub conversation_logs_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct AgentEnvelope {
    pub agent: AgentPayload,
}

#[derive(Debug, Deserialize)]
pub struct AgentPayload {
    pub uuid: String,
    #[serde(default)]
    pub deployment: Option<DeploymentPayload>,
}

#[derive(Debug, Deserialize)]
pub struct DeploymentPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl DeploymentPayload {
    /// Map the platform's `STATUS_*` strings onto the three states the
    /// registry cares about. Anything unrecognized counts as still
    /// provisioning so the poller keeps watching until its budget runs out.
    pub fn state(&self) -> RemoteDeploymentState {
        match self.status.as_deref() {
            Some("STATUS_RUNNING") => RemoteDeploymentState::Running,
            Some("STATUS_FAILED") | Some("STATUS_CANCELED") => RemoteDeploymentState::Failed,
            _ => RemoteDeploymentState::Provisioning,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateKeyRequest {
    pub name: String,
}

/// Response shape of the dedicated key-mint endpoint. This is the only
/// place a credential is ever read from.
#[derive(Debug, Deserialize)]
pub struct ApiKeyEnvelope {
    pub api_key_info: ApiKeyInfo,
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyInfo {
    pub secret_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<WireChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: WireChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_state_mapping() {
        let running = DeploymentPayload {
            status: Some("STATUS_RUNNING".to_string()),
            url: Some("https://agent.example.test".to_string()),
        };
        assert_eq!(running.state(), RemoteDeploymentState::Running);

        for failed in ["STATUS_FAILED", "STATUS_CANCELED"] {
            let payload = DeploymentPayload {
                status: Some(failed.to_string()),
                url: None,
            };
            assert_eq!(payload.state(), RemoteDeploymentState::Failed);
        }

        for pending in ["STATUS_WAITING_FOR_DEPLOYMENT", "STATUS_DEPLOYING"] {
            let payload = DeploymentPayload {
                status: Some(pending.to_string()),
                url: None,
            };
            assert_eq!(payload.state(), RemoteDeploymentState::Provisioning);
        }

        let unknown = DeploymentPayload {
            status: None,
            url: None,
        };
        assert_eq!(unknown.state(), RemoteDeploymentState::Provisioning);
    }

    #[test]
    fn test_key_envelope_deserializes_documented_shape() {
        let json = r#"{"api_key_info": {"secret_key": "sk-abc", "name": "key-1"}}"#;
        let envelope: ApiKeyEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.api_key_info.secret_key, "sk-abc");
    }

    #[test]
    fn test_chat_response_deserializes() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "hi"}}]}"#;
        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content, "hi");
        assert!(response.model.is_none());
    }
}
