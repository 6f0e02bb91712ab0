//! Agent records and the deployment status state machine.
//!
//! An [`AgentRecord`] is the locally-tracked association between a domain key
//! and a remotely-hosted conversational agent. The record's
//! [`DeploymentStatus`] gates what operations are allowed: knowledge bases
//! attach and chat serves only once the remote deployment is confirmed
//! running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::domain::DomainKey;

/// Provisioning lifecycle state of a remote agent, tracked locally.
///
/// - Unknown: initial, before the create request is issued
/// - Provisioning: remote creation issued, agent not yet reachable
/// - Running: deployment confirmed ready; safe to attach KBs and serve chat
/// - Degraded: a chat call was rejected as unauthorized after the agent had
///   reached Running; credential rotation is the recovery path
/// - Failed: terminal; requires manual re-registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Unknown,
    Provisioning,
    Running,
    Degraded,
    Failed,
}

impl DeploymentStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Failed)
    }

    /// Whether the state machine admits `self -> next`.
    ///
    /// Any state may transition to Failed; Failed transitions nowhere.
    /// Re-asserting the current state is allowed (idempotent persists).
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if *self == next {
            return true;
        }
        if next == DeploymentStatus::Failed {
            return true;
        }
        matches!(
            (self, next),
            (DeploymentStatus::Unknown, DeploymentStatus::Provisioning)
                | (DeploymentStatus::Provisioning, DeploymentStatus::Running)
                | (DeploymentStatus::Running, DeploymentStatus::Degraded)
                | (DeploymentStatus::Degraded, DeploymentStatus::Running)
        )
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStatus::Unknown => write!(f, "unknown"),
            DeploymentStatus::Provisioning => write!(f, "provisioning"),
            DeploymentStatus::Running => write!(f, "running"),
            DeploymentStatus::Degraded => write!(f, "degraded"),
            DeploymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(DeploymentStatus::Unknown),
            "provisioning" => Ok(DeploymentStatus::Provisioning),
            "running" => Ok(DeploymentStatus::Running),
            "degraded" => Ok(DeploymentStatus::Degraded),
            "failed" => Ok(DeploymentStatus::Failed),
            other => Err(format!("invalid deployment status: '{other}'")),
        }
    }
}

/// An opaque access secret for a remote agent endpoint, with the time it was
/// last known valid.
///
/// The secret never appears in `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessCredential {
    pub secret: String,
    /// When this credential was last minted or confirmed working. `None`
    /// means the credential has been explicitly marked suspect.
    pub verified_at: Option<DateTime<Utc>>,
}

impl AccessCredential {
    /// A credential freshly minted right now.
    pub fn minted_now(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            verified_at: Some(Utc::now()),
        }
    }

    /// Whether this credential was verified within `ttl_secs` of now.
    pub fn is_fresh(&self, ttl_secs: u64) -> bool {
        match self.verified_at {
            Some(at) => (Utc::now() - at).num_seconds() < ttl_secs as i64,
            None => false,
        }
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredential")
            .field("secret", &"<redacted>")
            .field("verified_at", &self.verified_at)
            .finish()
    }
}

/// Association between a domain key and a remotely-hosted agent.
///
/// At most one record exists per domain key; the durable store enforces this
/// with a primary key on `domain_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub domain_key: DomainKey,
    /// Remote agent identifier (provider-assigned UUID).
    pub agent_id: String,
    /// Remote endpoint URL; absent until the deployment reports one.
    pub endpoint_url: Option<String>,
    pub credential: Option<AccessCredential>,
    /// Remote knowledge-base identifiers attached to this agent.
    pub kb_ids: Vec<String>,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentRecord {
    /// A freshly-created record for an agent whose remote creation was just
    /// issued.
    pub fn provisioning(domain_key: DomainKey, agent_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            domain_key,
            agent_id: agent_id.into(),
            endpoint_url: None,
            credential: None,
            kb_ids: Vec::new(),
            status: DeploymentStatus::Provisioning,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this record can serve a chat call right now (modulo
    /// credential freshness, which is checked separately).
    pub fn is_servable(&self) -> bool {
        matches!(
            self.status,
            DeploymentStatus::Running | DeploymentStatus::Degraded
        ) && self.endpoint_url.is_some()
    }
}

/// Association between a domain and a remote knowledge base.
///
/// Rows double as the attachment queue: they may exist while the agent is
/// still provisioning, and the deployment poller attaches them once the
/// agent reaches Running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseRecord {
    pub domain_key: DomainKey,
    /// Remote knowledge-base identifier.
    pub kb_id: String,
    /// Human label for listings.
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeBaseRecord {
    pub fn new(
        domain_key: DomainKey,
        kb_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            domain_key,
            kb_id: kb_id.into(),
            label: label.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            DeploymentStatus::Unknown,
            DeploymentStatus::Provisioning,
            DeploymentStatus::Running,
            DeploymentStatus::Degraded,
            DeploymentStatus::Failed,
        ] {
            let parsed: DeploymentStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(DeploymentStatus::Unknown.can_transition_to(DeploymentStatus::Provisioning));
        assert!(DeploymentStatus::Provisioning.can_transition_to(DeploymentStatus::Running));
        assert!(DeploymentStatus::Running.can_transition_to(DeploymentStatus::Degraded));
        assert!(DeploymentStatus::Degraded.can_transition_to(DeploymentStatus::Running));
    }

    #[test]
    fn test_failed_is_terminal() {
        assert!(DeploymentStatus::Provisioning.can_transition_to(DeploymentStatus::Failed));
        assert!(DeploymentStatus::Running.can_transition_to(DeploymentStatus::Failed));
        assert!(!DeploymentStatus::Failed.can_transition_to(DeploymentStatus::Provisioning));
        assert!(!DeploymentStatus::Failed.can_transition_to(DeploymentStatus::Running));
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        assert!(!DeploymentStatus::Unknown.can_transition_to(DeploymentStatus::Running));
        assert!(!DeploymentStatus::Provisioning.can_transition_to(DeploymentStatus::Degraded));
        assert!(!DeploymentStatus::Running.can_transition_to(DeploymentStatus::Provisioning));
    }

    #[test]
    fn test_credential_freshness() {
        let cred = AccessCredential::minted_now("sk-abc");
        assert!(cred.is_fresh(900));

        let stale = AccessCredential {
            secret: "sk-abc".to_string(),
            verified_at: Some(Utc::now() - chrono::Duration::seconds(901)),
        };
        assert!(!stale.is_fresh(900));

        let suspect = AccessCredential {
            secret: "sk-abc".to_string(),
            verified_at: None,
        };
        assert!(!suspect.is_fresh(900));
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let cred = AccessCredential::minted_now("sk-super-secret");
        let debug = format!("{cred:?}");
        assert!(!debug.contains("sk-super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_provisioning_record_is_not_servable() {
        let record = AgentRecord::provisioning(DomainKey::derive("example.com"), "agent-1");
        assert_eq!(record.status, DeploymentStatus::Provisioning);
        assert!(!record.is_servable());
        assert!(record.credential.is_none());
    }
}
