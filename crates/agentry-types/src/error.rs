use thiserror::Error;

/// Caller-facing errors from registry operations.
///
/// Synchronous operations surface these immediately and never block on
/// unbounded retries; the background poller is the only place transient
/// remote errors are retried automatically.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The domain key has no Domain record. Fatal: register the domain first.
    #[error("domain '{0}' is not registered")]
    NotRegistered(String),

    /// The agent exists but has not reached Running. Retryable after a delay.
    #[error("agent is still being provisioned")]
    StillProvisioning,

    /// A credential refresh was attempted and failed. Retryable a bounded
    /// number of times before the registration is considered broken.
    #[error("agent access credential is invalid and could not be refreshed")]
    CredentialInvalid,

    /// Remote creation or deployment never succeeded within budget. Terminal;
    /// requires manual re-registration.
    #[error("agent provisioning failed permanently")]
    ProvisioningFailed,

    /// Transient network/provider error.
    #[error("remote provider unavailable: {0}")]
    RemoteUnavailable(String),

    /// Durable store fault.
    #[error("storage error: {0}")]
    Storage(String),
}

impl RegistryError {
    /// Whether the caller may retry the same request after a delay.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::StillProvisioning
                | RegistryError::CredentialInvalid
                | RegistryError::RemoteUnavailable(_)
        )
    }
}

/// Errors from the remote agent provider.
///
/// `Unauthorized` is a distinct variant because the registry's chat path
/// reacts to it differently from every other failure (rotate once, retry
/// once).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the access credential.
    #[error("provider rejected the access credential")]
    Unauthorized,

    /// The referenced remote resource does not exist.
    #[error("remote resource not found: {0}")]
    NotFound(String),

    /// The remote deployment reported a failed or cancelled state.
    #[error("remote deployment failed: {0}")]
    DeploymentFailed(String),

    /// The provider returned a non-success response.
    #[error("provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network-level failure reaching the provider.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors related to domain registration.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid domain name: '{0}'")]
    InvalidName(String),

    #[error("domain not found")]
    NotFound,

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors related to session and turn persistence.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("session not found")]
    SessionNotFound,

    #[error("session is closed")]
    SessionClosed,

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors from repository operations (used by trait definitions in agentry-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::NotRegistered("example.com".to_string());
        assert_eq!(err.to_string(), "domain 'example.com' is not registered");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RegistryError::StillProvisioning.is_retryable());
        assert!(RegistryError::CredentialInvalid.is_retryable());
        assert!(RegistryError::RemoteUnavailable("timeout".to_string()).is_retryable());
        assert!(!RegistryError::ProvisioningFailed.is_retryable());
        assert!(!RegistryError::NotRegistered("x.com".to_string()).is_retryable());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Api {
            status: 422,
            message: "bad name".to_string(),
        };
        assert_eq!(err.to_string(), "provider API error (422): bad name");
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Conflict("domain_key exists".to_string());
        assert_eq!(err.to_string(), "conflict: domain_key exists");
    }
}
