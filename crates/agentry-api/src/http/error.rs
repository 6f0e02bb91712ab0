//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use agentry_types::error::{ConversationError, DomainError, RegistryError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Registry/agent errors.
    Registry(RegistryError),
    /// Domain registration errors.
    Domain(DomainError),
    /// Session/turn errors.
    Conversation(ConversationError),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        AppError::Registry(e)
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError::Domain(e)
    }
}

impl From<ConversationError> for AppError {
    fn from(e: ConversationError) -> Self {
        AppError::Conversation(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Registry(RegistryError::NotRegistered(key)) => (
                StatusCode::NOT_FOUND,
                "DOMAIN_NOT_REGISTERED",
                format!("Domain '{key}' is not registered"),
            ),
            // Distinguishable "try again shortly" so front ends can render a
            // friendly waiting message instead of a generic error.
            AppError::Registry(RegistryError::StillProvisioning) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "AGENT_PROVISIONING",
                "Your agent is being deployed. This usually takes 1-2 minutes. Please try again shortly.".to_string(),
            ),
            AppError::Registry(RegistryError::CredentialInvalid) => (
                StatusCode::BAD_GATEWAY,
                "CREDENTIAL_INVALID",
                "The agent's access credential could not be refreshed. Please retry.".to_string(),
            ),
            AppError::Registry(RegistryError::ProvisioningFailed) => (
                StatusCode::BAD_GATEWAY,
                "PROVISIONING_FAILED",
                "Agent provisioning failed permanently; re-register the domain.".to_string(),
            ),
            AppError::Registry(RegistryError::RemoteUnavailable(msg)) => (
                StatusCode::BAD_GATEWAY,
                "REMOTE_UNAVAILABLE",
                format!("Remote provider unavailable: {msg}"),
            ),
            AppError::Registry(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "REGISTRY_ERROR",
                e.to_string(),
            ),
            AppError::Domain(DomainError::InvalidName(name)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Invalid domain name: '{name}'"),
            ),
            AppError::Domain(DomainError::NotFound) => (
                StatusCode::NOT_FOUND,
                "DOMAIN_NOT_FOUND",
                "Domain not found".to_string(),
            ),
            AppError::Domain(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DOMAIN_ERROR",
                e.to_string(),
            ),
            AppError::Conversation(ConversationError::SessionNotFound) => (
                StatusCode::NOT_FOUND,
                "SESSION_NOT_FOUND",
                "Session not found".to_string(),
            ),
            AppError::Conversation(ConversationError::SessionClosed) => (
                StatusCode::CONFLICT,
                "SESSION_CLOSED",
                "Session is closed".to_string(),
            ),
            AppError::Conversation(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONVERSATION_ERROR",
                e.to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let body = json!({
            "data": null,
            "meta": {
                "timestamp": chrono::Utc::now().to_rfc3339(),
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_still_provisioning_maps_to_503() {
        let response = AppError::Registry(RegistryError::StillProvisioning).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_not_registered_maps_to_404() {
        let response =
            AppError::Registry(RegistryError::NotRegistered("abc".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_name_maps_to_400() {
        let response =
            AppError::Domain(DomainError::InvalidName("not a domain".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
