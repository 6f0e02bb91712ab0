//! Chat endpoint.
//!
//! POST /api/v1/chat answers a question against the calling domain's agent.
//! The domain is identified by the `X-Domain-ID` header carrying the id
//! returned at registration, so the agent lookup never depends on
//! client-supplied URLs.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agentry_types::domain::DomainId;

use crate::http::error::AppError;
use crate::state::AppState;

/// Request body for the chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub session_id: Uuid,
    #[serde(default = "default_user")]
    pub user_id: String,
}

fn default_user() -> String {
    "anonymous".to_string()
}

/// Response body for the chat endpoint.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub session_id: Uuid,
}

/// POST /api/v1/chat -- answer a question via the domain's agent.
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if body.question.trim().is_empty() {
        return Err(AppError::Validation("question cannot be empty".to_string()));
    }

    let domain_id = headers
        .get("X-Domain-ID")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("X-Domain-ID header is required".to_string()))?;
    let domain_id: DomainId = domain_id
        .parse()
        .map_err(|_| AppError::Validation("X-Domain-ID must be a valid domain id".to_string()))?;

    let domain = state.domain_service.get_by_id(&domain_id).await?;
    let key = domain.key();

    // Surface a bad session id as 404 before touching the remote agent.
    state
        .conversation_service
        .get_session(&body.session_id)
        .await?;

    let answer = state
        .registry
        .chat(
            &key,
            &body.session_id,
            &body.user_id,
            &body.question,
            &state.conversation_service,
        )
        .await?;

    Ok(Json(ChatResponse {
        answer: answer.content,
        session_id: body.session_id,
    }))
}
