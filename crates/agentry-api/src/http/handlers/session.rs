//! Session lifecycle and conversation history handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::http::error::AppError;
use crate::state::AppState;

/// Request body for session creation.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default = "default_user")]
    pub user_id: String,
    pub domain_name: String,
}

fn default_user() -> String {
    "anonymous".to_string()
}

/// Query parameters for session listing.
#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub user_id: String,
    pub limit: Option<i64>,
}

/// POST /api/v1/sessions -- open a session against a registered domain.
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<Value>, AppError> {
    let domain = state.domain_service.get_by_name(&body.domain_name).await?;
    let session = state
        .conversation_service
        .create_session(&body.user_id, domain.key())
        .await?;

    Ok(Json(json!({
        "session_id": session.id,
        "user_id": session.user_id,
        "domain_key": session.domain_key.to_string(),
        "created_at": session.created_at.to_rfc3339(),
    })))
}

/// GET /api/v1/sessions?user_id= -- list a user's sessions.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Value>, AppError> {
    let sessions = state
        .conversation_service
        .list_sessions(&query.user_id, query.limit)
        .await?;

    let entries: Vec<Value> = sessions
        .iter()
        .map(|s| {
            json!({
                "session_id": s.id,
                "user_id": s.user_id,
                "domain_key": s.domain_key.to_string(),
                "status": s.status.to_string(),
                "created_at": s.created_at.to_rfc3339(),
                "last_activity_at": s.last_activity_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(Json(json!({ "sessions": entries })))
}

/// GET /api/v1/sessions/{id} -- session details.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let session = state.conversation_service.get_session(&id).await?;
    Ok(Json(json!({
        "session_id": session.id,
        "user_id": session.user_id,
        "domain_key": session.domain_key.to_string(),
        "status": session.status.to_string(),
        "created_at": session.created_at.to_rfc3339(),
        "last_activity_at": session.last_activity_at.to_rfc3339(),
    })))
}

/// GET /api/v1/sessions/{id}/turns -- conversation history in order.
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let turns = state.conversation_service.history(&id).await?;

    let messages: Vec<Value> = turns
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "role": t.role.to_string(),
                "content": t.content,
                "created_at": t.created_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(Json(json!({
        "session_id": id,
        "total_messages": messages.len(),
        "messages": messages,
    })))
}

/// POST /api/v1/sessions/{id}/close -- close a session.
pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.conversation_service.close_session(&id).await?;
    Ok(Json(json!({ "session_id": id, "status": "closed" })))
}
