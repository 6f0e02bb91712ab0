//! Domain registration and status handlers.
//!
//! POST /api/v1/domains registers a domain and kicks off agent provisioning,
//! returning immediately with the domain id while the deployment poller
//! works in the background.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::http::error::AppError;
use crate::state::AppState;

/// Request body for domain registration.
#[derive(Debug, Deserialize)]
pub struct RegisterDomainRequest {
    pub domain_name: String,
}

/// Request body for queueing a knowledge base.
#[derive(Debug, Deserialize)]
pub struct RegisterKnowledgeBaseRequest {
    pub kb_id: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// POST /api/v1/domains -- register a domain and start provisioning.
///
/// Idempotent: an already-registered domain (or any URL variant of it)
/// returns its existing id. Provisioning failures don't fail registration;
/// the domain is registered and the agent can be resolved again later.
pub async fn register_domain(
    State(state): State<AppState>,
    Json(body): Json<RegisterDomainRequest>,
) -> Result<Json<Value>, AppError> {
    let registration = state.domain_service.register(&body.domain_name).await?;
    let key = registration.domain.key();

    let agent_status = match state.registry.resolve(&key).await {
        Ok(record) => Some(record.status.to_string()),
        Err(err) => {
            warn!(domain = %registration.domain.domain_name, error = %err, "Agent provisioning could not start");
            None
        }
    };

    Ok(Json(json!({
        "domain_id": registration.domain.id.to_string(),
        "domain_name": registration.domain.domain_name,
        "domain_key": key.to_string(),
        "already_registered": !registration.newly_registered,
        "agent_status": agent_status,
        "message": if registration.newly_registered {
            "Domain registered successfully"
        } else {
            "Domain already registered"
        },
    })))
}

/// GET /api/v1/domains -- list registered domains with agent status.
pub async fn list_domains(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let domains = state.domain_service.list().await?;

    let mut entries = Vec::with_capacity(domains.len());
    for domain in domains {
        let key = domain.key();
        let record = state.registry.peek(&key).await?;
        entries.push(json!({
            "domain_id": domain.id.to_string(),
            "domain_name": domain.domain_name,
            "domain_key": key.to_string(),
            "agent_status": record.as_ref().map(|r| r.status.to_string()),
            "created_at": domain.created_at.to_rfc3339(),
        }));
    }

    Ok(Json(json!({ "domains": entries })))
}

/// GET /api/v1/domains/{name}/status -- agent status view for one domain.
pub async fn domain_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let domain = state.domain_service.get_by_name(&name).await?;
    let key = domain.key();
    let record = state.registry.peek(&key).await?;

    let agent = record.map(|r| {
        json!({
            "agent_id": r.agent_id,
            "status": r.status.to_string(),
            "has_endpoint": r.endpoint_url.is_some(),
            "has_credential": r.credential.is_some(),
            "kb_count": r.kb_ids.len(),
            "polling": state.registry.poller().is_polling(&key),
            "updated_at": r.updated_at.to_rfc3339(),
        })
    });

    Ok(Json(json!({
        "domain_id": domain.id.to_string(),
        "domain_name": domain.domain_name,
        "domain_key": key.to_string(),
        "agent": agent,
    })))
}

/// POST /api/v1/domains/{name}/knowledge-bases -- queue a knowledge base.
///
/// Attachment happens immediately when the agent is running, otherwise once
/// the deployment poller sees it reach running.
pub async fn register_knowledge_base(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<RegisterKnowledgeBaseRequest>,
) -> Result<Json<Value>, AppError> {
    if body.kb_id.trim().is_empty() {
        return Err(AppError::Validation("kb_id cannot be empty".to_string()));
    }

    let domain = state.domain_service.get_by_name(&name).await?;
    let key = domain.key();
    let label = body.label.unwrap_or_else(|| format!("KB for {}", domain.domain_name));

    let record = state
        .registry
        .register_knowledge_base(&key, &body.kb_id, &label)
        .await?;

    Ok(Json(json!({
        "domain_key": key.to_string(),
        "kb_id": record.kb_id,
        "label": record.label,
    })))
}
