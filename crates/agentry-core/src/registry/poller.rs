//! Background deployment poller.
//!
//! One cancellable task per domain key, tracked in a map so duplicate
//! pollers cannot be started. Polls the remote deployment status with
//! exponential backoff inside a wall-clock budget; on RUNNING it mints a
//! missing credential, attaches every queued knowledge base, and persists
//! the running record; on remote failure or budget exhaustion it persists
//! FAILED. Transient remote errors are retried here -- never in the
//! synchronous request path.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use agentry_types::agent::{AccessCredential, AgentRecord, DeploymentStatus};
use agentry_types::config::RegistryConfig;
use agentry_types::domain::DomainKey;
use agentry_types::remote::RemoteDeploymentState;

use crate::registry::backoff::BackoffSchedule;
use crate::registry::cache::AgentCache;
use crate::remote::provider::AgentProvider;
use crate::repository::agent::AgentRepository;
use crate::repository::knowledge_base::KnowledgeBaseRepository;

/// Spawns and tracks per-domain-key deployment polling tasks.
pub struct DeploymentPoller<A, K, P>
where
    A: AgentRepository + 'static,
    K: KnowledgeBaseRepository + 'static,
    P: AgentProvider + 'static,
{
    agents: Arc<A>,
    knowledge_bases: Arc<K>,
    provider: Arc<P>,
    cache: Arc<AgentCache>,
    config: RegistryConfig,
    tokens: Arc<DashMap<DomainKey, CancellationToken>>,
}

impl<A, K, P> DeploymentPoller<A, K, P>
where
    A: AgentRepository + 'static,
    K: KnowledgeBaseRepository + 'static,
    P: AgentProvider + 'static,
{
    pub fn new(
        agents: Arc<A>,
        knowledge_bases: Arc<K>,
        provider: Arc<P>,
        cache: Arc<AgentCache>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            agents,
            knowledge_bases,
            provider,
            cache,
            config,
            tokens: Arc::new(DashMap::new()),
        }
    }

    /// Start polling for a record's deployment.
    ///
    /// Returns false (and does nothing) when a poller for the key is already
    /// active. The task unregisters itself on any terminal outcome, so no
    /// poller runs indefinitely.
    pub fn spawn(&self, record: AgentRecord) -> bool {
        let key = record.domain_key.clone();
        let token = CancellationToken::new();
        match self.tokens.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!(domain_key = %key, "Deployment poller already active; not starting another");
                return false;
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(token.clone());
            }
        }

        let agents = Arc::clone(&self.agents);
        let knowledge_bases = Arc::clone(&self.knowledge_bases);
        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let tokens = Arc::clone(&self.tokens);
        let config = self.config.clone();

        tokio::spawn(async move {
            poll_until_terminal(
                &*agents,
                &*knowledge_bases,
                &*provider,
                &cache,
                &config,
                record,
                &token,
            )
            .await;
            tokens.remove(&key);
        });
        true
    }

    /// Whether a poller is currently active for the key.
    pub fn is_polling(&self, key: &DomainKey) -> bool {
        self.tokens.contains_key(key)
    }

    /// Cancel the poller for a key, if any. Returns whether one was active.
    pub fn cancel(&self, key: &DomainKey) -> bool {
        match self.tokens.remove(key) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every active poller (process shutdown).
    pub fn cancel_all(&self) {
        for entry in self.tokens.iter() {
            entry.value().cancel();
        }
    }
}

async fn poll_until_terminal<A, K, P>(
    agents: &A,
    knowledge_bases: &K,
    provider: &P,
    cache: &AgentCache,
    config: &RegistryConfig,
    record: AgentRecord,
    token: &CancellationToken,
) where
    A: AgentRepository,
    K: KnowledgeBaseRepository,
    P: AgentProvider,
{
    let key = record.domain_key.clone();
    let mut schedule = BackoffSchedule::from_secs(
        config.poll_initial_interval_secs,
        config.poll_max_interval_secs,
        config.poll_budget_secs,
    );
    info!(domain_key = %key, agent_id = %record.agent_id, "Deployment polling started");

    loop {
        let Some(delay) = schedule.next_delay() else {
            error!(
                domain_key = %key,
                agent_id = %record.agent_id,
                budget_secs = config.poll_budget_secs,
                "Deployment polling exhausted its budget; marking agent failed"
            );
            mark_failed(agents, cache, &key).await;
            return;
        };

        tokio::select! {
            _ = token.cancelled() => {
                debug!(domain_key = %key, "Deployment polling cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        match provider.deployment_status(&record.agent_id).await {
            Ok(deployment) => match deployment.state {
                RemoteDeploymentState::Running => {
                    finish_running(
                        agents,
                        knowledge_bases,
                        provider,
                        cache,
                        &key,
                        deployment.endpoint_url,
                    )
                    .await;
                    return;
                }
                RemoteDeploymentState::Failed => {
                    error!(
                        domain_key = %key,
                        agent_id = %record.agent_id,
                        "Remote deployment reported failure"
                    );
                    mark_failed(agents, cache, &key).await;
                    return;
                }
                RemoteDeploymentState::Provisioning => {
                    debug!(domain_key = %key, "Deployment still provisioning");
                }
            },
            Err(err) => {
                // Transient; the budget bounds how long we keep trying.
                warn!(domain_key = %key, error = %err, "Deployment status check failed; will retry");
            }
        }
    }
}

/// The deployment is up: mint a credential if the record lacks one, attach
/// every queued knowledge base, and persist the running record.
///
/// Attachment waits until here on purpose: attaching before the deployment
/// is running gets not-found errors from the remote API.
async fn finish_running<A, K, P>(
    agents: &A,
    knowledge_bases: &K,
    provider: &P,
    cache: &AgentCache,
    key: &DomainKey,
    endpoint_url: Option<String>,
) where
    A: AgentRepository,
    K: KnowledgeBaseRepository,
    P: AgentProvider,
{
    let mut record = match agents.get_by_key(key).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!(domain_key = %key, "Agent record disappeared during polling");
            return;
        }
        Err(err) => {
            error!(domain_key = %key, error = %err, "Failed to load agent record after deployment");
            return;
        }
    };

    if let Some(url) = endpoint_url {
        record.endpoint_url = Some(url);
    }

    if record.credential.is_none() {
        let key_name = format!("key-{}-{}", key, Uuid::now_v7().simple());
        match provider.mint_access_key(&record.agent_id, &key_name).await {
            Ok(secret) => record.credential = Some(AccessCredential::minted_now(secret)),
            Err(err) => {
                warn!(
                    domain_key = %key,
                    error = %err,
                    "Access key mint failed after deployment; chat will mint on demand"
                );
            }
        }
    }

    let queued = match knowledge_bases.list_by_key(key).await {
        Ok(queued) => queued,
        Err(err) => {
            warn!(domain_key = %key, error = %err, "Failed to load queued knowledge bases");
            Vec::new()
        }
    };
    for kb in queued {
        if record.kb_ids.iter().any(|id| id == &kb.kb_id) {
            continue;
        }
        match provider.attach_knowledge_base(&record.agent_id, &kb.kb_id).await {
            Ok(()) => record.kb_ids.push(kb.kb_id),
            Err(err) => {
                warn!(
                    domain_key = %key,
                    kb_id = %kb.kb_id,
                    error = %err,
                    "Knowledge base attachment failed"
                );
            }
        }
    }

    record.status = DeploymentStatus::Running;
    record.updated_at = Utc::now();
    match agents.update(&record).await {
        Ok(stored) => {
            info!(
                domain_key = %key,
                agent_id = %stored.agent_id,
                kb_count = stored.kb_ids.len(),
                "Agent deployment running"
            );
            cache.publish(stored);
        }
        Err(err) => {
            error!(domain_key = %key, error = %err, "Failed to persist running status");
        }
    }
}

async fn mark_failed<A: AgentRepository>(agents: &A, cache: &AgentCache, key: &DomainKey) {
    if let Err(err) = agents.update_status(key, DeploymentStatus::Failed).await {
        error!(domain_key = %key, error = %err, "Failed to persist failed status");
        return;
    }
    if let Ok(Some(record)) = agents.get_by_key(key).await {
        cache.publish(record);
    }
}
