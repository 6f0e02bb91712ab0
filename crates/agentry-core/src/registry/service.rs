//! The agent registry: resolution, credential lifecycle, and chat.
//!
//! Resolution walks cache -> durable store -> remote creation. The cache
//! avoids a store round-trip per request, the store survives restarts, and
//! remote creation is the expensive fallback that must happen at most once
//! per domain key. Two mechanisms enforce the at-most-once property: a
//! per-key async mutex serializes the in-process create path, and the
//! store's atomic insert-if-absent resolves cross-process races (the loser
//! converges on the winner's record).

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use agentry_types::agent::{AccessCredential, AgentRecord, DeploymentStatus, KnowledgeBaseRecord};
use agentry_types::config::RegistryConfig;
use agentry_types::domain::DomainKey;
use agentry_types::error::{ProviderError, RegistryError, RepositoryError};
use agentry_types::remote::{ChatAnswer, RemoteChatMessage};

use crate::registry::cache::AgentCache;
use crate::registry::poller::DeploymentPoller;
use crate::remote::provider::AgentProvider;
use crate::repository::agent::AgentRepository;
use crate::repository::conversation::ConversationRepository;
use crate::repository::domain::DomainRepository;
use crate::repository::knowledge_base::KnowledgeBaseRepository;
use crate::service::conversation::ConversationService;

/// The registry owning AgentRecord and KnowledgeBaseRecord lifecycle.
///
/// Generic over the repository and provider ports so agentry-core never
/// depends on agentry-infra. Shared across request handlers behind an `Arc`.
pub struct AgentRegistry<A, D, K, P>
where
    A: AgentRepository + 'static,
    D: DomainRepository,
    K: KnowledgeBaseRepository + 'static,
    P: AgentProvider + 'static,
{
    agents: Arc<A>,
    domains: Arc<D>,
    knowledge_bases: Arc<K>,
    provider: Arc<P>,
    cache: Arc<AgentCache>,
    config: RegistryConfig,
    /// Serializes the remote create path per domain key.
    create_locks: DashMap<DomainKey, Arc<Mutex<()>>>,
    poller: DeploymentPoller<A, K, P>,
}

impl<A, D, K, P> AgentRegistry<A, D, K, P>
where
    A: AgentRepository + 'static,
    D: DomainRepository,
    K: KnowledgeBaseRepository + 'static,
    P: AgentProvider + 'static,
{
    pub fn new(
        agents: Arc<A>,
        domains: Arc<D>,
        knowledge_bases: Arc<K>,
        provider: Arc<P>,
        config: RegistryConfig,
    ) -> Self {
        let cache = Arc::new(AgentCache::new());
        let poller = DeploymentPoller::new(
            Arc::clone(&agents),
            Arc::clone(&knowledge_bases),
            Arc::clone(&provider),
            Arc::clone(&cache),
            config.clone(),
        );
        Self {
            agents,
            domains,
            knowledge_bases,
            provider,
            cache,
            config,
            create_locks: DashMap::new(),
            poller,
        }
    }

    pub fn cache(&self) -> &AgentCache {
        &self.cache
    }

    pub fn poller(&self) -> &DeploymentPoller<A, K, P> {
        &self.poller
    }

    /// Rebuild the cache from the durable store and resume polling for any
    /// record that was still provisioning when the process last stopped.
    /// Returns the number of hydrated records.
    pub async fn hydrate(&self) -> Result<usize, RegistryError> {
        let records = self.agents.list_all().await.map_err(storage)?;
        let count = records.len();
        let provisioning: Vec<AgentRecord> = records
            .iter()
            .filter(|r| r.status == DeploymentStatus::Provisioning)
            .cloned()
            .collect();
        self.cache.hydrate(records);
        for record in provisioning {
            self.poller.spawn(record);
        }
        info!(records = count, "Agent cache hydrated from store");
        Ok(count)
    }

    /// Look up a record without ever creating one: cache first, then store
    /// (populating the cache on a hit).
    pub async fn peek(&self, key: &DomainKey) -> Result<Option<AgentRecord>, RegistryError> {
        if let Some(record) = self.cache.get(key) {
            return Ok(Some(record));
        }
        match self.agents.get_by_key(key).await.map_err(storage)? {
            Some(record) => {
                self.cache.publish(record.clone());
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Re-read the store for a key and make the cache agree with it.
    ///
    /// The store is authoritative: whatever it holds replaces the cached
    /// entry, and a missing row evicts it.
    pub async fn reconcile(&self, key: &DomainKey) -> Result<Option<AgentRecord>, RegistryError> {
        match self.agents.get_by_key(key).await.map_err(storage)? {
            Some(record) => {
                self.cache.publish(record.clone());
                Ok(Some(record))
            }
            None => {
                self.cache.evict(key);
                Ok(None)
            }
        }
    }

    /// Resolve a domain key to its agent record, creating one remotely if
    /// none exists yet.
    ///
    /// A newly created record is returned in `Provisioning` without a
    /// guaranteed-valid credential; the background poller takes it the rest
    /// of the way. Fails with `NotRegistered` when the key has no Domain.
    pub async fn resolve(&self, key: &DomainKey) -> Result<AgentRecord, RegistryError> {
        if let Some(record) = self.peek(key).await? {
            return Ok(record);
        }

        let lock = self
            .create_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // A concurrent caller may have finished creation while we waited.
        if let Some(record) = self.peek(key).await? {
            return Ok(record);
        }

        let domain = self
            .domains
            .get_by_key(key)
            .await
            .map_err(storage)?
            .ok_or_else(|| RegistryError::NotRegistered(key.to_string()))?;

        let created = self
            .provider
            .create_agent(&domain.domain_name)
            .await
            .map_err(|err| {
                error!(domain = %domain.domain_name, error = %err, "Remote agent creation failed");
                RegistryError::RemoteUnavailable(err.to_string())
            })?;

        let mut record = AgentRecord::provisioning(key.clone(), created.agent_id);
        record.endpoint_url = created.endpoint_url;

        let stored = self.agents.insert_if_absent(&record).await.map_err(storage)?;
        if stored.agent_id != record.agent_id {
            // Another process won the insert race; its record is the one
            // that counts. The agent we just created is orphaned remotely.
            warn!(
                domain_key = %key,
                orphaned_agent = %record.agent_id,
                "Lost cross-process creation race; converging on stored record"
            );
        }
        self.cache.publish(stored.clone());
        info!(domain_key = %key, agent_id = %stored.agent_id, "Agent provisioning started");

        self.poller.spawn(stored.clone());
        Ok(stored)
    }

    /// Return a record whose credential is usable right now.
    ///
    /// A credential verified within the configured TTL is trusted as-is.
    /// Anything else triggers a rotation: a dedicated mint call, never a key
    /// scraped from a list/describe response.
    pub async fn ensure_usable_credential(
        &self,
        record: &AgentRecord,
    ) -> Result<AgentRecord, RegistryError> {
        if let Some(credential) = &record.credential {
            if credential.is_fresh(self.config.credential_ttl_secs) {
                return Ok(record.clone());
            }
        }
        self.rotate_credential(record).await
    }

    /// Discard the record's credential and mint a fresh one.
    ///
    /// On success a `Degraded` record recovers to `Running`. On mint failure
    /// the record is marked `Degraded` and the caller gets the retryable
    /// `CredentialInvalid`.
    pub async fn rotate_credential(
        &self,
        record: &AgentRecord,
    ) -> Result<AgentRecord, RegistryError> {
        let key_name = mint_key_name(&record.domain_key);
        match self
            .provider
            .mint_access_key(&record.agent_id, &key_name)
            .await
        {
            Ok(secret) => {
                let mut updated = record.clone();
                updated.credential = Some(AccessCredential::minted_now(secret));
                if updated.status == DeploymentStatus::Degraded {
                    updated.status = DeploymentStatus::Running;
                }
                updated.updated_at = Utc::now();
                let stored = self.agents.update(&updated).await.map_err(storage)?;
                self.cache.publish(stored.clone());
                info!(domain_key = %stored.domain_key, "Access credential rotated");
                Ok(stored)
            }
            Err(err) => {
                error!(
                    domain_key = %record.domain_key,
                    agent_id = %record.agent_id,
                    error = %err,
                    "Credential mint failed"
                );
                self.mark_degraded(record).await;
                Err(RegistryError::CredentialInvalid)
            }
        }
    }

    /// Queue a knowledge base for a domain.
    ///
    /// If the domain's agent is already running the attachment happens
    /// immediately; otherwise the deployment poller drains the queue once
    /// the agent reaches `Running`.
    pub async fn register_knowledge_base(
        &self,
        key: &DomainKey,
        kb_id: &str,
        label: &str,
    ) -> Result<KnowledgeBaseRecord, RegistryError> {
        let record = KnowledgeBaseRecord::new(key.clone(), kb_id, label);
        let stored = self.knowledge_bases.insert(&record).await.map_err(storage)?;

        if let Some(agent) = self.peek(key).await? {
            if agent.status == DeploymentStatus::Running {
                self.attach_knowledge_base(key, kb_id).await?;
            }
        }
        Ok(stored)
    }

    /// Attach a knowledge base to a domain's agent remotely.
    ///
    /// Only allowed once the deployment is confirmed `Running`; attaching
    /// earlier gets not-found errors from the remote API and is rejected
    /// here before any remote call.
    pub async fn attach_knowledge_base(
        &self,
        key: &DomainKey,
        kb_id: &str,
    ) -> Result<(), RegistryError> {
        let record = self
            .peek(key)
            .await?
            .ok_or_else(|| RegistryError::NotRegistered(key.to_string()))?;

        match record.status {
            DeploymentStatus::Running => {}
            DeploymentStatus::Failed => return Err(RegistryError::ProvisioningFailed),
            _ => return Err(RegistryError::StillProvisioning),
        }

        self.provider
            .attach_knowledge_base(&record.agent_id, kb_id)
            .await
            .map_err(|err| RegistryError::RemoteUnavailable(err.to_string()))?;

        if !record.kb_ids.iter().any(|id| id == kb_id) {
            let mut updated = record;
            updated.kb_ids.push(kb_id.to_string());
            updated.updated_at = Utc::now();
            let stored = self.agents.update(&updated).await.map_err(storage)?;
            self.cache.publish(stored);
        }
        info!(domain_key = %key, kb_id = %kb_id, "Knowledge base attached");
        Ok(())
    }

    /// Answer a chat message against a domain's agent and log the exchange.
    ///
    /// An unauthorized rejection despite a recently-verified credential
    /// (race with external revocation) triggers exactly one rotation and one
    /// retry; a second rejection surfaces `CredentialInvalid`.
    pub async fn chat<C: ConversationRepository>(
        &self,
        key: &DomainKey,
        session_id: &Uuid,
        user_id: &str,
        message: &str,
        conversations: &ConversationService<C>,
    ) -> Result<ChatAnswer, RegistryError> {
        let mut record = self.resolve(key).await?;

        match record.status {
            DeploymentStatus::Failed => return Err(RegistryError::ProvisioningFailed),
            DeploymentStatus::Unknown | DeploymentStatus::Provisioning => {
                // The poller may have finished since this entry was cached;
                // the store has the last word.
                record = self
                    .reconcile(key)
                    .await?
                    .ok_or(RegistryError::StillProvisioning)?;
                match record.status {
                    DeploymentStatus::Failed => return Err(RegistryError::ProvisioningFailed),
                    DeploymentStatus::Running | DeploymentStatus::Degraded => {}
                    _ => return Err(RegistryError::StillProvisioning),
                }
            }
            DeploymentStatus::Running | DeploymentStatus::Degraded => {}
        }

        if !record.is_servable() {
            return Err(RegistryError::StillProvisioning);
        }

        let record = self.ensure_usable_credential(&record).await?;
        let endpoint = record
            .endpoint_url
            .clone()
            .ok_or(RegistryError::StillProvisioning)?;
        let secret = record
            .credential
            .as_ref()
            .map(|c| c.secret.clone())
            .ok_or(RegistryError::CredentialInvalid)?;

        let messages = vec![RemoteChatMessage::user(message)];

        let answer = match self
            .provider
            .chat_completion(&endpoint, &secret, &messages)
            .await
        {
            Ok(answer) => {
                self.confirm_credential(&record).await;
                answer
            }
            Err(ProviderError::Unauthorized) => {
                warn!(
                    domain_key = %key,
                    "Chat rejected as unauthorized despite fresh credential; rotating once"
                );
                let degraded = self.mark_degraded(&record).await;
                let current = self.reconcile(key).await?.unwrap_or(degraded);
                let rotated = self.rotate_credential(&current).await?;

                let endpoint = rotated
                    .endpoint_url
                    .clone()
                    .ok_or(RegistryError::StillProvisioning)?;
                let secret = rotated
                    .credential
                    .as_ref()
                    .map(|c| c.secret.clone())
                    .ok_or(RegistryError::CredentialInvalid)?;

                match self
                    .provider
                    .chat_completion(&endpoint, &secret, &messages)
                    .await
                {
                    Ok(answer) => answer,
                    Err(ProviderError::Unauthorized) => {
                        error!(
                            domain_key = %key,
                            "Chat still unauthorized after credential rotation"
                        );
                        self.mark_degraded(&rotated).await;
                        return Err(RegistryError::CredentialInvalid);
                    }
                    Err(err) => return Err(RegistryError::RemoteUnavailable(err.to_string())),
                }
            }
            Err(err) => return Err(RegistryError::RemoteUnavailable(err.to_string())),
        };

        conversations
            .log_exchange(session_id, user_id, message, &answer.content)
            .await
            .map_err(|err| RegistryError::Storage(err.to_string()))?;

        Ok(answer)
    }

    /// Persist `Degraded` and mark the credential suspect. Best-effort: a
    /// storage fault here is logged, not surfaced, because the caller is
    /// already on an error path.
    async fn mark_degraded(&self, record: &AgentRecord) -> AgentRecord {
        let mut updated = record.clone();
        updated.status = DeploymentStatus::Degraded;
        if let Some(credential) = &mut updated.credential {
            credential.verified_at = None;
        }
        updated.updated_at = Utc::now();
        match self.agents.update(&updated).await {
            Ok(stored) => {
                self.cache.publish(stored.clone());
                stored
            }
            Err(err) => {
                warn!(domain_key = %record.domain_key, error = %err, "Failed to persist degraded status");
                updated
            }
        }
    }

    /// Refresh the credential's verified-at timestamp after a successful
    /// remote call. Best-effort.
    async fn confirm_credential(&self, record: &AgentRecord) {
        let mut updated = record.clone();
        let Some(credential) = &mut updated.credential else {
            return;
        };
        credential.verified_at = Some(Utc::now());
        updated.updated_at = Utc::now();
        match self.agents.update(&updated).await {
            Ok(stored) => self.cache.publish(stored),
            Err(err) => {
                warn!(domain_key = %record.domain_key, error = %err, "Failed to persist credential confirmation");
            }
        }
    }
}

/// Key names include a unique suffix so rotation never collides with a
/// previously minted name on the provider side.
fn mint_key_name(key: &DomainKey) -> String {
    format!("key-{}-{}", key, Uuid::now_v7().simple())
}

fn storage(err: RepositoryError) -> RegistryError {
    RegistryError::Storage(err.to_string())
}
