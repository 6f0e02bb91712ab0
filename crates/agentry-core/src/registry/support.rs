//! In-memory repositories and a scriptable provider for registry tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use agentry_types::agent::{AccessCredential, AgentRecord, DeploymentStatus, KnowledgeBaseRecord};
use agentry_types::config::RegistryConfig;
use agentry_types::domain::{normalize_domain, Domain, DomainId, DomainKey};
use agentry_types::error::{ProviderError, RepositoryError};
use agentry_types::remote::{
    ChatAnswer, CreatedAgent, RemoteChatMessage, RemoteDeployment, RemoteDeploymentState,
};
use agentry_types::session::{ConversationTurn, Session};

use crate::registry::service::AgentRegistry;
use crate::remote::provider::AgentProvider;
use crate::repository::agent::AgentRepository;
use crate::repository::conversation::ConversationRepository;
use crate::repository::domain::DomainRepository;
use crate::repository::knowledge_base::KnowledgeBaseRepository;
use crate::service::conversation::ConversationService;

#[derive(Default)]
pub struct MemoryAgentRepository {
    records: Mutex<HashMap<DomainKey, AgentRecord>>,
}

impl AgentRepository for MemoryAgentRepository {
    async fn insert_if_absent(&self, record: &AgentRecord) -> Result<AgentRecord, RepositoryError> {
        let mut records = self.records.lock().unwrap();
        Ok(records
            .entry(record.domain_key.clone())
            .or_insert_with(|| record.clone())
            .clone())
    }

    async fn get_by_key(&self, key: &DomainKey) -> Result<Option<AgentRecord>, RepositoryError> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn update(&self, record: &AgentRecord) -> Result<AgentRecord, RepositoryError> {
        let mut records = self.records.lock().unwrap();
        let existing = records
            .get(&record.domain_key)
            .ok_or(RepositoryError::NotFound)?;
        if !existing.status.can_transition_to(record.status) {
            return Err(RepositoryError::InvalidTransition(format!(
                "{} -> {}",
                existing.status, record.status
            )));
        }
        records.insert(record.domain_key.clone(), record.clone());
        Ok(record.clone())
    }

    async fn update_status(
        &self,
        key: &DomainKey,
        status: DeploymentStatus,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().unwrap();
        let existing = records.get_mut(key).ok_or(RepositoryError::NotFound)?;
        if !existing.status.can_transition_to(status) {
            return Err(RepositoryError::InvalidTransition(format!(
                "{} -> {}",
                existing.status, status
            )));
        }
        existing.status = status;
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<AgentRecord>, RepositoryError> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryDomainRepository {
    domains: Mutex<HashMap<String, Domain>>,
}

impl DomainRepository for MemoryDomainRepository {
    async fn insert_if_absent(&self, domain: &Domain) -> Result<Domain, RepositoryError> {
        let mut domains = self.domains.lock().unwrap();
        Ok(domains
            .entry(domain.domain_name.clone())
            .or_insert_with(|| domain.clone())
            .clone())
    }

    async fn get_by_id(&self, id: &DomainId) -> Result<Option<Domain>, RepositoryError> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .values()
            .find(|d| d.id == *id)
            .cloned())
    }

    async fn get_by_key(&self, key: &DomainKey) -> Result<Option<Domain>, RepositoryError> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .values()
            .find(|d| d.key() == *key)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Domain>, RepositoryError> {
        let mut all: Vec<Domain> = self.domains.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[derive(Default)]
pub struct MemoryKnowledgeBaseRepository {
    records: Mutex<Vec<KnowledgeBaseRecord>>,
}

impl KnowledgeBaseRepository for MemoryKnowledgeBaseRepository {
    async fn insert(
        &self,
        record: &KnowledgeBaseRecord,
    ) -> Result<KnowledgeBaseRecord, RepositoryError> {
        let mut records = self.records.lock().unwrap();
        if let Some(existing) = records
            .iter()
            .find(|r| r.domain_key == record.domain_key && r.kb_id == record.kb_id)
        {
            return Ok(existing.clone());
        }
        records.push(record.clone());
        Ok(record.clone())
    }

    async fn list_by_key(
        &self,
        key: &DomainKey,
    ) -> Result<Vec<KnowledgeBaseRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.domain_key == *key)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryConversationRepository {
    sessions: Mutex<HashMap<Uuid, Session>>,
    turns: Mutex<Vec<ConversationTurn>>,
}

impl ConversationRepository for MemoryConversationRepository {
    async fn create_session(&self, session: &Session) -> Result<Session, RepositoryError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn get_session(&self, id: &Uuid) -> Result<Option<Session>, RepositoryError> {
        Ok(self.sessions.lock().unwrap().get(id).cloned())
    }

    async fn update_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.lock().unwrap();
        if !sessions.contains_key(&session.id) {
            return Err(RepositoryError::NotFound);
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Session>, RepositoryError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        if let Some(limit) = limit {
            sessions.truncate(limit as usize);
        }
        Ok(sessions)
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<(), RepositoryError> {
        self.turns.lock().unwrap().push(turn.clone());
        Ok(())
    }

    async fn list_turns(
        &self,
        session_id: &Uuid,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let mut turns: Vec<ConversationTurn> = self
            .turns
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.session_id == *session_id)
            .cloned()
            .collect();
        turns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(turns)
    }
}

/// Provider double whose status and chat responses can be scripted per test.
/// Unscripted calls fall back to benign defaults (still provisioning, a
/// canned answer).
#[derive(Default)]
pub struct ScriptedProvider {
    pub create_calls: AtomicUsize,
    pub mint_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub attachments: Mutex<Vec<(String, String)>>,
    pub fail_mint: AtomicBool,
    pub create_delay_ms: u64,
    status_script: Mutex<VecDeque<Result<RemoteDeployment, ProviderError>>>,
    chat_script: Mutex<VecDeque<Result<ChatAnswer, ProviderError>>>,
}

impl ScriptedProvider {
    pub fn script_status(&self, responses: Vec<Result<RemoteDeployment, ProviderError>>) {
        self.status_script.lock().unwrap().extend(responses);
    }

    pub fn script_chat(&self, responses: Vec<Result<ChatAnswer, ProviderError>>) {
        self.chat_script.lock().unwrap().extend(responses);
    }
}

impl AgentProvider for ScriptedProvider {
    async fn create_agent(&self, domain_name: &str) -> Result<CreatedAgent, ProviderError> {
        if self.create_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.create_delay_ms)).await;
        }
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedAgent {
            agent_id: format!("agent-{n}-{domain_name}"),
            endpoint_url: None,
        })
    }

    async fn deployment_status(&self, _agent_id: &str) -> Result<RemoteDeployment, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(RemoteDeployment {
                state: RemoteDeploymentState::Provisioning,
                endpoint_url: None,
            }))
    }

    async fn mint_access_key(
        &self,
        _agent_id: &str,
        _key_name: &str,
    ) -> Result<String, ProviderError> {
        if self.fail_mint.load(Ordering::SeqCst) {
            return Err(ProviderError::Api {
                status: 500,
                message: "mint failed".to_string(),
            });
        }
        let n = self.mint_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("sk-{n}"))
    }

    async fn attach_knowledge_base(&self, agent_id: &str, kb_id: &str) -> Result<(), ProviderError> {
        self.attachments
            .lock()
            .unwrap()
            .push((agent_id.to_string(), kb_id.to_string()));
        Ok(())
    }

    async fn chat_completion(
        &self,
        _endpoint_url: &str,
        _credential: &str,
        _messages: &[RemoteChatMessage],
    ) -> Result<ChatAnswer, ProviderError> {
        self.chat_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ChatAnswer {
                content: "scripted answer".to_string(),
                model: None,
            }))
    }
}

/// A Running record with an endpoint, optionally carrying a fresh credential.
pub fn running_record(key: &DomainKey, agent_id: &str, with_credential: bool) -> AgentRecord {
    let mut record = AgentRecord::provisioning(key.clone(), agent_id);
    record.status = DeploymentStatus::Running;
    record.endpoint_url = Some("https://agent.example.test".to_string());
    if with_credential {
        record.credential = Some(AccessCredential::minted_now("sk-seed"));
    }
    record
}

/// A registry wired entirely to in-memory doubles, plus handles to them.
pub struct TestRegistry {
    pub registry: AgentRegistry<
        MemoryAgentRepository,
        MemoryDomainRepository,
        MemoryKnowledgeBaseRepository,
        ScriptedProvider,
    >,
    pub agent_repo: Arc<MemoryAgentRepository>,
    pub domain_repo: Arc<MemoryDomainRepository>,
    pub kb_repo: Arc<MemoryKnowledgeBaseRepository>,
    pub provider: Arc<ScriptedProvider>,
    pub conversations: ConversationService<MemoryConversationRepository>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::build(RegistryConfig::default(), 0)
    }

    pub fn with_create_delay(delay_ms: u64) -> Self {
        Self::build(RegistryConfig::default(), delay_ms)
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self::build(config, 0)
    }

    fn build(config: RegistryConfig, create_delay_ms: u64) -> Self {
        let agent_repo = Arc::new(MemoryAgentRepository::default());
        let domain_repo = Arc::new(MemoryDomainRepository::default());
        let kb_repo = Arc::new(MemoryKnowledgeBaseRepository::default());
        let provider = Arc::new(ScriptedProvider {
            create_delay_ms,
            ..Default::default()
        });
        let registry = AgentRegistry::new(
            Arc::clone(&agent_repo),
            Arc::clone(&domain_repo),
            Arc::clone(&kb_repo),
            Arc::clone(&provider),
            config,
        );
        Self {
            registry,
            agent_repo,
            domain_repo,
            kb_repo,
            provider,
            conversations: ConversationService::new(MemoryConversationRepository::default()),
        }
    }

    pub async fn register_domain(&self, raw: &str) -> DomainKey {
        let name = normalize_domain(raw).expect("test domain should normalize");
        let domain = Domain::new(&name);
        self.domain_repo.insert_if_absent(&domain).await.unwrap();
        DomainKey::derive(&name)
    }

    pub async fn insert_agent(&self, record: AgentRecord) {
        self.agent_repo.insert_if_absent(&record).await.unwrap();
    }

    pub async fn create_session(&self, key: &DomainKey) -> Session {
        self.conversations
            .create_session("anonymous", key.clone())
            .await
            .unwrap()
    }
}
