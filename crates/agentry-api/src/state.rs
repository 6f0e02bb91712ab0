//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST
//! API. The registry and services are generic over repository/provider
//! traits, but AppState pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use agentry_core::registry::service::AgentRegistry;
use agentry_core::service::conversation::ConversationService;
use agentry_core::service::domain::DomainService;
use agentry_infra::config::{load_config, provider_token, resolve_data_dir};
use agentry_infra::remote::gradient::GradientAgentClient;
use agentry_infra::sqlite::agent::SqliteAgentRepository;
use agentry_infra::sqlite::conversation::SqliteConversationRepository;
use agentry_infra::sqlite::domain::SqliteDomainRepository;
use agentry_infra::sqlite::knowledge_base::SqliteKnowledgeBaseRepository;
use agentry_infra::sqlite::pool::DatabasePool;

/// Concrete type aliases for the generics pinned to infra implementations.
pub type ConcreteRegistry = AgentRegistry<
    SqliteAgentRepository,
    SqliteDomainRepository,
    SqliteKnowledgeBaseRepository,
    GradientAgentClient,
>;

pub type ConcreteDomainService = DomainService<SqliteDomainRepository>;

pub type ConcreteConversationService = ConversationService<SqliteConversationRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConcreteRegistry>,
    pub domain_service: Arc<ConcreteDomainService>,
    pub conversation_service: Arc<ConcreteConversationService>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services,
    /// hydrate the registry cache from the durable store.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        // Initialize database
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("agentry.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        let config = load_config(&data_dir).await;
        let token = provider_token()?;
        let provider = Arc::new(GradientAgentClient::new(token, &config.provider));

        // Wire the registry with its repositories
        let registry = AgentRegistry::new(
            Arc::new(SqliteAgentRepository::new(db_pool.clone())),
            Arc::new(SqliteDomainRepository::new(db_pool.clone())),
            Arc::new(SqliteKnowledgeBaseRepository::new(db_pool.clone())),
            provider,
            config.registry.clone(),
        );
        // The durable store is the source of truth across restarts; the
        // cache rebuilds from it and interrupted provisioning resumes.
        registry
            .hydrate()
            .await
            .map_err(|e| anyhow::anyhow!("cache hydration failed: {e}"))?;

        let domain_service = DomainService::new(SqliteDomainRepository::new(db_pool.clone()));
        let conversation_service =
            ConversationService::new(SqliteConversationRepository::new(db_pool.clone()));

        Ok(Self {
            registry: Arc::new(registry),
            domain_service: Arc::new(domain_service),
            conversation_service: Arc::new(conversation_service),
            data_dir,
        })
    }
}
