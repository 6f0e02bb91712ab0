//! Knowledge-base repository trait definition.

use agentry_types::agent::KnowledgeBaseRecord;
use agentry_types::domain::DomainKey;
use agentry_types::error::RepositoryError;

/// Repository trait for knowledge-base records.
///
/// Rows act as the attachment queue for a domain's agent: they may be
/// created while the agent is still provisioning and are drained by the
/// deployment poller once the agent reaches Running.
pub trait KnowledgeBaseRepository: Send + Sync {
    /// Insert a record. Idempotent on (domain_key, kb_id).
    fn insert(
        &self,
        record: &KnowledgeBaseRecord,
    ) -> impl std::future::Future<Output = Result<KnowledgeBaseRecord, RepositoryError>> + Send;

    /// List records for a domain key, oldest first.
    fn list_by_key(
        &self,
        key: &DomainKey,
    ) -> impl std::future::Future<Output = Result<Vec<KnowledgeBaseRecord>, RepositoryError>> + Send;
}
