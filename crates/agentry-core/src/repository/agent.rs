//! Agent repository trait definition.

use agentry_types::agent::{AgentRecord, DeploymentStatus};
use agentry_types::domain::DomainKey;
use agentry_types::error::RepositoryError;

/// Repository trait for agent record persistence.
///
/// The store enforces at most one record per domain key; `insert_if_absent`
/// is the atomic "insert or return existing" primitive the registry's race
/// handling relies on.
pub trait AgentRepository: Send + Sync {
    /// Insert the record unless one already exists for its domain key.
    /// Returns the stored record either way: the inserted one, or the
    /// pre-existing winner of a concurrent insert.
    fn insert_if_absent(
        &self,
        record: &AgentRecord,
    ) -> impl std::future::Future<Output = Result<AgentRecord, RepositoryError>> + Send;

    /// Get the record for a domain key.
    fn get_by_key(
        &self,
        key: &DomainKey,
    ) -> impl std::future::Future<Output = Result<Option<AgentRecord>, RepositoryError>> + Send;

    /// Overwrite an existing record (endpoint, credential, kb list, status,
    /// updated_at). Fails with `NotFound` if no record exists, and with
    /// `InvalidTransition` if the stored status does not admit the new one.
    fn update(
        &self,
        record: &AgentRecord,
    ) -> impl std::future::Future<Output = Result<AgentRecord, RepositoryError>> + Send;

    /// Update only the deployment status, enforcing the state machine.
    fn update_status(
        &self,
        key: &DomainKey,
        status: DeploymentStatus,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List all records (used to hydrate the cache at startup).
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<AgentRecord>, RepositoryError>> + Send;
}
