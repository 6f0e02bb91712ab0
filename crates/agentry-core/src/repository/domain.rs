//! Domain repository trait definition.

use agentry_types::domain::{Domain, DomainId, DomainKey};
use agentry_types::error::RepositoryError;

/// Repository trait for registered domains.
pub trait DomainRepository: Send + Sync {
    /// Insert a domain unless its name is already registered. Returns the
    /// stored domain either way.
    fn insert_if_absent(
        &self,
        domain: &Domain,
    ) -> impl std::future::Future<Output = Result<Domain, RepositoryError>> + Send;

    /// Get a domain by id.
    fn get_by_id(
        &self,
        id: &DomainId,
    ) -> impl std::future::Future<Output = Result<Option<Domain>, RepositoryError>> + Send;

    /// Get a domain by its derived key.
    fn get_by_key(
        &self,
        key: &DomainKey,
    ) -> impl std::future::Future<Output = Result<Option<Domain>, RepositoryError>> + Send;

    /// List all registered domains, newest first.
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Domain>, RepositoryError>> + Send;
}
