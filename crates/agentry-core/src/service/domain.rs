//! Domain registration service.
//!
//! Normalizes and validates human-supplied domain names and creates the
//! Domain record. Registration is idempotent: re-registering a name (or any
//! URL variant of it) returns the existing record.

use tracing::info;

use agentry_types::domain::{normalize_domain, Domain, DomainId, DomainKey};
use agentry_types::error::{DomainError, RepositoryError};

use crate::repository::domain::DomainRepository;

/// Outcome of a registration request.
#[derive(Debug, Clone)]
pub struct Registration {
    pub domain: Domain,
    /// False when the domain was already registered.
    pub newly_registered: bool,
}

/// Service for registering and looking up tenant domains.
pub struct DomainService<R: DomainRepository> {
    repo: R,
}

impl<R: DomainRepository> DomainService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Register a domain from raw user input.
    ///
    /// Normalization is deterministic, so `www.example.com` and
    /// `https://example.com/` register (and later resolve) as the same
    /// tenant.
    pub async fn register(&self, raw_name: &str) -> Result<Registration, DomainError> {
        let name = normalize_domain(raw_name)
            .ok_or_else(|| DomainError::InvalidName(raw_name.to_string()))?;

        let domain = Domain::new(&name);
        let stored = self
            .repo
            .insert_if_absent(&domain)
            .await
            .map_err(storage)?;

        let newly_registered = stored.id == domain.id;
        if newly_registered {
            info!(domain = %name, key = %stored.key(), "Domain registered");
        }

        Ok(Registration {
            domain: stored,
            newly_registered,
        })
    }

    /// Look up a domain by its derived key.
    pub async fn get_by_key(&self, key: &DomainKey) -> Result<Domain, DomainError> {
        self.repo
            .get_by_key(key)
            .await
            .map_err(storage)?
            .ok_or(DomainError::NotFound)
    }

    /// Look up a domain by id.
    pub async fn get_by_id(&self, id: &DomainId) -> Result<Domain, DomainError> {
        self.repo
            .get_by_id(id)
            .await
            .map_err(storage)?
            .ok_or(DomainError::NotFound)
    }

    /// Resolve raw user input to the registered domain it names.
    pub async fn get_by_name(&self, raw_name: &str) -> Result<Domain, DomainError> {
        let name = normalize_domain(raw_name)
            .ok_or_else(|| DomainError::InvalidName(raw_name.to_string()))?;
        self.get_by_key(&DomainKey::derive(&name)).await
    }

    /// List all registered domains, newest first.
    pub async fn list(&self) -> Result<Vec<Domain>, DomainError> {
        self.repo.list_all().await.map_err(storage)
    }
}

fn storage(err: RepositoryError) -> DomainError {
    DomainError::StorageError(err.to_string())
}
