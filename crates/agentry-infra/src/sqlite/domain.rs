//! SQLite domain repository implementation.

use agentry_core::repository::domain::DomainRepository;
use agentry_types::domain::{Domain, DomainId, DomainKey};
use agentry_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `DomainRepository`.
pub struct SqliteDomainRepository {
    pool: DatabasePool,
}

impl SqliteDomainRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn row_to_domain(row: &sqlx::sqlite::SqliteRow) -> Result<Domain, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let domain_name: String = row
        .try_get("domain_name")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(Domain {
        id: id
            .parse::<DomainId>()
            .map_err(|e| RepositoryError::Query(format!("invalid domain id: {e}")))?,
        domain_name,
        created_at: parse_datetime(&created_at)?,
    })
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

impl DomainRepository for SqliteDomainRepository {
    async fn insert_if_absent(&self, domain: &Domain) -> Result<Domain, RepositoryError> {
        sqlx::query(
            "INSERT OR IGNORE INTO registered_domains (id, domain_name, created_at) VALUES (?, ?, ?)",
        )
        .bind(domain.id.to_string())
        .bind(&domain.domain_name)
        .bind(domain.created_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query("SELECT * FROM registered_domains WHERE domain_name = ?")
            .bind(&domain.domain_name)
            .fetch_one(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row_to_domain(&row)
    }

    async fn get_by_id(&self, id: &DomainId) -> Result<Option<Domain>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM registered_domains WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(row_to_domain).transpose()
    }

    async fn get_by_key(&self, key: &DomainKey) -> Result<Option<Domain>, RepositoryError> {
        // The key is derived, not stored; scan names and match on derivation.
        // Registered-domain counts are small (one row per tenant).
        let rows = sqlx::query("SELECT * FROM registered_domains")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        for row in &rows {
            let domain = row_to_domain(row)?;
            if domain.key() == *key {
                return Ok(Some(domain));
            }
        }
        Ok(None)
    }

    async fn list_all(&self) -> Result<Vec<Domain>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM registered_domains ORDER BY created_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let repo = SqliteDomainRepository::new(test_pool().await);
        let domain = Domain::new("example.com");

        let stored = repo.insert_if_absent(&domain).await.unwrap();
        assert_eq!(stored.id, domain.id);

        let by_id = repo.get_by_id(&domain.id).await.unwrap().unwrap();
        assert_eq!(by_id.domain_name, "example.com");

        let by_key = repo.get_by_key(&domain.key()).await.unwrap().unwrap();
        assert_eq!(by_key.id, domain.id);
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_on_name() {
        let repo = SqliteDomainRepository::new(test_pool().await);
        let first = Domain::new("example.com");
        repo.insert_if_absent(&first).await.unwrap();

        let second = Domain::new("example.com");
        let stored = repo.insert_if_absent(&second).await.unwrap();
        assert_eq!(stored.id, first.id);

        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_is_none() {
        let repo = SqliteDomainRepository::new(test_pool().await);
        let missing = repo
            .get_by_key(&DomainKey::derive("nowhere.com"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
