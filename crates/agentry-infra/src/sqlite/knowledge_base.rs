//! SQLite knowledge-base repository implementation.

use agentry_core::repository::knowledge_base::KnowledgeBaseRepository;
use agentry_types::agent::KnowledgeBaseRecord;
use agentry_types::domain::DomainKey;
use agentry_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `KnowledgeBaseRepository`.
pub struct SqliteKnowledgeBaseRepository {
    pool: DatabasePool,
}

impl SqliteKnowledgeBaseRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<KnowledgeBaseRecord, RepositoryError> {
    let domain_key: String = row
        .try_get("domain_key")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let kb_id: String = row
        .try_get("kb_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let label: String = row
        .try_get("label")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(KnowledgeBaseRecord {
        domain_key: DomainKey::from_raw(domain_key),
        kb_id,
        label,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))?,
    })
}

impl KnowledgeBaseRepository for SqliteKnowledgeBaseRepository {
    async fn insert(
        &self,
        record: &KnowledgeBaseRecord,
    ) -> Result<KnowledgeBaseRecord, RepositoryError> {
        sqlx::query(
            "INSERT OR IGNORE INTO knowledge_bases (domain_key, kb_id, label, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(record.domain_key.as_str())
        .bind(&record.kb_id)
        .bind(&record.label)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query("SELECT * FROM knowledge_bases WHERE domain_key = ? AND kb_id = ?")
            .bind(record.domain_key.as_str())
            .bind(&record.kb_id)
            .fetch_one(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row_to_record(&row)
    }

    async fn list_by_key(
        &self,
        key: &DomainKey,
    ) -> Result<Vec<KnowledgeBaseRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge_bases WHERE domain_key = ? ORDER BY created_at",
        )
        .bind(key.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_record).collect()
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
    async fn test_insert_and_list() {
        let repo = SqliteKnowledgeBaseRepository::new(test_pool().await);
        let key = DomainKey::derive("example.com");

        repo.insert(&KnowledgeBaseRecord::new(key.clone(), "kb-1", "Docs"))
            .await
            .unwrap();
        repo.insert(&KnowledgeBaseRecord::new(key.clone(), "kb-2", "FAQ"))
            .await
            .unwrap();

        let records = repo.list_by_key(&key).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kb_id, "kb-1");
        assert_eq!(records[1].label, "FAQ");
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let repo = SqliteKnowledgeBaseRepository::new(test_pool().await);
        let key = DomainKey::derive("example.com");
        let record = KnowledgeBaseRecord::new(key.clone(), "kb-1", "Docs");

        repo.insert(&record).await.unwrap();
        repo.insert(&record).await.unwrap();

        assert_eq!(repo.list_by_key(&key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_key() {
        let repo = SqliteKnowledgeBaseRepository::new(test_pool().await);
        let key_a = DomainKey::derive("a.com");
        let key_b = DomainKey::derive("b.com");

        repo.insert(&KnowledgeBaseRecord::new(key_a.clone(), "kb-1", "Docs"))
            .await
            .unwrap();

        assert_eq!(repo.list_by_key(&key_a).await.unwrap().len(), 1);
        assert!(repo.list_by_key(&key_b).await.unwrap().is_empty());
    }
}
