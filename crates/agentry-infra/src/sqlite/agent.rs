//! SQLite agent repository implementation.
//!
//! Implements `AgentRepository` from `agentry-core` using sqlx with split
//! read/write pools. `insert_if_absent` leans on the `domain_key` primary
//! key: INSERT OR IGNORE followed by a re-read gives losers of a creation
//! race the winner's record. Status changes are validated against the
//! deployment state machine on the single-connection writer pool, which
//! serializes the read-check-write.

use agentry_core::repository::agent::AgentRepository;
use agentry_types::agent::{AccessCredential, AgentRecord, DeploymentStatus};
use agentry_types::domain::DomainKey;
use agentry_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `AgentRepository`.
pub struct SqliteAgentRepository {
    pool: DatabasePool,
}

impl SqliteAgentRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn fetch_by_key(
        &self,
        pool: &SqlitePool,
        key: &DomainKey,
    ) -> Result<Option<AgentRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM agents WHERE domain_key = ?")
            .bind(key.as_str())
            .fetch_optional(pool)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let agent_row =
                    AgentRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(agent_row.into_record()?))
            }
            None => Ok(None),
        }
    }
}

/// Internal row type for mapping SQLite rows to the domain AgentRecord.
struct AgentRow {
    domain_key: String,
    agent_id: String,
    endpoint_url: Option<String>,
    access_key: Option<String>,
    access_key_verified_at: Option<String>,
    kb_ids: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl AgentRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            domain_key: row.try_get("domain_key")?,
            agent_id: row.try_get("agent_id")?,
            endpoint_url: row.try_get("endpoint_url")?,
            access_key: row.try_get("access_key")?,
            access_key_verified_at: row.try_get("access_key_verified_at")?,
            kb_ids: row.try_get("kb_ids")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<AgentRecord, RepositoryError> {
        let status: DeploymentStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        let kb_ids: Vec<String> = serde_json::from_str(&self.kb_ids)
            .map_err(|e| RepositoryError::Query(format!("invalid kb_ids JSON: {e}")))?;

        let credential = match self.access_key {
            Some(secret) => Some(AccessCredential {
                secret,
                verified_at: self
                    .access_key_verified_at
                    .as_deref()
                    .map(parse_datetime)
                    .transpose()?,
            }),
            None => None,
        };

        Ok(AgentRecord {
            domain_key: DomainKey::from_raw(self.domain_key),
            agent_id: self.agent_id,
            endpoint_url: self.endpoint_url,
            credential,
            kb_ids,
            status,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl AgentRepository for SqliteAgentRepository {
    async fn insert_if_absent(&self, record: &AgentRecord) -> Result<AgentRecord, RepositoryError> {
        let kb_ids_json = serde_json::to_string(&record.kb_ids)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            "INSERT OR IGNORE INTO agents (domain_key, agent_id, endpoint_url, access_key, access_key_verified_at, kb_ids, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.domain_key.as_str())
        .bind(&record.agent_id)
        .bind(&record.endpoint_url)
        .bind(record.credential.as_ref().map(|c| c.secret.clone()))
        .bind(
            record
                .credential
                .as_ref()
                .and_then(|c| c.verified_at.as_ref())
                .map(format_datetime),
        )
        .bind(&kb_ids_json)
        .bind(record.status.to_string())
        .bind(format_datetime(&record.created_at))
        .bind(format_datetime(&record.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Re-read through the writer so a lost race still returns the
        // winner's row.
        self.fetch_by_key(&self.pool.writer, &record.domain_key)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_key(&self, key: &DomainKey) -> Result<Option<AgentRecord>, RepositoryError> {
        self.fetch_by_key(&self.pool.reader, key).await
    }

    async fn update(&self, record: &AgentRecord) -> Result<AgentRecord, RepositoryError> {
        let existing = self
            .fetch_by_key(&self.pool.writer, &record.domain_key)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if !existing.status.can_transition_to(record.status) {
            return Err(RepositoryError::InvalidTransition(format!(
                "{} -> {}",
                existing.status, record.status
            )));
        }

        let kb_ids_json = serde_json::to_string(&record.kb_ids)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE agents SET agent_id = ?, endpoint_url = ?, access_key = ?, access_key_verified_at = ?, kb_ids = ?, status = ?, updated_at = ?
             WHERE domain_key = ?",
        )
        .bind(&record.agent_id)
        .bind(&record.endpoint_url)
        .bind(record.credential.as_ref().map(|c| c.secret.clone()))
        .bind(
            record
                .credential
                .as_ref()
                .and_then(|c| c.verified_at.as_ref())
                .map(format_datetime),
        )
        .bind(&kb_ids_json)
        .bind(record.status.to_string())
        .bind(format_datetime(&record.updated_at))
        .bind(record.domain_key.as_str())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(record.clone())
    }

    async fn update_status(
        &self,
        key: &DomainKey,
        status: DeploymentStatus,
    ) -> Result<(), RepositoryError> {
        let existing = self
            .fetch_by_key(&self.pool.writer, key)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if !existing.status.can_transition_to(status) {
            return Err(RepositoryError::InvalidTransition(format!(
                "{} -> {}",
                existing.status, status
            )));
        }

        sqlx::query("UPDATE agents SET status = ?, updated_at = ? WHERE domain_key = ?")
            .bind(status.to_string())
            .bind(format_datetime(&Utc::now()))
            .bind(key.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<AgentRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM agents ORDER BY created_at")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let agent_row =
                AgentRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            records.push(agent_row.into_record()?);
        }

        Ok(records)
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
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn make_record(domain: &str) -> AgentRecord {
        AgentRecord::provisioning(DomainKey::derive(domain), format!("agent-{domain}"))
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = SqliteAgentRepository::new(test_pool().await);
        let record = make_record("example.com");

        let stored = repo.insert_if_absent(&record).await.unwrap();
        assert_eq!(stored.agent_id, record.agent_id);

        let found = repo.get_by_key(&record.domain_key).await.unwrap().unwrap();
        assert_eq!(found.agent_id, record.agent_id);
        assert_eq!(found.status, DeploymentStatus::Provisioning);
        assert!(found.credential.is_none());
        assert!(found.kb_ids.is_empty());
    }

    #[tokio::test]
    async fn test_insert_if_absent_returns_existing() {
        let repo = SqliteAgentRepository::new(test_pool().await);
        let first = make_record("example.com");
        repo.insert_if_absent(&first).await.unwrap();

        let mut loser = make_record("example.com");
        loser.agent_id = "agent-loser".to_string();
        let stored = repo.insert_if_absent(&loser).await.unwrap();

        // The winner's row survives; the loser converges on it.
        assert_eq!(stored.agent_id, first.agent_id);
    }

    #[tokio::test]
    async fn test_update_persists_credential_and_endpoint() {
        let repo = SqliteAgentRepository::new(test_pool().await);
        let mut record = make_record("example.com");
        repo.insert_if_absent(&record).await.unwrap();

        record.endpoint_url = Some("https://agent.example.test".to_string());
        record.credential = Some(AccessCredential::minted_now("sk-secret"));
        record.status = DeploymentStatus::Running;
        record.kb_ids = vec!["kb-1".to_string()];
        record.updated_at = Utc::now();
        repo.update(&record).await.unwrap();

        let found = repo.get_by_key(&record.domain_key).await.unwrap().unwrap();
        assert_eq!(found.status, DeploymentStatus::Running);
        assert_eq!(found.endpoint_url.as_deref(), Some("https://agent.example.test"));
        assert_eq!(found.credential.as_ref().unwrap().secret, "sk-secret");
        assert!(found.credential.unwrap().verified_at.is_some());
        assert_eq!(found.kb_ids, vec!["kb-1"]);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_transition() {
        let repo = SqliteAgentRepository::new(test_pool().await);
        let mut record = make_record("example.com");
        repo.insert_if_absent(&record).await.unwrap();

        // Provisioning -> Degraded is not a legal transition.
        record.status = DeploymentStatus::Degraded;
        let err = repo.update(&record).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_update_status_enforces_terminal_failed() {
        let repo = SqliteAgentRepository::new(test_pool().await);
        let record = make_record("example.com");
        repo.insert_if_absent(&record).await.unwrap();

        repo.update_status(&record.domain_key, DeploymentStatus::Failed)
            .await
            .unwrap();

        let err = repo
            .update_status(&record.domain_key, DeploymentStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let repo = SqliteAgentRepository::new(test_pool().await);
        let record = make_record("example.com");
        let err = repo.update(&record).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_list_all() {
        let repo = SqliteAgentRepository::new(test_pool().await);
        repo.insert_if_absent(&make_record("a.com")).await.unwrap();
        repo.insert_if_absent(&make_record("b.com")).await.unwrap();

        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
