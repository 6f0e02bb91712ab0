//! SQLite conversation repository implementation.
//!
//! Sessions are mutable (activity timestamp, status); turns are append-only
//! and never updated or deleted.

use agentry_core::repository::conversation::ConversationRepository;
use agentry_types::domain::DomainKey;
use agentry_types::error::RepositoryError;
use agentry_types::session::{ConversationTurn, Session, SessionStatus, TurnRole};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid uuid: {e}")))
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let domain_key: String = row
        .try_get("domain_key")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let last_activity_at: String = row
        .try_get("last_activity_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(Session {
        id: parse_uuid(&id)?,
        user_id,
        domain_key: DomainKey::from_raw(domain_key),
        created_at: parse_datetime(&created_at)?,
        last_activity_at: parse_datetime(&last_activity_at)?,
        status: status
            .parse::<SessionStatus>()
            .map_err(RepositoryError::Query)?,
    })
}

fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let session_id: String = row
        .try_get("session_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let role: String = row
        .try_get("role")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let content: String = row
        .try_get("content")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(ConversationTurn {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        user_id,
        role: role.parse::<TurnRole>().map_err(RepositoryError::Query)?,
        content,
        created_at: parse_datetime(&created_at)?,
    })
}

impl ConversationRepository for SqliteConversationRepository {
    async fn create_session(&self, session: &Session) -> Result<Session, RepositoryError> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, domain_key, created_at, last_activity_at, status)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(session.id.to_string())
        .bind(&session.user_id)
        .bind(session.domain_key.as_str())
        .bind(session.created_at.to_rfc3339())
        .bind(session.last_activity_at.to_rfc3339())
        .bind(session.status.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(session.clone())
    }

    async fn get_session(&self, id: &Uuid) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(row_to_session).transpose()
    }

    async fn update_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE sessions SET last_activity_at = ?, status = ? WHERE id = ?",
        )
        .bind(session.last_activity_at.to_rfc3339())
        .bind(session.status.to_string())
        .bind(session.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Session>, RepositoryError> {
        let limit = limit.unwrap_or(50);
        let rows = sqlx::query(
            "SELECT * FROM sessions WHERE user_id = ? ORDER BY last_activity_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_session).collect()
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversation_turns (id, session_id, user_id, role, content, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(turn.id.to_string())
        .bind(turn.session_id.to_string())
        .bind(&turn.user_id)
        .bind(turn.role.to_string())
        .bind(&turn.content)
        .bind(turn.created_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_turns(
        &self,
        session_id: &Uuid,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_turns WHERE session_id = ? ORDER BY created_at, id",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_turn).collect()
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
    async fn test_session_roundtrip() {
        let repo = SqliteConversationRepository::new(test_pool().await);
        let session = Session::new("user-1", DomainKey::derive("example.com"));

        repo.create_session(&session).await.unwrap();
        let found = repo.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(found.user_id, "user-1");
        assert_eq!(found.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_update_session_status() {
        let repo = SqliteConversationRepository::new(test_pool().await);
        let mut session = Session::new("user-1", DomainKey::derive("example.com"));
        repo.create_session(&session).await.unwrap();

        session.status = SessionStatus::Closed;
        session.last_activity_at = Utc::now();
        repo.update_session(&session).await.unwrap();

        let found = repo.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(found.status, SessionStatus::Closed);
    }

    #[tokio::test]
    async fn test_turns_append_in_order() {
        let repo = SqliteConversationRepository::new(test_pool().await);
        let session = Session::new("user-1", DomainKey::derive("example.com"));
        repo.create_session(&session).await.unwrap();

        repo.append_turn(&ConversationTurn::new(
            session.id,
            "user-1",
            TurnRole::User,
            "hello",
        ))
        .await
        .unwrap();
        repo.append_turn(&ConversationTurn::new(
            session.id,
            "user-1",
            TurnRole::Assistant,
            "hi there",
        ))
        .await
        .unwrap();

        let turns = repo.list_turns(&session.id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].role, TurnRole::Assistant);
        assert_eq!(turns[1].content, "hi there");
    }

    #[tokio::test]
    async fn test_list_sessions_most_recent_first() {
        let repo = SqliteConversationRepository::new(test_pool().await);
        let mut older = Session::new("user-1", DomainKey::derive("example.com"));
        older.last_activity_at = Utc::now() - chrono::Duration::minutes(10);
        let newer = Session::new("user-1", DomainKey::derive("example.com"));

        repo.create_session(&older).await.unwrap();
        repo.create_session(&newer).await.unwrap();

        let sessions = repo.list_sessions("user-1", None).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, newer.id);
    }

    #[tokio::test]
    async fn test_update_missing_session() {
        let repo = SqliteConversationRepository::new(test_pool().await);
        let session = Session::new("user-1", DomainKey::derive("example.com"));
        let err = repo.update_session(&session).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
