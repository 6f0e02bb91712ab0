//! Conversation logger: session lifecycle and append-only turn persistence.
//!
//! The registry's chat path invokes this after every successful turn but
//! does not own the underlying storage.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use agentry_types::domain::DomainKey;
use agentry_types::error::{ConversationError, RepositoryError};
use agentry_types::session::{ConversationTurn, Session, SessionStatus, TurnRole};

use crate::repository::conversation::ConversationRepository;

/// Orchestrates session lifecycle and turn persistence.
///
/// Generic over `ConversationRepository` to keep agentry-core free of any
/// storage dependency.
pub struct ConversationService<R: ConversationRepository> {
    repo: R,
}

impl<R: ConversationRepository> ConversationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Open a new active session for a user against a domain.
    pub async fn create_session(
        &self,
        user_id: &str,
        domain_key: DomainKey,
    ) -> Result<Session, ConversationError> {
        let session = Session::new(user_id, domain_key);
        let session = self
            .repo
            .create_session(&session)
            .await
            .map_err(storage)?;
        info!(session_id = %session.id, user_id = %session.user_id, "Session created");
        Ok(session)
    }

    /// Get a session by id.
    pub async fn get_session(&self, id: &Uuid) -> Result<Session, ConversationError> {
        self.repo
            .get_session(id)
            .await
            .map_err(storage)?
            .ok_or(ConversationError::SessionNotFound)
    }

    /// List a user's sessions, most recent activity first.
    pub async fn list_sessions(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Session>, ConversationError> {
        self.repo
            .list_sessions(user_id, limit)
            .await
            .map_err(storage)
    }

    /// Close a session. Closing an already-closed session is a no-op.
    pub async fn close_session(&self, id: &Uuid) -> Result<(), ConversationError> {
        match self.repo.get_session(id).await.map_err(storage)? {
            Some(mut session) => {
                session.status = SessionStatus::Closed;
                session.last_activity_at = Utc::now();
                self.repo.update_session(&session).await.map_err(storage)?;
                info!(session_id = %id, "Session closed");
                Ok(())
            }
            None => {
                warn!(session_id = %id, "Attempted to close non-existent session");
                Err(ConversationError::SessionNotFound)
            }
        }
    }

    /// Append one user turn and one assistant turn for a completed exchange,
    /// then touch the session's last-activity timestamp.
    ///
    /// Rejects exchanges against closed sessions.
    pub async fn log_exchange(
        &self,
        session_id: &Uuid,
        user_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<(), ConversationError> {
        let mut session = self.get_session(session_id).await?;
        if session.status == SessionStatus::Closed {
            return Err(ConversationError::SessionClosed);
        }

        let user_turn = ConversationTurn::new(*session_id, user_id, TurnRole::User, question);
        self.repo.append_turn(&user_turn).await.map_err(storage)?;

        let assistant_turn =
            ConversationTurn::new(*session_id, user_id, TurnRole::Assistant, answer);
        self.repo
            .append_turn(&assistant_turn)
            .await
            .map_err(storage)?;

        session.last_activity_at = Utc::now();
        self.repo.update_session(&session).await.map_err(storage)?;
        Ok(())
    }

    /// Get a session's turns in order.
    pub async fn history(
        &self,
        session_id: &Uuid,
    ) -> Result<Vec<ConversationTurn>, ConversationError> {
        // Verify the session exists so a bad id is a 404, not an empty list.
        self.get_session(session_id).await?;
        self.repo.list_turns(session_id).await.map_err(storage)
    }
}

fn storage(err: RepositoryError) -> ConversationError {
    ConversationError::StorageError(err.to_string())
}
