//! Conversation repository trait definition.

use agentry_types::error::RepositoryError;
use agentry_types::session::{ConversationTurn, Session};
use uuid::Uuid;

/// Repository trait for sessions and their turns.
///
/// Turns are append-only: there is no update or delete operation for them
/// by design.
pub trait ConversationRepository: Send + Sync {
    /// Persist a new session.
    fn create_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<Session, RepositoryError>> + Send;

    /// Get a session by id.
    fn get_session(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Overwrite a session's mutable fields (last activity, status).
    fn update_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List sessions for a user, most recent activity first.
    fn list_sessions(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, RepositoryError>> + Send;

    /// Append a turn.
    fn append_turn(
        &self,
        turn: &ConversationTurn,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List a session's turns ordered by creation time.
    fn list_turns(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationTurn>, RepositoryError>> + Send;
}
