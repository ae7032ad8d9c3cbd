use async_trait::async_trait;

use crate::domain::users::{NewSession, UserSession};
use crate::error::Result;

#[async_trait]
pub trait SessionsRepository: Send + Sync {
    /// Insert a session. Returns `false` (and writes nothing) when the jti
    /// is already known.
    async fn create_session(&self, session: NewSession) -> Result<bool>;
    async fn get_session_by_jti(&self, jti: &str)
    -> Result<Option<UserSession>>;
    /// Only sessions that are neither revoked nor expired.
    async fn get_active_session_by_jti(
        &self,
        jti: &str,
    ) -> Result<Option<UserSession>>;
    /// Bump `last_seen_at` of an active session. Revoked or expired sessions
    /// are left untouched and yield `false`.
    async fn touch_session(&self, jti: &str) -> Result<bool>;
    /// Active sessions, most recently seen first.
    async fn list_user_sessions(&self, user_id: i64)
    -> Result<Vec<UserSession>>;
    async fn revoke_session(&self, jti: &str) -> Result<bool>;
    async fn revoke_session_for_user(
        &self,
        user_id: i64,
        jti: &str,
    ) -> Result<bool>;
    async fn revoke_other_sessions(
        &self,
        user_id: i64,
        current_jti: &str,
    ) -> Result<u64>;
    async fn revoke_all_sessions(&self, user_id: i64) -> Result<u64>;
    /// Delete expired and revoked sessions.
    async fn purge_stale_sessions(&self) -> Result<u64>;
}
