use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgRow};
use tracing::{debug, info};

use super::{column, not_found_on_foreign_key};
use crate::database::ports::sessions::SessionsRepository;
use crate::domain::users::{NewSession, UserSession};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PostgresSessionsRepository {
    pool: PgPool,
}

impl PostgresSessionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<UserSession> {
        Ok(UserSession {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            jti: column(row, "jti")?,
            expires_at: column(row, "expires_at")?,
            revoked_at: column(row, "revoked_at")?,
            user_agent: column(row, "user_agent")?,
            device_label: column(row, "device_label")?,
            ip_address: column(row, "ip_address")?,
            created_at: column(row, "created_at")?,
            last_seen_at: column(row, "last_seen_at")?,
        })
    }
}

#[async_trait]
impl SessionsRepository for PostgresSessionsRepository {
    async fn create_session(&self, session: NewSession) -> Result<bool> {
        let user_id = session.user_id;
        let result = sqlx::query(
            r#"
            INSERT INTO user_session (user_id, jti, expires_at, user_agent, device_label, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(session.user_id)
        .bind(&session.jti)
        .bind(session.expires_at)
        .bind(session.user_agent)
        .bind(session.device_label)
        .bind(session.ip_address)
        .execute(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        let created = result.rows_affected() > 0;
        if !created {
            debug!(jti = %session.jti, "session already recorded");
        }
        Ok(created)
    }

    async fn get_session_by_jti(
        &self,
        jti: &str,
    ) -> Result<Option<UserSession>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, jti, expires_at, revoked_at, user_agent,
                   device_label, ip_address, created_at, last_seen_at
            FROM user_session
            WHERE jti = $1
            "#,
        )
        .bind(jti)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| Self::map_row(&row)).transpose()
    }

    async fn get_active_session_by_jti(
        &self,
        jti: &str,
    ) -> Result<Option<UserSession>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, jti, expires_at, revoked_at, user_agent,
                   device_label, ip_address, created_at, last_seen_at
            FROM user_session
            WHERE jti = $1 AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(jti)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| Self::map_row(&row)).transpose()
    }

    async fn touch_session(&self, jti: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_session
            SET last_seen_at = NOW()
            WHERE jti = $1 AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(jti)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_user_sessions(
        &self,
        user_id: i64,
    ) -> Result<Vec<UserSession>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, jti, expires_at, revoked_at, user_agent,
                   device_label, ip_address, created_at, last_seen_at
            FROM user_session
            WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW()
            ORDER BY last_seen_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn revoke_session(&self, jti: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_session
            SET revoked_at = NOW()
            WHERE jti = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(jti)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_session_for_user(
        &self,
        user_id: i64,
        jti: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_session
            SET revoked_at = NOW()
            WHERE user_id = $1 AND jti = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(jti)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_other_sessions(
        &self,
        user_id: i64,
        current_jti: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_session
            SET revoked_at = NOW()
            WHERE user_id = $1 AND jti <> $2 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(current_jti)
        .execute(self.pool())
        .await?;

        let revoked = result.rows_affected();
        info!(user_id, revoked, "revoked other sessions");
        Ok(revoked)
    }

    async fn revoke_all_sessions(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_session
            SET revoked_at = NOW()
            WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(self.pool())
        .await?;

        let revoked = result.rows_affected();
        info!(user_id, revoked, "revoked all sessions");
        Ok(revoked)
    }

    async fn purge_stale_sessions(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM user_session WHERE revoked_at IS NOT NULL OR expires_at <= NOW()",
        )
        .execute(self.pool())
        .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, "purged stale sessions");
        }
        Ok(purged)
    }
}
