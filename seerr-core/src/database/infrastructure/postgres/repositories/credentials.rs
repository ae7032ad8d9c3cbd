use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgRow};
use tracing::info;

use super::{
    column, conflict_on_unique, is_foreign_key_violation, not_found_on_foreign_key,
};
use crate::database::ports::credentials::CredentialsRepository;
use crate::domain::users::{
    MfaSession, NewWebAuthnCredential, WebAuthnChallenge, WebAuthnCredential,
};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PostgresCredentialsRepository {
    pool: PgPool,
}

impl PostgresCredentialsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_credential(row: &PgRow) -> Result<WebAuthnCredential> {
        Ok(WebAuthnCredential {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            credential_id: column(row, "credential_id")?,
            public_key: column(row, "public_key")?,
            counter: column(row, "counter")?,
            transports: column(row, "transports")?,
            name: column(row, "name")?,
            created_at: column(row, "created_at")?,
            last_used_at: column(row, "last_used_at")?,
        })
    }

    fn map_challenge(row: &PgRow) -> Result<WebAuthnChallenge> {
        Ok(WebAuthnChallenge {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            challenge: column(row, "challenge")?,
            purpose: column(row, "purpose")?,
            expires_at: column(row, "expires_at")?,
        })
    }

    fn map_mfa_session(row: &PgRow) -> Result<MfaSession> {
        Ok(MfaSession {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            token: column(row, "token")?,
            purpose: column(row, "purpose")?,
            expires_at: column(row, "expires_at")?,
        })
    }
}

#[async_trait]
impl CredentialsRepository for PostgresCredentialsRepository {
    async fn add_credential(
        &self,
        credential: NewWebAuthnCredential,
    ) -> Result<WebAuthnCredential> {
        let user_id = credential.user_id;
        let row = sqlx::query(
            r#"
            INSERT INTO user_credential (user_id, credential_id, public_key, counter, transports, name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, credential_id, public_key, counter, transports,
                      name, created_at, last_used_at
            "#,
        )
        .bind(credential.user_id)
        .bind(&credential.credential_id)
        .bind(credential.public_key)
        .bind(credential.counter)
        .bind(credential.transports)
        .bind(credential.name)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                not_found_on_foreign_key(e, || format!("user {user_id}"))
            } else {
                conflict_on_unique(e, || "credential is already registered".to_string())
            }
        })?;

        let created = Self::map_credential(&row)?;
        info!(user_id, credential = created.id, "registered passkey");
        Ok(created)
    }

    async fn list_credentials(
        &self,
        user_id: i64,
    ) -> Result<Vec<WebAuthnCredential>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, credential_id, public_key, counter, transports,
                   name, created_at, last_used_at
            FROM user_credential
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_credential).collect()
    }

    async fn get_credential(
        &self,
        credential_id: &str,
    ) -> Result<Option<WebAuthnCredential>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, credential_id, public_key, counter, transports,
                   name, created_at, last_used_at
            FROM user_credential
            WHERE credential_id = $1
            "#,
        )
        .bind(credential_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| Self::map_credential(&row)).transpose()
    }

    async fn update_credential_counter(
        &self,
        credential_id: &str,
        counter: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_credential
            SET counter = $2, last_used_at = NOW()
            WHERE credential_id = $1 AND counter < $2
            "#,
        )
        .bind(credential_id)
        .bind(counter)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn rename_credential(
        &self,
        user_id: i64,
        id: i64,
        name: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE user_credential SET name = $3 WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(name.trim())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_credential(&self, user_id: i64, id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM user_credential WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_credentials(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_credential WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    async fn save_challenge(
        &self,
        user_id: Option<i64>,
        challenge: &str,
        purpose: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<WebAuthnChallenge> {
        let row = sqlx::query(
            r#"
            INSERT INTO webauthn_challenge (user_id, challenge, purpose, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, challenge, purpose, expires_at
            "#,
        )
        .bind(user_id)
        .bind(challenge)
        .bind(purpose)
        .bind(expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(|e| conflict_on_unique(e, || "challenge already issued".to_string()))?;

        Self::map_challenge(&row)
    }

    async fn consume_challenge(
        &self,
        challenge: &str,
        purpose: &str,
    ) -> Result<Option<WebAuthnChallenge>> {
        let row = sqlx::query(
            r#"
            DELETE FROM webauthn_challenge
            WHERE challenge = $1 AND purpose = $2 AND expires_at > NOW()
            RETURNING id, user_id, challenge, purpose, expires_at
            "#,
        )
        .bind(challenge)
        .bind(purpose)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| Self::map_challenge(&row)).transpose()
    }

    async fn set_mfa_secret(&self, user_id: i64, secret: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE app_user SET mfa_secret = $2 WHERE id = $1")
            .bind(user_id)
            .bind(secret)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_mfa_secret(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE app_user SET mfa_secret = NULL WHERE id = $1 AND mfa_secret IS NOT NULL",
        )
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_mfa_session(
        &self,
        user_id: i64,
        token: &str,
        purpose: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<MfaSession> {
        let row = sqlx::query(
            r#"
            INSERT INTO mfa_session (user_id, token, purpose, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, token, purpose, expires_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(purpose)
        .bind(expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        Self::map_mfa_session(&row)
    }

    async fn get_mfa_session(&self, token: &str) -> Result<Option<MfaSession>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, token, purpose, expires_at
            FROM mfa_session
            WHERE token = $1 AND expires_at > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| Self::map_mfa_session(&row)).transpose()
    }

    async fn delete_mfa_session(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mfa_session WHERE token = $1")
            .bind(token)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_auth_artifacts(&self) -> Result<u64> {
        let challenges =
            sqlx::query("DELETE FROM webauthn_challenge WHERE expires_at <= NOW()")
                .execute(self.pool())
                .await?
                .rows_affected();
        let mfa_sessions =
            sqlx::query("DELETE FROM mfa_session WHERE expires_at <= NOW()")
                .execute(self.pool())
                .await?
                .rows_affected();

        let purged = challenges + mfa_sessions;
        if purged > 0 {
            info!(challenges, mfa_sessions, "purged expired auth artifacts");
        }
        Ok(purged)
    }
}
