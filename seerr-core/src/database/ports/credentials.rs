use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::users::{
    MfaSession, NewWebAuthnCredential, WebAuthnChallenge, WebAuthnCredential,
};
use crate::error::Result;

#[async_trait]
pub trait CredentialsRepository: Send + Sync {
    async fn add_credential(
        &self,
        credential: NewWebAuthnCredential,
    ) -> Result<WebAuthnCredential>;
    async fn list_credentials(
        &self,
        user_id: i64,
    ) -> Result<Vec<WebAuthnCredential>>;
    async fn get_credential(
        &self,
        credential_id: &str,
    ) -> Result<Option<WebAuthnCredential>>;
    /// Store a new signature counter. Counters only move forward; a value
    /// not greater than the stored one is refused with `false`.
    async fn update_credential_counter(
        &self,
        credential_id: &str,
        counter: i64,
    ) -> Result<bool>;
    async fn rename_credential(
        &self,
        user_id: i64,
        id: i64,
        name: &str,
    ) -> Result<bool>;
    async fn delete_credential(&self, user_id: i64, id: i64) -> Result<bool>;
    async fn delete_all_credentials(&self, user_id: i64) -> Result<u64>;

    async fn save_challenge(
        &self,
        user_id: Option<i64>,
        challenge: &str,
        purpose: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<WebAuthnChallenge>;
    /// Delete and return an unexpired challenge. Single use.
    async fn consume_challenge(
        &self,
        challenge: &str,
        purpose: &str,
    ) -> Result<Option<WebAuthnChallenge>>;

    async fn set_mfa_secret(&self, user_id: i64, secret: &str) -> Result<bool>;
    async fn clear_mfa_secret(&self, user_id: i64) -> Result<bool>;
    async fn create_mfa_session(
        &self,
        user_id: i64,
        token: &str,
        purpose: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<MfaSession>;
    async fn get_mfa_session(&self, token: &str) -> Result<Option<MfaSession>>;
    async fn delete_mfa_session(&self, token: &str) -> Result<bool>;
    /// Drop expired challenges and MFA sessions.
    async fn purge_expired_auth_artifacts(&self) -> Result<u64>;
}
