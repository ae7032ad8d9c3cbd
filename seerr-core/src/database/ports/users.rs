use async_trait::async_trait;

use crate::domain::users::{
    GroupSet, JellyfinLink, NewUser, NotificationPreferences,
    RequestLimitOverrides, User, UserProfileUpdate, UserUpsert,
};
use crate::error::Result;

#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Login-time upsert keyed by username. Groups are always replaced,
    /// email only filled when provided, `last_seen_at` bumped subject to the
    /// throttle window.
    async fn upsert_user(&self, user: UserUpsert) -> Result<User>;

    /// Bump `last_seen_at` unless it was written within the throttle window.
    async fn touch_user_last_seen(&self, user_id: i64) -> Result<bool>;

    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str)
    -> Result<Option<User>>;
    async fn get_user_by_oidc_sub(&self, sub: &str) -> Result<Option<User>>;
    async fn get_user_by_jellyfin_user_id(
        &self,
        jellyfin_user_id: &str,
    ) -> Result<Option<User>>;
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>>;
    async fn count_users(&self) -> Result<i64>;

    async fn update_user_profile(
        &self,
        user_id: i64,
        update: UserProfileUpdate,
    ) -> Result<User>;
    async fn set_user_groups(
        &self,
        user_id: i64,
        groups: &GroupSet,
    ) -> Result<bool>;
    async fn set_user_password_hash(
        &self,
        user_id: i64,
        password_hash: Option<&str>,
    ) -> Result<bool>;

    /// Attach an OIDC subject. A subject already linked to another account
    /// is a [`SeerrError::Conflict`](crate::error::SeerrError::Conflict).
    async fn link_oidc_subject(&self, user_id: i64, sub: &str) -> Result<()>;

    async fn link_jellyfin(
        &self,
        user_id: i64,
        link: JellyfinLink,
    ) -> Result<bool>;
    async fn unlink_jellyfin(&self, user_id: i64) -> Result<bool>;
    async fn set_discord_user_id(
        &self,
        user_id: i64,
        discord_user_id: Option<&str>,
    ) -> Result<bool>;

    /// Store a new avatar and return the bumped avatar version.
    async fn set_avatar(
        &self,
        user_id: i64,
        avatar_url: Option<&str>,
    ) -> Result<i32>;

    async fn set_request_limits(
        &self,
        user_id: i64,
        limits: RequestLimitOverrides,
    ) -> Result<bool>;
    async fn set_banned(&self, user_id: i64, banned: bool) -> Result<bool>;
    async fn set_notification_preferences(
        &self,
        user_id: i64,
        preferences: NotificationPreferences,
    ) -> Result<bool>;
    async fn delete_user(&self, user_id: i64) -> Result<bool>;
}

/// Narrow read port for per-user limit overrides.
#[async_trait]
pub trait UserLimitOverridesReadPort: Send + Sync {
    /// `None` when the user does not exist.
    async fn request_limit_overrides(
        &self,
        user_id: i64,
    ) -> Result<Option<RequestLimitOverrides>>;
}
