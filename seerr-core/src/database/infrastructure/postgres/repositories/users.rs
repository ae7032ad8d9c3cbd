use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgRow};
use tracing::info;

use super::{column, conflict_on_unique};
use crate::database::ports::users::{
    UserLimitOverridesReadPort, UsersRepository,
};
use crate::domain::users::{
    GroupSet, JellyfinLink, NewUser, NotificationPreferences,
    RequestLimitOverrides, User, UserProfileUpdate, UserUpsert,
};
use crate::error::{Result, SeerrError};

/// Minimum gap between two `last_seen_at` writes for the same user.
pub const DEFAULT_LAST_SEEN_THROTTLE_MINUTES: i32 = 5;

const USER_COLUMNS: &str = r#"
    id, username, email, groups, password_hash, oidc_sub,
    jellyfin_user_id, jellyfin_username, jellyfin_device_id, jellyfin_auth_token,
    discord_user_id, avatar_url, avatar_version, mfa_secret,
    discover_region, original_language, watchlist_sync_movies, watchlist_sync_tv,
    request_limit_movie, request_limit_movie_days,
    request_limit_series, request_limit_series_days,
    banned, weekly_digest_opt_in, web_push_enabled, created_at, last_seen_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresUsersRepository {
    pool: PgPool,
    last_seen_throttle_minutes: i32,
}

impl PostgresUsersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            last_seen_throttle_minutes: DEFAULT_LAST_SEEN_THROTTLE_MINUTES,
        }
    }

    pub fn with_last_seen_throttle(mut self, minutes: i32) -> Self {
        self.last_seen_throttle_minutes = minutes.max(0);
        self
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<User> {
        let groups: Vec<String> = column(row, "groups")?;

        Ok(User {
            id: column(row, "id")?,
            username: column(row, "username")?,
            email: column(row, "email")?,
            groups: GroupSet::from(groups),
            password_hash: column(row, "password_hash")?,
            oidc_sub: column(row, "oidc_sub")?,
            jellyfin_user_id: column(row, "jellyfin_user_id")?,
            jellyfin_username: column(row, "jellyfin_username")?,
            jellyfin_device_id: column(row, "jellyfin_device_id")?,
            jellyfin_auth_token: column(row, "jellyfin_auth_token")?,
            discord_user_id: column(row, "discord_user_id")?,
            avatar_url: column(row, "avatar_url")?,
            avatar_version: column(row, "avatar_version")?,
            mfa_secret: column(row, "mfa_secret")?,
            discover_region: column(row, "discover_region")?,
            original_language: column(row, "original_language")?,
            watchlist_sync_movies: column(row, "watchlist_sync_movies")?,
            watchlist_sync_tv: column(row, "watchlist_sync_tv")?,
            request_limits: Self::map_limits(row)?,
            banned: column(row, "banned")?,
            weekly_digest_opt_in: column(row, "weekly_digest_opt_in")?,
            web_push_enabled: column(row, "web_push_enabled")?,
            created_at: column(row, "created_at")?,
            last_seen_at: column(row, "last_seen_at")?,
        })
    }

    fn map_limits(row: &PgRow) -> Result<RequestLimitOverrides> {
        Ok(RequestLimitOverrides {
            movie_limit: column(row, "request_limit_movie")?,
            movie_days: column(row, "request_limit_movie_days")?,
            series_limit: column(row, "request_limit_series")?,
            series_days: column(row, "request_limit_series_days")?,
        })
    }

    async fn fetch_one_by(&self, predicate: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM app_user WHERE {predicate} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(self.pool())
            .await?;

        row.map(|row| Self::map_row(&row)).transpose()
    }

    fn affected(result: sqlx::postgres::PgQueryResult) -> bool {
        result.rows_affected() > 0
    }
}

#[async_trait]
impl UsersRepository for PostgresUsersRepository {
    async fn upsert_user(&self, user: UserUpsert) -> Result<User> {
        let username = user.username.trim();
        if username.is_empty() {
            return Err(SeerrError::InvalidInput(
                "username must not be empty".into(),
            ));
        }

        let sql = format!(
            r#"
            INSERT INTO app_user (username, groups, email, last_seen_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (username) DO UPDATE SET
                groups = EXCLUDED.groups,
                email = COALESCE(EXCLUDED.email, app_user.email),
                last_seen_at = CASE
                    WHEN app_user.last_seen_at IS NULL
                      OR app_user.last_seen_at < NOW() - make_interval(mins => $4)
                    THEN NOW()
                    ELSE app_user.last_seen_at
                END
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(username)
            .bind(user.groups.to_vec())
            .bind(user.email.as_deref().map(str::trim).filter(|e| !e.is_empty()))
            .bind(self.last_seen_throttle_minutes)
            .fetch_one(self.pool())
            .await?;

        Self::map_row(&row)
    }

    async fn touch_user_last_seen(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE app_user
            SET last_seen_at = NOW()
            WHERE id = $1
              AND (last_seen_at IS NULL
                   OR last_seen_at < NOW() - make_interval(mins => $2))
            "#,
        )
        .bind(user_id)
        .bind(self.last_seen_throttle_minutes)
        .execute(self.pool())
        .await?;

        Ok(Self::affected(result))
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let username = user.username.trim().to_string();
        if username.is_empty() {
            return Err(SeerrError::InvalidInput(
                "username must not be empty".into(),
            ));
        }

        let sql = format!(
            r#"
            INSERT INTO app_user (username, email, groups, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&username)
            .bind(user.email)
            .bind(user.groups.to_vec())
            .bind(user.password_hash)
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                conflict_on_unique(e, || format!("username {username} is taken"))
            })?;

        let created = Self::map_row(&row)?;
        info!(user_id = created.id, username = %created.username, "created user");
        Ok(created)
    }

    async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM app_user WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;

        row.map(|row| Self::map_row(&row)).transpose()
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>> {
        self.fetch_one_by("username", username.trim()).await
    }

    async fn get_user_by_oidc_sub(&self, sub: &str) -> Result<Option<User>> {
        self.fetch_one_by("oidc_sub", sub).await
    }

    async fn get_user_by_jellyfin_user_id(
        &self,
        jellyfin_user_id: &str,
    ) -> Result<Option<User>> {
        self.fetch_one_by("jellyfin_user_id", jellyfin_user_id).await
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM app_user ORDER BY id LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(limit.max(1))
            .bind(offset.max(0))
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn count_users(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_user")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    async fn update_user_profile(
        &self,
        user_id: i64,
        update: UserProfileUpdate,
    ) -> Result<User> {
        let sql = format!(
            r#"
            UPDATE app_user SET
                email = $2,
                discover_region = $3,
                original_language = $4,
                watchlist_sync_movies = $5,
                watchlist_sync_tv = $6
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(update.email)
            .bind(update.discover_region)
            .bind(update.original_language)
            .bind(update.watchlist_sync_movies)
            .bind(update.watchlist_sync_tv)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| SeerrError::NotFound(format!("user {user_id}")))?;

        Self::map_row(&row)
    }

    async fn set_user_groups(
        &self,
        user_id: i64,
        groups: &GroupSet,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE app_user SET groups = $2 WHERE id = $1")
            .bind(user_id)
            .bind(groups.to_vec())
            .execute(self.pool())
            .await?;

        Ok(Self::affected(result))
    }

    async fn set_user_password_hash(
        &self,
        user_id: i64,
        password_hash: Option<&str>,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE app_user SET password_hash = $2 WHERE id = $1")
                .bind(user_id)
                .bind(password_hash)
                .execute(self.pool())
                .await?;

        Ok(Self::affected(result))
    }

    async fn link_oidc_subject(&self, user_id: i64, sub: &str) -> Result<()> {
        let result = sqlx::query("UPDATE app_user SET oidc_sub = $2 WHERE id = $1")
            .bind(user_id)
            .bind(sub)
            .execute(self.pool())
            .await
            .map_err(|e| {
                conflict_on_unique(e, || {
                    "OIDC subject is already linked to another account".to_string()
                })
            })?;

        if result.rows_affected() == 0 {
            return Err(SeerrError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn link_jellyfin(
        &self,
        user_id: i64,
        link: JellyfinLink,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE app_user SET
                jellyfin_user_id = $2,
                jellyfin_username = $3,
                jellyfin_device_id = $4,
                jellyfin_auth_token = $5
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(link.user_id)
        .bind(link.username)
        .bind(link.device_id)
        .bind(link.auth_token)
        .execute(self.pool())
        .await?;

        Ok(Self::affected(result))
    }

    async fn unlink_jellyfin(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE app_user SET
                jellyfin_user_id = NULL,
                jellyfin_username = NULL,
                jellyfin_device_id = NULL,
                jellyfin_auth_token = NULL
            WHERE id = $1 AND jellyfin_user_id IS NOT NULL
            "#,
        )
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(Self::affected(result))
    }

    async fn set_discord_user_id(
        &self,
        user_id: i64,
        discord_user_id: Option<&str>,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE app_user SET discord_user_id = $2 WHERE id = $1")
                .bind(user_id)
                .bind(discord_user_id)
                .execute(self.pool())
                .await?;

        Ok(Self::affected(result))
    }

    async fn set_avatar(
        &self,
        user_id: i64,
        avatar_url: Option<&str>,
    ) -> Result<i32> {
        let version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE app_user
            SET avatar_url = $2, avatar_version = avatar_version + 1
            WHERE id = $1
            RETURNING avatar_version
            "#,
        )
        .bind(user_id)
        .bind(avatar_url)
        .fetch_optional(self.pool())
        .await?;

        version.ok_or_else(|| SeerrError::NotFound(format!("user {user_id}")))
    }

    async fn set_request_limits(
        &self,
        user_id: i64,
        limits: RequestLimitOverrides,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE app_user SET
                request_limit_movie = $2,
                request_limit_movie_days = $3,
                request_limit_series = $4,
                request_limit_series_days = $5
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(limits.movie_limit)
        .bind(limits.movie_days)
        .bind(limits.series_limit)
        .bind(limits.series_days)
        .execute(self.pool())
        .await?;

        Ok(Self::affected(result))
    }

    async fn set_banned(&self, user_id: i64, banned: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE app_user SET banned = $2 WHERE id = $1")
            .bind(user_id)
            .bind(banned)
            .execute(self.pool())
            .await?;

        if result.rows_affected() > 0 {
            info!(user_id, banned, "updated user ban flag");
        }
        Ok(Self::affected(result))
    }

    async fn set_notification_preferences(
        &self,
        user_id: i64,
        preferences: NotificationPreferences,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE app_user
            SET weekly_digest_opt_in = $2, web_push_enabled = $3
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(preferences.weekly_digest_opt_in)
        .bind(preferences.web_push_enabled)
        .execute(self.pool())
        .await?;

        Ok(Self::affected(result))
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM app_user WHERE id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() > 0 {
            info!(user_id, "deleted user");
        }
        Ok(Self::affected(result))
    }
}

#[async_trait]
impl UserLimitOverridesReadPort for PostgresUsersRepository {
    async fn request_limit_overrides(
        &self,
        user_id: i64,
    ) -> Result<Option<RequestLimitOverrides>> {
        let row = sqlx::query(
            r#"
            SELECT request_limit_movie, request_limit_movie_days,
                   request_limit_series, request_limit_series_days
            FROM app_user
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| Self::map_limits(&row)).transpose()
    }
}
