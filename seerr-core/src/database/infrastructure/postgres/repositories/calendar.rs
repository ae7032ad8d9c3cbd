use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgRow};
use tracing::info;

use super::{column, not_found_on_foreign_key, parsed};
use crate::database::ports::calendar::CalendarRepository;
use crate::domain::MediaKind;
use crate::domain::calendar::{
    CalendarFeedToken, CalendarPreferences, CalendarSubscription,
};
use crate::domain::tokens::generate_token;
use crate::error::{Result, SeerrError};

#[derive(Debug, Clone)]
pub struct PostgresCalendarRepository {
    pool: PgPool,
}

impl PostgresCalendarRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_preferences(row: &PgRow) -> Result<CalendarPreferences> {
        Ok(CalendarPreferences {
            user_id: column(row, "user_id")?,
            default_view: column(row, "default_view")?,
            show_movies: column(row, "show_movies")?,
            show_tv: column(row, "show_tv")?,
            only_monitored: column(row, "only_monitored")?,
        })
    }

    fn map_subscription(row: &PgRow) -> Result<CalendarSubscription> {
        Ok(CalendarSubscription {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            event_type: column(row, "event_type")?,
            media_type: parsed(row, "media_type")?,
            tmdb_id: column(row, "tmdb_id")?,
            created_at: column(row, "created_at")?,
        })
    }

    fn map_token(row: &PgRow) -> Result<CalendarFeedToken> {
        Ok(CalendarFeedToken {
            user_id: column(row, "user_id")?,
            token: column(row, "token")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[async_trait]
impl CalendarRepository for PostgresCalendarRepository {
    async fn get_preferences(&self, user_id: i64) -> Result<CalendarPreferences> {
        let row = sqlx::query(
            r#"
            SELECT user_id, default_view, show_movies, show_tv, only_monitored
            FROM calendar_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Self::map_preferences(&row),
            None => Ok(CalendarPreferences::defaults_for(user_id)),
        }
    }

    async fn upsert_preferences(
        &self,
        preferences: &CalendarPreferences,
    ) -> Result<CalendarPreferences> {
        if preferences.default_view.trim().is_empty() {
            return Err(SeerrError::InvalidInput(
                "calendar view must not be empty".into(),
            ));
        }
        let user_id = preferences.user_id;

        let row = sqlx::query(
            r#"
            INSERT INTO calendar_preferences
                (user_id, default_view, show_movies, show_tv, only_monitored, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                default_view = EXCLUDED.default_view,
                show_movies = EXCLUDED.show_movies,
                show_tv = EXCLUDED.show_tv,
                only_monitored = EXCLUDED.only_monitored,
                updated_at = NOW()
            RETURNING user_id, default_view, show_movies, show_tv, only_monitored
            "#,
        )
        .bind(preferences.user_id)
        .bind(&preferences.default_view)
        .bind(preferences.show_movies)
        .bind(preferences.show_tv)
        .bind(preferences.only_monitored)
        .fetch_one(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        Self::map_preferences(&row)
    }

    async fn subscribe(
        &self,
        user_id: i64,
        event_type: &str,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO calendar_event_subscription (user_id, event_type, media_type, tmdb_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, event_type, media_type, tmdb_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(event_type)
        .bind(media_type.as_str())
        .bind(tmdb_id)
        .execute(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn unsubscribe(
        &self,
        user_id: i64,
        event_type: &str,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM calendar_event_subscription
            WHERE user_id = $1 AND event_type = $2 AND media_type = $3 AND tmdb_id = $4
            "#,
        )
        .bind(user_id)
        .bind(event_type)
        .bind(media_type.as_str())
        .bind(tmdb_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_subscriptions(
        &self,
        user_id: i64,
    ) -> Result<Vec<CalendarSubscription>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, event_type, media_type, tmdb_id, created_at
            FROM calendar_event_subscription
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_subscription).collect()
    }

    async fn list_subscribers(
        &self,
        event_type: &str,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<Vec<i64>> {
        let users: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT user_id
            FROM calendar_event_subscription
            WHERE event_type = $1 AND media_type = $2 AND tmdb_id = $3
            ORDER BY user_id
            "#,
        )
        .bind(event_type)
        .bind(media_type.as_str())
        .bind(tmdb_id)
        .fetch_all(self.pool())
        .await?;

        Ok(users)
    }

    async fn get_or_create_feed_token(
        &self,
        user_id: i64,
    ) -> Result<CalendarFeedToken> {
        let candidate = generate_token()?;
        sqlx::query(
            r#"
            INSERT INTO calendar_feed_token (user_id, token)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(&candidate)
        .execute(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        let row = sqlx::query(
            "SELECT user_id, token, created_at FROM calendar_feed_token WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Self::map_token(&row)
    }

    async fn rotate_feed_token(&self, user_id: i64) -> Result<CalendarFeedToken> {
        let row = sqlx::query(
            r#"
            INSERT INTO calendar_feed_token (user_id, token)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET
                token = EXCLUDED.token,
                created_at = NOW()
            RETURNING user_id, token, created_at
            "#,
        )
        .bind(user_id)
        .bind(generate_token()?)
        .fetch_one(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        info!(user_id, "rotated calendar feed token");
        Self::map_token(&row)
    }

    async fn find_user_by_feed_token(&self, token: &str) -> Result<Option<i64>> {
        let user_id: Option<i64> = sqlx::query_scalar(
            "SELECT user_id FROM calendar_feed_token WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?;

        Ok(user_id)
    }
}
