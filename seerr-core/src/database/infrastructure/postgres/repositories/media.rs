use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgRow};
use tracing::{debug, info, warn};

use super::{column, not_found_on_foreign_key, parsed};
use crate::database::ports::media::{
    DashboardSlidersRepository, IssuesRepository, MediaListsRepository,
    RecentlyViewedRepository, SharesRepository,
};
use crate::domain::media::{
    DashboardSlider, DashboardSliderInput, IssueStatus, ListMembership,
    ListType, MediaIssue, MediaListItem, MediaShare, NewMediaIssue,
    NewMediaShare, RecentlyViewed,
};
use crate::domain::{MediaKind, Page};
use crate::error::{Result, SeerrError};

#[derive(Debug, Clone)]
pub struct PostgresSharesRepository {
    pool: PgPool,
}

impl PostgresSharesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<MediaShare> {
        Ok(MediaShare {
            id: column(row, "id")?,
            token: column(row, "token")?,
            created_by: column(row, "created_by")?,
            media_type: parsed(row, "media_type")?,
            tmdb_id: column(row, "tmdb_id")?,
            expires_at: column(row, "expires_at")?,
            view_count: column(row, "view_count")?,
            last_viewed_at: column(row, "last_viewed_at")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[async_trait]
impl SharesRepository for PostgresSharesRepository {
    async fn upsert_share(&self, share: NewMediaShare) -> Result<MediaShare> {
        if share.token.trim().is_empty() {
            return Err(SeerrError::InvalidInput("share token must not be empty".into()));
        }
        let created_by = share.created_by;

        let row = sqlx::query(
            r#"
            INSERT INTO media_share (token, created_by, media_type, tmdb_id, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (token) DO UPDATE SET
                media_type = EXCLUDED.media_type,
                tmdb_id = EXCLUDED.tmdb_id,
                expires_at = EXCLUDED.expires_at
            RETURNING id, token, created_by, media_type, tmdb_id, expires_at,
                      view_count, last_viewed_at, created_at
            "#,
        )
        .bind(share.token)
        .bind(share.created_by)
        .bind(share.media_type.as_str())
        .bind(share.tmdb_id)
        .bind(share.expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {created_by}")))?;

        Self::map_row(&row)
    }

    async fn get_active_share(&self, token: &str) -> Result<Option<MediaShare>> {
        let row = sqlx::query(
            r#"
            SELECT id, token, created_by, media_type, tmdb_id, expires_at,
                   view_count, last_viewed_at, created_at
            FROM media_share
            WHERE token = $1 AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| Self::map_row(&row)).transpose()
    }

    async fn record_share_view(&self, token: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media_share
            SET view_count = view_count + 1, last_viewed_at = NOW()
            WHERE token = $1 AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(token)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_user_shares(&self, user_id: i64) -> Result<Vec<MediaShare>> {
        let rows = sqlx::query(
            r#"
            SELECT id, token, created_by, media_type, tmdb_id, expires_at,
                   view_count, last_viewed_at, created_at
            FROM media_share
            WHERE created_by = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn delete_user_share(&self, user_id: i64, id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM media_share WHERE id = $1 AND created_by = $2")
                .bind(id)
                .bind(user_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_shares(&self) -> Result<u64> {
        let purged = sqlx::query(
            "DELETE FROM media_share WHERE expires_at IS NOT NULL AND expires_at <= NOW()",
        )
        .execute(self.pool())
        .await?
        .rows_affected();

        if purged > 0 {
            info!(purged, "purged expired media shares");
        }
        Ok(purged)
    }
}

const ISSUE_COLUMNS: &str = r#"
    id, reported_by, media_type, tmdb_id, title, category, description,
    season, episode, status, resolved_at, created_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresIssuesRepository {
    pool: PgPool,
}

impl PostgresIssuesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<MediaIssue> {
        Ok(MediaIssue {
            id: column(row, "id")?,
            reported_by: column(row, "reported_by")?,
            media_type: parsed(row, "media_type")?,
            tmdb_id: column(row, "tmdb_id")?,
            title: column(row, "title")?,
            category: column(row, "category")?,
            description: column(row, "description")?,
            season: column(row, "season")?,
            episode: column(row, "episode")?,
            status: parsed(row, "status")?,
            resolved_at: column(row, "resolved_at")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[async_trait]
impl IssuesRepository for PostgresIssuesRepository {
    async fn create_issue(&self, issue: NewMediaIssue) -> Result<MediaIssue> {
        issue.validate()?;
        let reported_by = issue.reported_by;

        let sql = format!(
            r#"
            INSERT INTO media_issue
                (reported_by, media_type, tmdb_id, title, category, description, season, episode)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ISSUE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(issue.reported_by)
            .bind(issue.media_type.as_str())
            .bind(issue.tmdb_id)
            .bind(issue.title)
            .bind(issue.category)
            .bind(issue.description)
            .bind(issue.season)
            .bind(issue.episode)
            .fetch_one(self.pool())
            .await
            .map_err(|e| not_found_on_foreign_key(e, || format!("user {reported_by}")))?;

        let created = Self::map_row(&row)?;
        info!(issue_id = created.id, tmdb_id = created.tmdb_id, "media issue reported");
        Ok(created)
    }

    async fn get_issue(&self, id: i64) -> Result<Option<MediaIssue>> {
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM media_issue WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        row.map(|row| Self::map_row(&row)).transpose()
    }

    async fn list_issues(
        &self,
        status: Option<IssueStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Page<MediaIssue>> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM media_issue WHERE $1::text IS NULL OR status = $1",
        )
        .bind(status)
        .fetch_one(self.pool())
        .await?;

        let sql = format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM media_issue
            WHERE $1::text IS NULL OR status = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await?;

        Ok(Page {
            items: rows.iter().map(Self::map_row).collect::<Result<Vec<_>>>()?,
            total,
            limit,
            offset,
        })
    }

    async fn list_user_issues(&self, user_id: i64) -> Result<Vec<MediaIssue>> {
        let sql = format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM media_issue
            WHERE reported_by = $1
            ORDER BY created_at DESC, id DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn resolve_issue(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media_issue SET status = 'resolved', resolved_at = NOW()
            WHERE id = $1 AND status <> 'resolved'
            "#,
        )
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reopen_issue(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media_issue SET status = 'open', resolved_at = NULL
            WHERE id = $1 AND status <> 'open'
            "#,
        )
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_issue(&self, user_id: i64, id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM media_issue WHERE id = $1 AND reported_by = $2")
                .bind(id)
                .bind(user_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_open_issues(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM media_issue WHERE status = 'open'")
                .fetch_one(self.pool())
                .await?;

        Ok(count)
    }
}

#[derive(Debug, Clone)]
pub struct PostgresRecentlyViewedRepository {
    pool: PgPool,
}

impl PostgresRecentlyViewedRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<RecentlyViewed> {
        Ok(RecentlyViewed {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            media_type: parsed(row, "media_type")?,
            tmdb_id: column(row, "tmdb_id")?,
            title: column(row, "title")?,
            poster_path: column(row, "poster_path")?,
            viewed_at: column(row, "viewed_at")?,
        })
    }
}

#[async_trait]
impl RecentlyViewedRepository for PostgresRecentlyViewedRepository {
    async fn record_view(
        &self,
        user_id: i64,
        media_type: MediaKind,
        tmdb_id: i64,
        title: &str,
        poster_path: Option<&str>,
    ) -> Result<RecentlyViewed> {
        let row = sqlx::query(
            r#"
            INSERT INTO recently_viewed (user_id, media_type, tmdb_id, title, poster_path)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, media_type, tmdb_id) DO UPDATE SET
                title = EXCLUDED.title,
                poster_path = COALESCE(EXCLUDED.poster_path, recently_viewed.poster_path),
                viewed_at = NOW()
            RETURNING id, user_id, media_type, tmdb_id, title, poster_path, viewed_at
            "#,
        )
        .bind(user_id)
        .bind(media_type.as_str())
        .bind(tmdb_id)
        .bind(title)
        .bind(poster_path)
        .fetch_one(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        Self::map_row(&row)
    }

    async fn list_recent(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<RecentlyViewed>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, media_type, tmdb_id, title, poster_path, viewed_at
            FROM recently_viewed
            WHERE user_id = $1
            ORDER BY viewed_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit.clamp(1, 100))
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn clear_recent(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM recently_viewed WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    async fn trim_recent(&self, user_id: i64, keep: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM recently_viewed
            WHERE user_id = $1
              AND id NOT IN (
                  SELECT id FROM recently_viewed
                  WHERE user_id = $1
                  ORDER BY viewed_at DESC, id DESC
                  LIMIT $2
              )
            "#,
        )
        .bind(user_id)
        .bind(keep.max(0))
        .execute(self.pool())
        .await?;

        let trimmed = result.rows_affected();
        if trimmed > 0 {
            debug!(user_id, trimmed, "trimmed recently viewed history");
        }
        Ok(trimmed)
    }
}

#[derive(Debug, Clone)]
pub struct PostgresMediaListsRepository {
    pool: PgPool,
}

impl PostgresMediaListsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<MediaListItem> {
        Ok(MediaListItem {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            list_type: parsed(row, "list_type")?,
            media_type: parsed(row, "media_type")?,
            tmdb_id: column(row, "tmdb_id")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[async_trait]
impl MediaListsRepository for PostgresMediaListsRepository {
    async fn add_to_list(
        &self,
        user_id: i64,
        list_type: ListType,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_media_list (user_id, list_type, media_type, tmdb_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, list_type, media_type, tmdb_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(list_type.as_str())
        .bind(media_type.as_str())
        .bind(tmdb_id)
        .execute(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_list(
        &self,
        user_id: i64,
        list_type: ListType,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM user_media_list
            WHERE user_id = $1 AND list_type = $2 AND media_type = $3 AND tmdb_id = $4
            "#,
        )
        .bind(user_id)
        .bind(list_type.as_str())
        .bind(media_type.as_str())
        .bind(tmdb_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_items(
        &self,
        user_id: i64,
        list_type: ListType,
    ) -> Result<Vec<MediaListItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, list_type, media_type, tmdb_id, created_at
            FROM user_media_list
            WHERE user_id = $1 AND list_type = $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(list_type.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn list_membership(
        &self,
        user_id: i64,
        media_type: MediaKind,
        tmdb_ids: &[i64],
    ) -> Result<Vec<ListMembership>> {
        if tmdb_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT tmdb_id, list_type
            FROM user_media_list
            WHERE user_id = $1 AND media_type = $2 AND tmdb_id = ANY($3)
            "#,
        )
        .bind(user_id)
        .bind(media_type.as_str())
        .bind(tmdb_ids.to_vec())
        .fetch_all(self.pool())
        .await?;

        let mut found: HashMap<i64, (bool, bool)> = HashMap::new();
        for row in &rows {
            let tmdb_id: i64 = column(row, "tmdb_id")?;
            let list_type: ListType = parsed(row, "list_type")?;
            let entry = found.entry(tmdb_id).or_default();
            match list_type {
                ListType::Watchlist => entry.0 = true,
                ListType::Favorite => entry.1 = true,
            }
        }

        Ok(tmdb_ids
            .iter()
            .map(|tmdb_id| {
                let (watchlist, favorite) =
                    found.get(tmdb_id).copied().unwrap_or_default();
                ListMembership {
                    tmdb_id: *tmdb_id,
                    watchlist,
                    favorite,
                }
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresDashboardSlidersRepository {
    pool: PgPool,
}

impl PostgresDashboardSlidersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<DashboardSlider> {
        Ok(DashboardSlider {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            slider_type: column(row, "slider_type")?,
            title: column(row, "title")?,
            data: column(row, "data")?,
            enabled: column(row, "enabled")?,
            position: column(row, "position")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }
}

#[async_trait]
impl DashboardSlidersRepository for PostgresDashboardSlidersRepository {
    async fn list_sliders(&self, user_id: i64) -> Result<Vec<DashboardSlider>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, slider_type, title, data, enabled, position,
                   created_at, updated_at
            FROM user_dashboard_slider
            WHERE user_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn upsert_slider(
        &self,
        user_id: i64,
        slider: DashboardSliderInput,
    ) -> Result<DashboardSlider> {
        if slider.slider_type.trim().is_empty() || slider.title.trim().is_empty() {
            return Err(SeerrError::InvalidInput(
                "dashboard sliders need a type and a title".into(),
            ));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO user_dashboard_slider
                (user_id, slider_type, title, data, enabled, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, slider_type, title) DO UPDATE SET
                data = EXCLUDED.data,
                enabled = EXCLUDED.enabled,
                position = EXCLUDED.position,
                updated_at = NOW()
            RETURNING id, user_id, slider_type, title, data, enabled, position,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(slider.slider_type.trim())
        .bind(slider.title.trim())
        .bind(slider.data)
        .bind(slider.enabled)
        .bind(slider.position)
        .fetch_one(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        Self::map_row(&row)
    }

    async fn delete_slider(&self, user_id: i64, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM user_dashboard_slider WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reorder_sliders(
        &self,
        user_id: i64,
        ordered_ids: &[i64],
    ) -> Result<()> {
        if ordered_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;

        let owned: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT id)
            FROM user_dashboard_slider
            WHERE user_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(ordered_ids.to_vec())
        .fetch_one(&mut *tx)
        .await?;

        let mut distinct = ordered_ids.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        if owned != distinct.len() as i64 || distinct.len() != ordered_ids.len() {
            if let Err(rollback) = tx.rollback().await {
                warn!(user_id, "failed to roll back slider reorder: {rollback}");
            }
            return Err(SeerrError::InvalidInput(format!(
                "slider order for user {user_id} contains unknown or repeated ids"
            )));
        }

        for (position, id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                r#"
                UPDATE user_dashboard_slider
                SET position = $3, updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                "#,
            )
            .bind(id)
            .bind(user_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(user_id, sliders = ordered_ids.len(), "reordered dashboard sliders");
        Ok(())
    }

    async fn reset_sliders(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_dashboard_slider WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
