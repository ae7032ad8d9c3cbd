use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgRow};
use tracing::{info, warn};

use super::{column, parsed};
use crate::database::ports::jellyfin::JellyfinAvailabilityRepository;
use crate::domain::MediaKind;
use crate::domain::jellyfin::{
    AvailabilityUpsert, JellyfinAvailability, JellyfinItemUpsert, JellyfinScan,
};
use crate::error::{Result, SeerrError};

const AVAILABILITY_COLUMNS: &str = r#"
    id, jellyfin_item_id, media_type, tmdb_id, tvdb_id, title, season, episode,
    library_id, first_seen_at, last_seen_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresJellyfinAvailabilityRepository {
    pool: PgPool,
}

impl PostgresJellyfinAvailabilityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<JellyfinAvailability> {
        Ok(JellyfinAvailability {
            id: column(row, "id")?,
            jellyfin_item_id: column(row, "jellyfin_item_id")?,
            media_type: parsed(row, "media_type")?,
            tmdb_id: column(row, "tmdb_id")?,
            tvdb_id: column(row, "tvdb_id")?,
            title: column(row, "title")?,
            season: column(row, "season")?,
            episode: column(row, "episode")?,
            library_id: column(row, "library_id")?,
            first_seen_at: column(row, "first_seen_at")?,
            last_seen_at: column(row, "last_seen_at")?,
        })
    }

    fn map_scan(row: &PgRow) -> Result<JellyfinScan> {
        Ok(JellyfinScan {
            id: column(row, "id")?,
            started_at: column(row, "started_at")?,
            finished_at: column(row, "finished_at")?,
            items_scanned: column(row, "items_scanned")?,
            items_added: column(row, "items_added")?,
            error: column(row, "error")?,
        })
    }
}

#[async_trait]
impl JellyfinAvailabilityRepository for PostgresJellyfinAvailabilityRepository {
    async fn upsert_availability(
        &self,
        item: JellyfinItemUpsert,
    ) -> Result<AvailabilityUpsert> {
        if item.jellyfin_item_id.trim().is_empty() {
            return Err(SeerrError::InvalidInput(
                "jellyfin item id must not be empty".into(),
            ));
        }

        // xmax is zero only for rows this statement inserted.
        let row = sqlx::query(
            r#"
            INSERT INTO jellyfin_availability
                (jellyfin_item_id, media_type, tmdb_id, tvdb_id, title, season, episode, library_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (jellyfin_item_id) DO UPDATE SET
                media_type = EXCLUDED.media_type,
                tmdb_id = EXCLUDED.tmdb_id,
                tvdb_id = EXCLUDED.tvdb_id,
                title = EXCLUDED.title,
                season = EXCLUDED.season,
                episode = EXCLUDED.episode,
                library_id = EXCLUDED.library_id,
                last_seen_at = NOW()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(&item.jellyfin_item_id)
        .bind(item.media_type.as_str())
        .bind(item.tmdb_id)
        .bind(item.tvdb_id)
        .bind(&item.title)
        .bind(item.season)
        .bind(item.episode)
        .bind(&item.library_id)
        .fetch_one(self.pool())
        .await?;

        Ok(AvailabilityUpsert {
            id: column(&row, "id")?,
            inserted: column(&row, "inserted")?,
        })
    }

    async fn get_availability_by_tmdb(
        &self,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<Vec<JellyfinAvailability>> {
        let sql = format!(
            r#"
            SELECT {AVAILABILITY_COLUMNS}
            FROM jellyfin_availability
            WHERE media_type = $1 AND tmdb_id = $2
            ORDER BY season NULLS FIRST, episode NULLS FIRST, id
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(media_type.as_str())
            .bind(tmdb_id)
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn list_availability_by_tmdb_ids(
        &self,
        media_type: MediaKind,
        tmdb_ids: &[i64],
    ) -> Result<Vec<JellyfinAvailability>> {
        if tmdb_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT {AVAILABILITY_COLUMNS}
            FROM jellyfin_availability
            WHERE media_type = $1 AND tmdb_id = ANY($2)
            ORDER BY tmdb_id, season NULLS FIRST, episode NULLS FIRST, id
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(media_type.as_str())
            .bind(tmdb_ids.to_vec())
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn delete_stale_availability(
        &self,
        seen_before: DateTime<Utc>,
    ) -> Result<u64> {
        let removed =
            sqlx::query("DELETE FROM jellyfin_availability WHERE last_seen_at < $1")
                .bind(seen_before)
                .execute(self.pool())
                .await?
                .rows_affected();

        if removed > 0 {
            info!(removed, "removed jellyfin items missing from the last scan");
        }
        Ok(removed)
    }

    async fn start_scan(&self) -> Result<JellyfinScan> {
        let row = sqlx::query(
            r#"
            INSERT INTO jellyfin_scan_log DEFAULT VALUES
            RETURNING id, started_at, finished_at, items_scanned, items_added, error
            "#,
        )
        .fetch_one(self.pool())
        .await?;

        Self::map_scan(&row)
    }

    async fn finish_scan(
        &self,
        scan_id: i64,
        items_scanned: i32,
        items_added: i32,
        error: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jellyfin_scan_log
            SET finished_at = NOW(), items_scanned = $2, items_added = $3, error = $4
            WHERE id = $1 AND finished_at IS NULL
            "#,
        )
        .bind(scan_id)
        .bind(items_scanned)
        .bind(items_added)
        .bind(error)
        .execute(self.pool())
        .await?;

        match error {
            Some(error) => warn!(scan_id, items_scanned, error, "jellyfin scan failed"),
            None => info!(scan_id, items_scanned, items_added, "jellyfin scan finished"),
        }
        Ok(result.rows_affected() > 0)
    }

    async fn latest_scan(&self) -> Result<Option<JellyfinScan>> {
        let row = sqlx::query(
            r#"
            SELECT id, started_at, finished_at, items_scanned, items_added, error
            FROM jellyfin_scan_log
            ORDER BY started_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| Self::map_scan(&row)).transpose()
    }
}
