use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction, postgres::PgRow};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{column, not_found_on_foreign_key, parsed};
use crate::database::ports::requests::{
    RequestUsageReadPort, RequestsRepository,
};
use crate::domain::Page;
use crate::domain::requests::{
    ActiveRequestRef, AnalyticsRange, DailyRequestCount, EpisodeRequestStatus,
    MediaRequest, MediaRequestSummary, MediaRequestWithItems, NewMediaRequest,
    RequestAnalytics, RequestComment, RequestItem, RequestListFilter,
    RequestStatus, RequestType, StatusCount, TopRequester,
};
use crate::error::{ActiveRequestExistsError, Result, SeerrError};

/// Partial unique index holding one active request per movie.
pub const ACTIVE_MOVIE_KEY: &str = "media_request_active_movie_key";
/// Partial unique index holding one active item per episode.
pub const ACTIVE_EPISODE_KEY: &str = "request_item_active_episode_key";

const ANALYTICS_DAYS: i64 = 30;
const TOP_REQUESTERS: i64 = 10;

#[derive(Debug, Clone)]
pub struct PostgresRequestsRepository {
    pool: PgPool,
}

impl PostgresRequestsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_request(row: &PgRow) -> Result<MediaRequest> {
        Ok(MediaRequest {
            id: column(row, "id")?,
            request_type: parsed(row, "request_type")?,
            tmdb_id: column(row, "tmdb_id")?,
            title: column(row, "title")?,
            status: parsed(row, "status")?,
            requested_by: column(row, "requested_by")?,
            poster_path: column(row, "poster_path")?,
            backdrop_path: column(row, "backdrop_path")?,
            release_year: column(row, "release_year")?,
            created_at: column(row, "created_at")?,
        })
    }

    fn map_item(row: &PgRow) -> Result<RequestItem> {
        Ok(RequestItem {
            id: column(row, "id")?,
            request_id: column(row, "request_id")?,
            provider: parsed(row, "provider")?,
            provider_id: column(row, "provider_id")?,
            season: column(row, "season")?,
            episode: column(row, "episode")?,
            status: parsed(row, "status")?,
            created_at: column(row, "created_at")?,
        })
    }

    fn map_active_ref(row: &PgRow) -> Result<ActiveRequestRef> {
        Ok(ActiveRequestRef {
            id: column(row, "id")?,
            request_type: parsed(row, "request_type")?,
            tmdb_id: column(row, "tmdb_id")?,
            status: parsed(row, "status")?,
            requested_by: column(row, "requested_by")?,
        })
    }

    fn map_episode_status(row: &PgRow) -> Result<EpisodeRequestStatus> {
        Ok(EpisodeRequestStatus {
            request_id: column(row, "request_id")?,
            item_id: column(row, "item_id")?,
            season: column(row, "season")?,
            episode: column(row, "episode")?,
            status: parsed(row, "status")?,
        })
    }

    fn map_comment(row: &PgRow) -> Result<RequestComment> {
        Ok(RequestComment {
            id: column(row, "id")?,
            request_id: column(row, "request_id")?,
            user_id: column(row, "user_id")?,
            username: column(row, "username")?,
            body: column(row, "body")?,
            created_at: column(row, "created_at")?,
        })
    }

    async fn insert_request_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        request: &NewMediaRequest,
    ) -> Result<()> {
        let initial = request.initial_status();

        sqlx::query(
            r#"
            INSERT INTO media_request (
                id, request_type, tmdb_id, title, requested_by, status,
                poster_path, backdrop_path, release_year
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(request.request_type.as_str())
        .bind(request.tmdb_id)
        .bind(request.title.trim())
        .bind(request.requested_by)
        .bind(initial.as_str())
        .bind(request.poster_path.as_deref())
        .bind(request.backdrop_path.as_deref())
        .bind(request.release_year)
        .execute(&mut **tx)
        .await?;

        for item in request.items_in_lock_order() {
            sqlx::query(
                r#"
                INSERT INTO request_item (
                    request_id, tmdb_id, provider, provider_id, season, episode, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(request.tmdb_id)
            .bind(item.provider.as_str())
            .bind(item.provider_id)
            .bind(item.season)
            .bind(item.episode)
            .bind(initial.as_str())
            .execute(&mut **tx)
            .await?;
        }

        if let Some(final_status) = request.pending_final_status() {
            Self::apply_status_tx(tx, id, final_status, true).await?;
        }

        Ok(())
    }

    /// Write `status` on the request and propagate it to the items. With
    /// `all_items` every item follows. Otherwise still-active items follow a
    /// request leaving the active set, and items left in the old status
    /// follow a request coming back into it, reclaiming their episode slots.
    async fn apply_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: RequestStatus,
        all_items: bool,
    ) -> Result<bool> {
        let previous: Option<String> = sqlx::query_scalar(
            "SELECT status FROM media_request WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(previous) = previous else {
            return Ok(false);
        };
        let previous: RequestStatus = previous.parse()?;

        sqlx::query("UPDATE media_request SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut **tx)
            .await?;

        if all_items {
            sqlx::query(
                "UPDATE request_item SET status = $2 WHERE request_id = $1",
            )
            .bind(id)
            .bind(status.as_str())
            .execute(&mut **tx)
            .await?;
        } else if !status.is_active() {
            sqlx::query(
                r#"
                UPDATE request_item
                SET status = $2
                WHERE request_id = $1 AND status = ANY($3)
                "#,
            )
            .bind(id)
            .bind(status.as_str())
            .bind(RequestStatus::active_names())
            .execute(&mut **tx)
            .await?;
        } else if !previous.is_active() {
            sqlx::query(
                r#"
                UPDATE request_item
                SET status = $2
                WHERE request_id = $1 AND status = $3
                "#,
            )
            .bind(id)
            .bind(status.as_str())
            .bind(previous.as_str())
            .execute(&mut **tx)
            .await?;
        }

        Ok(true)
    }

    /// Build the conflict error for a create that hit an active-request
    /// index. The holder's id is looked up on the pool after the failed
    /// transaction has released its connection.
    async fn active_request_conflict(
        &self,
        request: &NewMediaRequest,
    ) -> SeerrError {
        let lookup = match request.request_type {
            RequestType::Movie => self
                .find_active_request_by_tmdb(RequestType::Movie, request.tmdb_id)
                .await
                .map(|found| found.map(|r| r.id)),
            RequestType::Episode => {
                self.find_conflicting_episode_request(
                    request.tmdb_id,
                    &request.episode_pairs(),
                )
                .await
            }
        };

        let existing_request_id = match lookup {
            Ok(id) => id,
            Err(err) => {
                warn!(
                    tmdb_id = request.tmdb_id,
                    error = %err,
                    "failed to look up the conflicting active request"
                );
                None
            }
        };

        info!(
            request_type = %request.request_type,
            tmdb_id = request.tmdb_id,
            existing_request_id = ?existing_request_id,
            "active request already exists"
        );

        ActiveRequestExistsError {
            request_type: request.request_type,
            tmdb_id: request.tmdb_id,
            existing_request_id,
        }
        .into()
    }

    async fn find_conflicting_episode_request(
        &self,
        tmdb_id: i64,
        pairs: &[(i32, i32)],
    ) -> Result<Option<Uuid>> {
        let (seasons, episodes): (Vec<i32>, Vec<i32>) =
            pairs.iter().copied().unzip();

        let row = sqlx::query(
            r#"
            SELECT r.id
            FROM request_item i
            JOIN media_request r ON r.id = i.request_id
            WHERE i.tmdb_id = $1
              AND i.status = ANY($2)
              AND (i.season, i.episode) IN (
                  SELECT s, e FROM UNNEST($3::int4[], $4::int4[]) AS pair(s, e)
              )
            ORDER BY r.created_at
            LIMIT 1
            "#,
        )
        .bind(tmdb_id)
        .bind(RequestStatus::active_names())
        .bind(seasons)
        .bind(episodes)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| column(&row, "id")).transpose()
    }

    fn is_active_slot_violation(err: &SeerrError) -> bool {
        err.is_unique_violation()
            && matches!(
                err.constraint(),
                Some(ACTIVE_MOVIE_KEY) | Some(ACTIVE_EPISODE_KEY)
            )
    }

    async fn items_for_requests(
        &self,
        request_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<RequestItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, request_id, provider, provider_id, season, episode, status, created_at
            FROM request_item
            WHERE request_id = ANY($1)
            ORDER BY request_id, season NULLS FIRST, episode NULLS FIRST, id
            "#,
        )
        .bind(request_ids.to_vec())
        .fetch_all(self.pool())
        .await?;

        let mut grouped: HashMap<Uuid, Vec<RequestItem>> = HashMap::new();
        for row in &rows {
            let item = Self::map_item(row)?;
            grouped.entry(item.request_id).or_default().push(item);
        }
        Ok(grouped)
    }

    fn conflict_on_reactivation(err: SeerrError, id: Uuid) -> SeerrError {
        if Self::is_active_slot_violation(&err) {
            SeerrError::Conflict(format!(
                "request {id} cannot become active: another active request holds the media"
            ))
        } else {
            err
        }
    }
}

#[async_trait]
impl RequestsRepository for PostgresRequestsRepository {
    async fn create_request_with_items(
        &self,
        request: NewMediaRequest,
    ) -> Result<Uuid> {
        request.validate()?;

        let id = Uuid::new_v4();
        let mut tx = self.pool().begin().await?;

        if let Err(err) = Self::insert_request_tx(&mut tx, id, &request).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    request_id = %id,
                    error = %rollback_err,
                    "rollback of failed request create failed"
                );
            }
            // A deadlock here can only come from competing slot claims.
            if Self::is_active_slot_violation(&err) || err.is_deadlock() {
                return Err(self.active_request_conflict(&request).await);
            }
            warn!(request_id = %id, error = %err, "request create failed");
            return Err(err);
        }

        if let Err(err) = tx.commit().await {
            let err = SeerrError::from(err);
            if Self::is_active_slot_violation(&err) || err.is_deadlock() {
                return Err(self.active_request_conflict(&request).await);
            }
            return Err(err);
        }

        info!(
            request_id = %id,
            request_type = %request.request_type,
            tmdb_id = request.tmdb_id,
            items = request.items.len(),
            "created media request"
        );
        Ok(id)
    }

    async fn find_active_request_by_tmdb(
        &self,
        request_type: RequestType,
        tmdb_id: i64,
    ) -> Result<Option<ActiveRequestRef>> {
        let row = sqlx::query(
            r#"
            SELECT id, request_type, tmdb_id, status, requested_by
            FROM media_request
            WHERE request_type = $1 AND tmdb_id = $2 AND status = ANY($3)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(request_type.as_str())
        .bind(tmdb_id)
        .bind(RequestStatus::active_names())
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| Self::map_active_ref(&row)).transpose()
    }

    async fn find_active_requests_by_tmdb_ids(
        &self,
        request_type: RequestType,
        tmdb_ids: &[i64],
    ) -> Result<Vec<ActiveRequestRef>> {
        if tmdb_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (tmdb_id)
                id, request_type, tmdb_id, status, requested_by
            FROM media_request
            WHERE request_type = $1 AND tmdb_id = ANY($2) AND status = ANY($3)
            ORDER BY tmdb_id, created_at DESC
            "#,
        )
        .bind(request_type.as_str())
        .bind(tmdb_ids.to_vec())
        .bind(RequestStatus::active_names())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_active_ref).collect()
    }

    async fn find_active_episode_request_items(
        &self,
        tmdb_id: i64,
        season: i32,
    ) -> Result<Vec<EpisodeRequestStatus>> {
        let rows = sqlx::query(
            r#"
            SELECT request_id, id AS item_id, season, episode, status
            FROM request_item
            WHERE tmdb_id = $1 AND season = $2 AND status = ANY($3)
            ORDER BY episode
            "#,
        )
        .bind(tmdb_id)
        .bind(season)
        .bind(RequestStatus::active_names())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_episode_status).collect()
    }

    async fn list_active_episode_request_items_by_tmdb(
        &self,
        tmdb_id: i64,
    ) -> Result<Vec<EpisodeRequestStatus>> {
        let rows = sqlx::query(
            r#"
            SELECT request_id, id AS item_id, season, episode, status
            FROM request_item
            WHERE tmdb_id = $1 AND season IS NOT NULL AND status = ANY($2)
            ORDER BY season, episode
            "#,
        )
        .bind(tmdb_id)
        .bind(RequestStatus::active_names())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_episode_status).collect()
    }

    async fn list_requests_paged(
        &self,
        filter: RequestListFilter,
    ) -> Result<Page<MediaRequestSummary>> {
        let (limit, offset) = filter.normalized();
        let statuses = RequestStatus::names(&filter.statuses);
        let request_type = filter.request_type.map(|t| t.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM media_request r
            WHERE (cardinality($1::text[]) = 0 OR r.status = ANY($1))
              AND ($2::text IS NULL OR r.request_type = $2)
              AND ($3::bigint IS NULL OR r.requested_by = $3)
            "#,
        )
        .bind(&statuses)
        .bind(request_type)
        .bind(filter.requested_by)
        .fetch_one(self.pool())
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT
                r.id, r.request_type, r.tmdb_id, r.title, r.status, r.requested_by,
                r.poster_path, r.backdrop_path, r.release_year, r.created_at,
                u.username AS requested_by_username,
                (SELECT COUNT(*) FROM request_item i WHERE i.request_id = r.id) AS item_count
            FROM media_request r
            JOIN app_user u ON u.id = r.requested_by
            WHERE (cardinality($1::text[]) = 0 OR r.status = ANY($1))
              AND ($2::text IS NULL OR r.request_type = $2)
              AND ($3::bigint IS NULL OR r.requested_by = $3)
            ORDER BY r.created_at DESC, r.id
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&statuses)
        .bind(request_type)
        .bind(filter.requested_by)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        let items = rows
            .iter()
            .map(|row| {
                Ok(MediaRequestSummary {
                    request: Self::map_request(row)?,
                    requested_by_username: column(row, "requested_by_username")?,
                    item_count: column(row, "item_count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    async fn get_request(
        &self,
        id: Uuid,
    ) -> Result<Option<MediaRequestWithItems>> {
        let row = sqlx::query(
            r#"
            SELECT id, request_type, tmdb_id, title, status, requested_by,
                   poster_path, backdrop_path, release_year, created_at
            FROM media_request
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let request = Self::map_request(&row)?;
        let items = self.list_request_items(id).await?;
        Ok(Some(MediaRequestWithItems { request, items }))
    }

    async fn list_request_items(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<RequestItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, request_id, provider, provider_id, season, episode, status, created_at
            FROM request_item
            WHERE request_id = $1
            ORDER BY season NULLS FIRST, episode NULLS FIRST, id
            "#,
        )
        .bind(request_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_item).collect()
    }

    async fn list_requests_for_reconciliation(
        &self,
        limit: i64,
    ) -> Result<Vec<MediaRequestWithItems>> {
        let mut statuses = RequestStatus::active_names();
        statuses.push(RequestStatus::Downloading.as_str().to_string());

        let rows = sqlx::query(
            r#"
            SELECT id, request_type, tmdb_id, title, status, requested_by,
                   poster_path, backdrop_path, release_year, created_at
            FROM media_request
            WHERE status = ANY($1)
            ORDER BY created_at, id
            LIMIT $2
            "#,
        )
        .bind(statuses)
        .bind(limit.max(1))
        .fetch_all(self.pool())
        .await?;

        let requests = rows
            .iter()
            .map(Self::map_request)
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<Uuid> = requests.iter().map(|r| r.id).collect();
        let mut items = self.items_for_requests(&ids).await?;

        debug!(count = requests.len(), "loaded requests for reconciliation");

        Ok(requests
            .into_iter()
            .map(|request| {
                let items = items.remove(&request.id).unwrap_or_default();
                MediaRequestWithItems { request, items }
            })
            .collect())
    }

    async fn mark_request_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> Result<bool> {
        let mut tx = self.pool().begin().await?;
        let updated = match Self::apply_status_tx(&mut tx, id, status, false).await {
            Ok(updated) => updated,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(request_id = %id, error = %rollback_err, "rollback failed");
                }
                return Err(Self::conflict_on_reactivation(err, id));
            }
        };
        tx.commit()
            .await
            .map_err(|e| Self::conflict_on_reactivation(e.into(), id))?;

        if updated {
            debug!(request_id = %id, %status, "request status updated");
        }
        Ok(updated)
    }

    async fn transition_request_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> Result<RequestStatus> {
        let mut tx = self.pool().begin().await?;

        let current: Option<String> = sqlx::query_scalar(
            "SELECT status FROM media_request WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Err(SeerrError::NotFound(format!("request {id}")));
        };
        let current: RequestStatus = current.parse()?;

        if !current.can_transition_to(status) {
            return Err(SeerrError::InvalidInput(format!(
                "request {id} cannot move from {current} to {status}"
            )));
        }

        if let Err(err) = Self::apply_status_tx(&mut tx, id, status, false).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(request_id = %id, error = %rollback_err, "rollback failed");
            }
            return Err(Self::conflict_on_reactivation(err, id));
        }
        tx.commit()
            .await
            .map_err(|e| Self::conflict_on_reactivation(e.into(), id))?;

        info!(request_id = %id, from = %current, to = %status, "request transitioned");
        Ok(current)
    }

    async fn set_request_items_status(
        &self,
        request_id: Uuid,
        item_ids: Option<&[i64]>,
        status: RequestStatus,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE request_item
            SET status = $3
            WHERE request_id = $1
              AND ($2::bigint[] IS NULL OR id = ANY($2))
            "#,
        )
        .bind(request_id)
        .bind(item_ids.map(<[i64]>::to_vec))
        .bind(status.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| Self::conflict_on_reactivation(e.into(), request_id))?;

        Ok(result.rows_affected())
    }

    async fn set_request_items_provider_id(
        &self,
        request_id: Uuid,
        provider_id: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE request_item SET provider_id = $2 WHERE request_id = $1",
        )
        .bind(request_id)
        .bind(provider_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_request(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_request WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_request_for_user(
        &self,
        id: Uuid,
        user_id: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM media_request WHERE id = $1 AND requested_by = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_request_analytics(
        &self,
        range: AnalyticsRange,
    ) -> Result<RequestAnalytics> {
        let totals = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE request_type = 'movie') AS movies,
                COUNT(*) FILTER (WHERE request_type = 'episode') AS episodes
            FROM media_request
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(self.pool())
        .await?;

        let status_rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count
            FROM media_request
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool())
        .await?;

        let top_rows = sqlx::query(
            r#"
            SELECT u.id AS user_id, u.username, COUNT(r.id) AS count
            FROM media_request r
            JOIN app_user u ON u.id = r.requested_by
            WHERE ($1::timestamptz IS NULL OR r.created_at >= $1)
              AND ($2::timestamptz IS NULL OR r.created_at <= $2)
            GROUP BY u.id, u.username
            ORDER BY count DESC, u.username
            LIMIT $3
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(TOP_REQUESTERS)
        .fetch_all(self.pool())
        .await?;

        let last_day: NaiveDate =
            range.end.unwrap_or_else(Utc::now).date_naive();
        let daily_rows = sqlx::query(
            r#"
            WITH days AS (
                SELECT generate_series(
                    $3::date - ($4::int - 1),
                    $3::date,
                    INTERVAL '1 day'
                )::date AS day
            )
            SELECT d.day, COUNT(r.id) AS count
            FROM days d
            LEFT JOIN media_request r
                ON (r.created_at AT TIME ZONE 'UTC')::date = d.day
               AND ($1::timestamptz IS NULL OR r.created_at >= $1)
               AND ($2::timestamptz IS NULL OR r.created_at <= $2)
            GROUP BY d.day
            ORDER BY d.day
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(last_day)
        .bind(ANALYTICS_DAYS as i32)
        .fetch_all(self.pool())
        .await?;

        let average_approval_hours: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT (AVG(EXTRACT(EPOCH FROM (NOW() - created_at))) / 3600.0)::float8
            FROM media_request
            WHERE status = ANY($3)
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(RequestStatus::names(&RequestStatus::APPROVED))
        .fetch_one(self.pool())
        .await?;

        let by_status = status_rows
            .iter()
            .map(|row| {
                Ok(StatusCount {
                    status: parsed(row, "status")?,
                    count: column(row, "count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let top_requesters = top_rows
            .iter()
            .map(|row| {
                Ok(TopRequester {
                    user_id: column(row, "user_id")?,
                    username: column(row, "username")?,
                    count: column(row, "count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let daily = daily_rows
            .iter()
            .map(|row| {
                Ok(DailyRequestCount {
                    day: column(row, "day")?,
                    count: column(row, "count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RequestAnalytics {
            total_requests: column(&totals, "total")?,
            movie_requests: column(&totals, "movies")?,
            tv_requests: column(&totals, "episodes")?,
            by_status,
            top_requesters,
            daily,
            average_approval_hours,
        })
    }

    async fn add_request_comment(
        &self,
        request_id: Uuid,
        user_id: i64,
        body: &str,
    ) -> Result<RequestComment> {
        let body = body.trim();
        if body.is_empty() {
            return Err(SeerrError::InvalidInput(
                "comment body must not be empty".into(),
            ));
        }

        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO request_comment (request_id, user_id, body)
                VALUES ($1, $2, $3)
                RETURNING id, request_id, user_id, body, created_at
            )
            SELECT c.id, c.request_id, c.user_id, u.username, c.body, c.created_at
            FROM inserted c
            JOIN app_user u ON u.id = c.user_id
            "#,
        )
        .bind(request_id)
        .bind(user_id)
        .bind(body)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            not_found_on_foreign_key(e, || {
                format!("request {request_id} or user {user_id}")
            })
        })?;

        Self::map_comment(&row)
    }

    async fn list_request_comments(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<RequestComment>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.request_id, c.user_id, u.username, c.body, c.created_at
            FROM request_comment c
            JOIN app_user u ON u.id = c.user_id
            WHERE c.request_id = $1
            ORDER BY c.created_at, c.id
            "#,
        )
        .bind(request_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_comment).collect()
    }
}

#[async_trait]
impl RequestUsageReadPort for PostgresRequestsRepository {
    async fn count_user_requests_since(
        &self,
        user_id: i64,
        request_type: RequestType,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM media_request
            WHERE requested_by = $1
              AND request_type = $2
              AND created_at >= $3
              AND status <> $4
            "#,
        )
        .bind(user_id)
        .bind(request_type.as_str())
        .bind(since)
        .bind(RequestStatus::Denied.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::tests::database_error;

    #[test]
    fn only_the_active_indexes_count_as_slot_violations() {
        let is_slot = PostgresRequestsRepository::is_active_slot_violation;
        assert!(is_slot(&database_error("23505", Some(ACTIVE_MOVIE_KEY))));
        assert!(is_slot(&database_error("23505", Some(ACTIVE_EPISODE_KEY))));
        assert!(!is_slot(&database_error("23505", None)));
        assert!(!is_slot(&database_error("23505", Some("media_request_pkey"))));
        assert!(!is_slot(&database_error("40P01", None)));
    }

    #[test]
    fn reactivation_conflicts_name_the_request() {
        let id = Uuid::nil();
        let err = PostgresRequestsRepository::conflict_on_reactivation(
            database_error("23505", Some(ACTIVE_EPISODE_KEY)),
            id,
        );
        assert!(matches!(err, SeerrError::Conflict(msg) if msg.contains(&id.to_string())));

        let passthrough = PostgresRequestsRepository::conflict_on_reactivation(
            database_error("23505", None),
            id,
        );
        assert!(passthrough.is_unique_violation());
    }
}
