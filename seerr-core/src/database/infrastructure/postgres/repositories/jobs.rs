use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgRow};
use tracing::{info, warn};

use super::column;
use crate::database::ports::jobs::JobsRepository;
use crate::domain::jobs::{Job, JobDefinition, disabled_reason};
use crate::error::{Result, SeerrError};

const JOB_COLUMNS: &str = r#"
    id, name, schedule, interval_seconds, enabled, run_on_start, last_run, next_run,
    failure_count, last_error, disabled_reason, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresJobsRepository {
    pool: PgPool,
}

impl PostgresJobsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<Job> {
        Ok(Job {
            id: column(row, "id")?,
            name: column(row, "name")?,
            schedule: column(row, "schedule")?,
            interval_seconds: column(row, "interval_seconds")?,
            enabled: column(row, "enabled")?,
            run_on_start: column(row, "run_on_start")?,
            last_run: column(row, "last_run")?,
            next_run: column(row, "next_run")?,
            failure_count: column(row, "failure_count")?,
            last_error: column(row, "last_error")?,
            disabled_reason: column(row, "disabled_reason")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }

    fn missing(name: &str) -> SeerrError {
        SeerrError::NotFound(format!("job {name}"))
    }
}

#[async_trait]
impl JobsRepository for PostgresJobsRepository {
    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY name");
        let rows = sqlx::query(&sql).fetch_all(self.pool()).await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn get_job(&self, name: &str) -> Result<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE name = $1");
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(self.pool())
            .await?;

        row.map(|row| Self::map_row(&row)).transpose()
    }

    async fn update_job_schedule(
        &self,
        name: &str,
        schedule: &str,
        interval_seconds: i32,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<Job> {
        if interval_seconds <= 0 {
            return Err(SeerrError::InvalidInput(format!(
                "job interval must be positive, got {interval_seconds}"
            )));
        }

        let sql = format!(
            r#"
            UPDATE jobs
            SET schedule = $2, interval_seconds = $3, next_run = $4, updated_at = NOW()
            WHERE name = $1
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(schedule)
            .bind(interval_seconds)
            .bind(next_run)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| Self::missing(name))?;

        Self::map_row(&row)
    }

    async fn set_job_enabled(&self, name: &str, enabled: bool) -> Result<Job> {
        let sql = format!(
            r#"
            UPDATE jobs SET
                enabled = $2,
                disabled_reason = CASE WHEN $2 THEN NULL ELSE disabled_reason END,
                failure_count = CASE WHEN $2 THEN 0 ELSE failure_count END,
                updated_at = NOW()
            WHERE name = $1
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(enabled)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| Self::missing(name))?;

        info!(job = name, enabled, "job toggled");
        Self::map_row(&row)
    }

    async fn update_job_run(
        &self,
        name: &str,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                last_run = $2,
                next_run = $3,
                failure_count = 0,
                last_error = NULL,
                updated_at = NOW()
            WHERE name = $1
            "#,
        )
        .bind(name)
        .bind(last_run)
        .bind(next_run)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_job_failure(
        &self,
        name: &str,
        error: &str,
        max_failures: i32,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<Job> {
        let max_failures = max_failures.max(1);
        let sql = format!(
            r#"
            UPDATE jobs SET
                failure_count = failure_count + 1,
                last_error = $2,
                next_run = $4,
                enabled = CASE WHEN failure_count + 1 >= $3 THEN FALSE ELSE enabled END,
                disabled_reason = CASE
                    WHEN failure_count + 1 >= $3 THEN $5
                    ELSE disabled_reason
                END,
                updated_at = NOW()
            WHERE name = $1
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(error)
            .bind(max_failures)
            .bind(next_run)
            .bind(disabled_reason(max_failures, error))
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| Self::missing(name))?;

        let job = Self::map_row(&row)?;
        if !job.enabled && job.failure_count >= max_failures {
            warn!(
                job = name,
                failures = job.failure_count,
                error,
                "job disabled after repeated failures"
            );
        }
        Ok(job)
    }

    async fn list_due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE enabled AND (next_run IS NULL OR next_run <= $1)
            ORDER BY next_run NULLS FIRST, name
            "#
        );
        let rows = sqlx::query(&sql).bind(now).fetch_all(self.pool()).await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn seed_default_jobs(&self, jobs: &[JobDefinition]) -> Result<u64> {
        let mut inserted = 0;
        for job in jobs {
            inserted += sqlx::query(
                r#"
                INSERT INTO jobs (name, schedule, interval_seconds, run_on_start)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(job.name)
            .bind(job.schedule)
            .bind(job.interval_seconds)
            .bind(job.run_on_start)
            .execute(self.pool())
            .await?
            .rows_affected();
        }

        if inserted > 0 {
            info!(inserted, "seeded default jobs");
        }
        Ok(inserted)
    }
}
