use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::jobs::{Job, JobDefinition};
use crate::error::Result;

#[async_trait]
pub trait JobsRepository: Send + Sync {
    async fn list_jobs(&self) -> Result<Vec<Job>>;
    async fn get_job(&self, name: &str) -> Result<Option<Job>>;
    async fn update_job_schedule(
        &self,
        name: &str,
        schedule: &str,
        interval_seconds: i32,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<Job>;
    /// Enabling also clears `disabled_reason` and the failure counter.
    async fn set_job_enabled(&self, name: &str, enabled: bool) -> Result<Job>;
    /// Record a successful run: failure state is reset but a disabled job
    /// stays disabled.
    async fn update_job_run(
        &self,
        name: &str,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<bool>;
    /// Count a failed run; the job is disabled once `max_failures`
    /// consecutive failures accumulate.
    async fn record_job_failure(
        &self,
        name: &str,
        error: &str,
        max_failures: i32,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<Job>;
    async fn list_due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<Job>>;
    /// Insert missing definitions; existing rows are left alone.
    async fn seed_default_jobs(&self, jobs: &[JobDefinition]) -> Result<u64>;
}
