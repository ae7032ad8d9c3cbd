use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scheduled background job and its circuit-breaker state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub name: String,
    pub schedule: String,
    pub interval_seconds: i32,
    pub enabled: bool,
    pub run_on_start: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub failure_count: i32,
    pub last_error: Option<String>,
    pub disabled_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run.is_none_or(|next| next <= now)
    }
}

/// Seed row for the jobs table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDefinition {
    pub name: &'static str,
    pub schedule: &'static str,
    pub interval_seconds: i32,
    pub run_on_start: bool,
}

pub const DEFAULT_JOBS: &[JobDefinition] = &[
    JobDefinition {
        name: "request-sync",
        schedule: "*/5 * * * *",
        interval_seconds: 300,
        run_on_start: true,
    },
    JobDefinition {
        name: "watchlist-sync",
        schedule: "*/15 * * * *",
        interval_seconds: 900,
        run_on_start: false,
    },
    JobDefinition {
        name: "jellyfin-availability-sync",
        schedule: "0 * * * *",
        interval_seconds: 3600,
        run_on_start: true,
    },
    JobDefinition {
        name: "session-cleanup",
        schedule: "0 3 * * *",
        interval_seconds: 86_400,
        run_on_start: false,
    },
    JobDefinition {
        name: "weekly-digest",
        schedule: "0 9 * * 1",
        interval_seconds: 604_800,
        run_on_start: false,
    },
    JobDefinition {
        name: "calendar-notifications",
        schedule: "0 8 * * *",
        interval_seconds: 86_400,
        run_on_start: false,
    },
];

/// Reason stored when the breaker trips.
pub fn disabled_reason(failures: i32, error: &str) -> String {
    format!("Disabled after {failures} consecutive failures. Last error: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_job_names_are_unique() {
        let names: HashSet<_> = DEFAULT_JOBS.iter().map(|job| job.name).collect();
        assert_eq!(names.len(), DEFAULT_JOBS.len());
        assert!(DEFAULT_JOBS.iter().all(|job| job.interval_seconds > 0));
    }

    #[test]
    fn disabled_reason_mentions_the_error() {
        let reason = disabled_reason(5, "connection refused");
        assert!(reason.contains("5 consecutive failures"));
        assert!(reason.ends_with("connection refused"));
    }
}
