#![cfg(feature = "postgres-tests")]

use anyhow::Result;
use chrono::{Duration, Utc};
use seerr_core::database::infrastructure::postgres::{
    PostgresCredentialsRepository, PostgresJobsRepository,
    PostgresSessionsRepository, PostgresUsersRepository,
};
use seerr_core::database::ports::credentials::CredentialsRepository;
use seerr_core::database::ports::jobs::JobsRepository;
use seerr_core::database::ports::sessions::SessionsRepository;
use seerr_core::database::ports::users::{
    UserLimitOverridesReadPort, UsersRepository,
};
use seerr_core::domain::jobs::DEFAULT_JOBS;
use seerr_core::domain::users::{
    GroupSet, NewSession, NewWebAuthnCredential, RequestLimitOverrides,
    UserUpsert,
};
use seerr_core::{PostgresDatabase, SeerrError};
use sqlx::PgPool;

mod support;

use support::seed_user;

fn session(user_id: i64, jti: &str, expires_in: Duration) -> NewSession {
    NewSession {
        user_id,
        jti: jti.to_string(),
        expires_at: Utc::now() + expires_in,
        user_agent: Some("integration-test".into()),
        device_label: None,
        ip_address: Some("127.0.0.1".into()),
    }
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn login_upsert_replaces_groups_and_keeps_email(pool: PgPool) -> Result<()> {
    let users = PostgresUsersRepository::new(pool.clone());

    let first = users
        .upsert_user(UserUpsert {
            username: "dana".into(),
            groups: GroupSet::from_csv("admin,users"),
            email: Some("dana@example.test".into()),
        })
        .await?;
    assert!(first.is_admin());
    assert!(first.last_seen_at.is_some());

    let second = users
        .upsert_user(UserUpsert {
            username: "dana".into(),
            groups: GroupSet::from_csv("users"),
            email: None,
        })
        .await?;
    assert_eq!(second.id, first.id);
    assert!(!second.is_admin());
    assert_eq!(second.email.as_deref(), Some("dana@example.test"));
    // Within the throttle window the timestamp is not rewritten.
    assert_eq!(second.last_seen_at, first.last_seen_at);
    assert!(!users.touch_user_last_seen(first.id).await?);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn oidc_subject_links_to_one_account(pool: PgPool) -> Result<()> {
    let users = PostgresUsersRepository::new(pool.clone());
    let a = seed_user(&pool, "first").await?;
    let b = seed_user(&pool, "second").await?;

    users.link_oidc_subject(a.id, "sub-123").await?;
    let err = users.link_oidc_subject(b.id, "sub-123").await.unwrap_err();
    assert!(matches!(err, SeerrError::Conflict(_)));

    let found = users.get_user_by_oidc_sub("sub-123").await?.expect("linked");
    assert_eq!(found.id, a.id);

    assert_eq!(users.set_avatar(a.id, Some("/avatars/a.png")).await?, 1);
    assert_eq!(users.set_avatar(a.id, None).await?, 2);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn limit_overrides_round_trip(pool: PgPool) -> Result<()> {
    let users = PostgresUsersRepository::new(pool.clone());
    let user = seed_user(&pool, "limited").await?;

    let overrides = RequestLimitOverrides {
        movie_limit: Some(3),
        movie_days: Some(7),
        series_limit: None,
        series_days: Some(14),
    };
    assert!(users.set_request_limits(user.id, overrides).await?);
    assert_eq!(users.request_limit_overrides(user.id).await?, Some(overrides));
    assert_eq!(users.request_limit_overrides(user.id + 1000).await?, None);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn duplicate_jti_is_recorded_once(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "sessions").await?;
    let sessions = PostgresSessionsRepository::new(pool.clone());

    assert!(sessions.create_session(session(user.id, "jti-1", Duration::hours(1))).await?);
    assert!(!sessions.create_session(session(user.id, "jti-1", Duration::hours(2))).await?);

    let rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM user_session WHERE jti = 'jti-1'")
            .fetch_one(&pool)
            .await?;
    assert_eq!(rows, 1);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn touch_ignores_revoked_and_expired_sessions(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "toucher").await?;
    let sessions = PostgresSessionsRepository::new(pool.clone());

    sessions.create_session(session(user.id, "live", Duration::hours(1))).await?;
    sessions.create_session(session(user.id, "revoked", Duration::hours(1))).await?;
    sessions.create_session(session(user.id, "expired", -Duration::minutes(5))).await?;
    assert!(sessions.revoke_session("revoked").await?);

    assert!(sessions.touch_session("live").await?);
    assert!(!sessions.touch_session("revoked").await?);
    assert!(!sessions.touch_session("expired").await?);
    assert!(sessions.get_active_session_by_jti("expired").await?.is_none());

    let active = sessions.list_user_sessions(user.id).await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].jti, "live");

    assert_eq!(sessions.purge_stale_sessions().await?, 2);
    assert!(sessions.get_session_by_jti("revoked").await?.is_none());

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn revoke_other_sessions_keeps_the_current_one(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "multi").await?;
    let sessions = PostgresSessionsRepository::new(pool.clone());

    for jti in ["phone", "laptop", "tv"] {
        sessions.create_session(session(user.id, jti, Duration::days(1))).await?;
    }

    assert_eq!(sessions.revoke_other_sessions(user.id, "laptop").await?, 2);
    let remaining = sessions.list_user_sessions(user.id).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].jti, "laptop");

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn credential_counters_only_move_forward(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "passkey").await?;
    let credentials = PostgresCredentialsRepository::new(pool.clone());

    credentials
        .add_credential(NewWebAuthnCredential {
            user_id: user.id,
            credential_id: "cred-1".into(),
            public_key: vec![1, 2, 3],
            counter: 5,
            transports: vec!["usb".into()],
            name: Some("YubiKey".into()),
        })
        .await?;

    assert!(!credentials.update_credential_counter("cred-1", 5).await?);
    assert!(!credentials.update_credential_counter("cred-1", 3).await?);
    assert!(credentials.update_credential_counter("cred-1", 6).await?);

    let stored = credentials.get_credential("cred-1").await?.expect("stored");
    assert_eq!(stored.counter, 6);
    assert!(stored.last_used_at.is_some());

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn challenges_are_single_use(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "challenger").await?;
    let credentials = PostgresCredentialsRepository::new(pool.clone());
    let expires_at = Utc::now() + Duration::minutes(5);

    credentials
        .save_challenge(Some(user.id), "abc", "register", expires_at)
        .await?;
    assert!(credentials.consume_challenge("abc", "login").await?.is_none());
    assert!(credentials.consume_challenge("abc", "register").await?.is_some());
    assert!(credentials.consume_challenge("abc", "register").await?.is_none());

    credentials
        .save_challenge(None, "old", "login", Utc::now() - Duration::minutes(1))
        .await?;
    assert!(credentials.consume_challenge("old", "login").await?.is_none());
    assert_eq!(credentials.purge_expired_auth_artifacts().await?, 1);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn repeated_job_failures_trip_the_breaker(pool: PgPool) -> Result<()> {
    let db = PostgresDatabase::from_pool(pool.clone());
    db.initialize_schema().await?;
    let jobs = PostgresJobsRepository::new(pool.clone());
    assert_eq!(jobs.list_jobs().await?.len(), DEFAULT_JOBS.len());

    let next = Some(Utc::now() + Duration::minutes(5));
    let first = jobs.record_job_failure("request-sync", "timeout", 3, next).await?;
    assert!(first.enabled);
    assert_eq!(first.failure_count, 1);

    jobs.record_job_failure("request-sync", "timeout", 3, next).await?;
    let tripped = jobs
        .record_job_failure("request-sync", "connection refused", 3, next)
        .await?;
    assert!(!tripped.enabled);
    assert_eq!(tripped.failure_count, 3);
    let reason = tripped.disabled_reason.as_deref().unwrap_or_default();
    assert!(reason.contains("3 consecutive failures"), "{reason}");
    assert!(reason.contains("connection refused"), "{reason}");

    // A late success resets failure state but does not re-enable the job.
    assert!(jobs.update_job_run("request-sync", Utc::now(), next).await?);
    let after_run = jobs.get_job("request-sync").await?.expect("job exists");
    assert!(!after_run.enabled);
    assert_eq!(after_run.failure_count, 0);

    let enabled = jobs.set_job_enabled("request-sync", true).await?;
    assert!(enabled.enabled);
    assert!(enabled.disabled_reason.is_none());

    let missing = jobs.set_job_enabled("no-such-job", true).await.unwrap_err();
    assert!(matches!(missing, SeerrError::NotFound(_)));

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn seeding_twice_leaves_existing_rows_alone(pool: PgPool) -> Result<()> {
    let jobs = PostgresJobsRepository::new(pool.clone());

    assert_eq!(jobs.seed_default_jobs(DEFAULT_JOBS).await?, DEFAULT_JOBS.len() as u64);
    jobs.update_job_schedule("weekly-digest", "0 10 * * 1", 604_800, None)
        .await?;
    assert_eq!(jobs.seed_default_jobs(DEFAULT_JOBS).await?, 0);

    let digest = jobs.get_job("weekly-digest").await?.expect("seeded");
    assert_eq!(digest.schedule, "0 10 * * 1");

    let due = jobs.list_due_jobs(Utc::now()).await?;
    assert!(due.iter().all(|job| job.is_due_at(Utc::now())));

    Ok(())
}
