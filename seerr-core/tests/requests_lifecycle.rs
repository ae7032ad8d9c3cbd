#![cfg(feature = "postgres-tests")]
//! Request lifecycle against a live database: active-slot uniqueness,
//! transactional creates, paging and analytics.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{Duration, Utc};
use futures::future::{join, join_all};
use seerr_core::SeerrError;
use seerr_core::database::infrastructure::postgres::PostgresRequestsRepository;
use seerr_core::database::ports::requests::{
    RequestUsageReadPort, RequestsRepository,
};
use seerr_core::domain::requests::{
    AnalyticsRange, NewMediaRequest, RequestListFilter, RequestStatus,
    RequestType,
};
use sqlx::PgPool;

mod support;

use support::{count_requests_for, seed_admin, seed_user};

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn concurrent_movie_creates_leave_one_winner(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "racer").await?;
    let repo = PostgresRequestsRepository::new(pool.clone());

    const ATTEMPTS: usize = 8;
    let results = join_all((0..ATTEMPTS).map(|_| {
        let repo = repo.clone();
        let request = NewMediaRequest::movie(603, "The Matrix", user.id);
        async move { repo.create_request_with_items(request).await }
    }))
    .await;

    let winners: Vec<_> = results
        .iter()
        .filter_map(|result| result.as_ref().ok().copied())
        .collect();
    assert_eq!(winners.len(), 1, "exactly one create should succeed");
    let winner = winners[0];

    let mut conflicts = 0;
    for result in results {
        match result {
            Ok(_) => {}
            Err(SeerrError::ActiveRequestExists(conflict)) => {
                assert_eq!(conflict.request_type, RequestType::Movie);
                assert_eq!(conflict.tmdb_id, 603);
                assert_eq!(conflict.existing_request_id, Some(winner));
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(conflicts, ATTEMPTS - 1);
    assert_eq!(count_requests_for(&pool, 603).await?, 1);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn opposite_episode_orders_conflict_without_deadlock(
    pool: PgPool,
) -> Result<()> {
    let user = seed_user(&pool, "binger").await?;
    let repo = PostgresRequestsRepository::new(pool.clone());

    for tmdb_id in 200..215 {
        let forward = NewMediaRequest::episodes(tmdb_id, "Long Show", user.id, 1, 1..=40);
        let reversed =
            NewMediaRequest::episodes(tmdb_id, "Long Show", user.id, 1, (1..=40).rev());

        let (a, b) = join(
            repo.create_request_with_items(forward),
            repo.create_request_with_items(reversed),
        )
        .await;

        let (winner, loser) = match (a, b) {
            (Ok(id), Err(err)) | (Err(err), Ok(id)) => (id, err),
            (a, b) => panic!("expected one winner for tmdb {tmdb_id}: {a:?} / {b:?}"),
        };
        match loser {
            SeerrError::ActiveRequestExists(conflict) => {
                assert_eq!(conflict.request_type, RequestType::Episode);
                assert_eq!(conflict.existing_request_id, Some(winner));
            }
            other => panic!("expected an active request conflict, got {other}"),
        }
        assert_eq!(count_requests_for(&pool, tmdb_id).await?, 1);
    }

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn reactivated_episode_request_reclaims_its_slots(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "reviver").await?;
    let repo = PostgresRequestsRepository::new(pool.clone());

    let first = repo
        .create_request_with_items(NewMediaRequest::episodes(100, "Show", user.id, 1, [1]))
        .await?;
    assert!(repo.mark_request_status(first, RequestStatus::Failed).await?);
    assert!(repo.mark_request_status(first, RequestStatus::Queued).await?);

    let items = repo.list_request_items(first).await?;
    assert!(items.iter().all(|item| item.status == RequestStatus::Queued));

    let err = repo
        .create_request_with_items(NewMediaRequest::episodes(100, "Show", user.id, 1, [1]))
        .await
        .unwrap_err();
    match err {
        SeerrError::ActiveRequestExists(conflict) => {
            assert_eq!(conflict.existing_request_id, Some(first));
        }
        other => panic!("expected an active request conflict, got {other}"),
    }

    // Once another request holds the episode, the old one cannot come back.
    assert!(repo.mark_request_status(first, RequestStatus::Failed).await?);
    let second = repo
        .create_request_with_items(NewMediaRequest::episodes(100, "Show", user.id, 1, [1]))
        .await?;
    let err = repo
        .mark_request_status(first, RequestStatus::Queued)
        .await
        .unwrap_err();
    assert!(matches!(err, SeerrError::Conflict(_)));

    let holders: HashSet<_> = repo
        .list_active_episode_request_items_by_tmdb(100)
        .await?
        .iter()
        .map(|item| item.request_id)
        .collect();
    assert_eq!(holders, HashSet::from([second]));

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn overlapping_episode_request_rolls_back_entirely(
    pool: PgPool,
) -> Result<()> {
    let user = seed_user(&pool, "viewer").await?;
    let repo = PostgresRequestsRepository::new(pool.clone());

    let first = repo
        .create_request_with_items(NewMediaRequest::episodes(
            100,
            "Show",
            user.id,
            1,
            [1, 2],
        ))
        .await?;

    let err = repo
        .create_request_with_items(NewMediaRequest::episodes(
            100,
            "Show",
            user.id,
            1,
            [3, 1],
        ))
        .await
        .unwrap_err();
    match err {
        SeerrError::ActiveRequestExists(conflict) => {
            assert_eq!(conflict.existing_request_id, Some(first));
        }
        other => panic!("expected an active request conflict, got {other}"),
    }

    // Neither the request row nor the S1E3 item of the failed create remain.
    assert_eq!(count_requests_for(&pool, 100).await?, 1);
    let season = repo.find_active_episode_request_items(100, 1).await?;
    let episodes: HashSet<_> = season.iter().map(|item| item.episode).collect();
    assert_eq!(episodes, HashSet::from([1, 2]));

    repo.create_request_with_items(NewMediaRequest::episodes(
        100,
        "Show",
        user.id,
        1,
        [3],
    ))
    .await?;
    assert_eq!(
        repo.list_active_episode_request_items_by_tmdb(100).await?.len(),
        3
    );

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn leaving_the_active_set_releases_the_slot(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "retry").await?;
    let repo = PostgresRequestsRepository::new(pool.clone());

    let first = repo
        .create_request_with_items(NewMediaRequest::movie(27205, "Inception", user.id))
        .await?;
    assert!(repo.mark_request_status(first, RequestStatus::Failed).await?);

    let items = repo.list_request_items(first).await?;
    assert!(items.iter().all(|item| item.status == RequestStatus::Failed));

    let second = repo
        .create_request_with_items(NewMediaRequest::movie(27205, "Inception", user.id))
        .await?;
    let active = repo
        .find_active_request_by_tmdb(RequestType::Movie, 27205)
        .await?
        .expect("second request holds the slot");
    assert_eq!(active.id, second);

    // The failed request cannot come back while the new one is active.
    let err = repo
        .mark_request_status(first, RequestStatus::Queued)
        .await
        .unwrap_err();
    assert!(matches!(err, SeerrError::Conflict(_)));

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn final_status_is_applied_inside_the_create(pool: PgPool) -> Result<()> {
    let user = seed_admin(&pool, "approver").await?;
    let repo = PostgresRequestsRepository::new(pool.clone());

    let mut request = NewMediaRequest::episodes(1399, "Thrones", user.id, 2, [1, 2]);
    request.final_status = Some(RequestStatus::Submitted);
    let id = repo.create_request_with_items(request).await?;

    let stored = repo.get_request(id).await?.expect("request exists");
    assert_eq!(stored.request.status, RequestStatus::Submitted);
    assert_eq!(stored.items.len(), 2);
    assert!(
        stored
            .items
            .iter()
            .all(|item| item.status == RequestStatus::Submitted)
    );

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn transitions_follow_the_pipeline(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "pipeline").await?;
    let repo = PostgresRequestsRepository::new(pool.clone());
    let id = repo
        .create_request_with_items(NewMediaRequest::movie(550, "Fight Club", user.id))
        .await?;

    let previous = repo
        .transition_request_status(id, RequestStatus::Submitted)
        .await?;
    assert_eq!(previous, RequestStatus::Queued);
    repo.transition_request_status(id, RequestStatus::Downloading)
        .await?;

    let err = repo
        .transition_request_status(id, RequestStatus::Queued)
        .await
        .unwrap_err();
    assert!(matches!(err, SeerrError::InvalidInput(_)));

    let missing = repo
        .transition_request_status(uuid::Uuid::new_v4(), RequestStatus::Denied)
        .await
        .unwrap_err();
    assert!(matches!(missing, SeerrError::NotFound(_)));

    let reconcile = repo.list_requests_for_reconciliation(10).await?;
    assert_eq!(reconcile.len(), 1);
    assert_eq!(reconcile[0].request.status, RequestStatus::Downloading);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn paging_reports_the_full_total(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "pager").await?;
    let repo = PostgresRequestsRepository::new(pool.clone());

    for tmdb_id in 1..=25 {
        repo.create_request_with_items(NewMediaRequest::movie(
            tmdb_id,
            format!("Movie {tmdb_id}"),
            user.id,
        ))
        .await?;
    }

    let page = repo
        .list_requests_paged(RequestListFilter::page(10, 20))
        .await?;
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.total, 25);
    assert!(!page.has_more());
    assert!(
        page.items
            .iter()
            .all(|summary| summary.requested_by_username == "pager")
    );

    let filtered = repo
        .list_requests_paged(RequestListFilter {
            statuses: vec![RequestStatus::Denied],
            ..RequestListFilter::default()
        })
        .await?;
    assert_eq!(filtered.total, 0);
    assert!(filtered.items.is_empty());

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn analytics_and_usage_counts(pool: PgPool) -> Result<()> {
    let alice = seed_user(&pool, "alice").await?;
    let bob = seed_user(&pool, "bob").await?;
    let repo = PostgresRequestsRepository::new(pool.clone());

    let denied = repo
        .create_request_with_items(NewMediaRequest::movie(1, "One", alice.id))
        .await?;
    repo.create_request_with_items(NewMediaRequest::movie(2, "Two", alice.id))
        .await?;
    repo.create_request_with_items(NewMediaRequest::movie(3, "Three", bob.id))
        .await?;
    repo.create_request_with_items(NewMediaRequest::episodes(
        10, "Ten", alice.id, 1, [1],
    ))
    .await?;
    repo.create_request_with_items(NewMediaRequest::episodes(
        11, "Eleven", bob.id, 1, [1, 2],
    ))
    .await?;
    repo.transition_request_status(denied, RequestStatus::Denied)
        .await?;

    let analytics = repo.get_request_analytics(AnalyticsRange::default()).await?;
    assert_eq!(analytics.total_requests, 5);
    assert_eq!(analytics.movie_requests, 3);
    assert_eq!(analytics.tv_requests, 2);
    assert_eq!(analytics.status_count(RequestStatus::Denied), 1);
    assert_eq!(analytics.status_count(RequestStatus::Queued), 4);
    assert_eq!(analytics.top_requesters[0].username, "alice");
    assert_eq!(analytics.top_requesters[0].count, 3);
    assert_eq!(analytics.daily.len(), 30);
    assert_eq!(analytics.daily.iter().map(|day| day.count).sum::<i64>(), 5);
    assert!(analytics.average_approval_hours.is_none());

    let since = Utc::now() - Duration::days(7);
    assert_eq!(
        repo.count_user_requests_since(alice.id, RequestType::Movie, since)
            .await?,
        1,
        "denied requests do not count against the limit"
    );
    assert_eq!(
        repo.count_user_requests_since(bob.id, RequestType::Episode, since)
            .await?,
        1
    );

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn comments_carry_the_author(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "commenter").await?;
    let repo = PostgresRequestsRepository::new(pool.clone());
    let id = repo
        .create_request_with_items(NewMediaRequest::movie(680, "Pulp Fiction", user.id))
        .await?;

    repo.add_request_comment(id, user.id, "please add subtitles")
        .await?;
    let comments = repo.list_request_comments(id).await?;
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].username, "commenter");

    assert!(!repo.delete_request_for_user(id, user.id + 1).await?);
    assert!(repo.delete_request_for_user(id, user.id).await?);
    assert!(repo.list_request_comments(id).await?.is_empty());

    Ok(())
}
