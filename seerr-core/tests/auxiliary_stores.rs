#![cfg(feature = "postgres-tests")]

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use seerr_core::database::infrastructure::postgres::{
    PostgresCalendarRepository, PostgresDashboardSlidersRepository,
    PostgresIssuesRepository, PostgresJellyfinAvailabilityRepository,
    PostgresMediaListsRepository, PostgresNotificationEndpointsRepository,
    PostgresRecentlyViewedRepository, PostgresSharesRepository,
    PostgresUserNotificationsRepository,
};
use seerr_core::database::ports::calendar::CalendarRepository;
use seerr_core::database::ports::jellyfin::JellyfinAvailabilityRepository;
use seerr_core::database::ports::media::{
    DashboardSlidersRepository, IssuesRepository, MediaListsRepository,
    RecentlyViewedRepository, SharesRepository,
};
use seerr_core::database::ports::notifications::{
    NotificationEndpointsRepository, UserNotificationsRepository,
};
use seerr_core::database::ports::requests::RequestsRepository;
use seerr_core::domain::MediaKind;
use seerr_core::domain::jellyfin::JellyfinItemUpsert;
use seerr_core::domain::media::{
    DashboardSliderInput, IssueStatus, ListType, NewMediaIssue, NewMediaShare,
};
use seerr_core::domain::notifications::{
    DiscordConfig, EndpointConfig, NewUserNotification, NotificationEvent,
    NotificationEndpointInput,
};
use seerr_core::domain::requests::{NewMediaRequest, RequestType};
use seerr_core::domain::settings::keys;
use seerr_core::{ContextOptions, DatabaseContext, PostgresDatabase, SeerrError};
use serde_json::json;
use sqlx::PgPool;

mod support;

use support::seed_user;

fn movie_item(item_id: &str, tmdb_id: i64) -> JellyfinItemUpsert {
    JellyfinItemUpsert {
        jellyfin_item_id: item_id.to_string(),
        media_type: MediaKind::Movie,
        tmdb_id: Some(tmdb_id),
        tvdb_id: None,
        title: format!("Movie {tmdb_id}"),
        season: None,
        episode: None,
        library_id: Some("movies".into()),
    }
}

fn slider(title: &str, position: i32) -> DashboardSliderInput {
    DashboardSliderInput {
        slider_type: "trending".into(),
        title: title.to_string(),
        data: None,
        enabled: true,
        position,
    }
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn availability_upsert_reports_inserts(pool: PgPool) -> Result<()> {
    let jellyfin = PostgresJellyfinAvailabilityRepository::new(pool.clone());

    let first = jellyfin.upsert_availability(movie_item("jf-1", 603)).await?;
    assert!(first.inserted);
    let again = jellyfin.upsert_availability(movie_item("jf-1", 603)).await?;
    assert!(!again.inserted);
    assert_eq!(again.id, first.id);

    jellyfin.upsert_availability(movie_item("jf-2", 604)).await?;
    let found = jellyfin
        .list_availability_by_tmdb_ids(MediaKind::Movie, &[603, 604, 605])
        .await?;
    assert_eq!(found.len(), 2);
    assert!(
        jellyfin
            .list_availability_by_tmdb_ids(MediaKind::Movie, &[])
            .await?
            .is_empty()
    );

    let cutoff = Utc::now() + Duration::seconds(1);
    assert_eq!(jellyfin.delete_stale_availability(cutoff).await?, 2);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn scan_log_finishes_once(pool: PgPool) -> Result<()> {
    let jellyfin = PostgresJellyfinAvailabilityRepository::new(pool.clone());

    let scan = jellyfin.start_scan().await?;
    assert!(scan.is_running());
    assert!(jellyfin.finish_scan(scan.id, 120, 4, None).await?);
    assert!(!jellyfin.finish_scan(scan.id, 0, 0, Some("late")).await?);

    let latest = jellyfin.latest_scan().await?.expect("scan recorded");
    assert!(latest.succeeded());
    assert_eq!(latest.items_scanned, 120);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn slider_reorder_is_all_or_nothing(pool: PgPool) -> Result<()> {
    let owner = seed_user(&pool, "owner").await?;
    let other = seed_user(&pool, "other").await?;
    let sliders = PostgresDashboardSlidersRepository::new(pool.clone());

    let a = sliders.upsert_slider(owner.id, slider("A", 0)).await?;
    let b = sliders.upsert_slider(owner.id, slider("B", 1)).await?;
    let c = sliders.upsert_slider(owner.id, slider("C", 2)).await?;
    let foreign = sliders.upsert_slider(other.id, slider("X", 0)).await?;

    sliders.reorder_sliders(owner.id, &[c.id, a.id, b.id]).await?;
    let titles: Vec<_> = sliders
        .list_sliders(owner.id)
        .await?
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(titles, ["C", "A", "B"]);

    let err = sliders
        .reorder_sliders(owner.id, &[a.id, foreign.id])
        .await
        .unwrap_err();
    assert!(matches!(err, SeerrError::InvalidInput(_)));
    let dupes = sliders
        .reorder_sliders(owner.id, &[a.id, a.id])
        .await
        .unwrap_err();
    assert!(matches!(dupes, SeerrError::InvalidInput(_)));

    let unchanged: Vec<_> = sliders
        .list_sliders(owner.id)
        .await?
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(unchanged, ["C", "A", "B"]);

    assert_eq!(sliders.reset_sliders(owner.id).await?, 3);
    assert_eq!(sliders.list_sliders(other.id).await?.len(), 1);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn list_membership_follows_input_order(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "collector").await?;
    let lists = PostgresMediaListsRepository::new(pool.clone());

    assert!(lists.add_to_list(user.id, ListType::Watchlist, MediaKind::Movie, 10).await?);
    assert!(!lists.add_to_list(user.id, ListType::Watchlist, MediaKind::Movie, 10).await?);
    lists.add_to_list(user.id, ListType::Favorite, MediaKind::Movie, 10).await?;
    lists.add_to_list(user.id, ListType::Favorite, MediaKind::Movie, 30).await?;
    lists.add_to_list(user.id, ListType::Watchlist, MediaKind::Tv, 20).await?;

    let membership = lists
        .list_membership(user.id, MediaKind::Movie, &[30, 20, 10])
        .await?;
    let ids: Vec<_> = membership.iter().map(|m| m.tmdb_id).collect();
    assert_eq!(ids, [30, 20, 10]);
    assert!(membership[0].favorite && !membership[0].watchlist);
    assert!(!membership[1].favorite && !membership[1].watchlist);
    assert!(membership[2].favorite && membership[2].watchlist);

    assert!(lists.remove_from_list(user.id, ListType::Watchlist, MediaKind::Movie, 10).await?);
    assert_eq!(lists.list_items(user.id, ListType::Watchlist).await?.len(), 1);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn recently_viewed_keeps_one_row_per_title(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "browser").await?;
    let recent = PostgresRecentlyViewedRepository::new(pool.clone());

    for tmdb_id in 1..=5 {
        recent
            .record_view(user.id, MediaKind::Movie, tmdb_id, "Title", Some("/p.jpg"))
            .await?;
    }
    recent
        .record_view(user.id, MediaKind::Movie, 1, "Title", None)
        .await?;

    let listed = recent.list_recent(user.id, 10).await?;
    assert_eq!(listed.len(), 5);
    assert_eq!(listed[0].tmdb_id, 1);
    assert_eq!(listed[0].poster_path.as_deref(), Some("/p.jpg"));

    assert_eq!(recent.trim_recent(user.id, 3).await?, 2);
    assert_eq!(recent.list_recent(user.id, 10).await?.len(), 3);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn feed_tokens_are_stable_until_rotated(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "calendar").await?;
    let calendar = PostgresCalendarRepository::new(pool.clone());

    let prefs = calendar.get_preferences(user.id).await?;
    assert_eq!(prefs.default_view, "month");

    let first = calendar.get_or_create_feed_token(user.id).await?;
    let second = calendar.get_or_create_feed_token(user.id).await?;
    assert_eq!(first.token, second.token);

    let rotated = calendar.rotate_feed_token(user.id).await?;
    assert_ne!(rotated.token, first.token);
    assert_eq!(calendar.find_user_by_feed_token(&rotated.token).await?, Some(user.id));
    assert_eq!(calendar.find_user_by_feed_token(&first.token).await?, None);

    assert!(calendar.subscribe(user.id, "release", MediaKind::Tv, 1399).await?);
    assert!(!calendar.subscribe(user.id, "release", MediaKind::Tv, 1399).await?);
    assert_eq!(
        calendar.list_subscribers("release", MediaKind::Tv, 1399).await?,
        vec![user.id]
    );

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn expired_shares_are_hidden_and_purged(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "sharer").await?;
    let shares = PostgresSharesRepository::new(pool.clone());

    shares
        .upsert_share(NewMediaShare {
            token: "open".into(),
            created_by: user.id,
            media_type: MediaKind::Movie,
            tmdb_id: 603,
            expires_at: None,
        })
        .await?;
    shares
        .upsert_share(NewMediaShare {
            token: "stale".into(),
            created_by: user.id,
            media_type: MediaKind::Movie,
            tmdb_id: 604,
            expires_at: Some(Utc::now() - Duration::hours(1)),
        })
        .await?;

    assert!(shares.record_share_view("open").await?);
    assert!(shares.record_share_view("open").await?);
    let open = shares.get_active_share("open").await?.expect("active");
    assert_eq!(open.view_count, 2);
    assert!(shares.get_active_share("stale").await?.is_none());

    assert_eq!(shares.purge_expired_shares().await?, 1);
    assert_eq!(shares.list_user_shares(user.id).await?.len(), 1);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn issues_page_and_resolve(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "reporter").await?;
    let issues = PostgresIssuesRepository::new(pool.clone());

    let mut ids = Vec::new();
    for tmdb_id in 1..=3 {
        let issue = issues
            .create_issue(NewMediaIssue {
                reported_by: user.id,
                media_type: MediaKind::Tv,
                tmdb_id,
                title: "Show".into(),
                category: "audio".into(),
                description: "out of sync".into(),
                season: Some(1),
                episode: Some(2),
            })
            .await?;
        ids.push(issue.id);
    }

    assert!(issues.resolve_issue(ids[0]).await?);
    assert!(!issues.resolve_issue(ids[0]).await?);
    assert_eq!(issues.count_open_issues().await?, 2);

    let open = issues.list_issues(Some(IssueStatus::Open), 1, 0).await?;
    assert_eq!(open.total, 2);
    assert_eq!(open.items.len(), 1);
    assert!(open.has_more());

    assert!(issues.reopen_issue(ids[0]).await?);
    assert_eq!(issues.list_issues(None, 50, 0).await?.total, 3);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn endpoints_reach_global_and_granted_users(pool: PgPool) -> Result<()> {
    let granted = seed_user(&pool, "granted").await?;
    let outsider = seed_user(&pool, "outsider").await?;
    let endpoints = PostgresNotificationEndpointsRepository::new(pool.clone());

    let discord = |name: &str, is_global: bool| NotificationEndpointInput {
        name: name.to_string(),
        enabled: true,
        is_global,
        events: vec![NotificationEvent::RequestApproved],
        config: EndpointConfig::Discord(DiscordConfig {
            webhook_url: "https://discord.example/hook".into(),
            ..DiscordConfig::default()
        }),
    };

    endpoints.create_endpoint(discord("everyone", true)).await?;
    let private = endpoints.create_endpoint(discord("staff", false)).await?;
    let dup = endpoints.create_endpoint(discord("staff", false)).await.unwrap_err();
    assert!(matches!(dup, SeerrError::Conflict(_)));

    assert!(endpoints.grant_endpoint_access(granted.id, private.id).await?);
    assert!(!endpoints.grant_endpoint_access(granted.id, private.id).await?);

    assert_eq!(endpoints.list_endpoints_for_user(granted.id).await?.len(), 2);
    assert_eq!(endpoints.list_endpoints_for_user(outsider.id).await?.len(), 1);
    assert_eq!(
        endpoints
            .list_enabled_for_event(NotificationEvent::RequestApproved)
            .await?
            .len(),
        2
    );
    assert!(
        endpoints
            .list_enabled_for_event(NotificationEvent::IssueReported)
            .await?
            .is_empty()
    );

    let invalid = endpoints
        .create_endpoint(NotificationEndpointInput {
            config: EndpointConfig::Discord(DiscordConfig::default()),
            ..discord("broken", true)
        })
        .await
        .unwrap_err();
    assert!(matches!(invalid, SeerrError::InvalidInput(_)));

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn inbox_is_scoped_to_its_owner(pool: PgPool) -> Result<()> {
    let owner = seed_user(&pool, "reader").await?;
    let other = seed_user(&pool, "snoop").await?;
    let inbox = PostgresUserNotificationsRepository::new(pool.clone());

    let note = inbox
        .create_notification(NewUserNotification {
            user_id: owner.id,
            kind: "request_available".into(),
            title: "Ready".into(),
            message: "The Matrix is available".into(),
            link: Some("/movie/603".into()),
            metadata: json!({ "tmdb_id": 603 }),
        })
        .await?;

    assert_eq!(inbox.count_unread(owner.id).await?, 1);
    assert!(!inbox.mark_read(other.id, note.id).await?);
    assert!(inbox.mark_read(owner.id, note.id).await?);
    assert!(inbox.list_notifications(owner.id, true, 20).await?.is_empty());
    assert_eq!(inbox.list_notifications(owner.id, false, 20).await?.len(), 1);
    assert!(!inbox.delete_notification(other.id, note.id).await?);

    Ok(())
}

#[sqlx::test(migrator = "seerr_core::MIGRATOR")]
async fn context_resolves_limits_from_stored_settings(pool: PgPool) -> Result<()> {
    let user = seed_user(&pool, "quota").await?;
    let context = DatabaseContext::from_postgres(
        Arc::new(PostgresDatabase::from_pool(pool.clone())),
        ContextOptions::default(),
    )?;

    let unlimited = context.request_limits().status(user.id, RequestType::Movie).await?;
    assert!(unlimited.unlimited);

    context.settings().set_setting(keys::REQUEST_LIMIT_MOVIE, "2").await?;
    let uow = context.unit_of_work();
    uow.requests
        .create_request_with_items(NewMediaRequest::movie(603, "The Matrix", user.id))
        .await?;

    let status = context.request_limits().status(user.id, RequestType::Movie).await?;
    assert_eq!(status.limit, 2);
    assert_eq!(status.remaining, Some(1));
    assert!(status.can_request);

    let missing = context
        .request_limits()
        .status(user.id + 1000, RequestType::Movie)
        .await
        .unwrap_err();
    assert!(matches!(missing, SeerrError::NotFound(_)));

    Ok(())
}
