use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use crate::database::infrastructure::postgres::{
    PostgresApprovalRulesRepository, PostgresCalendarRepository,
    PostgresCredentialsRepository, PostgresDashboardSlidersRepository,
    PostgresIssuesRepository, PostgresJellyfinAvailabilityRepository,
    PostgresJobsRepository, PostgresMediaListsRepository,
    PostgresNotificationEndpointsRepository,
    PostgresPushSubscriptionsRepository, PostgresRecentlyViewedRepository,
    PostgresRequestsRepository, PostgresSessionsRepository,
    PostgresSettingsRepository, PostgresSharesRepository,
    PostgresUserNotificationsRepository, PostgresUsersRepository,
};
use crate::database::ports::{
    approval_rules::ApprovalRulesRepository,
    calendar::CalendarRepository,
    credentials::CredentialsRepository,
    jellyfin::JellyfinAvailabilityRepository,
    jobs::JobsRepository,
    media::{
        DashboardSlidersRepository, IssuesRepository, MediaListsRepository,
        RecentlyViewedRepository, SharesRepository,
    },
    notifications::{
        NotificationEndpointsRepository, PushSubscriptionsRepository,
        UserNotificationsRepository,
    },
    requests::{RequestUsageReadPort, RequestsRepository},
    sessions::SessionsRepository,
    settings::SettingsRepository,
    users::{UserLimitOverridesReadPort, UsersRepository},
};
use crate::database::postgres::PostgresDatabase;

/// Aggregates every repository port used by application services.
///
/// Callers hold the ports they need; tests build one from fakes through
/// [`AppUnitOfWorkBuilder`].
#[derive(Clone)]
pub struct AppUnitOfWork {
    pub requests: Arc<dyn RequestsRepository>,
    pub request_usage: Arc<dyn RequestUsageReadPort>,

    pub users: Arc<dyn UsersRepository>,
    pub user_limits: Arc<dyn UserLimitOverridesReadPort>,
    pub sessions: Arc<dyn SessionsRepository>,
    pub credentials: Arc<dyn CredentialsRepository>,

    pub settings: Arc<dyn SettingsRepository>,
    pub jobs: Arc<dyn JobsRepository>,
    pub approval_rules: Arc<dyn ApprovalRulesRepository>,

    pub notification_endpoints: Arc<dyn NotificationEndpointsRepository>,
    pub user_notifications: Arc<dyn UserNotificationsRepository>,
    pub push_subscriptions: Arc<dyn PushSubscriptionsRepository>,

    pub shares: Arc<dyn SharesRepository>,
    pub issues: Arc<dyn IssuesRepository>,
    pub recently_viewed: Arc<dyn RecentlyViewedRepository>,
    pub media_lists: Arc<dyn MediaListsRepository>,
    pub dashboard_sliders: Arc<dyn DashboardSlidersRepository>,
    pub calendar: Arc<dyn CalendarRepository>,
    pub jellyfin: Arc<dyn JellyfinAvailabilityRepository>,
}

impl fmt::Debug for AppUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppUnitOfWork")
            .field("requests", &type_name_of_val(self.requests.as_ref()))
            .field(
                "request_usage",
                &type_name_of_val(self.request_usage.as_ref()),
            )
            .field("users", &type_name_of_val(self.users.as_ref()))
            .field("user_limits", &type_name_of_val(self.user_limits.as_ref()))
            .field("sessions", &type_name_of_val(self.sessions.as_ref()))
            .field("credentials", &type_name_of_val(self.credentials.as_ref()))
            .field("settings", &type_name_of_val(self.settings.as_ref()))
            .field("jobs", &type_name_of_val(self.jobs.as_ref()))
            .field(
                "approval_rules",
                &type_name_of_val(self.approval_rules.as_ref()),
            )
            .field(
                "notification_endpoints",
                &type_name_of_val(self.notification_endpoints.as_ref()),
            )
            .field(
                "user_notifications",
                &type_name_of_val(self.user_notifications.as_ref()),
            )
            .field(
                "push_subscriptions",
                &type_name_of_val(self.push_subscriptions.as_ref()),
            )
            .field("shares", &type_name_of_val(self.shares.as_ref()))
            .field("issues", &type_name_of_val(self.issues.as_ref()))
            .field(
                "recently_viewed",
                &type_name_of_val(self.recently_viewed.as_ref()),
            )
            .field("media_lists", &type_name_of_val(self.media_lists.as_ref()))
            .field(
                "dashboard_sliders",
                &type_name_of_val(self.dashboard_sliders.as_ref()),
            )
            .field("calendar", &type_name_of_val(self.calendar.as_ref()))
            .field("jellyfin", &type_name_of_val(self.jellyfin.as_ref()))
            .finish()
    }
}

#[derive(Default)]
pub struct AppUnitOfWorkBuilder {
    requests: Option<Arc<dyn RequestsRepository>>,
    request_usage: Option<Arc<dyn RequestUsageReadPort>>,

    users: Option<Arc<dyn UsersRepository>>,
    user_limits: Option<Arc<dyn UserLimitOverridesReadPort>>,
    sessions: Option<Arc<dyn SessionsRepository>>,
    credentials: Option<Arc<dyn CredentialsRepository>>,

    settings: Option<Arc<dyn SettingsRepository>>,
    jobs: Option<Arc<dyn JobsRepository>>,
    approval_rules: Option<Arc<dyn ApprovalRulesRepository>>,

    notification_endpoints: Option<Arc<dyn NotificationEndpointsRepository>>,
    user_notifications: Option<Arc<dyn UserNotificationsRepository>>,
    push_subscriptions: Option<Arc<dyn PushSubscriptionsRepository>>,

    shares: Option<Arc<dyn SharesRepository>>,
    issues: Option<Arc<dyn IssuesRepository>>,
    recently_viewed: Option<Arc<dyn RecentlyViewedRepository>>,
    media_lists: Option<Arc<dyn MediaListsRepository>>,
    dashboard_sliders: Option<Arc<dyn DashboardSlidersRepository>>,
    calendar: Option<Arc<dyn CalendarRepository>>,
    jellyfin: Option<Arc<dyn JellyfinAvailabilityRepository>>,
}

impl fmt::Debug for AppUnitOfWorkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppUnitOfWorkBuilder")
            .field("requests", &self.requests.is_some())
            .field("request_usage", &self.request_usage.is_some())
            .field("users", &self.users.is_some())
            .field("user_limits", &self.user_limits.is_some())
            .field("sessions", &self.sessions.is_some())
            .field("credentials", &self.credentials.is_some())
            .field("settings", &self.settings.is_some())
            .field("jobs", &self.jobs.is_some())
            .field("approval_rules", &self.approval_rules.is_some())
            .field(
                "notification_endpoints",
                &self.notification_endpoints.is_some(),
            )
            .field("user_notifications", &self.user_notifications.is_some())
            .field("push_subscriptions", &self.push_subscriptions.is_some())
            .field("shares", &self.shares.is_some())
            .field("issues", &self.issues.is_some())
            .field("recently_viewed", &self.recently_viewed.is_some())
            .field("media_lists", &self.media_lists.is_some())
            .field("dashboard_sliders", &self.dashboard_sliders.is_some())
            .field("calendar", &self.calendar.is_some())
            .field("jellyfin", &self.jellyfin.is_some())
            .finish()
    }
}

fn required<T: ?Sized>(slot: Option<Arc<T>>, name: &str) -> Result<Arc<T>, String> {
    slot.ok_or_else(|| format!("missing {name}"))
}

impl AppUnitOfWorkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_requests(mut self, repo: Arc<dyn RequestsRepository>) -> Self {
        self.requests = Some(repo);
        self
    }
    pub fn with_request_usage(
        mut self,
        repo: Arc<dyn RequestUsageReadPort>,
    ) -> Self {
        self.request_usage = Some(repo);
        self
    }
    pub fn with_users(mut self, repo: Arc<dyn UsersRepository>) -> Self {
        self.users = Some(repo);
        self
    }
    pub fn with_user_limits(
        mut self,
        repo: Arc<dyn UserLimitOverridesReadPort>,
    ) -> Self {
        self.user_limits = Some(repo);
        self
    }
    pub fn with_sessions(mut self, repo: Arc<dyn SessionsRepository>) -> Self {
        self.sessions = Some(repo);
        self
    }
    pub fn with_credentials(
        mut self,
        repo: Arc<dyn CredentialsRepository>,
    ) -> Self {
        self.credentials = Some(repo);
        self
    }
    pub fn with_settings(mut self, repo: Arc<dyn SettingsRepository>) -> Self {
        self.settings = Some(repo);
        self
    }
    pub fn with_jobs(mut self, repo: Arc<dyn JobsRepository>) -> Self {
        self.jobs = Some(repo);
        self
    }
    pub fn with_approval_rules(
        mut self,
        repo: Arc<dyn ApprovalRulesRepository>,
    ) -> Self {
        self.approval_rules = Some(repo);
        self
    }
    pub fn with_notification_endpoints(
        mut self,
        repo: Arc<dyn NotificationEndpointsRepository>,
    ) -> Self {
        self.notification_endpoints = Some(repo);
        self
    }
    pub fn with_user_notifications(
        mut self,
        repo: Arc<dyn UserNotificationsRepository>,
    ) -> Self {
        self.user_notifications = Some(repo);
        self
    }
    pub fn with_push_subscriptions(
        mut self,
        repo: Arc<dyn PushSubscriptionsRepository>,
    ) -> Self {
        self.push_subscriptions = Some(repo);
        self
    }
    pub fn with_shares(mut self, repo: Arc<dyn SharesRepository>) -> Self {
        self.shares = Some(repo);
        self
    }
    pub fn with_issues(mut self, repo: Arc<dyn IssuesRepository>) -> Self {
        self.issues = Some(repo);
        self
    }
    pub fn with_recently_viewed(
        mut self,
        repo: Arc<dyn RecentlyViewedRepository>,
    ) -> Self {
        self.recently_viewed = Some(repo);
        self
    }
    pub fn with_media_lists(
        mut self,
        repo: Arc<dyn MediaListsRepository>,
    ) -> Self {
        self.media_lists = Some(repo);
        self
    }
    pub fn with_dashboard_sliders(
        mut self,
        repo: Arc<dyn DashboardSlidersRepository>,
    ) -> Self {
        self.dashboard_sliders = Some(repo);
        self
    }
    pub fn with_calendar(mut self, repo: Arc<dyn CalendarRepository>) -> Self {
        self.calendar = Some(repo);
        self
    }
    pub fn with_jellyfin(
        mut self,
        repo: Arc<dyn JellyfinAvailabilityRepository>,
    ) -> Self {
        self.jellyfin = Some(repo);
        self
    }

    /// Returns a string error naming the first missing port.
    pub fn build(self) -> Result<AppUnitOfWork, String> {
        Ok(AppUnitOfWork {
            requests: required(self.requests, "RequestsRepository")?,
            request_usage: required(self.request_usage, "RequestUsageReadPort")?,
            users: required(self.users, "UsersRepository")?,
            user_limits: required(self.user_limits, "UserLimitOverridesReadPort")?,
            sessions: required(self.sessions, "SessionsRepository")?,
            credentials: required(self.credentials, "CredentialsRepository")?,
            settings: required(self.settings, "SettingsRepository")?,
            jobs: required(self.jobs, "JobsRepository")?,
            approval_rules: required(self.approval_rules, "ApprovalRulesRepository")?,
            notification_endpoints: required(
                self.notification_endpoints,
                "NotificationEndpointsRepository",
            )?,
            user_notifications: required(
                self.user_notifications,
                "UserNotificationsRepository",
            )?,
            push_subscriptions: required(
                self.push_subscriptions,
                "PushSubscriptionsRepository",
            )?,
            shares: required(self.shares, "SharesRepository")?,
            issues: required(self.issues, "IssuesRepository")?,
            recently_viewed: required(self.recently_viewed, "RecentlyViewedRepository")?,
            media_lists: required(self.media_lists, "MediaListsRepository")?,
            dashboard_sliders: required(
                self.dashboard_sliders,
                "DashboardSlidersRepository",
            )?,
            calendar: required(self.calendar, "CalendarRepository")?,
            jellyfin: required(self.jellyfin, "JellyfinAvailabilityRepository")?,
        })
    }

    /// Populate the builder with Postgres-backed adapters over one pool.
    pub fn with_postgres(
        mut self,
        db: &PostgresDatabase,
        last_seen_throttle_minutes: i32,
    ) -> Self {
        let pool = db.pool().clone();

        let requests = Arc::new(PostgresRequestsRepository::new(pool.clone()));
        self.requests = Some(requests.clone());
        self.request_usage = Some(requests);

        let users = Arc::new(
            PostgresUsersRepository::new(pool.clone())
                .with_last_seen_throttle(last_seen_throttle_minutes),
        );
        self.users = Some(users.clone());
        self.user_limits = Some(users);

        self.sessions = Some(Arc::new(PostgresSessionsRepository::new(pool.clone())));
        self.credentials =
            Some(Arc::new(PostgresCredentialsRepository::new(pool.clone())));
        self.settings = Some(Arc::new(PostgresSettingsRepository::new(pool.clone())));
        self.jobs = Some(Arc::new(PostgresJobsRepository::new(pool.clone())));
        self.approval_rules =
            Some(Arc::new(PostgresApprovalRulesRepository::new(pool.clone())));

        self.notification_endpoints = Some(Arc::new(
            PostgresNotificationEndpointsRepository::new(pool.clone()),
        ));
        self.user_notifications = Some(Arc::new(
            PostgresUserNotificationsRepository::new(pool.clone()),
        ));
        self.push_subscriptions = Some(Arc::new(
            PostgresPushSubscriptionsRepository::new(pool.clone()),
        ));

        self.shares = Some(Arc::new(PostgresSharesRepository::new(pool.clone())));
        self.issues = Some(Arc::new(PostgresIssuesRepository::new(pool.clone())));
        self.recently_viewed =
            Some(Arc::new(PostgresRecentlyViewedRepository::new(pool.clone())));
        self.media_lists =
            Some(Arc::new(PostgresMediaListsRepository::new(pool.clone())));
        self.dashboard_sliders =
            Some(Arc::new(PostgresDashboardSlidersRepository::new(pool.clone())));
        self.calendar = Some(Arc::new(PostgresCalendarRepository::new(pool.clone())));
        self.jellyfin =
            Some(Arc::new(PostgresJellyfinAvailabilityRepository::new(pool)));

        self
    }
}

impl AppUnitOfWork {
    /// Compose all Postgres-backed repositories into a unit of work.
    pub fn from_postgres(
        db: &PostgresDatabase,
        last_seen_throttle_minutes: i32,
    ) -> Result<Self, String> {
        AppUnitOfWorkBuilder::new()
            .with_postgres(db, last_seen_throttle_minutes)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_names_the_first_missing_port() {
        let err = AppUnitOfWorkBuilder::new().build().unwrap_err();
        assert_eq!(err, "missing RequestsRepository");
    }
}
