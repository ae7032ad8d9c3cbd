//! PostgreSQL infrastructure adapters implementing the database ports.

pub mod repositories;

pub use repositories::approval_rules::PostgresApprovalRulesRepository;
pub use repositories::calendar::PostgresCalendarRepository;
pub use repositories::credentials::PostgresCredentialsRepository;
pub use repositories::jellyfin::PostgresJellyfinAvailabilityRepository;
pub use repositories::jobs::PostgresJobsRepository;
pub use repositories::media::{
    PostgresDashboardSlidersRepository, PostgresIssuesRepository,
    PostgresMediaListsRepository, PostgresRecentlyViewedRepository,
    PostgresSharesRepository,
};
pub use repositories::notifications::{
    PostgresNotificationEndpointsRepository,
    PostgresPushSubscriptionsRepository, PostgresUserNotificationsRepository,
};
pub use repositories::requests::PostgresRequestsRepository;
pub use repositories::sessions::PostgresSessionsRepository;
pub use repositories::settings::PostgresSettingsRepository;
pub use repositories::users::PostgresUsersRepository;
