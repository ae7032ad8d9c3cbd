use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::database::ports::requests::RequestUsageReadPort;
use crate::database::ports::users::UserLimitOverridesReadPort;
use crate::domain::requests::RequestType;
use crate::domain::settings::{RequestLimitStatus, keys};
use crate::error::{Result, SeerrError};
use crate::settings::SettingsStore;

/// Window length used when neither the user nor the settings name one.
pub const DEFAULT_LIMIT_DAYS: i64 = 7;

/// Resolves how many requests a user may still make.
///
/// The global limit comes from settings; non-null user overrides win. A
/// limit of 0 means unlimited and skips the usage count entirely.
pub struct RequestLimitService {
    settings: Arc<SettingsStore>,
    overrides: Arc<dyn UserLimitOverridesReadPort>,
    usage: Arc<dyn RequestUsageReadPort>,
}

impl fmt::Debug for RequestLimitService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLimitService")
            .field("settings", &self.settings)
            .field("overrides", &"Arc<dyn UserLimitOverridesReadPort>")
            .field("usage", &"Arc<dyn RequestUsageReadPort>")
            .finish()
    }
}

fn setting_keys(request_type: RequestType) -> (&'static str, &'static str) {
    match request_type {
        RequestType::Movie => {
            (keys::REQUEST_LIMIT_MOVIE, keys::REQUEST_LIMIT_MOVIE_DAYS)
        }
        RequestType::Episode => {
            (keys::REQUEST_LIMIT_SERIES, keys::REQUEST_LIMIT_SERIES_DAYS)
        }
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(0, i64::from(i32::MAX)) as i32
}

impl RequestLimitService {
    pub fn new(
        settings: Arc<SettingsStore>,
        overrides: Arc<dyn UserLimitOverridesReadPort>,
        usage: Arc<dyn RequestUsageReadPort>,
    ) -> Self {
        Self {
            settings,
            overrides,
            usage,
        }
    }

    pub async fn status(
        &self,
        user_id: i64,
        request_type: RequestType,
    ) -> Result<RequestLimitStatus> {
        let overrides = self
            .overrides
            .request_limit_overrides(user_id)
            .await?
            .ok_or_else(|| SeerrError::NotFound(format!("user {user_id}")))?;
        let (user_limit, user_days) = overrides.for_type(request_type);
        let (limit_key, days_key) = setting_keys(request_type);

        let limit = match user_limit {
            Some(limit) => limit,
            None => clamp_i32(self.settings.get_setting_int(limit_key, 0).await?),
        };
        if limit <= 0 {
            return Ok(RequestLimitStatus::unlimited());
        }

        let days = match user_days {
            Some(days) => days,
            None => clamp_i32(
                self.settings
                    .get_setting_int(days_key, DEFAULT_LIMIT_DAYS)
                    .await?,
            ),
        }
        .max(1);

        let since = Utc::now() - Duration::days(i64::from(days));
        let used = self
            .usage
            .count_user_requests_since(user_id, request_type, since)
            .await?;

        Ok(RequestLimitStatus::limited(limit, days, used))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::domain::users::RequestLimitOverrides;
    use crate::settings::tests::InMemorySettings;

    struct FixedOverrides(Option<RequestLimitOverrides>);

    #[async_trait]
    impl UserLimitOverridesReadPort for FixedOverrides {
        async fn request_limit_overrides(
            &self,
            _user_id: i64,
        ) -> Result<Option<RequestLimitOverrides>> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct CountingUsage {
        used: i64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RequestUsageReadPort for CountingUsage {
        async fn count_user_requests_since(
            &self,
            _user_id: i64,
            _request_type: RequestType,
            _since: DateTime<Utc>,
        ) -> Result<i64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.used)
        }
    }

    fn service(
        settings: &[(&str, &str)],
        overrides: RequestLimitOverrides,
        usage: Arc<CountingUsage>,
    ) -> RequestLimitService {
        let store = SettingsStore::new(Arc::new(InMemorySettings::with(settings)));
        RequestLimitService::new(
            Arc::new(store),
            Arc::new(FixedOverrides(Some(overrides))),
            usage,
        )
    }

    #[tokio::test]
    async fn zero_limit_is_unlimited_without_counting() {
        let usage = Arc::new(CountingUsage::default());
        let service = service(
            &[(keys::REQUEST_LIMIT_MOVIE, "0")],
            RequestLimitOverrides::default(),
            usage.clone(),
        );

        let status = service.status(1, RequestType::Movie).await.unwrap();
        assert!(status.unlimited);
        assert!(status.can_request);
        assert_eq!(usage.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn global_limit_applies_when_user_has_no_override() {
        let usage = Arc::new(CountingUsage {
            used: 3,
            ..CountingUsage::default()
        });
        let service = service(
            &[
                (keys::REQUEST_LIMIT_SERIES, "5"),
                (keys::REQUEST_LIMIT_SERIES_DAYS, "14"),
            ],
            RequestLimitOverrides::default(),
            usage.clone(),
        );

        let status = service.status(1, RequestType::Episode).await.unwrap();
        assert_eq!(status.limit, 5);
        assert_eq!(status.days, 14);
        assert_eq!(status.remaining, Some(2));
        assert!(status.can_request);
        assert_eq!(usage.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn user_override_beats_the_global_setting() {
        let usage = Arc::new(CountingUsage {
            used: 2,
            ..CountingUsage::default()
        });
        let overrides = RequestLimitOverrides {
            movie_limit: Some(2),
            movie_days: Some(3),
            ..RequestLimitOverrides::default()
        };
        let service = service(&[(keys::REQUEST_LIMIT_MOVIE, "10")], overrides, usage);

        let status = service.status(1, RequestType::Movie).await.unwrap();
        assert_eq!(status.limit, 2);
        assert_eq!(status.days, 3);
        assert_eq!(status.remaining, Some(0));
        assert!(!status.can_request);
    }

    #[tokio::test]
    async fn override_of_zero_lifts_a_global_limit() {
        let usage = Arc::new(CountingUsage::default());
        let overrides = RequestLimitOverrides {
            movie_limit: Some(0),
            ..RequestLimitOverrides::default()
        };
        let service =
            service(&[(keys::REQUEST_LIMIT_MOVIE, "10")], overrides, usage.clone());

        assert!(service.status(1, RequestType::Movie).await.unwrap().unlimited);
        assert_eq!(usage.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let store = SettingsStore::new(Arc::new(InMemorySettings::default()));
        let service = RequestLimitService::new(
            Arc::new(store),
            Arc::new(FixedOverrides(None)),
            Arc::new(CountingUsage::default()),
        );

        let err = service.status(42, RequestType::Movie).await.unwrap_err();
        assert!(matches!(err, SeerrError::NotFound(_)));
    }
}
