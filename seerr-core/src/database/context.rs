use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::application::request_limits::RequestLimitService;
use crate::application::unit_of_work::AppUnitOfWork;
use crate::database::infrastructure::postgres::repositories::users::DEFAULT_LAST_SEEN_THROTTLE_MINUTES;
use crate::database::postgres::{DatabaseSettings, PostgresDatabase};
use crate::error::{Result, SeerrError};
use crate::settings::{DEFAULT_SETTINGS_CACHE_TTL, SettingsStore};

/// Runtime knobs that shape the composed services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    pub last_seen_throttle_minutes: i32,
    pub settings_cache_ttl: Duration,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            last_seen_throttle_minutes: DEFAULT_LAST_SEEN_THROTTLE_MINUTES,
            settings_cache_ttl: DEFAULT_SETTINGS_CACHE_TTL,
        }
    }
}

/// Process-wide handle: the pool, every repository port, the settings cache
/// and the services built on them. Created once at startup and cloned into
/// callers.
#[derive(Clone)]
pub struct DatabaseContext {
    postgres: Arc<PostgresDatabase>,
    unit_of_work: Arc<AppUnitOfWork>,
    settings: Arc<SettingsStore>,
    request_limits: Arc<RequestLimitService>,
}

impl fmt::Debug for DatabaseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseContext")
            .field("postgres_ptr", &Arc::as_ptr(&self.postgres))
            .field("unit_of_work_ptr", &Arc::as_ptr(&self.unit_of_work))
            .field("settings", &self.settings)
            .finish()
    }
}

impl DatabaseContext {
    /// Connect to PostgreSQL and compose the default unit of work.
    pub async fn connect(
        settings: &DatabaseSettings,
        options: ContextOptions,
    ) -> Result<Self> {
        let postgres = Arc::new(PostgresDatabase::connect(settings).await?);
        Self::from_postgres(postgres, options)
    }

    /// Compose a context over an existing Postgres adapter.
    pub fn from_postgres(
        postgres: Arc<PostgresDatabase>,
        options: ContextOptions,
    ) -> Result<Self> {
        let unit_of_work = Arc::new(
            AppUnitOfWork::from_postgres(
                &postgres,
                options.last_seen_throttle_minutes,
            )
            .map_err(SeerrError::Internal)?,
        );
        Ok(Self::from_parts(postgres, unit_of_work, options))
    }

    /// Compose a context from an already-built unit of work (fakes in tests).
    pub fn from_parts(
        postgres: Arc<PostgresDatabase>,
        unit_of_work: Arc<AppUnitOfWork>,
        options: ContextOptions,
    ) -> Self {
        let settings = Arc::new(SettingsStore::with_ttl(
            unit_of_work.settings.clone(),
            options.settings_cache_ttl,
        ));
        let request_limits = Arc::new(RequestLimitService::new(
            settings.clone(),
            unit_of_work.user_limits.clone(),
            unit_of_work.request_usage.clone(),
        ));

        Self {
            postgres,
            unit_of_work,
            settings,
            request_limits,
        }
    }

    pub fn unit_of_work(&self) -> Arc<AppUnitOfWork> {
        Arc::clone(&self.unit_of_work)
    }

    pub fn postgres(&self) -> Arc<PostgresDatabase> {
        Arc::clone(&self.postgres)
    }

    pub fn settings(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.settings)
    }

    pub fn request_limits(&self) -> Arc<RequestLimitService> {
        Arc::clone(&self.request_limits)
    }

    pub fn into_parts(self) -> (Arc<PostgresDatabase>, Arc<AppUnitOfWork>) {
        (self.postgres, self.unit_of_work)
    }
}
