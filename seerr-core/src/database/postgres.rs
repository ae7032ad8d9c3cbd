use std::fmt;
use std::time::Duration;

use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use tracing::{debug, info, warn};

use crate::MIGRATOR;
use crate::database::infrastructure::postgres::PostgresJobsRepository;
use crate::database::ports::jobs::JobsRepository;
use crate::domain::jobs::DEFAULT_JOBS;
use crate::error::{Result, SeerrError};

/// Statistics about the connection pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max_size: u32,
    pub min_idle: u32,
}

/// Pool sizing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
    /// Applied per connection as the server-side `statement_timeout`.
    pub statement_timeout: Duration,
    /// Server-side `tcp_keepalives_idle`; left to the server when unset.
    pub keepalive_idle: Option<Duration>,
    pub max_lifetime: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 50,
            min_connections: 2,
            idle_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(2),
            statement_timeout: Duration::from_secs(30),
            keepalive_idle: None,
            max_lifetime: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool: PoolSettings,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &"<redacted>")
            .field("pool", &self.pool)
            .finish()
    }
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: PoolSettings::default(),
        }
    }

    pub fn with_pool(mut self, pool: PoolSettings) -> Self {
        self.pool = pool;
        self
    }
}

#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
    max_connections: u32,
    min_connections: u32,
}

impl fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .finish()
    }
}

impl PostgresDatabase {
    /// Build the shared pool. Settings are validated before any I/O.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let connect_options = Self::build_connect_options(settings)?;
        let pool_settings = &settings.pool;
        let min_connections =
            pool_settings.min_connections.min(pool_settings.max_connections);

        let pool = PgPoolOptions::new()
            .max_connections(pool_settings.max_connections)
            .min_connections(min_connections)
            .acquire_timeout(pool_settings.acquire_timeout)
            .idle_timeout(pool_settings.idle_timeout)
            .max_lifetime(pool_settings.max_lifetime)
            .test_before_acquire(true)
            .after_connect(|_conn, meta| {
                Box::pin(async move {
                    debug!(age = ?meta.age, "database connection established");
                    Ok(())
                })
            })
            .connect_with(connect_options)
            .await?;

        info!(
            max_connections = pool_settings.max_connections,
            min_connections,
            statement_timeout = ?pool_settings.statement_timeout,
            "database pool initialized"
        );

        Ok(Self {
            pool,
            max_connections: pool_settings.max_connections,
            min_connections,
        })
    }

    /// Wrap an existing pool (mainly for tests).
    pub fn from_pool(pool: PgPool) -> Self {
        let max_connections = pool.options().get_max_connections();
        let min_connections = pool.options().get_min_connections();

        Self {
            pool,
            max_connections,
            min_connections,
        }
    }

    fn build_connect_options(
        settings: &DatabaseSettings,
    ) -> Result<PgConnectOptions> {
        let trimmed = settings.url.trim();
        if trimmed.is_empty() {
            return Err(SeerrError::Configuration(
                "database URL is not set".into(),
            ));
        }
        if settings.pool.max_connections == 0 {
            return Err(SeerrError::Configuration(
                "max connections must be at least 1".into(),
            ));
        }

        let options = trimmed.parse::<PgConnectOptions>().map_err(|e| {
            SeerrError::Configuration(format!(
                "Invalid PostgreSQL connection string: {e}"
            ))
        })?;

        let mut parameters = vec![(
            "statement_timeout",
            settings.pool.statement_timeout.as_millis().to_string(),
        )];
        if let Some(idle) = settings.pool.keepalive_idle {
            parameters.push(("tcp_keepalives_idle", idle.as_secs().to_string()));
        }

        Ok(options.options(parameters))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
            max_size: self.max_connections,
            min_idle: self.min_connections,
        }
    }

    /// `SELECT 1` round trip. Failures are logged, never returned.
    pub async fn check_health(&self) -> bool {
        match sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("database health check failed: {e}");
                false
            }
        }
    }

    /// Run pending migrations, then seed the default job rows.
    pub async fn initialize_schema(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;

        let seeded = PostgresJobsRepository::new(self.pool.clone())
            .seed_default_jobs(DEFAULT_JOBS)
            .await?;
        info!(seeded, "database schema is up to date");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_settings_match_documented_values() {
        let pool = PoolSettings::default();
        assert_eq!(pool.max_connections, 50);
        assert_eq!(pool.min_connections, 2);
        assert_eq!(pool.idle_timeout, Duration::from_secs(30));
        assert_eq!(pool.acquire_timeout, Duration::from_secs(2));
        assert_eq!(pool.statement_timeout, Duration::from_secs(30));
        assert_eq!(pool.max_lifetime, Duration::from_secs(1800));
        assert!(pool.keepalive_idle.is_none());
    }

    #[test]
    fn empty_url_is_a_configuration_error() {
        let err = PostgresDatabase::build_connect_options(&DatabaseSettings::new("   "))
            .unwrap_err();
        assert!(matches!(err, SeerrError::Configuration(_)));
    }

    #[test]
    fn malformed_url_is_a_configuration_error() {
        let err = PostgresDatabase::build_connect_options(&DatabaseSettings::new(
            "postgres://user@host:notaport/db",
        ))
        .unwrap_err();
        assert!(matches!(err, SeerrError::Configuration(_)));
    }

    #[test]
    fn zero_sized_pool_is_rejected() {
        let settings = DatabaseSettings::new("postgres://localhost/seerr").with_pool(
            PoolSettings {
                max_connections: 0,
                ..PoolSettings::default()
            },
        );
        let err = PostgresDatabase::build_connect_options(&settings).unwrap_err();
        assert!(matches!(err, SeerrError::Configuration(_)));
    }

    #[test]
    fn debug_output_redacts_the_url() {
        let settings = DatabaseSettings::new("postgres://admin:hunter2@db/seerr");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
