pub mod sources;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use seerr_core::domain::settings::OidcSettings;
use seerr_core::{ContextOptions, DatabaseSettings, PoolSettings};

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub runtime: RuntimeConfig,
    /// Environment baseline; stored settings override it field by field.
    pub oidc: OidcSettings,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn database_settings(&self) -> DatabaseSettings {
        DatabaseSettings::new(self.database.url.clone())
            .with_pool(self.database.pool.clone())
    }

    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            last_seen_throttle_minutes: self.runtime.last_seen_throttle_minutes,
            settings_cache_ttl: self.runtime.settings_cache_ttl,
        }
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool: PoolSettings,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("pool", &self.pool)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub last_seen_throttle_minutes: i32,
    pub settings_cache_ttl: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let defaults = ContextOptions::default();
        Self {
            last_seen_throttle_minutes: defaults.last_seen_throttle_minutes,
            settings_cache_ttl: defaults.settings_cache_ttl,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
