//! Key/value application settings with a short-lived in-process cache.
//!
//! Reads inside the TTL are served from memory, including cached misses.
//! Every write or delete through the store drops the cached entry, so a
//! caller always reads back what it just wrote.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::database::ports::settings::{SettingsRepository, StoredSetting};
use crate::domain::settings::{
    JellyfinSettings, OidcOverrides, OidcSettings, SettingValue, keys,
};
use crate::error::Result;

pub const DEFAULT_SETTINGS_CACHE_TTL: Duration = Duration::from_secs(30);
pub const MIN_SETTINGS_CACHE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct CachedSetting {
    value: Option<String>,
    fetched_at: Instant,
}

pub struct SettingsStore {
    repository: Arc<dyn SettingsRepository>,
    cache: DashMap<String, CachedSetting>,
    /// Bumped on every write or delete of a key. A read only fills the
    /// cache when the generation it started under is still current.
    generations: DashMap<String, u64>,
    ttl: Duration,
}

impl fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsStore")
            .field("cached_keys", &self.cache.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SettingsStore {
    pub fn new(repository: Arc<dyn SettingsRepository>) -> Self {
        Self::with_ttl(repository, DEFAULT_SETTINGS_CACHE_TTL)
    }

    /// TTLs below [`MIN_SETTINGS_CACHE_TTL`] are raised to it.
    pub fn with_ttl(repository: Arc<dyn SettingsRepository>, ttl: Duration) -> Self {
        Self {
            repository,
            cache: DashMap::new(),
            generations: DashMap::new(),
            ttl: ttl.max(MIN_SETTINGS_CACHE_TTL),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn cached(&self, key: &str) -> Option<Option<String>> {
        let entry = self.cache.get(key)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.cached(key) {
            debug!(key, "settings cache hit");
            return Ok(value);
        }

        debug!(key, "settings cache miss");
        let started = self.generation(key);
        let value = self.repository.get_setting(key).await?;

        // Hold the generation entry while inserting so a concurrent write
        // cannot slip in between the check and the insert.
        let current = self.generations.entry(key.to_string()).or_insert(0);
        if *current == started {
            self.cache.insert(
                key.to_string(),
                CachedSetting {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                },
            );
        } else {
            debug!(key, "setting changed during read, not caching");
        }
        drop(current);
        Ok(value)
    }

    fn generation(&self, key: &str) -> u64 {
        *self.generations.entry(key.to_string()).or_insert(0)
    }

    fn invalidate(&self, key: &str) {
        let mut generation = self.generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        self.cache.remove(key);
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.invalidate(key);
        let result = self.repository.set_setting(key, value).await;
        self.invalidate(key);
        result
    }

    pub async fn delete_setting(&self, key: &str) -> Result<bool> {
        self.invalidate(key);
        let result = self.repository.delete_setting(key).await;
        self.invalidate(key);
        result
    }

    /// Uncached; used by admin listings.
    pub async fn list_settings(&self) -> Result<Vec<StoredSetting>> {
        self.repository.list_settings().await
    }

    pub fn invalidate_all(&self) {
        for mut generation in self.generations.iter_mut() {
            *generation += 1;
        }
        self.cache.clear();
    }

    pub async fn get_setting_int(&self, key: &str, default: i64) -> Result<i64> {
        let Some(raw) = self.get_setting(key).await? else {
            return Ok(default);
        };
        match raw.trim().parse::<i64>() {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(key, raw = %raw, "setting is not an integer, using default: {e}");
                Ok(default)
            }
        }
    }

    pub async fn get_setting_bool(&self, key: &str, default: bool) -> Result<bool> {
        let Some(raw) = self.get_setting(key).await? else {
            return Ok(default);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => {
                warn!(key, raw = %raw, "setting is not a boolean, using default");
                Ok(default)
            }
        }
    }

    /// Decode a JSON setting. Absent or malformed values yield
    /// `SettingValue::Default(T::default())`.
    pub async fn get_json<T>(&self, key: &str) -> Result<SettingValue<T>>
    where
        T: DeserializeOwned + Default,
    {
        let Some(raw) = self.get_setting(key).await? else {
            return Ok(SettingValue::Default(T::default()));
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Ok(SettingValue::Stored(value)),
            Err(e) => {
                warn!(key, "stored setting is not valid JSON for its type: {e}");
                Ok(SettingValue::Default(T::default()))
            }
        }
    }

    pub async fn set_json<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.set_setting(key, &raw).await
    }

    pub async fn jellyfin_settings(&self) -> Result<SettingValue<JellyfinSettings>> {
        self.get_json(keys::JELLYFIN_CONFIG).await
    }

    /// Stored OIDC fields override the environment baseline one by one.
    pub async fn oidc_settings(&self, env_defaults: &OidcSettings) -> Result<OidcSettings> {
        let overrides = self.get_json::<OidcOverrides>(keys::OIDC_CONFIG).await?;
        Ok(env_defaults.merged_with(overrides.value()))
    }
}
