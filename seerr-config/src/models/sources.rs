use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::{non_empty, parse_bool};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub runtime: FileRuntimeConfig,
    #[serde(default)]
    pub oidc: FileOidcConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_connections: Option<u32>,
    /// Durations are humantime strings such as `"30s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquire_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive_idle: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRuntimeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_throttle_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_cache_ttl: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileOidcConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_group: Option<String>,
}

/// Environment-derived configuration values. Numbers and durations stay raw
/// here so the loader can report which key was malformed.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub database_url_file: Option<PathBuf>,
    pub database_host: Option<String>,
    pub database_port: Option<String>,
    pub database_user: Option<String>,
    pub database_name: Option<String>,
    pub database_password: Option<String>,
    pub database_password_file: Option<PathBuf>,
    pub db_max_connections: Option<String>,
    pub db_min_connections: Option<String>,
    pub db_idle_timeout: Option<String>,
    pub db_acquire_timeout: Option<String>,
    pub db_statement_timeout: Option<String>,
    pub db_keepalive_idle: Option<String>,
    pub last_seen_throttle_minutes: Option<String>,
    pub settings_cache_ttl: Option<String>,
    pub oidc_enabled: Option<bool>,
    pub oidc_issuer: Option<String>,
    pub oidc_client_id: Option<String>,
    pub oidc_client_secret: Option<String>,
    pub oidc_redirect_uri: Option<String>,
    pub oidc_scopes: Option<String>,
    pub oidc_admin_group: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key));
        let path = |key: &str| var(key).map(PathBuf::from);

        Self {
            config_path: path("SEERR_CONFIG_PATH"),
            database_url: var("DATABASE_URL"),
            database_url_file: path("DATABASE_URL_FILE"),
            database_host: var("DATABASE_HOST"),
            database_port: var("DATABASE_PORT"),
            database_user: var("DATABASE_USER"),
            database_name: var("DATABASE_NAME"),
            database_password: var("DATABASE_PASSWORD"),
            database_password_file: path("DATABASE_PASSWORD_FILE"),
            db_max_connections: var("DB_MAX_CONNECTIONS"),
            db_min_connections: var("DB_MIN_CONNECTIONS"),
            db_idle_timeout: var("DB_IDLE_TIMEOUT"),
            db_acquire_timeout: var("DB_ACQUIRE_TIMEOUT"),
            db_statement_timeout: var("DB_STATEMENT_TIMEOUT"),
            db_keepalive_idle: var("DB_KEEPALIVE_IDLE"),
            last_seen_throttle_minutes: var("LAST_SEEN_THROTTLE_MINUTES"),
            settings_cache_ttl: var("SETTINGS_CACHE_TTL"),
            oidc_enabled: var("OIDC_ENABLED").and_then(|raw| parse_bool(&raw)),
            oidc_issuer: var("OIDC_ISSUER"),
            oidc_client_id: var("OIDC_CLIENT_ID"),
            oidc_client_secret: var("OIDC_CLIENT_SECRET"),
            oidc_redirect_uri: var("OIDC_REDIRECT_URI"),
            oidc_scopes: var("OIDC_SCOPES"),
            oidc_admin_group: var("OIDC_ADMIN_GROUP"),
        }
    }
}
