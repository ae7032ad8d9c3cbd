pub mod db_url;
pub mod error;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use seerr_core::PoolSettings;
use seerr_core::domain::settings::OidcSettings;
use tracing::debug;

use self::{db_url::resolve_database_url, error::ConfigLoadError};
use crate::{
    models::{
        Config, ConfigMetadata, DatabaseConfig, RuntimeConfig,
        sources::{EnvConfig, FileConfig, FileDatabaseConfig, FileOidcConfig},
    },
    util::{parse_duration, parse_number},
    validation::{ConfigWarnings, apply_guard_rails},
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["seerr.toml", "config/seerr.toml"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

/// A loaded configuration plus the non-fatal problems found on the way.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env`, then the process environment and the TOML file.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true),
            None => dotenvy::dotenv().map(|_| true),
        }
        .or_else(|err| match err {
            dotenvy::Error::Io(_) => Ok(false),
            _ => Err(err),
        })?;

        let mut load = self.load_from(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Compose from an already gathered environment. `.env` is not read.
    pub fn load_from(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No seerr.toml detected; using environment variables only",
                "Pass --config or set SEERR_CONFIG_PATH to use a file",
            );
        }

        let file = file_config.unwrap_or_default();
        let database_url = resolve_database_url(&env, &file.database)?
            .ok_or(ConfigLoadError::MissingDatabaseUrl)?;

        let mut config = Config {
            database: DatabaseConfig {
                url: database_url,
                pool: compose_pool(&env, &file.database)?,
            },
            runtime: compose_runtime(&env, &file)?,
            oidc: compose_oidc(&env, &file.oidc),
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };

        warnings.extend(apply_guard_rails(&mut config)?);
        debug!(
            config_path = ?config.metadata.config_path,
            warnings = warnings.items.len(),
            "configuration composed"
        );

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let path = match (&self.options.config_path, &env.config_path) {
            (Some(explicit), _) => {
                if !explicit.exists() {
                    return Err(ConfigLoadError::MissingConfig {
                        path: explicit.clone(),
                    });
                }
                explicit.clone()
            }
            (None, Some(from_env)) if from_env.exists() => from_env.clone(),
            (None, Some(_)) => return Ok((None, None)),
            (None, None) => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(Path::new)
                .find(|candidate| candidate.exists())
            {
                Some(found) => found.to_path_buf(),
                None => return Ok((None, None)),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| {
            ConfigLoadError::Io {
                path: path.clone(),
                source,
            }
        })?;
        let file_config: FileConfig = toml::from_str(&contents).map_err(|source| {
            ConfigLoadError::Parse {
                path: path.clone(),
                source,
            }
        })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn env_or_file_duration(
    key: &'static str,
    env: Option<&str>,
    file: Option<&str>,
) -> Result<Option<Duration>, ConfigLoadError> {
    env.or(file).map(|raw| parse_duration(key, raw)).transpose()
}

fn compose_pool(
    env: &EnvConfig,
    file: &FileDatabaseConfig,
) -> Result<PoolSettings, ConfigLoadError> {
    let defaults = PoolSettings::default();

    let max_connections = match env.db_max_connections.as_deref() {
        Some(raw) => parse_number("DB_MAX_CONNECTIONS", raw)?,
        None => file.max_connections.unwrap_or(defaults.max_connections),
    };
    let min_connections = match env.db_min_connections.as_deref() {
        Some(raw) => parse_number("DB_MIN_CONNECTIONS", raw)?,
        None => file.min_connections.unwrap_or(defaults.min_connections),
    };

    Ok(PoolSettings {
        max_connections,
        min_connections,
        idle_timeout: env_or_file_duration(
            "DB_IDLE_TIMEOUT",
            env.db_idle_timeout.as_deref(),
            file.idle_timeout.as_deref(),
        )?
        .unwrap_or(defaults.idle_timeout),
        acquire_timeout: env_or_file_duration(
            "DB_ACQUIRE_TIMEOUT",
            env.db_acquire_timeout.as_deref(),
            file.acquire_timeout.as_deref(),
        )?
        .unwrap_or(defaults.acquire_timeout),
        statement_timeout: env_or_file_duration(
            "DB_STATEMENT_TIMEOUT",
            env.db_statement_timeout.as_deref(),
            file.statement_timeout.as_deref(),
        )?
        .unwrap_or(defaults.statement_timeout),
        keepalive_idle: env_or_file_duration(
            "DB_KEEPALIVE_IDLE",
            env.db_keepalive_idle.as_deref(),
            file.keepalive_idle.as_deref(),
        )?
        .or(defaults.keepalive_idle),
        max_lifetime: defaults.max_lifetime,
    })
}

fn compose_runtime(
    env: &EnvConfig,
    file: &FileConfig,
) -> Result<RuntimeConfig, ConfigLoadError> {
    let defaults = RuntimeConfig::default();

    let last_seen_throttle_minutes = match env.last_seen_throttle_minutes.as_deref() {
        Some(raw) => parse_number("LAST_SEEN_THROTTLE_MINUTES", raw)?,
        None => file
            .runtime
            .last_seen_throttle_minutes
            .unwrap_or(defaults.last_seen_throttle_minutes),
    };
    let settings_cache_ttl = env_or_file_duration(
        "SETTINGS_CACHE_TTL",
        env.settings_cache_ttl.as_deref(),
        file.runtime.settings_cache_ttl.as_deref(),
    )?
    .unwrap_or(defaults.settings_cache_ttl);

    Ok(RuntimeConfig {
        last_seen_throttle_minutes,
        settings_cache_ttl,
    })
}

fn compose_oidc(env: &EnvConfig, file: &FileOidcConfig) -> OidcSettings {
    let pick = |env: &Option<String>, file: &Option<String>| {
        env.clone().or_else(|| file.clone())
    };

    let issuer = pick(&env.oidc_issuer, &file.issuer);
    let client_id = pick(&env.oidc_client_id, &file.client_id);
    // Without an explicit switch, OIDC is on once it is identifiable.
    let enabled = env
        .oidc_enabled
        .or(file.enabled)
        .unwrap_or(issuer.is_some() && client_id.is_some());

    OidcSettings {
        enabled,
        issuer,
        client_id,
        client_secret: pick(&env.oidc_client_secret, &file.client_secret),
        redirect_uri: pick(&env.oidc_redirect_uri, &file.redirect_uri),
        scopes: pick(&env.oidc_scopes, &file.scopes),
        admin_group: pick(&env.oidc_admin_group, &file.admin_group),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|key| map.get(key).cloned())
    }

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn env_overrides_file_values() {
        let file = toml_file(
            r#"
            [database]
            url = "postgres://file-host/seerr"
            max_connections = 20
            idle_timeout = "1m"

            [runtime]
            settings_cache_ttl = "45s"
            last_seen_throttle_minutes = 10
            "#,
        );
        let loader = ConfigLoader::new().with_config_path(file.path());
        let load = loader
            .load_from(env(&[
                ("DB_MAX_CONNECTIONS", "8"),
                ("LAST_SEEN_THROTTLE_MINUTES", "2"),
            ]))
            .unwrap();

        let config = load.config;
        assert_eq!(config.database.url, "postgres://file-host/seerr");
        assert_eq!(config.database.pool.max_connections, 8);
        assert_eq!(config.database.pool.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.runtime.settings_cache_ttl, Duration::from_secs(45));
        assert_eq!(config.runtime.last_seen_throttle_minutes, 2);
        assert_eq!(config.metadata.config_path.as_deref(), Some(file.path()));
        assert!(load.warnings.is_empty());
    }

    #[test]
    fn env_only_load_warns_about_the_missing_file() {
        let load = ConfigLoader::new()
            .load_from(env(&[
                ("SEERR_CONFIG_PATH", "/nonexistent/seerr.toml"),
                ("DATABASE_URL", "postgres://env/seerr"),
            ]))
            .unwrap();

        assert!(load.config.metadata.config_path.is_none());
        assert_eq!(load.config.database.pool, PoolSettings::default());
        assert_eq!(load.warnings.items.len(), 1);
        assert!(load.warnings.items[0].hint.is_some());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = ConfigLoader::new()
            .with_config_path("/nonexistent/seerr.toml")
            .load_from(env(&[("DATABASE_URL", "postgres://env/seerr")]))
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = ConfigLoader::new()
            .load_from(env(&[("SEERR_CONFIG_PATH", "/nonexistent/seerr.toml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingDatabaseUrl));
    }

    #[test]
    fn malformed_toml_reports_the_path() {
        let file = toml_file("[database\nurl = ");
        let err = ConfigLoader::new()
            .with_config_path(file.path())
            .load_from(env(&[]))
            .unwrap_err();
        match err {
            ConfigLoadError::Parse { path, .. } => assert_eq!(path, file.path()),
            other => panic!("expected a parse error, got {other}"),
        }
    }

    #[test]
    fn bad_duration_names_the_key() {
        let err = ConfigLoader::new()
            .load_from(env(&[
                ("SEERR_CONFIG_PATH", "/nonexistent/seerr.toml"),
                ("DATABASE_URL", "postgres://env/seerr"),
                ("DB_ACQUIRE_TIMEOUT", "whenever"),
            ]))
            .unwrap_err();
        assert!(err.to_string().contains("DB_ACQUIRE_TIMEOUT"));
    }

    #[test]
    fn oidc_turns_on_when_identifiable() {
        let base = [
            ("SEERR_CONFIG_PATH", "/nonexistent/seerr.toml"),
            ("DATABASE_URL", "postgres://env/seerr"),
            ("OIDC_ISSUER", "https://id.example.test"),
            ("OIDC_CLIENT_ID", "seerr"),
        ];
        let load = ConfigLoader::new().load_from(env(&base)).unwrap();
        assert!(load.config.oidc.enabled);

        let mut disabled = base.to_vec();
        disabled.push(("OIDC_ENABLED", "false"));
        let load = ConfigLoader::new().load_from(env(&disabled)).unwrap();
        assert!(!load.config.oidc.enabled);
        assert_eq!(load.config.oidc.client_id.as_deref(), Some("seerr"));
    }

    #[test]
    fn context_options_follow_the_runtime_section() {
        let load = ConfigLoader::new()
            .load_from(env(&[
                ("SEERR_CONFIG_PATH", "/nonexistent/seerr.toml"),
                ("DATABASE_URL", "postgres://env/seerr"),
                ("SETTINGS_CACHE_TTL", "90"),
            ]))
            .unwrap();
        let options = load.config.context_options();
        assert_eq!(options.settings_cache_ttl, Duration::from_secs(90));
        assert_eq!(
            load.config.database_settings().url,
            "postgres://env/seerr"
        );
    }
}
