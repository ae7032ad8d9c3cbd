use seerr_core::settings::MIN_SETTINGS_CACHE_TTL;
use thiserror::Error;

use crate::models::Config;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("pool min_connections ({min}) exceeds max_connections ({max})")]
    PoolBounds { min: u32, max: u32 },
    #[error("pool max_connections must be at least 1")]
    EmptyPool,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

/// Reject pool shapes sqlx cannot honour and warn about values that work but
/// are probably mistakes.
pub fn apply_guard_rails(
    config: &mut Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let pool = &config.database.pool;

    if pool.max_connections == 0 {
        return Err(ConfigGuardRailError::EmptyPool);
    }
    if pool.min_connections > pool.max_connections {
        return Err(ConfigGuardRailError::PoolBounds {
            min: pool.min_connections,
            max: pool.max_connections,
        });
    }

    if config.runtime.settings_cache_ttl < MIN_SETTINGS_CACHE_TTL {
        warnings.push_with_hint(
            format!(
                "settings cache TTL {:?} is below the {:?} floor; using the floor",
                config.runtime.settings_cache_ttl, MIN_SETTINGS_CACHE_TTL
            ),
            "Raise SETTINGS_CACHE_TTL or [runtime].settings_cache_ttl",
        );
        config.runtime.settings_cache_ttl = MIN_SETTINGS_CACHE_TTL;
    }

    if config.runtime.last_seen_throttle_minutes < 0 {
        warnings.push("negative last-seen throttle treated as 0");
        config.runtime.last_seen_throttle_minutes = 0;
    }

    let oidc = &config.oidc;
    if oidc.enabled && (oidc.issuer.is_none() || oidc.client_id.is_none()) {
        warnings.push_with_hint(
            "OIDC is enabled but the issuer or client id is missing",
            "Set OIDC_ISSUER and OIDC_CLIENT_ID, or store them in settings",
        );
    }

    Ok(warnings)
}
