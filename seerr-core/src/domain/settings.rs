use serde::{Deserialize, Serialize};

/// A decoded configuration value that remembers whether it came from storage
/// or from the built-in defaults (absent or malformed stored data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum SettingValue<T> {
    Stored(T),
    Default(T),
}

impl<T> SettingValue<T> {
    pub fn is_default(&self) -> bool {
        matches!(self, SettingValue::Default(_))
    }

    pub fn value(&self) -> &T {
        match self {
            SettingValue::Stored(value) | SettingValue::Default(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            SettingValue::Stored(value) | SettingValue::Default(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SettingValue<U> {
        match self {
            SettingValue::Stored(value) => SettingValue::Stored(f(value)),
            SettingValue::Default(value) => SettingValue::Default(f(value)),
        }
    }
}

/// Well-known keys of the `app_setting` table.
pub mod keys {
    pub const REQUEST_LIMIT_MOVIE: &str = "request_limit_movie";
    pub const REQUEST_LIMIT_MOVIE_DAYS: &str = "request_limit_movie_days";
    pub const REQUEST_LIMIT_SERIES: &str = "request_limit_series";
    pub const REQUEST_LIMIT_SERIES_DAYS: &str = "request_limit_series_days";
    pub const JELLYFIN_CONFIG: &str = "jellyfin_config";
    pub const OIDC_CONFIG: &str = "oidc_config";
    pub const AUTO_APPROVE_ADMINS: &str = "auto_approve_admins";
}

/// Connection settings for the Jellyfin media server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JellyfinSettings {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub use_ssl: bool,
    pub url_base: String,
    pub external_url: Option<String>,
    pub api_key: Option<String>,
    pub server_id: Option<String>,
}

impl Default for JellyfinSettings {
    fn default() -> Self {
        Self {
            name: "Jellyfin".to_string(),
            hostname: String::new(),
            port: 8096,
            use_ssl: false,
            url_base: String::new(),
            external_url: None,
            api_key: None,
            server_id: None,
        }
    }
}

impl JellyfinSettings {
    pub fn is_configured(&self) -> bool {
        !self.hostname.trim().is_empty()
    }

    /// Base URL the server is reachable on, e.g. `http://jf.lan:8096/jf`.
    pub fn base_url(&self) -> Option<String> {
        if !self.is_configured() {
            return None;
        }
        let scheme = if self.use_ssl { "https" } else { "http" };
        let base = self.url_base.trim().trim_end_matches('/');
        let base = if base.is_empty() || base.starts_with('/') {
            base.to_string()
        } else {
            format!("/{base}")
        };
        Some(format!(
            "{scheme}://{}:{}{base}",
            self.hostname.trim(),
            self.port
        ))
    }
}

/// OpenID Connect client configuration. Environment values provide the
/// baseline; fields stored in settings take precedence when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcSettings {
    pub enabled: bool,
    pub issuer: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<String>,
    pub admin_group: Option<String>,
}

/// Stored OIDC overrides; every field is optional so partial documents merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcOverrides {
    pub enabled: Option<bool>,
    pub issuer: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<String>,
    pub admin_group: Option<String>,
}

impl OidcSettings {
    pub fn merged_with(&self, overrides: &OidcOverrides) -> OidcSettings {
        fn pick(stored: &Option<String>, base: &Option<String>) -> Option<String> {
            stored
                .as_ref()
                .filter(|value| !value.trim().is_empty())
                .or(base.as_ref())
                .cloned()
        }

        OidcSettings {
            enabled: overrides.enabled.unwrap_or(self.enabled),
            issuer: pick(&overrides.issuer, &self.issuer),
            client_id: pick(&overrides.client_id, &self.client_id),
            client_secret: pick(&overrides.client_secret, &self.client_secret),
            redirect_uri: pick(&overrides.redirect_uri, &self.redirect_uri),
            scopes: pick(&overrides.scopes, &self.scopes),
            admin_group: pick(&overrides.admin_group, &self.admin_group),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.enabled && self.issuer.is_some() && self.client_id.is_some()
    }
}

/// Effective limit for one user and request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLimitStatus {
    pub unlimited: bool,
    pub limit: i32,
    pub days: i32,
    pub used: i64,
    pub remaining: Option<i64>,
    pub can_request: bool,
}

impl RequestLimitStatus {
    pub fn unlimited() -> Self {
        Self {
            unlimited: true,
            limit: 0,
            days: 0,
            used: 0,
            remaining: None,
            can_request: true,
        }
    }

    pub fn limited(limit: i32, days: i32, used: i64) -> Self {
        let remaining = (i64::from(limit) - used).max(0);
        Self {
            unlimited: false,
            limit,
            days,
            used,
            remaining: Some(remaining),
            can_request: remaining > 0,
        }
    }
}
