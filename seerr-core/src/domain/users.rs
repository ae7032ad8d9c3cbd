use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::requests::RequestType;

/// Set of free-form role tags attached to a user.
///
/// Tags are trimmed, empty tags dropped, and duplicates collapsed; iteration
/// order is sorted so two sets compare equal regardless of input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct GroupSet(BTreeSet<String>);

impl GroupSet {
    pub const ADMIN: &'static str = "admin";
    pub const OWNER: &'static str = "owner";

    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma separated tag list such as `"admin, owner"`.
    pub fn from_csv(raw: &str) -> Self {
        raw.split(',').collect()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag.trim())
    }

    pub fn insert(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        !tag.is_empty() && self.0.insert(tag.to_string())
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        self.0.remove(tag.trim())
    }

    pub fn is_admin(&self) -> bool {
        self.contains(Self::ADMIN) || self.contains(Self::OWNER)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for GroupSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = GroupSet::new();
        for tag in iter {
            set.insert(tag.as_ref());
        }
        set
    }
}

impl From<Vec<String>> for GroupSet {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<GroupSet> for Vec<String> {
    fn from(set: GroupSet) -> Self {
        set.0.into_iter().collect()
    }
}

impl fmt::Display for GroupSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(","))
    }
}

/// Per-user request-limit overrides. `None` means "use the global default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLimitOverrides {
    pub movie_limit: Option<i32>,
    pub movie_days: Option<i32>,
    pub series_limit: Option<i32>,
    pub series_days: Option<i32>,
}

impl RequestLimitOverrides {
    pub fn for_type(&self, request_type: RequestType) -> (Option<i32>, Option<i32>) {
        match request_type {
            RequestType::Movie => (self.movie_limit, self.movie_days),
            RequestType::Episode => (self.series_limit, self.series_days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub groups: GroupSet,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub oidc_sub: Option<String>,
    pub jellyfin_user_id: Option<String>,
    pub jellyfin_username: Option<String>,
    pub jellyfin_device_id: Option<String>,
    #[serde(skip_serializing)]
    pub jellyfin_auth_token: Option<String>,
    pub discord_user_id: Option<String>,
    pub avatar_url: Option<String>,
    pub avatar_version: i32,
    #[serde(skip_serializing)]
    pub mfa_secret: Option<String>,
    pub discover_region: Option<String>,
    pub original_language: Option<String>,
    pub watchlist_sync_movies: bool,
    pub watchlist_sync_tv: bool,
    pub request_limits: RequestLimitOverrides,
    pub banned: bool,
    pub weekly_digest_opt_in: bool,
    pub web_push_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.groups.is_admin()
    }

    pub fn has_mfa(&self) -> bool {
        self.mfa_secret.is_some()
    }
}

/// Input for the login-time upsert keyed by username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpsert {
    pub username: String,
    pub groups: GroupSet,
    /// Only written when present; an existing email is never cleared here.
    pub email: Option<String>,
}

/// Admin-created account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub groups: GroupSet,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfileUpdate {
    pub email: Option<String>,
    pub discover_region: Option<String>,
    pub original_language: Option<String>,
    pub watchlist_sync_movies: bool,
    pub watchlist_sync_tv: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JellyfinLink {
    pub user_id: String,
    pub username: String,
    pub device_id: Option<String>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationPreferences {
    pub weekly_digest_opt_in: bool,
    pub web_push_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub device_label: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl UserSession {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub user_id: i64,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub device_label: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAuthnCredential {
    pub id: i64,
    pub user_id: i64,
    pub credential_id: String,
    #[serde(skip_serializing)]
    pub public_key: Vec<u8>,
    pub counter: i64,
    pub transports: Vec<String>,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWebAuthnCredential {
    pub user_id: i64,
    pub credential_id: String,
    pub public_key: Vec<u8>,
    pub counter: i64,
    pub transports: Vec<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAuthnChallenge {
    pub id: i64,
    pub user_id: Option<i64>,
    pub challenge: String,
    pub purpose: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub purpose: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_set_dedupes_and_ignores_order() {
        let a = GroupSet::from_csv("owner, admin,admin, ");
        let b: GroupSet = ["admin", "owner"].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.to_string(), "admin,owner");
        assert!(a.is_admin());
    }

    #[test]
    fn group_set_membership_is_exact() {
        let groups = GroupSet::from_csv("administrators");
        assert!(!groups.contains("admin"));
        assert!(!groups.is_admin());
    }

    #[test]
    fn group_set_serializes_as_sorted_array() {
        let groups = GroupSet::from_csv("users,admin");
        let json = serde_json::to_string(&groups).unwrap();
        assert_eq!(json, r#"["admin","users"]"#);
        let back: GroupSet = serde_json::from_str(r#"["users","admin","users"]"#).unwrap();
        assert_eq!(back, groups);
    }

    #[test]
    fn overrides_pick_the_matching_type() {
        let overrides = RequestLimitOverrides {
            movie_limit: Some(5),
            movie_days: Some(7),
            series_limit: None,
            series_days: None,
        };
        assert_eq!(overrides.for_type(RequestType::Movie), (Some(5), Some(7)));
        assert_eq!(overrides.for_type(RequestType::Episode), (None, None));
    }
}
