use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::settings::SettingValue;
use crate::error::{Result, SeerrError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    Telegram,
    Discord,
    Email,
    Webhook,
}

impl EndpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointType::Telegram => "telegram",
            EndpointType::Discord => "discord",
            EndpointType::Email => "email",
            EndpointType::Webhook => "webhook",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointType {
    type Err = SeerrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "telegram" => Ok(EndpointType::Telegram),
            "discord" => Ok(EndpointType::Discord),
            "email" => Ok(EndpointType::Email),
            "webhook" => Ok(EndpointType::Webhook),
            other => Err(SeerrError::Internal(format!(
                "Unknown notification endpoint type: {other}"
            ))),
        }
    }
}

/// Events a notification endpoint can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    RequestPending,
    RequestApproved,
    RequestDenied,
    RequestAvailable,
    RequestFailed,
    IssueReported,
    IssueResolved,
    NewArrival,
    WeeklyDigest,
}

impl NotificationEvent {
    pub const ALL: [NotificationEvent; 9] = [
        NotificationEvent::RequestPending,
        NotificationEvent::RequestApproved,
        NotificationEvent::RequestDenied,
        NotificationEvent::RequestAvailable,
        NotificationEvent::RequestFailed,
        NotificationEvent::IssueReported,
        NotificationEvent::IssueResolved,
        NotificationEvent::NewArrival,
        NotificationEvent::WeeklyDigest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::RequestPending => "request_pending",
            NotificationEvent::RequestApproved => "request_approved",
            NotificationEvent::RequestDenied => "request_denied",
            NotificationEvent::RequestAvailable => "request_available",
            NotificationEvent::RequestFailed => "request_failed",
            NotificationEvent::IssueReported => "issue_reported",
            NotificationEvent::IssueResolved => "issue_resolved",
            NotificationEvent::NewArrival => "new_arrival",
            NotificationEvent::WeeklyDigest => "weekly_digest",
        }
    }

    /// Decode a stored event list, skipping names this build does not know.
    pub fn parse_list(raw: &[String]) -> Vec<NotificationEvent> {
        raw.iter()
            .filter_map(|name| {
                let parsed = Self::ALL.iter().copied().find(|e| e.as_str() == name);
                if parsed.is_none() {
                    warn!(event = %name, "ignoring unknown notification event");
                }
                parsed
            })
            .collect()
    }

    pub fn names(events: &[NotificationEvent]) -> Vec<String> {
        let mut names: Vec<String> =
            events.iter().map(|e| e.as_str().to_string()).collect();
        names.sort();
        names.dedup();
        names
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default)]
    pub silent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "EmailConfig::default_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    pub from_address: String,
    #[serde(default)]
    pub to_address: Option<String>,
    #[serde(default = "EmailConfig::default_secure")]
    pub secure: bool,
}

impl EmailConfig {
    fn default_port() -> u16 {
        587
    }

    fn default_secure() -> bool {
        true
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: Self::default_port(),
            smtp_user: None,
            smtp_password: None,
            from_address: String::new(),
            to_address: None,
            secure: Self::default_secure(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub authorization_header: Option<String>,
    #[serde(default)]
    pub json_payload: Option<String>,
}

/// Provider-specific delivery configuration of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EndpointConfig {
    Telegram(TelegramConfig),
    Discord(DiscordConfig),
    Email(EmailConfig),
    Webhook(WebhookConfig),
}

impl EndpointConfig {
    pub fn default_for(endpoint_type: EndpointType) -> Self {
        match endpoint_type {
            EndpointType::Telegram => EndpointConfig::Telegram(TelegramConfig::default()),
            EndpointType::Discord => EndpointConfig::Discord(DiscordConfig::default()),
            EndpointType::Email => EndpointConfig::Email(EmailConfig::default()),
            EndpointType::Webhook => EndpointConfig::Webhook(WebhookConfig::default()),
        }
    }

    pub fn endpoint_type(&self) -> EndpointType {
        match self {
            EndpointConfig::Telegram(_) => EndpointType::Telegram,
            EndpointConfig::Discord(_) => EndpointType::Discord,
            EndpointConfig::Email(_) => EndpointType::Email,
            EndpointConfig::Webhook(_) => EndpointType::Webhook,
        }
    }

    /// Decode and validate a stored blob. Anything that does not parse or
    /// misses required fields yields the type's default configuration.
    pub fn decode(endpoint_type: EndpointType, raw: Value) -> SettingValue<EndpointConfig> {
        match Self::try_decode(endpoint_type, raw) {
            Ok(config) => SettingValue::Stored(config),
            Err(reason) => {
                warn!(endpoint_type = %endpoint_type, %reason, "invalid endpoint config, using defaults");
                SettingValue::Default(Self::default_for(endpoint_type))
            }
        }
    }

    pub fn try_decode(endpoint_type: EndpointType, raw: Value) -> Result<EndpointConfig> {
        let config = match endpoint_type {
            EndpointType::Telegram => EndpointConfig::Telegram(serde_json::from_value(raw)?),
            EndpointType::Discord => EndpointConfig::Discord(serde_json::from_value(raw)?),
            EndpointType::Email => EndpointConfig::Email(serde_json::from_value(raw)?),
            EndpointType::Webhook => EndpointConfig::Webhook(serde_json::from_value(raw)?),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let missing = match self {
            EndpointConfig::Telegram(c) if c.bot_token.trim().is_empty() => Some("bot_token"),
            EndpointConfig::Telegram(c) if c.chat_id.trim().is_empty() => Some("chat_id"),
            EndpointConfig::Discord(c) if c.webhook_url.trim().is_empty() => Some("webhook_url"),
            EndpointConfig::Email(c) if c.smtp_host.trim().is_empty() => Some("smtp_host"),
            EndpointConfig::Email(c) if c.from_address.trim().is_empty() => Some("from_address"),
            EndpointConfig::Webhook(c) if c.url.trim().is_empty() => Some("url"),
            _ => None,
        };

        match missing {
            Some(field) => Err(SeerrError::InvalidInput(format!(
                "{} endpoint config requires `{field}`",
                self.endpoint_type()
            ))),
            None => Ok(()),
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEndpoint {
    pub id: i64,
    pub name: String,
    pub endpoint_type: EndpointType,
    pub enabled: bool,
    pub is_global: bool,
    pub events: Vec<NotificationEvent>,
    pub config: SettingValue<EndpointConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationEndpoint {
    pub fn subscribes_to(&self, event: NotificationEvent) -> bool {
        self.events.contains(&event)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEndpointInput {
    pub name: String,
    pub enabled: bool,
    pub is_global: bool,
    pub events: Vec<NotificationEvent>,
    pub config: EndpointConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserNotification {
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: i64,
    pub user_id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPushSubscription {
    pub user_id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_valid_telegram_config() {
        let decoded = EndpointConfig::decode(
            EndpointType::Telegram,
            json!({ "bot_token": "123:abc", "chat_id": "-100" }),
        );
        assert!(!decoded.is_default());
        assert_eq!(
            decoded.into_inner(),
            EndpointConfig::Telegram(TelegramConfig {
                bot_token: "123:abc".into(),
                chat_id: "-100".into(),
                silent: false,
            })
        );
    }

    #[test]
    fn malformed_config_falls_back_to_explicit_default() {
        let decoded = EndpointConfig::decode(EndpointType::Webhook, json!("not an object"));
        assert!(decoded.is_default());
        assert_eq!(
            decoded.value(),
            &EndpointConfig::Webhook(WebhookConfig::default())
        );

        let missing_field =
            EndpointConfig::decode(EndpointType::Discord, json!({ "webhook_url": "" }));
        assert!(missing_field.is_default());
    }

    #[test]
    fn email_defaults_fill_optional_fields() {
        let decoded = EndpointConfig::try_decode(
            EndpointType::Email,
            json!({ "smtp_host": "smtp.lan", "from_address": "seerr@lan" }),
        )
        .unwrap();
        match decoded {
            EndpointConfig::Email(email) => {
                assert_eq!(email.smtp_port, 587);
                assert!(email.secure);
            }
            other => panic!("unexpected config {other:?}"),
        }
    }

    #[test]
    fn config_serializes_without_a_type_tag() {
        let config = EndpointConfig::Webhook(WebhookConfig {
            url: "https://hooks.lan".into(),
            ..WebhookConfig::default()
        });
        let value = config.to_value().unwrap();
        assert_eq!(value["url"], "https://hooks.lan");
        assert!(value.get("type").is_none());
    }

    #[test]
    fn unknown_events_are_skipped() {
        let parsed = NotificationEvent::parse_list(&[
            "request_pending".to_string(),
            "bogus".to_string(),
        ]);
        assert_eq!(parsed, vec![NotificationEvent::RequestPending]);
    }
}
