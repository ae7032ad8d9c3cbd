use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, postgres::PgRow};
use tracing::info;

use super::{column, conflict_on_unique, not_found_on_foreign_key, parsed};
use crate::database::ports::notifications::{
    NotificationEndpointsRepository, PushSubscriptionsRepository,
    UserNotificationsRepository,
};
use crate::domain::notifications::{
    EndpointConfig, EndpointType, NewPushSubscription, NewUserNotification,
    NotificationEndpoint, NotificationEndpointInput, NotificationEvent,
    PushSubscription, UserNotification,
};
use crate::error::{Result, SeerrError};

const ENDPOINT_COLUMNS: &str = r#"
    e.id, e.name, e.endpoint_type, e.enabled, e.is_global, e.events, e.config,
    e.created_at, e.updated_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresNotificationEndpointsRepository {
    pool: PgPool,
}

impl PostgresNotificationEndpointsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<NotificationEndpoint> {
        let endpoint_type: EndpointType = parsed(row, "endpoint_type")?;
        let events: Vec<String> = column(row, "events")?;
        let config: Value = column(row, "config")?;

        Ok(NotificationEndpoint {
            id: column(row, "id")?,
            name: column(row, "name")?,
            endpoint_type,
            enabled: column(row, "enabled")?,
            is_global: column(row, "is_global")?,
            events: NotificationEvent::parse_list(&events),
            config: EndpointConfig::decode(endpoint_type, config),
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }

    fn validate(input: &NotificationEndpointInput) -> Result<()> {
        if input.name.trim().is_empty() {
            return Err(SeerrError::InvalidInput(
                "endpoint name must not be empty".into(),
            ));
        }
        input.config.validate()
    }
}

#[async_trait]
impl NotificationEndpointsRepository for PostgresNotificationEndpointsRepository {
    async fn create_endpoint(
        &self,
        input: NotificationEndpointInput,
    ) -> Result<NotificationEndpoint> {
        Self::validate(&input)?;
        let name = input.name.trim().to_string();

        let sql = format!(
            r#"
            INSERT INTO notification_endpoint AS e
                (name, endpoint_type, enabled, is_global, events, config)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ENDPOINT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&name)
            .bind(input.config.endpoint_type().as_str())
            .bind(input.enabled)
            .bind(input.is_global)
            .bind(NotificationEvent::names(&input.events))
            .bind(input.config.to_value()?)
            .fetch_one(self.pool())
            .await
            .map_err(|e| conflict_on_unique(e, || format!("endpoint {name} already exists")))?;

        let endpoint = Self::map_row(&row)?;
        info!(endpoint_id = endpoint.id, endpoint_type = %endpoint.endpoint_type, "created notification endpoint");
        Ok(endpoint)
    }

    async fn update_endpoint(
        &self,
        id: i64,
        input: NotificationEndpointInput,
    ) -> Result<NotificationEndpoint> {
        Self::validate(&input)?;
        let name = input.name.trim().to_string();

        let sql = format!(
            r#"
            UPDATE notification_endpoint AS e SET
                name = $2,
                endpoint_type = $3,
                enabled = $4,
                is_global = $5,
                events = $6,
                config = $7,
                updated_at = NOW()
            WHERE e.id = $1
            RETURNING {ENDPOINT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&name)
            .bind(input.config.endpoint_type().as_str())
            .bind(input.enabled)
            .bind(input.is_global)
            .bind(NotificationEvent::names(&input.events))
            .bind(input.config.to_value()?)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| conflict_on_unique(e, || format!("endpoint {name} already exists")))?
            .ok_or_else(|| SeerrError::NotFound(format!("notification endpoint {id}")))?;

        Self::map_row(&row)
    }

    async fn delete_endpoint(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notification_endpoint WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_endpoint(&self, id: i64) -> Result<Option<NotificationEndpoint>> {
        let sql = format!("SELECT {ENDPOINT_COLUMNS} FROM notification_endpoint e WHERE e.id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        row.map(|row| Self::map_row(&row)).transpose()
    }

    async fn list_endpoints(&self) -> Result<Vec<NotificationEndpoint>> {
        let sql = format!("SELECT {ENDPOINT_COLUMNS} FROM notification_endpoint e ORDER BY e.name");
        let rows = sqlx::query(&sql).fetch_all(self.pool()).await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn list_endpoints_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<NotificationEndpoint>> {
        let sql = format!(
            r#"
            SELECT {ENDPOINT_COLUMNS}
            FROM notification_endpoint e
            WHERE e.enabled
              AND (e.is_global OR EXISTS (
                  SELECT 1 FROM user_notification_endpoint g
                  WHERE g.endpoint_id = e.id AND g.user_id = $1
              ))
            ORDER BY e.name
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn list_enabled_for_event(
        &self,
        event: NotificationEvent,
    ) -> Result<Vec<NotificationEndpoint>> {
        let sql = format!(
            r#"
            SELECT {ENDPOINT_COLUMNS}
            FROM notification_endpoint e
            WHERE e.enabled AND $1 = ANY(e.events)
            ORDER BY e.name
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(event.as_str())
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn grant_endpoint_access(
        &self,
        user_id: i64,
        endpoint_id: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_notification_endpoint (user_id, endpoint_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(endpoint_id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            not_found_on_foreign_key(e, || {
                format!("user {user_id} or endpoint {endpoint_id}")
            })
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_endpoint_access(
        &self,
        user_id: i64,
        endpoint_id: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM user_notification_endpoint WHERE user_id = $1 AND endpoint_id = $2",
        )
        .bind(user_id)
        .bind(endpoint_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_endpoint_users(&self, endpoint_id: i64) -> Result<Vec<i64>> {
        let users: Vec<i64> = sqlx::query_scalar(
            "SELECT user_id FROM user_notification_endpoint WHERE endpoint_id = $1 ORDER BY user_id",
        )
        .bind(endpoint_id)
        .fetch_all(self.pool())
        .await?;

        Ok(users)
    }
}

#[derive(Debug, Clone)]
pub struct PostgresUserNotificationsRepository {
    pool: PgPool,
}

impl PostgresUserNotificationsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<UserNotification> {
        Ok(UserNotification {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            kind: column(row, "kind")?,
            title: column(row, "title")?,
            message: column(row, "message")?,
            link: column(row, "link")?,
            metadata: column(row, "metadata")?,
            is_read: column(row, "is_read")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[async_trait]
impl UserNotificationsRepository for PostgresUserNotificationsRepository {
    async fn create_notification(
        &self,
        notification: NewUserNotification,
    ) -> Result<UserNotification> {
        let user_id = notification.user_id;
        let row = sqlx::query(
            r#"
            INSERT INTO user_notification (user_id, kind, title, message, link, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, kind, title, message, link, metadata, is_read, created_at
            "#,
        )
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(notification.title)
        .bind(notification.message)
        .bind(notification.link)
        .bind(notification.metadata)
        .fetch_one(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        Self::map_row(&row)
    }

    async fn list_notifications(
        &self,
        user_id: i64,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<UserNotification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, kind, title, message, link, metadata, is_read, created_at
            FROM user_notification
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit.clamp(1, 200))
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn count_unread(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_notification WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    async fn mark_read(&self, user_id: i64, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE user_notification SET is_read = TRUE WHERE id = $1 AND user_id = $2 AND NOT is_read",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE user_notification SET is_read = TRUE WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, user_id: i64, id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM user_notification WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
pub struct PostgresPushSubscriptionsRepository {
    pool: PgPool,
}

impl PostgresPushSubscriptionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<PushSubscription> {
        Ok(PushSubscription {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            endpoint: column(row, "endpoint")?,
            p256dh: column(row, "p256dh")?,
            auth: column(row, "auth")?,
            user_agent: column(row, "user_agent")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }
}

#[async_trait]
impl PushSubscriptionsRepository for PostgresPushSubscriptionsRepository {
    async fn upsert_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> Result<PushSubscription> {
        let user_id = subscription.user_id;
        let row = sqlx::query(
            r#"
            INSERT INTO push_subscription (user_id, endpoint, p256dh, auth, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (endpoint) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                p256dh = EXCLUDED.p256dh,
                auth = EXCLUDED.auth,
                user_agent = EXCLUDED.user_agent,
                updated_at = NOW()
            RETURNING id, user_id, endpoint, p256dh, auth, user_agent, created_at, updated_at
            "#,
        )
        .bind(subscription.user_id)
        .bind(subscription.endpoint)
        .bind(subscription.p256dh)
        .bind(subscription.auth)
        .bind(subscription.user_agent)
        .fetch_one(self.pool())
        .await
        .map_err(|e| not_found_on_foreign_key(e, || format!("user {user_id}")))?;

        Self::map_row(&row)
    }

    async fn list_user_subscriptions(
        &self,
        user_id: i64,
    ) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, endpoint, p256dh, auth, user_agent, created_at, updated_at
            FROM push_subscription
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn delete_user_subscription(
        &self,
        user_id: i64,
        endpoint: &str,
    ) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM push_subscription WHERE user_id = $1 AND endpoint = $2")
                .bind(user_id)
                .bind(endpoint)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_subscription_by_endpoint(&self, endpoint: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM push_subscription WHERE endpoint = $1")
            .bind(endpoint)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_subscriptions_for_users(
        &self,
        user_ids: &[i64],
    ) -> Result<Vec<PushSubscription>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT s.id, s.user_id, s.endpoint, s.p256dh, s.auth, s.user_agent,
                   s.created_at, s.updated_at
            FROM push_subscription s
            JOIN app_user u ON u.id = s.user_id
            WHERE s.user_id = ANY($1) AND u.web_push_enabled
            ORDER BY s.user_id, s.id
            "#,
        )
        .bind(user_ids.to_vec())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}
