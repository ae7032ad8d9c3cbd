use async_trait::async_trait;

use crate::domain::notifications::{
    NewPushSubscription, NewUserNotification, NotificationEndpoint,
    NotificationEndpointInput, NotificationEvent, PushSubscription,
    UserNotification,
};
use crate::error::Result;

#[async_trait]
pub trait NotificationEndpointsRepository: Send + Sync {
    async fn create_endpoint(
        &self,
        input: NotificationEndpointInput,
    ) -> Result<NotificationEndpoint>;
    async fn update_endpoint(
        &self,
        id: i64,
        input: NotificationEndpointInput,
    ) -> Result<NotificationEndpoint>;
    async fn delete_endpoint(&self, id: i64) -> Result<bool>;
    async fn get_endpoint(&self, id: i64) -> Result<Option<NotificationEndpoint>>;
    async fn list_endpoints(&self) -> Result<Vec<NotificationEndpoint>>;
    /// Enabled endpoints a user receives: global ones plus explicit grants.
    async fn list_endpoints_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<NotificationEndpoint>>;
    async fn list_enabled_for_event(
        &self,
        event: NotificationEvent,
    ) -> Result<Vec<NotificationEndpoint>>;
    async fn grant_endpoint_access(
        &self,
        user_id: i64,
        endpoint_id: i64,
    ) -> Result<bool>;
    async fn revoke_endpoint_access(
        &self,
        user_id: i64,
        endpoint_id: i64,
    ) -> Result<bool>;
    async fn list_endpoint_users(&self, endpoint_id: i64) -> Result<Vec<i64>>;
}

/// In-app notification inbox.
#[async_trait]
pub trait UserNotificationsRepository: Send + Sync {
    async fn create_notification(
        &self,
        notification: NewUserNotification,
    ) -> Result<UserNotification>;
    async fn list_notifications(
        &self,
        user_id: i64,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<UserNotification>>;
    async fn count_unread(&self, user_id: i64) -> Result<i64>;
    async fn mark_read(&self, user_id: i64, id: i64) -> Result<bool>;
    async fn mark_all_read(&self, user_id: i64) -> Result<u64>;
    async fn delete_notification(&self, user_id: i64, id: i64) -> Result<bool>;
}

/// Web push subscriptions.
#[async_trait]
pub trait PushSubscriptionsRepository: Send + Sync {
    /// Keyed by endpoint; re-subscribing from another account moves it.
    async fn upsert_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> Result<PushSubscription>;
    async fn list_user_subscriptions(
        &self,
        user_id: i64,
    ) -> Result<Vec<PushSubscription>>;
    async fn delete_user_subscription(
        &self,
        user_id: i64,
        endpoint: &str,
    ) -> Result<bool>;
    /// Drop a subscription the push service reported as gone.
    async fn delete_subscription_by_endpoint(&self, endpoint: &str)
    -> Result<bool>;
    async fn list_subscriptions_for_users(
        &self,
        user_ids: &[i64],
    ) -> Result<Vec<PushSubscription>>;
}
