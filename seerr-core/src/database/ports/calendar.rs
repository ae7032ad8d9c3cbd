use async_trait::async_trait;

use crate::domain::MediaKind;
use crate::domain::calendar::{
    CalendarFeedToken, CalendarPreferences, CalendarSubscription,
};
use crate::error::Result;

#[async_trait]
pub trait CalendarRepository: Send + Sync {
    /// Stored preferences, or the defaults when the user never saved any.
    async fn get_preferences(&self, user_id: i64) -> Result<CalendarPreferences>;
    async fn upsert_preferences(
        &self,
        preferences: &CalendarPreferences,
    ) -> Result<CalendarPreferences>;

    async fn subscribe(
        &self,
        user_id: i64,
        event_type: &str,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<bool>;
    async fn unsubscribe(
        &self,
        user_id: i64,
        event_type: &str,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<bool>;
    async fn list_subscriptions(
        &self,
        user_id: i64,
    ) -> Result<Vec<CalendarSubscription>>;
    async fn list_subscribers(
        &self,
        event_type: &str,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<Vec<i64>>;

    async fn get_or_create_feed_token(
        &self,
        user_id: i64,
    ) -> Result<CalendarFeedToken>;
    async fn rotate_feed_token(&self, user_id: i64) -> Result<CalendarFeedToken>;
    async fn find_user_by_feed_token(&self, token: &str) -> Result<Option<i64>>;
}
