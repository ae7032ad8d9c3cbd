use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::Page;
use crate::domain::requests::{
    ActiveRequestRef, AnalyticsRange, EpisodeRequestStatus, MediaRequestSummary,
    MediaRequestWithItems, NewMediaRequest, RequestAnalytics, RequestComment,
    RequestItem, RequestListFilter, RequestStatus, RequestType,
};
use crate::error::Result;

#[async_trait]
pub trait RequestsRepository: Send + Sync {
    /// Insert a request and its items atomically. A competing active request
    /// for the same movie or episode surfaces as
    /// [`SeerrError::ActiveRequestExists`](crate::error::SeerrError::ActiveRequestExists).
    async fn create_request_with_items(
        &self,
        request: NewMediaRequest,
    ) -> Result<Uuid>;

    async fn find_active_request_by_tmdb(
        &self,
        request_type: RequestType,
        tmdb_id: i64,
    ) -> Result<Option<ActiveRequestRef>>;

    async fn find_active_requests_by_tmdb_ids(
        &self,
        request_type: RequestType,
        tmdb_ids: &[i64],
    ) -> Result<Vec<ActiveRequestRef>>;

    async fn find_active_episode_request_items(
        &self,
        tmdb_id: i64,
        season: i32,
    ) -> Result<Vec<EpisodeRequestStatus>>;

    async fn list_active_episode_request_items_by_tmdb(
        &self,
        tmdb_id: i64,
    ) -> Result<Vec<EpisodeRequestStatus>>;

    async fn list_requests_paged(
        &self,
        filter: RequestListFilter,
    ) -> Result<Page<MediaRequestSummary>>;

    async fn get_request(&self, id: Uuid)
    -> Result<Option<MediaRequestWithItems>>;

    async fn list_request_items(&self, request_id: Uuid)
    -> Result<Vec<RequestItem>>;

    /// Requests the provider sync still has to look at, oldest first.
    async fn list_requests_for_reconciliation(
        &self,
        limit: i64,
    ) -> Result<Vec<MediaRequestWithItems>>;

    /// Unchecked status write used by reconciliation. Leaving the active set
    /// also moves the still-active items, releasing their episode slots.
    async fn mark_request_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> Result<bool>;

    /// Status write that enforces [`RequestStatus::can_transition_to`].
    /// Returns the previous status.
    async fn transition_request_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> Result<RequestStatus>;

    /// Update every item of the request, or only `item_ids` when given.
    async fn set_request_items_status(
        &self,
        request_id: Uuid,
        item_ids: Option<&[i64]>,
        status: RequestStatus,
    ) -> Result<u64>;

    async fn set_request_items_provider_id(
        &self,
        request_id: Uuid,
        provider_id: i64,
    ) -> Result<u64>;

    async fn delete_request(&self, id: Uuid) -> Result<bool>;

    async fn delete_request_for_user(
        &self,
        id: Uuid,
        user_id: i64,
    ) -> Result<bool>;

    async fn get_request_analytics(
        &self,
        range: AnalyticsRange,
    ) -> Result<RequestAnalytics>;

    async fn add_request_comment(
        &self,
        request_id: Uuid,
        user_id: i64,
        body: &str,
    ) -> Result<RequestComment>;

    async fn list_request_comments(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<RequestComment>>;
}

/// Read-only port used by the request-limit service.
#[async_trait]
pub trait RequestUsageReadPort: Send + Sync {
    async fn count_user_requests_since(
        &self,
        user_id: i64,
        request_type: RequestType,
        since: DateTime<Utc>,
    ) -> Result<i64>;
}
