use async_trait::async_trait;

use crate::domain::media::{
    DashboardSlider, DashboardSliderInput, IssueStatus, ListMembership,
    ListType, MediaIssue, MediaListItem, MediaShare, NewMediaIssue,
    NewMediaShare, RecentlyViewed,
};
use crate::domain::{MediaKind, Page};
use crate::error::Result;

#[async_trait]
pub trait SharesRepository: Send + Sync {
    async fn upsert_share(&self, share: NewMediaShare) -> Result<MediaShare>;
    /// Share behind `token`, unless it has expired.
    async fn get_active_share(&self, token: &str) -> Result<Option<MediaShare>>;
    async fn record_share_view(&self, token: &str) -> Result<bool>;
    async fn list_user_shares(&self, user_id: i64) -> Result<Vec<MediaShare>>;
    async fn delete_user_share(&self, user_id: i64, id: i64) -> Result<bool>;
    async fn purge_expired_shares(&self) -> Result<u64>;
}

#[async_trait]
pub trait IssuesRepository: Send + Sync {
    async fn create_issue(&self, issue: NewMediaIssue) -> Result<MediaIssue>;
    async fn get_issue(&self, id: i64) -> Result<Option<MediaIssue>>;
    async fn list_issues(
        &self,
        status: Option<IssueStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Page<MediaIssue>>;
    async fn list_user_issues(&self, user_id: i64) -> Result<Vec<MediaIssue>>;
    async fn resolve_issue(&self, id: i64) -> Result<bool>;
    async fn reopen_issue(&self, id: i64) -> Result<bool>;
    async fn delete_user_issue(&self, user_id: i64, id: i64) -> Result<bool>;
    async fn count_open_issues(&self) -> Result<i64>;
}

#[async_trait]
pub trait RecentlyViewedRepository: Send + Sync {
    /// Upsert per (user, media); a repeat view refreshes the timestamp.
    async fn record_view(
        &self,
        user_id: i64,
        media_type: MediaKind,
        tmdb_id: i64,
        title: &str,
        poster_path: Option<&str>,
    ) -> Result<RecentlyViewed>;
    async fn list_recent(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<RecentlyViewed>>;
    async fn clear_recent(&self, user_id: i64) -> Result<u64>;
    /// Keep only the `keep` most recent entries.
    async fn trim_recent(&self, user_id: i64, keep: i64) -> Result<u64>;
}

#[async_trait]
pub trait MediaListsRepository: Send + Sync {
    /// Idempotent; `true` only when the entry was new.
    async fn add_to_list(
        &self,
        user_id: i64,
        list_type: ListType,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<bool>;
    async fn remove_from_list(
        &self,
        user_id: i64,
        list_type: ListType,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<bool>;
    async fn list_items(
        &self,
        user_id: i64,
        list_type: ListType,
    ) -> Result<Vec<MediaListItem>>;
    /// One entry per requested id, in input order.
    async fn list_membership(
        &self,
        user_id: i64,
        media_type: MediaKind,
        tmdb_ids: &[i64],
    ) -> Result<Vec<ListMembership>>;
}

#[async_trait]
pub trait DashboardSlidersRepository: Send + Sync {
    async fn list_sliders(&self, user_id: i64) -> Result<Vec<DashboardSlider>>;
    async fn upsert_slider(
        &self,
        user_id: i64,
        slider: DashboardSliderInput,
    ) -> Result<DashboardSlider>;
    async fn delete_slider(&self, user_id: i64, id: i64) -> Result<bool>;
    /// Rewrite positions to follow `ordered_ids`. All ids must belong to
    /// the user; otherwise nothing changes.
    async fn reorder_sliders(
        &self,
        user_id: i64,
        ordered_ids: &[i64],
    ) -> Result<()>;
    async fn reset_sliders(&self, user_id: i64) -> Result<u64>;
}
