use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::MediaKind;
use crate::domain::jellyfin::{
    AvailabilityUpsert, JellyfinAvailability, JellyfinItemUpsert, JellyfinScan,
};
use crate::error::Result;

#[async_trait]
pub trait JellyfinAvailabilityRepository: Send + Sync {
    async fn upsert_availability(
        &self,
        item: JellyfinItemUpsert,
    ) -> Result<AvailabilityUpsert>;
    async fn get_availability_by_tmdb(
        &self,
        media_type: MediaKind,
        tmdb_id: i64,
    ) -> Result<Vec<JellyfinAvailability>>;
    async fn list_availability_by_tmdb_ids(
        &self,
        media_type: MediaKind,
        tmdb_ids: &[i64],
    ) -> Result<Vec<JellyfinAvailability>>;
    /// Remove items the last full scan did not see.
    async fn delete_stale_availability(
        &self,
        seen_before: DateTime<Utc>,
    ) -> Result<u64>;

    async fn start_scan(&self) -> Result<JellyfinScan>;
    async fn finish_scan(
        &self,
        scan_id: i64,
        items_scanned: i32,
        items_added: i32,
        error: Option<&str>,
    ) -> Result<bool>;
    async fn latest_scan(&self) -> Result<Option<JellyfinScan>>;
}
