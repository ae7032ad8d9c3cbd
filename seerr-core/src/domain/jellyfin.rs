use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MediaKind;

/// Cached presence of a Jellyfin library item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JellyfinAvailability {
    pub id: i64,
    pub jellyfin_item_id: String,
    pub media_type: MediaKind,
    pub tmdb_id: Option<i64>,
    pub tvdb_id: Option<i64>,
    pub title: String,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub library_id: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JellyfinItemUpsert {
    pub jellyfin_item_id: String,
    pub media_type: MediaKind,
    pub tmdb_id: Option<i64>,
    pub tvdb_id: Option<i64>,
    pub title: String,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub library_id: Option<String>,
}

/// Outcome of an availability upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityUpsert {
    pub id: i64,
    /// True when the row did not exist before.
    pub inserted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JellyfinScan {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub items_scanned: i32,
    pub items_added: i32,
    pub error: Option<String>,
}

impl JellyfinScan {
    pub fn is_running(&self) -> bool {
        self.finished_at.is_none()
    }

    pub fn succeeded(&self) -> bool {
        self.finished_at.is_some() && self.error.is_none()
    }
}
