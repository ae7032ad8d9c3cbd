use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MediaKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarPreferences {
    pub user_id: i64,
    pub default_view: String,
    pub show_movies: bool,
    pub show_tv: bool,
    pub only_monitored: bool,
}

impl CalendarPreferences {
    pub fn defaults_for(user_id: i64) -> Self {
        Self {
            user_id,
            default_view: "month".to_string(),
            show_movies: true,
            show_tv: true,
            only_monitored: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSubscription {
    pub id: i64,
    pub user_id: i64,
    pub event_type: String,
    pub media_type: MediaKind,
    pub tmdb_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeedToken {
    pub user_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
}
