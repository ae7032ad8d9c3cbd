use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MediaKind;
use crate::error::{Result, SeerrError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaShare {
    pub id: i64,
    pub token: String,
    pub created_by: i64,
    pub media_type: MediaKind,
    pub tmdb_id: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub view_count: i32,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaShare {
    pub token: String,
    pub created_by: i64,
    pub media_type: MediaKind,
    pub tmdb_id: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    Resolved,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = SeerrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(IssueStatus::Open),
            "resolved" => Ok(IssueStatus::Resolved),
            other => Err(SeerrError::Internal(format!("Unknown issue status: {other}"))),
        }
    }
}

/// Playback or quality problem reported against a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaIssue {
    pub id: i64,
    pub reported_by: i64,
    pub media_type: MediaKind,
    pub tmdb_id: i64,
    pub title: String,
    pub category: String,
    pub description: String,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub status: IssueStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaIssue {
    pub reported_by: i64,
    pub media_type: MediaKind,
    pub tmdb_id: i64,
    pub title: String,
    pub category: String,
    pub description: String,
    pub season: Option<i32>,
    pub episode: Option<i32>,
}

impl NewMediaIssue {
    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(SeerrError::InvalidInput(
                "issue category must not be empty".into(),
            ));
        }
        if self.episode.is_some() && self.season.is_none() {
            return Err(SeerrError::InvalidInput(
                "an issue episode needs a season".into(),
            ));
        }
        if self.media_type == MediaKind::Movie && self.season.is_some() {
            return Err(SeerrError::InvalidInput(
                "movie issues cannot target a season".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentlyViewed {
    pub id: i64,
    pub user_id: i64,
    pub media_type: MediaKind,
    pub tmdb_id: i64,
    pub title: String,
    pub poster_path: Option<String>,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListType {
    Watchlist,
    Favorite,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Watchlist => "watchlist",
            ListType::Favorite => "favorite",
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListType {
    type Err = SeerrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "watchlist" => Ok(ListType::Watchlist),
            "favorite" => Ok(ListType::Favorite),
            other => Err(SeerrError::Internal(format!("Unknown list type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaListItem {
    pub id: i64,
    pub user_id: i64,
    pub list_type: ListType,
    pub media_type: MediaKind,
    pub tmdb_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Which lists a title is on, for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMembership {
    pub tmdb_id: i64,
    pub watchlist: bool,
    pub favorite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSlider {
    pub id: i64,
    pub user_id: i64,
    pub slider_type: String,
    pub title: String,
    pub data: Option<String>,
    pub enabled: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSliderInput {
    pub slider_type: String,
    pub title: String,
    pub data: Option<String>,
    pub enabled: bool,
    pub position: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue() -> NewMediaIssue {
        NewMediaIssue {
            reported_by: 1,
            media_type: MediaKind::Tv,
            tmdb_id: 1399,
            title: "Show".into(),
            category: "audio".into(),
            description: String::new(),
            season: Some(1),
            episode: Some(2),
        }
    }

    #[test]
    fn issue_validation() {
        issue().validate().unwrap();

        let mut orphan_episode = issue();
        orphan_episode.season = None;
        assert!(orphan_episode.validate().is_err());

        let mut movie = issue();
        movie.media_type = MediaKind::Movie;
        assert!(movie.validate().is_err());

        let mut blank = issue();
        blank.category = "  ".into();
        assert!(blank.validate().is_err());
    }
}
