pub mod calendar;
pub mod jellyfin;
pub mod jobs;
pub mod media;
pub mod notifications;
pub mod requests;
pub mod rules;
pub mod settings;
pub mod tokens;
pub mod users;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeerrError};

/// One page of a listing plus the total row count of the unpaged query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as i64) < self.total
    }
}

/// TMDB media kind used by the user-facing stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = SeerrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "tv" => Ok(MediaKind::Tv),
            other => Err(SeerrError::Internal(format!("Unknown media type: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_reports_remaining_rows() {
        let page = Page {
            items: vec![1, 2, 3, 4, 5],
            total: 25,
            limit: 10,
            offset: 20,
        };
        assert!(!page.has_more());

        let first = Page {
            items: vec![0; 10],
            total: 25,
            limit: 10,
            offset: 0,
        };
        assert!(first.has_more());
    }
}
