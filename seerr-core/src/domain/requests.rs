use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SeerrError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Movie,
    Episode,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Movie => "movie",
            RequestType::Episode => "episode",
        }
    }

    /// Provider that fulfils this kind of request.
    pub fn provider(&self) -> Provider {
        match self {
            RequestType::Movie => Provider::Radarr,
            RequestType::Episode => Provider::Sonarr,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = SeerrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "movie" => Ok(RequestType::Movie),
            "episode" => Ok(RequestType::Episode),
            other => Err(SeerrError::Internal(format!(
                "Unknown request type: {other}"
            ))),
        }
    }
}

/// Status of a request (and of its items) along the fulfilment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    Pending,
    Submitted,
    Downloading,
    Available,
    PartiallyAvailable,
    Denied,
    Failed,
    Removed,
}

impl RequestStatus {
    /// Statuses that hold the uniqueness slot for a piece of media. The
    /// partial unique indexes in `migrations/` must list the same set.
    pub const ACTIVE: [RequestStatus; 3] = [
        RequestStatus::Queued,
        RequestStatus::Pending,
        RequestStatus::Submitted,
    ];

    /// Statuses counted as "approved" by analytics.
    pub const APPROVED: [RequestStatus; 4] = [
        RequestStatus::Submitted,
        RequestStatus::Downloading,
        RequestStatus::Available,
        RequestStatus::PartiallyAvailable,
    ];

    pub const ALL: [RequestStatus; 9] = [
        RequestStatus::Queued,
        RequestStatus::Pending,
        RequestStatus::Submitted,
        RequestStatus::Downloading,
        RequestStatus::Available,
        RequestStatus::PartiallyAvailable,
        RequestStatus::Denied,
        RequestStatus::Failed,
        RequestStatus::Removed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Queued => "queued",
            RequestStatus::Pending => "pending",
            RequestStatus::Submitted => "submitted",
            RequestStatus::Downloading => "downloading",
            RequestStatus::Available => "available",
            RequestStatus::PartiallyAvailable => "partially_available",
            RequestStatus::Denied => "denied",
            RequestStatus::Failed => "failed",
            RequestStatus::Removed => "removed",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Denied
                | RequestStatus::Failed
                | RequestStatus::Removed
                | RequestStatus::Available
        )
    }

    /// Whether the pipeline allows moving from `self` to `next`. Staying in
    /// the same status is always allowed.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;

        if *self == next {
            return true;
        }

        match self {
            Queued => matches!(
                next,
                Pending | Submitted | Denied | Failed | Removed
            ),
            Pending => matches!(next, Submitted | Denied | Failed | Removed),
            Submitted => matches!(
                next,
                Downloading
                    | Available
                    | PartiallyAvailable
                    | Denied
                    | Failed
                    | Removed
            ),
            Downloading => matches!(
                next,
                Available | PartiallyAvailable | Failed | Removed
            ),
            PartiallyAvailable => {
                matches!(next, Available | Downloading | Failed | Removed)
            }
            Available => matches!(next, Removed),
            Denied | Failed | Removed => false,
        }
    }

    pub fn names(statuses: &[RequestStatus]) -> Vec<String> {
        statuses.iter().map(|s| s.as_str().to_string()).collect()
    }

    pub fn active_names() -> Vec<String> {
        Self::names(&Self::ACTIVE)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = SeerrError;

    fn from_str(s: &str) -> Result<Self> {
        RequestStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                SeerrError::Internal(format!("Unknown request status: {s}"))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Sonarr,
    Radarr,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Sonarr => "sonarr",
            Provider::Radarr => "radarr",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = SeerrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sonarr" => Ok(Provider::Sonarr),
            "radarr" => Ok(Provider::Radarr),
            other => {
                Err(SeerrError::Internal(format!("Unknown provider: {other}")))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    pub id: Uuid,
    pub request_type: RequestType,
    pub tmdb_id: i64,
    pub title: String,
    pub status: RequestStatus,
    pub requested_by: i64,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_year: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItem {
    pub id: i64,
    pub request_id: Uuid,
    pub provider: Provider,
    pub provider_id: Option<i64>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Request row joined with the requester's username, as listed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequestSummary {
    #[serde(flatten)]
    pub request: MediaRequest,
    pub requested_by_username: String,
    pub item_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequestWithItems {
    #[serde(flatten)]
    pub request: MediaRequest,
    pub items: Vec<RequestItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequestItem {
    pub provider: Provider,
    pub provider_id: Option<i64>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
}

impl NewRequestItem {
    pub fn movie(provider_id: Option<i64>) -> Self {
        Self {
            provider: Provider::Radarr,
            provider_id,
            season: None,
            episode: None,
        }
    }

    pub fn episode(season: i32, episode: i32) -> Self {
        Self {
            provider: Provider::Sonarr,
            provider_id: None,
            season: Some(season),
            episode: Some(episode),
        }
    }

    pub fn with_provider_id(mut self, provider_id: i64) -> Self {
        self.provider_id = Some(provider_id);
        self
    }
}

/// Input for the transactional create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaRequest {
    pub request_type: RequestType,
    pub tmdb_id: i64,
    pub title: String,
    pub requested_by: i64,
    /// Status the rows are inserted with (defaults to queued).
    pub status: Option<RequestStatus>,
    /// Status applied after the items are in place, within the same
    /// transaction. Lets callers record "created already submitted".
    pub final_status: Option<RequestStatus>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_year: Option<i32>,
    pub items: Vec<NewRequestItem>,
}

impl NewMediaRequest {
    pub fn movie(
        tmdb_id: i64,
        title: impl Into<String>,
        requested_by: i64,
    ) -> Self {
        Self {
            request_type: RequestType::Movie,
            tmdb_id,
            title: title.into(),
            requested_by,
            status: None,
            final_status: None,
            poster_path: None,
            backdrop_path: None,
            release_year: None,
            items: vec![NewRequestItem::movie(None)],
        }
    }

    pub fn episodes(
        tmdb_id: i64,
        title: impl Into<String>,
        requested_by: i64,
        season: i32,
        episodes: impl IntoIterator<Item = i32>,
    ) -> Self {
        Self {
            request_type: RequestType::Episode,
            tmdb_id,
            title: title.into(),
            requested_by,
            status: None,
            final_status: None,
            poster_path: None,
            backdrop_path: None,
            release_year: None,
            items: episodes
                .into_iter()
                .map(|episode| NewRequestItem::episode(season, episode))
                .collect(),
        }
    }

    pub fn initial_status(&self) -> RequestStatus {
        self.status.unwrap_or(RequestStatus::Queued)
    }

    /// Second status to apply inside the create transaction, if any.
    pub fn pending_final_status(&self) -> Option<RequestStatus> {
        self.final_status
            .filter(|status| *status != self.initial_status())
    }

    /// Items ordered by (season, episode). Inserting in this order makes
    /// concurrent creates take episode index locks in the same sequence.
    pub fn items_in_lock_order(&self) -> Vec<&NewRequestItem> {
        let mut items: Vec<&NewRequestItem> = self.items.iter().collect();
        items.sort_by_key(|item| (item.season, item.episode));
        items
    }

    /// (season, episode) pairs requested, in input order.
    pub fn episode_pairs(&self) -> Vec<(i32, i32)> {
        self.items
            .iter()
            .filter_map(|item| item.season.zip(item.episode))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.tmdb_id <= 0 {
            return Err(SeerrError::InvalidInput(format!(
                "tmdb id must be positive, got {}",
                self.tmdb_id
            )));
        }
        if self.title.trim().is_empty() {
            return Err(SeerrError::InvalidInput(
                "request title must not be empty".into(),
            ));
        }

        let expected_provider = self.request_type.provider();
        if let Some(item) =
            self.items.iter().find(|i| i.provider != expected_provider)
        {
            return Err(SeerrError::InvalidInput(format!(
                "{} requests must use {} items, got {}",
                self.request_type, expected_provider, item.provider
            )));
        }

        match self.request_type {
            RequestType::Movie => {
                if self.items.len() != 1 {
                    return Err(SeerrError::InvalidInput(format!(
                        "movie requests carry exactly one item, got {}",
                        self.items.len()
                    )));
                }
                if self
                    .items
                    .iter()
                    .any(|i| i.season.is_some() || i.episode.is_some())
                {
                    return Err(SeerrError::InvalidInput(
                        "movie items cannot target a season or episode"
                            .into(),
                    ));
                }
            }
            RequestType::Episode => {
                if self.items.is_empty() {
                    return Err(SeerrError::InvalidInput(
                        "episode requests need at least one episode".into(),
                    ));
                }
                let mut seen = HashSet::new();
                for item in &self.items {
                    let (Some(season), Some(episode)) =
                        (item.season, item.episode)
                    else {
                        return Err(SeerrError::InvalidInput(
                            "episode items need both season and episode"
                                .into(),
                        ));
                    };
                    if season < 0 || episode < 1 {
                        return Err(SeerrError::InvalidInput(format!(
                            "invalid episode S{season}E{episode}"
                        )));
                    }
                    if !seen.insert((season, episode)) {
                        return Err(SeerrError::InvalidInput(format!(
                            "episode S{season}E{episode} listed twice"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Minimal view of an active request, used for "already requested" checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRequestRef {
    pub id: Uuid,
    pub request_type: RequestType,
    pub tmdb_id: i64,
    pub status: RequestStatus,
    pub requested_by: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRequestStatus {
    pub request_id: Uuid,
    pub item_id: i64,
    pub season: i32,
    pub episode: i32,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestListFilter {
    /// Empty means every status.
    pub statuses: Vec<RequestStatus>,
    pub request_type: Option<RequestType>,
    pub requested_by: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

impl RequestListFilter {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn page(limit: i64, offset: i64) -> Self {
        Self {
            limit,
            offset,
            ..Self::default()
        }
    }

    /// Clamp paging values into the accepted range.
    pub fn normalized(&self) -> (i64, i64) {
        (self.limit.clamp(1, Self::MAX_LIMIT), self.offset.max(0))
    }
}

impl Default for RequestListFilter {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            request_type: None,
            requested_by: None,
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestComment {
    pub id: i64,
    pub request_id: Uuid,
    pub user_id: i64,
    pub username: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Inclusive time window for analytics. Unbounded sides are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyticsRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: RequestStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopRequester {
    pub user_id: i64,
    pub username: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRequestCount {
    pub day: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAnalytics {
    pub total_requests: i64,
    pub movie_requests: i64,
    pub tv_requests: i64,
    pub by_status: Vec<StatusCount>,
    pub top_requesters: Vec<TopRequester>,
    /// Thirty entries, oldest first, zero-filled.
    pub daily: Vec<DailyRequestCount>,
    /// Mean age in hours of requests currently in an approved status. This
    /// is not creation-to-approval latency; no approval timestamp is stored.
    pub average_approval_hours: Option<f64>,
}

impl RequestAnalytics {
    pub fn status_count(&self, status: RequestStatus) -> i64 {
        self.by_status
            .iter()
            .find(|entry| entry.status == status)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_set_is_queued_pending_submitted() {
        let active: Vec<_> = RequestStatus::ALL
            .iter()
            .filter(|s| s.is_active())
            .map(|s| s.as_str())
            .collect();
        assert_eq!(active, vec!["queued", "pending", "submitted"]);
    }

    #[test]
    fn migrations_index_the_same_active_set() {
        let sql = include_str!("../../migrations/20250101000002_requests.sql");
        let predicate = format!(
            "status IN ({})",
            RequestStatus::ACTIVE
                .iter()
                .map(|s| format!("'{}'", s.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        assert_eq!(sql.matches(&predicate).count(), 2, "{predicate}");
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in RequestStatus::ALL {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("approved".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn pipeline_transitions() {
        use RequestStatus::*;
        assert!(Queued.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Downloading));
        assert!(Downloading.can_transition_to(PartiallyAvailable));
        assert!(PartiallyAvailable.can_transition_to(Available));
        assert!(Pending.can_transition_to(Denied));
        assert!(Downloading.can_transition_to(Failed));
        assert!(!Available.can_transition_to(Queued));
        assert!(!Denied.can_transition_to(Pending));
        assert!(!Downloading.can_transition_to(Submitted));
        assert!(Failed.can_transition_to(Failed));
    }

    #[test]
    fn validate_rejects_duplicate_episodes() {
        let request =
            NewMediaRequest::episodes(100, "Show", 1, 1, [1, 2, 1]);
        let err = request.validate().unwrap_err();
        assert!(matches!(err, SeerrError::InvalidInput(_)));
    }

    #[test]
    fn validate_rejects_movie_items_with_episodes() {
        let mut request = NewMediaRequest::movie(603, "The Matrix", 1);
        request.items = vec![NewRequestItem {
            provider: Provider::Radarr,
            provider_id: None,
            season: Some(1),
            episode: Some(1),
        }];
        assert!(request.validate().is_err());

        let mut wrong_provider = NewMediaRequest::movie(603, "The Matrix", 1);
        wrong_provider.items = vec![NewRequestItem::episode(1, 1)];
        assert!(wrong_provider.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_requests() {
        NewMediaRequest::movie(603, "The Matrix", 1).validate().unwrap();
        NewMediaRequest::episodes(100, "Show", 1, 0, [1, 2, 3])
            .validate()
            .unwrap();
    }

    #[test]
    fn final_status_only_applies_when_different() {
        let mut request = NewMediaRequest::movie(603, "The Matrix", 1);
        request.final_status = Some(RequestStatus::Queued);
        assert_eq!(request.pending_final_status(), None);

        request.final_status = Some(RequestStatus::Submitted);
        assert_eq!(
            request.pending_final_status(),
            Some(RequestStatus::Submitted)
        );
    }

    #[test]
    fn items_are_inserted_in_season_episode_order() {
        let mut request = NewMediaRequest::episodes(100, "Show", 1, 2, [3, 1]);
        request.items.push(NewRequestItem::episode(1, 9));

        let order: Vec<_> = request
            .items_in_lock_order()
            .iter()
            .map(|item| (item.season, item.episode))
            .collect();
        assert_eq!(
            order,
            vec![(Some(1), Some(9)), (Some(2), Some(1)), (Some(2), Some(3))]
        );
        assert_eq!(request.episode_pairs(), vec![(2, 3), (2, 1), (1, 9)]);
    }

    #[test]
    fn list_filter_clamps_paging() {
        let filter = RequestListFilter::page(500, -3);
        assert_eq!(filter.normalized(), (100, 0));
        assert_eq!(RequestListFilter::page(0, 20).normalized(), (1, 20));
    }
}
