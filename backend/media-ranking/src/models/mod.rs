use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use crate::error::RankingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Audio,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Video => "video",
            ContentType::Audio => "audio",
        }
    }
}

/// A video or audio item from the library.
///
/// Every field except `id` is optional on the wire; records come from
/// user uploads and are not validated before they reach the ranker.
/// A field that fails to decode is treated as missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub content_type: Option<ContentType>,
    #[serde(default, deserialize_with = "lenient")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub speaker: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub view_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub play_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub featured: bool,
    /// Seconds
    #[serde(default, deserialize_with = "lenient")]
    pub duration: Option<u32>,
}

impl ContentItem {
    /// Views for video, plays for audio; whichever is present.
    pub fn popularity_count(&self) -> u64 {
        self.view_count.or(self.play_count).unwrap_or(0)
    }

    /// Publish date, falling back to the upload date.
    pub fn release_date(&self) -> Option<DateTime<Utc>> {
        self.published_date.or(self.created_date)
    }
}

/// Playback progress for one (user, content) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchRecord {
    pub content_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub content_category: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content_speaker: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content_type: Option<ContentType>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub last_watched: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub progress_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub content_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub content_type: Option<ContentType>,
    #[serde(default, deserialize_with = "lenient")]
    pub content_category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingRecord {
    pub content_id: String,
    /// 1..=5
    #[serde(default, deserialize_with = "lenient")]
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchEntry {
    pub term: String,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceProfile {
    #[serde(default)]
    pub search_history: Vec<SearchEntry>,
}

/// Everything the ranker knows about one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserHistory {
    #[serde(default)]
    pub watch_history: Vec<WatchRecord>,
    #[serde(default)]
    pub favorites: Vec<FavoriteRecord>,
    #[serde(default)]
    pub ratings: Vec<RatingRecord>,
    /// Content ids referenced by any of the user's playlists
    #[serde(default)]
    pub playlist_content_ids: Vec<String>,
    #[serde(default)]
    pub profile: PreferenceProfile,
}

impl UserHistory {
    /// True for anonymous and brand-new users.
    pub fn is_empty(&self) -> bool {
        self.watch_history.is_empty()
            && self.favorites.is_empty()
            && self.ratings.is_empty()
            && self.playlist_content_ids.is_empty()
            && self.profile.search_history.is_empty()
    }
}

/// Badge explaining why a candidate scored well.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchReason {
    Category,
    Recent,
    Speaker,
    Interests,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::Category => "category",
            MatchReason::Recent => "recent",
            MatchReason::Speaker => "speaker",
            MatchReason::Interests => "interests",
        }
    }
}

/// Content plus scoring annotations for UI badges.
///
/// Serialized flat and snake_case, like the content record it wraps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub item: ContentItem,
    pub score: f64,
    #[serde(alias = "matchReasons")]
    pub match_reasons: Vec<MatchReason>,
    #[serde(alias = "isAIPick")]
    pub is_ai_pick: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RankMode {
    /// "For you" tab
    #[default]
    Personalized,
    Trending,
    Newest,
}

impl RankMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankMode::Personalized => "personalized",
            RankMode::Trending => "trending",
            RankMode::Newest => "newest",
        }
    }
}

impl FromStr for RankMode {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "personalized" | "for_you" | "foryou" => Ok(RankMode::Personalized),
            "trending" => Ok(RankMode::Trending),
            "newest" => Ok(RankMode::Newest),
            other => Err(RankingError::InvalidOption(format!(
                "unknown rank mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentTypeFilter {
    #[default]
    All,
    Video,
    Audio,
}

impl ContentTypeFilter {
    pub fn matches(&self, content_type: Option<ContentType>) -> bool {
        match self {
            ContentTypeFilter::All => true,
            ContentTypeFilter::Video => content_type == Some(ContentType::Video),
            ContentTypeFilter::Audio => content_type == Some(ContentType::Audio),
        }
    }
}

impl FromStr for ContentTypeFilter {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(ContentTypeFilter::All),
            "video" => Ok(ContentTypeFilter::Video),
            "audio" => Ok(ContentTypeFilter::Audio),
            other => Err(RankingError::InvalidOption(format!(
                "unknown content type filter '{}'",
                other
            ))),
        }
    }
}

/// Per-request ranking options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankOptions {
    pub mode: RankMode,
    pub content_type_filter: ContentTypeFilter,
    /// Empty or "all" disables the filter; otherwise case-insensitive match
    pub category_filter: String,
    pub page_size: usize,
    /// Seeds the discovery jitter; `None` draws from OS entropy
    pub rng_seed: Option<u64>,
    /// Personalized mode only
    pub max_consecutive_per_speaker: Option<usize>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            mode: RankMode::Personalized,
            content_type_filter: ContentTypeFilter::All,
            category_filter: String::new(),
            page_size: 20,
            rng_seed: None,
            max_consecutive_per_speaker: None,
        }
    }
}

impl RankOptions {
    pub fn matches_category(&self, category: Option<&str>) -> bool {
        let wanted = self.category_filter.trim();
        if wanted.is_empty() || wanted.eq_ignore_ascii_case("all") {
            return true;
        }
        category.is_some_and(|c| c.trim().eq_ignore_ascii_case(wanted))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// The library has no content yet
    NoContent,
    /// Content exists but none passed the active filters
    NoMatches,
}

/// Ranked page plus the counts a UI needs for its empty state.
#[derive(Debug, Clone, Serialize)]
pub struct RankOutcome {
    pub mode: RankMode,
    pub items: Vec<ScoredCandidate>,
    /// Candidates before filtering
    pub total_candidates: usize,
    /// Candidates after filtering, before truncation
    pub matched_candidates: usize,
}

impl RankOutcome {
    pub fn empty_reason(&self) -> Option<EmptyReason> {
        if !self.items.is_empty() {
            None
        } else if self.total_candidates == 0 {
            Some(EmptyReason::NoContent)
        } else if self.matched_candidates == 0 {
            Some(EmptyReason::NoMatches)
        } else {
            // page_size == 0
            None
        }
    }
}

/// Decodes a field, mapping a value of the wrong shape to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

/// RFC 3339 timestamps, or bare `YYYY-MM-DD` dates read as UTC midnight.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_datetime))
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_item_tolerates_missing_fields() {
        let item: ContentItem = serde_json::from_str(r#"{"id":"c1"}"#).unwrap();
        assert_eq!(item.id, "c1");
        assert_eq!(item.popularity_count(), 0);
        assert!(item.content_type.is_none());
        assert!(item.tags.is_empty());
        assert!(!item.featured);
    }

    #[test]
    fn test_popularity_prefers_views_then_plays() {
        let audio = ContentItem {
            id: "a".to_string(),
            play_count: Some(42),
            ..Default::default()
        };
        assert_eq!(audio.popularity_count(), 42);

        let video = ContentItem {
            id: "v".to_string(),
            view_count: Some(7),
            play_count: Some(42),
            ..Default::default()
        };
        assert_eq!(video.popularity_count(), 7);
    }

    #[test]
    fn test_parse_options() {
        assert_eq!("Trending".parse::<RankMode>().unwrap(), RankMode::Trending);
        assert_eq!("for_you".parse::<RankMode>().unwrap(), RankMode::Personalized);
        assert!("popular".parse::<RankMode>().is_err());

        assert_eq!("".parse::<ContentTypeFilter>().unwrap(), ContentTypeFilter::All);
        assert_eq!("AUDIO".parse::<ContentTypeFilter>().unwrap(), ContentTypeFilter::Audio);
        assert!("podcast".parse::<ContentTypeFilter>().is_err());
    }

    #[test]
    fn test_category_filter() {
        let mut options = RankOptions::default();
        assert!(options.matches_category(None));

        options.category_filter = "Science".to_string();
        assert!(options.matches_category(Some("science")));
        assert!(!options.matches_category(Some("history")));
        assert!(!options.matches_category(None));

        options.category_filter = "all".to_string();
        assert!(options.matches_category(Some("history")));
    }

    #[test]
    fn test_empty_reason() {
        let mut outcome = RankOutcome {
            mode: RankMode::Trending,
            items: Vec::new(),
            total_candidates: 0,
            matched_candidates: 0,
        };
        assert_eq!(outcome.empty_reason(), Some(EmptyReason::NoContent));

        outcome.total_candidates = 5;
        assert_eq!(outcome.empty_reason(), Some(EmptyReason::NoMatches));
    }

    #[test]
    fn test_scored_candidate_serializes_ui_fields() {
        let scored = ScoredCandidate {
            item: ContentItem {
                id: "c1".to_string(),
                content_type: Some(ContentType::Audio),
                ..Default::default()
            },
            score: 12.5,
            match_reasons: vec![MatchReason::Category, MatchReason::Recent],
            is_ai_pick: true,
        };

        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["id"], "c1");
        assert_eq!(json["type"], "audio");
        assert_eq!(json["match_reasons"][1], "recent");
        assert_eq!(json["is_ai_pick"], true);
        assert!(json.get("matchReasons").is_none());
        assert!(json.get("view_count").is_some());
    }

    #[test]
    fn test_malformed_fields_decode_as_missing() {
        let item: ContentItem = serde_json::from_str(
            r#"{
                "id": "c9",
                "type": "podcast",
                "category": 42,
                "tags": ["ok", 7],
                "view_count": -3,
                "play_count": "lots",
                "published_date": "2026-10-01",
                "created_date": "yesterday",
                "featured": "yes",
                "duration": 95
            }"#,
        )
        .unwrap();

        assert!(item.content_type.is_none());
        assert!(item.category.is_none());
        assert!(item.tags.is_empty());
        assert_eq!(item.popularity_count(), 0);
        assert_eq!(
            item.published_date,
            Some(Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap())
        );
        assert!(item.created_date.is_none());
        assert!(!item.featured);
        assert_eq!(item.duration, Some(95));
    }

    #[test]
    fn test_malformed_history_fields_decode_as_missing() {
        let history: UserHistory = serde_json::from_str(
            r#"{
                "watch_history": [
                    { "content_id": "c1", "content_type": "film", "last_watched": 17, "completed": null }
                ],
                "ratings": [ { "content_id": "c2", "rating": 900 } ]
            }"#,
        )
        .unwrap();

        let watch = &history.watch_history[0];
        assert!(watch.content_type.is_none());
        assert!(watch.last_watched.is_none());
        assert!(!watch.completed);
        assert!(history.ratings[0].rating.is_none());
    }
}
