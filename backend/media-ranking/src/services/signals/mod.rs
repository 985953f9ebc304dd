// ============================================
// Signal Extractor (偏好信號提取)
// ============================================
//
// Turns a user's raw interaction history into weighted affinity maps:
// - Watch history: time decay × completion bonus
// - Favorites: flat boost to category and content type
// - Ratings: sentiment (+2 / +0.5 / -1) onto category, speaker, tags
// - Playlists: flat boost to category and speaker
// - Search history: recency-ranked search terms become tag interests
//
// The output PreferenceMap is rebuilt on every ranking call and never
// persisted. Missing fields contribute nothing; references to content
// outside the candidate pool are skipped.

use crate::models::{ContentItem, ContentType, SearchEntry, UserHistory};
use crate::utils::{days_since, linear_decay};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Sparse string → weight map with add-or-initialize semantics.
///
/// Backed by a BTreeMap so iteration order (and therefore float summation
/// order in keyword matching) is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AffinityMap {
    scores: BTreeMap<String, f64>,
}

impl AffinityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to `key`, starting from 0. Blank keys are ignored.
    pub fn add(&mut self, key: &str, delta: f64) {
        let key = key.trim();
        if key.is_empty() || !delta.is_finite() {
            return;
        }
        *self.scores.entry(key.to_string()).or_insert(0.0) += delta;
    }

    /// Accumulated weight, 0.0 for unknown keys.
    pub fn get(&self, key: &str) -> f64 {
        self.scores.get(key.trim()).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scores.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContentTypePrefs {
    pub video: f64,
    pub audio: f64,
}

impl ContentTypePrefs {
    pub fn add(&mut self, content_type: ContentType, delta: f64) {
        match content_type {
            ContentType::Video => self.video += delta,
            ContentType::Audio => self.audio += delta,
        }
    }

    pub fn get(&self, content_type: ContentType) -> f64 {
        match content_type {
            ContentType::Video => self.video,
            ContentType::Audio => self.audio,
        }
    }
}

/// Per-user affinities derived from history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceMap {
    pub category_scores: AffinityMap,
    pub speaker_scores: AffinityMap,
    /// Keys are lower-cased
    pub tag_scores: AffinityMap,
    pub content_type_prefs: ContentTypePrefs,
    pub recent_categories: BTreeSet<String>,
}

impl PreferenceMap {
    /// No signal at all (anonymous or brand-new user).
    pub fn is_empty(&self) -> bool {
        self.category_scores.is_empty()
            && self.speaker_scores.is_empty()
            && self.tag_scores.is_empty()
            && self.content_type_prefs == ContentTypePrefs::default()
            && self.recent_categories.is_empty()
    }
}

/// Tunables for signal extraction.
#[derive(Debug, Clone)]
pub struct SignalWeights {
    /// Watch age at which time decay bottoms out
    pub watch_decay_horizon_days: f64,
    pub watch_decay_floor: f64,
    /// Age assumed when `last_watched` is missing
    pub default_watch_age_days: f64,
    pub completed_bonus: f64,
    pub high_progress_bonus: f64,
    pub mid_progress_bonus: f64,
    pub low_progress_bonus: f64,
    /// Percent thresholds for the high and mid progress bonuses
    pub high_progress_threshold: f64,
    pub mid_progress_threshold: f64,
    pub watch_category_weight: f64,
    pub watch_speaker_weight: f64,
    pub watch_type_weight: f64,
    /// Watches newer than this mark their category as recent
    pub recent_window_days: f64,
    pub favorite_category_boost: f64,
    pub favorite_type_boost: f64,
    pub positive_sentiment: f64,
    pub neutral_sentiment: f64,
    pub negative_sentiment: f64,
    pub rating_category_weight: f64,
    pub rating_speaker_weight: f64,
    pub rating_tag_weight: f64,
    pub playlist_boost: f64,
    pub max_search_terms: usize,
    pub search_decay_step: f64,
    pub search_decay_floor: f64,
    pub search_tag_weight: f64,
    /// Tokens must be longer than this many characters
    pub min_search_token_len: usize,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            watch_decay_horizon_days: 45.0,
            watch_decay_floor: 0.2,
            default_watch_age_days: 30.0,
            completed_bonus: 2.0,
            high_progress_bonus: 1.5,
            mid_progress_bonus: 1.2,
            low_progress_bonus: 0.8,
            high_progress_threshold: 70.0,
            mid_progress_threshold: 30.0,
            watch_category_weight: 3.0,
            watch_speaker_weight: 4.0,
            watch_type_weight: 1.0,
            recent_window_days: 5.0,
            favorite_category_boost: 5.0,
            favorite_type_boost: 2.0,
            positive_sentiment: 2.0,
            neutral_sentiment: 0.5,
            negative_sentiment: -1.0,
            rating_category_weight: 3.0,
            rating_speaker_weight: 4.0,
            rating_tag_weight: 2.0,
            playlist_boost: 2.0,
            max_search_terms: 15,
            search_decay_step: 0.06,
            search_decay_floor: 0.3,
            search_tag_weight: 2.0,
            min_search_token_len: 2,
        }
    }
}

pub struct SignalExtractor {
    weights: SignalWeights,
}

impl Default for SignalExtractor {
    fn default() -> Self {
        Self::new(SignalWeights::default())
    }
}

impl SignalExtractor {
    pub fn new(weights: SignalWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &SignalWeights {
        &self.weights
    }

    /// Build the preference map for one user.
    ///
    /// `pool` is the full candidate set; it resolves content ids for
    /// ratings and playlists, and fills denormalized fields missing from
    /// watch and favorite records.
    pub fn extract(
        &self,
        history: &UserHistory,
        pool: &[ContentItem],
        now: DateTime<Utc>,
    ) -> PreferenceMap {
        let index: HashMap<&str, &ContentItem> =
            pool.iter().map(|item| (item.id.as_str(), item)).collect();
        let mut prefs = PreferenceMap::default();
        let mut skipped = 0usize;

        self.apply_watches(history, &index, now, &mut prefs);
        self.apply_favorites(history, &index, &mut prefs);
        skipped += self.apply_ratings(history, &index, &mut prefs);
        skipped += self.apply_playlists(history, &index, &mut prefs);
        self.apply_searches(&history.profile.search_history, &mut prefs);

        debug!(
            categories = prefs.category_scores.len(),
            speakers = prefs.speaker_scores.len(),
            tags = prefs.tag_scores.len(),
            recent_categories = prefs.recent_categories.len(),
            skipped_references = skipped,
            "Preference map extracted"
        );

        prefs
    }

    /// Multiplier rewarding how much of an item was consumed.
    pub fn completion_bonus(&self, completed: bool, progress: Option<f64>) -> f64 {
        let w = &self.weights;
        let progress = progress.filter(|p| p.is_finite()).unwrap_or(0.0);
        if completed {
            w.completed_bonus
        } else if progress > w.high_progress_threshold {
            w.high_progress_bonus
        } else if progress > w.mid_progress_threshold {
            w.mid_progress_bonus
        } else {
            w.low_progress_bonus
        }
    }

    /// Rating → sentiment; out-of-range ratings still bucket by threshold.
    pub fn sentiment(&self, rating: u8) -> f64 {
        if rating >= 4 {
            self.weights.positive_sentiment
        } else if rating <= 2 {
            self.weights.negative_sentiment
        } else {
            self.weights.neutral_sentiment
        }
    }

    fn apply_watches(
        &self,
        history: &UserHistory,
        index: &HashMap<&str, &ContentItem>,
        now: DateTime<Utc>,
        prefs: &mut PreferenceMap,
    ) {
        let w = &self.weights;
        for record in &history.watch_history {
            let resolved = index.get(record.content_id.as_str()).copied();

            let days = record
                .last_watched
                .map(|ts| days_since(now, ts))
                .unwrap_or(w.default_watch_age_days);
            let time_decay = linear_decay(days, w.watch_decay_horizon_days, w.watch_decay_floor);
            let weight =
                time_decay * self.completion_bonus(record.completed, record.progress_percentage);

            let category = record
                .content_category
                .as_deref()
                .or_else(|| resolved.and_then(|c| c.category.as_deref()));
            let speaker = record
                .content_speaker
                .as_deref()
                .or_else(|| resolved.and_then(|c| c.speaker.as_deref()));
            let content_type = record
                .content_type
                .or_else(|| resolved.and_then(|c| c.content_type));

            if let Some(category) = category {
                prefs
                    .category_scores
                    .add(category, weight * w.watch_category_weight);
                if days < w.recent_window_days && !category.trim().is_empty() {
                    prefs.recent_categories.insert(category.trim().to_string());
                }
            }
            if let Some(speaker) = speaker {
                prefs
                    .speaker_scores
                    .add(speaker, weight * w.watch_speaker_weight);
            }
            if let Some(content_type) = content_type {
                prefs
                    .content_type_prefs
                    .add(content_type, weight * w.watch_type_weight);
            }
        }
    }

    fn apply_favorites(
        &self,
        history: &UserHistory,
        index: &HashMap<&str, &ContentItem>,
        prefs: &mut PreferenceMap,
    ) {
        let w = &self.weights;
        for record in &history.favorites {
            let resolved = index.get(record.content_id.as_str()).copied();

            let category = record
                .content_category
                .as_deref()
                .or_else(|| resolved.and_then(|c| c.category.as_deref()));
            let content_type = record
                .content_type
                .or_else(|| resolved.and_then(|c| c.content_type));

            if let Some(category) = category {
                prefs.category_scores.add(category, w.favorite_category_boost);
            }
            if let Some(content_type) = content_type {
                prefs
                    .content_type_prefs
                    .add(content_type, w.favorite_type_boost);
            }
        }
    }

    /// Returns the number of ratings skipped.
    fn apply_ratings(
        &self,
        history: &UserHistory,
        index: &HashMap<&str, &ContentItem>,
        prefs: &mut PreferenceMap,
    ) -> usize {
        let w = &self.weights;
        let mut skipped = 0;
        for record in &history.ratings {
            let (Some(rating), Some(content)) =
                (record.rating, index.get(record.content_id.as_str()))
            else {
                skipped += 1;
                continue;
            };

            let sentiment = self.sentiment(rating);
            if let Some(category) = content.category.as_deref() {
                prefs
                    .category_scores
                    .add(category, sentiment * w.rating_category_weight);
            }
            if let Some(speaker) = content.speaker.as_deref() {
                prefs
                    .speaker_scores
                    .add(speaker, sentiment * w.rating_speaker_weight);
            }
            for tag in &content.tags {
                prefs
                    .tag_scores
                    .add(&tag.to_lowercase(), sentiment * w.rating_tag_weight);
            }
        }
        skipped
    }

    /// Returns the number of playlist entries skipped.
    fn apply_playlists(
        &self,
        history: &UserHistory,
        index: &HashMap<&str, &ContentItem>,
        prefs: &mut PreferenceMap,
    ) -> usize {
        let w = &self.weights;
        let mut skipped = 0;
        for content_id in &history.playlist_content_ids {
            let Some(content) = index.get(content_id.as_str()) else {
                skipped += 1;
                continue;
            };
            if let Some(category) = content.category.as_deref() {
                prefs.category_scores.add(category, w.playlist_boost);
            }
            if let Some(speaker) = content.speaker.as_deref() {
                prefs.speaker_scores.add(speaker, w.playlist_boost);
            }
        }
        skipped
    }

    fn apply_searches(&self, searches: &[SearchEntry], prefs: &mut PreferenceMap) {
        let w = &self.weights;

        // Newest first; entries without a timestamp sort as oldest
        let mut ordered: Vec<&SearchEntry> = searches.iter().collect();
        ordered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        for (rank, entry) in ordered.into_iter().take(w.max_search_terms).enumerate() {
            let weight = (1.0 - rank as f64 * w.search_decay_step).max(w.search_decay_floor);
            for token in entry.term.split_whitespace() {
                if token.chars().count() > w.min_search_token_len {
                    prefs
                        .tag_scores
                        .add(&token.to_lowercase(), weight * w.search_tag_weight);
                }
            }
        }
    }
}
