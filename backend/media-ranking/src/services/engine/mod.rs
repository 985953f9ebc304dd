// ============================================
// Recommendation Engine (推薦引擎)
// ============================================
//
// Pipeline for one request:
//   Filter → Signal extraction → Scoring → Mode ordering → Diversity → Truncate
//
// Pure and synchronous: all data is fetched by the caller beforehand.
// Given the same history, candidates, options (including rng_seed) and
// `now`, the output is identical.

use crate::error::Result;
use crate::models::{
    ContentItem, RankMode, RankOptions, RankOutcome, ScoredCandidate, UserHistory,
};
use crate::services::diversity::DiversityLayer;
use crate::services::ranking::RankingLayer;
use crate::services::scoring::{ContentScorer, ScoringPolicy};
use crate::services::signals::{PreferenceMap, SignalExtractor, SignalWeights};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::info;

pub struct RecommendationEngine {
    extractor: SignalExtractor,
    scorer: ContentScorer,
    ranking: RankingLayer,
}

impl RecommendationEngine {
    pub fn new(policy: ScoringPolicy) -> Result<Self> {
        Self::with_layers(SignalWeights::default(), policy, RankingLayer::new())
    }

    pub fn with_layers(
        weights: SignalWeights,
        policy: ScoringPolicy,
        ranking: RankingLayer,
    ) -> Result<Self> {
        Ok(Self {
            extractor: SignalExtractor::new(weights),
            scorer: ContentScorer::new(policy)?,
            ranking,
        })
    }

    pub fn scorer(&self) -> &ContentScorer {
        &self.scorer
    }

    /// Affinities for `history`, resolved against the full candidate pool.
    pub fn preferences(
        &self,
        history: &UserHistory,
        candidates: &[ContentItem],
        now: DateTime<Utc>,
    ) -> PreferenceMap {
        self.extractor.extract(history, candidates, now)
    }

    /// Rank `candidates` for one user and view.
    ///
    /// Never fails on data quality: an empty pool, an empty history or
    /// malformed records all produce a (possibly empty) outcome.
    pub fn rank(
        &self,
        history: &UserHistory,
        candidates: &[ContentItem],
        options: &RankOptions,
        now: DateTime<Utc>,
    ) -> RankOutcome {
        let filtered: Vec<&ContentItem> = candidates
            .iter()
            .filter(|item| options.content_type_filter.matches(item.content_type))
            .filter(|item| options.matches_category(item.category.as_deref()))
            .collect();

        let mut outcome = RankOutcome {
            mode: options.mode,
            items: Vec::new(),
            total_candidates: candidates.len(),
            matched_candidates: filtered.len(),
        };
        if filtered.is_empty() || options.page_size == 0 {
            info!(
                mode = options.mode.as_str(),
                total = outcome.total_candidates,
                matched = outcome.matched_candidates,
                "Nothing to rank"
            );
            return outcome;
        }

        let prefs = self.preferences(history, candidates, now);
        let mut rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut scored: Vec<ScoredCandidate> = filtered
            .into_iter()
            .map(|item| {
                let result = self.scorer.score(item, &prefs, now, &mut rng);
                ScoredCandidate {
                    item: item.clone(),
                    score: result.score,
                    match_reasons: result.match_reasons,
                    is_ai_pick: result.is_ai_pick,
                }
            })
            .collect();

        let has_history = !history.is_empty();
        let watched: HashSet<&str> = history
            .watch_history
            .iter()
            .map(|w| w.content_id.as_str())
            .collect();
        self.ranking
            .order(options.mode, &mut scored, has_history, &watched, now);

        outcome.items = match (options.mode, options.max_consecutive_per_speaker) {
            (RankMode::Personalized, Some(limit)) => {
                // Watched items stay behind unwatched ones, so each group is
                // re-ranked on its own.
                let (seen, unseen): (Vec<_>, Vec<_>) = scored
                    .into_iter()
                    .partition(|c| watched.contains(c.item.id.as_str()));
                let diversity = DiversityLayer::new(limit);
                let mut items = diversity.rerank(unseen, options.page_size);
                let room = options.page_size - items.len();
                items.extend(diversity.rerank(seen, room));
                items
            }
            _ => {
                scored.truncate(options.page_size);
                scored
            }
        };

        info!(
            mode = options.mode.as_str(),
            total = outcome.total_candidates,
            matched = outcome.matched_candidates,
            returned = outcome.items.len(),
            cold_start = !has_history,
            "Ranking completed"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, ContentTypeFilter, EmptyReason, FavoriteRecord, WatchRecord};

    fn engine() -> RecommendationEngine {
        RecommendationEngine::new(ScoringPolicy::deterministic()).unwrap()
    }

    fn item(id: &str, content_type: ContentType, category: &str, views: u64) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            content_type: Some(content_type),
            category: Some(category.to_string()),
            view_count: Some(views),
            ..Default::default()
        }
    }

    #[test]
    fn test_filters_and_counts() {
        let candidates = vec![
            item("v1", ContentType::Video, "science", 10),
            item("a1", ContentType::Audio, "science", 20),
            item("a2", ContentType::Audio, "music", 30),
        ];
        let options = RankOptions {
            content_type_filter: ContentTypeFilter::Audio,
            category_filter: "Science".to_string(),
            ..Default::default()
        };

        let outcome = engine().rank(&UserHistory::default(), &candidates, &options, Utc::now());

        assert_eq!(outcome.total_candidates, 3);
        assert_eq!(outcome.matched_candidates, 1);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].item.id, "a1");
    }

    #[test]
    fn test_no_matches_is_reported() {
        let candidates = vec![item("v1", ContentType::Video, "science", 10)];
        let options = RankOptions {
            content_type_filter: ContentTypeFilter::Audio,
            ..Default::default()
        };

        let outcome = engine().rank(&UserHistory::default(), &candidates, &options, Utc::now());

        assert!(outcome.items.is_empty());
        assert_eq!(outcome.empty_reason(), Some(EmptyReason::NoMatches));
    }

    #[test]
    fn test_page_size_zero() {
        let candidates = vec![item("v1", ContentType::Video, "science", 10)];
        let options = RankOptions {
            page_size: 0,
            ..Default::default()
        };

        let outcome = engine().rank(&UserHistory::default(), &candidates, &options, Utc::now());

        assert!(outcome.items.is_empty());
        assert_eq!(outcome.empty_reason(), None);
    }

    #[test]
    fn test_favorite_category_outside_filter_still_counts() {
        // The favorite references content the filter removes; resolution
        // uses the full pool.
        let candidates = vec![
            item("fav", ContentType::Video, "science", 0),
            item("a1", ContentType::Audio, "science", 0),
            item("a2", ContentType::Audio, "music", 0),
        ];
        let history = UserHistory {
            favorites: vec![FavoriteRecord {
                content_id: "fav".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let options = RankOptions {
            content_type_filter: ContentTypeFilter::Audio,
            ..Default::default()
        };

        let outcome = engine().rank(&history, &candidates, &options, Utc::now());

        assert_eq!(outcome.items[0].item.id, "a1");
        assert!(outcome.items[0].score > outcome.items[1].score);
    }

    #[test]
    fn test_diversity_only_applies_to_personalized() {
        let mut candidates = Vec::new();
        for i in 0..3 {
            let mut c = item(&format!("ada{}", i), ContentType::Video, "science", 100 - i);
            c.speaker = Some("ada".to_string());
            candidates.push(c);
        }
        let mut bob = item("bob", ContentType::Video, "science", 1);
        bob.speaker = Some("bob".to_string());
        candidates.push(bob);

        let trending = RankOptions {
            mode: RankMode::Trending,
            max_consecutive_per_speaker: Some(1),
            ..Default::default()
        };
        let outcome = engine().rank(&UserHistory::default(), &candidates, &trending, Utc::now());
        let ids: Vec<&str> = outcome.items.iter().map(|c| c.item.id.as_str()).collect();
        assert_eq!(ids, vec!["ada0", "ada1", "ada2", "bob"]);

        let personalized = RankOptions {
            max_consecutive_per_speaker: Some(1),
            ..Default::default()
        };
        let outcome = engine().rank(&UserHistory::default(), &candidates, &personalized, Utc::now());
        let ids: Vec<&str> = outcome.items.iter().map(|c| c.item.id.as_str()).collect();
        assert_eq!(ids, vec!["ada0", "bob", "ada1", "ada2"]);
    }

    #[test]
    fn test_diversity_keeps_watched_items_last() {
        let mut candidates = Vec::new();
        for (id, speaker, views) in [("ada1", "ada", 100), ("ada2", "ada", 50), ("bob_seen", "bob", 10)] {
            let mut c = item(id, ContentType::Video, "science", views);
            c.speaker = Some(speaker.to_string());
            candidates.push(c);
        }
        let history = UserHistory {
            watch_history: vec![WatchRecord {
                content_id: "bob_seen".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let options = RankOptions {
            max_consecutive_per_speaker: Some(1),
            ..Default::default()
        };

        let outcome = engine().rank(&history, &candidates, &options, Utc::now());
        let ids: Vec<&str> = outcome.items.iter().map(|c| c.item.id.as_str()).collect();
        assert_eq!(ids, vec!["ada1", "ada2", "bob_seen"]);

        let short = RankOptions {
            page_size: 2,
            ..options
        };
        let outcome = engine().rank(&history, &candidates, &short, Utc::now());
        let ids: Vec<&str> = outcome.items.iter().map(|c| c.item.id.as_str()).collect();
        assert_eq!(ids, vec!["ada1", "ada2"]);
    }
}
