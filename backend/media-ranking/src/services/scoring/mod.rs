// ============================================
// Content Scorer (內容打分器)
// ============================================
//
// Scores one content item against a user's PreferenceMap.
//
// Additive terms:
// - Category affinity (+ "category" badge above threshold)
// - Recent-category boost (+ "recent" badge)
// - Speaker affinity (+ "speaker" badge above threshold)
// - Tag affinity (+ "interests" badge when any tag matches)
// - Keyword hits of known interests in title/description
// - Content type preference
// - Popularity: log10(count + 1) × weight
// - Recency step function on publish age
// - Featured boost
// - Discovery jitter: the only random term, drawn from an injected RNG

use crate::error::{RankingError, Result};
use crate::models::{ContentItem, MatchReason};
use crate::services::signals::PreferenceMap;
use crate::utils::{days_since, log_popularity};
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::debug;

/// One step of the recency function: items younger than `max_age_days`
/// get `boost`. Steps are checked in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyStep {
    pub max_age_days: f64,
    pub boost: f64,
}

/// Every weight and threshold used by the scorer.
#[derive(Debug, Clone)]
pub struct ScoringPolicy {
    pub category_weight: f64,
    /// Category term must exceed this to earn the "category" badge
    pub category_reason_threshold: f64,
    pub recent_category_boost: f64,
    pub speaker_weight: f64,
    pub speaker_reason_threshold: f64,
    pub tag_weight: f64,
    pub keyword_weight: f64,
    pub content_type_weight: f64,
    pub popularity_weight: f64,
    pub recency_steps: Vec<RecencyStep>,
    pub featured_boost: f64,
    /// Amplitude of the uniform [0, amplitude) jitter; 0 disables it
    pub discovery_jitter: f64,
    pub ai_pick_min_reasons: usize,
    pub ai_pick_score_threshold: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            category_weight: 12.0,
            category_reason_threshold: 15.0,
            recent_category_boost: 10.0,
            speaker_weight: 15.0,
            speaker_reason_threshold: 12.0,
            tag_weight: 3.0,
            keyword_weight: 2.0,
            content_type_weight: 5.0,
            popularity_weight: 3.0,
            recency_steps: vec![
                RecencyStep { max_age_days: 2.0, boost: 8.0 },
                RecencyStep { max_age_days: 7.0, boost: 6.0 },
                RecencyStep { max_age_days: 14.0, boost: 4.0 },
                RecencyStep { max_age_days: 30.0, boost: 2.0 },
            ],
            featured_boost: 5.0,
            discovery_jitter: 4.0,
            ai_pick_min_reasons: 2,
            ai_pick_score_threshold: 30.0,
        }
    }
}

impl ScoringPolicy {
    /// Same policy with the random term switched off.
    pub fn deterministic() -> Self {
        Self {
            discovery_jitter: 0.0,
            ..Self::default()
        }
    }

    /// Reject policies that would produce NaN or negative intrinsic terms.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("category_weight", self.category_weight),
            ("category_reason_threshold", self.category_reason_threshold),
            ("recent_category_boost", self.recent_category_boost),
            ("speaker_weight", self.speaker_weight),
            ("speaker_reason_threshold", self.speaker_reason_threshold),
            ("tag_weight", self.tag_weight),
            ("keyword_weight", self.keyword_weight),
            ("content_type_weight", self.content_type_weight),
            ("featured_boost", self.featured_boost),
            ("ai_pick_score_threshold", self.ai_pick_score_threshold),
        ];
        for (name, value) in named {
            if !value.is_finite() {
                return Err(RankingError::InvalidPolicy(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }

        let non_negative = [
            ("popularity_weight", self.popularity_weight),
            ("discovery_jitter", self.discovery_jitter),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(RankingError::InvalidPolicy(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        for step in &self.recency_steps {
            if !step.max_age_days.is_finite() || !step.boost.is_finite() || step.boost < 0.0 {
                return Err(RankingError::InvalidPolicy(format!(
                    "invalid recency step {:?}",
                    step
                )));
            }
        }

        Ok(())
    }
}

/// Score and badges for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemScore {
    pub score: f64,
    pub match_reasons: Vec<MatchReason>,
    pub is_ai_pick: bool,
}

pub struct ContentScorer {
    policy: ScoringPolicy,
}

impl Default for ContentScorer {
    fn default() -> Self {
        Self {
            policy: ScoringPolicy::default(),
        }
    }
}

impl ContentScorer {
    pub fn new(policy: ScoringPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Score `item` against `prefs`. `rng` is only drawn from when jitter
    /// is enabled.
    pub fn score<R: Rng>(
        &self,
        item: &ContentItem,
        prefs: &PreferenceMap,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> ItemScore {
        let p = &self.policy;
        let mut match_reasons = Vec::new();

        let category = item.category.as_deref().map(str::trim).unwrap_or("");
        let category_term = prefs.category_scores.get(category) * p.category_weight;
        if category_term > p.category_reason_threshold {
            match_reasons.push(MatchReason::Category);
        }

        let recent_term = if !category.is_empty() && prefs.recent_categories.contains(category) {
            match_reasons.push(MatchReason::Recent);
            p.recent_category_boost
        } else {
            0.0
        };

        let speaker = item.speaker.as_deref().unwrap_or("");
        let speaker_term = prefs.speaker_scores.get(speaker) * p.speaker_weight;
        if speaker_term > p.speaker_reason_threshold {
            match_reasons.push(MatchReason::Speaker);
        }

        let tag_term: f64 = item
            .tags
            .iter()
            .map(|tag| prefs.tag_scores.get(&tag.to_lowercase()) * p.tag_weight)
            .sum();
        if tag_term != 0.0 {
            match_reasons.push(MatchReason::Interests);
        }

        let keyword_term = self.keyword_term(item, prefs);

        let type_term = item
            .content_type
            .map(|t| prefs.content_type_prefs.get(t) * p.content_type_weight)
            .unwrap_or(0.0);

        let intrinsic = self.intrinsic_score(item, now);

        let jitter = if p.discovery_jitter > 0.0 {
            rng.gen::<f64>() * p.discovery_jitter
        } else {
            0.0
        };

        let score = category_term
            + recent_term
            + speaker_term
            + tag_term
            + keyword_term
            + type_term
            + intrinsic
            + jitter;

        let is_ai_pick = match_reasons.len() >= p.ai_pick_min_reasons
            || score > p.ai_pick_score_threshold;

        debug!(
            content_id = %item.id,
            category = category_term,
            speaker = speaker_term,
            tags = tag_term,
            keywords = keyword_term,
            intrinsic = intrinsic,
            jitter = jitter,
            score = score,
            "Content score computed"
        );

        ItemScore {
            score,
            match_reasons,
            is_ai_pick,
        }
    }

    /// Popularity + recency + featured: the terms that need no history.
    pub fn intrinsic_score(&self, item: &ContentItem, now: DateTime<Utc>) -> f64 {
        let featured = if item.featured {
            self.policy.featured_boost
        } else {
            0.0
        };
        self.popularity_term(item.popularity_count())
            + self.recency_term(item.release_date(), now)
            + featured
    }

    pub fn popularity_term(&self, count: u64) -> f64 {
        log_popularity(count) * self.policy.popularity_weight
    }

    pub fn recency_term(&self, published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let Some(published) = published else {
            return 0.0;
        };
        let age = days_since(now, published);
        self.policy
            .recency_steps
            .iter()
            .find(|step| age < step.max_age_days)
            .map(|step| step.boost)
            .unwrap_or(0.0)
    }

    /// Each known interest term found in the title or description counts once.
    fn keyword_term(&self, item: &ContentItem, prefs: &PreferenceMap) -> f64 {
        if prefs.tag_scores.is_empty() {
            return 0.0;
        }
        let title = item.title.as_deref().unwrap_or("").to_lowercase();
        let description = item.description.as_deref().unwrap_or("").to_lowercase();
        if title.is_empty() && description.is_empty() {
            return 0.0;
        }

        prefs
            .tag_scores
            .iter()
            .filter(|(term, _)| title.contains(term) || description.contains(term))
            .map(|(_, weight)| weight * self.policy.keyword_weight)
            .sum()
    }
}
