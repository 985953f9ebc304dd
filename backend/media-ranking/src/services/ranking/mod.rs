//! Ranking Module
//!
//! Orders an already-scored candidate set for one view mode.
//!
//! # Modes
//! - **Personalized**: score descending, already-watched items after unwatched.
//!   Users without history fall back to popularity, then publish date.
//! - **Trending**: popularity × 1.5 for items published in the last week.
//! - **Newest**: publish date (or upload date) descending.
//!
//! All sorts are stable, so ties keep the original candidate order.
//! Truncation is left to the caller and always happens last.

use crate::models::{RankMode, ScoredCandidate};
use crate::utils::{days_since, desc};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Tunables for the non-personalized orderings.
#[derive(Debug, Clone)]
pub struct TrendingWeights {
    /// Items younger than this get the freshness multiplier
    pub fresh_window_days: f64,
    pub fresh_multiplier: f64,
}

impl Default for TrendingWeights {
    fn default() -> Self {
        Self {
            fresh_window_days: 7.0,
            fresh_multiplier: 1.5,
        }
    }
}

/// Ranking Layer - 按視圖模式排序
pub struct RankingLayer {
    trending: TrendingWeights,
}

impl Default for RankingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingLayer {
    pub fn new() -> Self {
        Self {
            trending: TrendingWeights::default(),
        }
    }

    pub fn with_trending_weights(trending: TrendingWeights) -> Self {
        Self { trending }
    }

    /// Sort `candidates` in place for `mode`.
    ///
    /// `watched` holds content ids from the user's watch history;
    /// `has_history` selects the personalized fallback.
    pub fn order(
        &self,
        mode: RankMode,
        candidates: &mut [ScoredCandidate],
        has_history: bool,
        watched: &HashSet<&str>,
        now: DateTime<Utc>,
    ) {
        match mode {
            RankMode::Personalized if has_history => {
                candidates.sort_by(|a, b| {
                    let a_seen = watched.contains(a.item.id.as_str());
                    let b_seen = watched.contains(b.item.id.as_str());
                    a_seen.cmp(&b_seen).then_with(|| desc(a.score, b.score))
                });
            }
            RankMode::Personalized => {
                candidates.sort_by(|a, b| {
                    b.item
                        .popularity_count()
                        .cmp(&a.item.popularity_count())
                        .then_with(|| newest_first(a, b))
                });
            }
            RankMode::Trending => {
                candidates.sort_by(|a, b| {
                    desc(self.trend_score(a, now), self.trend_score(b, now))
                });
            }
            RankMode::Newest => {
                candidates.sort_by(newest_first);
            }
        }
    }

    /// Popularity with a boost for content published within the fresh window.
    pub fn trend_score(&self, candidate: &ScoredCandidate, now: DateTime<Utc>) -> f64 {
        let count = candidate.item.popularity_count() as f64;
        let fresh = candidate
            .item
            .published_date
            .is_some_and(|published| {
                days_since(now, published) < self.trending.fresh_window_days
            });
        if fresh {
            count * self.trending.fresh_multiplier
        } else {
            count
        }
    }
}

/// Release date descending; undated items last.
fn newest_first(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    match (a.item.release_date(), b.item.release_date()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
