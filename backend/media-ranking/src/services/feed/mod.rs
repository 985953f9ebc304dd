// ============================================
// Feed Service (推薦流服務)
// ============================================
//
// Fetches the content pool and a user's history from the data store, then
// hands both to the pure RecommendationEngine. This is the only place that
// touches I/O; the engine itself never awaits.

pub mod snapshot;

pub use snapshot::{Snapshot, SnapshotStore};

use crate::error::Result;
use crate::models::{ContentItem, RankOptions, RankOutcome, UserHistory};
use crate::services::engine::RecommendationEngine;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Read side of the media data store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Every candidate the user could be shown
    async fn list_content(&self) -> Result<Vec<ContentItem>>;

    /// Watch, favorite, rating, playlist and search history.
    /// `None` when the store has never seen the user.
    async fn user_history(&self, user_id: &str) -> Result<Option<UserHistory>>;
}

pub struct FeedService<S: InteractionStore> {
    store: S,
    engine: RecommendationEngine,
}

impl<S: InteractionStore> FeedService<S> {
    pub fn new(store: S, engine: RecommendationEngine) -> Self {
        Self { store, engine }
    }

    /// Ranked page for `user_id`; `None` ranks for an anonymous visitor.
    pub async fn recommend(
        &self,
        user_id: Option<&str>,
        options: &RankOptions,
    ) -> Result<RankOutcome> {
        let candidates = match self.store.list_content().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Failed to list content");
                return Err(e);
            }
        };

        let history = match user_id {
            Some(id) => match self.store.user_history(id).await {
                Ok(Some(history)) => history,
                Ok(None) => {
                    debug!(user_id = id, "No history for user, using cold start");
                    UserHistory::default()
                }
                Err(e) => {
                    warn!(user_id = id, error = %e, "Failed to load user history");
                    return Err(e);
                }
            },
            None => UserHistory::default(),
        };

        let outcome = self
            .engine
            .rank(&history, &candidates, options, Utc::now());

        info!(
            user_id = user_id.unwrap_or("anonymous"),
            mode = options.mode.as_str(),
            returned = outcome.items.len(),
            "Feed generated"
        );

        Ok(outcome)
    }
}
