use super::InteractionStore;
use crate::error::Result;
use crate::models::{ContentItem, UserHistory};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// On-disk dump of the media store.
///
/// ```json
/// { "content": [ { "id": "c1", "type": "video", ... } ],
///   "users": { "u1": { "watch_history": [...], "favorites": [...] } } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Records without a usable `id` are dropped
    #[serde(default, deserialize_with = "skip_malformed")]
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub users: HashMap<String, UserHistory>,
}

fn skip_malformed<'de, D>(deserializer: D) -> std::result::Result<Vec<ContentItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let total = raw.len();
    let content: Vec<ContentItem> = raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();

    if content.len() < total {
        debug!(skipped = total - content.len(), "Skipped malformed content records");
    }
    Ok(content)
}

/// Read-only store backed by a JSON snapshot held in memory.
pub struct SnapshotStore {
    snapshot: Snapshot,
}

impl SnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&raw)?;

        info!(
            path = %path.display(),
            content = snapshot.content.len(),
            users = snapshot.users.len(),
            "Snapshot loaded"
        );

        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl InteractionStore for SnapshotStore {
    async fn list_content(&self) -> Result<Vec<ContentItem>> {
        Ok(self.snapshot.content.clone())
    }

    async fn user_history(&self, user_id: &str) -> Result<Option<UserHistory>> {
        Ok(self.snapshot.users.get(user_id).cloned())
    }
}
