pub mod diversity;
pub mod engine;
pub mod feed;
pub mod ranking;
pub mod scoring;
pub mod signals;

pub use diversity::DiversityLayer;
pub use engine::RecommendationEngine;
pub use feed::{FeedService, InteractionStore, Snapshot, SnapshotStore};
pub use ranking::RankingLayer;
pub use scoring::{ContentScorer, ScoringPolicy};
pub use signals::{PreferenceMap, SignalExtractor, SignalWeights};
