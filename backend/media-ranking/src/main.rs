use anyhow::Context;
use media_ranking::{Config, FeedService, RecommendationEngine, SnapshotStore};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = Config::from_env().context("Failed to load config")?;

    // Initialize tracing; stdout is reserved for the ranked feed
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs() {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    info!(
        snapshot = %config.snapshot_path,
        mode = %config.rank_mode,
        page_size = config.page_size,
        "Starting media-ranking"
    );

    let options = config.rank_options().context("Invalid ranking options")?;
    let policy = config.scoring_policy().context("Invalid scoring policy")?;
    let engine = RecommendationEngine::new(policy)?;

    let store = SnapshotStore::load(&config.snapshot_path)
        .await
        .with_context(|| format!("Failed to load snapshot {}", config.snapshot_path))?;

    let service = FeedService::new(store, engine);
    let outcome = service
        .recommend(config.user_id.as_deref(), &options)
        .await
        .context("Failed to rank feed")?;

    if let Some(reason) = outcome.empty_reason() {
        warn!(reason = ?reason, "Feed is empty");
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
