use crate::error::{RankingError, Result};
use crate::models::{ContentTypeFilter, RankMode, RankOptions};
use crate::services::scoring::ScoringPolicy;
use serde::Deserialize;
use tracing::warn;

/// Settings for the `media-ranking` binary, read from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    /// Unset ranks for an anonymous visitor
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_rank_mode")]
    pub rank_mode: String,
    #[serde(default = "default_content_type_filter")]
    pub content_type_filter: String,
    #[serde(default)]
    pub category_filter: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub rng_seed: Option<u64>,
    #[serde(default = "default_discovery_jitter")]
    pub discovery_jitter: f64,
    #[serde(default = "default_ai_pick_score_threshold")]
    pub ai_pick_score_threshold: f64,
    #[serde(default)]
    pub max_consecutive_per_speaker: Option<usize>,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_snapshot_path() -> String {
    "data/snapshot.json".to_string()
}

fn default_rank_mode() -> String {
    "personalized".to_string()
}

fn default_content_type_filter() -> String {
    "all".to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_discovery_jitter() -> f64 {
    4.0
}

fn default_ai_pick_score_threshold() -> f64 {
    30.0
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env::<Config>()?)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter::<_, Config>(vars)?)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    pub fn rank_options(&self) -> Result<RankOptions> {
        let mode = self.rank_mode.parse::<RankMode>().map_err(|e| {
            warn!(rank_mode = %self.rank_mode, error = %e, "Invalid RANK_MODE");
            e
        })?;
        let content_type_filter = self
            .content_type_filter
            .parse::<ContentTypeFilter>()
            .map_err(|e| {
                warn!(
                    content_type_filter = %self.content_type_filter,
                    error = %e,
                    "Invalid CONTENT_TYPE_FILTER"
                );
                e
            })?;

        Ok(RankOptions {
            mode,
            content_type_filter,
            category_filter: self.category_filter.clone(),
            page_size: self.page_size,
            rng_seed: self.rng_seed,
            max_consecutive_per_speaker: self.max_consecutive_per_speaker,
        })
    }

    pub fn scoring_policy(&self) -> Result<ScoringPolicy> {
        let policy = ScoringPolicy {
            discovery_jitter: self.discovery_jitter,
            ai_pick_score_threshold: self.ai_pick_score_threshold,
            ..ScoringPolicy::default()
        };
        if let Err(e) = policy.validate() {
            warn!(error = %e, "Invalid scoring policy settings");
            return Err(e);
        }
        Ok(policy)
    }
}

impl TryFrom<&Config> for RankOptions {
    type Error = RankingError;

    fn try_from(config: &Config) -> Result<Self> {
        config.rank_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(Vec::new()).unwrap();

        assert_eq!(config.snapshot_path, "data/snapshot.json");
        assert!(config.user_id.is_none());
        assert_eq!(config.page_size, 20);
        assert!(!config.json_logs());

        let options = config.rank_options().unwrap();
        assert_eq!(options.mode, RankMode::Personalized);
        assert_eq!(options.content_type_filter, ContentTypeFilter::All);
        assert!(options.rng_seed.is_none());

        let policy = config.scoring_policy().unwrap();
        assert_eq!(policy.discovery_jitter, 4.0);
        assert_eq!(policy.ai_pick_score_threshold, 30.0);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(vars(&[
            ("USER_ID", "u42"),
            ("RANK_MODE", "trending"),
            ("CONTENT_TYPE_FILTER", "audio"),
            ("PAGE_SIZE", "8"),
            ("RNG_SEED", "1234"),
            ("DISCOVERY_JITTER", "0"),
            ("MAX_CONSECUTIVE_PER_SPEAKER", "2"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.user_id.as_deref(), Some("u42"));
        assert!(config.json_logs());

        let options = RankOptions::try_from(&config).unwrap();
        assert_eq!(options.mode, RankMode::Trending);
        assert_eq!(options.content_type_filter, ContentTypeFilter::Audio);
        assert_eq!(options.page_size, 8);
        assert_eq!(options.rng_seed, Some(1234));
        assert_eq!(options.max_consecutive_per_speaker, Some(2));

        assert_eq!(config.scoring_policy().unwrap().discovery_jitter, 0.0);
    }

    #[test]
    fn test_invalid_values() {
        let config = Config::from_vars(vars(&[("RANK_MODE", "popular")])).unwrap();
        assert!(matches!(
            config.rank_options(),
            Err(RankingError::InvalidOption(_))
        ));

        let config = Config::from_vars(vars(&[("CONTENT_TYPE_FILTER", "podcast")])).unwrap();
        assert!(matches!(
            config.rank_options(),
            Err(RankingError::InvalidOption(_))
        ));

        let config = Config::from_vars(vars(&[("DISCOVERY_JITTER", "-2")])).unwrap();
        assert!(matches!(
            config.scoring_policy(),
            Err(RankingError::InvalidPolicy(_))
        ));

        assert!(matches!(
            Config::from_vars(vars(&[("PAGE_SIZE", "many")])),
            Err(RankingError::Config(_))
        ));
    }
}
