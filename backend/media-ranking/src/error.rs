use thiserror::Error;

pub type Result<T> = std::result::Result<T, RankingError>;

/// Failures of the ranking crate.
///
/// Data-quality problems in content or history records are never reported
/// here: missing fields score as zero and dangling references are skipped.
/// These variants cover caller bugs and collaborator failures only.
#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Invalid scoring policy: {0}")]
    InvalidPolicy(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Config error: {0}")]
    Config(#[from] envy::Error),
}

impl From<std::io::Error> for RankingError {
    fn from(err: std::io::Error) -> Self {
        RankingError::Snapshot(err.to_string())
    }
}

impl From<serde_json::Error> for RankingError {
    fn from(err: serde_json::Error) -> Self {
        RankingError::Snapshot(err.to_string())
    }
}
