use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Search backend unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Completion failed: {0}")]
    CompletionFailed(String),

    #[error("Failed to load articles: {0}")]
    DataLoadFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
