use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("startup failed: {0}")]
    Startup(String),

    #[error("failed to load registry {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("failed to persist registry {}: {reason}", path.display())]
    Persist { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("crawl unit for '{target}' was lost: {reason}")]
    Join { target: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CrawlError>;

/// Failures talking to the index backend.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to build index client: {0}")]
    Build(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("index request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("index returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// A single crawl unit's failure. Contained by the orchestrator; never
/// surfaced as the invocation's error.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("target responded with {0}")]
    Status(u16),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
