use thiserror::Error;

pub type Result<T> = std::result::Result<T, TallyError>;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Rate limited by the API (status {status}): {body}")]
    RateLimited { status: u16, body: String },
    #[error("API request '{query}' failed with status {status}: {body}")]
    Api {
        query: &'static str,
        status: u16,
        body: String,
    },
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Archive error: {0}")]
    Archive(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl TallyError {
    /// Rate-limit responses and other remote failures are handled the same
    /// way (flush, then abort), but callers may want to report them apart.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, TallyError::RateLimited { .. })
    }
}
