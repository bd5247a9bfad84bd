/// Top-level error type. All talker operations return this.
#[derive(Debug, thiserror::Error)]
pub enum TalkerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by {service}, retry after {retry_after_secs}s")]
    RateLimited {
        service: String,
        retry_after_secs: u64,
    },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unexpected payload shape at {path}: {detail}")]
    SchemaMismatch { path: String, detail: String },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl TalkerError {
    /// True when retrying the same call could succeed (connectivity, throttling).
    /// NotFound and SchemaMismatch are permanent for a given remote state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TalkerError::Network(_) | TalkerError::RateLimited { .. }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Malformed cache entry: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
