/// Core error type for the monitor.
///
/// Adapter crates map their specific failures into this type so the core
/// can handle them consistently (reject at the configuration boundary vs
/// skip-and-retry inside a poll pass).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("classification failed: {0}")]
    Classify(String),

    #[error("interval must be at least 1 minute (got {0})")]
    InvalidInterval(i64),

    #[error("{0} is already on the watch list")]
    AlreadyWatched(String),

    #[error("{0} is not on the watch list")]
    NotWatched(String),

    #[error("notification failed: {0}")]
    Notify(String),
}

/// Why a single fetch attempt failed.
///
/// There is no retry machinery behind these: a failed fetch is absorbed as
/// "unchanged this cycle" and the resource is retried naturally on the next
/// scheduled pass.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("status {0}")]
    BadStatus(u16),

    #[error("timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;
