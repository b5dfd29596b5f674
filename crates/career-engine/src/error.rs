use crate::model::SourceKind;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("career not found: {0}")]
    NotFound(String),
}

/// A catalog source failed or was unreachable. Logged by the resolver, which then falls
/// through to the next source; never returned from `resolve`.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("remote catalog failed: {0}")]
    Remote(String),

    #[error("catalog snapshot unreadable: {0}")]
    Snapshot(String),

    #[error("{0} source is disabled")]
    Disabled(SourceKind),
}

/// The persisted cache table could not be decoded. The cache starts empty instead.
#[derive(Debug, thiserror::Error)]
pub enum CacheCorruptionError {
    #[error("malformed cache snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported cache snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// A remote row could not be normalized into a `CareerRecord`. The row is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ScoringInputError {
    #[error("record is missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("record {id} has invalid level '{level}'")]
    InvalidLevel { id: String, level: String },
}
