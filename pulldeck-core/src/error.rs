//! Error types for pulldeck operations

use crate::pr::PrId;
use std::time::Duration;
use thiserror::Error;

/// Worker pool errors.
///
/// Pool-level failures and worker-function failures share this one shape so
/// callers see a uniform job result. The pool never panics across the job
/// boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker pool shut down")]
    Cancelled,

    #[error("Worker exited before delivering a result")]
    ResultDropped,

    #[error("Job failed: {reason}")]
    Job { reason: String },
}

/// Persistent cache errors.
///
/// Read-side failures never reach callers (they degrade to a miss); these
/// surface only from writes, invalidation, and the maintenance sweep.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Cache serialization failed: {reason}")]
    Serialize { reason: String },

    #[error("Path escapes cache root: {path}")]
    PathTraversal { path: String },

    #[error("Cache sweep cancelled")]
    SweepCancelled,
}

/// Structural validation errors, surfaced before any network operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: &'static str },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Detail-fetch errors from the upstream capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Missing auth token (set auth.token, GITHUB_TOKEN, or GH_TOKEN)")]
    MissingToken,

    #[error("Request failed: {reason}")]
    Http { reason: String },

    #[error("Upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response body: {reason}")]
    InvalidResponse { reason: String },
}

impl FetchError {
    /// Whether a later call for the same identity may succeed.
    ///
    /// Token and 4xx failures will not fix themselves; network errors and
    /// 5xx responses are worth retrying on next visibility.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::MissingToken => false,
            Self::Http { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidResponse { .. } => false,
        }
    }
}

/// Enhancement orchestrator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnhanceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Detail fetch failed for {id}: {source}")]
    Fetch { id: PrId, source: FetchError },

    #[error("Detail fetch timed out for {id} after {timeout:?}")]
    Timeout { id: PrId, timeout: Duration },

    #[error("Enhancement cancelled")]
    Cancelled,

    #[error("Enhancement already in flight for {id}")]
    InFlight { id: PrId },

    #[error("Enhancement state lock poisoned")]
    LockPoisoned,
}

impl EnhanceError {
    /// Whether a later call for the same identity may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Fetch { source, .. } => source.is_transient(),
            Self::Timeout { .. } => true,
            Self::Cancelled => false,
            Self::InFlight { .. } => true,
            Self::LockPoisoned => false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or PULLDECK_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {reason}")]
    Io { reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for all pulldeck errors.
#[derive(Debug, Clone, Error)]
pub enum PulldeckError {
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Enhance error: {0}")]
    Enhance(#[from] EnhanceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for pulldeck operations.
pub type PulldeckResult<T> = Result<T, PulldeckError>;

// =============================================================================
// TESTS
// =============================================================================
