//! Pulldeck Core - Data Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types, the error taxonomy, and file-based
//! configuration - no concurrency, no I/O beyond config loading.

use chrono::{DateTime, Utc};

pub mod config;
pub mod error;
pub mod pr;

pub use config::{AuthConfig, CacheSettings, DashConfig};
pub use error::{
    CacheError, ConfigError, EnhanceError, FetchError, PoolError, PulldeckError, PulldeckResult,
    ValidationError,
};
pub use pr::{EnhancedPr, PrDetails, PrId, PullRequest};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
