//! Pulldeck Enhance - Enhancement Orchestrator
//!
//! Coordinates per-record enrichment: at most one in-flight fetch per
//! identity, memoization of completed enrichments, and a non-blocking query
//! surface for the UI layer. The expensive lookup itself is injected through
//! the [`DetailFetcher`] capability so HTTP clients and mocks are
//! interchangeable.

pub mod fetcher;
pub mod orchestrator;

pub use fetcher::DetailFetcher;
pub use orchestrator::{details_cache_key, EnhanceConfig, Enhancer};
pub use pulldeck_core::error::EnhanceError;
