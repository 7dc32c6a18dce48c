//! Pulldeck GitHub - REST detail fetcher
//!
//! Implements the orchestrator's [`DetailFetcher`] capability against the
//! GitHub REST API. This is the only crate in the workspace that talks to
//! the network.
//!
//! [`DetailFetcher`]: pulldeck_enhance::DetailFetcher

pub mod client;

pub use client::GithubClient;
