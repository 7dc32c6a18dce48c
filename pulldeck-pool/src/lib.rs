//! Pulldeck Pool - Generic Bounded Worker Pool
//!
//! A fixed-size pool of tokio workers consuming a shared bounded job queue
//! and delivering per-job results over dedicated oneshot channels. The pool
//! knows nothing about caching or domain types; callers specialize it with a
//! [`JobHandler`] implementation.
//!
//! # Usage
//!
//! ```ignore
//! use pulldeck_pool::{FnHandler, PoolConfig, WorkerPool};
//! use std::sync::Arc;
//!
//! let pool = WorkerPool::new(
//!     PoolConfig::default().with_workers(4),
//!     Arc::new(FnHandler(|n: u32| async move { Ok(n * 2) })),
//! );
//! let results = pool.process_batch(vec![1, 2, 3]).await;
//! pool.stop().await;
//! ```

mod handler;
mod pool;

pub use handler::{FnHandler, JobHandler, JobResult};
pub use pool::{PoolConfig, WorkerPool};
pub use pulldeck_core::error::PoolError;
