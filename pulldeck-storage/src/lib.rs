//! Pulldeck Storage - Persistent TTL Cache
//!
//! A file-backed key/value store where every entry carries a write timestamp
//! and a time-to-live. Both the initial record fetch and the enhancement
//! path use it to avoid duplicate expensive upstream calls.
//!
//! Read-side failures never surface: a missing file, a corrupt envelope, or
//! an expired entry all degrade to a cache miss (expired and corrupt entries
//! are purged as a side effect). Write failures propagate as
//! [`CacheError`](pulldeck_core::error::CacheError).

pub mod disk;
pub mod entry;
pub mod key;

pub use disk::DiskCache;
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use pulldeck_core::error::CacheError;
