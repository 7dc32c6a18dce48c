//! Deterministic cache keys.
//!
//! A `CacheKey` is a truncated SHA-256 digest over an ordered list of string
//! parameters (fetch kind plus discriminating arguments). The same
//! parameters always yield the same key; distinct parameter tuples yield
//! distinct keys up to the collision resistance of the truncated digest.
//!
//! # Format
//!
//! The digest input is `kind` followed by each parameter, every parameter
//! prefixed with a 0xFF separator byte. 0xFF never occurs in UTF-8 text, so
//! parameter boundaries cannot be forged by concatenation
//! (`["ab", "c"]` and `["a", "bc"]` hash differently).
//!
//! The key itself is the first 16 digest bytes, hex-encoded: 32 lowercase
//! hex characters, safe to embed in a file name.

use sha2::{Digest, Sha256};
use std::fmt;

/// Separator byte between parameters in the digest input.
const SEPARATOR: u8 = 0xFF;

/// Number of digest bytes kept after truncation.
const DIGEST_BYTES: usize = 16;

/// Hex length of an encoded key.
pub const KEY_LEN: usize = DIGEST_BYTES * 2;

/// A deterministic, fixed-length cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a fetch kind and its discriminating arguments.
    ///
    /// Pure and deterministic: equal inputs always produce equal keys.
    pub fn generate(kind: &str, params: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        for param in params {
            hasher.update([SEPARATOR]);
            hasher.update(param.as_bytes());
        }
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..DIGEST_BYTES]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Construct a key from an arbitrary string, bypassing digest
    /// derivation. Test-only: lets the traversal guard be exercised with
    /// hostile names that `generate` can never produce.
    #[cfg(test)]
    pub(crate) fn raw(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_deterministic() {
        let a = CacheKey::generate("pr-details", &["octo/widgets", "42"]);
        let b = CacheKey::generate("pr-details", &["octo/widgets", "42"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_params_yield_distinct_keys() {
        let a = CacheKey::generate("kind", &["a", "b"]);
        let b = CacheKey::generate("kind", &["a", "c"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_distinct_kinds_yield_distinct_keys() {
        let a = CacheKey::generate("pr-details", &["octo/widgets", "42"]);
        let b = CacheKey::generate("pr-list", &["octo/widgets", "42"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_param_boundaries_cannot_be_forged() {
        assert_ne!(
            CacheKey::generate("kind", &["ab", "c"]),
            CacheKey::generate("kind", &["a", "bc"])
        );
        assert_ne!(
            CacheKey::generate("kinda", &[]),
            CacheKey::generate("kind", &["a"])
        );
    }

    #[test]
    fn test_key_is_fixed_length_lowercase_hex() {
        let key = CacheKey::generate("pr-details", &["octo/widgets", "42"]);
        assert_eq!(key.as_str().len(), KEY_LEN);
        assert!(key
            .as_str()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
