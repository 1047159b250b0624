// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Entry size estimation.
//!
//! Sizes are approximate. The default estimator charges the key length plus
//! the length of the value's JSON encoding. If estimation fails the cache
//! charges [`FALLBACK_ENTRY_SIZE`] and logs a warning.

use crate::error::SizeError;

/// Charge used when an estimator fails.
pub const FALLBACK_ENTRY_SIZE: usize = 1024;

/// Estimates the footprint of a key/value pair in bytes.
pub trait SizeEstimator<V>: Send + Sync {
    fn estimate(&self, key: &str, value: &V) -> Result<usize, SizeError>;
}

/// Serializes the value to JSON and counts bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSizeEstimator;

impl<V: serde::Serialize> SizeEstimator<V> for JsonSizeEstimator {
    fn estimate(&self, key: &str, value: &V) -> Result<usize, SizeError> {
        let encoded = serde_json::to_vec(value)?;
        Ok(key.len() + encoded.len())
    }
}

/// Estimate, falling back to [`FALLBACK_ENTRY_SIZE`] on failure.
pub fn estimate_or_fallback<V>(estimator: &dyn SizeEstimator<V>, key: &str, value: &V) -> usize {
    match estimator.estimate(key, value) {
        Ok(size) => size,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, fallback = FALLBACK_ENTRY_SIZE, "Size estimation failed");
            FALLBACK_ENTRY_SIZE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Failing;

    impl SizeEstimator<u32> for Failing {
        fn estimate(&self, _key: &str, _value: &u32) -> Result<usize, SizeError> {
            Err(SizeError("boom".into()))
        }
    }

    #[test]
    fn test_json_estimate_counts_key_and_value() {
        let size = JsonSizeEstimator.estimate("k1", &"abcd".to_string()).unwrap();
        // "abcd" serializes with quotes
        assert_eq!(size, 2 + 6);
    }

    #[test]
    fn test_json_estimate_rejects_non_string_map_keys() {
        let mut map: HashMap<(u8, u8), u8> = HashMap::new();
        map.insert((1, 2), 3);
        assert!(JsonSizeEstimator.estimate("k", &map).is_err());
    }

    #[test]
    fn test_fallback_on_failure() {
        assert_eq!(estimate_or_fallback(&Failing, "k", &7u32), FALLBACK_ENTRY_SIZE);
        assert_eq!(estimate_or_fallback(&JsonSizeEstimator, "k", &7u32), 2);
    }
}
