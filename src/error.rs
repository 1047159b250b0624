// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types.
//!
//! A cache miss is never an error: lookups return `Option`. The only
//! caller-visible failures are lifecycle misuse ([`CacheError`]) and whatever
//! a read-through loader returns, which is passed back untouched.

use thiserror::Error;

/// Lifecycle errors returned by [`Cache::start`](crate::Cache::start).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("background tasks already running")]
    AlreadyRunning,
    #[error("cache has been destroyed")]
    Destroyed,
    #[error("no tokio runtime available to spawn background tasks")]
    NoRuntime,
}

/// Codec failures. Never surfaced from cache operations: a failed compress
/// stores the value as-is, a failed decompress is treated as a miss.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("compression failed: {0}")]
    CompressFailed(String),

    #[error("decompression failed: {0}")]
    DecompressFailed(String),

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Size estimation failure. Swallowed by the cache, which falls back to
/// [`FALLBACK_ENTRY_SIZE`](crate::size::FALLBACK_ENTRY_SIZE).
#[derive(Error, Debug)]
#[error("size estimation failed: {0}")]
pub struct SizeError(pub String);

impl From<serde_json::Error> for SizeError {
    fn from(e: serde_json::Error) -> Self {
        Self(e.to_string())
    }
}
