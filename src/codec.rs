// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pluggable value codecs for entries written with `compress: true`.
//!
//! No codec is installed by default, which makes compression a pass-through:
//! the value is kept as-is even when the write asks for compression. Install
//! one with [`CacheBuilder::codec`](crate::CacheBuilder::codec).
//!
//! - [`JsonCodec`]: plain JSON bytes, no compression. Useful to keep large
//!   values in a compact byte form.
//! - [`ZstdCodec`]: zstd over JSON, behind the `compression` feature.
//!
//! # Feature Flag
//!
//! ```toml
//! [dependencies]
//! tiered-cache = { version = "0.1", features = ["compression"] }
//! ```
//!
//! # Example
//!
//! ```
//! use tiered_cache::codec::{Codec, JsonCodec};
//!
//! let codec = JsonCodec;
//! let bytes = Codec::<Vec<u32>>::compress(&codec, &vec![1, 2, 3]).unwrap();
//! let back: Vec<u32> = codec.decompress(&bytes).unwrap();
//! assert_eq!(back, vec![1, 2, 3]);
//! ```

use crate::entry::CacheValue;
use crate::error::CodecError;

/// Zstd magic bytes (little-endian): 0xFD2FB528
#[cfg(feature = "compression")]
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Default compression level (3 is a good balance of speed/ratio)
#[cfg(feature = "compression")]
const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Turns values into bytes and back.
pub trait Codec<V>: Send + Sync {
    fn compress(&self, value: &V) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, bytes: &[u8]) -> Result<V, CodecError>;

    /// Name used in logs and metrics labels.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// JSON encoding without compression.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl<V: CacheValue> Codec<V> for JsonCodec {
    fn compress(&self, value: &V) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decompress(&self, bytes: &[u8]) -> Result<V, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Check if data is zstd-compressed by checking magic bytes.
#[cfg(feature = "compression")]
#[inline]
#[must_use]
pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZSTD_MAGIC
}

/// Check if data is compressed (always false without feature).
#[cfg(not(feature = "compression"))]
#[inline]
#[must_use]
pub fn is_compressed(_data: &[u8]) -> bool {
    false
}

/// zstd over JSON.
///
/// Decoding accepts plain JSON as well, so entries written by [`JsonCodec`]
/// stay readable after switching codecs.
#[cfg(feature = "compression")]
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    /// 1-22. Higher = smaller but slower.
    pub level: i32,
}

#[cfg(feature = "compression")]
impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: DEFAULT_COMPRESSION_LEVEL }
    }
}

#[cfg(feature = "compression")]
impl<V: CacheValue> Codec<V> for ZstdCodec {
    fn compress(&self, value: &V) -> Result<Vec<u8>, CodecError> {
        let json_bytes = serde_json::to_vec(value)?;
        zstd::encode_all(json_bytes.as_slice(), self.level)
            .map_err(|e| CodecError::CompressFailed(e.to_string()))
    }

    fn decompress(&self, bytes: &[u8]) -> Result<V, CodecError> {
        if is_compressed(bytes) {
            let decompressed = zstd::decode_all(bytes)
                .map_err(|e| CodecError::DecompressFailed(e.to_string()))?;
            serde_json::from_slice(&decompressed).map_err(CodecError::from)
        } else {
            serde_json::from_slice(bytes).map_err(CodecError::from)
        }
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_json_codec_roundtrip() {
        let value = json!({"report": [1, 2, 3], "tenant": "t-1"});
        let bytes = Codec::<Value>::compress(&JsonCodec, &value).unwrap();
        let back: Value = JsonCodec.decompress(&bytes).unwrap();
        assert_eq!(back, value);
        assert!(!is_compressed(&bytes));
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let result: Result<Value, _> = JsonCodec.decompress(b"\xff\x00not json");
        assert!(matches!(result, Err(CodecError::Serde(_))));
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_zstd_codec_shrinks_repetitive_values() {
        let value = json!({"data": "x".repeat(10_000)});
        let codec = ZstdCodec::default();
        let bytes = Codec::<Value>::compress(&codec, &value).unwrap();

        assert!(is_compressed(&bytes));
        assert!(bytes.len() < 1_000);
        let back: Value = codec.decompress(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_zstd_codec_reads_plain_json() {
        let plain = b"{\"legacy\": true}";
        let back: Value = ZstdCodec::default().decompress(plain).unwrap();
        assert_eq!(back["legacy"], true);
    }
}
