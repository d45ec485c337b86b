//! Zstandard adapter: Implementation of BlobCodec.
//!
//! Templates are stored as a single zstd frame.

use std::io::Cursor;

use crate::ports::{BlobCodec, CodecError};

/// Default compression level.
pub const DEFAULT_LEVEL: i32 = 3;

/// zstd codec for template blobs.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_level(DEFAULT_LEVEL)
    }

    #[must_use]
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobCodec for ZstdCodec {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(Cursor::new(bytes), self.level)
            .map_err(|e| CodecError::new("zstd", e.to_string()))
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        // An empty input decodes to nothing instead of failing; a valid
        // frame is never empty.
        if bytes.is_empty() {
            return Err(CodecError::new("zstd", "empty input is not a zstd frame"));
        }
        zstd::decode_all(Cursor::new(bytes)).map_err(|e| CodecError::new("zstd", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let codec = ZstdCodec::new();
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

        let compressed = codec.compress(&data).expect("Should compress");
        assert!(compressed.len() < data.len());
        assert_eq!(codec.decompress(&compressed).expect("Should decompress"), data);
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let codec = ZstdCodec::new();
        let compressed = codec.compress(&[]).expect("Should compress");
        assert!(!compressed.is_empty());
        assert!(codec.decompress(&compressed).expect("Should decompress").is_empty());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let codec = ZstdCodec::new();
        assert!(codec.decompress(b"definitely not zstd").is_err());
        assert!(codec.decompress(&[]).is_err());
    }
}
