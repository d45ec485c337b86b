//! Blob codec port: compression applied to stored templates.

/// Error raised by a codec that rejects its input.
#[derive(Debug, thiserror::Error)]
#[error("{codec} codec error: {message}")]
pub struct CodecError {
    pub codec: &'static str,
    pub message: String,
}

impl CodecError {
    pub fn new(codec: &'static str, message: impl Into<String>) -> Self {
        Self {
            codec,
            message: message.into(),
        }
    }
}

/// Lossless byte codec. `decompress(compress(x)) == x` for every input.
pub trait BlobCodec: Send + Sync {
    /// # Errors
    /// Returns `CodecError` if the codec fails.
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// # Errors
    /// Returns `CodecError` when the input is not a valid compressed stream.
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;
}
