//! zstd compression at a fixed level, applied before encryption on send
//! and after decryption on receive.

use thiserror::Error;

/// Compression level used for every Data frame. Fixed rather than
/// configurable — the spec does not expose a level knob.
const LEVEL: i32 = 3;

pub fn compress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    zstd::stream::encode_all(data, LEVEL).map_err(CompressionError::Encode)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    zstd::stream::decode_all(data).map_err(CompressionError::Decode)
}

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("zstd compression failed: {0}")]
    Encode(std::io::Error),

    #[error("zstd decompression failed: {0}")]
    Decode(std::io::Error),
}
