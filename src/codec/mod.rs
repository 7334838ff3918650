//! Packed little-endian `f32` vector blobs.
//!
//! Blobs carry no header: `N` components occupy exactly `4 * N` bytes. The text
//! protocol wraps the same bytes in standard base64.

mod error;


pub use error::{CodecError, CodecResult};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::constants::F32_BYTES;

/// Packs `vector` as little-endian `f32`s.
pub fn encode(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Unpacks a blob produced by [`encode`].
///
/// With `dim` set, only the first `4 * dim` bytes are read. Without it the
/// whole blob is decoded and must be a multiple of 4 bytes long.
pub fn decode(bytes: &[u8], dim: Option<usize>) -> CodecResult<Vec<f32>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let body = match dim {
        Some(dim) => {
            let expected = dim
                .checked_mul(F32_BYTES)
                .ok_or(CodecError::DimensionOverflow { dim })?;
            if bytes.len() < expected {
                return Err(CodecError::TooShort {
                    dim,
                    expected,
                    actual: bytes.len(),
                });
            }
            &bytes[..expected]
        }
        None => {
            if !bytes.len().is_multiple_of(F32_BYTES) {
                return Err(CodecError::MisalignedLength { len: bytes.len() });
            }
            bytes
        }
    };

    Ok(body
        .chunks_exact(F32_BYTES)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Euclidean length. `norm(&[]) == 0.0`.
#[inline]
pub fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Packs `vector` and wraps it in base64 for the line protocol.
pub fn encode_b64(vector: &[f32]) -> String {
    STANDARD.encode(encode(vector))
}

/// Inverse of [`encode_b64`]. An empty string decodes to an empty vector.
pub fn decode_b64(text: &str, dim: Option<usize>) -> CodecResult<Vec<f32>> {
    let blob = STANDARD.decode(text.trim())?;
    decode(&blob, dim)
}
