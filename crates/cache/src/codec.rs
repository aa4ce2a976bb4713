//! Binary value format for embedding vectors.
//!
//! ```text
//! [magic u32 LE][dim u16 LE][version u16 LE][dim × f32 LE]
//! ```
//!
//! The header makes corrupt or foreign blobs detectable on read instead
//! of silently decoding into garbage vectors.

use crate::error::CacheError;

/// `HER0` in ASCII.
pub const VECTOR_MAGIC: u32 = 0x4845_5230;
const CODEC_VERSION: u16 = 1;
const HEADER_BYTES: usize = 8;

/// Encode a vector into the length-prefixed blob format.
///
/// # Errors
///
/// [`CacheError::Codec`] when the dimension exceeds `u16::MAX`.
pub fn encode_vector(vector: &[f32]) -> Result<Vec<u8>, CacheError> {
    let dim: u16 = vector
        .len()
        .try_into()
        .map_err(|_| CacheError::Codec(format!("dimension {} exceeds u16", vector.len())))?;

    let mut blob = Vec::with_capacity(HEADER_BYTES + vector.len() * 4);
    blob.extend_from_slice(&VECTOR_MAGIC.to_le_bytes());
    blob.extend_from_slice(&dim.to_le_bytes());
    blob.extend_from_slice(&CODEC_VERSION.to_le_bytes());
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    Ok(blob)
}

/// Decode a blob produced by [`encode_vector`].
///
/// # Errors
///
/// [`CacheError::Codec`] on short blobs, bad magic, unknown versions, or
/// a payload length that disagrees with the header.
pub fn decode_vector(blob: &[u8]) -> Result<Vec<f32>, CacheError> {
    if blob.len() < HEADER_BYTES {
        return Err(CacheError::Codec(format!("blob too short: {}", blob.len())));
    }
    let magic = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]);
    if magic != VECTOR_MAGIC {
        return Err(CacheError::Codec(format!("bad magic {magic:#010x}")));
    }
    let dim = u16::from_le_bytes([blob[4], blob[5]]) as usize;
    let version = u16::from_le_bytes([blob[6], blob[7]]);
    if version != CODEC_VERSION {
        return Err(CacheError::Codec(format!("unknown codec version {version}")));
    }

    let payload = &blob[HEADER_BYTES..];
    if payload.len() != dim * 4 {
        return Err(CacheError::Codec(format!(
            "payload {} bytes, header claims dim {dim}",
            payload.len()
        )));
    }

    let mut vector = Vec::with_capacity(dim);
    for chunk in payload.chunks_exact(4) {
        vector.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_bits() {
        let v = vec![0.0f32, -0.0, 1.5, f32::MIN_POSITIVE, 12345.678];
        let decoded = decode_vector(&encode_vector(&v).unwrap()).unwrap();
        for (a, b) in v.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn empty_vector_round_trips() {
        let blob = encode_vector(&[]).unwrap();
        assert_eq!(blob.len(), 8);
        assert_eq!(decode_vector(&blob).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn bad_magic_rejected() {
        let mut blob = encode_vector(&[1.0]).unwrap();
        blob[0] ^= 0xff;
        assert!(decode_vector(&blob).is_err());
    }

    #[test]
    fn truncated_payload_rejected() {
        let mut blob = encode_vector(&[1.0, 2.0]).unwrap();
        blob.pop();
        assert!(decode_vector(&blob).is_err());
    }
}
