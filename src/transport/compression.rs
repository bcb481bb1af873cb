//! Zlib inflate for gateway payloads.
//!
//! Each binary frame carries one complete zlib stream. The decoder is built
//! per frame and drained to the end before the frame is released, so no
//! state leaks between frames.

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::TransportError;

/// Inflate one zlib-compressed frame.
///
/// # Errors
///
/// - [`TransportError::Frame`] if the payload is not a valid zlib stream
/// - [`TransportError::ReadLimit`] if the inflated size exceeds `limit`
pub fn inflate(data: &[u8], limit: usize) -> Result<Vec<u8>, TransportError> {
    let ceiling = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut decoder = ZlibDecoder::new(data).take(ceiling);
    let mut inflated = Vec::new();

    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| TransportError::Frame(format!("zlib inflate failed: {e}")))?;

    if inflated.len() > limit {
        return Err(TransportError::ReadLimit { limit });
    }
    Ok(inflated)
}

#[cfg(test)]
pub(crate) fn deflate(data: &[u8]) -> Vec<u8> {
    use std::io::Write;

    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inflate_roundtrip() {
        let payload = br#"{"op":10,"d":{"heartbeat_interval":41250}}"#;
        let inflated = inflate(&deflate(payload), 1024).unwrap();
        assert_eq!(inflated, payload);
    }

    #[test]
    fn test_inflate_rejects_garbage() {
        let err = inflate(b"not zlib at all", 1024).unwrap_err();
        assert!(matches!(err, TransportError::Frame(_)));
    }

    #[test]
    fn test_inflate_enforces_limit_on_inflated_size() {
        // Compresses to far below the limit, inflates to far above it.
        let payload = vec![b'a'; 10_000];
        let compressed = deflate(&payload);
        assert!(compressed.len() < 100);

        let err = inflate(&compressed, 100).unwrap_err();
        assert_eq!(err, TransportError::ReadLimit { limit: 100 });
    }

    #[test]
    fn test_inflate_accepts_exact_limit() {
        let payload = vec![b'z'; 64];
        assert_eq!(inflate(&deflate(&payload), 64).unwrap().len(), 64);
    }
}
