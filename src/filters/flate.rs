//! FlateDecode (zlib/deflate) encoding and decoding.
//!
//! Uses the flate2 crate for both directions.

use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compress data with zlib at the default level.
pub fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress zlib data.
///
/// Falls back to raw deflate when the zlib header is damaged, and keeps
/// whatever was recovered before a mid-stream error.
pub fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    match ZlibDecoder::new(data).read_to_end(&mut output) {
        Ok(_) => Ok(output),
        Err(e) if !output.is_empty() => {
            log::warn!(
                "FlateDecode partial recovery: kept {} bytes before corruption: {}",
                output.len(),
                e
            );
            Ok(output)
        },
        Err(e) => {
            log::debug!("Zlib decode failed ({}), trying raw deflate", e);
            output.clear();
            DeflateDecoder::new(data)
                .read_to_end(&mut output)
                .map_err(|e| Error::Decode(format!("FlateDecode failed: {}", e)))?;
            Ok(output)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flate_round_trip() {
        let original = b"1 0 2 13 <</Type /Catalog>>\r\n<</Type /Pages/Count 0>>\r\n".repeat(8);
        let compressed = flate_encode(&original).unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(flate_decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_encode_empty() {
        let compressed = flate_encode(b"").unwrap();
        assert!(!compressed.is_empty());
        assert!(flate_decode(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_flate_decode_raw_deflate() {
        use flate2::write::DeflateEncoder;
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"raw deflate payload").unwrap();
        let raw = encoder.finish().unwrap();
        assert_eq!(flate_decode(&raw).unwrap(), b"raw deflate payload");
    }

    #[test]
    fn test_flate_decode_garbage_fails() {
        let result = flate_decode(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
