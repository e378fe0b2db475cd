//! Raw deflate handling for RPF2 payloads

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use super::types::RpfFileInfo;
use crate::crypto::AesKey;
use crate::error::{Error, Result};

/// Inflate a raw deflate stream (no zlib header).
///
/// Fails if the stream is corrupt or inflates past `expected_size`.
pub fn inflate_raw(compressed: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(compressed).take(expected_size as u64 + 1);
    let mut decompressed = Vec::with_capacity(expected_size);

    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::DecompressionError(format!("Failed to inflate raw deflate data: {e}")))?;

    if decompressed.len() > expected_size {
        return Err(Error::DecompressionError(format!(
            "Inflated data exceeds expected size of {expected_size} bytes"
        )));
    }
    Ok(decompressed)
}

/// Raw-deflate `data` at the default level.
pub fn deflate_raw(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::CompressionError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| Error::CompressionError(e.to_string()))
}

/// Turn the stored bytes of an entry into file contents.
///
/// Inflation failure is not an error: the stored bytes are returned as-is.
pub fn decode_payload(stored: Vec<u8>, info: &RpfFileInfo, path: &str) -> Vec<u8> {
    if !info.needs_inflate() {
        return stored;
    }
    match inflate_raw(&stored, info.size as usize) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("{path}: {e}; using stored bytes");
            stored
        }
    }
}

/// Decrypt (when `key` is given) and then decode an entry's stored bytes.
pub fn open_payload(mut stored: Vec<u8>, info: &RpfFileInfo, key: Option<&AesKey>, path: &str) -> Vec<u8> {
    if let Some(key) = key {
        key.decrypt_in_place(&mut stored);
    }
    decode_payload(stored, info, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inflate_matches_deflate() {
        let data = b"liberty city liberty city liberty city".repeat(20);
        let packed = deflate_raw(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(inflate_raw(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_inflate_rejects_oversize() {
        let data = vec![0u8; 1000];
        let packed = deflate_raw(&data).unwrap();
        assert!(inflate_raw(&packed, 10).is_err());
    }

    #[test]
    fn test_decode_payload_falls_back() {
        let info = RpfFileInfo {
            offset: 0,
            size: 100,
            compressed_size: 4,
            compressed: true,
            resource_type: 0,
        };
        let garbage = vec![0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode_payload(garbage.clone(), &info, "x"), garbage);
    }

    #[test]
    fn test_open_payload_decrypts_before_inflate() {
        let key = AesKey::from_bytes(&[9u8; 32]).unwrap();
        let data = b"abcdabcdabcdabcd".repeat(16);
        let mut stored = deflate_raw(&data).unwrap();
        key.encrypt_in_place(&mut stored);
        let info = RpfFileInfo {
            offset: 0,
            size: data.len() as u32,
            compressed_size: stored.len() as u32,
            compressed: true,
            resource_type: 0,
        };
        assert_eq!(open_payload(stored, &info, Some(&key), "x"), data);
    }
}
