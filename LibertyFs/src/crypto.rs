//! AES-256-ECB routine shared by RPF2 tables of contents and encrypted IMG
//! headers.
//!
//! The archives apply the cipher sixteen times in sequence. Only the
//! 16-byte aligned prefix of a buffer is transformed; any tail is left as-is.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::error::{Error, Result};

/// Number of sequential cipher applications.
pub const AES_ROUNDS: usize = 16;

/// Key length in bytes.
pub const AES_KEY_LEN: usize = 32;

/// Relative locations probed by [`AesKey::find`], in order.
pub const KEY_SEARCH_PATHS: [&str; 3] = ["aes_key.bin", "../aes_key.bin", "game/aes_key.bin"];

/// A validated 32-byte archive key.
#[derive(Clone)]
pub struct AesKey {
    cipher: Aes256,
    raw: [u8; AES_KEY_LEN],
}

impl AesKey {
    /// Build a key from raw bytes; anything but 32 bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; AES_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidAesKeyLength(bytes.len()))?;
        let cipher = Aes256::new_from_slice(&raw)
            .map_err(|_| Error::InvalidAesKeyLength(bytes.len()))?;
        Ok(Self { cipher, raw })
    }

    /// Read a raw key file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Probe [`KEY_SEARCH_PATHS`] under `root` and return the first valid key.
    ///
    /// Files of the wrong size are skipped.
    pub fn find(root: impl AsRef<Path>) -> Option<(Self, PathBuf)> {
        let root = root.as_ref();
        KEY_SEARCH_PATHS.iter().find_map(|rel| {
            let candidate = root.join(rel);
            match Self::from_file(&candidate) {
                Ok(key) => {
                    tracing::info!("Loaded AES key from {}", candidate.display());
                    Some((key, candidate))
                }
                Err(Error::InvalidAesKeyLength(len)) => {
                    tracing::warn!(
                        "Ignoring AES key {}: {len} bytes (expected {AES_KEY_LEN})",
                        candidate.display()
                    );
                    None
                }
                Err(_) => None,
            }
        })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; AES_KEY_LEN] {
        &self.raw
    }

    /// Decrypt the aligned prefix of `data` in place.
    pub fn decrypt_in_place(&self, data: &mut [u8]) {
        let aligned = data.len() & !0x0F;
        for _ in 0..AES_ROUNDS {
            for block in data[..aligned].chunks_exact_mut(16) {
                self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
            }
        }
    }

    /// Encrypt the aligned prefix of `data` in place.
    pub fn encrypt_in_place(&self, data: &mut [u8]) {
        let aligned = data.len() & !0x0F;
        for _ in 0..AES_ROUNDS {
            for block in data[..aligned].chunks_exact_mut(16) {
                self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
            }
        }
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(..)")
    }
}

impl PartialEq for AesKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for AesKey {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> AesKey {
        let bytes: Vec<u8> = (0u8..32).collect();
        AesKey::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(matches!(
            AesKey::from_bytes(&[0u8; 16]),
            Err(Error::InvalidAesKeyLength(16))
        ));
    }

    #[test]
    fn test_decrypt_inverts_encrypt() {
        let key = test_key();
        let original: Vec<u8> = (0..40u8).collect();
        let mut data = original.clone();
        key.encrypt_in_place(&mut data);
        assert_ne!(&data[..32], &original[..32]);
        // Unaligned tail untouched
        assert_eq!(&data[32..], &original[32..]);
        key.decrypt_in_place(&mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn test_sixteen_rounds_differ_from_one() {
        let key = test_key();
        let mut sixteen = [7u8; 16];
        key.encrypt_in_place(&mut sixteen);

        let mut once = [7u8; 16];
        key.cipher.encrypt_block(GenericArray::from_mut_slice(&mut once));
        assert_ne!(sixteen, once);
    }

    #[test]
    fn test_find_skips_bad_sizes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("aes_key.bin"), [1u8; 31]).unwrap();
        std::fs::create_dir(dir.path().join("game")).unwrap();
        std::fs::write(dir.path().join("game/aes_key.bin"), [2u8; 32]).unwrap();

        let (key, path) = AesKey::find(dir.path()).unwrap();
        assert_eq!(key.as_bytes(), &[2u8; 32]);
        assert!(path.ends_with("game/aes_key.bin"));
    }
}
