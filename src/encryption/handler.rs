//! Per-object crypto handler for the standard security handler.

use super::aes::{aes_cbc_decrypt, aes_cbc_encrypt};
use super::rc4::rc4_crypt;
use super::{Algorithm, CryptoHandler};
use crate::error::{Error, Result};
use md5::{Digest, Md5};

/// Encrypts strings and streams with a per-object key derived from the file key.
///
/// PDF Spec: Algorithm 1 - Encryption of data using RC4 or AES
#[derive(Clone)]
pub struct StandardCryptoHandler {
    file_key: Vec<u8>,
    algorithm: Algorithm,
}

impl std::fmt::Debug for StandardCryptoHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardCryptoHandler")
            .field("algorithm", &self.algorithm)
            .field("key_len", &self.file_key.len())
            .finish()
    }
}

impl StandardCryptoHandler {
    /// Create a handler from an already derived file key.
    pub fn new(file_key: Vec<u8>, algorithm: Algorithm) -> Self {
        Self {
            file_key,
            algorithm,
        }
    }

    /// Algorithm in use.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Derive the key for one object. Generation is always 0 for written objects.
    pub fn object_key(&self, obj_num: u32) -> Vec<u8> {
        if self.algorithm == Algorithm::Aes256 {
            return self.file_key.clone();
        }
        let mut hasher = Md5::new();
        hasher.update(&self.file_key);
        hasher.update(&obj_num.to_le_bytes()[..3]);
        hasher.update(0u16.to_le_bytes());
        if self.algorithm.is_aes() {
            hasher.update(b"sAlT");
        }
        let hash = hasher.finalize();
        let len = (self.file_key.len() + 5).min(16);
        hash[..len].to_vec()
    }

    /// Random 16-byte IV mixed from a v4 UUID and the clock.
    fn generate_iv() -> [u8; 16] {
        let mut hasher = Md5::new();
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        hasher.update(now.as_nanos().to_le_bytes());
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&hasher.finalize());
        iv
    }
}

impl CryptoHandler for StandardCryptoHandler {
    fn encrypt(&self, obj_num: u32, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.object_key(obj_num);
        if self.algorithm.is_aes() {
            let iv = Self::generate_iv();
            let mut out = iv.to_vec();
            out.extend(aes_cbc_encrypt(&key, &iv, data)?);
            Ok(out)
        } else {
            Ok(rc4_crypt(&key, data))
        }
    }

    fn decrypt(&self, obj_num: u32, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.object_key(obj_num);
        if self.algorithm.is_aes() {
            if data.len() < 16 {
                return Err(Error::Encryption(format!(
                    "AES payload of object {} shorter than its IV",
                    obj_num
                )));
            }
            let (iv, body) = data.split_at(16);
            aes_cbc_decrypt(&key, iv, body)
        } else {
            Ok(rc4_crypt(&key, data))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_rc4_40() {
        let handler = StandardCryptoHandler::new(vec![1, 2, 3, 4, 5], Algorithm::Rc4_40);
        let k1 = handler.object_key(1);
        let k2 = handler.object_key(2);
        assert_ne!(k1, k2);
        assert_eq!(k1.len(), 10);
    }

    #[test]
    fn test_object_key_aes256_is_file_key() {
        let handler = StandardCryptoHandler::new(vec![9u8; 32], Algorithm::Aes256);
        assert_eq!(handler.object_key(7), vec![9u8; 32]);
    }

    #[test]
    fn test_rc4_round_trip() {
        let handler = StandardCryptoHandler::new(vec![0x11; 16], Algorithm::Rc4_128);
        let ct = handler.encrypt(3, b"Hello").unwrap();
        assert_eq!(ct.len(), 5);
        assert_ne!(ct, b"Hello");
        assert_eq!(handler.decrypt(3, &ct).unwrap(), b"Hello");
    }

    #[test]
    fn test_aes_round_trip_grows_payload() {
        let handler = StandardCryptoHandler::new(vec![0u8; 16], Algorithm::Aes128);
        let ct = handler.encrypt(12, b"BT /F1 12 Tf ET").unwrap();
        // IV + one padded block
        assert_eq!(ct.len(), 32);
        assert_eq!(handler.decrypt(12, &ct).unwrap(), b"BT /F1 12 Tf ET");
    }

    #[test]
    fn test_keys_differ_per_object() {
        let handler = StandardCryptoHandler::new(vec![0x22; 5], Algorithm::Rc4_40);
        let a = handler.encrypt(1, b"same").unwrap();
        let b = handler.encrypt(2, b"same").unwrap();
        assert_ne!(a, b);
    }
}
