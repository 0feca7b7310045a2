//! AES-CBC with PKCS#7 padding.
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm
//!
//! Encrypted strings and streams carry their 16-byte IV in front of the
//! ciphertext. AES-128 (V=4) and AES-256 (V=5) share the same framing.

use crate::error::{Error, Result};
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes256};

const BLOCK: usize = 16;

fn check_iv(iv: &[u8]) -> Result<()> {
    if iv.len() != BLOCK {
        return Err(Error::Encryption(format!("AES IV must be 16 bytes, got {}", iv.len())));
    }
    Ok(())
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad = BLOCK - data.len() % BLOCK;
    let mut padded = Vec::with_capacity(data.len() + pad);
    padded.extend_from_slice(data);
    padded.extend(std::iter::repeat_n(pad as u8, pad));
    padded
}

fn pkcs7_unpad(mut data: Vec<u8>) -> Result<Vec<u8>> {
    let Some(&last) = data.last() else {
        return Ok(data);
    };
    let pad = last as usize;
    if pad == 0 || pad > BLOCK || pad > data.len() {
        return Err(Error::Encryption("Invalid PKCS#7 padding".to_string()));
    }
    if data[data.len() - pad..].iter().any(|&b| b as usize != pad) {
        return Err(Error::Encryption("Invalid PKCS#7 padding".to_string()));
    }
    data.truncate(data.len() - pad);
    Ok(data)
}

fn check_ciphertext(data: &[u8]) -> Result<()> {
    if !data.len().is_multiple_of(BLOCK) {
        return Err(Error::Encryption(format!(
            "AES ciphertext length {} is not a multiple of 16",
            data.len()
        )));
    }
    Ok(())
}

/// Encrypt with AES-CBC, picking AES-128 or AES-256 from the key length.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    check_iv(iv)?;
    let mut buf = pkcs7_pad(data);
    let len = buf.len();
    let bad_key = |_| Error::Encryption(format!("Invalid AES key length {}", key.len()));
    match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| Error::Encryption("AES-128 encryption failed".to_string()))?,
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| Error::Encryption("AES-256 encryption failed".to_string()))?,
        other => return Err(Error::Encryption(format!("Invalid AES key length {}", other))),
    };
    Ok(buf)
}

/// Decrypt AES-CBC data and strip the padding.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    check_iv(iv)?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    check_ciphertext(data)?;
    let mut buf = data.to_vec();
    let bad_key = |_| Error::Encryption(format!("Invalid AES key length {}", key.len()));
    match key.len() {
        16 => {
            cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(bad_key)?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| Error::Encryption("AES-128 decryption failed".to_string()))?;
        },
        32 => {
            cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(bad_key)?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| Error::Encryption("AES-256 decryption failed".to_string()))?;
        },
        other => return Err(Error::Encryption(format!("Invalid AES key length {}", other))),
    }
    pkcs7_unpad(buf)
}
