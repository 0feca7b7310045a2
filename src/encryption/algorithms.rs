//! Standard security handler algorithms (revisions 2-4).
//!
//! PDF Spec: Section 7.6.3 - Standard Security Handler
//!
//! Covers file key derivation (Algorithm 2), the /O value (Algorithm 3),
//! the /U value (Algorithms 4 and 5) and password authentication
//! (Algorithms 6 and 7). Everything here is MD5 + RC4 based.

use super::rc4::rc4_crypt;
use md5::{Digest, Md5};

/// Padding string used to pad passwords to 32 bytes.
///
/// PDF Spec: Algorithm 2, step a
pub const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

/// Dictionary values that take part in key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyParams {
    /// Revision (R), 2-4
    pub revision: u32,
    /// File key length in bytes (5-16)
    pub key_length: usize,
    /// Permission bits (P)
    pub permissions: i32,
    /// EncryptMetadata flag
    pub encrypt_metadata: bool,
}

impl KeyParams {
    fn md5_len(&self) -> usize {
        self.key_length.clamp(5, 16)
    }
}

/// Pad or truncate a password to 32 bytes.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    if len < 32 {
        padded[len..].copy_from_slice(&PADDING[..32 - len]);
    }
    padded
}

/// Compute the file encryption key from a user password (Algorithm 2).
pub fn compute_file_key(
    user_password: &[u8],
    owner_hash: &[u8],
    file_id: &[u8],
    params: &KeyParams,
) -> Vec<u8> {
    let n = params.md5_len();
    let mut hasher = Md5::new();
    hasher.update(pad_password(user_password));
    hasher.update(owner_hash);
    hasher.update(params.permissions.to_le_bytes());
    hasher.update(file_id);
    if params.revision >= 4 && !params.encrypt_metadata {
        hasher.update([0xFF; 4]);
    }
    let mut hash = hasher.finalize().to_vec();

    if params.revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..n]).to_vec();
        }
    }
    hash.truncate(n);
    hash
}

/// RC4 key used to protect the /O value (Algorithm 3, steps a-d).
fn owner_rc4_key(owner_password: &[u8], params: &KeyParams) -> Vec<u8> {
    let n = params.md5_len();
    let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
    if params.revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..n]).to_vec();
        }
    }
    if params.revision >= 3 {
        hash.truncate(n);
    } else {
        hash.truncate(5);
    }
    hash
}

fn xor_key(key: &[u8], round: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ round).collect()
}

/// Compute the /O value (Algorithm 3).
///
/// An empty owner password falls back to the user password.
pub fn compute_owner_hash(owner_password: &[u8], user_password: &[u8], params: &KeyParams) -> Vec<u8> {
    let password = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let key = owner_rc4_key(password, params);
    let mut result = rc4_crypt(&key, &pad_password(user_password));
    if params.revision >= 3 {
        for round in 1..=19u8 {
            result = rc4_crypt(&xor_key(&key, round), &result);
        }
    }
    result
}

/// Compute the /U value from the file key (Algorithm 4 for R2, 5 for R3+).
///
/// For R3+ only the first 16 bytes are significant; the rest is zero filled.
pub fn compute_user_hash(file_key: &[u8], file_id: &[u8], revision: u32) -> Vec<u8> {
    if revision < 3 {
        return rc4_crypt(file_key, &PADDING);
    }
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let mut hash = hasher.finalize().to_vec();
    for round in 0..20u8 {
        hash = rc4_crypt(&xor_key(file_key, round), &hash);
    }
    hash.resize(32, 0);
    hash
}

/// Authenticate a user password (Algorithm 6). Returns the file key on success.
pub fn authenticate_user_password(
    password: &[u8],
    user_hash: &[u8],
    owner_hash: &[u8],
    file_id: &[u8],
    params: &KeyParams,
) -> Option<Vec<u8>> {
    let key = compute_file_key(password, owner_hash, file_id, params);
    let expected = compute_user_hash(&key, file_id, params.revision);
    let significant = if params.revision >= 3 { 16 } else { 32 };
    if user_hash.len() < significant {
        return None;
    }
    constant_time_compare(&user_hash[..significant], &expected[..significant]).then_some(key)
}

/// Authenticate an owner password (Algorithm 7). Returns the file key on success.
pub fn authenticate_owner_password(
    password: &[u8],
    user_hash: &[u8],
    owner_hash: &[u8],
    file_id: &[u8],
    params: &KeyParams,
) -> Option<Vec<u8>> {
    let key = owner_rc4_key(password, params);
    let mut user_password = owner_hash.to_vec();
    if params.revision >= 3 {
        for round in (0..=19u8).rev() {
            user_password = rc4_crypt(&xor_key(&key, round), &user_password);
        }
    } else {
        user_password = rc4_crypt(&key, &user_password);
    }
    authenticate_user_password(&user_password, user_hash, owner_hash, file_id, params)
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(revision: u32, key_length: usize) -> KeyParams {
        KeyParams {
            revision,
            key_length,
            permissions: -3904,
            encrypt_metadata: true,
        }
    }

    #[test]
    fn test_pad_password() {
        let padded = pad_password(b"test");
        assert_eq!(&padded[..4], b"test");
        assert_eq!(&padded[4..], &PADDING[..28]);
        assert_eq!(pad_password(b""), PADDING);
    }

    #[test]
    fn test_pad_password_long() {
        let password = b"this is a very long password that exceeds 32 bytes";
        assert_eq!(&pad_password(password)[..], &password[..32]);
    }

    #[test]
    fn test_file_key_lengths() {
        let id = b"0123456789abcdef";
        let o = [0u8; 32];
        assert_eq!(compute_file_key(b"", &o, id, &params(2, 5)).len(), 5);
        assert_eq!(compute_file_key(b"", &o, id, &params(3, 16)).len(), 16);
    }

    #[test]
    fn test_user_round_trip_r2() {
        let p = params(2, 5);
        let id = b"test_file_id_123";
        let o = compute_owner_hash(b"owner123", b"user123", &p);
        let key = compute_file_key(b"user123", &o, id, &p);
        let u = compute_user_hash(&key, id, p.revision);
        assert_eq!(u.len(), 32);

        assert_eq!(authenticate_user_password(b"user123", &u, &o, id, &p), Some(key));
        assert!(authenticate_user_password(b"wrong", &u, &o, id, &p).is_none());
    }

    #[test]
    fn test_owner_round_trip_r3() {
        let p = params(3, 16);
        let id = b"test_file_id_456";
        let o = compute_owner_hash(b"owner456", b"user456", &p);
        let key = compute_file_key(b"user456", &o, id, &p);
        let u = compute_user_hash(&key, id, p.revision);

        assert_eq!(authenticate_owner_password(b"owner456", &u, &o, id, &p), Some(key));
        assert!(authenticate_owner_password(b"user456", &u, &o, id, &p).is_none());
    }

    #[test]
    fn test_encrypt_metadata_changes_key_r4() {
        let id = b"id";
        let o = [7u8; 32];
        let with = compute_file_key(b"", &o, id, &params(4, 16));
        let without = compute_file_key(
            b"",
            &o,
            id,
            &KeyParams {
                encrypt_metadata: false,
                ..params(4, 16)
            },
        );
        assert_ne!(with, without);
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"abc", b"abc"));
        assert!(!constant_time_compare(b"abc", b"abd"));
        assert!(!constant_time_compare(b"abc", b"ab"));
    }
}
