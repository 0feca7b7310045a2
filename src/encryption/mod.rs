//! PDF encryption support for the writer.
//!
//! The creator only needs a byte transform keyed by object number, expressed
//! by the [`CryptoHandler`] trait. This module provides the standard security
//! handler implementation of it:
//!
//! - RC4 with 40-bit and 128-bit keys (V=1/R=2, V=2/R=3)
//! - AES-128 in CBC mode (V=4/R=4)
//! - AES-256 for handlers built from an already known file key (V=5)
//!
//! [`SecurityHandler`] turns an `/Encrypt` dictionary plus password into a
//! crypto handler, and builds fresh `/Encrypt` dictionaries for
//! [`EncryptionConfig`].
//!
//! # References
//!
//! - PDF Spec Section 7.6: Encryption
//! - PDF Spec Section 7.6.3: Standard Security Handler

use crate::error::{Error, Result};
use crate::object::Dictionary;
use bitflags::bitflags;

mod aes;
mod algorithms;
mod handler;
mod rc4;
mod security;

pub use algorithms::KeyParams;
pub use handler::StandardCryptoHandler;
pub use rc4::rc4_crypt;
pub use security::SecurityHandler;

/// Per-object byte transform applied to strings and stream payloads.
///
/// Implementations may change the length of the data (block padding, IVs).
pub trait CryptoHandler: Send + Sync {
    /// Encrypt `data` belonging to indirect object `obj_num`.
    fn encrypt(&self, obj_num: u32, data: &[u8]) -> Result<Vec<u8>>;

    /// Reverse [`CryptoHandler::encrypt`].
    fn decrypt(&self, obj_num: u32, data: &[u8]) -> Result<Vec<u8>>;
}

/// Encryption algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// RC4 with 40-bit key (V=1, R=2)
    Rc4_40,
    /// RC4 with 128-bit key (V=2, R=3)
    Rc4_128,
    /// AES with 128-bit key in CBC mode (V=4, R=4)
    Aes128,
    /// AES with 256-bit key in CBC mode (V=5)
    Aes256,
}

impl Algorithm {
    /// Key length in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            Algorithm::Rc4_40 => 5,
            Algorithm::Rc4_128 | Algorithm::Aes128 => 16,
            Algorithm::Aes256 => 32,
        }
    }

    /// Check if this is an AES algorithm.
    pub fn is_aes(&self) -> bool {
        matches!(self, Algorithm::Aes128 | Algorithm::Aes256)
    }

    /// `(V, R)` pair written into the encryption dictionary.
    pub fn version_revision(&self) -> (i64, i64) {
        match self {
            Algorithm::Rc4_40 => (1, 2),
            Algorithm::Rc4_128 => (2, 3),
            Algorithm::Aes128 => (4, 4),
            Algorithm::Aes256 => (5, 6),
        }
    }
}

bitflags! {
    /// User access permissions (P entry).
    ///
    /// PDF Spec: Table 22 - User access permissions
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        /// Bit 3: print the document
        const PRINT = 1 << 2;
        /// Bit 4: modify contents
        const MODIFY = 1 << 3;
        /// Bit 5: copy or extract text and graphics
        const COPY = 1 << 4;
        /// Bit 6: add or modify annotations
        const ANNOTATE = 1 << 5;
        /// Bit 9: fill in form fields (R>=3)
        const FILL_FORMS = 1 << 8;
        /// Bit 10: extract for accessibility (R>=3)
        const ACCESSIBILITY = 1 << 9;
        /// Bit 11: assemble the document (R>=3)
        const ASSEMBLE = 1 << 10;
        /// Bit 12: high quality print (R>=3)
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

impl Permissions {
    /// The signed P value with the reserved bits (7-8, 13-32) set.
    pub fn to_p_value(&self) -> i32 {
        (0xFFFF_F0C0u32 | self.bits()) as i32
    }
}

/// Settings for encrypting a document that is written without security today.
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    /// Password required to open the document (may be empty).
    pub user_password: String,
    /// Password for full access; empty means "same as user password".
    pub owner_password: String,
    /// Algorithm to use.
    pub algorithm: Algorithm,
    /// Permissions granted with the user password.
    pub permissions: Permissions,
    /// Whether metadata streams are encrypted too (R4 only).
    pub encrypt_metadata: bool,
}

impl EncryptionConfig {
    /// New configuration: RC4-128, all permissions.
    pub fn new(user_password: impl Into<String>, owner_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: owner_password.into(),
            algorithm: Algorithm::Rc4_128,
            permissions: Permissions::all(),
            encrypt_metadata: true,
        }
    }

    /// Set the encryption algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the permissions.
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Leave metadata streams in clear text.
    pub fn with_encrypt_metadata(mut self, encrypt: bool) -> Self {
        self.encrypt_metadata = encrypt;
        self
    }
}

/// Parsed standard `/Encrypt` dictionary.
///
/// PDF Spec: Section 7.6.1 - General
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptDict {
    /// Filter name (`Standard` for the password handler)
    pub filter: String,
    /// V entry
    pub version: i64,
    /// R entry
    pub revision: i64,
    /// Key length in bytes
    pub key_length: usize,
    /// O entry
    pub owner_hash: Vec<u8>,
    /// U entry
    pub user_hash: Vec<u8>,
    /// P entry
    pub permissions: i32,
    /// EncryptMetadata entry
    pub encrypt_metadata: bool,
    /// Whether the standard crypt filter uses AES
    pub uses_aes: bool,
}

impl EncryptDict {
    /// Parse an encryption dictionary.
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        let int = |key: &str| dict.get(key).and_then(|o| o.as_integer());
        let bytes = |key: &str| {
            dict.get(key)
                .and_then(|o| o.as_string())
                .map(|s| s.to_vec())
                .ok_or_else(|| Error::InvalidPdf(format!("Encrypt dictionary missing /{}", key)))
        };

        let filter = dict
            .get("Filter")
            .and_then(|o| o.as_name())
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /Filter".to_string()))?
            .to_string();
        let version = int("V").unwrap_or(0);
        let revision = int("R")
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /R".to_string()))?;
        let permissions = int("P")
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /P".to_string()))?
            as i32;

        let uses_aes = dict
            .get("CF")
            .and_then(|cf| cf.as_dict())
            .and_then(|cf| cf.get("StdCF"))
            .and_then(|std_cf| std_cf.as_dict())
            .and_then(|std_cf| std_cf.get("CFM"))
            .and_then(|cfm| cfm.as_name())
            .is_some_and(|cfm| cfm.starts_with("AESV"));

        let key_length = match int("Length") {
            Some(bits) if version > 1 => (bits / 8) as usize,
            _ if version >= 5 => 32,
            _ if version >= 2 => 16,
            _ => 5,
        };

        Ok(Self {
            filter,
            version,
            revision,
            key_length,
            owner_hash: bytes("O")?,
            user_hash: bytes("U")?,
            permissions,
            encrypt_metadata: dict
                .get("EncryptMetadata")
                .and_then(|o| o.as_bool())
                .unwrap_or(true),
            uses_aes,
        })
    }

    /// Whether this dictionary belongs to the password based standard handler.
    pub fn is_standard(&self) -> bool {
        self.filter == "Standard"
    }

    /// Algorithm implied by V, R and the crypt filter.
    pub fn algorithm(&self) -> Result<Algorithm> {
        match (self.version, self.revision) {
            (1, 2) | (0, 2) => Ok(Algorithm::Rc4_40),
            (2, 3) => Ok(Algorithm::Rc4_128),
            (4, 4) if self.uses_aes => Ok(Algorithm::Aes128),
            (4, 4) => Ok(Algorithm::Rc4_128),
            (5, 5) | (5, 6) => Ok(Algorithm::Aes256),
            (v, r) => Err(Error::Encryption(format!(
                "Unsupported encryption version V={}, R={}",
                v, r
            ))),
        }
    }

    /// Parameters for the MD5 based key algorithms.
    pub fn key_params(&self) -> KeyParams {
        KeyParams {
            revision: self.revision as u32,
            key_length: self.key_length,
            permissions: self.permissions,
            encrypt_metadata: self.encrypt_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn test_algorithm_properties() {
        assert_eq!(Algorithm::Rc4_40.key_length(), 5);
        assert_eq!(Algorithm::Aes128.version_revision(), (4, 4));
        assert!(Algorithm::Aes256.is_aes());
        assert!(!Algorithm::Rc4_128.is_aes());
    }

    #[test]
    fn test_permissions_p_value() {
        assert_eq!(Permissions::empty().to_p_value(), -3904);
        assert_eq!(Permissions::all().to_p_value(), -4);
        let print_only = Permissions::PRINT.to_p_value();
        assert_eq!(print_only & 0b100, 0b100);
        assert_eq!(print_only & (1 << 4), 0);
    }

    #[test]
    fn test_encrypt_dict_parse_aes() {
        let cf = Object::dict(vec![(
            "StdCF",
            Object::dict(vec![("CFM", Object::name("AESV2")), ("Length", Object::Integer(16))]),
        )]);
        let dict = Object::dict(vec![
            ("Filter", Object::name("Standard")),
            ("V", Object::Integer(4)),
            ("R", Object::Integer(4)),
            ("Length", Object::Integer(128)),
            ("O", Object::hex_string(vec![1u8; 32])),
            ("U", Object::hex_string(vec![2u8; 32])),
            ("P", Object::Integer(-4)),
            ("CF", cf),
        ]);
        let parsed = EncryptDict::from_dict(dict.as_dict().unwrap()).unwrap();
        assert!(parsed.is_standard());
        assert_eq!(parsed.key_length, 16);
        assert_eq!(parsed.algorithm().unwrap(), Algorithm::Aes128);
    }

    #[test]
    fn test_encrypt_dict_missing_owner_hash() {
        let dict = Object::dict(vec![
            ("Filter", Object::name("Standard")),
            ("V", Object::Integer(1)),
            ("R", Object::Integer(2)),
            ("U", Object::hex_string(vec![2u8; 32])),
            ("P", Object::Integer(-4)),
        ]);
        let err = EncryptDict::from_dict(dict.as_dict().unwrap()).unwrap_err();
        assert!(format!("{}", err).contains("/O"));
    }

    #[test]
    fn test_config_builder() {
        let config = EncryptionConfig::new("user", "owner")
            .with_algorithm(Algorithm::Aes128)
            .with_permissions(Permissions::PRINT | Permissions::COPY)
            .with_encrypt_metadata(false);
        assert_eq!(config.algorithm, Algorithm::Aes128);
        assert!(config.permissions.contains(Permissions::COPY));
        assert!(!config.encrypt_metadata);
    }
}
