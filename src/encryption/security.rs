//! Standard security handler: from passwords to a crypto handler.

use super::algorithms::{
    authenticate_owner_password, authenticate_user_password, compute_file_key,
    compute_owner_hash, compute_user_hash, KeyParams,
};
use super::{Algorithm, EncryptDict, EncryptionConfig, StandardCryptoHandler};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};

/// Key management for the password based `/Standard` handler.
pub struct SecurityHandler;

impl SecurityHandler {
    /// Authenticate against an existing encryption dictionary.
    ///
    /// The password is tried as user password first, then as owner password.
    pub fn open(dict: &Dictionary, password: &[u8], file_id: &[u8]) -> Result<StandardCryptoHandler> {
        let parsed = Self::standard(dict)?;
        let algorithm = parsed.algorithm()?;
        if algorithm == Algorithm::Aes256 {
            return Err(Error::Encryption(
                "AES-256 documents need a crypto handler from the source".to_string(),
            ));
        }
        let params = parsed.key_params();
        let key = authenticate_user_password(
            password,
            &parsed.user_hash,
            &parsed.owner_hash,
            file_id,
            &params,
        )
        .or_else(|| {
            authenticate_owner_password(
                password,
                &parsed.user_hash,
                &parsed.owner_hash,
                file_id,
                &params,
            )
        })
        .ok_or_else(|| Error::Encryption("Incorrect password".to_string()))?;
        Ok(StandardCryptoHandler::new(key, algorithm))
    }

    /// Bind an existing encryption dictionary to a new file identifier.
    ///
    /// The file key depends on the first ID string, so a document that is
    /// written with a freshly generated ID needs a new key and a new /U entry.
    /// `dict` is updated in place.
    pub fn rekey(dict: &mut Dictionary, password: &[u8], file_id: &[u8]) -> Result<StandardCryptoHandler> {
        let parsed = Self::standard(dict)?;
        let algorithm = parsed.algorithm()?;
        if algorithm == Algorithm::Aes256 {
            return Err(Error::Encryption(
                "Cannot re-key an AES-256 encryption dictionary".to_string(),
            ));
        }
        let params = parsed.key_params();
        let key = compute_file_key(password, &parsed.owner_hash, file_id, &params);
        let user_hash = compute_user_hash(&key, file_id, params.revision);
        dict.insert("U".to_string(), Object::hex_string(user_hash));
        log::debug!("Re-keyed {:?} encryption dictionary for new file ID", algorithm);
        Ok(StandardCryptoHandler::new(key, algorithm))
    }

    /// Build a new `/Encrypt` dictionary and its crypto handler.
    pub fn create(config: &EncryptionConfig, file_id: &[u8]) -> Result<(Dictionary, StandardCryptoHandler)> {
        if config.algorithm == Algorithm::Aes256 {
            return Err(Error::Encryption(
                "AES-256 security (R6) cannot be created by the standard handler".to_string(),
            ));
        }
        let (version, revision) = config.algorithm.version_revision();
        let key_length = config.algorithm.key_length();
        let params = KeyParams {
            revision: revision as u32,
            key_length,
            permissions: config.permissions.to_p_value(),
            encrypt_metadata: config.encrypt_metadata || revision < 4,
        };

        let owner_hash = compute_owner_hash(
            config.owner_password.as_bytes(),
            config.user_password.as_bytes(),
            &params,
        );
        let key = compute_file_key(config.user_password.as_bytes(), &owner_hash, file_id, &params);
        let user_hash = compute_user_hash(&key, file_id, params.revision);

        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::name("Standard"));
        dict.insert("V".to_string(), Object::Integer(version));
        dict.insert("R".to_string(), Object::Integer(revision));
        dict.insert("Length".to_string(), Object::Integer((key_length * 8) as i64));
        dict.insert("O".to_string(), Object::hex_string(owner_hash));
        dict.insert("U".to_string(), Object::hex_string(user_hash));
        dict.insert("P".to_string(), Object::Integer(params.permissions as i64));
        if config.algorithm == Algorithm::Aes128 {
            if !params.encrypt_metadata {
                dict.insert("EncryptMetadata".to_string(), Object::Boolean(false));
            }
            dict.insert(
                "CF".to_string(),
                Object::dict(vec![(
                    "StdCF",
                    Object::dict(vec![
                        ("AuthEvent", Object::name("DocOpen")),
                        ("CFM", Object::name("AESV2")),
                        ("Length", Object::Integer(16)),
                    ]),
                )]),
            );
            dict.insert("StmF".to_string(), Object::name("StdCF"));
            dict.insert("StrF".to_string(), Object::name("StdCF"));
        }
        Ok((dict, StandardCryptoHandler::new(key, config.algorithm)))
    }

    fn standard(dict: &Dictionary) -> Result<EncryptDict> {
        let parsed = EncryptDict::from_dict(dict)?;
        if !parsed.is_standard() {
            return Err(Error::Encryption(format!(
                "Unsupported security handler /{}",
                parsed.filter
            )));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::CryptoHandler;

    const ID: &[u8] = b"0123456789ABCDEF";

    #[test]
    fn test_create_then_open_with_user_password() {
        let config = EncryptionConfig::new("user", "owner");
        let (dict, created) = SecurityHandler::create(&config, ID).unwrap();
        assert_eq!(dict.get("V").and_then(|v| v.as_integer()), Some(2));
        assert_eq!(dict.get("Length").and_then(|v| v.as_integer()), Some(128));

        let opened = SecurityHandler::open(&dict, b"user", ID).unwrap();
        let ct = created.encrypt(4, b"secret").unwrap();
        assert_eq!(opened.decrypt(4, &ct).unwrap(), b"secret");
    }

    #[test]
    fn test_open_with_owner_password() {
        let config = EncryptionConfig::new("user", "owner").with_algorithm(Algorithm::Rc4_40);
        let (dict, _) = SecurityHandler::create(&config, ID).unwrap();
        assert!(SecurityHandler::open(&dict, b"owner", ID).is_ok());
        assert!(SecurityHandler::open(&dict, b"nobody", ID).is_err());
    }

    #[test]
    fn test_create_aes128_has_crypt_filter() {
        let config = EncryptionConfig::new("", "owner").with_algorithm(Algorithm::Aes128);
        let (dict, handler) = SecurityHandler::create(&config, ID).unwrap();
        assert_eq!(dict.get("StmF").and_then(|v| v.as_name()), Some("StdCF"));
        assert_eq!(handler.algorithm(), Algorithm::Aes128);
        assert!(SecurityHandler::open(&dict, b"", ID).is_ok());
    }

    #[test]
    fn test_create_aes256_rejected() {
        let config = EncryptionConfig::new("", "").with_algorithm(Algorithm::Aes256);
        assert!(matches!(SecurityHandler::create(&config, ID), Err(Error::Encryption(_))));
    }

    #[test]
    fn test_rekey_updates_user_hash() {
        let config = EncryptionConfig::new("", "owner");
        let (mut dict, _) = SecurityHandler::create(&config, ID).unwrap();
        let old_u = dict.get("U").cloned();
        let new_id = b"FEDCBA9876543210";
        SecurityHandler::rekey(&mut dict, b"", new_id).unwrap();
        assert_ne!(dict.get("U").cloned(), old_u);
        assert!(SecurityHandler::open(&dict, b"", new_id).is_ok());
    }

    #[test]
    fn test_non_standard_filter_rejected() {
        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::name("Adobe.PubSec"));
        dict.insert("R".to_string(), Object::Integer(2));
        dict.insert("P".to_string(), Object::Integer(-4));
        dict.insert("O".to_string(), Object::hex_string(vec![0u8; 32]));
        dict.insert("U".to_string(), Object::hex_string(vec![0u8; 32]));
        assert!(SecurityHandler::open(&dict, b"", ID).is_err());
    }
}
