//! AES-256-CBC encryption for exchange credentials held in memory.
//!
//! Encrypted values are `hex(iv):hex(ciphertext)` with a fresh 16-byte IV
//! per call, so the same plaintext never encrypts to the same string twice.

pub mod store;

pub use store::*;

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// CBC IV size in bytes.
pub const IV_SIZE: usize = 16;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid encryption key: expected {KEY_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Encryption key not configured")]
    KeyNotConfigured,

    #[error("Malformed encrypted value: {0}")]
    Malformed(String),

    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("UTF-8 decode error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub struct CredentialCipher {
    key: [u8; KEY_SIZE],
}

impl CredentialCipher {
    /// The key is used as raw bytes and must be exactly 32 of them.
    pub fn new(key: &str) -> Result<Self, CryptoError> {
        let bytes = key.as_bytes();
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(Self { key })
    }

    pub fn from_config(key: Option<&str>) -> Result<Self, CryptoError> {
        match key {
            Some(k) if !k.is_empty() => Self::new(k),
            _ => Err(CryptoError::KeyNotConfigured),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, CryptoError> {
        let (iv_hex, data_hex) = encrypted
            .split_once(':')
            .ok_or_else(|| CryptoError::Malformed("missing ':' separator".to_string()))?;

        let iv: [u8; IV_SIZE] = hex::decode(iv_hex)?
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::Malformed(format!("IV is {} bytes", v.len())))?;
        let ciphertext = hex::decode(data_hex)?;

        let plaintext = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        Ok(String::from_utf8(plaintext)?)
    }
}

/// New 32-character alphanumeric key suitable for `ENCRYPTION_KEY`.
pub fn generate_encryption_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_SIZE)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> CredentialCipher {
        CredentialCipher::new(&generate_encryption_key()).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = cipher();
        let encrypted = cipher.encrypt("my-binance-api-key");
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "my-binance-api-key");
    }

    #[test]
    fn test_output_format() {
        let encrypted = cipher().encrypt("secret");
        let (iv, data) = encrypted.split_once(':').unwrap();
        assert_eq!(iv.len(), IV_SIZE * 2);
        // one padded block
        assert_eq!(data.len(), 32);
        assert!(encrypted.chars().all(|c| c == ':' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let cipher = cipher();
        assert_ne!(cipher.encrypt("same"), cipher.encrypt("same"));
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = cipher().encrypt("a fairly long credential value");
        let other = cipher();
        match other.decrypt(&encrypted) {
            Err(_) => {}
            Ok(plain) => assert_ne!(plain, "a fairly long credential value"),
        }
    }

    #[test]
    fn test_key_length_validated() {
        assert!(matches!(
            CredentialCipher::new("short"),
            Err(CryptoError::InvalidKeyLength(5))
        ));
        assert!(matches!(
            CredentialCipher::new("your-32-character-secret-key-here"),
            Err(CryptoError::InvalidKeyLength(33))
        ));
        assert!(matches!(
            CredentialCipher::from_config(None),
            Err(CryptoError::KeyNotConfigured)
        ));
    }

    #[test]
    fn test_malformed_input() {
        let cipher = cipher();
        assert!(matches!(cipher.decrypt("no-separator"), Err(CryptoError::Malformed(_))));
        assert!(matches!(cipher.decrypt("zz:00"), Err(CryptoError::Hex(_))));
        assert!(matches!(cipher.decrypt("00ff:00"), Err(CryptoError::Malformed(_))));
    }

    #[test]
    fn test_generated_key() {
        let key = generate_encryption_key();
        assert_eq!(key.len(), KEY_SIZE);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
