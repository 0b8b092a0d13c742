//! AES-256-GCM sealing of sensitive payload fields.
//!
//! Wire form: `enc1:` + hex(12-byte nonce || ciphertext). `open` exists for
//! authorized out-of-band review, never for the request path.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::error::{AuditError, AuditResult};

pub const SEALED_PREFIX: &str = "enc1:";

const NONCE_LEN: usize = 12;

pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl FieldCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Key from a 64-character hex string, as carried in configuration.
    pub fn from_hex(hex_key: &str) -> AuditResult<Self> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| AuditError::Storage(format!("invalid encryption key: {}", e)))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AuditError::Storage("encryption key must be 32 bytes".to_string()))?;
        Ok(Self::new(&key))
    }

    pub fn seal(&self, plaintext: &str) -> AuditResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AuditError::Storage(format!("payload encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(format!("{}{}", SEALED_PREFIX, hex::encode(out)))
    }

    pub fn open(&self, sealed: &str) -> AuditResult<String> {
        let encoded = sealed
            .strip_prefix(SEALED_PREFIX)
            .ok_or_else(|| AuditError::Storage("value is not sealed".to_string()))?;
        let raw = hex::decode(encoded)
            .map_err(|e| AuditError::Storage(format!("sealed value corrupt: {}", e)))?;
        if raw.len() <= NONCE_LEN {
            return Err(AuditError::Storage("sealed value too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AuditError::Storage(format!("payload decryption failed: {}", e)))?;
        String::from_utf8(plaintext)
            .map_err(|e| AuditError::Storage(format!("sealed value not utf-8: {}", e)))
    }

    pub fn is_sealed(value: &str) -> bool {
        value.starts_with(SEALED_PREFIX)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new(&[7u8; 32])
    }

    #[test]
    fn test_seal_open_round_trip() {
        let c = cipher();
        let sealed = c.seal("{\"cardNumber\":\"4111\"}").unwrap();
        assert!(FieldCipher::is_sealed(&sealed));
        assert_ne!(sealed, "{\"cardNumber\":\"4111\"}");
        assert_eq!(c.open(&sealed).unwrap(), "{\"cardNumber\":\"4111\"}");
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let c = cipher();
        let a = c.seal("same").unwrap();
        let b = c.seal("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let sealed = cipher().seal("secret").unwrap();
        let other = FieldCipher::new(&[9u8; 32]);
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn test_from_hex_key_validation() {
        assert!(FieldCipher::from_hex(&"ab".repeat(32)).is_ok());
        assert!(FieldCipher::from_hex("abcd").is_err());
        assert!(FieldCipher::from_hex("not-hex").is_err());
    }

    #[test]
    fn test_open_rejects_unsealed_value() {
        assert!(cipher().open("plain text").is_err());
    }
}
