//! Key derivation using PBKDF2-HMAC-SHA-256.
//!
//! Derivation is deterministic: the same (password, salt) pair always
//! yields the same key, which is what lets two devices independently
//! derive the same key without exchanging it.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha2::Sha256;

use crate::keys::{DerivedKey, Salt, KEY_LENGTH};
use inkvault_common::{Error, Result};

/// Fixed PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 310_000;

/// Derive an AES-256-GCM key from a password and salt.
///
/// # Preconditions
/// - `password` must not be empty
///
/// # Postconditions
/// - Returns a DerivedKey that zeroizes on drop
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if password is empty
///
/// # Security
/// - Password is not stored or logged
pub fn derive_key(password: &[u8], salt: &Salt) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2::<Hmac<Sha256>>(password, salt.as_bytes(), PBKDF2_ITERATIONS, &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(DerivedKey::from_bytes(key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let password = b"test-password-123";
        let salt = Salt::from_bytes([42u8; 16]);

        let key1 = derive_key(password, &salt).unwrap();
        let key2 = derive_key(password, &salt).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let password = b"test-password-123";
        let salt1 = Salt::from_bytes([1u8; 16]);
        let salt2 = Salt::from_bytes([2u8; 16]);

        let key1 = derive_key(password, &salt1).unwrap();
        let key2 = derive_key(password, &salt2).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_password() {
        let salt = Salt::from_bytes([42u8; 16]);

        let key1 = derive_key(b"password1", &salt).unwrap();
        let key2 = derive_key(b"password2", &salt).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_empty_password_fails() {
        let salt = Salt::generate();
        assert!(derive_key(b"", &salt).is_err());
    }
}
