//! Transport password hash sent to the server for authentication.
//!
//! This is a separate one-way hash with its own salt, cryptographically
//! unrelated to the encryption key: what the server stores must never be
//! enough to derive the key that protects the content.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::keys::Salt;

/// A salted one-way password hash for server-side authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportHash {
    /// base64(SHA-256(salt ‖ password))
    pub hash: String,
    /// The salt that produced the hash.
    pub salt: Salt,
}

/// Hash a password for transport authentication.
///
/// Deterministic given a salt; a fresh random salt is generated when
/// none is provided.
pub fn hash_password_for_transport(password: &[u8], salt: Option<Salt>) -> TransportHash {
    let salt = salt.unwrap_or_else(Salt::generate);

    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password);
    let digest = hasher.finalize();

    TransportHash {
        hash: BASE64.encode(digest),
        salt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_with_same_salt() {
        let salt = Salt::from_bytes([5u8; 16]);
        let h1 = hash_password_for_transport(b"password", Some(salt.clone()));
        let h2 = hash_password_for_transport(b"password", Some(salt));

        assert_eq!(h1.hash, h2.hash);
    }

    #[test]
    fn test_differs_across_salts() {
        let h1 = hash_password_for_transport(b"password", Some(Salt::from_bytes([1u8; 16])));
        let h2 = hash_password_for_transport(b"password", Some(Salt::from_bytes([2u8; 16])));

        assert_ne!(h1.hash, h2.hash);
    }

    #[test]
    fn test_differs_across_passwords() {
        let salt = Salt::from_bytes([5u8; 16]);
        let h1 = hash_password_for_transport(b"alpha", Some(salt.clone()));
        let h2 = hash_password_for_transport(b"beta", Some(salt));

        assert_ne!(h1.hash, h2.hash);
    }

    #[test]
    fn test_generates_salt_when_absent() {
        let h1 = hash_password_for_transport(b"password", None);
        let h2 = hash_password_for_transport(b"password", None);

        // Fresh salts, so fresh hashes
        assert_ne!(h1.salt, h2.salt);
        assert_ne!(h1.hash, h2.hash);
    }
}
