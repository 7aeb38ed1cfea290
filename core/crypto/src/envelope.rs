//! Envelope encryption of serializable values using AES-256-GCM.
//!
//! The wire format is `base64(IV(12) ‖ ciphertext ‖ tag(16))`. A fresh
//! random IV is generated on every call, so encrypting identical
//! plaintext twice never yields comparable ciphertexts.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{de::DeserializeOwned, Serialize};

use crate::kdf::derive_key;
use crate::keys::{DerivedKey, Salt};
use inkvault_common::{Error, Result};

/// IV size for AES-GCM (12 bytes).
pub const IV_LENGTH: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_LENGTH: usize = 16;

/// Encrypt a serializable value under a password-derived key.
///
/// Derives the key with PBKDF2 on every call; when sealing many values
/// under the same credentials, derive once and use [`seal_with_key`].
pub fn seal<T: Serialize>(value: &T, password: &[u8], salt: &Salt) -> Result<String> {
    let key = derive_key(password, salt)?;
    seal_with_key(value, &key)
}

/// Encrypt a serializable value under an already-derived key.
///
/// # Postconditions
/// - Returns `base64(IV ‖ ciphertext ‖ tag)`
/// - The IV is freshly random on every call
///
/// # Errors
/// - Returns error if the value cannot be JSON-serialized
/// - Returns error if encryption fails
pub fn seal_with_key<T: Serialize>(value: &T, key: &DerivedKey) -> Result<String> {
    let plaintext =
        serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let nonce_bytes: [u8; IV_LENGTH] = nonce.into();

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_slice())
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut blob = Vec::with_capacity(IV_LENGTH + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(blob))
}

/// Decrypt an envelope back into a typed value.
///
/// See [`open_with_key`] for the failure contract.
pub fn open<T: DeserializeOwned>(envelope: &str, password: &[u8], salt: &Salt) -> Result<T> {
    let key = derive_key(password, salt)?;
    open_with_key(envelope, &key)
}

/// Decrypt an envelope under an already-derived key.
///
/// # Errors
/// - Any failure on the way to authenticated plaintext (bad base64,
///   truncated blob, failed tag check) is `Error::DecryptionFailed`, so
///   callers cannot distinguish a wrong credential from corrupt data.
/// - A shape mismatch after successful authentication is
///   `Error::Serialization`
pub fn open_with_key<T: DeserializeOwned>(envelope: &str, key: &DerivedKey) -> Result<T> {
    let plaintext = open_bytes(envelope, key)?;
    serde_json::from_slice(&plaintext).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decrypt an envelope into an untyped JSON value.
///
/// Used where the stored shape must be inspected before it can be typed,
/// such as the credentials blob legacy fallback.
pub fn open_value_with_key(envelope: &str, key: &DerivedKey) -> Result<serde_json::Value> {
    open_with_key(envelope, key)
}

fn open_bytes(envelope: &str, key: &DerivedKey) -> Result<Vec<u8>> {
    let blob = BASE64.decode(envelope).map_err(|_| Error::DecryptionFailed)?;

    if blob.len() < IV_LENGTH + TAG_LENGTH {
        return Err(Error::DecryptionFailed);
    }

    let nonce_bytes: [u8; IV_LENGTH] =
        blob[..IV_LENGTH].try_into().map_err(|_| Error::DecryptionFailed)?;
    let nonce = Nonce::from(nonce_bytes);

    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(&nonce, &blob[IV_LENGTH..])
        .map_err(|_| Error::DecryptionFailed)
}
