//! Cryptographic primitives for InkVault.
//!
//! This crate provides:
//! - Key derivation using PBKDF2-HMAC-SHA-256
//! - Envelope encryption of serializable values using AES-256-GCM
//! - The one-way transport password hash sent to the server
//! - Deterministic, order-independent content hashing over plaintext
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - The transport hash and the encryption key are derived with
//!   independent salts; the server can never recover one from the other

pub mod content_hash;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod transport_hash;

pub use content_hash::{compute_content_hash, hash_sorted_strings, verify_content_hash};
pub use envelope::{open, open_value_with_key, open_with_key, seal, seal_with_key};
pub use kdf::{derive_key, PBKDF2_ITERATIONS};
pub use keys::{DerivedKey, Salt, KEY_LENGTH, SALT_LENGTH};
pub use transport_hash::{hash_password_for_transport, TransportHash};
