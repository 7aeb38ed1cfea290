//! Common error types for InkVault.

use thiserror::Error;

/// Top-level error type for InkVault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Envelope could not be opened: wrong password, wrong salt, or a
    /// corrupted ciphertext. Callers cannot tell which, by design of the
    /// authenticated cipher.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// The server rejected the transport password hash.
    ///
    /// Fatal to the sync cycle; any remembered password must be purged
    /// so the client does not retry with a doomed credential.
    #[error("Authentication rejected by server")]
    AuthRejected,

    /// The server imposed a backoff, with the delay it requested.
    ///
    /// Never retried automatically by this subsystem.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Network or I/O failure reaching the server. The pending state is
    /// left untouched; the next trigger retries from scratch.
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Persistent store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
