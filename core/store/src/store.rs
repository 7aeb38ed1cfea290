//! State store trait definition.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use inkvault_common::{Error, Result};

/// Well-known keys for the persisted sync state.
///
/// Callers prefix these with the profile identifier, so independent
/// profiles never share state.
pub mod keys {
    pub const DOCUMENTS: &str = "documents";
    pub const ANNOTATIONS: &str = "annotations";
    pub const CREDENTIALS: &str = "credentials";
    pub const PROFILE: &str = "profile-meta";
    pub const PENDING: &str = "pending-changes";
    pub const BASELINE: &str = "sync-baseline";
}

/// Durable key-value storage for local sync state.
///
/// Each value is an opaque serialized blob, independently loadable and
/// saveable. Implementations must not interpret the bytes.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the value stored under `key`, or `None` if absent.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Save `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove the value stored under `key`. Removing an absent key is
    /// not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Load and JSON-decode a value.
pub async fn load_json<T, S>(store: &S, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: StateStore + ?Sized,
{
    match store.load(key).await? {
        Some(bytes) => {
            let value =
                serde_json::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// JSON-encode and save a value.
pub async fn save_json<T, S>(store: &S, key: &str, value: &T) -> Result<()>
where
    T: Serialize,
    S: StateStore + ?Sized,
{
    let bytes = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
    store.save(key, bytes).await
}
