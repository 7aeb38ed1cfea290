//! Sync baseline: what the client believes the server holds.
//!
//! Rewritten only after a successful round trip. The hashes drive the
//! skip/selective/full decisions; the salts are the pair currently
//! believed valid for encryption and transport authentication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use inkvault_crypto::Salt;

/// Last known content hashes and salts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncBaseline {
    /// Content hash of the document collection at last sync.
    pub documents_hash: Option<String>,
    /// Content hash of the annotation collection at last sync.
    pub annotations_hash: Option<String>,
    /// Content hash of the credentials blob at last sync.
    pub credentials_hash: Option<String>,
    /// Salt the encryption key is currently derived from.
    pub encryption_salt: Salt,
    /// Salt the transport hash is currently derived from. `None` until
    /// first contact with the server.
    pub transport_salt: Option<Salt>,
    /// When the last successful sync completed.
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncBaseline {
    /// Create a fresh baseline with a random encryption salt and no
    /// sync history.
    pub fn new() -> Self {
        Self {
            documents_hash: None,
            annotations_hash: None,
            credentials_hash: None,
            encryption_salt: Salt::generate(),
            transport_salt: None,
            last_synced_at: None,
        }
    }

    /// Whether the last successful sync is older than `threshold` (or
    /// never happened).
    pub fn is_stale(&self, threshold: Duration) -> bool {
        match self.last_synced_at {
            Some(at) => {
                let threshold =
                    chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);
                Utc::now() - at >= threshold
            }
            None => true,
        }
    }

    /// Record a successful round trip.
    pub fn record_success(
        &mut self,
        documents_hash: Option<String>,
        annotations_hash: Option<String>,
        credentials_hash: Option<String>,
    ) {
        self.documents_hash = documents_hash;
        self.annotations_hash = annotations_hash;
        self.credentials_hash = credentials_hash;
        self.last_synced_at = Some(Utc::now());
    }
}

impl Default for SyncBaseline {
    fn default() -> Self {
        Self::new()
    }
}
