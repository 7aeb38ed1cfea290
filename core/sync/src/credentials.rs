//! Credentials blob management.
//!
//! The credentials record (provider keys plus routing selections) is
//! encrypted and decrypted as one unit. Two stored shapes exist: the
//! structured blob and the legacy flat key-value map; both decode
//! through a single explicit discriminator check.

use std::collections::BTreeMap;

use inkvault_common::{Credentials, Error, Result};
use inkvault_crypto::{hash_sorted_strings, open_value_with_key, DerivedKey};

/// The two shapes a stored credentials blob can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsShape {
    /// Current shape: keys plus routing selections.
    Structured(Credentials),
    /// Legacy shape: a flat provider-to-key map, no selections.
    Legacy(BTreeMap<String, String>),
}

impl CredentialsShape {
    /// Decode a decrypted JSON value into one of the two shapes.
    ///
    /// The discriminator is the presence of the `api_keys` field; the
    /// legacy shape is a flat string map with no such field.
    pub fn decode(value: serde_json::Value) -> Result<Self> {
        let is_structured = value
            .as_object()
            .is_some_and(|map| map.contains_key("api_keys"));

        if is_structured {
            let credentials = serde_json::from_value(value)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            Ok(Self::Structured(credentials))
        } else {
            let api_keys = serde_json::from_value(value)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            Ok(Self::Legacy(api_keys))
        }
    }

    /// Normalize either shape into the structured record.
    pub fn into_credentials(self) -> Credentials {
        match self {
            Self::Structured(credentials) => credentials,
            Self::Legacy(api_keys) => Credentials {
                api_keys,
                selections: BTreeMap::new(),
            },
        }
    }
}

/// Decrypt a credentials envelope, accepting either stored shape.
///
/// The caller never learns which shape was stored.
pub fn decode_credentials(envelope: &str, key: &DerivedKey) -> Result<Credentials> {
    let value = open_value_with_key(envelope, key)?;
    Ok(CredentialsShape::decode(value)?.into_credentials())
}

/// Content hash of the credentials blob.
///
/// Computed over the non-empty key entries and the non-null routing
/// selections, sorted, so devices can detect divergence without the
/// server seeing either.
pub fn credentials_hash(credentials: &Credentials) -> String {
    let parts: Vec<String> = credentials
        .api_keys
        .iter()
        .filter(|(name, secret)| !name.is_empty() && !secret.is_empty())
        .map(|(name, secret)| format!("key:{}={}", name, secret))
        .chain(credentials.selections.iter().filter_map(|(stage, choice)| {
            choice
                .as_ref()
                .map(|provider| format!("selection:{}={}", stage, provider))
        }))
        .collect();

    hash_sorted_strings(&parts)
}

/// Result of reconciling the credentials blob against the server.
#[derive(Debug)]
pub struct CredentialsMergeOutcome {
    /// The winning record.
    pub credentials: Credentials,
    /// Whether the local record won (and must be re-pushed).
    pub local_won: bool,
    /// Whether the remote blob failed to decrypt and was ignored.
    pub decrypt_failed: bool,
    /// Hash of the winning record.
    pub content_hash: String,
}

/// Reconcile the local credentials blob with the server's envelope.
///
/// The server wins unless the blob is flagged modified locally, in which
/// case the local record is kept for re-push. An undecryptable remote
/// blob is counted and ignored; the cycle continues with local state.
pub fn reconcile_credentials(
    local: Credentials,
    remote_envelope: Option<&str>,
    credentials_modified: bool,
    key: &DerivedKey,
) -> CredentialsMergeOutcome {
    if credentials_modified {
        let content_hash = credentials_hash(&local);
        return CredentialsMergeOutcome {
            credentials: local,
            local_won: true,
            decrypt_failed: false,
            content_hash,
        };
    }

    match remote_envelope {
        Some(envelope) => match decode_credentials(envelope, key) {
            Ok(remote) => {
                let content_hash = credentials_hash(&remote);
                CredentialsMergeOutcome {
                    credentials: remote,
                    local_won: false,
                    decrypt_failed: false,
                    content_hash,
                }
            }
            Err(_) => {
                let content_hash = credentials_hash(&local);
                CredentialsMergeOutcome {
                    credentials: local,
                    local_won: false,
                    decrypt_failed: true,
                    content_hash,
                }
            }
        },
        None => {
            let content_hash = credentials_hash(&local);
            CredentialsMergeOutcome {
                credentials: local,
                local_won: false,
                decrypt_failed: false,
                content_hash,
            }
        }
    }
}
