//! Download-half reconciliation: merge a remote snapshot into local
//! state without clobbering unsynced local edits.
//!
//! Decoding produces per-item results collected into a batch with
//! explicit counts; one undecryptable record never aborts the batch.

use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use inkvault_common::{Annotation, Document, Error, Identified, Result};
use inkvault_crypto::{compute_content_hash, open_with_key, DerivedKey};
use inkvault_transport::{WireAnnotation, WireDocument};

/// Result of decoding one remote collection.
#[derive(Debug)]
pub struct DecodedBatch<T> {
    /// Successfully decoded items.
    pub items: Vec<T>,
    /// Every id the server reported, including records that failed to
    /// decrypt. Drives the removal rule: an unreadable server copy must
    /// not look like a server-side deletion.
    pub seen: BTreeSet<String>,
    /// Records dropped because they could not be decrypted.
    pub failures: usize,
    /// Records that arrived as plaintext (public documents).
    pub plaintext: usize,
}

impl<T> DecodedBatch<T> {
    /// An empty batch, used when the server skipped the collection.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            seen: BTreeSet::new(),
            failures: 0,
            plaintext: 0,
        }
    }
}

/// Decode a remote document collection.
///
/// Public documents arrive as plaintext JSON and bypass decryption;
/// private ones are opened under `key`. Items are independent, so they
/// are decoded via fan-out and collected.
pub async fn decode_documents(
    remote: Vec<WireDocument>,
    key: &DerivedKey,
) -> DecodedBatch<Document> {
    let decoded = join_all(remote.into_iter().map(|wire| async move {
        let outcome = match (&wire.plain, &wire.envelope) {
            (Some(plain), _) => Ok((plain.clone(), true)),
            (None, Some(envelope)) => {
                open_with_key::<Document>(envelope, key).map(|doc| (doc, false))
            }
            (None, None) => Err(Error::DecryptionFailed),
        };
        (wire.id, outcome)
    }))
    .await;

    collect_batch(decoded)
}

/// Decode a remote annotation collection. Annotations are always
/// envelopes.
pub async fn decode_annotations(
    remote: Vec<WireAnnotation>,
    key: &DerivedKey,
) -> DecodedBatch<Annotation> {
    let decoded = join_all(remote.into_iter().map(|wire| async move {
        let outcome =
            open_with_key::<Annotation>(&wire.envelope, key).map(|ann| (ann, false));
        (wire.id, outcome)
    }))
    .await;

    collect_batch(decoded)
}

fn collect_batch<T>(decoded: Vec<(String, Result<(T, bool)>)>) -> DecodedBatch<T> {
    let mut batch = DecodedBatch::empty();
    for (id, outcome) in decoded {
        batch.seen.insert(id.clone());
        match outcome {
            Ok((item, was_plain)) => {
                if was_plain {
                    batch.plaintext += 1;
                }
                batch.items.push(item);
            }
            Err(e) => {
                warn!(id = %id, error = %e, "dropping undecodable remote record");
                batch.failures += 1;
            }
        }
    }
    batch
}

/// Result of merging one collection.
#[derive(Debug)]
pub struct MergeOutcome<T> {
    /// The merged local collection.
    pub items: Vec<T>,
    /// Remote items appended because they were new here.
    pub downloaded: usize,
    /// Local items replaced by the server's copy.
    pub overwritten: usize,
    /// Local items kept because they carry unpushed edits.
    pub kept_local: usize,
    /// Local items dropped because the server no longer has them.
    pub removed: usize,
    /// Remote records dropped as undecryptable.
    pub decrypt_failures: usize,
    /// Content hash of the merged collection.
    pub content_hash: String,
}

/// Merge a decoded remote collection into the local one.
///
/// Per-item rules:
/// - new on the server and not tombstoned here: append
/// - held here without pending edits: the server's copy wins
/// - held here with pending edits: the local copy wins
/// - held here but unseen on the server: removed, unless a tombstone or
///   a pending edit protects it
pub fn reconcile<T>(
    local: Vec<T>,
    remote: DecodedBatch<T>,
    modified_pending: &BTreeSet<String>,
    deleted_pending: &BTreeSet<String>,
) -> Result<MergeOutcome<T>>
where
    T: Identified + Serialize + Clone,
{
    let mut remote_map: BTreeMap<String, T> = remote
        .items
        .into_iter()
        .map(|item| (item.ident(), item))
        .collect();

    let mut items = Vec::with_capacity(local.len());
    let mut downloaded = 0;
    let mut overwritten = 0;
    let mut kept_local = 0;
    let mut removed = 0;

    for item in local {
        let ident = item.ident();
        if let Some(remote_item) = remote_map.remove(&ident) {
            if modified_pending.contains(&ident) {
                // Local pending edits are never silently clobbered.
                kept_local += 1;
                items.push(item);
            } else {
                overwritten += 1;
                items.push(remote_item);
            }
        } else if remote.seen.contains(&ident) {
            // The server has it but we could not read its copy; keep ours.
            items.push(item);
        } else if deleted_pending.contains(&ident) || modified_pending.contains(&ident) {
            // A tombstone or unpushed edit protects it from disappearing
            // just because the server has not received it yet.
            items.push(item);
        } else {
            removed += 1;
        }
    }

    for (ident, remote_item) in remote_map {
        if deleted_pending.contains(&ident) {
            debug!(id = %ident, "suppressing remote item deleted locally");
            continue;
        }
        downloaded += 1;
        items.push(remote_item);
    }

    let content_hash = compute_content_hash(&items)?;

    Ok(MergeOutcome {
        items,
        downloaded,
        overwritten,
        kept_local,
        removed,
        decrypt_failures: remote.failures,
        content_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use inkvault_common::{DocumentId, Visibility};
    use inkvault_crypto::{seal_with_key, DerivedKey, KEY_LENGTH};

    fn key() -> DerivedKey {
        DerivedKey::from_bytes([42u8; KEY_LENGTH])
    }

    fn doc(id: &str, body: &str) -> Document {
        Document {
            id: DocumentId::new(id).unwrap(),
            body: body.to_string(),
            created_at: Utc::now(),
            visibility: Visibility::Private,
            metrics: None,
        }
    }

    fn wire(document: &Document, key: &DerivedKey) -> WireDocument {
        WireDocument {
            id: document.ident(),
            envelope: Some(seal_with_key(document, key).unwrap()),
            plain: None,
        }
    }

    fn sets(modified: &[&str], deleted: &[&str]) -> (BTreeSet<String>, BTreeSet<String>) {
        (
            modified.iter().map(|s| s.to_string()).collect(),
            deleted.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_decode_documents_mixed() {
        let k = key();
        let private = doc("d1", "private");
        let mut public = doc("d2", "public");
        public.visibility = Visibility::Public;

        let remote = vec![
            wire(&private, &k),
            WireDocument {
                id: "d2".to_string(),
                envelope: None,
                plain: Some(public.clone()),
            },
            WireDocument {
                id: "d3".to_string(),
                envelope: Some("garbage".to_string()),
                plain: None,
            },
        ];

        let batch = decode_documents(remote, &k).await;
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.plaintext, 1);
        assert_eq!(batch.failures, 1);
        // Every wire id is seen, even the undecodable one.
        assert!(batch.seen.contains("d3"));
    }

    #[tokio::test]
    async fn test_new_remote_items_are_appended() {
        let k = key();
        let remote_doc = doc("d1", "from server");
        let batch = decode_documents(vec![wire(&remote_doc, &k)], &k).await;
        let (modified, deleted) = sets(&[], &[]);

        let outcome = reconcile(Vec::new(), batch, &modified, &deleted).unwrap();
        assert_eq!(outcome.downloaded, 1);
        assert_eq!(outcome.items, vec![remote_doc]);
    }

    #[tokio::test]
    async fn test_server_wins_for_untouched_items() {
        let k = key();
        let local = vec![doc("d1", "stale local")];
        let fresh = doc("d1", "fresh from server");
        let batch = decode_documents(vec![wire(&fresh, &k)], &k).await;
        let (modified, deleted) = sets(&[], &[]);

        let outcome = reconcile(local, batch, &modified, &deleted).unwrap();
        assert_eq!(outcome.overwritten, 1);
        assert_eq!(outcome.items[0].body, "fresh from server");
    }

    #[tokio::test]
    async fn test_local_wins_on_pending_edit() {
        let k = key();
        let local = vec![doc("d1", "local edit")];
        let remote_version = doc("d1", "server version");
        let batch = decode_documents(vec![wire(&remote_version, &k)], &k).await;
        let (modified, deleted) = sets(&["d1"], &[]);

        let outcome = reconcile(local, batch, &modified, &deleted).unwrap();
        assert_eq!(outcome.kept_local, 1);
        assert_eq!(outcome.overwritten, 0);
        assert_eq!(outcome.items[0].body, "local edit");
    }

    #[tokio::test]
    async fn test_unseen_untracked_items_are_removed() {
        let local = vec![doc("d1", "gone from server")];
        let (modified, deleted) = sets(&[], &[]);

        let outcome =
            reconcile(local, DecodedBatch::empty(), &modified, &deleted).unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(outcome.items.is_empty());
    }

    #[tokio::test]
    async fn test_tombstone_and_pending_protect_from_removal() {
        let local = vec![doc("d1", "tombstoned"), doc("d2", "edited")];
        let (modified, deleted) = sets(&["d2"], &["d1"]);

        let outcome =
            reconcile(local, DecodedBatch::empty(), &modified, &deleted).unwrap();
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.items.len(), 2);
    }

    #[tokio::test]
    async fn test_locally_deleted_remote_item_is_suppressed() {
        let k = key();
        let remote_doc = doc("d1", "deleted here");
        let batch = decode_documents(vec![wire(&remote_doc, &k)], &k).await;
        let (modified, deleted) = sets(&[], &["d1"]);

        let outcome = reconcile(Vec::new(), batch, &modified, &deleted).unwrap();
        assert_eq!(outcome.downloaded, 0);
        assert!(outcome.items.is_empty());
    }

    #[tokio::test]
    async fn test_undecryptable_server_copy_keeps_local() {
        let k = key();
        let local = vec![doc("d1", "readable local copy")];
        let remote = vec![WireDocument {
            id: "d1".to_string(),
            envelope: Some("garbage".to_string()),
            plain: None,
        }];
        let batch = decode_documents(remote, &k).await;
        let (modified, deleted) = sets(&[], &[]);

        let outcome = reconcile(local, batch, &modified, &deleted).unwrap();
        assert_eq!(outcome.decrypt_failures, 1);
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.items[0].body, "readable local copy");
    }

    #[tokio::test]
    async fn test_hash_matches_merged_collection() {
        let k = key();
        let remote_doc = doc("d1", "x");
        let batch = decode_documents(vec![wire(&remote_doc, &k)], &k).await;
        let (modified, deleted) = sets(&[], &[]);

        let outcome = reconcile(vec![doc("d2", "y")], batch, &modified, &deleted).unwrap();
        assert_eq!(
            outcome.content_hash,
            compute_content_hash(&outcome.items).unwrap()
        );
    }

    #[tokio::test]
    async fn test_decode_annotations_counts_failures() {
        let k = key();
        let annotation = Annotation {
            document: DocumentId::new("d1").unwrap(),
            position: 4,
            created_at: Utc::now(),
        };
        let remote = vec![
            WireAnnotation {
                id: annotation.ident(),
                envelope: seal_with_key(&annotation, &k).unwrap(),
            },
            WireAnnotation {
                id: "d9#0".to_string(),
                envelope: "garbage".to_string(),
            },
        ];

        let batch = decode_annotations(remote, &k).await;
        assert_eq!(batch.items, vec![annotation]);
        assert_eq!(batch.failures, 1);
        assert!(batch.seen.contains("d9#0"));
    }
}
