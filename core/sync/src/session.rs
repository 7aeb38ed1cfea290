//! Sync session: orchestrates one download-then-upload cycle.
//!
//! Only one cycle may be in flight per session; a caller invoking sync
//! while one is active no-ops rather than queueing or erroring. The
//! pending tracker and the baseline are only touched by the completing
//! cycle, so the single-flight guard is the only synchronization needed.

use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use inkvault_common::{Annotation, Document, Error, Identified, Password, Result};
use inkvault_crypto::{
    compute_content_hash, derive_key, hash_password_for_transport, seal_with_key, DerivedKey,
    Salt,
};
use inkvault_store::StateStore;
use inkvault_transport::{
    AnnotationPush, CredentialsPush, DocumentPush, FetchRequest, PushRequest, SyncTransport,
    WireAnnotation, WireDocument,
};

use crate::context::ClientContext;
use crate::credentials::{credentials_hash, reconcile_credentials};
use crate::merge::{decode_annotations, decode_documents, reconcile};
use crate::rotate;

/// Timing configuration for sync scheduling.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay between a local mutation and the cycle it schedules, so a
    /// burst of edits produces one round trip.
    pub debounce: Duration,
    /// Age of the last successful sync beyond which a resume event
    /// triggers an immediate cycle.
    pub staleness_threshold: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(3),
            staleness_threshold: Duration::from_secs(3600),
        }
    }
}

/// Result of asking the session to sync.
#[derive(Debug)]
pub enum SyncOutcome {
    /// A cycle ran to completion.
    Completed(SyncReport),
    /// Another cycle was already in flight; nothing was done.
    AlreadyInFlight,
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub documents_downloaded: usize,
    pub documents_removed: usize,
    pub annotations_downloaded: usize,
    pub annotations_removed: usize,
    pub decrypt_failures: usize,
    pub documents_uploaded: usize,
    pub annotations_uploaded: usize,
    pub tombstones_pushed: usize,
    pub credentials_pushed: bool,
    pub profile_pushed: bool,
    pub full_upload: bool,
    pub duration: Duration,
}

/// Sync session over a transport and a persistent store.
pub struct SyncSession<T: ?Sized, S: ?Sized> {
    transport: Arc<T>,
    store: Arc<S>,
    syncing: AtomicBool,
}

impl<T, S> SyncSession<T, S>
where
    T: SyncTransport + ?Sized,
    S: StateStore + ?Sized,
{
    /// Create a session.
    pub fn new(transport: Arc<T>, store: Arc<S>) -> Self {
        Self {
            transport,
            store,
            syncing: AtomicBool::new(false),
        }
    }

    /// Run one download-then-upload cycle.
    ///
    /// No-ops when a cycle is already in flight. On `AuthRejected` the
    /// remembered password is purged so the client does not retry with a
    /// doomed credential.
    pub async fn sync(
        &self,
        ctx: &mut ClientContext,
        password: &Password,
    ) -> Result<SyncOutcome> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sync already in flight, skipping");
            return Ok(SyncOutcome::AlreadyInFlight);
        }

        let result = self.run_cycle(ctx, password).await;
        self.syncing.store(false, Ordering::SeqCst);

        match result {
            Ok(report) => Ok(SyncOutcome::Completed(report)),
            Err(Error::AuthRejected) => {
                warn!("server rejected credentials, purging remembered password");
                ctx.remembered_password = None;
                Err(Error::AuthRejected)
            }
            Err(e) => Err(e),
        }
    }

    /// Rotate the account password, re-encrypting everything.
    ///
    /// Shares the single-flight guard with [`sync`](Self::sync); on
    /// `AuthRejected` the remembered password is purged.
    pub async fn rotate_password(
        &self,
        ctx: &mut ClientContext,
        old_password: &Password,
        new_password: &Password,
    ) -> Result<()> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::InvalidInput(
                "cannot rotate password while a sync cycle is in flight".to_string(),
            ));
        }

        let result = rotate::rotate_password(
            self.transport.as_ref(),
            self.store.as_ref(),
            ctx,
            old_password,
            new_password,
        )
        .await;
        self.syncing.store(false, Ordering::SeqCst);

        if let Err(Error::AuthRejected) = &result {
            warn!("server rejected old password during rotation");
            ctx.remembered_password = None;
        }
        result
    }

    async fn run_cycle(
        &self,
        ctx: &mut ClientContext,
        password: &Password,
    ) -> Result<SyncReport> {
        let start = Instant::now();
        info!(profile = %ctx.profile, "starting sync cycle");

        let status = self.transport.status().await?;

        if !status.exists {
            return self.initial_upload(ctx, password, start).await;
        }

        // A device that has never synced adopts the account's salts
        // before deriving anything.
        if ctx.baseline.last_synced_at.is_none() {
            if let Some(encoded) = &status.encryption_salt {
                ctx.baseline.encryption_salt = Salt::from_base64(encoded)?;
            }
            if let Some(encoded) = &status.transport_salt {
                ctx.baseline.transport_salt = Some(Salt::from_base64(encoded)?);
            }
        }

        let key = derive_key(password.as_bytes(), &ctx.baseline.encryption_salt)?;
        let transport_salt = ctx.baseline.transport_salt.clone().ok_or_else(|| {
            Error::InvalidInput("no transport salt known for an existing account".to_string())
        })?;
        let transport_hash =
            hash_password_for_transport(password.as_bytes(), Some(transport_salt.clone()));

        let mut report = SyncReport::default();

        // --- Download half ---
        let fetch = self
            .transport
            .fetch(FetchRequest {
                transport_hash: transport_hash.hash.clone(),
                documents_hash: ctx.baseline.documents_hash.clone(),
                annotations_hash: ctx.baseline.annotations_hash.clone(),
                credentials_hash: ctx.baseline.credentials_hash.clone(),
            })
            .await?;

        let documents_hash = if fetch.documents_skipped {
            debug!("document download skipped, server matches baseline");
            compute_content_hash(&ctx.documents)?
        } else {
            let batch = decode_documents(fetch.documents, &key).await;
            let outcome = reconcile(
                std::mem::take(&mut ctx.documents),
                batch,
                &ctx.pending.modified_documents,
                &ctx.pending.deleted_documents,
            )?;
            report.documents_downloaded = outcome.downloaded;
            report.documents_removed = outcome.removed;
            report.decrypt_failures += outcome.decrypt_failures;
            ctx.documents = outcome.items;
            outcome.content_hash
        };

        let annotations_hash = if fetch.annotations_skipped {
            debug!("annotation download skipped, server matches baseline");
            compute_content_hash(&ctx.annotations)?
        } else {
            let batch = decode_annotations(fetch.annotations, &key).await;
            let outcome = reconcile(
                std::mem::take(&mut ctx.annotations),
                batch,
                &ctx.pending.modified_annotations,
                &ctx.pending.deleted_annotations,
            )?;
            report.annotations_downloaded = outcome.downloaded;
            report.annotations_removed = outcome.removed;
            report.decrypt_failures += outcome.decrypt_failures;
            ctx.annotations = outcome.items;
            outcome.content_hash
        };

        let credentials_hash_now = if fetch.credentials_skipped {
            credentials_hash(&ctx.credentials)
        } else {
            let outcome = reconcile_credentials(
                std::mem::take(&mut ctx.credentials),
                fetch.credentials.as_deref(),
                ctx.pending.credentials_modified,
                &key,
            );
            if outcome.decrypt_failed {
                report.decrypt_failures += 1;
            }
            ctx.credentials = outcome.credentials;
            outcome.content_hash
        };

        // --- Upload half ---
        let snapshot = ctx.pending.snapshot();
        if snapshot.has_pending_changes() {
            let documents = if snapshot.has_document_changes() {
                // Another device pushed changes this client had not yet
                // pulled when the cycle began; a selective push could
                // silently omit items, so send the whole collection.
                let full = status.documents_hash != ctx.baseline.documents_hash;
                if full {
                    debug!("server documents hash diverged from baseline, full upload");
                }
                let items =
                    encrypt_documents(&ctx.documents, &snapshot.modified_documents, full, &key)
                        .await?;
                report.documents_uploaded = items.len();
                report.tombstones_pushed += snapshot.deleted_documents.len();
                report.full_upload |= full;
                Some(DocumentPush {
                    items,
                    deleted: snapshot.deleted_documents.iter().cloned().collect(),
                    content_hash: documents_hash.clone(),
                    full,
                })
            } else {
                None
            };

            let annotations = if snapshot.has_annotation_changes() {
                let full = status.annotations_hash != ctx.baseline.annotations_hash;
                if full {
                    debug!("server annotations hash diverged from baseline, full upload");
                }
                let items = encrypt_annotations(
                    &ctx.annotations,
                    &snapshot.modified_annotations,
                    full,
                    &key,
                )
                .await?;
                report.annotations_uploaded = items.len();
                report.tombstones_pushed += snapshot.deleted_annotations.len();
                report.full_upload |= full;
                Some(AnnotationPush {
                    items,
                    deleted: snapshot.deleted_annotations.iter().cloned().collect(),
                    content_hash: annotations_hash.clone(),
                    full,
                })
            } else {
                None
            };

            let credentials = if snapshot.credentials_modified {
                report.credentials_pushed = true;
                Some(CredentialsPush {
                    envelope: seal_with_key(&ctx.credentials, &key)?,
                    content_hash: credentials_hash_now.clone(),
                })
            } else {
                None
            };

            let profile = if snapshot.profile_modified {
                report.profile_pushed = true;
                Some(seal_with_key(&ctx.profile_meta, &key)?)
            } else {
                None
            };

            self.transport
                .push(PushRequest {
                    transport_hash: transport_hash.hash.clone(),
                    documents,
                    annotations,
                    credentials,
                    profile,
                    transport_salt: None,
                    encryption_salt: None,
                })
                .await?;

            ctx.pending.absorb(&snapshot);
        } else {
            debug!("no pending changes, upload skipped");
        }

        ctx.baseline.transport_salt = Some(transport_salt);
        ctx.baseline.record_success(
            Some(documents_hash),
            Some(annotations_hash),
            Some(credentials_hash_now),
        );
        ctx.persist(self.store.as_ref()).await?;

        report.duration = start.elapsed();
        info!(
            downloaded = report.documents_downloaded + report.annotations_downloaded,
            uploaded = report.documents_uploaded + report.annotations_uploaded,
            removed = report.documents_removed + report.annotations_removed,
            failures = report.decrypt_failures,
            "sync cycle completed in {:?}",
            report.duration
        );
        Ok(report)
    }

    /// First contact: no remote account exists yet, so everything local
    /// is pushed as the initial server state.
    async fn initial_upload(
        &self,
        ctx: &mut ClientContext,
        password: &Password,
        start: Instant,
    ) -> Result<SyncReport> {
        info!(profile = %ctx.profile, "no remote account, performing initial upload");

        let key = derive_key(password.as_bytes(), &ctx.baseline.encryption_salt)?;
        let transport_salt = ctx
            .baseline
            .transport_salt
            .clone()
            .unwrap_or_else(Salt::generate);
        let transport_hash =
            hash_password_for_transport(password.as_bytes(), Some(transport_salt.clone()));

        let snapshot = ctx.pending.snapshot();
        let documents_hash = compute_content_hash(&ctx.documents)?;
        let annotations_hash = compute_content_hash(&ctx.annotations)?;
        let credentials_hash_now = credentials_hash(&ctx.credentials);

        let items = encrypt_documents(&ctx.documents, &BTreeSet::new(), true, &key).await?;
        let annotation_items =
            encrypt_annotations(&ctx.annotations, &BTreeSet::new(), true, &key).await?;

        let mut report = SyncReport {
            documents_uploaded: items.len(),
            annotations_uploaded: annotation_items.len(),
            full_upload: true,
            ..SyncReport::default()
        };

        let credentials = if ctx.credentials.is_empty() {
            None
        } else {
            report.credentials_pushed = true;
            Some(CredentialsPush {
                envelope: seal_with_key(&ctx.credentials, &key)?,
                content_hash: credentials_hash_now.clone(),
            })
        };

        let profile = if snapshot.profile_modified {
            report.profile_pushed = true;
            Some(seal_with_key(&ctx.profile_meta, &key)?)
        } else {
            None
        };

        self.transport
            .push(PushRequest {
                transport_hash: transport_hash.hash.clone(),
                documents: Some(DocumentPush {
                    items,
                    deleted: Vec::new(),
                    content_hash: documents_hash.clone(),
                    full: true,
                }),
                annotations: Some(AnnotationPush {
                    items: annotation_items,
                    deleted: Vec::new(),
                    content_hash: annotations_hash.clone(),
                    full: true,
                }),
                credentials,
                profile,
                transport_salt: Some(transport_salt.to_base64()),
                encryption_salt: Some(ctx.baseline.encryption_salt.to_base64()),
            })
            .await?;

        ctx.pending.absorb(&snapshot);
        ctx.baseline.transport_salt = Some(transport_salt);
        ctx.baseline.record_success(
            Some(documents_hash),
            Some(annotations_hash),
            Some(credentials_hash_now),
        );
        ctx.persist(self.store.as_ref()).await?;

        report.duration = start.elapsed();
        info!(
            uploaded = report.documents_uploaded + report.annotations_uploaded,
            "initial upload completed in {:?}",
            report.duration
        );
        Ok(report)
    }
}

/// Build the wire form of the documents to push: the modified subset, or
/// the whole collection on a full upload. Items are independent, so they
/// are encrypted via fan-out.
pub(crate) async fn encrypt_documents(
    documents: &[Document],
    modified: &BTreeSet<String>,
    full: bool,
    key: &DerivedKey,
) -> Result<Vec<WireDocument>> {
    let selected = documents
        .iter()
        .filter(|d| full || modified.contains(&d.ident()));

    join_all(selected.map(|document| async move {
        if document.is_public() {
            Ok(WireDocument {
                id: document.ident(),
                envelope: None,
                plain: Some(document.clone()),
            })
        } else {
            Ok(WireDocument {
                id: document.ident(),
                envelope: Some(seal_with_key(document, key)?),
                plain: None,
            })
        }
    }))
    .await
    .into_iter()
    .collect()
}

/// Build the wire form of the annotations to push.
pub(crate) async fn encrypt_annotations(
    annotations: &[Annotation],
    modified: &BTreeSet<String>,
    full: bool,
    key: &DerivedKey,
) -> Result<Vec<WireAnnotation>> {
    let selected = annotations
        .iter()
        .filter(|a| full || modified.contains(&a.ident()));

    join_all(selected.map(|annotation| async move {
        Ok(WireAnnotation {
            id: annotation.ident(),
            envelope: seal_with_key(annotation, key)?,
        })
    }))
    .await
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use inkvault_common::{Credentials, DocumentId, ProfileId, Visibility};
    use inkvault_store::MemoryStore;
    use inkvault_transport::MemoryTransport;

    fn password() -> Password {
        Password::new("correct horse battery staple")
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

    fn ctx(profile: &str) -> ClientContext {
        ClientContext::new(ProfileId::new(profile).unwrap())
    }

    fn session(
        transport: &Arc<MemoryTransport>,
    ) -> SyncSession<MemoryTransport, MemoryStore> {
        SyncSession::new(transport.clone(), Arc::new(MemoryStore::new()))
    }

    async fn complete(
        session: &SyncSession<MemoryTransport, MemoryStore>,
        ctx: &mut ClientContext,
    ) -> SyncReport {
        match session.sync(ctx, &password()).await.unwrap() {
            SyncOutcome::Completed(report) => report,
            SyncOutcome::AlreadyInFlight => panic!("unexpected in-flight skip"),
        }
    }

    #[tokio::test]
    async fn test_initial_upload_creates_account() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);
        let mut a = ctx("a");
        a.upsert_document(doc("d1", "hello"));

        let report = complete(&session, &mut a).await;

        assert!(report.full_upload);
        assert_eq!(report.documents_uploaded, 1);
        assert_eq!(transport.document_count(), 1);
        assert!(!a.pending.has_pending_changes());
        assert!(a.baseline.documents_hash.is_some());
        assert!(a.baseline.transport_salt.is_some());
    }

    #[tokio::test]
    async fn test_second_device_downloads_everything() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "hello"));
        a.upsert_document(doc("d2", "world"));
        complete(&session, &mut a).await;

        let mut b = ctx("b");
        let report = complete(&session, &mut b).await;

        assert_eq!(report.documents_downloaded, 2);
        assert_eq!(b.documents.len(), 2);
        // The second device adopted the account's salts.
        assert_eq!(b.baseline.encryption_salt, a.baseline.encryption_salt);
        assert_eq!(b.baseline.documents_hash, a.baseline.documents_hash);
    }

    #[tokio::test]
    async fn test_tombstone_propagates_to_other_device() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "doomed"));
        a.upsert_document(doc("d2", "survivor"));
        complete(&session, &mut a).await;

        let mut b = ctx("b");
        complete(&session, &mut b).await;
        assert_eq!(b.documents.len(), 2);

        // A deletes d1 before B syncs again.
        a.delete_document(&DocumentId::new("d1").unwrap());
        complete(&session, &mut a).await;

        // B never had d1 in its own pending set, yet it must disappear.
        let report = complete(&session, &mut b).await;
        assert_eq!(report.documents_removed, 1);
        assert_eq!(b.documents.len(), 1);
        assert_eq!(b.documents[0].id.as_str(), "d2");
    }

    #[tokio::test]
    async fn test_pending_edit_survives_and_wins() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "v1"));
        complete(&session, &mut a).await;

        let mut b = ctx("b");
        complete(&session, &mut b).await;

        // Concurrent edits: A syncs first, B edits without syncing.
        a.upsert_document(doc("d1", "from a"));
        complete(&session, &mut a).await;
        b.upsert_document(doc("d1", "from b"));

        // B's unsynced edit wins locally and is pushed.
        complete(&session, &mut b).await;
        assert_eq!(b.documents[0].body, "from b");

        // A has nothing pending, so it converges on B's version.
        complete(&session, &mut a).await;
        assert_eq!(a.documents[0].body, "from b");
    }

    #[tokio::test]
    async fn test_selective_upload_when_baseline_matches() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "one"));
        a.upsert_document(doc("d2", "two"));
        complete(&session, &mut a).await;

        a.upsert_document(doc("d1", "edited"));
        let report = complete(&session, &mut a).await;

        assert!(!report.full_upload);
        let pushes = transport.pushes();
        let last = pushes.last().unwrap().documents.as_ref().unwrap();
        assert!(!last.full);
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].id, "d1");
    }

    #[tokio::test]
    async fn test_full_upload_when_server_hash_diverged() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "one"));
        complete(&session, &mut a).await;

        let mut b = ctx("b");
        complete(&session, &mut b).await;

        // B pushes a new document, moving the server hash past A's baseline.
        b.upsert_document(doc("d2", "from b"));
        complete(&session, &mut b).await;

        // A edits with a stale baseline; the upload must not be selective.
        a.upsert_document(doc("d1", "edited on a"));
        let report = complete(&session, &mut a).await;

        assert!(report.full_upload);
        let pushes = transport.pushes();
        let last = pushes.last().unwrap().documents.as_ref().unwrap();
        assert!(last.full);
        // The full payload covers the merged collection, d2 included.
        assert_eq!(last.items.len(), 2);
    }

    #[tokio::test]
    async fn test_credentials_local_edit_wins_over_server() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        let mut creds_a = Credentials::default();
        creds_a
            .api_keys
            .insert("anthropic".to_string(), "sk-a1".to_string());
        a.set_credentials(creds_a);
        complete(&session, &mut a).await;

        let mut b = ctx("b");
        complete(&session, &mut b).await;

        // B rotates the provider key and pushes.
        let mut creds_b = b.credentials.clone();
        creds_b
            .api_keys
            .insert("anthropic".to_string(), "sk-b1".to_string());
        b.set_credentials(creds_b);
        complete(&session, &mut b).await;

        // A edits credentials and a document without having pulled B's.
        let mut creds_a2 = a.credentials.clone();
        creds_a2
            .api_keys
            .insert("anthropic".to_string(), "sk-a2".to_string());
        a.set_credentials(creds_a2);
        a.upsert_document(doc("d1", "unrelated"));
        let report = complete(&session, &mut a).await;

        // A's local credentials win and are re-pushed; the unrelated
        // document edit goes through in the same cycle.
        assert!(report.credentials_pushed);
        assert_eq!(a.credentials.api_keys["anthropic"], "sk-a2");
        assert_eq!(report.documents_uploaded, 1);

        // B converges on A's credentials.
        complete(&session, &mut b).await;
        assert_eq!(b.credentials.api_keys["anthropic"], "sk-a2");
    }

    #[tokio::test]
    async fn test_annotation_tombstone_roundtrip() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "body"));
        a.add_annotation(Annotation {
            document: DocumentId::new("d1").unwrap(),
            position: 2,
            created_at: Utc::now(),
        });
        complete(&session, &mut a).await;

        let mut b = ctx("b");
        complete(&session, &mut b).await;
        assert_eq!(b.annotations.len(), 1);

        assert!(b.remove_annotation("d1#2"));
        complete(&session, &mut b).await;

        let report = complete(&session, &mut a).await;
        assert_eq!(report.annotations_removed, 1);
        assert!(a.annotations.is_empty());
    }

    #[tokio::test]
    async fn test_public_documents_travel_in_plaintext() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        let mut public = doc("d1", "shared");
        public.visibility = Visibility::Public;
        a.upsert_document(public);
        complete(&session, &mut a).await;

        let pushes = transport.pushes();
        let pushed = &pushes.last().unwrap().documents.as_ref().unwrap().items[0];
        assert!(pushed.envelope.is_none());
        assert!(pushed.plain.is_some());

        let mut b = ctx("b");
        complete(&session, &mut b).await;
        assert_eq!(b.documents[0].body, "shared");
    }

    #[tokio::test]
    async fn test_auth_rejection_purges_remembered_password() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "x"));
        complete(&session, &mut a).await;

        let mut intruder = ctx("b");
        intruder.remembered_password = Some(password());
        intruder.upsert_document(doc("d9", "y"));

        let result = session
            .sync(&mut intruder, &Password::new("wrong password"))
            .await;

        assert!(matches!(result, Err(Error::AuthRejected)));
        assert!(intruder.remembered_password.is_none());
        // Nothing was partially cleared.
        assert!(intruder.pending.modified_documents.contains("d9"));
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_and_leaves_pending() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "x"));
        complete(&session, &mut a).await;

        a.upsert_document(doc("d2", "y"));
        transport.inject_rate_limit(42);

        let result = session.sync(&mut a, &password()).await;
        assert!(matches!(
            result,
            Err(Error::RateLimited { retry_after_secs: 42 })
        ));
        assert!(a.pending.modified_documents.contains("d2"));

        // The next trigger retries from scratch and succeeds.
        complete(&session, &mut a).await;
        assert!(!a.pending.has_pending_changes());
        assert_eq!(transport.document_count(), 2);
    }

    #[tokio::test]
    async fn test_outage_aborts_cycle_without_losing_state() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "x"));
        transport.inject_outage();

        let result = session.sync(&mut a, &password()).await;
        assert!(matches!(result, Err(Error::TransportUnavailable(_))));
        assert!(a.pending.modified_documents.contains("d1"));
        assert!(a.baseline.last_synced_at.is_none());

        complete(&session, &mut a).await;
        assert_eq!(transport.document_count(), 1);
    }

    #[tokio::test]
    async fn test_no_changes_skips_upload() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "x"));
        complete(&session, &mut a).await;
        let pushes_before = transport.pushes().len();

        let report = complete(&session, &mut a).await;
        assert_eq!(report.documents_downloaded, 0);
        assert_eq!(report.documents_uploaded, 0);
        // No push request went out at all.
        assert_eq!(transport.pushes().len(), pushes_before);
    }

    #[tokio::test]
    async fn test_undecryptable_record_is_skipped_not_fatal() {
        let transport = Arc::new(MemoryTransport::new());
        let session = session(&transport);

        let mut a = ctx("a");
        a.upsert_document(doc("d1", "fine"));
        a.upsert_document(doc("d2", "will be corrupted"));
        complete(&session, &mut a).await;

        transport.tamper_document("d2", "garbage envelope");

        let mut b = ctx("b");
        let report = complete(&session, &mut b).await;

        assert_eq!(report.decrypt_failures, 1);
        assert_eq!(b.documents.len(), 1);
        assert_eq!(b.documents[0].id.as_str(), "d1");
    }

    #[tokio::test]
    async fn test_concurrent_sync_no_ops() {
        use inkvault_transport::{
            FetchRequest, FetchResponse, PushRequest, RemoteStatus, RotateRequest,
        };

        struct StallingTransport {
            inner: MemoryTransport,
            gate: tokio::sync::Notify,
        }

        #[async_trait::async_trait]
        impl SyncTransport for StallingTransport {
            async fn status(&self) -> Result<RemoteStatus> {
                self.gate.notified().await;
                self.inner.status().await
            }
            async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
                self.inner.fetch(request).await
            }
            async fn push(&self, request: PushRequest) -> Result<()> {
                self.inner.push(request).await
            }
            async fn rotate_password(&self, request: RotateRequest) -> Result<()> {
                self.inner.rotate_password(request).await
            }
        }

        let transport = Arc::new(StallingTransport {
            inner: MemoryTransport::new(),
            gate: tokio::sync::Notify::new(),
        });
        let session: Arc<SyncSession<StallingTransport, MemoryStore>> = Arc::new(
            SyncSession::new(transport.clone(), Arc::new(MemoryStore::new())),
        );

        let first = {
            let session = session.clone();
            tokio::spawn(async move {
                let mut a = ctx("a");
                a.upsert_document(doc("d1", "x"));
                session.sync(&mut a, &password()).await
            })
        };

        // Let the first cycle start and park on the gate.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let mut b = ctx("b");
        let second = session.sync(&mut b, &password()).await.unwrap();
        assert!(matches!(second, SyncOutcome::AlreadyInFlight));

        transport.gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, SyncOutcome::Completed(_)));

        // The guard is released; syncing works again.
        transport.gate.notify_one();
        let mut c = ctx("c");
        let third = session.sync(&mut c, &password()).await.unwrap();
        assert!(matches!(third, SyncOutcome::Completed(_)));
    }
}
