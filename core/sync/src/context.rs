//! Client context: the explicit state a sync cycle operates on.
//!
//! All reconciliation and session calls take this value instead of
//! reading an ambient "current profile" pointer. Every mutation helper
//! updates the pending tracker immediately, never silently.

use inkvault_common::{
    Annotation, Credentials, Document, DocumentId, Identified, Password, ProfileMeta, ProfileId,
    Result,
};
use inkvault_store::{keys, load_json, save_json, StateStore};

use crate::baseline::SyncBaseline;
use crate::pending::PendingChanges;

/// Loaded state of one profile on this device.
#[derive(Debug)]
pub struct ClientContext {
    /// The active profile.
    pub profile: ProfileId,
    /// Local document collection.
    pub documents: Vec<Document>,
    /// Local annotation collection.
    pub annotations: Vec<Annotation>,
    /// Local credentials blob.
    pub credentials: Credentials,
    /// Local profile metadata.
    pub profile_meta: ProfileMeta,
    /// What must still be pushed.
    pub pending: PendingChanges,
    /// What the server is believed to hold.
    pub baseline: SyncBaseline,
    /// Password cached for auto-sync. Purged when the server rejects it.
    pub remembered_password: Option<Password>,
}

impl ClientContext {
    /// Create an empty context for a profile that has never synced.
    pub fn new(profile: ProfileId) -> Self {
        Self {
            profile,
            documents: Vec::new(),
            annotations: Vec::new(),
            credentials: Credentials::default(),
            profile_meta: ProfileMeta::default(),
            pending: PendingChanges::new(),
            baseline: SyncBaseline::new(),
            remembered_password: None,
        }
    }

    fn key(&self, base: &str) -> String {
        format!("{}:{}", self.profile, base)
    }

    /// Load a profile's state from the persistent store, falling back to
    /// empty defaults for anything not yet saved.
    pub async fn load<S>(profile: ProfileId, store: &S) -> Result<Self>
    where
        S: StateStore + ?Sized,
    {
        let mut ctx = Self::new(profile);
        if let Some(documents) = load_json(store, &ctx.key(keys::DOCUMENTS)).await? {
            ctx.documents = documents;
        }
        if let Some(annotations) = load_json(store, &ctx.key(keys::ANNOTATIONS)).await? {
            ctx.annotations = annotations;
        }
        if let Some(credentials) = load_json(store, &ctx.key(keys::CREDENTIALS)).await? {
            ctx.credentials = credentials;
        }
        if let Some(profile_meta) = load_json(store, &ctx.key(keys::PROFILE)).await? {
            ctx.profile_meta = profile_meta;
        }
        if let Some(pending) = load_json(store, &ctx.key(keys::PENDING)).await? {
            ctx.pending = pending;
        }
        if let Some(baseline) = load_json(store, &ctx.key(keys::BASELINE)).await? {
            ctx.baseline = baseline;
        }
        Ok(ctx)
    }

    /// Persist the profile's state. The remembered password is never
    /// written to the store.
    pub async fn persist<S>(&self, store: &S) -> Result<()>
    where
        S: StateStore + ?Sized,
    {
        save_json(store, &self.key(keys::DOCUMENTS), &self.documents).await?;
        save_json(store, &self.key(keys::ANNOTATIONS), &self.annotations).await?;
        save_json(store, &self.key(keys::CREDENTIALS), &self.credentials).await?;
        save_json(store, &self.key(keys::PROFILE), &self.profile_meta).await?;
        save_json(store, &self.key(keys::PENDING), &self.pending).await?;
        save_json(store, &self.key(keys::BASELINE), &self.baseline).await?;
        Ok(())
    }

    /// Insert or replace a document and mark it pending.
    pub fn upsert_document(&mut self, document: Document) {
        self.pending.mark_document_modified(&document.id);
        if let Some(existing) = self.documents.iter_mut().find(|d| d.id == document.id) {
            *existing = document;
        } else {
            self.documents.push(document);
        }
    }

    /// Delete a document, leaving a tombstone in the pending tracker.
    ///
    /// Returns whether the document was present.
    pub fn delete_document(&mut self, id: &DocumentId) -> bool {
        let before = self.documents.len();
        self.documents.retain(|d| d.id != *id);
        let removed = self.documents.len() < before;
        if removed {
            self.pending.mark_document_deleted(id);
        }
        removed
    }

    /// Add an annotation and mark it pending. Re-adding at the same
    /// position is a no-op for the collection but still marks pending.
    pub fn add_annotation(&mut self, annotation: Annotation) {
        let ident = annotation.ident();
        self.pending.mark_annotation_modified(&ident);
        if !self.annotations.iter().any(|a| a.ident() == ident) {
            self.annotations.push(annotation);
        }
    }

    /// Remove an annotation by identity, leaving a tombstone.
    ///
    /// Returns whether the annotation was present.
    pub fn remove_annotation(&mut self, ident: &str) -> bool {
        let before = self.annotations.len();
        self.annotations.retain(|a| a.ident() != ident);
        let removed = self.annotations.len() < before;
        if removed {
            self.pending.mark_annotation_deleted(ident);
        }
        removed
    }

    /// Replace the credentials blob and flag it for upload.
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
        self.pending.mark_credentials_modified();
    }

    /// Replace the profile metadata and flag it for upload.
    pub fn set_profile_meta(&mut self, profile_meta: ProfileMeta) {
        self.profile_meta = profile_meta;
        self.pending.mark_profile_modified();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use inkvault_store::MemoryStore;

    fn doc(id: &str) -> Document {
        Document {
            id: DocumentId::new(id).unwrap(),
            body: format!("body of {}", id),
            created_at: Utc::now(),
            visibility: Default::default(),
            metrics: None,
        }
    }

    fn ctx() -> ClientContext {
        ClientContext::new(ProfileId::new("inbox").unwrap())
    }

    #[test]
    fn test_upsert_marks_pending() {
        let mut ctx = ctx();
        ctx.upsert_document(doc("d1"));

        assert_eq!(ctx.documents.len(), 1);
        assert!(ctx.pending.modified_documents.contains("d1"));
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let mut ctx = ctx();
        ctx.upsert_document(doc("d1"));

        let mut edited = doc("d1");
        edited.body = "edited".to_string();
        ctx.upsert_document(edited);

        assert_eq!(ctx.documents.len(), 1);
        assert_eq!(ctx.documents[0].body, "edited");
    }

    #[test]
    fn test_delete_leaves_tombstone() {
        let mut ctx = ctx();
        ctx.upsert_document(doc("d1"));

        assert!(ctx.delete_document(&DocumentId::new("d1").unwrap()));
        assert!(ctx.documents.is_empty());
        assert!(ctx.pending.deleted_documents.contains("d1"));
        assert!(!ctx.pending.modified_documents.contains("d1"));

        // Deleting something absent is a no-op.
        assert!(!ctx.delete_document(&DocumentId::new("d2").unwrap()));
        assert!(!ctx.pending.deleted_documents.contains("d2"));
    }

    #[test]
    fn test_annotation_identity_prevents_duplicates() {
        let mut ctx = ctx();
        let document = DocumentId::new("d1").unwrap();

        ctx.add_annotation(Annotation {
            document: document.clone(),
            position: 2,
            created_at: Utc::now(),
        });
        ctx.add_annotation(Annotation {
            document,
            position: 2,
            created_at: Utc::now(),
        });

        assert_eq!(ctx.annotations.len(), 1);
        assert!(ctx.pending.modified_annotations.contains("d1#2"));
    }

    #[test]
    fn test_credentials_and_profile_flags() {
        let mut ctx = ctx();
        ctx.set_credentials(Credentials::default());
        ctx.set_profile_meta(ProfileMeta::default());

        assert!(ctx.pending.credentials_modified);
        assert!(ctx.pending.profile_modified);
    }

    #[tokio::test]
    async fn test_load_persist_roundtrip() {
        let store = MemoryStore::new();
        let profile = ProfileId::new("inbox").unwrap();

        let mut ctx = ClientContext::new(profile.clone());
        ctx.upsert_document(doc("d1"));
        ctx.add_annotation(Annotation {
            document: DocumentId::new("d1").unwrap(),
            position: 0,
            created_at: Utc::now(),
        });
        ctx.persist(&store).await.unwrap();

        let loaded = ClientContext::load(profile, &store).await.unwrap();
        assert_eq!(loaded.documents, ctx.documents);
        assert_eq!(loaded.annotations, ctx.annotations);
        assert_eq!(loaded.pending, ctx.pending);
        assert_eq!(loaded.baseline, ctx.baseline);
        assert!(loaded.remembered_password.is_none());
    }

    #[tokio::test]
    async fn test_profiles_are_isolated() {
        let store = MemoryStore::new();

        let mut inbox = ClientContext::new(ProfileId::new("inbox").unwrap());
        inbox.upsert_document(doc("d1"));
        inbox.persist(&store).await.unwrap();

        let work = ClientContext::load(ProfileId::new("work").unwrap(), &store)
            .await
            .unwrap();
        assert!(work.documents.is_empty());
    }
}
