//! Pending-change tracking: what must still be pushed.
//!
//! The tracker is the single source of truth for unsynced local edits.
//! It is persisted between sync runs and shrunk only by a successful
//! upload of exactly the items it named at the time the upload began.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use inkvault_common::DocumentId;

/// Per-collection sets of modified and deleted identifiers, plus the two
/// single-record flags.
///
/// Invariant: an identifier appears in at most one of {modified, deleted}
/// per entity type; marking one side always removes it from the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChanges {
    #[serde(default)]
    pub modified_documents: BTreeSet<String>,
    #[serde(default)]
    pub deleted_documents: BTreeSet<String>,
    #[serde(default)]
    pub modified_annotations: BTreeSet<String>,
    #[serde(default)]
    pub deleted_annotations: BTreeSet<String>,
    #[serde(default)]
    pub profile_modified: bool,
    #[serde(default)]
    pub credentials_modified: bool,
}

impl PendingChanges {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document create or edit.
    pub fn mark_document_modified(&mut self, id: &DocumentId) {
        self.deleted_documents.remove(id.as_str());
        self.modified_documents.insert(id.as_str().to_string());
    }

    /// Record a document deletion (tombstone).
    pub fn mark_document_deleted(&mut self, id: &DocumentId) {
        self.modified_documents.remove(id.as_str());
        self.deleted_documents.insert(id.as_str().to_string());
    }

    /// Record an annotation create or edit by identity.
    pub fn mark_annotation_modified(&mut self, ident: &str) {
        self.deleted_annotations.remove(ident);
        self.modified_annotations.insert(ident.to_string());
    }

    /// Record an annotation deletion (tombstone) by identity.
    pub fn mark_annotation_deleted(&mut self, ident: &str) {
        self.modified_annotations.remove(ident);
        self.deleted_annotations.insert(ident.to_string());
    }

    /// Flag the profile metadata for upload.
    pub fn mark_profile_modified(&mut self) {
        self.profile_modified = true;
    }

    /// Flag the credentials blob for upload.
    pub fn mark_credentials_modified(&mut self) {
        self.credentials_modified = true;
    }

    /// Whether anything at all must still be pushed.
    pub fn has_pending_changes(&self) -> bool {
        !self.modified_documents.is_empty()
            || !self.deleted_documents.is_empty()
            || !self.modified_annotations.is_empty()
            || !self.deleted_annotations.is_empty()
            || self.profile_modified
            || self.credentials_modified
    }

    /// Whether the document collection has pending changes.
    pub fn has_document_changes(&self) -> bool {
        !self.modified_documents.is_empty() || !self.deleted_documents.is_empty()
    }

    /// Whether the annotation collection has pending changes.
    pub fn has_annotation_changes(&self) -> bool {
        !self.modified_annotations.is_empty() || !self.deleted_annotations.is_empty()
    }

    /// Snapshot the tracker for an upload about to begin.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Clear exactly the entries a successful upload pushed.
    ///
    /// Entries marked after the snapshot was taken remain queued for the
    /// next cycle.
    pub fn absorb(&mut self, pushed: &PendingChanges) {
        for id in &pushed.modified_documents {
            self.modified_documents.remove(id);
        }
        for id in &pushed.deleted_documents {
            self.deleted_documents.remove(id);
        }
        for id in &pushed.modified_annotations {
            self.modified_annotations.remove(id);
        }
        for id in &pushed.deleted_annotations {
            self.deleted_annotations.remove(id);
        }
        if pushed.profile_modified {
            self.profile_modified = false;
        }
        if pushed.credentials_modified {
            self.credentials_modified = false;
        }
    }
}
