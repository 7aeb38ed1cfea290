//! Domain model: documents, annotations, credentials, profile metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{DocumentId, Identified};

/// Visibility of a document on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Stored server-side as an encrypted envelope only.
    #[default]
    Private,
    /// Stored server-side as plaintext JSON; never encrypted on the wire.
    Public,
}

/// Numeric metrics recorded when a document was generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
    /// Generation cost in USD.
    pub cost_usd: f64,
    /// Generation wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// A generated artifact (e.g. a diff or report) owned by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Client-generated identifier.
    pub id: DocumentId,
    /// Plaintext body.
    pub body: String,
    /// Generation timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether the server may hold this document in plaintext.
    #[serde(default)]
    pub visibility: Visibility,
    /// Optional generation metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<GenerationMetrics>,
}

impl Document {
    /// Check whether this document travels as plaintext.
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

impl Identified for Document {
    fn ident(&self) -> String {
        self.id.as_str().to_string()
    }
}

/// A user-made bookmark against a position inside a document.
///
/// Identity is the `(document, position)` pair, never a random id, so
/// re-creating an annotation at the same position always yields the same
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// The annotated document.
    pub document: DocumentId,
    /// Position index inside the document.
    pub position: u32,
    /// When the annotation was made.
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    /// The identity string for a `(document, position)` pair.
    pub fn ident_for(document: &DocumentId, position: u32) -> String {
        format!("{}#{}", document, position)
    }
}

impl Identified for Annotation {
    fn ident(&self) -> String {
        Self::ident_for(&self.document, self.position)
    }
}

/// Provider credentials and routing selections.
///
/// A single logical record: always encrypted and decrypted as one unit,
/// never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Provider name to secret key.
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,
    /// Pipeline stage to selected provider, `None` when unset.
    #[serde(default)]
    pub selections: BTreeMap<String, Option<String>>,
}

impl Credentials {
    /// Check whether the record holds nothing worth syncing.
    pub fn is_empty(&self) -> bool {
        self.api_keys.is_empty() && self.selections.values().all(|s| s.is_none())
    }
}

/// Small profile record pushed as one envelope when flagged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileMeta {
    /// Display name shown on other devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Free-form per-profile settings.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}
