//! Wire types exchanged with the server.
//!
//! All binary material (IVs, ciphertexts, hashes, salts) crosses this
//! boundary as base64 text. The envelope format is
//! `base64(12-byte IV ‖ ciphertext ‖ 16-byte tag)`.

use serde::{Deserialize, Serialize};

use inkvault_common::Document;

/// Server-side account summary returned by the status endpoint.
///
/// The status endpoint is unauthenticated: it is how a fresh device
/// learns the salts it needs before it can compute anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStatus {
    /// Whether an account exists for this store.
    pub exists: bool,
    /// Content hash the server holds for the document collection.
    pub documents_hash: Option<String>,
    /// Content hash the server holds for the annotation collection.
    pub annotations_hash: Option<String>,
    /// Content hash the server holds for the credentials blob.
    pub credentials_hash: Option<String>,
    /// Encryption salt (base64) shared across the account's devices.
    pub encryption_salt: Option<String>,
    /// Transport-hash salt (base64) shared across the account's devices.
    pub transport_salt: Option<String>,
}

/// One document on the wire.
///
/// Exactly one of `envelope` and `plain` is set: private documents
/// travel as envelopes, public ones as plaintext JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain: Option<Document>,
}

/// One annotation on the wire, always an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAnnotation {
    pub id: String,
    pub envelope: String,
}

/// Request to the content endpoint.
///
/// Each collection hash is the client's last known baseline; the server
/// skips collections whose stored hash matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub transport_hash: String,
    pub documents_hash: Option<String>,
    pub annotations_hash: Option<String>,
    pub credentials_hash: Option<String>,
}

/// Response from the content endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub documents: Vec<WireDocument>,
    pub documents_skipped: bool,
    #[serde(default)]
    pub annotations: Vec<WireAnnotation>,
    pub annotations_skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
    pub credentials_skipped: bool,
}

/// Document portion of an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPush {
    /// Modified items (selective) or the whole collection (full).
    pub items: Vec<WireDocument>,
    /// Tombstones: ids deleted locally since the last push.
    pub deleted: Vec<String>,
    /// Freshly computed plaintext content hash of the full collection.
    pub content_hash: String,
    /// When true the server replaces the collection with `items`.
    pub full: bool,
}

/// Annotation portion of an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationPush {
    pub items: Vec<WireAnnotation>,
    pub deleted: Vec<String>,
    pub content_hash: String,
    pub full: bool,
}

/// Credentials portion of an upload: one envelope, one hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsPush {
    pub envelope: String,
    pub content_hash: String,
}

/// Request to the sync/upload endpoint.
///
/// A collection field left as `None` means the client has nothing
/// pending for it and the server leaves it untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub transport_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<DocumentPush>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<AnnotationPush>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialsPush>,
    /// Encrypted profile metadata, included only when flagged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Salts registered on first contact (base64); ignored afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_salt: Option<String>,
}

/// Request to the password-rotation endpoint.
///
/// Carries the fully re-encrypted bundle; the server applies it
/// atomically after verifying `old_transport_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotateRequest {
    pub old_transport_hash: String,
    pub new_transport_hash: String,
    /// Fresh transport salt (base64).
    pub new_transport_salt: String,
    /// Fresh encryption salt (base64).
    pub new_encryption_salt: String,
    pub documents: Vec<WireDocument>,
    pub documents_hash: String,
    pub annotations: Vec<WireAnnotation>,
    pub annotations_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialsPush>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}
