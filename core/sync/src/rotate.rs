//! Password rotation: re-encrypt everything under a fresh salt and swap
//! credentials atomically.
//!
//! Local state is only mutated after the server acknowledges the
//! re-encrypted bundle. A failure at any earlier step leaves the old
//! password, salts, and baseline fully usable, so the client can never
//! lock itself out by retrying.

use std::collections::BTreeSet;
use tracing::info;

use inkvault_common::{Error, Password, Result};
use inkvault_crypto::{
    compute_content_hash, derive_key, hash_password_for_transport, seal_with_key, Salt,
};
use inkvault_store::StateStore;
use inkvault_transport::{CredentialsPush, FetchRequest, RotateRequest, SyncTransport};

use crate::context::ClientContext;
use crate::credentials::credentials_hash;
use crate::session::{encrypt_annotations, encrypt_documents};

/// Rotate the account password.
///
/// Verifies the old password against the server by recomputing its
/// transport hash from the *stored* transport salt (a locally cached
/// hash is never trusted as proof), then generates a brand-new
/// encryption salt, re-encrypts every document, annotation, the
/// credentials blob, and the profile metadata, and submits the bundle
/// with a fresh transport hash in one atomic request.
pub async fn rotate_password<T, S>(
    transport: &T,
    store: &S,
    ctx: &mut ClientContext,
    old_password: &Password,
    new_password: &Password,
) -> Result<()>
where
    T: SyncTransport + ?Sized,
    S: StateStore + ?Sized,
{
    let old_transport_salt = ctx.baseline.transport_salt.clone().ok_or_else(|| {
        Error::InvalidInput("cannot rotate password before the first sync".to_string())
    })?;
    let old_transport_hash =
        hash_password_for_transport(old_password.as_bytes(), Some(old_transport_salt));

    // Verify the old password server-side before any re-encryption work:
    // a fetch that matches the server's own hashes is a cheap
    // authenticated no-op.
    let status = transport.status().await?;
    transport
        .fetch(FetchRequest {
            transport_hash: old_transport_hash.hash.clone(),
            documents_hash: status.documents_hash,
            annotations_hash: status.annotations_hash,
            credentials_hash: status.credentials_hash,
        })
        .await?;

    let new_encryption_salt = Salt::generate();
    let new_key = derive_key(new_password.as_bytes(), &new_encryption_salt)?;
    let new_transport_hash = hash_password_for_transport(new_password.as_bytes(), None);

    let documents =
        encrypt_documents(&ctx.documents, &BTreeSet::new(), true, &new_key).await?;
    let annotations =
        encrypt_annotations(&ctx.annotations, &BTreeSet::new(), true, &new_key).await?;
    let documents_hash = compute_content_hash(&ctx.documents)?;
    let annotations_hash = compute_content_hash(&ctx.annotations)?;
    let credentials_hash_now = credentials_hash(&ctx.credentials);

    transport
        .rotate_password(RotateRequest {
            old_transport_hash: old_transport_hash.hash,
            new_transport_hash: new_transport_hash.hash,
            new_transport_salt: new_transport_hash.salt.to_base64(),
            new_encryption_salt: new_encryption_salt.to_base64(),
            documents,
            documents_hash: documents_hash.clone(),
            annotations,
            annotations_hash: annotations_hash.clone(),
            credentials: Some(CredentialsPush {
                envelope: seal_with_key(&ctx.credentials, &new_key)?,
                content_hash: credentials_hash_now.clone(),
            }),
            profile: Some(seal_with_key(&ctx.profile_meta, &new_key)?),
        })
        .await?;

    // Only after server acknowledgment: swap salts, baseline, and the
    // remembered password.
    ctx.baseline.encryption_salt = new_encryption_salt;
    ctx.baseline.transport_salt = Some(new_transport_hash.salt);
    ctx.baseline.record_success(
        Some(documents_hash),
        Some(annotations_hash),
        Some(credentials_hash_now),
    );
    ctx.remembered_password = Some(new_password.clone());
    ctx.persist(store).await?;

    info!(profile = %ctx.profile, "password rotation completed");
    Ok(())
}
