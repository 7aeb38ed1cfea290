//! Sync transport trait definition.

use async_trait::async_trait;

use crate::wire::{FetchRequest, FetchResponse, PushRequest, RemoteStatus, RotateRequest};
use inkvault_common::Result;

/// Transport to the remote store.
///
/// Implementations handle their own connection management. Every method
/// maps server failures onto the common error taxonomy:
/// `AuthRejected` for a rejected transport hash, `RateLimited` with the
/// server-provided delay, and `TransportUnavailable` for network
/// failures.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Query account existence, stored content hashes, and salts.
    ///
    /// Unauthenticated: a fresh device calls this first to learn the
    /// salts it needs to derive anything.
    async fn status(&self) -> Result<RemoteStatus>;

    /// Download the encrypted collections.
    ///
    /// Collections whose server-side hash matches the hash in the
    /// request are skipped and flagged, never resent.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;

    /// Upload pending changes.
    ///
    /// On the first contact this creates the account, registering the
    /// transport hash and the salts carried in the request.
    async fn push(&self, request: PushRequest) -> Result<()>;

    /// Atomically replace the account's credentials and every stored
    /// envelope with a re-encrypted bundle.
    async fn rotate_password(&self, request: RotateRequest) -> Result<()>;
}
