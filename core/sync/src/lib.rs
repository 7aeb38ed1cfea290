//! InkVault Sync Engine
//!
//! This crate provides the local-first encrypted synchronization engine:
//! - Tombstone-based pending-change tracking
//! - Download-then-upload reconciliation that preserves unsynced edits
//! - Selective vs. full upload based on content-hash baselines
//! - Credentials blob reconciliation with legacy shape fallback
//! - Password rotation with atomic re-encryption
//! - Debounced auto-sync scheduling

pub mod baseline;
pub mod context;
pub mod credentials;
pub mod merge;
pub mod pending;
pub mod rotate;
pub mod scheduler;
pub mod session;

// Re-export main types
pub use baseline::SyncBaseline;
pub use context::ClientContext;
pub use credentials::{credentials_hash, decode_credentials, CredentialsShape};
pub use merge::{reconcile, DecodedBatch, MergeOutcome};
pub use pending::PendingChanges;
pub use scheduler::{AutoSync, AutoSyncHandle};
pub use session::{SyncConfig, SyncOutcome, SyncReport, SyncSession};
