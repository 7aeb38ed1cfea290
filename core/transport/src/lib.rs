//! Transport boundary for InkVault.
//!
//! This crate defines the wire format and the trait through which the
//! sync engine talks to a remote server, plus an in-memory server
//! emulation for engine tests. The server only ever sees envelopes,
//! salts, identifiers, and content-hash commitments; plaintext crosses
//! this boundary only for documents explicitly marked public.

pub mod memory;
pub mod transport;
pub mod wire;

pub use memory::MemoryTransport;
pub use transport::SyncTransport;
pub use wire::{
    AnnotationPush, CredentialsPush, DocumentPush, FetchRequest, FetchResponse, PushRequest,
    RemoteStatus, RotateRequest, WireAnnotation, WireDocument,
};
