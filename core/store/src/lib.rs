//! Persistent store abstraction for InkVault.
//!
//! This crate provides the boundary to the on-device durable store: a
//! trait-based async key-value interface plus two implementations, an
//! in-memory store for testing and a local filesystem store.
//!
//! # Design Principles
//! - Store isolation: no sync or crypto logic in store implementations
//! - Async operations: all I/O operations are async
//! - Opaque values: each persisted value is an independently loadable
//!   serialized blob

pub mod file;
pub mod memory;
pub mod store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{keys, load_json, save_json, StateStore};
