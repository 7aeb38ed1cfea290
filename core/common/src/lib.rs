//! Common utilities and types shared across InkVault crates.
//!
//! This crate provides the error taxonomy, identifier types, and the
//! domain model (documents, annotations, credentials) used by every
//! other crate in the workspace.

pub mod error;
pub mod model;
pub mod types;

pub use error::{Error, Result};
pub use model::{
    Annotation, Credentials, Document, GenerationMetrics, ProfileMeta, Visibility,
};
pub use types::{DocumentId, Identified, Password, ProfileId};
