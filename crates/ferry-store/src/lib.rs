//! Object store capability interfaces for ferry.
//!
//! The replicator never talks to a concrete storage service. It consumes two
//! capabilities defined here:
//!
//! - [`SourceStore`] -- read-only access addressed by bucket and key
//! - [`DestinationStore`] -- read/write access to one fixed bucket
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- local directory tree, one subdirectory per bucket
//!
//! Adapters for remote services live outside this crate; they normalize their
//! native digest encodings through `ferry-digest` and classify their errors
//! into [`StoreError`] so the retry layer can tell transient failures from
//! genuine absence.
//!
//! # Design Rules
//!
//! 1. Absence is `Ok(None)` on metadata lookups, never an error.
//! 2. Uploads take a seekable body; stores may read it more than once.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult, TransientKind};
pub use fs::{FsDestination, FsObjectStore, NativeDigest};
pub use memory::{InMemoryDestination, InMemoryObjectStore};
pub use traits::{DestinationStore, ObjectStream, SourceStore, UploadBody};
