//! Foundation types for ferry.
//!
//! This crate provides the data model shared by every other ferry crate:
//! where an object lives, what a store reports about it, how its content
//! digest is expressed, and what a replication produced.
//!
//! # Key Types
//!
//! - [`ObjectLocation`] -- store + bucket + key identifying one object
//! - [`ObjectMetadata`] -- length, content type, and declared digest of an object
//! - [`ContentDigest`] -- algorithm-tagged whole-object digest bytes
//! - [`DeclaredDigest`] -- a store-reported digest, plain or composite
//! - [`CorrelationId`] -- per-invocation token grouping log events
//! - [`TransferOutcome`] -- `Skipped` or `Replicated`

pub mod correlation;
pub mod digest;
pub mod error;
pub mod location;
pub mod metadata;
pub mod outcome;

pub use correlation::CorrelationId;
pub use digest::{ContentDigest, DeclaredDigest, DigestAlgorithm};
pub use error::TypeError;
pub use location::{validate_key, ObjectLocation};
pub use metadata::{ObjectMetadata, DEFAULT_CONTENT_TYPE};
pub use outcome::TransferOutcome;
