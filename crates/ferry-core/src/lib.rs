//! Replication engine for ferry.
//!
//! Copies one object from a [`SourceStore`](ferry_store::SourceStore) to a
//! fixed [`DestinationStore`](ferry_store::DestinationStore) in four phases:
//!
//! 1. Existence check on the source and digest determination.
//! 2. Idempotence check on the destination (skip when equivalent content is
//!    already there).
//! 3. Streamed download into a [`SpooledBuffer`] while hashing, then upload.
//! 4. Integrity verification, deleting the destination object on mismatch.
//!
//! [`RetryingReplicator`] re-runs the whole sequence on transient store
//! failures under a [`RetryPolicy`]. Re-running is safe: the idempotence
//! check is re-evaluated on every attempt, so a retry after a partial upload
//! either skips or overwrites.

pub mod cancel;
pub mod config;
pub mod error;
pub mod replicator;
pub mod retry;
pub mod retrying;
pub mod spool;
pub mod verify;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use config::{
    ConfigError, ReplicatorConfig, RetryConfig, DEFAULT_CHUNK_SIZE, DEFAULT_INITIAL_BACKOFF_MS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_MS, DEFAULT_SPOOL_THRESHOLD,
};
pub use error::{ReplicationError, ReplicationResult, StoreRole};
pub use replicator::Replicator;
pub use retry::{classify, ErrorClass, RetryError, RetryPolicy};
pub use retrying::RetryingReplicator;
pub use spool::SpooledBuffer;
pub use verify::{IntegrityCheck, IntegrityVerifier, SkipDecision, SourceDigest};

// Re-export the data model so callers need only this crate.
pub use ferry_types::{ContentDigest, CorrelationId, ObjectLocation, TransferOutcome};
