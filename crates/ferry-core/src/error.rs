use std::fmt;
use std::io;

use ferry_store::StoreError;
use ferry_types::ContentDigest;
use thiserror::Error;

use crate::config::ConfigError;

/// Which side of the replication a store error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreRole {
    Source,
    Destination,
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReplicationError {
    /// The source object does not exist.
    #[error("source object not found: {location}")]
    SourceNotFound { location: String },

    /// Connectivity, throttling, or 5xx-class failure from either store.
    #[error("transient {role} failure: {source}")]
    TransientInfra { role: StoreRole, source: StoreError },

    /// Non-transient store failure outside the upload (access denied,
    /// undecodable digest, unaddressable key).
    #[error("{role} store error: {source}")]
    StoreFailure { role: StoreRole, source: StoreError },

    /// The destination refused the upload.
    #[error("upload of {key} failed: {source}")]
    UploadFailed { key: String, source: StoreError },

    /// Content digest disagreed after upload; the destination object was deleted.
    #[error("integrity mismatch for {key}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        key: String,
        expected: ContentDigest,
        actual: ContentDigest,
    },

    /// Invalid inputs or settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every attempt failed with a transient error.
    #[error("replication failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ReplicationError>,
    },

    #[error("replication cancelled")]
    Cancelled,

    /// Local temporary storage for the spooled buffer failed.
    #[error("spool buffer error: {0}")]
    Spool(#[source] io::Error),
}

impl ReplicationError {
    /// Wrap a store error from a non-upload operation, keeping absence,
    /// transient failures, and hard failures apart.
    pub(crate) fn from_store(role: StoreRole, location: &str, err: StoreError) -> Self {
        if role == StoreRole::Source && err.is_not_found() {
            Self::SourceNotFound {
                location: location.to_string(),
            }
        } else if err.is_transient() {
            Self::TransientInfra { role, source: err }
        } else {
            Self::StoreFailure { role, source: err }
        }
    }
}

impl From<ConfigError> for ReplicationError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

pub type ReplicationResult<T> = Result<T, ReplicationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_store::TransientKind;

    #[test]
    fn source_absence_is_not_found() {
        let err = ReplicationError::from_store(
            StoreRole::Source,
            "s3://b/k",
            StoreError::not_found("b", "k"),
        );
        assert!(matches!(err, ReplicationError::SourceNotFound { .. }));
        assert_eq!(err.to_string(), "source object not found: s3://b/k");
    }

    #[test]
    fn transient_store_errors_kept_apart() {
        let err = ReplicationError::from_store(
            StoreRole::Destination,
            "k",
            StoreError::transient(TransientKind::Throttled, "slow down"),
        );
        assert!(matches!(
            err,
            ReplicationError::TransientInfra { role: StoreRole::Destination, .. }
        ));
    }

    #[test]
    fn hard_store_errors_are_store_failures() {
        let err = ReplicationError::from_store(
            StoreRole::Source,
            "k",
            StoreError::Rejected("access denied".into()),
        );
        assert!(matches!(err, ReplicationError::StoreFailure { role: StoreRole::Source, .. }));
    }

    #[test]
    fn exhausted_display_includes_last_error() {
        let err = ReplicationError::RetriesExhausted {
            attempts: 3,
            last: Box::new(ReplicationError::Cancelled),
        };
        assert_eq!(
            err.to_string(),
            "replication failed after 3 attempts: replication cancelled"
        );
    }
}
