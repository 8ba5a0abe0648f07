use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;

/// Successful result of one replication invocation.
///
/// Failures are reported through the replicator's error type instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// The destination already held equivalent content; nothing was moved.
    Skipped {
        key: String,
        /// Plain source digest, when one was declared.
        digest: Option<ContentDigest>,
    },
    /// The object was copied to the destination.
    Replicated {
        key: String,
        bytes: u64,
        digest: ContentDigest,
    },
}

impl TransferOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Skipped { key, .. } | Self::Replicated { key, .. } => key,
        }
    }

    /// Bytes moved to the destination (zero when skipped).
    pub fn bytes_transferred(&self) -> u64 {
        match self {
            Self::Skipped { .. } => 0,
            Self::Replicated { bytes, .. } => *bytes,
        }
    }
}
