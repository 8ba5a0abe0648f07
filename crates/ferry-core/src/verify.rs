//! Digest comparison rules for the idempotence and integrity checks.
//!
//! Pure decisions over metadata; the replicator performs the I/O and acts on
//! the result.

use ferry_types::{ContentDigest, DeclaredDigest, ObjectMetadata};

/// What the source says about its own content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceDigest {
    /// A plain MD5 that can be compared against computed and stored digests.
    Comparable(ContentDigest),
    /// A multipart ETag. Content cannot be verified; existence is trusted.
    Composite { etag: String, parts: u32 },
    /// The source declared nothing.
    Undeclared,
}

impl SourceDigest {
    pub fn from_declared(declared: Option<&DeclaredDigest>) -> Self {
        match declared {
            Some(DeclaredDigest::Plain(d)) => Self::Comparable(d.clone()),
            Some(DeclaredDigest::Composite { etag, parts }) => Self::Composite {
                etag: etag.clone(),
                parts: *parts,
            },
            None => Self::Undeclared,
        }
    }

    pub fn comparable(&self) -> Option<&ContentDigest> {
        match self {
            Self::Comparable(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite { .. })
    }
}

/// Outcome of the idempotence check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipDecision {
    /// Destination already holds the same digest.
    SkipMatching(ContentDigest),
    /// Destination exists and the source digest is composite.
    SkipTrustingExistence,
    /// Nothing at the destination.
    TransferMissing,
    /// Destination exists with different or unknown content.
    TransferDiffering,
}

impl SkipDecision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::SkipMatching(_) | Self::SkipTrustingExistence)
    }
}

/// Result of comparing a computed digest against a reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrityCheck {
    Verified,
    /// No comparison possible; accepted as-is.
    Bypassed,
    Mismatch {
        expected: ContentDigest,
        actual: ContentDigest,
    },
    /// The destination no longer reports the object.
    Missing,
}

/// Stateless digest comparisons.
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Decide whether the destination already holds the source content.
    pub fn skip_decision(
        source: &SourceDigest,
        destination: Option<&ObjectMetadata>,
    ) -> SkipDecision {
        let Some(destination) = destination else {
            return SkipDecision::TransferMissing;
        };
        match source {
            SourceDigest::Composite { .. } => SkipDecision::SkipTrustingExistence,
            SourceDigest::Comparable(expected) => {
                let stored = destination.digest.as_ref().and_then(DeclaredDigest::as_plain);
                if stored == Some(expected) {
                    SkipDecision::SkipMatching(expected.clone())
                } else {
                    SkipDecision::TransferDiffering
                }
            }
            SourceDigest::Undeclared => SkipDecision::TransferDiffering,
        }
    }

    /// Compare the digest computed over the streamed bytes with what the
    /// source declared.
    pub fn check_source(source: &SourceDigest, computed: &ContentDigest) -> IntegrityCheck {
        match source {
            SourceDigest::Comparable(expected) if expected == computed => IntegrityCheck::Verified,
            SourceDigest::Comparable(expected) => IntegrityCheck::Mismatch {
                expected: expected.clone(),
                actual: computed.clone(),
            },
            SourceDigest::Composite { .. } | SourceDigest::Undeclared => IntegrityCheck::Bypassed,
        }
    }

    /// Compare the computed digest with what the destination reports after
    /// upload.
    pub fn check_destination(
        computed: &ContentDigest,
        destination: Option<&ObjectMetadata>,
    ) -> IntegrityCheck {
        let Some(destination) = destination else {
            return IntegrityCheck::Missing;
        };
        match destination.digest.as_ref().and_then(DeclaredDigest::as_plain) {
            Some(stored) if stored == computed => IntegrityCheck::Verified,
            Some(stored) => IntegrityCheck::Mismatch {
                expected: computed.clone(),
                actual: stored.clone(),
            },
            None => IntegrityCheck::Bypassed,
        }
    }
}
