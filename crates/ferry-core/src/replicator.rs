//! Single-attempt replication of one object.

use std::io;

use ferry_digest::DigestAccumulator;
use ferry_store::{DestinationStore, SourceStore, StoreError};
use ferry_types::{ContentDigest, CorrelationId, ObjectLocation, TransferOutcome};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, warn, Instrument};

use crate::config::ReplicatorConfig;
use crate::error::{ReplicationError, ReplicationResult, StoreRole};
use crate::spool::SpooledBuffer;
use crate::verify::{IntegrityCheck, IntegrityVerifier, SkipDecision, SourceDigest};

/// Tracing span carrying the correlation id for one replication.
pub(crate) fn replication_span(
    correlation_id: &CorrelationId,
    location: &ObjectLocation,
) -> tracing::Span {
    tracing::info_span!(
        "replicate",
        correlation_id = %correlation_id,
        bucket = %location.bucket,
        key = %location.key,
    )
}

/// Copies objects from `source` into `destination` under the same key.
///
/// Each call is one attempt with no retry; wrap in
/// [`RetryingReplicator`](crate::RetryingReplicator) for transient-failure
/// handling.
#[derive(Debug)]
pub struct Replicator<S, D> {
    source: S,
    destination: D,
    config: ReplicatorConfig,
}

impl<S: SourceStore, D: DestinationStore> Replicator<S, D> {
    /// Create a replicator, rejecting an invalid configuration.
    pub fn new(source: S, destination: D, config: ReplicatorConfig) -> ReplicationResult<Self> {
        config.validate()?;
        Ok(Self {
            source,
            destination,
            config,
        })
    }

    pub fn config(&self) -> &ReplicatorConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Replicate one object in a single attempt under a fresh correlation id.
    pub async fn replicate(&self, location: &ObjectLocation) -> ReplicationResult<TransferOutcome> {
        let correlation_id = CorrelationId::new();
        let span = replication_span(&correlation_id, location);
        self.replicate_attempt(location).instrument(span).await
    }

    /// One full pass: existence, idempotence, transfer, verification.
    ///
    /// Safe to repeat. On return the destination either holds content
    /// matching the source or holds nothing written by this call. Callers
    /// supply the correlation id through the enclosing span.
    pub async fn replicate_attempt(
        &self,
        location: &ObjectLocation,
    ) -> ReplicationResult<TransferOutcome> {
        if let Err(e) = location.validate() {
            error!(error = %e, "invalid object location");
            return Err(ReplicationError::Configuration(e.to_string()));
        }
        let bucket = location.bucket.as_str();
        let key = location.key.as_str();
        info!(
            source = self.source.name(),
            destination = self.destination.name(),
            "starting replication of {location}"
        );

        // Existence and digest determination.
        let source_meta = self
            .source
            .head_object(bucket, key)
            .await
            .map_err(|e| self.source_error(location, e))?
            .ok_or_else(|| {
                error!("source object not found");
                ReplicationError::SourceNotFound {
                    location: location.to_string(),
                }
            })?;
        let source_digest = SourceDigest::from_declared(source_meta.digest.as_ref());
        match &source_digest {
            SourceDigest::Comparable(d) => debug!(digest = %d, "source digest"),
            SourceDigest::Composite { etag, parts } => warn!(
                etag = %etag,
                parts,
                "composite source digest; falling back to existence check"
            ),
            SourceDigest::Undeclared => {
                warn!("source declared no digest; content cannot be matched")
            }
        }

        // Idempotence.
        let dest_meta = self
            .destination
            .stat_object(key)
            .await
            .map_err(|e| self.destination_error(key, e))?;
        match IntegrityVerifier::skip_decision(&source_digest, dest_meta.as_ref()) {
            SkipDecision::SkipMatching(digest) => {
                info!(digest = %digest, "destination already up to date; skipping");
                return Ok(TransferOutcome::Skipped {
                    key: key.to_string(),
                    digest: Some(digest),
                });
            }
            SkipDecision::SkipTrustingExistence => {
                info!("destination exists and source digest is composite; skipping");
                return Ok(TransferOutcome::Skipped {
                    key: key.to_string(),
                    digest: None,
                });
            }
            SkipDecision::TransferMissing => debug!("destination object missing"),
            SkipDecision::TransferDiffering => info!("destination content differs; overwriting"),
        }

        // Transfer.
        let (mut stream, stream_meta) = self
            .source
            .get_object_stream(bucket, key)
            .await
            .map_err(|e| self.source_error(location, e))?;
        let content_type = source_meta
            .content_type
            .or(stream_meta.content_type)
            .unwrap_or_else(|| self.config.default_content_type.clone());

        let mut spool = SpooledBuffer::new(self.config.spool_threshold);
        let mut accumulator = DigestAccumulator::new();
        let mut chunk = vec![0u8; self.config.chunk_size];
        loop {
            let n = read_chunk(&mut stream, &mut chunk)
                .await
                .map_err(|e| self.source_error(location, StoreError::Io(e)))?;
            if n == 0 {
                break;
            }
            accumulator.update(&chunk[..n]);
            spool.write_chunk(&chunk[..n]).await.map_err(spool_error)?;
        }
        drop(stream);
        spool.rewind().await.map_err(spool_error)?;
        let bytes = spool.len();
        debug!(bytes, spilled = spool.is_spilled(), "source content spooled");

        if let Err(e) = self
            .destination
            .put_object(key, &mut spool, bytes, &content_type)
            .await
        {
            error!(error = %e, "upload failed");
            return Err(ReplicationError::UploadFailed {
                key: key.to_string(),
                source: e,
            });
        }
        drop(spool);
        info!(bytes, content_type = %content_type, "uploaded to destination");

        // Verification.
        let computed = accumulator.finalize();
        if source_digest.is_composite() {
            debug!("composite source digest; verification skipped");
        } else {
            self.verify(key, &source_digest, &computed).await?;
        }

        info!(bytes, digest = %computed, "replication complete");
        Ok(TransferOutcome::Replicated {
            key: key.to_string(),
            bytes,
            digest: computed,
        })
    }

    async fn verify(
        &self,
        key: &str,
        source_digest: &SourceDigest,
        computed: &ContentDigest,
    ) -> ReplicationResult<()> {
        if let IntegrityCheck::Mismatch { expected, actual } =
            IntegrityVerifier::check_source(source_digest, computed)
        {
            return Err(self.discard_corrupt(key, expected, actual).await);
        }
        if !self.config.verify_destination {
            return Ok(());
        }

        let stored = self
            .destination
            .stat_object(key)
            .await
            .map_err(|e| self.destination_error(key, e))?;
        match IntegrityVerifier::check_destination(computed, stored.as_ref()) {
            IntegrityCheck::Verified => {
                debug!("destination digest verified");
                Ok(())
            }
            IntegrityCheck::Bypassed => {
                debug!("destination reports no plain digest; verification skipped");
                Ok(())
            }
            IntegrityCheck::Mismatch { expected, actual } => {
                Err(self.discard_corrupt(key, expected, actual).await)
            }
            IntegrityCheck::Missing => {
                error!("object missing from destination after upload");
                Err(ReplicationError::UploadFailed {
                    key: key.to_string(),
                    source: StoreError::Rejected("object missing after upload".to_string()),
                })
            }
        }
    }

    /// Delete the destination object after a checksum mismatch and build the
    /// error to report.
    async fn discard_corrupt(
        &self,
        key: &str,
        expected: ContentDigest,
        actual: ContentDigest,
    ) -> ReplicationError {
        error!(
            expected = %expected,
            actual = %actual,
            "checksum mismatch; deleting corrupt destination object"
        );
        match self.destination.delete_object(key).await {
            Ok(true) => info!("corrupt destination object deleted"),
            Ok(false) => warn!("corrupt destination object already gone"),
            Err(e) => error!(error = %e, "failed to delete corrupt destination object"),
        }
        ReplicationError::IntegrityMismatch {
            key: key.to_string(),
            expected,
            actual,
        }
    }

    fn source_error(&self, location: &ObjectLocation, err: StoreError) -> ReplicationError {
        let err = ReplicationError::from_store(StoreRole::Source, &location.to_string(), err);
        match &err {
            ReplicationError::SourceNotFound { .. } => error!("source object not found"),
            ReplicationError::TransientInfra { .. } => {
                warn!(store = self.source.name(), error = %err, "source store unavailable")
            }
            _ => error!(store = self.source.name(), error = %err, "source store failed"),
        }
        err
    }

    fn destination_error(&self, key: &str, err: StoreError) -> ReplicationError {
        let err = ReplicationError::from_store(StoreRole::Destination, key, err);
        let store = self.destination.name();
        if let ReplicationError::TransientInfra { .. } = err {
            warn!(store, error = %err, "destination lookup unavailable");
        } else {
            error!(store, error = %err, "destination lookup failed");
        }
        err
    }
}

fn spool_error(err: io::Error) -> ReplicationError {
    error!(error = %err, "spool buffer failed");
    ReplicationError::Spool(err)
}

/// Fill `buf` from `reader`, short only at end of stream.
async fn read_chunk<R: AsyncRead + Unpin + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
