use ferry_store::{DestinationStore, SourceStore};
use ferry_types::{CorrelationId, ObjectLocation, TransferOutcome};
use tracing::{error, warn, Instrument};

use crate::cancel::CancelSignal;
use crate::error::{ReplicationError, ReplicationResult};
use crate::replicator::{replication_span, Replicator};
use crate::retry::{classify, RetryError, RetryPolicy};

/// A [`Replicator`] that re-runs whole attempts on transient failures.
///
/// All attempts of one call share a correlation id.
#[derive(Debug)]
pub struct RetryingReplicator<S, D> {
    replicator: Replicator<S, D>,
    policy: RetryPolicy,
}

impl<S: SourceStore, D: DestinationStore> RetryingReplicator<S, D> {
    /// Wrap with the retry settings from the replicator's own config.
    pub fn new(replicator: Replicator<S, D>) -> Self {
        let policy = RetryPolicy::new(replicator.config().retry.clone());
        Self { replicator, policy }
    }

    pub fn with_policy(replicator: Replicator<S, D>, policy: RetryPolicy) -> Self {
        Self { replicator, policy }
    }

    pub fn replicator(&self) -> &Replicator<S, D> {
        &self.replicator
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn replicate(&self, location: &ObjectLocation) -> ReplicationResult<TransferOutcome> {
        self.replicate_with_cancel(location, &CancelSignal::never())
            .await
    }

    /// Replicate, aborting the in-flight attempt or backoff wait when
    /// `cancel` fires.
    pub async fn replicate_with_cancel(
        &self,
        location: &ObjectLocation,
        cancel: &CancelSignal,
    ) -> ReplicationResult<TransferOutcome> {
        let correlation_id = CorrelationId::new();
        let span = replication_span(&correlation_id, location);
        self.run(location, cancel).instrument(span).await
    }

    async fn run(
        &self,
        location: &ObjectLocation,
        cancel: &CancelSignal,
    ) -> ReplicationResult<TransferOutcome> {
        let result = self
            .policy
            .run(
                move |_| self.replicator.replicate_attempt(location),
                classify,
                cancel,
            )
            .await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(RetryError::Permanent { attempts, error }) => {
                error!(attempts, error = %error, "replication failed");
                Err(error)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                error!(attempts, error = %last, "retries exhausted");
                Err(ReplicationError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                })
            }
            Err(RetryError::Cancelled { attempts }) => {
                warn!(attempts, "replication cancelled");
                Err(ReplicationError::Cancelled)
            }
        }
    }
}
