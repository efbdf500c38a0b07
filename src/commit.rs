//! Asynchronous commit pipeline.
//!
//! Path event handlers build transactions on the caller's thread but must
//! not pay store latency there. [`CommitPipeline`] takes ownership of a
//! built transaction, queues it, and returns immediately; a single worker
//! submits each transaction and blocks on its [`CommitSignal`] before
//! touching the next one. That gives two guarantees:
//!
//! - Transactions reach the store strictly in submission order, and each
//!   is fully resolved before the next is submitted.
//! - A failed commit is logged and swallowed. Derived state may lag until
//!   the next path event, but the pipeline never dies.

use crate::error::{CommitError, ExecError};
use crate::exec::TaskQueue;
use crate::store::{CommitSignal, WriteTransaction};

/// Serialized, fire-and-forget commit front for a store.
pub struct CommitPipeline {
    queue: TaskQueue,
}

impl CommitPipeline {
    /// Spawn the pipeline worker. `queue_name` names its thread.
    pub fn new(queue_name: &str) -> Result<Self, ExecError> {
        Ok(Self {
            queue: TaskQueue::single_worker(queue_name)?,
        })
    }

    /// Queue `txn` for commit and return without waiting.
    ///
    /// The outcome is observed only by the pipeline worker; failures
    /// surface in the log, never to the caller. An `Err` here means the
    /// pipeline itself is already shut down and the transaction was
    /// dropped unapplied.
    pub fn submit<T: WriteTransaction>(&self, txn: T) -> Result<(), CommitError> {
        self.queue
            .execute(move || {
                let signal: CommitSignal = txn.submit();
                match signal.wait() {
                    Ok(()) => tracing::debug!("transaction committed"),
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "async commit failed; derived state lags until the next path event"
                        );
                    }
                }
            })
            .map_err(|_| CommitError::PipelineShutdown)
    }

    /// Block until every transaction submitted before this call has
    /// fully resolved. Drain point for shutdown sequencing and tests.
    pub fn flush(&self) -> Result<(), CommitError> {
        self.queue.flush().map_err(|_| CommitError::PipelineShutdown)
    }
}
