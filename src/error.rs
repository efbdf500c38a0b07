//! Rich diagnostic error types for the opstate synchronizer.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so embedders know exactly
//! what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the opstate crate.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the embedder.
#[derive(Debug, Error, Diagnostic)]
pub enum OpstateError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Subscribe(#[from] SubscribeError),
}

// ---------------------------------------------------------------------------
// Commit errors
// ---------------------------------------------------------------------------

/// Failures of a store commit, observed through a [`crate::store::CommitSignal`]
/// or when handing a transaction to the [`crate::commit::CommitPipeline`].
#[derive(Debug, Error, Diagnostic)]
pub enum CommitError {
    #[error("transaction rejected by the store: {message}")]
    #[diagnostic(
        code(opstate::commit::rejected),
        help(
            "The store refused to apply the transaction, usually because a write \
             targeted a missing parent node without requesting parent creation. \
             No operation from the transaction was applied."
        )
    )]
    Rejected { message: String },

    #[error("store shut down before the commit completed")]
    #[diagnostic(
        code(opstate::commit::store_shutdown),
        help(
            "The backing store was dropped while this transaction was in flight. \
             Keep the store alive until every submitted commit has resolved, or \
             treat this as a normal teardown signal."
        )
    )]
    StoreShutdown,

    #[error("commit pipeline is shut down; transaction dropped")]
    #[diagnostic(
        code(opstate::commit::pipeline_shutdown),
        help(
            "The pipeline worker has already been joined. Submit transactions \
             only while the owning updater is alive."
        )
    )]
    PipelineShutdown,
}

// ---------------------------------------------------------------------------
// Execution errors
// ---------------------------------------------------------------------------

/// Failures of the single-worker task queues that back the commit pipeline
/// and subtree watches.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecError {
    #[error("task queue '{name}' is shut down")]
    #[diagnostic(
        code(opstate::exec::queue_shutdown),
        help(
            "The queue's worker thread has exited and no further tasks can run. \
             Queues shut down when dropped; check component lifetimes."
        )
    )]
    QueueShutdown { name: String },

    #[error("failed to spawn worker thread '{name}'")]
    #[diagnostic(
        code(opstate::exec::spawn),
        help("The OS refused to create a thread. Check process limits (RLIMIT_NPROC, memory).")
    )]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Subscription errors
// ---------------------------------------------------------------------------

/// Failures registering a change listener with a store.
#[derive(Debug, Error, Diagnostic)]
pub enum SubscribeError {
    #[error("store shut down; cannot register change listener")]
    #[diagnostic(
        code(opstate::subscribe::store_shutdown),
        help("Register listeners only while the store is alive.")
    )]
    StoreShutdown,
}

/// Convenience alias for functions returning opstate results.
pub type OpstateResult<T> = std::result::Result<T, OpstateError>;
