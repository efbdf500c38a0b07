//! Store abstraction the synchronizer writes through.
//!
//! Everything above this module is store-agnostic: components receive a
//! [`StateStore`] handle at construction and never reach for a global.
//! The seam has three pieces:
//!
//! - [`StateStore`] opens [`WriteTransaction`]s and registers
//!   [`TreeChangeListener`]s over subtrees
//! - [`CommitSignal`] is the blocking completion handle a submitted
//!   transaction resolves through
//! - [`ListenerRegistration`] owns an active subscription; closing it
//!   (or dropping it) deregisters
//!
//! [`MemStore`](mem::MemStore) is the in-process reference
//! implementation; production embeddings provide their own.

pub mod mem;

use std::sync::Arc;
use std::sync::mpsc;

use crate::error::{CommitError, SubscribeError};
use crate::tree::{DatastoreKind, NodeValue, TreeChange, TreePath};

/// Result type for commit outcomes.
pub type CommitOutcome = std::result::Result<(), CommitError>;

/// A transactional tree store holding the config and operational
/// datastores.
pub trait StateStore: Send + Sync {
    type Txn: WriteTransaction;

    /// Open an empty write transaction. Building it stages no state;
    /// nothing is visible until [`WriteTransaction::submit`] resolves.
    fn write_transaction(&self) -> Self::Txn;

    /// Subscribe `listener` to committed changes under `subtree` within
    /// `datastore`.
    ///
    /// The current content of the subtree (if any) is delivered as an
    /// initial change batch. Notifications run on threads owned by the
    /// store; listeners must not block them.
    fn register_change_listener(
        &self,
        datastore: DatastoreKind,
        subtree: TreePath,
        listener: Arc<dyn TreeChangeListener>,
    ) -> Result<ListenerRegistration, SubscribeError>;
}

/// A batch of staged tree mutations applied atomically on submit.
///
/// Staging methods never fail; validation happens at commit, and a
/// rejected transaction applies none of its operations.
pub trait WriteTransaction: Send + 'static {
    /// Stage a create-or-replace of the node at `path`. Replaces the
    /// entire subtree below `path` with `value`.
    fn put(
        &mut self,
        datastore: DatastoreKind,
        path: TreePath,
        value: NodeValue,
        create_parents: bool,
    );

    /// Stage a recursive union of `value` into the node at `path`.
    /// Container children merge; conflicting leaves take the staged value;
    /// siblings not named in `value` survive.
    fn merge(
        &mut self,
        datastore: DatastoreKind,
        path: TreePath,
        value: NodeValue,
        create_parents: bool,
    );

    /// Stage removal of the node at `path` and its entire subtree.
    /// Deleting an absent node is a no-op, not an error.
    fn delete(&mut self, datastore: DatastoreKind, path: TreePath);

    /// Hand the batch to the store. Returns immediately; the returned
    /// signal resolves once the store has applied or rejected the batch.
    fn submit(self) -> CommitSignal;
}

/// Receiver of committed change batches for one registered subtree.
pub trait TreeChangeListener: Send + Sync {
    /// Called once per committed transaction that touched the registered
    /// subtree, with the overlapping changes in application order.
    fn on_tree_changed(&self, changes: Vec<TreeChange>);
}

// ---------------------------------------------------------------------------
// Commit completion
// ---------------------------------------------------------------------------

/// Blocking handle to one submitted transaction's outcome.
pub struct CommitSignal {
    outcome: mpsc::Receiver<CommitOutcome>,
}

impl CommitSignal {
    /// A deferred signal plus the [`CommitComplete`] the store resolves
    /// it through.
    pub fn deferred() -> (CommitComplete, CommitSignal) {
        let (tx, rx) = mpsc::channel();
        (CommitComplete { tx }, CommitSignal { outcome: rx })
    }

    /// A signal that is already resolved, for stores that accept or
    /// reject at submit time.
    pub fn ready(outcome: CommitOutcome) -> CommitSignal {
        let (complete, signal) = CommitSignal::deferred();
        complete.resolve(outcome);
        signal
    }

    /// Block until the store has applied or rejected the transaction.
    ///
    /// If the store shuts down with the commit still in flight, this
    /// resolves to [`CommitError::StoreShutdown`].
    pub fn wait(self) -> CommitOutcome {
        match self.outcome.recv() {
            Ok(outcome) => outcome,
            Err(mpsc::RecvError) => Err(CommitError::StoreShutdown),
        }
    }
}

/// Store-side resolver for a [`CommitSignal`].
///
/// Dropping it unresolved makes the paired signal report
/// [`CommitError::StoreShutdown`].
pub struct CommitComplete {
    tx: mpsc::Sender<CommitOutcome>,
}

impl CommitComplete {
    /// Resolve the paired signal. The waiter may already be gone; that
    /// is not an error.
    pub fn resolve(self, outcome: CommitOutcome) {
        let _ = self.tx.send(outcome);
    }
}

// ---------------------------------------------------------------------------
// Listener registration
// ---------------------------------------------------------------------------

/// Owner handle for an active change subscription.
///
/// `close` deregisters the listener; further calls are no-ops, and drop
/// closes automatically.
pub struct ListenerRegistration {
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    /// Wrap the store-specific deregistration action.
    pub fn new(unregister: impl FnOnce() + Send + 'static) -> Self {
        ListenerRegistration {
            unregister: Some(Box::new(unregister)),
        }
    }

    /// Deregister the listener. Idempotent.
    pub fn close(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.unregister.is_some())
            .finish()
    }
}
