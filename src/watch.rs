//! Reactive subtree subscriptions.
//!
//! [`SubtreeWatch`] is the base shape for components that react to
//! committed state instead of being called directly: it registers a
//! change listener over one subtree and forwards every batch onto a
//! caller-supplied [`TaskQueue`], where the typed [`SubtreeHandler`]
//! runs. Store notification threads are never blocked by handler work,
//! and handlers sharing a queue are serialized against each other.
//!
//! Opening the watch subscribes immediately; the store delivers current
//! subtree content as the first batch. `close` (or drop) deregisters;
//! batches already sitting in the queue still run.

use std::sync::Arc;

use crate::error::SubscribeError;
use crate::exec::TaskQueue;
use crate::store::{ListenerRegistration, StateStore, TreeChangeListener};
use crate::tree::{DatastoreKind, TreeChange, TreePath};

/// Typed consumer of one watched subtree's change batches.
///
/// Runs on the watch's task queue, so blocking here only delays peers on
/// the same queue, never the store.
pub trait SubtreeHandler: Send + Sync + 'static {
    fn on_subtree_changed(&self, changes: Vec<TreeChange>);
}

/// An active subscription bridging a store subtree to a handler queue.
pub struct SubtreeWatch {
    datastore: DatastoreKind,
    subtree: TreePath,
    queue: Arc<TaskQueue>,
    registration: Option<ListenerRegistration>,
}

impl SubtreeWatch {
    /// Register `handler` for changes under `subtree` within `datastore`.
    pub fn open<S, H>(
        store: &S,
        datastore: DatastoreKind,
        subtree: TreePath,
        queue: Arc<TaskQueue>,
        handler: Arc<H>,
    ) -> Result<Self, SubscribeError>
    where
        S: StateStore,
        H: SubtreeHandler,
    {
        let bridge = Arc::new(QueueBridge {
            queue: Arc::clone(&queue),
            handler,
        });
        let registration = store.register_change_listener(datastore, subtree.clone(), bridge)?;
        tracing::debug!(
            datastore = %datastore,
            subtree = %subtree,
            queue = queue.name(),
            "subtree watch opened"
        );

        Ok(Self {
            datastore,
            subtree,
            queue,
            registration: Some(registration),
        })
    }

    /// The queue handler work runs on, for composing further watches.
    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn subtree(&self) -> &TreePath {
        &self.subtree
    }

    pub fn datastore(&self) -> DatastoreKind {
        self.datastore
    }

    /// Deregister from the store. Idempotent; drop closes too.
    pub fn close(&mut self) {
        if let Some(mut registration) = self.registration.take() {
            registration.close();
            tracing::debug!(subtree = %self.subtree, "subtree watch closed");
        }
    }
}

impl Drop for SubtreeWatch {
    fn drop(&mut self) {
        self.close();
    }
}

/// Store-facing listener that hops each batch onto the handler queue.
struct QueueBridge<H> {
    queue: Arc<TaskQueue>,
    handler: Arc<H>,
}

impl<H: SubtreeHandler> TreeChangeListener for QueueBridge<H> {
    fn on_tree_changed(&self, changes: Vec<TreeChange>) {
        let handler = Arc::clone(&self.handler);
        if let Err(e) = self.queue.execute(move || handler.on_subtree_changed(changes)) {
            tracing::warn!(error = %e, "dropping change batch; handler queue is shut down");
        }
    }
}
