//! Path event handling: the top-level entry point of the synchronizer.
//!
//! The path computation layer owns path lifecycle; this module owns the
//! consequences. [`DeviceStateUpdater`] turns each create/delete event
//! into exactly one transaction (staged by the
//! [`indexer`](crate::indexer) passes) and hands it to an owned
//! [`CommitPipeline`], so event handlers return at channel-send speed
//! regardless of store latency.

use std::sync::Arc;

use crate::chain::{PathGraph, RenderedPath};
use crate::commit::CommitPipeline;
use crate::error::{CommitError, ExecError};
use crate::indexer;
use crate::store::StateStore;

/// Configuration for a [`DeviceStateUpdater`].
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Name of the commit pipeline's worker thread.
    pub queue_name: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            queue_name: "opstate-commit".into(),
        }
    }
}

/// Receiver of path lifecycle events.
///
/// Called once per event by the path computation layer. Implementations
/// must not block on the store; the work happens after the handler
/// returns.
pub trait PathStateHandler: Send + Sync {
    fn on_path_created(&self, graph: &PathGraph, path: &RenderedPath);
    fn on_path_deleted(&self, path: &RenderedPath);
}

/// The production [`PathStateHandler`]: keeps the device index and hop
/// annotations of an injected store in sync with path events.
pub struct DeviceStateUpdater<S: StateStore> {
    store: Arc<S>,
    pipeline: CommitPipeline,
}

impl<S: StateStore> DeviceStateUpdater<S> {
    pub fn new(store: Arc<S>, config: UpdaterConfig) -> Result<Self, ExecError> {
        tracing::info!(queue = %config.queue_name, "starting device state updater");
        Ok(Self {
            store,
            pipeline: CommitPipeline::new(&config.queue_name)?,
        })
    }

    /// Block until every event handled before this call has fully
    /// committed or failed. Drain point for shutdown sequencing and
    /// tests.
    pub fn flush(&self) -> Result<(), CommitError> {
        self.pipeline.flush()
    }
}

impl<S: StateStore> PathStateHandler for DeviceStateUpdater<S> {
    fn on_path_created(&self, graph: &PathGraph, path: &RenderedPath) {
        let mut txn = self.store.write_transaction();
        indexer::path_created(graph, path, &mut txn);
        if let Err(e) = self.pipeline.submit(txn) {
            tracing::error!(error = %e, path = %path.name(), "dropping create projection");
        }
    }

    fn on_path_deleted(&self, path: &RenderedPath) {
        let mut txn = self.store.write_transaction();
        indexer::path_deleted(path, &mut txn);
        if let Err(e) = self.pipeline.submit(txn) {
            tracing::error!(error = %e, path = %path.name(), "dropping delete projection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainNode, DeviceId, GraphEntry, PathHop, PathName, SffName};
    use crate::store::mem::MemStore;
    use crate::tree::{DatastoreKind, TreePath};

    fn fixture() -> (PathGraph, RenderedPath) {
        let graph: PathGraph = [
            GraphEntry::new(ChainNode::Ingress, ChainNode::sff("sff-1"))
                .with_device(DeviceId::new(1)),
            GraphEntry::new(ChainNode::sff("sff-1"), ChainNode::Egress),
        ]
        .into_iter()
        .collect();
        let path = RenderedPath::new(
            PathName::new("path-1"),
            vec![PathHop::new(SffName::new("sff-1")).with_device(DeviceId::new(1))],
        );
        (graph, path)
    }

    #[test]
    fn create_event_populates_index_and_annotations() {
        let store = Arc::new(MemStore::new().unwrap());
        let updater =
            DeviceStateUpdater::new(Arc::clone(&store), UpdaterConfig::default()).unwrap();
        let (graph, path) = fixture();

        updater.on_path_created(&graph, &path);
        updater.flush().unwrap();

        let device = store
            .read(
                DatastoreKind::Operational,
                &TreePath::device_entry(&SffName::new("sff-1"), DeviceId::new(1)),
            )
            .unwrap();
        assert!(device.path_refs().contains(&PathName::new("path-1")));

        let annotation = store
            .read(
                DatastoreKind::Operational,
                &TreePath::hop_annotation(&PathName::new("path-1"), 0),
            )
            .unwrap();
        assert_eq!(annotation.as_device(), Some(Some(DeviceId::new(1))));
    }

    #[test]
    fn delete_event_removes_membership_but_not_annotations() {
        let store = Arc::new(MemStore::new().unwrap());
        let updater =
            DeviceStateUpdater::new(Arc::clone(&store), UpdaterConfig::default()).unwrap();
        let (graph, path) = fixture();

        updater.on_path_created(&graph, &path);
        updater.on_path_deleted(&path);
        updater.flush().unwrap();

        let device = store
            .read(
                DatastoreKind::Operational,
                &TreePath::device_entry(&SffName::new("sff-1"), DeviceId::new(1)),
            )
            .unwrap();
        assert!(device.path_refs().is_empty());

        // Annotations belong to the path's subtree; its owner removes
        // them by deleting that subtree, not the updater.
        assert!(
            store
                .read(
                    DatastoreKind::Operational,
                    &TreePath::hop_annotation(&PathName::new("path-1"), 0),
                )
                .is_some()
        );
    }

    #[test]
    fn updater_is_usable_as_handler_object() {
        let store = Arc::new(MemStore::new().unwrap());
        let updater: Arc<dyn PathStateHandler> =
            Arc::new(DeviceStateUpdater::new(store, UpdaterConfig::default()).unwrap());
        let (graph, path) = fixture();
        updater.on_path_created(&graph, &path);
        updater.on_path_deleted(&path);
    }
}
