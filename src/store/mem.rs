//! In-process reference implementation of [`StateStore`].
//!
//! Backs the integration tests and small embeddings. All data is lost on
//! process exit. One committer thread owns the trees:
//!
//! - Transactions are applied atomically: every staged operation is
//!   validated against a working copy, then the new root is swapped in.
//!   A rejected transaction changes nothing.
//! - Change batches are delivered to overlapping listeners on the
//!   committer thread, in commit order, after the commit signal resolves.
//!   Listeners must not block; hop onto a
//!   [`TaskQueue`](crate::exec::TaskQueue) via
//!   [`SubtreeWatch`](crate::watch::SubtreeWatch) for real work. A
//!   panicking listener is caught and logged; the committer keeps going.
//!
//! Dropping the store drains queued commits, then stops the committer.
//! Submit or drop outstanding transactions before dropping the store;
//! an open transaction keeps the committer alive.

use std::collections::btree_map::Entry;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, mpsc};
use std::thread;

use dashmap::DashMap;

use crate::error::{CommitError, ExecError, SubscribeError};
use crate::store::{
    CommitComplete, CommitSignal, ListenerRegistration, StateStore, TreeChangeListener,
    WriteTransaction,
};
use crate::tree::{ChangeOp, DatastoreKind, NodeValue, PathSegment, TreeChange, TreePath};

/// In-memory transactional tree store with a single committer thread.
pub struct MemStore {
    shared: Arc<Shared>,
    jobs: Option<mpsc::Sender<Job>>,
    committer: Option<thread::JoinHandle<()>>,
}

struct Shared {
    config: RwLock<NodeValue>,
    operational: RwLock<NodeValue>,
    listeners: DashMap<u64, Subscription>,
    next_listener_id: AtomicU64,
}

struct Subscription {
    datastore: DatastoreKind,
    subtree: TreePath,
    listener: Arc<dyn TreeChangeListener>,
}

enum Job {
    Commit {
        ops: Vec<TxnOp>,
        complete: CommitComplete,
    },
    InitialBatch {
        id: u64,
    },
}

enum TxnOp {
    Put {
        datastore: DatastoreKind,
        path: TreePath,
        value: NodeValue,
        create_parents: bool,
    },
    Merge {
        datastore: DatastoreKind,
        path: TreePath,
        value: NodeValue,
        create_parents: bool,
    },
    Delete {
        datastore: DatastoreKind,
        path: TreePath,
    },
}

impl MemStore {
    /// Create an empty store and start its committer thread.
    pub fn new() -> Result<Self, ExecError> {
        let shared = Arc::new(Shared {
            config: RwLock::new(NodeValue::container()),
            operational: RwLock::new(NodeValue::container()),
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
        });

        let (jobs, job_rx) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let committer = thread::Builder::new()
            .name("opstate-store".into())
            .spawn(move || run_committer(worker_shared, job_rx))
            .map_err(|e| ExecError::Spawn {
                name: "opstate-store".into(),
                source: e,
            })?;

        Ok(Self {
            shared,
            jobs: Some(jobs),
            committer: Some(committer),
        })
    }

    /// Snapshot read of the node at `path`, or `None` if absent.
    ///
    /// The returned value is a deep clone; later commits do not show
    /// through it.
    pub fn read(&self, datastore: DatastoreKind, path: &TreePath) -> Option<NodeValue> {
        let root = self.shared.tree(datastore).read().unwrap();
        root.descend(path.segments()).cloned()
    }

    fn sender(&self) -> &mpsc::Sender<Job> {
        // `jobs` is only None while Drop runs, and Drop takes `&mut self`.
        match &self.jobs {
            Some(jobs) => jobs,
            None => unreachable!("job channel taken outside Drop"),
        }
    }
}

impl StateStore for MemStore {
    type Txn = MemTransaction;

    fn write_transaction(&self) -> MemTransaction {
        MemTransaction {
            ops: Vec::new(),
            jobs: self.sender().clone(),
        }
    }

    fn register_change_listener(
        &self,
        datastore: DatastoreKind,
        subtree: TreePath,
        listener: Arc<dyn TreeChangeListener>,
    ) -> Result<ListenerRegistration, SubscribeError> {
        let id = self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(listener = id, datastore = %datastore, subtree = %subtree, "registering change listener");
        self.shared.listeners.insert(
            id,
            Subscription {
                datastore,
                subtree,
                listener,
            },
        );

        // The committer delivers current subtree content as the first batch.
        if self.sender().send(Job::InitialBatch { id }).is_err() {
            self.shared.listeners.remove(&id);
            return Err(SubscribeError::StoreShutdown);
        }

        let shared = Arc::clone(&self.shared);
        Ok(ListenerRegistration::new(move || {
            shared.listeners.remove(&id);
            tracing::debug!(listener = id, "change listener closed");
        }))
    }
}

impl Drop for MemStore {
    fn drop(&mut self) {
        // Closing the channel lets the committer drain queued jobs and stop.
        self.jobs.take();
        if let Some(committer) = self.committer.take() {
            let _ = committer.join();
        }
    }
}

impl Shared {
    fn tree(&self, datastore: DatastoreKind) -> &RwLock<NodeValue> {
        match datastore {
            DatastoreKind::Config => &self.config,
            DatastoreKind::Operational => &self.operational,
        }
    }
}

/// Write transaction against a [`MemStore`]. Staged operations are held
/// locally until [`submit`](WriteTransaction::submit).
pub struct MemTransaction {
    ops: Vec<TxnOp>,
    jobs: mpsc::Sender<Job>,
}

impl WriteTransaction for MemTransaction {
    fn put(
        &mut self,
        datastore: DatastoreKind,
        path: TreePath,
        value: NodeValue,
        create_parents: bool,
    ) {
        self.ops.push(TxnOp::Put {
            datastore,
            path,
            value,
            create_parents,
        });
    }

    fn merge(
        &mut self,
        datastore: DatastoreKind,
        path: TreePath,
        value: NodeValue,
        create_parents: bool,
    ) {
        self.ops.push(TxnOp::Merge {
            datastore,
            path,
            value,
            create_parents,
        });
    }

    fn delete(&mut self, datastore: DatastoreKind, path: TreePath) {
        self.ops.push(TxnOp::Delete { datastore, path });
    }

    fn submit(self) -> CommitSignal {
        let (complete, signal) = CommitSignal::deferred();
        // A failed send drops `complete`, which resolves the signal as
        // a store shutdown.
        if self
            .jobs
            .send(Job::Commit {
                ops: self.ops,
                complete,
            })
            .is_err()
        {
            tracing::debug!("store committer gone; commit resolves as shutdown");
        }
        signal
    }
}

// ---------------------------------------------------------------------------
// Committer thread
// ---------------------------------------------------------------------------

fn run_committer(shared: Arc<Shared>, jobs: mpsc::Receiver<Job>) {
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Commit { ops, complete } => {
                match apply_transaction(&shared, ops) {
                    Ok(changes) => {
                        complete.resolve(Ok(()));
                        notify_listeners(&shared, &changes);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "transaction rejected");
                        complete.resolve(Err(e));
                    }
                }
            }
            Job::InitialBatch { id } => deliver_initial_batch(&shared, id),
        }
    }
    tracing::debug!("state store committer stopped");
}

/// Apply every staged operation against working copies of the touched
/// roots, then swap the copies in. Any failure discards all of it.
fn apply_transaction(shared: &Shared, ops: Vec<TxnOp>) -> Result<Vec<TreeChange>, CommitError> {
    let mut working = WorkingRoots::new(shared);
    let mut changes = Vec::new();

    for op in ops {
        match op {
            TxnOp::Put {
                datastore,
                path,
                value,
                create_parents,
            } => {
                let children = parent_children(working.root_mut(datastore), &path, create_parents)?;
                let (last, _) = split_path(&path)?;
                children.insert(last.clone(), value.clone());
                changes.push(TreeChange {
                    datastore,
                    path,
                    op: ChangeOp::Written(value),
                });
            }
            TxnOp::Merge {
                datastore,
                path,
                value,
                create_parents,
            } => {
                let children = parent_children(working.root_mut(datastore), &path, create_parents)?;
                let (last, _) = split_path(&path)?;
                let merged = match children.entry(last.clone()) {
                    Entry::Occupied(mut occupied) => {
                        merge_node(occupied.get_mut(), value);
                        occupied.get().clone()
                    }
                    Entry::Vacant(vacant) => vacant.insert(value).clone(),
                };
                changes.push(TreeChange {
                    datastore,
                    path,
                    op: ChangeOp::Written(merged),
                });
            }
            TxnOp::Delete { datastore, path } => {
                let (last, parents) = split_path(&path)?;
                let removed = existing_children(working.root_mut(datastore), parents)
                    .and_then(|children| children.remove(last));
                // Deleting an absent node is a no-op, not an error.
                if removed.is_some() {
                    changes.push(TreeChange {
                        datastore,
                        path,
                        op: ChangeOp::Removed,
                    });
                }
            }
        }
    }

    working.swap_in();
    let count = changes.len();
    tracing::debug!(changes = count, "transaction applied");
    Ok(changes)
}

/// Lazily cloned working copies of the datastore roots.
struct WorkingRoots<'a> {
    shared: &'a Shared,
    config: Option<NodeValue>,
    operational: Option<NodeValue>,
}

impl<'a> WorkingRoots<'a> {
    fn new(shared: &'a Shared) -> Self {
        WorkingRoots {
            shared,
            config: None,
            operational: None,
        }
    }

    fn root_mut(&mut self, datastore: DatastoreKind) -> &mut NodeValue {
        let shared = self.shared;
        let slot = match datastore {
            DatastoreKind::Config => &mut self.config,
            DatastoreKind::Operational => &mut self.operational,
        };
        slot.get_or_insert_with(|| shared.tree(datastore).read().unwrap().clone())
    }

    fn swap_in(self) {
        if let Some(config) = self.config {
            *self.shared.config.write().unwrap() = config;
        }
        if let Some(operational) = self.operational {
            *self.shared.operational.write().unwrap() = operational;
        }
    }
}

fn split_path(path: &TreePath) -> Result<(&PathSegment, &[PathSegment]), CommitError> {
    path.split_last().ok_or_else(|| CommitError::Rejected {
        message: "refusing to address the datastore root".into(),
    })
}

/// Children map of `path`'s parent, creating missing parent containers
/// when `create_parents` is set and rejecting otherwise.
fn parent_children<'a>(
    root: &'a mut NodeValue,
    path: &TreePath,
    create_parents: bool,
) -> Result<&'a mut std::collections::BTreeMap<PathSegment, NodeValue>, CommitError> {
    let (_, parents) = split_path(path)?;
    let mut node = root;
    for segment in parents {
        let children = node.as_container_mut().ok_or_else(|| CommitError::Rejected {
            message: format!("node on the way to {path} is not a container"),
        })?;
        node = match children.entry(segment.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                if create_parents {
                    vacant.insert(NodeValue::container())
                } else {
                    return Err(CommitError::Rejected {
                        message: format!("missing parent container on the way to {path}"),
                    });
                }
            }
        };
    }
    node.as_container_mut().ok_or_else(|| CommitError::Rejected {
        message: format!("parent of {path} is not a container"),
    })
}

/// Children map of the node at `parents`, or `None` if any step is absent
/// or a leaf. Used by delete, which treats absence as a no-op.
fn existing_children<'a>(
    root: &'a mut NodeValue,
    parents: &[PathSegment],
) -> Option<&'a mut std::collections::BTreeMap<PathSegment, NodeValue>> {
    let mut node = root;
    for segment in parents {
        node = node.as_container_mut()?.get_mut(segment)?;
    }
    node.as_container_mut()
}

/// Recursive union: container children merge, anything else is replaced.
fn merge_node(existing: &mut NodeValue, incoming: NodeValue) {
    match incoming {
        NodeValue::Container(source) => {
            if let NodeValue::Container(children) = existing {
                for (segment, value) in source {
                    match children.entry(segment) {
                        Entry::Occupied(mut occupied) => merge_node(occupied.get_mut(), value),
                        Entry::Vacant(vacant) => {
                            vacant.insert(value);
                        }
                    }
                }
            } else {
                *existing = NodeValue::Container(source);
            }
        }
        leaf => *existing = leaf,
    }
}

// ---------------------------------------------------------------------------
// Notification delivery
// ---------------------------------------------------------------------------

fn notify_listeners(shared: &Shared, changes: &[TreeChange]) {
    if changes.is_empty() {
        return;
    }

    // Snapshot subscriptions first: listeners may close their own
    // registration from the callback, which would otherwise deadlock
    // against the map iteration.
    let subscriptions: Vec<(DatastoreKind, TreePath, Arc<dyn TreeChangeListener>)> = shared
        .listeners
        .iter()
        .map(|entry| {
            let sub = entry.value();
            (sub.datastore, sub.subtree.clone(), Arc::clone(&sub.listener))
        })
        .collect();

    for (datastore, subtree, listener) in subscriptions {
        let batch: Vec<TreeChange> = changes
            .iter()
            .filter(|change| change.datastore == datastore && overlaps(&change.path, &subtree))
            .cloned()
            .collect();
        if !batch.is_empty() {
            dispatch_batch(&*listener, batch);
        }
    }
}

/// Hand one batch to one listener. A panic in the callback must not take
/// the committer thread down with it, so unwinds stop here.
fn dispatch_batch(listener: &dyn TreeChangeListener, batch: Vec<TreeChange>) {
    if panic::catch_unwind(AssertUnwindSafe(|| listener.on_tree_changed(batch))).is_err() {
        tracing::error!("change listener panicked; committer continues");
    }
}

/// A change is visible to a subscription when its path lies inside the
/// registered subtree, or is an ancestor of it (a cascade delete above
/// the subtree removes the subtree too).
fn overlaps(changed: &TreePath, subtree: &TreePath) -> bool {
    changed.starts_with(subtree) || subtree.starts_with(changed)
}

fn deliver_initial_batch(shared: &Shared, id: u64) {
    let Some(entry) = shared.listeners.get(&id) else {
        return; // closed before the committer got to it
    };
    let datastore = entry.datastore;
    let subtree = entry.subtree.clone();
    let listener = Arc::clone(&entry.listener);
    drop(entry);

    let current = {
        let root = shared.tree(datastore).read().unwrap();
        root.descend(subtree.segments()).cloned()
    };
    if let Some(value) = current {
        let batch = vec![TreeChange {
            datastore,
            path: subtree,
            op: ChangeOp::Written(value),
        }];
        dispatch_batch(&*listener, batch);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::mpsc::{Receiver, Sender, channel};
    use std::time::Duration;

    use super::*;
    use crate::chain::{DeviceId, PathName, SffName};

    fn sff(name: &str) -> SffName {
        SffName::new(name)
    }

    fn path(name: &str) -> PathName {
        PathName::new(name)
    }

    fn commit<F>(store: &MemStore, stage: F) -> Result<(), CommitError>
    where
        F: FnOnce(&mut MemTransaction),
    {
        let mut txn = store.write_transaction();
        stage(&mut txn);
        txn.submit().wait()
    }

    /// Forwards each batch into a channel so tests can block on delivery.
    struct ChannelListener {
        batches: Mutex<Sender<Vec<TreeChange>>>,
    }

    impl ChannelListener {
        fn pair() -> (Arc<Self>, Receiver<Vec<TreeChange>>) {
            let (tx, rx) = channel();
            (
                Arc::new(ChannelListener {
                    batches: Mutex::new(tx),
                }),
                rx,
            )
        }
    }

    impl TreeChangeListener for ChannelListener {
        fn on_tree_changed(&self, changes: Vec<TreeChange>) {
            let _ = self.batches.lock().unwrap().send(changes);
        }
    }

    #[test]
    fn put_then_read() {
        let store = MemStore::new().unwrap();
        let coord = TreePath::hop_annotation(&path("p1"), 0);
        commit(&store, |txn| {
            txn.put(
                DatastoreKind::Operational,
                coord.clone(),
                NodeValue::Device(Some(DeviceId::new(4))),
                true,
            );
        })
        .unwrap();

        assert_eq!(
            store.read(DatastoreKind::Operational, &coord),
            Some(NodeValue::Device(Some(DeviceId::new(4))))
        );
        // Datastores are separate partitions.
        assert_eq!(store.read(DatastoreKind::Config, &coord), None);
    }

    #[test]
    fn put_replaces_subtree() {
        let store = MemStore::new().unwrap();
        let device = TreePath::device_entry(&sff("s1"), DeviceId::new(1));
        commit(&store, |txn| {
            txn.put(
                DatastoreKind::Operational,
                TreePath::device_path_ref(&sff("s1"), DeviceId::new(1), &path("p1")),
                NodeValue::Presence,
                true,
            );
        })
        .unwrap();
        commit(&store, |txn| {
            txn.put(
                DatastoreKind::Operational,
                device.clone(),
                NodeValue::container(),
                true,
            );
        })
        .unwrap();

        let node = store.read(DatastoreKind::Operational, &device).unwrap();
        assert!(node.path_refs().is_empty(), "put must replace, not merge");
    }

    #[test]
    fn merge_unions_sibling_entries() {
        let store = MemStore::new().unwrap();
        let device = TreePath::device_entry(&sff("s1"), DeviceId::new(1));
        for name in ["p1", "p2"] {
            let mut members = std::collections::BTreeMap::new();
            members.insert(PathSegment::PathRef(path(name)), NodeValue::Presence);
            commit(&store, |txn| {
                txn.merge(
                    DatastoreKind::Operational,
                    device.clone(),
                    NodeValue::Container(members),
                    true,
                );
            })
            .unwrap();
        }

        let node = store.read(DatastoreKind::Operational, &device).unwrap();
        let members = node.path_refs();
        assert!(members.contains(&path("p1")));
        assert!(members.contains(&path("p2")));
    }

    #[test]
    fn merge_replaces_conflicting_leaf() {
        let store = MemStore::new().unwrap();
        let coord = TreePath::hop_annotation(&path("p1"), 0);
        commit(&store, |txn| {
            txn.put(
                DatastoreKind::Operational,
                coord.clone(),
                NodeValue::Device(None),
                true,
            );
        })
        .unwrap();
        commit(&store, |txn| {
            txn.merge(
                DatastoreKind::Operational,
                coord.clone(),
                NodeValue::Device(Some(DeviceId::new(9))),
                true,
            );
        })
        .unwrap();

        assert_eq!(
            store.read(DatastoreKind::Operational, &coord),
            Some(NodeValue::Device(Some(DeviceId::new(9))))
        );
    }

    #[test]
    fn delete_cascades_subtree() {
        let store = MemStore::new().unwrap();
        let root = TreePath::rendered_path(&path("p1"));
        commit(&store, |txn| {
            txn.put(
                DatastoreKind::Operational,
                TreePath::hop_annotation(&path("p1"), 0),
                NodeValue::Device(Some(DeviceId::new(1))),
                true,
            );
            txn.put(
                DatastoreKind::Operational,
                TreePath::hop_annotation(&path("p1"), 1),
                NodeValue::Device(None),
                true,
            );
        })
        .unwrap();

        commit(&store, |txn| {
            txn.delete(DatastoreKind::Operational, root.clone());
        })
        .unwrap();

        assert_eq!(store.read(DatastoreKind::Operational, &root), None);
        assert_eq!(
            store.read(
                DatastoreKind::Operational,
                &TreePath::hop_annotation(&path("p1"), 0)
            ),
            None
        );
    }

    #[test]
    fn delete_absent_is_noop() {
        let store = MemStore::new().unwrap();
        let outcome = commit(&store, |txn| {
            txn.delete(
                DatastoreKind::Operational,
                TreePath::device_path_ref(&sff("s1"), DeviceId::new(1), &path("p1")),
            );
        });
        assert!(outcome.is_ok());
    }

    #[test]
    fn missing_parent_without_create_rejects_whole_transaction() {
        let store = MemStore::new().unwrap();
        let good = TreePath::hop_annotation(&path("p1"), 0);
        let outcome = commit(&store, |txn| {
            txn.put(
                DatastoreKind::Operational,
                good.clone(),
                NodeValue::Device(None),
                true,
            );
            // Fails: nothing exists under sff-state yet.
            txn.put(
                DatastoreKind::Operational,
                TreePath::device_path_ref(&sff("s1"), DeviceId::new(1), &path("p1")),
                NodeValue::Presence,
                false,
            );
        });

        assert!(matches!(outcome, Err(CommitError::Rejected { .. })));
        // Atomicity: the earlier op must not have applied either.
        assert_eq!(store.read(DatastoreKind::Operational, &good), None);
    }

    #[test]
    fn listener_sees_only_overlapping_changes() {
        let store = MemStore::new().unwrap();
        let (listener, batches) = ChannelListener::pair();
        let _registration = store
            .register_change_listener(
                DatastoreKind::Operational,
                TreePath::sff_state_root(),
                listener,
            )
            .unwrap();

        commit(&store, |txn| {
            txn.put(
                DatastoreKind::Operational,
                TreePath::device_path_ref(&sff("s1"), DeviceId::new(1), &path("p1")),
                NodeValue::Presence,
                true,
            );
            txn.put(
                DatastoreKind::Operational,
                TreePath::hop_annotation(&path("p1"), 0),
                NodeValue::Device(Some(DeviceId::new(1))),
                true,
            );
        })
        .unwrap();

        let batch = batches.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(batch.len(), 1);
        assert!(batch[0].path.starts_with(&TreePath::sff_state_root()));
    }

    #[test]
    fn registration_delivers_initial_content() {
        let store = MemStore::new().unwrap();
        let device = TreePath::device_entry(&sff("s1"), DeviceId::new(1));
        commit(&store, |txn| {
            txn.put(
                DatastoreKind::Operational,
                TreePath::device_path_ref(&sff("s1"), DeviceId::new(1), &path("p1")),
                NodeValue::Presence,
                true,
            );
        })
        .unwrap();

        let (listener, batches) = ChannelListener::pair();
        let _registration = store
            .register_change_listener(DatastoreKind::Operational, device.clone(), listener)
            .unwrap();

        let batch = batches.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].path, device);
        match &batch[0].op {
            ChangeOp::Written(value) => assert!(value.path_refs().contains(&path("p1"))),
            ChangeOp::Removed => panic!("initial batch must be a write"),
        }
    }

    #[test]
    fn closed_registration_stops_delivery() {
        let store = MemStore::new().unwrap();
        let (listener, batches) = ChannelListener::pair();
        let mut registration = store
            .register_change_listener(
                DatastoreKind::Operational,
                TreePath::path_state_root(),
                listener,
            )
            .unwrap();
        registration.close();

        commit(&store, |txn| {
            txn.put(
                DatastoreKind::Operational,
                TreePath::hop_annotation(&path("p1"), 0),
                NodeValue::Device(None),
                true,
            );
        })
        .unwrap();

        assert!(batches.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn batches_arrive_in_commit_order() {
        let store = MemStore::new().unwrap();
        let (listener, batches) = ChannelListener::pair();
        let _registration = store
            .register_change_listener(
                DatastoreKind::Operational,
                TreePath::path_state_root(),
                listener,
            )
            .unwrap();

        for hop in 0..3 {
            commit(&store, |txn| {
                txn.put(
                    DatastoreKind::Operational,
                    TreePath::hop_annotation(&path("p1"), hop),
                    NodeValue::Device(None),
                    true,
                );
            })
            .unwrap();
        }

        for hop in 0..3 {
            let batch = batches.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(batch[0].path, TreePath::hop_annotation(&path("p1"), hop));
        }
    }

    struct PanickingListener;

    impl TreeChangeListener for PanickingListener {
        fn on_tree_changed(&self, _: Vec<TreeChange>) {
            panic!("listener blew up");
        }
    }

    #[test]
    fn panicking_listener_does_not_kill_the_committer() {
        let store = MemStore::new().unwrap();
        let _bad = store
            .register_change_listener(
                DatastoreKind::Operational,
                TreePath::path_state_root(),
                Arc::new(PanickingListener),
            )
            .unwrap();
        let (listener, batches) = ChannelListener::pair();
        let _good = store
            .register_change_listener(
                DatastoreKind::Operational,
                TreePath::path_state_root(),
                listener,
            )
            .unwrap();

        for hop in 0..2 {
            commit(&store, |txn| {
                txn.put(
                    DatastoreKind::Operational,
                    TreePath::hop_annotation(&path("p1"), hop),
                    NodeValue::Device(None),
                    true,
                );
            })
            .unwrap();
        }

        // Every commit unwound the bad listener, and neither the commits
        // nor the healthy listener noticed.
        for hop in 0..2 {
            let batch = batches.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(batch[0].path, TreePath::hop_annotation(&path("p1"), hop));
        }
    }
}
