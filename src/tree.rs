//! Typed addressing and values for the shared state tree.
//!
//! The derived state lives in a transactional tree store partitioned into
//! datastores ([`DatastoreKind`]). Locations are [`TreePath`]s assembled
//! from [`PathSegment`]s by shape constructors, replacing stringly-typed
//! instance identifiers: a caller cannot build a device-index coordinate
//! with the segments in the wrong order. Values are [`NodeValue`] trees.
//!
//! Two derived shapes matter here:
//!
//! - Device index: `/sff-state/sff=<name>/device-index/device=<id>`, one
//!   `path-ref=<pathName>` membership child per path using the device.
//! - Hop annotation: `/path-state/path=<name>/hop=<index>/device-annotation`,
//!   a leaf carrying the hop's optional device id.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::chain::{DeviceId, PathName, SffName};

/// The datastore partition a write or subscription targets.
///
/// Derived state always lives in `Operational`; `Config` holds intent
/// written by operators and is never touched by the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatastoreKind {
    Config,
    Operational,
}

impl std::fmt::Display for DatastoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatastoreKind::Config => write!(f, "config"),
            DatastoreKind::Operational => write!(f, "operational"),
        }
    }
}

/// One step of a tree coordinate.
///
/// Segments are ordered so they can key the `BTreeMap` inside
/// [`NodeValue::Container`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathSegment {
    /// Root container of per-forwarder operational state.
    SffState,
    /// Keyed entry for one forwarder.
    Sff(SffName),
    /// Container of the forwarder's per-device index.
    DeviceIndex,
    /// Keyed entry for one dataplane device.
    Device(DeviceId),
    /// Membership leaf: this path traverses the device.
    PathRef(PathName),
    /// Root container of per-path operational state.
    PathState,
    /// Keyed entry for one rendered path.
    Path(PathName),
    /// Keyed entry for one hop of a rendered path.
    Hop(u32),
    /// Leaf holding the hop's device annotation.
    DeviceAnnotation,
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::SffState => write!(f, "sff-state"),
            PathSegment::Sff(name) => write!(f, "sff={name}"),
            PathSegment::DeviceIndex => write!(f, "device-index"),
            PathSegment::Device(id) => write!(f, "device={id}"),
            PathSegment::PathRef(name) => write!(f, "path-ref={name}"),
            PathSegment::PathState => write!(f, "path-state"),
            PathSegment::Path(name) => write!(f, "path={name}"),
            PathSegment::Hop(index) => write!(f, "hop={index}"),
            PathSegment::DeviceAnnotation => write!(f, "device-annotation"),
        }
    }
}

/// Absolute coordinate of a node within one datastore's tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreePath(Vec<PathSegment>);

impl TreePath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        TreePath(segments)
    }

    /// Root of the per-forwarder state subtree, for subscriptions.
    pub fn sff_state_root() -> Self {
        TreePath(vec![PathSegment::SffState])
    }

    /// Root of the per-path state subtree, for subscriptions.
    pub fn path_state_root() -> Self {
        TreePath(vec![PathSegment::PathState])
    }

    /// The device-index entry for one device under one forwarder.
    pub fn device_entry(sff: &SffName, device: DeviceId) -> Self {
        TreePath(vec![
            PathSegment::SffState,
            PathSegment::Sff(sff.clone()),
            PathSegment::DeviceIndex,
            PathSegment::Device(device),
        ])
    }

    /// The membership leaf recording that `path` traverses `device` under
    /// `sff`. Point-delete target on path teardown.
    pub fn device_path_ref(sff: &SffName, device: DeviceId, path: &PathName) -> Self {
        TreePath(vec![
            PathSegment::SffState,
            PathSegment::Sff(sff.clone()),
            PathSegment::DeviceIndex,
            PathSegment::Device(device),
            PathSegment::PathRef(path.clone()),
        ])
    }

    /// The subtree root of one rendered path's operational state.
    pub fn rendered_path(path: &PathName) -> Self {
        TreePath(vec![PathSegment::PathState, PathSegment::Path(path.clone())])
    }

    /// The device-annotation leaf for one hop of one path.
    pub fn hop_annotation(path: &PathName, hop_index: u32) -> Self {
        TreePath(vec![
            PathSegment::PathState,
            PathSegment::Path(path.clone()),
            PathSegment::Hop(hop_index),
            PathSegment::DeviceAnnotation,
        ])
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `prefix` is an ancestor-or-self coordinate of this path.
    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Split into the final segment and the parent segments.
    /// `None` for the root path.
    pub fn split_last(&self) -> Option<(&PathSegment, &[PathSegment])> {
        self.0.split_last()
    }
}

impl std::fmt::Display for TreePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Node values
// ---------------------------------------------------------------------------

/// A node of the state tree.
///
/// The derived state needs exactly three shapes: interior containers,
/// optional-device payload leaves, and presence leaves whose existence is
/// the datum (device-index membership).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeValue {
    /// Leaf whose existence carries the information.
    Presence,
    /// Leaf carrying an optional dataplane device id.
    Device(Option<DeviceId>),
    /// Interior node with keyed children.
    Container(BTreeMap<PathSegment, NodeValue>),
}

impl NodeValue {
    /// An empty interior node.
    pub fn container() -> Self {
        NodeValue::Container(BTreeMap::new())
    }

    pub fn as_container(&self) -> Option<&BTreeMap<PathSegment, NodeValue>> {
        match self {
            NodeValue::Container(children) => Some(children),
            _ => None,
        }
    }

    pub(crate) fn as_container_mut(&mut self) -> Option<&mut BTreeMap<PathSegment, NodeValue>> {
        match self {
            NodeValue::Container(children) => Some(children),
            _ => None,
        }
    }

    /// The device id carried by a device leaf. Outer `None` means this is
    /// not a device leaf; inner `None` means the hop had no resolved device.
    pub fn as_device(&self) -> Option<Option<DeviceId>> {
        match self {
            NodeValue::Device(id) => Some(*id),
            _ => None,
        }
    }

    /// Direct child lookup on a container; `None` on leaves.
    pub fn child(&self, segment: &PathSegment) -> Option<&NodeValue> {
        self.as_container().and_then(|children| children.get(segment))
    }

    /// Navigate a relative segment sequence downward from this node.
    pub fn descend(&self, segments: &[PathSegment]) -> Option<&NodeValue> {
        let mut node = self;
        for segment in segments {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Read side of the device index: the path names recorded as
    /// `path-ref` membership children of this node.
    pub fn path_refs(&self) -> BTreeSet<PathName> {
        match self.as_container() {
            Some(children) => children
                .keys()
                .filter_map(|segment| match segment {
                    PathSegment::PathRef(name) => Some(name.clone()),
                    _ => None,
                })
                .collect(),
            None => BTreeSet::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Change notifications
// ---------------------------------------------------------------------------

/// What happened to one node in a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOp {
    /// The node was created or replaced; carries the value after the
    /// commit (for merges, the post-union subtree).
    Written(NodeValue),
    /// The node and its subtree were removed.
    Removed,
}

/// One entry of a change batch delivered to subtree listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeChange {
    pub datastore: DatastoreKind,
    pub path: TreePath,
    pub op: ChangeOp,
}
