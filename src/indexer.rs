//! Projection of computed paths into derived operational state.
//!
//! Pure staging passes: every function here walks domain data and stages
//! writes into a caller-supplied [`WriteTransaction`]. No I/O happens and
//! nothing can fail; validation and application belong to the store, and
//! getting the batch committed belongs to the
//! [`CommitPipeline`](crate::commit::CommitPipeline).
//!
//! Two structures are maintained, both in the operational datastore:
//!
//! - Hop annotations: one `device-annotation` leaf per traversed hop of a
//!   path, written even when the hop has no resolved device.
//! - Device index: per forwarder and device, the set of path names
//!   currently using that device, as `path-ref` membership leaves.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use crate::chain::{DeviceId, PathGraph, PathName, RenderedPath};
use crate::store::WriteTransaction;
use crate::tree::{DatastoreKind, NodeValue, PathSegment, TreePath};

/// Derived state lives in the operational partition only.
const DATASTORE: DatastoreKind = DatastoreKind::Operational;

/// Stage all derived-state writes for a newly created path: hop
/// annotations first, then device-index memberships.
pub fn path_created<T: WriteTransaction>(graph: &PathGraph, path: &RenderedPath, txn: &mut T) {
    tracing::debug!(path = %path.name(), entries = graph.len(), "projecting created path");
    annotate_path_hops(graph, path.name(), txn);
    index_path_devices(graph, path.name(), txn);
}

/// Stage removal of the path's device-index memberships.
///
/// The rendered path's own hops are the source of truth here, not the
/// graph: teardown must remove exactly what the path records. Hop
/// annotations live under the path's subtree and go away when its owner
/// deletes that subtree, so they are not touched individually.
pub fn path_deleted<T: WriteTransaction>(path: &RenderedPath, txn: &mut T) {
    tracing::debug!(path = %path.name(), hops = path.hops().len(), "removing deleted path from device index");
    for hop in path.hops() {
        let Some(device) = hop.device else {
            continue;
        };
        let coord = TreePath::device_path_ref(&hop.forwarder, device, path.name());
        tracing::debug!(coord = %coord, "staging membership delete");
        txn.delete(DATASTORE, coord);
    }
}

/// First create pass: one annotation put per non-egress graph entry.
///
/// The hop index counts emitted annotations, so indices stay dense even
/// though the egress entry is skipped. Entries without a resolved device
/// still get an annotation; it carries `None`.
pub fn annotate_path_hops<T: WriteTransaction>(graph: &PathGraph, path: &PathName, txn: &mut T) {
    let mut hop_index: u32 = 0;
    for entry in graph.entries() {
        if entry.dst.is_egress() {
            continue;
        }
        let coord = TreePath::hop_annotation(path, hop_index);
        tracing::debug!(coord = %coord, device = ?entry.dst_device, "staging hop annotation");
        txn.put(DATASTORE, coord, NodeValue::Device(entry.dst_device), true);
        hop_index += 1;
    }
}

/// Second create pass: merge the path into each traversed device's index.
///
/// A working map accumulates the membership set per device across the
/// walk, and the full record is merged once per qualifying entry (an
/// entry qualifies when its destination is a forwarder with a resolved
/// device). Merging rather than putting preserves memberships other
/// paths already wrote.
pub fn index_path_devices<T: WriteTransaction>(graph: &PathGraph, path: &PathName, txn: &mut T) {
    let mut members_by_device: HashMap<DeviceId, BTreeSet<PathName>> = HashMap::new();

    for entry in graph.entries() {
        if entry.dst.is_egress() {
            continue;
        }
        let Some(device) = entry.dst_device else {
            continue;
        };
        let Some(sff) = entry.dst.as_sff() else {
            continue;
        };

        let members = match members_by_device.entry(device) {
            Entry::Occupied(occupied) => {
                tracing::debug!(device = %device, "device already in working set");
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => {
                tracing::debug!(device = %device, "new device in working set");
                vacant.insert(BTreeSet::new())
            }
        };
        members.insert(path.clone());

        let coord = TreePath::device_entry(sff, device);
        tracing::debug!(coord = %coord, paths = members.len(), "staging device index merge");
        txn.merge(DATASTORE, coord, membership_record(members), true);
    }
}

fn membership_record(members: &BTreeSet<PathName>) -> NodeValue {
    NodeValue::Container(
        members
            .iter()
            .map(|name| (PathSegment::PathRef(name.clone()), NodeValue::Presence))
            .collect(),
    )
}
