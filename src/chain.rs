//! Domain model for computed service chain paths.
//!
//! A path computation produces two artifacts this crate consumes: a
//! [`PathGraph`] of hop-to-hop transitions annotated with the dataplane
//! device each transition lands on, and the [`RenderedPath`] record the
//! computation wrote for consumers. Chain endpoints are modeled as
//! [`ChainNode`] variants rather than reserved name strings, so "egress"
//! can never collide with a real forwarder name.

use serde::{Deserialize, Serialize};

/// Name of a service function forwarder participating in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SffName(String);

impl SffName {
    pub fn new(name: impl Into<String>) -> Self {
        SffName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SffName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the dataplane device (datapath node) backing a forwarder.
///
/// Datapath ids are 64-bit on the wire, so this is a `Copy` newtype over
/// `u64` rather than a name string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct DeviceId(u64);

impl DeviceId {
    pub fn new(raw: u64) -> Self {
        DeviceId(raw)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a rendered service path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathName(String);

impl PathName {
    pub fn new(name: impl Into<String>) -> Self {
        PathName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PathName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in the chain graph: one of the two virtual endpoints, or a
/// concrete forwarder.
///
/// By convention a graph's first entry has an `Ingress` source and its last
/// entry an `Egress` destination, but that placement is a data-producer
/// convention and is not enforced here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainNode {
    /// Virtual entry point of the chain, before the first forwarder.
    Ingress,
    /// Virtual exit point of the chain, after the last forwarder.
    Egress,
    /// A concrete service function forwarder.
    Sff(SffName),
}

impl ChainNode {
    pub fn sff(name: impl Into<String>) -> Self {
        ChainNode::Sff(SffName::new(name))
    }

    pub fn is_egress(&self) -> bool {
        matches!(self, ChainNode::Egress)
    }

    /// The forwarder name, if this node is a concrete forwarder.
    pub fn as_sff(&self) -> Option<&SffName> {
        match self {
            ChainNode::Sff(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChainNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainNode::Ingress => write!(f, "ingress"),
            ChainNode::Egress => write!(f, "egress"),
            ChainNode::Sff(name) => write!(f, "{name}"),
        }
    }
}

/// One transition of a chain graph, annotated with the device the traffic
/// lands on at the destination.
///
/// `dst_device` is `None` when the destination has no resolved dataplane
/// device (the egress endpoint, or a forwarder the mapper could not place).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEntry {
    pub src: ChainNode,
    pub dst: ChainNode,
    pub dst_device: Option<DeviceId>,
}

impl GraphEntry {
    pub fn new(src: ChainNode, dst: ChainNode) -> Self {
        GraphEntry {
            src,
            dst,
            dst_device: None,
        }
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.dst_device = Some(device);
        self
    }
}

/// Ordered list of [`GraphEntry`] transitions for one path, ingress to
/// egress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathGraph {
    entries: Vec<GraphEntry>,
}

impl PathGraph {
    pub fn new() -> Self {
        PathGraph::default()
    }

    pub fn add_entry(&mut self, entry: GraphEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[GraphEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<GraphEntry> for PathGraph {
    fn from_iter<I: IntoIterator<Item = GraphEntry>>(iter: I) -> Self {
        PathGraph {
            entries: iter.into_iter().collect(),
        }
    }
}

/// One hop of a rendered path: the forwarder traversed and, when resolved,
/// the device it runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHop {
    pub forwarder: SffName,
    pub device: Option<DeviceId>,
}

impl PathHop {
    pub fn new(forwarder: SffName) -> Self {
        PathHop {
            forwarder,
            device: None,
        }
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }
}

/// The rendered record of one computed path: its name and traversal order.
///
/// Immutable once produced; the fields are read-only accessors so a path
/// handed to the synchronizer cannot drift from what was rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPath {
    name: PathName,
    hops: Vec<PathHop>,
}

impl RenderedPath {
    pub fn new(name: PathName, hops: Vec<PathHop>) -> Self {
        RenderedPath { name, hops }
    }

    pub fn name(&self) -> &PathName {
        &self.name
    }

    pub fn hops(&self) -> &[PathHop] {
        &self.hops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_node_egress_detection() {
        assert!(ChainNode::Egress.is_egress());
        assert!(!ChainNode::Ingress.is_egress());
        assert!(!ChainNode::sff("sff-1").is_egress());
    }

    #[test]
    fn chain_node_sff_accessor() {
        let node = ChainNode::sff("sff-1");
        assert_eq!(node.as_sff().map(SffName::as_str), Some("sff-1"));
        assert_eq!(ChainNode::Egress.as_sff(), None);
    }

    #[test]
    fn graph_entry_device_builder() {
        let entry = GraphEntry::new(ChainNode::Ingress, ChainNode::sff("sff-1"))
            .with_device(DeviceId::new(7));
        assert_eq!(entry.dst_device, Some(DeviceId::new(7)));
    }

    #[test]
    fn path_graph_preserves_entry_order() {
        let graph: PathGraph = [
            GraphEntry::new(ChainNode::Ingress, ChainNode::sff("a")),
            GraphEntry::new(ChainNode::sff("a"), ChainNode::sff("b")),
            GraphEntry::new(ChainNode::sff("b"), ChainNode::Egress),
        ]
        .into_iter()
        .collect();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.entries()[0].src, ChainNode::Ingress);
        assert!(graph.entries()[2].dst.is_egress());
    }

    #[test]
    fn rendered_path_accessors() {
        let path = RenderedPath::new(
            PathName::new("path-1"),
            vec![PathHop::new(SffName::new("sff-1")).with_device(DeviceId::new(1))],
        );
        assert_eq!(path.name().as_str(), "path-1");
        assert_eq!(path.hops().len(), 1);
        assert_eq!(path.hops()[0].device, Some(DeviceId::new(1)));
    }

    #[test]
    fn display_formats() {
        assert_eq!(ChainNode::Ingress.to_string(), "ingress");
        assert_eq!(ChainNode::sff("sff-9").to_string(), "sff-9");
        assert_eq!(DeviceId::new(42).to_string(), "42");
    }
}
