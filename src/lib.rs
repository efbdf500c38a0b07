//! # opstate
//!
//! Derived-state synchronizer for service chain paths: keeps per-device
//! indexes and per-hop device annotations in a transactional state tree
//! consistent with path creation and teardown.
//!
//! ## Architecture
//!
//! - **Domain model** (`chain`): chain graphs, rendered paths, typed
//!   names and device ids
//! - **Tree addressing** (`tree`): datastore partitions, structured
//!   coordinates, node values, change records
//! - **Store seam** (`store`): write transactions, commit signals,
//!   change listeners; in-memory reference implementation
//! - **Projection** (`indexer`): pure staging passes mapping path events
//!   to tree mutations
//! - **Commit pipeline** (`commit`): serialized fire-and-forget commits
//!   with logged, swallowed failures
//! - **Subscriptions** (`watch`): subtree watches dispatching onto
//!   single-worker task queues (`exec`)
//! - **Entry point** (`updater`): one transaction per path event
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use opstate::chain::{
//!     ChainNode, DeviceId, GraphEntry, PathGraph, PathHop, PathName, RenderedPath, SffName,
//! };
//! use opstate::store::mem::MemStore;
//! use opstate::updater::{DeviceStateUpdater, PathStateHandler, UpdaterConfig};
//!
//! let store = Arc::new(MemStore::new().unwrap());
//! let updater = DeviceStateUpdater::new(Arc::clone(&store), UpdaterConfig::default()).unwrap();
//!
//! let graph: PathGraph = [
//!     GraphEntry::new(ChainNode::Ingress, ChainNode::sff("sff-1")).with_device(DeviceId::new(1)),
//!     GraphEntry::new(ChainNode::sff("sff-1"), ChainNode::Egress),
//! ]
//! .into_iter()
//! .collect();
//! let path = RenderedPath::new(
//!     PathName::new("path-1"),
//!     vec![PathHop::new(SffName::new("sff-1")).with_device(DeviceId::new(1))],
//! );
//!
//! updater.on_path_created(&graph, &path);
//! updater.flush().unwrap();
//! ```

pub mod chain;
pub mod commit;
pub mod error;
pub mod exec;
pub mod indexer;
pub mod store;
pub mod tree;
pub mod updater;
pub mod watch;
