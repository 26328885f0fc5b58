//! Topology graph model for EMANE network emulation experiments
//!
//! This crate turns a declarative topology description into an immutable
//! graph of emulated nodes and point-to-point links:
//! - Node indices are the rank of the node name, independent of declaration order
//! - Neighbor declarations are deduplicated into one link per unordered pair
//! - Every link gets a deterministic /24 and a dense id in `(node1, node2)` order
//! - Each node gets a NEM id and platform address used by the workload schedulers

pub mod description;
pub mod errors;
pub mod graph;
pub mod link;
pub mod node;
pub mod scenario;

pub use description::{NodeRecord, TopologyDescription};
pub use errors::{Result, TopologyError};
pub use graph::TopologyGraph;
pub use link::{Endpoint, Link, LinkStatus};
pub use node::{NemEntry, NemId, Node};
pub use scenario::initial_pathloss;
