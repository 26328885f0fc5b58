//! Emulated nodes and their derived platform identity

use serde::Serialize;
use std::net::Ipv4Addr;

/// Bootstrap executable used when the topology does not name one
pub const DEFAULT_BOOTSTRAP: &str = "/bootstrap/start.sh";

/// Derived AS numbers start here (`AS_NUMBER_BASE + index`)
pub const AS_NUMBER_BASE: u32 = 1000;

/// Platform addresses live in 10.100.0.0/24, one host per node
pub const PLATFORM_CAPACITY: usize = 254;

/// Per-node telemetry listener ports start here (`TELEMETRY_BASE_PORT + index`)
pub const TELEMETRY_BASE_PORT: u16 = 20000;

/// Network emulation module identifier, `index + 1`
pub type NemId = u16;

/// An emulated node
///
/// Nodes are created once by [`crate::TopologyGraph::build`] and only their
/// incident link list grows afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    pub name: String,
    /// Owning administrative domain
    pub domain: String,
    /// Dense rank of the name among all node names
    pub index: usize,
    pub as_number: u32,
    /// Neighbor names exactly as declared
    pub neighbors: Vec<String>,
    pub is_border: bool,
    pub bootstrap: String,
    links: Vec<usize>,
}

impl Node {
    pub(crate) fn new(
        name: String,
        domain: String,
        index: usize,
        as_number: Option<u32>,
        neighbors: Vec<String>,
        is_border: bool,
        bootstrap: Option<String>,
    ) -> Self {
        Self {
            name,
            domain,
            index,
            as_number: as_number.unwrap_or(AS_NUMBER_BASE + index as u32),
            neighbors,
            is_border,
            bootstrap: bootstrap.unwrap_or_else(|| DEFAULT_BOOTSTRAP.to_string()),
            links: Vec::new(),
        }
    }

    /// Ids of incident links, in the order the links were created
    pub fn links(&self) -> &[usize] {
        &self.links
    }

    pub(crate) fn links_mut(&mut self) -> &mut Vec<usize> {
        &mut self.links
    }

    pub fn nem_id(&self) -> NemId {
        (self.index + 1) as NemId
    }

    /// Address on the shared emulation control network
    pub fn platform_address(&self) -> Ipv4Addr {
        Ipv4Addr::new(10, 100, 0, (self.index + 1) as u8)
    }

    pub fn mac_address(&self) -> String {
        format!("02:00:{:02x}:01:00:01", self.index + 1)
    }

    pub fn telemetry_port(&self) -> u16 {
        TELEMETRY_BASE_PORT + self.index as u16
    }

    pub fn registry_entry(&self) -> NemEntry {
        NemEntry {
            name: self.name.clone(),
            index: self.index,
            nem_id: self.nem_id(),
            address: self.platform_address(),
        }
    }
}

/// Read-only view of a node handed to the workload schedulers
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct NemEntry {
    pub name: String,
    pub index: usize,
    pub nem_id: NemId,
    pub address: Ipv4Addr,
}
