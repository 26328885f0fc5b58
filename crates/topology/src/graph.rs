//! Topology graph construction
//!
//! Building a graph from a [`TopologyDescription`] is a single synchronous
//! pass; the result is immutable apart from link status flips and can be
//! shared freely between the workload schedulers.

use crate::description::TopologyDescription;
use crate::errors::{Result, TopologyError};
use crate::link::{Link, LinkStatus};
use crate::node::{NemEntry, Node, PLATFORM_CAPACITY};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Nodes keyed by name plus links ordered by `(node1, node2)`
#[derive(Clone, Debug, Serialize)]
pub struct TopologyGraph {
    nodes: BTreeMap<String, Node>,
    links: Vec<Link>,
}

impl TopologyGraph {
    /// Load and build a topology file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let description = TopologyDescription::from_file(path)?;
        let graph = Self::build(&description)?;

        info!(
            "Topology ({}) with {} nodes and {} links is loaded",
            path.display(),
            graph.nodes.len(),
            graph.links.len()
        );
        Ok(graph)
    }

    pub fn build(description: &TopologyDescription) -> Result<Self> {
        // Flatten the domains, rejecting names declared twice
        let mut records = HashMap::new();
        for (domain, domain_nodes) in &description.nodes {
            for record in domain_nodes {
                if let Some((first, _)) = records.insert(record.name.as_str(), (domain, record)) {
                    return Err(TopologyError::DuplicateNode {
                        name: record.name.clone(),
                        first: first.clone(),
                        second: domain.clone(),
                    });
                }
            }
        }

        if records.is_empty() {
            return Err(TopologyError::EmptyTopology);
        }
        if records.len() > PLATFORM_CAPACITY {
            return Err(TopologyError::AddressSpaceExhausted {
                what: "nodes",
                count: records.len(),
                capacity: PLATFORM_CAPACITY,
            });
        }

        let mut names: Vec<&str> = records.keys().copied().collect();
        names.sort_unstable();

        let mut nodes = BTreeMap::new();
        for (index, name) in names.iter().enumerate() {
            let (domain, record) = records[name];
            let node = Node::new(
                record.name.clone(),
                domain.clone(),
                index,
                record.as_number,
                record.neighbors.clone(),
                record.is_border,
                record.bootstrapfile.clone(),
            );
            nodes.insert(record.name.clone(), node);
        }

        let mut links = create_links(&mut nodes)?;

        for link in &mut links {
            if nodes[&link.node1].index > nodes[&link.node2].index {
                link.swap_endpoints();
            }
        }

        links.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        // Provisional ids were array positions; remap them to the sorted rank
        let mut final_ids = vec![0; links.len()];
        for (rank, link) in links.iter_mut().enumerate() {
            final_ids[link.id] = rank;
            link.id = rank;
        }
        for node in nodes.values_mut() {
            for id in node.links_mut().iter_mut() {
                *id = final_ids[*id];
            }
        }

        let graph = Self { nodes, links };
        graph.warn_on_shared_subnets();
        Ok(graph)
    }

    pub fn nodes(&self) -> &BTreeMap<String, Node> {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Nodes in index order (name order)
    pub fn nodes_by_index(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, id: usize) -> Option<&Link> {
        self.links.get(id)
    }

    /// Incident links of `name`, in creation order
    pub fn links_of<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Link> + 'a {
        self.nodes
            .get(name)
            .map(|node| node.links())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.links.get(*id))
    }

    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        self.links_of(a).any(|link| link.connects(a, b))
    }

    /// Flip a link up or down; returns false for an unknown id
    pub fn set_link_status(&mut self, id: usize, status: LinkStatus) -> bool {
        match self.links.get_mut(id) {
            Some(link) => {
                debug!("Link {} ({} - {}) is now {:?}", id, link.node1, link.node2, status);
                link.set_status(status);
                true
            }
            None => false,
        }
    }

    /// Node registry in index order
    pub fn registry(&self) -> Vec<NemEntry> {
        self.nodes.values().map(Node::registry_entry).collect()
    }

    fn warn_on_shared_subnets(&self) {
        let mut seen = HashMap::new();
        for link in &self.links {
            if let Some(other) = seen.insert(link.subnet(), link.id) {
                warn!(
                    "Links {} and {} share subnet {}/{}",
                    other,
                    link.id,
                    link.subnet(),
                    link.mask1
                );
            }
        }
    }
}

/// Create one link per unordered neighbor pair, in node-name order
fn create_links(nodes: &mut BTreeMap<String, Node>) -> Result<Vec<Link>> {
    let mut links: Vec<Link> = Vec::new();
    let mut pairs = HashSet::new();
    let mut incident: Vec<(String, usize)> = Vec::new();

    for node in nodes.values() {
        for neighbor in &node.neighbors {
            let Some(peer) = nodes.get(neighbor) else {
                return Err(TopologyError::UnknownNeighbor {
                    node: node.name.clone(),
                    neighbor: neighbor.clone(),
                });
            };
            if peer.index == node.index {
                return Err(TopologyError::SelfNeighbor(node.name.clone()));
            }

            let pair = (node.index.min(peer.index), node.index.max(peer.index));
            if !pairs.insert(pair) {
                continue;
            }

            let id = links.len();
            links.push(Link::new(node.name.clone(), peer.name.clone(), id)?);
            incident.push((node.name.clone(), id));
            incident.push((peer.name.clone(), id));
        }
    }

    for (name, id) in incident {
        if let Some(node) = nodes.get_mut(&name) {
            node.links_mut().push(id);
        }
    }

    Ok(links)
}
