//! Declarative topology description
//!
//! A topology file maps each administrative domain to the list of nodes it
//! owns. Files are YAML unless the extension is `.json`.
//!
//! ```yaml
//! nodes:
//!   core:
//!     - name: node-1
//!       neighbors: [node-2]
//!       is_border: true
//!       as_number: 65001
//!     - name: node-2
//!       neighbors: [node-1]
//!       is_border: false
//!       bootstrapfile: /bootstrap/custom.sh
//! ```

use crate::errors::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Complete topology description as read from disk
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyDescription {
    /// Domain name -> nodes declared in that domain
    pub nodes: BTreeMap<String, Vec<NodeRecord>>,
}

/// One node as declared in the topology file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(deserialize_with = "name_string")]
    pub name: String,
    /// Explicit autonomous system number; derived from the index when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_number: Option<u32>,
    #[serde(deserialize_with = "name_list")]
    pub neighbors: Vec<String>,
    pub is_border: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrapfile: Option<String>,
}

impl NodeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            as_number: None,
            neighbors: Vec::new(),
            is_border: false,
            bootstrapfile: None,
        }
    }

    pub fn neighbor(mut self, name: impl Into<String>) -> Self {
        self.neighbors.push(name.into());
        self
    }

    pub fn border(mut self, is_border: bool) -> Self {
        self.is_border = is_border;
        self
    }

    pub fn as_number(mut self, as_number: u32) -> Self {
        self.as_number = Some(as_number);
        self
    }

    pub fn bootstrap(mut self, path: impl Into<String>) -> Self {
        self.bootstrapfile = Some(path.into());
        self
    }
}

impl TopologyDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to a domain, creating the domain if needed
    pub fn add_node(&mut self, domain: impl Into<String>, node: NodeRecord) -> &mut Self {
        self.nodes.entry(domain.into()).or_default().push(node);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a description, choosing the format from the file extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Total number of node records across all domains
    pub fn node_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }
}

// Node names such as `3` are commonly written unquoted in YAML.
#[derive(Deserialize)]
#[serde(untagged)]
enum NodeName {
    Text(String),
    Number(u64),
}

impl NodeName {
    fn into_string(self) -> String {
        match self {
            NodeName::Text(name) => name,
            NodeName::Number(number) => number.to_string(),
        }
    }
}

fn name_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(NodeName::deserialize(deserializer)?.into_string())
}

fn name_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Vec::<NodeName>::deserialize(deserializer)?
        .into_iter()
        .map(NodeName::into_string)
        .collect())
}
