//! Error types for topology loading and graph construction

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON topology: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed YAML topology: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Topology declares no nodes")]
    EmptyTopology,

    #[error("Duplicate node name '{name}' (declared in domains '{first}' and '{second}')")]
    DuplicateNode {
        name: String,
        first: String,
        second: String,
    },

    #[error("Node '{node}' lists unknown neighbor '{neighbor}'")]
    UnknownNeighbor { node: String, neighbor: String },

    #[error("Node '{0}' lists itself as a neighbor")]
    SelfNeighbor(String),

    #[error("Invalid interface address '{0}'")]
    InvalidAddress(String),

    #[error("Address space exhausted: {count} {what} exceed capacity of {capacity}")]
    AddressSpaceExhausted {
        what: &'static str,
        count: usize,
        capacity: usize,
    },
}

pub type Result<T> = std::result::Result<T, TopologyError>;
