//! Error types for workload generation

use thiserror::Error;

/// Malformed distribution, traffic or event configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Exponential distribution must have a beta (1/lambda) value")]
    MissingBeta,

    #[error("Single distribution must have an elements value set")]
    MissingElements,

    #[error("min and max must be specified together")]
    MinWithoutMax,

    #[error("min/max specified but increase_by is not specified")]
    RangeWithoutStep,

    #[error("increase_by must not be zero")]
    ZeroStep,

    #[error("Value set needs either an interval list or min/max/increase_by")]
    NoValueSet,

    #[error("Value set resolves to no values")]
    EmptyResolution,

    #[error("Unknown distribution type, expected 'exponential' or 'single'")]
    UnknownDistribution,

    #[error("Arrival distribution must have a bounded number of epochs")]
    UnboundedArrival,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// A sampler was asked for a value it cannot produce
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("No epoch has been started")]
    NoActiveEpoch,

    #[error("Epoch {epoch} is beyond the {bound} resolved values")]
    EpochOutOfRange { epoch: usize, bound: usize },

    #[error("Invalid distribution parameter: {0}")]
    InvalidParameter(String),

    #[error("Sampled delay {0} is not a valid duration")]
    InvalidDelay(f64),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Link events need at least two nodes, topology has {0}")]
    NotEnoughNodes(usize),
}

#[derive(Error, Debug)]
pub enum TrafficError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("No sink node available as destination for '{0}'")]
    NoSink(String),

    #[error("Flow size must be positive, sampled {0}")]
    NonPositiveFlowSize(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
