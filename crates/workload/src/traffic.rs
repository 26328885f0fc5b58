//! Batch generation of per-node traffic schedules
//!
//! Nodes with an even NEM id are sinks and listen on the traffic port for the
//! whole experiment. Odd nodes are sources: for each epoch of the arrival
//! distribution they open periodic UDP flows towards random sinks until the
//! epoch duration is used up. Every flow gets a run-wide unique id.

use crate::distribution::{DistributionSampler, DistributionSpec};
use crate::errors::{ConfigError, TrafficError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use topology::{NemEntry, NemId};
use tracing::{debug, info, warn};

pub const SCHEDULE_FILE_NAME: &str = "mgen.in";

fn default_packet_size() -> u32 {
    600
}

fn default_port() -> u16 {
    5001
}

fn default_scale() -> f64 {
    1024.0
}

/// Traffic class configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSpec {
    /// Inter-arrival time between flows, seconds
    pub arrival: DistributionSpec,
    /// Flow bandwidth, kbit/s
    pub bandwidth: DistributionSpec,
    /// Flow size, KB
    pub flow_size: DistributionSpec,
    /// Bytes per packet
    #[serde(default = "default_packet_size")]
    pub packet_size: u32,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Unit multiplier applied to bandwidth and flow size
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl TrafficSpec {
    pub fn new(
        arrival: DistributionSpec,
        bandwidth: DistributionSpec,
        flow_size: DistributionSpec,
    ) -> Self {
        Self {
            arrival,
            bandwidth,
            flow_size,
            packet_size: default_packet_size(),
            port: default_port(),
            scale: default_scale(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficRole {
    Source,
    Sink,
}

impl TrafficRole {
    pub fn of(nem_id: NemId) -> Self {
        if nem_id % 2 == 0 {
            TrafficRole::Sink
        } else {
            TrafficRole::Source
        }
    }
}

/// One periodic flow of a source node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowScheduleEntry {
    pub flow_id: u64,
    pub start_time: f64,
    pub stop_time: f64,
    pub destination: Ipv4Addr,
    /// Packets per second
    pub rate: u64,
    pub packet_size: u32,
}

/// A line of a schedule file
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleLine {
    Listen { time: f64, port: u16 },
    Ignore { time: f64, port: u16 },
    On { port: u16, flow: FlowScheduleEntry },
    Off { time: f64, flow_id: u64 },
}

impl ScheduleLine {
    pub fn time(&self) -> f64 {
        match self {
            ScheduleLine::Listen { time, .. }
            | ScheduleLine::Ignore { time, .. }
            | ScheduleLine::Off { time, .. } => *time,
            ScheduleLine::On { flow, .. } => flow.start_time,
        }
    }
}

impl fmt::Display for ScheduleLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleLine::Listen { time, port } => write!(f, "{:.2} LISTEN UDP {}", time, port),
            ScheduleLine::Ignore { time, port } => write!(f, "{:.2} IGNORE UDP {}", time, port),
            ScheduleLine::On { port, flow } => write!(
                f,
                "{:.2} ON {} UDP SRC {} DST {}/{} PERIODIC [{} {}]",
                flow.start_time,
                flow.flow_id,
                port,
                flow.destination,
                port,
                flow.rate,
                flow.packet_size
            ),
            ScheduleLine::Off { time, flow_id } => write!(f, "{:.2} OFF {}", time, flow_id),
        }
    }
}

/// Schedule of one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSchedule {
    pub node: String,
    pub nem_id: NemId,
    pub role: TrafficRole,
    pub port: u16,
    /// Sinks only: when listening stops
    pub listen_until: Option<f64>,
    /// Sources only, in start order
    pub flows: Vec<FlowScheduleEntry>,
}

impl NodeSchedule {
    /// Lines in file order; every OFF follows its ON
    pub fn lines(&self) -> Vec<ScheduleLine> {
        let mut lines = Vec::with_capacity(self.flows.len() * 2 + 2);
        if let Some(until) = self.listen_until {
            lines.push(ScheduleLine::Listen {
                time: 0.0,
                port: self.port,
            });
            lines.push(ScheduleLine::Ignore {
                time: until,
                port: self.port,
            });
        }
        for flow in &self.flows {
            lines.push(ScheduleLine::On {
                port: self.port,
                flow: flow.clone(),
            });
            lines.push(ScheduleLine::Off {
                time: flow.stop_time,
                flow_id: flow.flow_id,
            });
        }
        lines
    }

    pub fn render(&self) -> String {
        self.lines()
            .iter()
            .map(|line| format!("{}\n", line))
            .collect()
    }
}

/// Schedules of every node, in registry order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficPlan {
    pub schedules: Vec<NodeSchedule>,
}

impl TrafficPlan {
    pub fn schedule(&self, node: &str) -> Option<&NodeSchedule> {
        self.schedules.iter().find(|s| s.node == node)
    }

    pub fn flow_count(&self) -> usize {
        self.schedules.iter().map(|s| s.flows.len()).sum()
    }

    /// Write `<dir>/<node>/mgen.in` for every node
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, TrafficError> {
        let dir = dir.as_ref();
        let mut written = Vec::with_capacity(self.schedules.len());

        for schedule in &self.schedules {
            let node_dir = dir.join(&schedule.node);
            fs::create_dir_all(&node_dir)?;
            let path = node_dir.join(SCHEDULE_FILE_NAME);
            fs::write(&path, schedule.render())?;
            written.push(path);
        }

        info!(
            "Traffic schedules for {} nodes written to {}",
            written.len(),
            dir.display()
        );
        Ok(written)
    }
}

pub struct TrafficScheduleGenerator {
    spec: TrafficSpec,
    duration: f64,
    arrival: DistributionSampler,
    bandwidth: DistributionSampler,
    flow_size: DistributionSampler,
    rng: StdRng,
}

impl TrafficScheduleGenerator {
    /// Samplers are seeded from `rng` so one seed fixes the whole plan
    pub fn new(spec: TrafficSpec, duration: f64, mut rng: StdRng) -> Result<Self, ConfigError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(ConfigError::InvalidParameter(format!("duration {}", duration)));
        }
        if spec.packet_size == 0 {
            return Err(ConfigError::InvalidParameter("packet_size 0".to_string()));
        }
        if !spec.scale.is_finite() || spec.scale <= 0.0 {
            return Err(ConfigError::InvalidParameter(format!("scale {}", spec.scale)));
        }

        let arrival =
            DistributionSampler::with_rng(&spec.arrival, StdRng::seed_from_u64(rng.gen()))?;
        if arrival.epoch_limit().is_none() {
            return Err(ConfigError::UnboundedArrival);
        }

        let mut bandwidth =
            DistributionSampler::with_rng(&spec.bandwidth, StdRng::seed_from_u64(rng.gen()))?;
        let mut flow_size =
            DistributionSampler::with_rng(&spec.flow_size, StdRng::seed_from_u64(rng.gen()))?;
        // Both stay in their first epoch for the whole run
        bandwidth.start_next_epoch();
        flow_size.start_next_epoch();

        Ok(Self {
            spec,
            duration,
            arrival,
            bandwidth,
            flow_size,
            rng,
        })
    }

    /// Epochs of the arrival process
    pub fn epoch_count(&self) -> usize {
        self.arrival.epoch_limit().unwrap_or(0)
    }

    /// Sinks keep listening one extra epoch past the last flow start
    pub fn listen_until(&self) -> f64 {
        self.duration * (self.epoch_count() + 1) as f64
    }

    pub fn generate(&mut self, nodes: &[NemEntry]) -> Result<TrafficPlan, TrafficError> {
        let sinks: Vec<&NemEntry> = nodes
            .iter()
            .filter(|n| TrafficRole::of(n.nem_id) == TrafficRole::Sink)
            .collect();

        let mut flow_id = 0u64;
        let mut schedules = Vec::with_capacity(nodes.len());

        for node in nodes {
            let role = TrafficRole::of(node.nem_id);
            let mut schedule = NodeSchedule {
                node: node.name.clone(),
                nem_id: node.nem_id,
                role,
                port: self.spec.port,
                listen_until: None,
                flows: Vec::new(),
            };

            match role {
                TrafficRole::Sink => schedule.listen_until = Some(self.listen_until()),
                TrafficRole::Source => {
                    schedule.flows = self.source_flows(node, &sinks, &mut flow_id)?;
                }
            }

            debug!(
                "{} ({:?}): {} flows",
                schedule.node,
                schedule.role,
                schedule.flows.len()
            );
            schedules.push(schedule);
        }

        info!(
            "Generated {} flows across {} nodes",
            flow_id,
            schedules.len()
        );
        Ok(TrafficPlan { schedules })
    }

    fn source_flows(
        &mut self,
        node: &NemEntry,
        sinks: &[&NemEntry],
        flow_id: &mut u64,
    ) -> Result<Vec<FlowScheduleEntry>, TrafficError> {
        let mut flows = Vec::new();
        let mut current_time = 0.0;

        self.arrival.rewind();
        while self.arrival.start_next_epoch() {
            let mut simulation_time = 0.0;
            loop {
                let next = self.arrival.sample_delay()?;
                current_time += next;
                simulation_time += next;
                if simulation_time > self.duration {
                    break;
                }

                let destination = sinks
                    .iter()
                    .filter(|sink| sink.nem_id != node.nem_id)
                    .collect::<Vec<_>>()
                    .choose(&mut self.rng)
                    .map(|sink| sink.address)
                    .ok_or_else(|| TrafficError::NoSink(node.name.clone()))?;

                let bandwidth = self.bandwidth.sample()?;
                let rate = self.rate(bandwidth);
                let size = self.flow_size.sample()?;
                if size <= 0.0 {
                    return Err(TrafficError::NonPositiveFlowSize(size));
                }
                let stop_time =
                    size * self.spec.scale / (rate as f64 * self.spec.packet_size as f64);

                *flow_id += 1;
                flows.push(FlowScheduleEntry {
                    flow_id: *flow_id,
                    start_time: current_time,
                    stop_time: current_time + stop_time,
                    destination,
                    rate,
                    packet_size: self.spec.packet_size,
                });
            }
        }

        Ok(flows)
    }

    /// Packets per second for a bandwidth, truncated and at least 1
    fn rate(&self, bandwidth: f64) -> u64 {
        let packet_bits = self.spec.packet_size as f64 * 8.0;
        let rate = (bandwidth * self.spec.scale / packet_bits).floor();
        if rate < 1.0 {
            warn!("Bandwidth {} gives under one packet per second, using 1", bandwidth);
            1
        } else {
            rate as u64
        }
    }
}
