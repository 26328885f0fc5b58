//! Paced link quality updates
//!
//! Each epoch of the link-update distribution is replayed in wall-clock time:
//! draw an inter-event delay, pause for it, and if the epoch has not run past
//! its duration toggle the attenuation between two random nodes. Every toggle
//! is published once per direction with the same attenuation.

use crate::distribution::DistributionSampler;
use crate::errors::{ConfigError, SamplingError, ScheduleError};
use crate::pacing::{Pace, Pacer};
use crate::transport::EventSink;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use topology::{NemEntry, NemId};
use tracing::{debug, info};

pub const LINK_UP_DB: f64 = 0.0;
pub const LINK_DOWN_DB: f64 = 200.0;
pub const UNIFORM_MAX_DB: f64 = 100.0;

/// Directed pathloss update: `node_a` now sees `node_b` at `attenuation_db`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEvent {
    pub epoch: usize,
    /// Seconds since the epoch started
    pub time_offset: f64,
    pub node_a: NemId,
    pub node_b: NemId,
    pub attenuation_db: f64,
}

/// How attenuation values are drawn for a toggle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttenuationMode {
    /// Link up (0 dB) or down (200 dB) with equal probability
    #[default]
    Binary,
    /// Uniform in [0, 100) dB
    Uniform,
}

impl AttenuationMode {
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            AttenuationMode::Binary => {
                if rng.gen_bool(0.5) {
                    LINK_UP_DB
                } else {
                    LINK_DOWN_DB
                }
            }
            AttenuationMode::Uniform => rng.gen_range(0.0..UNIFORM_MAX_DB),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running { epoch: usize },
    Finished,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventRunSummary {
    /// Epochs that ran to completion
    pub epochs: usize,
    /// Bidirectional toggles, each published as two events
    pub updates: usize,
    pub cancelled: bool,
}

pub struct LinkEventScheduler<P: Pacer, S: EventSink> {
    nodes: Vec<NemEntry>,
    sampler: DistributionSampler,
    duration: f64,
    attenuation: AttenuationMode,
    pacer: P,
    sink: S,
    rng: StdRng,
    state: SchedulerState,
}

impl<P: Pacer, S: EventSink> LinkEventScheduler<P, S> {
    pub fn new(
        nodes: Vec<NemEntry>,
        sampler: DistributionSampler,
        duration: f64,
        pacer: P,
        sink: S,
    ) -> Result<Self, ScheduleError> {
        if nodes.len() < 2 {
            return Err(ScheduleError::NotEnoughNodes(nodes.len()));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(ConfigError::InvalidParameter(format!("duration {}", duration)).into());
        }

        Ok(Self {
            nodes,
            sampler,
            duration,
            attenuation: AttenuationMode::default(),
            pacer,
            sink,
            rng: StdRng::from_entropy(),
            state: SchedulerState::Idle,
        })
    }

    pub fn with_attenuation(mut self, attenuation: AttenuationMode) -> Self {
        self.attenuation = attenuation;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    pub fn into_parts(self) -> (P, S) {
        (self.pacer, self.sink)
    }

    /// Run every epoch of the link-update distribution
    ///
    /// Returns early with `cancelled` set when the pacer is interrupted; the
    /// interrupted wait never produces an event.
    pub fn run(&mut self) -> Result<EventRunSummary, ScheduleError> {
        let mut summary = EventRunSummary::default();

        while self.sampler.start_next_epoch() {
            let epoch = summary.epochs;
            self.state = SchedulerState::Running { epoch };
            info!("Starting link update epoch {}", epoch);

            let mut elapsed = 0.0;
            loop {
                let delta = self.sampler.sample_delay()?;
                let delay =
                    Duration::try_from_secs_f64(delta).map_err(|_| SamplingError::InvalidDelay(delta))?;

                if self.pacer.pause(delay) == Pace::Cancelled {
                    info!(
                        "Link updates cancelled in epoch {} after {} updates",
                        epoch, summary.updates
                    );
                    self.state = SchedulerState::Idle;
                    summary.cancelled = true;
                    return Ok(summary);
                }

                elapsed += delta;
                if elapsed > self.duration {
                    break;
                }

                self.toggle(epoch, elapsed)?;
                summary.updates += 1;
            }

            self.state = SchedulerState::Idle;
            summary.epochs += 1;
            info!("Link update epoch {} finished", epoch);
        }

        self.state = SchedulerState::Finished;
        Ok(summary)
    }

    fn toggle(&mut self, epoch: usize, time_offset: f64) -> Result<(), ScheduleError> {
        let picked = rand::seq::index::sample(&mut self.rng, self.nodes.len(), 2);
        let a = self.nodes[picked.index(0)].nem_id;
        let b = self.nodes[picked.index(1)].nem_id;
        let db = self.attenuation.draw(&mut self.rng);

        debug!(
            "New pathloss update at {:.2}: nem:{} nem:{} {}",
            time_offset, a, b, db
        );

        for (node_a, node_b) in [(a, b), (b, a)] {
            self.sink.publish(&LinkEvent {
                epoch,
                time_offset,
                node_a,
                node_b,
                attenuation_db: db,
            })?;
        }
        Ok(())
    }
}
