//! Workload generation for EMANE experiments
//!
//! Two schedulers consume the read-only node registry of a topology:
//! - [`LinkEventScheduler`] replays link-update epochs in wall-clock time and
//!   publishes pathloss toggles to the event service
//! - [`TrafficScheduleGenerator`] computes per-node traffic schedule files up
//!   front
//!
//! Both draw from [`DistributionSampler`]s built from declarative
//! [`DistributionSpec`]s, and all randomness is injectable for reproducible runs.

pub mod distribution;
pub mod errors;
pub mod events;
pub mod pacing;
pub mod traffic;
pub mod transport;

pub use distribution::{
    DistributionSampler, DistributionSpec, ExponentialSpec, SingleSpec, ValueSetSpec,
};
pub use errors::{ConfigError, SamplingError, ScheduleError, TrafficError, TransportError};
pub use events::{AttenuationMode, EventRunSummary, LinkEvent, LinkEventScheduler, SchedulerState};
pub use pacing::{InstantPacer, Pace, Pacer, RealTimePacer, StopSignal};
pub use traffic::{
    FlowScheduleEntry, NodeSchedule, ScheduleLine, TrafficPlan, TrafficRole,
    TrafficScheduleGenerator, TrafficSpec,
};
pub use transport::{EventServiceConfig, EventSink, LogSink, MulticastPublisher, RecordingSink};
