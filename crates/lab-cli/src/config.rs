//! Experiment configuration file
//!
//! YAML or JSON, chosen by extension. Missing sections fall back to defaults
//! so a config may carry only what differs, and command-line flags override
//! the file afterwards.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use workload::{AttenuationMode, DistributionSpec, EventServiceConfig, TrafficSpec};

pub const DEFAULT_CONFIG_FILE: &str = "emane-lab.yaml";

fn default_topology_file() -> PathBuf {
    PathBuf::from("topology.yaml")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("configs")
}

fn default_duration() -> f64 {
    60.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default = "default_topology_file")]
    pub topology_file: PathBuf,
    /// Per-node schedule files land under here
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Seeds every random source when set
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub experiment: Option<ExperimentConfig>,
    #[serde(default)]
    pub event_service: EventServiceConfig,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            topology_file: default_topology_file(),
            output_dir: default_output_dir(),
            seed: None,
            experiment: None,
            event_service: EventServiceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Seconds per epoch
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default)]
    pub attenuation: AttenuationMode,
    #[serde(default)]
    pub link_update: Option<DistributionSpec>,
    #[serde(default)]
    pub traffic: Option<TrafficSpec>,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub topology_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub duration: Option<f64>,
}

impl LabConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let config: Self = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON config {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML config {}", path.display()))?
        };

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path`, or use defaults when the default config file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() && path == Path::new(DEFAULT_CONFIG_FILE) {
            info!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(topology_file) = overrides.topology_file {
            self.topology_file = topology_file;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output_dir = output_dir;
        }
        if overrides.seed.is_some() {
            self.seed = overrides.seed;
        }
        if let Some(duration) = overrides.duration {
            if let Some(experiment) = self.experiment.as_mut() {
                experiment.duration = duration;
            }
        }
    }

    pub fn experiment(&self) -> Result<&ExperimentConfig> {
        match &self.experiment {
            Some(experiment) => Ok(experiment),
            None => bail!("Config has no experiment section"),
        }
    }

    /// Independent random stream per consumer, reproducible when seeded
    pub fn rng_for(&self, stream: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
            None => StdRng::from_entropy(),
        }
    }
}

impl ExperimentConfig {
    pub fn link_update(&self) -> Result<&DistributionSpec> {
        self.link_update
            .as_ref()
            .context("Experiment has no link_update distribution")
    }

    pub fn traffic(&self) -> Result<&TrafficSpec> {
        self.traffic
            .as_ref()
            .context("Experiment has no traffic section")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const SAMPLE: &str = r#"
topology_file: topologies/ring.yaml
seed: 42
experiment:
  enabled: true
  duration: 30
  attenuation: uniform
  link_update: { exponential: { beta: { min: 1, max: 4, increase_by: 1 } } }
  traffic:
    arrival: { exponential: { beta: { interval: [2.0] } } }
    bandwidth: { single: { elements: { interval: [256, 512] } } }
    flow_size: { single: { interval: [100] } }
event_service:
  port: 45800
"#;

    #[test]
    fn test_parse_sample() {
        let config: LabConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.topology_file, PathBuf::from("topologies/ring.yaml"));
        assert_eq!(config.output_dir, PathBuf::from("configs"));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.event_service.port, 45800);
        assert_eq!(config.event_service.interface, "emanenode0");

        let experiment = config.experiment().unwrap();
        assert!(experiment.enabled);
        assert_eq!(experiment.duration, 30.0);
        assert_eq!(experiment.attenuation, AttenuationMode::Uniform);

        let traffic = experiment.traffic().unwrap();
        assert_eq!(traffic.packet_size, 600);
        assert_eq!(traffic.port, 5001);
        assert_eq!(traffic.scale, 1024.0);
    }

    #[test]
    fn test_overrides_win() {
        let mut config: LabConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.apply(Overrides {
            topology_file: Some(PathBuf::from("other.json")),
            output_dir: None,
            seed: Some(7),
            duration: Some(5.0),
        });
        assert_eq!(config.topology_file, PathBuf::from("other.json"));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.experiment().unwrap().duration, 5.0);
    }

    #[test]
    fn test_seeded_streams_are_reproducible() {
        let config = LabConfig {
            seed: Some(1),
            ..LabConfig::default()
        };
        let a: u64 = config.rng_for(0).gen();
        let b: u64 = config.rng_for(0).gen();
        let c: u64 = config.rng_for(1).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_load_explicit_paths() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(LabConfig::load(&missing).is_err());

        let json = dir.path().join("lab.json");
        fs::write(&json, r#"{"topology_file": "t.yaml", "experiment": {"duration": 2}}"#).unwrap();
        let config = LabConfig::load(&json).unwrap();
        let experiment = config.experiment().unwrap();
        assert!(!experiment.enabled);
        assert!(experiment.link_update().is_err());
    }
}
