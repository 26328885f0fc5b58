//! Declarative distributions and epoch-aware samplers
//!
//! A distribution is configured as one of
//!
//! ```yaml
//! exponential: { beta: { min: 1, max: 4, increase_by: 1 } }   # one epoch per beta
//! single: { elements: { interval: [5, 10, 15] } }             # uniform choice
//! single: { interval: [5, 10, 15] }                           # same, inline form
//! ```
//!
//! Value sets are either an explicit `interval` list or a half-open integer
//! range `min..max` stepping by `increase_by`. An epoch is one pass of an
//! experiment; exponential samplers draw from the beta of the current epoch.

use crate::errors::{ConfigError, SamplingError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// An ordered set of numbers, explicit or generated from a range
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increase_by: Option<i64>,
}

impl ValueSetSpec {
    pub fn interval(values: impl Into<Vec<f64>>) -> Self {
        Self {
            interval: Some(values.into()),
            ..Self::default()
        }
    }

    pub fn range(min: i64, max: i64, increase_by: i64) -> Self {
        Self {
            interval: None,
            min: Some(min),
            max: Some(max),
            increase_by: Some(increase_by),
        }
    }

    fn is_unset(&self) -> bool {
        self.interval.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.increase_by.is_none()
    }

    /// Expand into the ordered sequence of values
    pub fn resolve(&self) -> Result<Vec<f64>, ConfigError> {
        if let Some(values) = &self.interval {
            return Ok(values.clone());
        }

        let Some(min) = self.min else {
            return Err(if self.is_unset() {
                ConfigError::NoValueSet
            } else {
                ConfigError::RangeWithoutStep
            });
        };
        let max = self.max.ok_or(ConfigError::MinWithoutMax)?;
        let step = self.increase_by.ok_or(ConfigError::RangeWithoutStep)?;
        if step == 0 {
            return Err(ConfigError::ZeroStep);
        }

        let mut values = Vec::new();
        let mut value = min;
        while (step > 0 && value < max) || (step < 0 && value > max) {
            values.push(value as f64);
            value += step;
        }
        Ok(values)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExponentialSpec {
    /// Mean inter-event time per epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<ValueSetSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SingleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<ValueSetSpec>,
    /// Value set written directly under `single`
    #[serde(flatten)]
    pub inline: ValueSetSpec,
}

/// Distribution configuration; `exponential` wins if both kinds are present
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exponential: Option<ExponentialSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single: Option<SingleSpec>,
    /// Presence of this key, whatever its value, makes the epoch count unbounded
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_limited: Option<serde_json::Value>,
}

// Any value, `null` included, counts once the key is written
fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl DistributionSpec {
    pub fn exponential(beta: ValueSetSpec) -> Self {
        Self {
            exponential: Some(ExponentialSpec { beta: Some(beta) }),
            ..Self::default()
        }
    }

    pub fn single(elements: ValueSetSpec) -> Self {
        Self {
            single: Some(SingleSpec {
                elements: Some(elements),
                inline: ValueSetSpec::default(),
            }),
            ..Self::default()
        }
    }

    /// Mark the epoch count as unbounded
    pub fn unlimited(mut self) -> Self {
        self.is_limited = Some(serde_json::Value::Bool(true));
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.is_limited.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Law {
    Exponential { betas: Vec<f64> },
    Single { elements: Vec<f64> },
}

/// Repeatable sampling function with an epoch counter
#[derive(Debug)]
pub struct DistributionSampler {
    law: Law,
    epoch: Option<usize>,
    /// `None` means unbounded
    epoch_limit: Option<usize>,
    rng: StdRng,
}

impl DistributionSampler {
    pub fn new(spec: &DistributionSpec) -> Result<Self, ConfigError> {
        Self::with_rng(spec, StdRng::from_entropy())
    }

    pub fn with_seed(spec: &DistributionSpec, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(spec, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(spec: &DistributionSpec, rng: StdRng) -> Result<Self, ConfigError> {
        let law = if let Some(exponential) = &spec.exponential {
            let betas = exponential
                .beta
                .as_ref()
                .ok_or(ConfigError::MissingBeta)?
                .resolve()?;
            Law::Exponential { betas }
        } else if let Some(single) = &spec.single {
            let elements = match &single.elements {
                Some(elements) => elements.resolve()?,
                None if !single.inline.is_unset() => single.inline.resolve()?,
                None => return Err(ConfigError::MissingElements),
            };
            Law::Single { elements }
        } else {
            return Err(ConfigError::UnknownDistribution);
        };

        let values = match &law {
            Law::Exponential { betas } => betas.len(),
            Law::Single { elements } => elements.len(),
        };
        if values == 0 {
            return Err(ConfigError::EmptyResolution);
        }

        let epoch_limit = if spec.is_unbounded() {
            warn!("is_limited is set, distribution epochs are unbounded");
            None
        } else {
            Some(values)
        };

        Ok(Self {
            law,
            epoch: None,
            epoch_limit,
            rng,
        })
    }

    /// Advance to the next epoch; false once the epochs are exhausted
    pub fn start_next_epoch(&mut self) -> bool {
        let next = self.epoch.map_or(0, |epoch| epoch + 1);
        match self.epoch_limit {
            Some(limit) if next >= limit => false,
            _ => {
                self.epoch = Some(next);
                true
            }
        }
    }

    /// Go back to before the first epoch
    pub fn rewind(&mut self) {
        self.epoch = None;
    }

    pub fn current_epoch(&self) -> Option<usize> {
        self.epoch
    }

    pub fn epoch_limit(&self) -> Option<usize> {
        self.epoch_limit
    }

    pub fn kind(&self) -> &'static str {
        match self.law {
            Law::Exponential { .. } => "exponential",
            Law::Single { .. } => "single",
        }
    }

    /// Draw a wait time; only finite, strictly positive values advance a clock
    pub fn sample_delay(&mut self) -> Result<f64, SamplingError> {
        let delay = self.sample()?;
        if delay > 0.0 && delay.is_finite() {
            Ok(delay)
        } else {
            Err(SamplingError::InvalidDelay(delay))
        }
    }

    pub fn sample(&mut self) -> Result<f64, SamplingError> {
        match &self.law {
            Law::Exponential { betas } => {
                let epoch = self.epoch.ok_or(SamplingError::NoActiveEpoch)?;
                let beta = *betas.get(epoch).ok_or(SamplingError::EpochOutOfRange {
                    epoch,
                    bound: betas.len(),
                })?;
                let exp = Exp::new(1.0 / beta).map_err(|e| {
                    SamplingError::InvalidParameter(format!("beta {}: {}", beta, e))
                })?;
                Ok(exp.sample(&mut self.rng))
            }
            Law::Single { elements } => {
                let pick = self.rng.gen_range(0..elements.len());
                Ok(elements[pick])
            }
        }
    }
}
