//! Scenario definition.
//!
//! A [`Scenario`] is the frozen description of a run: end time, clock mode
//! and rate, stream seeds, worker count, and the input platforms with their
//! creation times. It is built once through [`ScenarioBuilder`], validated
//! at `build`, and shared immutably by every simulation constructed from it,
//! so repeated runs (Monte Carlo iterations, resets) start from identical
//! inputs.

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::time::{ClockMode, SimTime};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("end time {0} is negative")]
    NegativeEndTime(SimTime),
    #[error("clock rate {0} is not positive and finite")]
    InvalidClockRate(f64),
    #[error("platform {name:?} has negative creation time {time}")]
    NegativeCreationTime { name: String, time: SimTime },
    #[error("duplicate input platform name {0:?}")]
    DuplicateName(String),
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// A platform that enters the run at a defined creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPlatform {
    pub platform: Platform,
    pub creation_time: SimTime,
}

/// Immutable run description. Construct via [`Scenario::builder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    end_time: SimTime,
    clock_mode: ClockMode,
    clock_rate: f64,
    simulation_seed: u64,
    script_seed: u64,
    /// Worker threads for the parallel update path; zero disables it.
    worker_threads: usize,
    input_platforms: Vec<InputPlatform>,
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder::new()
    }

    pub fn end_time(&self) -> SimTime {
        self.end_time
    }

    pub fn clock_mode(&self) -> ClockMode {
        self.clock_mode
    }

    pub fn clock_rate(&self) -> f64 {
        self.clock_rate
    }

    pub fn simulation_seed(&self) -> u64 {
        self.simulation_seed
    }

    pub fn script_seed(&self) -> u64 {
        self.script_seed
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn input_platforms(&self) -> &[InputPlatform] {
        &self.input_platforms
    }
}

// ---------------------------------------------------------------------------
// ScenarioBuilder
// ---------------------------------------------------------------------------

/// Builder for [`Scenario`]. Defaults: constructive clock at rate 1, no end
/// time bound, seeds 1, no workers, no platforms.
pub struct ScenarioBuilder {
    end_time: SimTime,
    clock_mode: ClockMode,
    clock_rate: f64,
    simulation_seed: u64,
    script_seed: u64,
    worker_threads: usize,
    input_platforms: Vec<InputPlatform>,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self {
            end_time: SimTime::MAX,
            clock_mode: ClockMode::Constructive,
            clock_rate: 1.0,
            simulation_seed: 1,
            script_seed: 1,
            worker_threads: 0,
            input_platforms: Vec::new(),
        }
    }

    pub fn end_time(mut self, end: SimTime) -> Self {
        self.end_time = end;
        self
    }

    pub fn clock_mode(mut self, mode: ClockMode) -> Self {
        self.clock_mode = mode;
        self
    }

    pub fn clock_rate(mut self, rate: f64) -> Self {
        self.clock_rate = rate;
        self
    }

    pub fn simulation_seed(mut self, seed: u64) -> Self {
        self.simulation_seed = seed;
        self
    }

    pub fn script_seed(mut self, seed: u64) -> Self {
        self.script_seed = seed;
        self
    }

    pub fn worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = workers;
        self
    }

    /// Add a platform that exists from time zero.
    pub fn platform(self, platform: Platform) -> Self {
        self.platform_at(platform, SimTime::ZERO)
    }

    /// Add a platform that enters the run at `creation_time`.
    pub fn platform_at(mut self, platform: Platform, creation_time: SimTime) -> Self {
        self.input_platforms.push(InputPlatform {
            platform,
            creation_time,
        });
        self
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<Scenario, ScenarioError> {
        if self.end_time < SimTime::ZERO {
            return Err(ScenarioError::NegativeEndTime(self.end_time));
        }
        if !self.clock_rate.is_finite() || self.clock_rate <= 0.0 {
            return Err(ScenarioError::InvalidClockRate(self.clock_rate));
        }
        let mut seen = std::collections::HashSet::new();
        for input in &self.input_platforms {
            if input.creation_time < SimTime::ZERO {
                return Err(ScenarioError::NegativeCreationTime {
                    name: input
                        .platform
                        .name()
                        .unwrap_or(input.platform.type_name())
                        .to_string(),
                    time: input.creation_time,
                });
            }
            if let Some(name) = input.platform.name() {
                if !seen.insert(name.to_string()) {
                    return Err(ScenarioError::DuplicateName(name.to_string()));
                }
            }
        }
        Ok(Scenario {
            end_time: self.end_time,
            clock_mode: self.clock_mode,
            clock_rate: self.clock_rate,
            simulation_seed: self.simulation_seed,
            script_seed: self.script_seed,
            worker_threads: self.worker_threads,
            input_platforms: self.input_platforms,
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
