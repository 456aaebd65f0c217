//! Simulation and wall-clock time.
//!
//! Simulated time is continuous seconds held in a [`SimTime`] newtype with a
//! total order, so it can key the event queue directly. The [`Clock`] pairs
//! the current/end simulated times with an optional real-time pacing source:
//! in constructive mode time jumps straight to the next due event, in
//! real-time mode the advance is constrained by (scaled) elapsed wall time.
//!
//! "Flexible" real time never blocks the caller; it only records how far the
//! simulation has fallen behind via [`Clock::time_behind`].

use std::time::Instant;

// ---------------------------------------------------------------------------
// SimTime
// ---------------------------------------------------------------------------

/// A point in simulated time, in seconds since the start of the run.
///
/// Ordering is total (`f64::total_cmp`) so values can live in ordered
/// collections; hashing goes through the raw bit pattern for consistency.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct SimTime(f64);

impl SimTime {
    /// Time zero, the start of the run.
    pub const ZERO: SimTime = SimTime(0.0);

    /// The latest representable time. Used as the default end time.
    pub const MAX: SimTime = SimTime(f64::MAX);

    /// Construct from seconds.
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// The value in seconds.
    pub fn secs(self) -> f64 {
        self.0
    }

    /// This time offset forward by `secs` seconds.
    pub fn offset(self, secs: f64) -> Self {
        Self(self.0 + secs)
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0).is_eq()
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::hash::Hash for SimTime {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

// ---------------------------------------------------------------------------
// WallClock
// ---------------------------------------------------------------------------

/// A monotonic real-world clock measuring seconds since creation (or the
/// last reset).
#[derive(Debug, Clone)]
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed wall-clock seconds.
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Restart the measurement from now.
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// How the simulation clock relates to wall-clock time. Chosen at scenario
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ClockMode {
    /// As fast as possible: time jumps to the next due event.
    Constructive,

    /// Paced against elapsed wall time scaled by the clock rate. With
    /// `flexible` set, a slow host is allowed to proceed anyway and the
    /// drift is only reported, never enforced.
    Realtime { flexible: bool },
}

/// The simulation clock: current time, end time, and the pacing source.
///
/// Pausing stops the underlying clock source; while stopped, the constrained
/// advance target is frozen at the current time.
#[derive(Debug)]
pub struct Clock {
    mode: ClockMode,
    current: SimTime,
    end: SimTime,
    rate: f64,
    wall: WallClock,
    stopped: bool,
    /// Simulated seconds accumulated up to the last start/stop/rate re-base.
    base_sim: f64,
    /// Wall seconds at the last re-base.
    base_wall: f64,
    time_behind: f64,
}

impl Clock {
    pub fn new(mode: ClockMode, rate: f64, end: SimTime) -> Self {
        Self {
            mode,
            current: SimTime::ZERO,
            end,
            rate,
            wall: WallClock::new(),
            stopped: true,
            base_sim: 0.0,
            base_wall: 0.0,
            time_behind: 0.0,
        }
    }

    /// The last time to which the simulation was advanced.
    pub fn current(&self) -> SimTime {
        self.current
    }

    /// The defined end time of the run.
    pub fn end_time(&self) -> SimTime {
        self.end
    }

    /// Set the end time, clamped at zero.
    pub fn set_end_time(&mut self, end: SimTime) {
        self.end = SimTime::from_secs(end.secs().max(0.0));
    }

    /// Elapsed wall-clock seconds since clock creation.
    pub fn wall_time(&self) -> f64 {
        self.wall.elapsed()
    }

    /// The ratio of simulated time to wall time used in real-time mode.
    pub fn clock_rate(&self) -> f64 {
        self.rate
    }

    /// Change the clock rate, re-basing the real-time reference so already
    /// elapsed time keeps its old scale.
    pub fn set_clock_rate(&mut self, rate: f64) {
        self.base_sim = self.realtime_now();
        self.base_wall = self.wall.elapsed();
        self.rate = rate;
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop the clock source. The paced time freezes at its current value.
    pub fn stop(&mut self) {
        if !self.stopped {
            self.base_sim = self.realtime_now();
            self.stopped = true;
        }
    }

    /// (Re)start the clock source.
    pub fn start(&mut self) {
        if self.stopped {
            self.base_wall = self.wall.elapsed();
            self.stopped = false;
        }
    }

    /// Rewind to time zero with the clock stopped.
    pub fn reset(&mut self) {
        self.current = SimTime::ZERO;
        self.base_sim = 0.0;
        self.base_wall = self.wall.elapsed();
        self.stopped = true;
        self.time_behind = 0.0;
    }

    /// The paced simulated time implied by elapsed wall time and the rate.
    fn realtime_now(&self) -> f64 {
        if self.stopped {
            self.base_sim
        } else {
            self.base_sim + self.rate * (self.wall.elapsed() - self.base_wall)
        }
    }

    /// Constrain a requested advance target by the pacing source and record
    /// the drift. The result never moves backwards.
    pub fn constrain(&mut self, target: SimTime) -> SimTime {
        let constrained = match self.mode {
            ClockMode::Constructive => {
                if self.stopped { self.current } else { target }
            }
            ClockMode::Realtime { flexible } => {
                let paced = self.realtime_now();
                self.time_behind = (paced - target.secs()).max(0.0);
                if flexible {
                    if self.stopped { self.current } else { target }
                } else {
                    SimTime::from_secs(target.secs().min(paced))
                }
            }
        };
        constrained.max(self.current)
    }

    /// Advance the current time. Never moves backwards.
    pub fn advance_to(&mut self, time: SimTime) {
        self.current = self.current.max(time);
    }

    /// Whether the caller should execute work due at `next_due` yet.
    ///
    /// Always true in constructive and flexible real-time modes; in strict
    /// real time, true only once the paced clock has caught up.
    pub fn should_execute(&self, next_due: SimTime) -> bool {
        if self.stopped {
            return false;
        }
        match self.mode {
            ClockMode::Constructive => true,
            ClockMode::Realtime { flexible: true } => true,
            ClockMode::Realtime { flexible: false } => self.realtime_now() >= next_due.secs(),
        }
    }

    /// How many seconds the simulation clock is behind the paced clock.
    /// Zero when not running behind (or not in real-time mode).
    pub fn time_behind(&self) -> f64 {
        self.time_behind
    }
}

// ===========================================================================
// Tests
// ===========================================================================
