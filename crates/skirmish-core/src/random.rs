//! Random streams and unique-id issue.
//!
//! The kernel carries two independent deterministic random streams: the
//! simulation stream for core model behavior and the script stream for
//! user-scripted draws, so scripting noise never perturbs core physics.
//! Each stream is a seeded ChaCha8 generator behind its own re-entrant
//! lock; a caller that re-enters (an event handler drawing inside a
//! notification callback, say) does not deadlock against itself.
//!
//! Unique ids come from a shared atomic counter, first id 1, never reused.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp, Normal};

// ---------------------------------------------------------------------------
// RandomStream
// ---------------------------------------------------------------------------

/// A seeded deterministic random stream.
pub struct RandomStream {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomStream {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the stream from a new seed.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Uniform draw in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }

    /// Uniform draw in `[low, high)`.
    pub fn uniform_range(&mut self, low: f64, high: f64) -> f64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..high)
    }

    /// Uniform integer draw in `[low, high]`.
    pub fn uniform_int(&mut self, low: i64, high: i64) -> i64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    /// Gaussian draw. A non-positive deviation degenerates to the mean.
    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        match Normal::new(mean, std_dev.max(0.0)) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean,
        }
    }

    /// Exponential draw with the given rate. A non-positive rate
    /// degenerates to zero.
    pub fn exponential(&mut self, lambda: f64) -> f64 {
        match Exp::new(lambda) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }

    /// Weighted coin flip; `p` is clamped to `[0, 1]`.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.uniform() < p.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// SharedServices
// ---------------------------------------------------------------------------

/// Exclusive access to one random stream. Draws go through the guard so the
/// lock is provably held for the duration of the draw.
pub struct StreamGuard<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<RandomStream>>,
}

impl StreamGuard<'_> {
    pub fn uniform(&self) -> f64 {
        self.guard.borrow_mut().uniform()
    }

    pub fn uniform_range(&self, low: f64, high: f64) -> f64 {
        self.guard.borrow_mut().uniform_range(low, high)
    }

    pub fn uniform_int(&self, low: i64, high: i64) -> i64 {
        self.guard.borrow_mut().uniform_int(low, high)
    }

    pub fn normal(&self, mean: f64, std_dev: f64) -> f64 {
        self.guard.borrow_mut().normal(mean, std_dev)
    }

    pub fn exponential(&self, lambda: f64) -> f64 {
        self.guard.borrow_mut().exponential(lambda)
    }

    pub fn bernoulli(&self, p: f64) -> bool {
        self.guard.borrow_mut().bernoulli(p)
    }

    pub fn seed(&self) -> u64 {
        self.guard.borrow().seed()
    }
}

/// The kernel-owned shared services: two locked random streams and the
/// unique-id counter.
pub struct SharedServices {
    simulation_stream: ReentrantMutex<RefCell<RandomStream>>,
    script_stream: ReentrantMutex<RefCell<RandomStream>>,
    next_unique_id: AtomicU64,
}

impl SharedServices {
    pub fn new(simulation_seed: u64, script_seed: u64) -> Self {
        Self {
            simulation_stream: ReentrantMutex::new(RefCell::new(RandomStream::new(
                simulation_seed,
            ))),
            script_stream: ReentrantMutex::new(RefCell::new(RandomStream::new(script_seed))),
            next_unique_id: AtomicU64::new(0),
        }
    }

    /// Lock the simulation stream for drawing.
    pub fn lock_simulation_stream(&self) -> StreamGuard<'_> {
        StreamGuard {
            guard: self.simulation_stream.lock(),
        }
    }

    /// Lock the script stream for drawing.
    pub fn lock_script_stream(&self) -> StreamGuard<'_> {
        StreamGuard {
            guard: self.script_stream.lock(),
        }
    }

    /// Restart both streams. Used at (re)initialization so each run draws a
    /// reproducible sequence.
    pub fn reseed(&self, simulation_seed: u64, script_seed: u64) {
        self.simulation_stream.lock().borrow_mut().reseed(simulation_seed);
        self.script_stream.lock().borrow_mut().reseed(script_seed);
    }

    /// Issue the next unique id. The first id is 1; ids are never reused,
    /// not even across a reset.
    pub fn assign_unique_id(&self) -> u64 {
        self.next_unique_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

// ===========================================================================
// Tests
// ===========================================================================
