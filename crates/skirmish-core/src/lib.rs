//! Skirmish Core -- an entity-level discrete-event simulation kernel.
//!
//! This crate provides the scheduling, identity, and notification machinery
//! that an engagement-level simulation is built on: a two-queue event
//! scheduler, a run-state lifecycle, a platform registry with stable
//! never-reused indices, typed observer signals, locked deterministic
//! random streams, and an optional barrier-synchronized parallel update
//! path.
//!
//! # Driving a Run
//!
//! A host constructs a frozen [`scenario::Scenario`], builds one
//! [`sim::Simulation`] per run, and pumps it:
//!
//! ```rust,ignore
//! let scenario = Scenario::builder()
//!     .end_time(SimTime::from_secs(3600.0))
//!     .platform(Platform::new("awacs").with_name("sentry"))
//!     .build()?;
//! let mut sim = Simulation::new(scenario, 1)?;
//! while sim.should_execute() {
//!     sim.initialize()?;
//!     sim.start()?;
//!     while sim.is_active() {
//!         sim.advance_time()?;
//!     }
//!     sim.complete(sim.sim_time());
//! }
//! ```
//!
//! A reset run rewinds the kernel instead of finishing it, so the outer
//! `should_execute` loop picks the rerun up automatically.
//!
//! # Staged Mutation Pattern
//!
//! With the `parallel` feature, per-platform updates fan out over a worker
//! pool. Workers read a [`parallel::KernelView`] and stage
//! [`parallel::KernelRequest`]s; the kernel merges the stages in platform
//! order and applies them sequentially at the barrier, so the result is
//! independent of worker scheduling.
//!
//! # Key Types
//!
//! - [`sim::Simulation`] -- The kernel: lifecycle, dispatch, and the host
//!   API surface.
//! - [`time::SimTime`] / [`time::Clock`] -- Simulated time and its pacing
//!   against the wall clock (constructive, real-time, flexible real-time).
//! - [`event::Event`] -- Work due at a simulated time, kept in `(time,
//!   insertion)` order with soft cancellation.
//! - [`registry::PlatformRegistry`] -- Owns every platform; indices start
//!   at 1 and are never reused, and identity outlives removal.
//! - [`observer::ObserverHub`] -- One typed signal per notification topic,
//!   snapshot-then-iterate publication.
//! - [`random::SharedServices`] -- Two independent seeded streams behind
//!   re-entrant locks, plus the unique-id counter.
//! - [`scenario::Scenario`] -- Frozen run description shared by every run.

pub mod event;
pub mod observer;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod platform;
pub mod random;
pub mod registry;
pub mod scenario;
pub mod sim;
pub mod time;
