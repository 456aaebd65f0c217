//! The simulation kernel.
//!
//! [`Simulation`] ties the pieces together: the clock, the two event queues
//! (simulated-time and wall-time), the platform registry, the observer hub,
//! and the shared random/id services. A host drives it through a strict
//! lifecycle:
//!
//! ```text
//! PendingInitialize -> Initializing -> PendingStart -> Starting -> Active
//!      ^                                                             |
//!      |            (completion_reason == Reset)                     v
//!      +------------------------- Complete <---------------- PendingComplete
//! ```
//!
//! `advance_time` is the heartbeat while `Active`: it picks the next target
//! time, constrains it by the clock, dispatches due wall and sim events, and
//! applies any reset/termination request at the end of the pass. External
//! completion requests never take effect mid-dispatch.
//!
//! # Key types
//! - [`Simulation`] — the kernel
//! - [`RunState`] — lifecycle state
//! - [`CompletionReason`] — why a run ended
//! - [`CreateError`], [`StartupError`], [`RequestError`] — failure surface

use std::sync::Arc;

use crate::event::{Event, EventDisposition, EventKey, EventQueue, OneShotEvent, WallEventKey};
use crate::observer::{ObserverHub, PartNotice, PlatformNotice, TrackNotice};
#[cfg(feature = "parallel")]
use crate::parallel::{EffectStage, KernelRequest, KernelView, ThreadCoordinator};
use crate::platform::{Platform, PlatformIndex, PlatformState};
use crate::random::{SharedServices, StreamGuard};
use crate::registry::{PlatformRegistry, RegistryError};
use crate::scenario::Scenario;
use crate::time::{Clock, SimTime};

// ---------------------------------------------------------------------------
// States and reasons
// ---------------------------------------------------------------------------

/// Lifecycle state of the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    PendingInitialize,
    Initializing,
    PendingStart,
    Starting,
    Active,
    PendingComplete,
    Complete,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::PendingInitialize => "PendingInitialize",
            RunState::Initializing => "Initializing",
            RunState::PendingStart => "PendingStart",
            RunState::Starting => "Starting",
            RunState::Active => "Active",
            RunState::PendingComplete => "PendingComplete",
            RunState::Complete => "Complete",
        };
        f.write_str(name)
    }
}

/// Why a run ended (or is about to).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// The clock reached the scenario end time.
    EndTimeReached,
    /// A reset was requested; the kernel rewinds for another run.
    Reset,
    /// Termination was requested; the run is final.
    Terminated,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("run number must be at least 1")]
    InvalidRunNumber,
    #[cfg(feature = "parallel")]
    #[error("worker pool construction failed: {0}")]
    Coordinator(#[from] crate::parallel::CoordinatorError),
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("initialize requires PendingInitialize, simulation is {0}")]
    Initialize(RunState),
    #[error("start requires PendingStart, simulation is {0}")]
    Start(RunState),
    #[error("input platform {name:?} could not be added: {source}")]
    InputPlatform {
        name: String,
        source: RegistryError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("requested time {requested} is before current time {current}")]
    InvalidTime {
        requested: SimTime,
        current: SimTime,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("operation requires state {required}, simulation is {actual}")]
    InvalidState {
        required: &'static str,
        actual: RunState,
    },
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// The entity-level simulation kernel for one run of a scenario.
pub struct Simulation {
    scenario: Arc<Scenario>,
    run_number: u32,
    state: RunState,
    completion_reason: Option<CompletionReason>,
    /// Reset/termination request latched during a dispatch pass.
    pending_request: Option<CompletionReason>,
    in_dispatch: bool,
    clock: Clock,
    events: EventQueue,
    wall_events: EventQueue,
    registry: PlatformRegistry,
    observers: ObserverHub,
    services: SharedServices,
    #[cfg(feature = "parallel")]
    coordinator: Option<ThreadCoordinator>,
}

impl Simulation {
    /// Construct a kernel for one run. Run numbers are 1-based; they
    /// perturb the stream seeds so Monte Carlo iterations diverge.
    pub fn new(scenario: impl Into<Arc<Scenario>>, run_number: u32) -> Result<Self, CreateError> {
        let scenario = scenario.into();
        if run_number == 0 {
            return Err(CreateError::InvalidRunNumber);
        }
        let clock = Clock::new(
            scenario.clock_mode(),
            scenario.clock_rate(),
            scenario.end_time(),
        );
        let services = SharedServices::new(scenario.simulation_seed(), scenario.script_seed());
        #[cfg(feature = "parallel")]
        let coordinator = if scenario.worker_threads() > 0 {
            Some(ThreadCoordinator::new(scenario.worker_threads())?)
        } else {
            None
        };
        Ok(Self {
            scenario,
            run_number,
            state: RunState::PendingInitialize,
            completion_reason: None,
            pending_request: None,
            in_dispatch: false,
            clock,
            events: EventQueue::new(),
            wall_events: EventQueue::new(),
            registry: PlatformRegistry::new(),
            observers: ObserverHub::new(),
            services,
            #[cfg(feature = "parallel")]
            coordinator,
        })
    }

    // -- inspection ---------------------------------------------------------

    pub fn scenario(&self) -> &Arc<Scenario> {
        &self.scenario
    }

    pub fn run_number(&self) -> u32 {
        self.run_number
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RunState::Active
    }

    /// Whether the host should run (another) iteration of this kernel.
    ///
    /// True while the kernel is waiting to be initialized, which includes
    /// the rewound state after a reset run completes, so a host can drive
    /// repeated runs with `while sim.should_execute() { ... }`.
    pub fn should_execute(&self) -> bool {
        self.state == RunState::PendingInitialize
    }

    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.completion_reason
    }

    pub fn sim_time(&self) -> SimTime {
        self.clock.current()
    }

    pub fn end_time(&self) -> SimTime {
        self.clock.end_time()
    }

    pub fn set_end_time(&mut self, end: SimTime) {
        self.clock.set_end_time(end);
    }

    /// Elapsed wall-clock seconds since kernel creation.
    pub fn wall_time(&self) -> f64 {
        self.clock.wall_time()
    }

    pub fn clock_rate(&self) -> f64 {
        self.clock.clock_rate()
    }

    /// Change the real-time clock rate and notify observers. Non-positive
    /// or non-finite rates are ignored.
    pub fn set_clock_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            tracing::warn!(rate, "ignoring invalid clock rate");
            return;
        }
        self.clock.set_clock_rate(rate);
        self.observers.simulation_clock_rate_change.publish(&rate);
    }

    /// Seconds of drift behind the paced clock; zero outside real time.
    pub fn time_behind(&self) -> f64 {
        self.clock.time_behind()
    }

    pub fn observers(&self) -> &ObserverHub {
        &self.observers
    }

    // -- lifecycle ----------------------------------------------------------

    /// Move from `PendingInitialize` to `PendingStart`: rewind the clock,
    /// reseed the streams, and stage the scenario's input platforms.
    pub fn initialize(&mut self) -> Result<(), StartupError> {
        if self.state != RunState::PendingInitialize {
            tracing::warn!(state = %self.state, "initialize called out of sequence");
            return Err(StartupError::Initialize(self.state));
        }
        self.set_state(RunState::Initializing);
        self.observers.simulation_initializing.publish(&());

        self.clock.reset();
        self.events.clear();
        self.wall_events.clear();
        self.completion_reason = None;
        self.pending_request = None;

        let offset = u64::from(self.run_number - 1);
        let simulation_seed = self.scenario.simulation_seed().wrapping_add(offset);
        let script_seed = self.scenario.script_seed().wrapping_add(offset);
        self.services.reseed(simulation_seed, script_seed);
        tracing::debug!(
            run = self.run_number,
            simulation_seed,
            script_seed,
            "random streams seeded"
        );

        let scenario = Arc::clone(&self.scenario);
        for input in scenario.input_platforms() {
            let mut platform = input.platform.clone();
            platform.set_creation_time(input.creation_time);
            if input.creation_time > SimTime::ZERO {
                self.events.push(Box::new(OneShotEvent::new(
                    input.creation_time,
                    move |sim: &mut Simulation| {
                        let _ = sim.add_platform_now(platform);
                    },
                )));
            } else if let Err(source) = self.add_platform_now(platform) {
                let name = match &source {
                    RegistryError::DuplicateName(name) => name.clone(),
                    RegistryError::UnknownPlatform(index) => index.to_string(),
                };
                return Err(StartupError::InputPlatform { name, source });
            }
        }

        self.set_state(RunState::PendingStart);
        self.observers.simulation_pending_start.publish(&());
        Ok(())
    }

    /// Move from `PendingStart` to `Active` and start the clock.
    pub fn start(&mut self) -> Result<(), StartupError> {
        if self.state != RunState::PendingStart {
            tracing::warn!(state = %self.state, "start called out of sequence");
            return Err(StartupError::Start(self.state));
        }
        self.set_state(RunState::Starting);
        self.observers.simulation_starting.publish(&());
        self.clock.start();
        self.set_state(RunState::Active);
        tracing::info!(run = self.run_number, "simulation started");
        Ok(())
    }

    /// Advance to the next due event time (or the end time when nothing is
    /// pending) and dispatch everything due. Returns the new current time.
    pub fn advance_time(&mut self) -> Result<SimTime, RequestError> {
        let target = match self.events.next_time() {
            Some(next) if next <= self.clock.end_time() => next,
            _ => self.clock.end_time(),
        };
        self.advance_to_target(target)
    }

    /// Advance to an explicit time, clamped by the end time, dispatching
    /// everything due on the way.
    pub fn advance_time_to(&mut self, time: SimTime) -> Result<SimTime, RequestError> {
        self.advance_to_target(time.min(self.clock.end_time()))
    }

    fn advance_to_target(&mut self, requested: SimTime) -> Result<SimTime, RequestError> {
        if self.state != RunState::Active {
            tracing::warn!(state = %self.state, "advance rejected: simulation is not active");
            return Err(RequestError::InvalidState {
                required: "Active",
                actual: self.state,
            });
        }
        let target = self.clock.constrain(requested);
        self.observers.advance_time.publish(&target);

        // Events run with the clock at their own due time; the clock lands
        // on the pass target afterwards.
        self.in_dispatch = true;
        self.dispatch_wall_events();
        self.dispatch_sim_events(target);
        self.in_dispatch = false;
        self.clock.advance_to(target);

        if let Some(reason) = self.pending_request.take() {
            self.apply_completion_request(reason);
        } else if self.state == RunState::Active
            && target >= self.clock.end_time()
            && self
                .events
                .next_time()
                .is_none_or(|next| next > self.clock.end_time())
        {
            // End of the run: nothing compulsory remains before the bound.
            self.completion_reason = Some(CompletionReason::EndTimeReached);
            self.set_state(RunState::PendingComplete);
        }
        Ok(self.clock.current())
    }

    /// Pause the clock. Only meaningful while `Active` and running.
    pub fn pause(&mut self) {
        if self.state == RunState::Active && !self.clock.is_stopped() {
            self.clock.stop();
            self.observers.simulation_pausing.publish(&self.clock.current());
        }
    }

    /// Resume a paused clock.
    pub fn resume(&mut self) {
        if self.state == RunState::Active && self.clock.is_stopped() {
            self.clock.start();
            self.observers.simulation_resuming.publish(&self.clock.current());
        }
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_stopped()
    }

    /// Ask for a rewind to `PendingInitialize`. Takes effect at the end of
    /// the current dispatch pass, then requires an explicit [`complete`].
    ///
    /// [`complete`]: Simulation::complete
    pub fn request_reset(&mut self) {
        self.submit_completion_request(CompletionReason::Reset);
    }

    /// Ask for final termination. Takes effect at the end of the current
    /// dispatch pass, then requires an explicit [`complete`].
    ///
    /// [`complete`]: Simulation::complete
    pub fn request_termination(&mut self) {
        self.submit_completion_request(CompletionReason::Terminated);
    }

    fn submit_completion_request(&mut self, reason: CompletionReason) {
        if self.in_dispatch {
            self.pending_request = Some(reason);
        } else {
            self.apply_completion_request(reason);
        }
    }

    fn apply_completion_request(&mut self, reason: CompletionReason) {
        match self.state {
            RunState::Active | RunState::PendingComplete => {
                self.completion_reason = Some(reason);
                self.set_state(RunState::PendingComplete);
            }
            state => tracing::warn!(%state, ?reason, "completion request ignored"),
        }
    }

    /// Finish the run at `time`: notify observers, retire every remaining
    /// platform, and clear the queues. A `Reset` reason rewinds the kernel
    /// to `PendingInitialize` for another run; platform indices and unique
    /// ids keep counting across the rewind.
    pub fn complete(&mut self, time: SimTime) {
        if !matches!(self.state, RunState::Active | RunState::PendingComplete) {
            tracing::warn!(state = %self.state, "complete called out of sequence");
        }
        self.clock.advance_to(time);
        self.clock.stop();
        if self.completion_reason.is_none() {
            self.completion_reason = Some(CompletionReason::EndTimeReached);
        }
        let final_time = self.clock.current();
        self.observers.simulation_complete.publish(&final_time);

        let remaining: Vec<PlatformIndex> = self.registry.indices().collect();
        for index in remaining {
            self.process_platform_removal(index, true);
        }
        self.events.clear();
        self.wall_events.clear();
        self.pending_request = None;

        if self.completion_reason == Some(CompletionReason::Reset) {
            self.registry.reset();
            self.set_state(RunState::PendingInitialize);
            tracing::info!(run = self.run_number, "simulation reset");
        } else {
            self.set_state(RunState::Complete);
            tracing::info!(
                run = self.run_number,
                time = %final_time,
                reason = ?self.completion_reason,
                "simulation complete"
            );
        }
    }

    fn set_state(&mut self, state: RunState) {
        tracing::trace!(from = %self.state, to = %state, "state transition");
        self.state = state;
    }

    // -- events -------------------------------------------------------------

    /// Schedule an event at its own due time. Past times are rejected.
    pub fn add_event(&mut self, event: Box<dyn Event>) -> Result<EventKey, RequestError> {
        let current = self.clock.current();
        let requested = event.time();
        if requested < current {
            tracing::warn!(%requested, %current, "rejecting event scheduled in the past");
            return Err(RequestError::InvalidTime { requested, current });
        }
        Ok(self.events.push(event))
    }

    /// Schedule a one-shot closure at `time`.
    pub fn schedule_at(
        &mut self,
        time: SimTime,
        action: impl FnOnce(&mut Simulation) + Send + 'static,
    ) -> Result<EventKey, RequestError> {
        self.add_event(Box::new(OneShotEvent::new(time, action)))
    }

    /// Soft-cancel a scheduled event. Returns false when it already ran.
    pub fn cancel_event(&mut self, key: EventKey) -> bool {
        self.events.cancel(key)
    }

    /// Schedule an event against elapsed wall-clock seconds. Wall events
    /// run during advance passes and never block run completion.
    pub fn add_wall_event(&mut self, event: Box<dyn Event>) -> WallEventKey {
        WallEventKey(self.wall_events.push(event))
    }

    pub fn cancel_wall_event(&mut self, key: WallEventKey) -> bool {
        self.wall_events.cancel(key.0)
    }

    /// Due time of the next simulated-time event.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.events.next_time()
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    fn dispatch_sim_events(&mut self, upto: SimTime) {
        while let Some(due) = self.events.next_time() {
            if due > upto || !self.clock.should_execute(due) {
                break;
            }
            let Some(mut popped) = self.events.pop() else {
                break;
            };
            self.clock.advance_to(due);
            if popped.cancelled || !popped.event.should_execute(self) {
                continue;
            }
            match popped.event.execute(self) {
                EventDisposition::Delete => {}
                EventDisposition::Reschedule(next) => {
                    let next = next.max(self.clock.current());
                    popped.event.set_time(next);
                    self.events.requeue(popped.key, popped.event);
                }
            }
        }
    }

    fn dispatch_wall_events(&mut self) {
        let now = SimTime::from_secs(self.clock.wall_time());
        // Rescheduled events are re-queued after the loop so an event that
        // asks to run again at or before `now` waits for the next pass
        // instead of spinning this one.
        let mut rescheduled: Vec<(EventKey, Box<dyn Event>)> = Vec::new();
        while let Some(due) = self.wall_events.next_time() {
            if due > now {
                break;
            }
            let Some(mut popped) = self.wall_events.pop() else {
                break;
            };
            if popped.cancelled || !popped.event.should_execute(self) {
                continue;
            }
            match popped.event.execute(self) {
                EventDisposition::Delete => {}
                EventDisposition::Reschedule(next) => {
                    popped.event.set_time(next.max(due));
                    rescheduled.push((popped.key, popped.event));
                }
            }
        }
        for (key, event) in rescheduled {
            self.wall_events.requeue(key, event);
        }
    }

    // -- platforms ----------------------------------------------------------

    /// Add a platform at `time`. At the current time the platform enters
    /// immediately and its index is returned; at a future time entry is
    /// scheduled and `None` is returned, the index being assigned on entry.
    pub fn add_platform(
        &mut self,
        time: SimTime,
        mut platform: Platform,
    ) -> Result<Option<PlatformIndex>, RequestError> {
        let current = self.clock.current();
        if time < current {
            return Err(RequestError::InvalidTime {
                requested: time,
                current,
            });
        }
        platform.set_creation_time(time);
        if time > current {
            self.events.push(Box::new(OneShotEvent::new(
                time,
                move |sim: &mut Simulation| {
                    let _ = sim.add_platform_now(platform);
                },
            )));
            Ok(None)
        } else {
            Ok(Some(self.add_platform_now(platform)?))
        }
    }

    fn add_platform_now(&mut self, platform: Platform) -> Result<PlatformIndex, RegistryError> {
        let time = self.clock.current();
        let platform_type = platform.type_name().to_string();
        let offered_name = platform
            .name()
            .unwrap_or_else(|| platform.type_name())
            .to_string();
        let index = match self.registry.add(platform) {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!(name = %offered_name, %err, "platform omitted");
                self.observers.platform_omitted.publish(&PlatformNotice {
                    time,
                    index: PlatformIndex::NONE,
                    name: offered_name,
                    platform_type,
                });
                return Err(err);
            }
        };
        let notice = self.platform_notice(time, index);
        tracing::debug!(%index, name = %notice.name, "platform added");
        self.observers.platform_added.publish(&notice);

        // Power up the parts flagged to start on.
        let starting: Vec<String> = self
            .registry
            .get(index)
            .map(|p| {
                p.parts()
                    .iter()
                    .filter(|part| part.initially_on() && part.is_operational())
                    .map(|part| part.name().to_string())
                    .collect()
            })
            .unwrap_or_default();
        for part in starting {
            if let Some(platform) = self.registry.get_mut(index) {
                if let Some(p) = platform.part_mut(&part) {
                    p.turn_on();
                }
            }
            self.observers.part_turned_on.publish(&PartNotice {
                time,
                platform: index,
                part,
            });
        }

        self.observers.platform_initialized.publish(&notice);
        Ok(index)
    }

    /// Remove a platform no earlier than `time`. Removal is always deferred
    /// through the event queue, even at the current time, so an event
    /// executing against the platform finishes first. With `destroy` false
    /// the entity is parked in its tombstone instead of dropped.
    pub fn remove_platform(
        &mut self,
        time: SimTime,
        index: PlatformIndex,
        destroy: bool,
    ) -> Result<(), RequestError> {
        if !self.registry.exists(index) {
            return Err(RegistryError::UnknownPlatform(index).into());
        }
        let when = time.max(self.clock.current());
        self.events.push(Box::new(OneShotEvent::new(
            when,
            move |sim: &mut Simulation| sim.process_platform_removal(index, destroy),
        )));
        Ok(())
    }

    fn process_platform_removal(&mut self, index: PlatformIndex, destroy: bool) {
        if !self.registry.exists(index) {
            return;
        }
        let time = self.clock.current();
        let notice = self.platform_notice(time, index);
        tracing::debug!(%index, name = %notice.name, "platform deleted");
        self.observers.platform_deleted.publish(&notice);
        let _ = self.registry.remove(index, !destroy);
    }

    /// Declare a platform combat-ineffective. It stays in the simulation.
    pub fn break_platform(
        &mut self,
        time: SimTime,
        index: PlatformIndex,
    ) -> Result<(), RequestError> {
        let platform = self
            .registry
            .get_mut(index)
            .ok_or(RegistryError::UnknownPlatform(index))?;
        if platform.state() == PlatformState::Broken {
            return Ok(());
        }
        platform.set_state(PlatformState::Broken);
        let notice = self.platform_notice(time, index);
        self.observers.platform_broken.publish(&notice);
        Ok(())
    }

    /// Power a part on. Returns whether the part actually changed state.
    pub fn turn_part_on(
        &mut self,
        time: SimTime,
        index: PlatformIndex,
        part: &str,
    ) -> Result<bool, RequestError> {
        let platform = self
            .registry
            .get_mut(index)
            .ok_or(RegistryError::UnknownPlatform(index))?;
        let Some(subject) = platform.part_mut(part) else {
            tracing::warn!(%index, part, "turn-on ignored: no such part");
            return Ok(false);
        };
        let changed = subject.turn_on();
        if changed {
            self.observers.part_turned_on.publish(&PartNotice {
                time,
                platform: index,
                part: part.to_string(),
            });
        }
        Ok(changed)
    }

    /// Power a part off. Returns whether the part actually changed state.
    pub fn turn_part_off(
        &mut self,
        time: SimTime,
        index: PlatformIndex,
        part: &str,
    ) -> Result<bool, RequestError> {
        let platform = self
            .registry
            .get_mut(index)
            .ok_or(RegistryError::UnknownPlatform(index))?;
        let Some(subject) = platform.part_mut(part) else {
            tracing::warn!(%index, part, "turn-off ignored: no such part");
            return Ok(false);
        };
        let changed = subject.turn_off();
        if changed {
            self.observers.part_turned_off.publish(&PartNotice {
                time,
                platform: index,
                part: part.to_string(),
            });
        }
        Ok(changed)
    }

    /// Change a part's operability. A part going non-operational is forced
    /// off, with the power-off notified before the operability change.
    pub fn set_part_operational(
        &mut self,
        time: SimTime,
        index: PlatformIndex,
        part: &str,
        operational: bool,
    ) -> Result<bool, RequestError> {
        let platform = self
            .registry
            .get_mut(index)
            .ok_or(RegistryError::UnknownPlatform(index))?;
        let Some(subject) = platform.part_mut(part) else {
            tracing::warn!(%index, part, "operability change ignored: no such part");
            return Ok(false);
        };
        let was_on = subject.is_turned_on();
        let changed = subject.set_operational(operational);
        if changed {
            if was_on && !operational {
                self.observers.part_turned_off.publish(&PartNotice {
                    time,
                    platform: index,
                    part: part.to_string(),
                });
            }
            self.observers.part_operational_changed.publish(&PartNotice {
                time,
                platform: index,
                part: part.to_string(),
            });
        }
        Ok(changed)
    }

    /// Announce a new track held by `index`, returning its unique id.
    pub fn initiate_track(
        &mut self,
        time: SimTime,
        index: PlatformIndex,
    ) -> Result<u64, RequestError> {
        if !self.registry.exists(index) {
            return Err(RegistryError::UnknownPlatform(index).into());
        }
        let track_id = self.services.assign_unique_id();
        self.observers.track_initiated.publish(&TrackNotice {
            time,
            platform: index,
            track_id,
        });
        Ok(track_id)
    }

    /// Announce that a track was dropped.
    pub fn drop_track(
        &mut self,
        time: SimTime,
        index: PlatformIndex,
        track_id: u64,
    ) -> Result<(), RequestError> {
        if !self.registry.exists(index) {
            return Err(RegistryError::UnknownPlatform(index).into());
        }
        self.observers.track_dropped.publish(&TrackNotice {
            time,
            platform: index,
            track_id,
        });
        Ok(())
    }

    fn platform_notice(&self, time: SimTime, index: PlatformIndex) -> PlatformNotice {
        PlatformNotice {
            time,
            index,
            name: self.registry.name_of(index).unwrap_or_default().to_string(),
            platform_type: self.registry.type_of(index).unwrap_or_default().to_string(),
        }
    }

    // -- registry access ----------------------------------------------------

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    pub fn platform(&self, index: PlatformIndex) -> Option<&Platform> {
        self.registry.get(index)
    }

    pub fn platform_by_name(&self, name: &str) -> Option<&Platform> {
        self.registry.by_name(name)
    }

    pub fn platform_by_sign(&self, sign: &str) -> Option<&Platform> {
        self.registry.by_sign(sign)
    }

    pub fn platform_count(&self) -> usize {
        self.registry.count()
    }

    // -- shared services ----------------------------------------------------

    /// Lock the core-model random stream.
    pub fn lock_random(&self) -> StreamGuard<'_> {
        self.services.lock_simulation_stream()
    }

    /// Lock the script random stream.
    pub fn lock_script_random(&self) -> StreamGuard<'_> {
        self.services.lock_script_stream()
    }

    /// Issue a process-unique id (first id 1, never reused).
    pub fn assign_unique_id(&self) -> u64 {
        self.services.assign_unique_id()
    }

    // -- parallel update ----------------------------------------------------

    /// Run `update` against every live platform on the worker pool, then
    /// apply the staged requests on this thread in platform order. Returns
    /// the number of requests applied. A kernel built without workers does
    /// nothing.
    #[cfg(feature = "parallel")]
    pub fn parallel_update<F>(&mut self, update: F) -> usize
    where
        F: Fn(&KernelView<'_>, PlatformIndex, &mut EffectStage) + Sync,
    {
        let Some(coordinator) = self.coordinator.as_ref() else {
            return 0;
        };
        let indices: Vec<PlatformIndex> = self.registry.indices().collect();
        let requests = {
            let view = KernelView {
                registry: &self.registry,
                sim_time: self.clock.current(),
            };
            coordinator.run(&view, &indices, &update)
        };
        self.apply_requests(requests)
    }

    /// Apply staged requests sequentially. Rejected requests are logged and
    /// skipped; the count of applied requests is returned.
    #[cfg(feature = "parallel")]
    pub fn apply_requests(&mut self, requests: Vec<KernelRequest>) -> usize {
        let mut applied = 0;
        for request in requests {
            let outcome = match request {
                KernelRequest::Schedule(event) => self.add_event(event).map(|_| ()),
                KernelRequest::ScheduleWall(event) => {
                    self.add_wall_event(event);
                    Ok(())
                }
                KernelRequest::RemovePlatform {
                    time,
                    index,
                    destroy,
                } => self.remove_platform(time, index, destroy),
                KernelRequest::BreakPlatform { time, index } => self.break_platform(time, index),
                KernelRequest::TurnPartOn { time, index, part } => {
                    self.turn_part_on(time, index, &part).map(|_| ())
                }
                KernelRequest::TurnPartOff { time, index, part } => {
                    self.turn_part_off(time, index, &part).map(|_| ())
                }
                KernelRequest::InitiateTrack { time, index } => {
                    self.initiate_track(time, index).map(|_| ())
                }
                KernelRequest::DropTrack {
                    time,
                    index,
                    track_id,
                } => self.drop_track(time, index, track_id),
            };
            match outcome {
                Ok(()) => applied += 1,
                Err(err) => tracing::warn!(%err, "staged request rejected"),
            }
        }
        applied
    }
}

// ===========================================================================
// Tests
// ===========================================================================
