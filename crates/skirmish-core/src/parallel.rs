//! Barrier-synchronized parallel platform updates.
//!
//! Workers never mutate the kernel. Each worker receives a read-only
//! [`KernelView`] and stages its intended effects as [`KernelRequest`]s in
//! an [`EffectStage`]; after every worker has finished, the staged requests
//! are merged in platform order and applied sequentially on the driving
//! thread. Two runs over the same state therefore apply the same requests
//! in the same order, regardless of worker scheduling.
//!
//! This module exists behind the `parallel` feature.

use rayon::prelude::*;

use crate::event::Event;
use crate::platform::PlatformIndex;
use crate::registry::PlatformRegistry;
use crate::time::SimTime;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
#[error("failed to build worker pool: {0}")]
pub struct CoordinatorError(#[from] rayon::ThreadPoolBuildError);

// ---------------------------------------------------------------------------
// KernelView and staging
// ---------------------------------------------------------------------------

/// Read-only snapshot of the kernel handed to workers.
pub struct KernelView<'a> {
    pub registry: &'a PlatformRegistry,
    pub sim_time: SimTime,
}

/// A kernel mutation staged by a worker, applied later at the barrier.
pub enum KernelRequest {
    Schedule(Box<dyn Event>),
    ScheduleWall(Box<dyn Event>),
    RemovePlatform {
        time: SimTime,
        index: PlatformIndex,
        destroy: bool,
    },
    BreakPlatform {
        time: SimTime,
        index: PlatformIndex,
    },
    TurnPartOn {
        time: SimTime,
        index: PlatformIndex,
        part: String,
    },
    TurnPartOff {
        time: SimTime,
        index: PlatformIndex,
        part: String,
    },
    InitiateTrack {
        time: SimTime,
        index: PlatformIndex,
    },
    DropTrack {
        time: SimTime,
        index: PlatformIndex,
        track_id: u64,
    },
}

/// Per-worker request buffer.
#[derive(Default)]
pub struct EffectStage {
    requests: Vec<KernelRequest>,
}

impl EffectStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: KernelRequest) {
        self.requests.push(request);
    }

    pub fn schedule(&mut self, event: Box<dyn Event>) {
        self.push(KernelRequest::Schedule(event));
    }

    pub fn remove_platform(&mut self, time: SimTime, index: PlatformIndex, destroy: bool) {
        self.push(KernelRequest::RemovePlatform {
            time,
            index,
            destroy,
        });
    }

    pub fn break_platform(&mut self, time: SimTime, index: PlatformIndex) {
        self.push(KernelRequest::BreakPlatform { time, index });
    }

    pub fn turn_part_on(&mut self, time: SimTime, index: PlatformIndex, part: impl Into<String>) {
        self.push(KernelRequest::TurnPartOn {
            time,
            index,
            part: part.into(),
        });
    }

    pub fn turn_part_off(&mut self, time: SimTime, index: PlatformIndex, part: impl Into<String>) {
        self.push(KernelRequest::TurnPartOff {
            time,
            index,
            part: part.into(),
        });
    }

    pub fn initiate_track(&mut self, time: SimTime, index: PlatformIndex) {
        self.push(KernelRequest::InitiateTrack { time, index });
    }

    pub fn drop_track(&mut self, time: SimTime, index: PlatformIndex, track_id: u64) {
        self.push(KernelRequest::DropTrack {
            time,
            index,
            track_id,
        });
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn into_requests(self) -> Vec<KernelRequest> {
        self.requests
    }
}

// ---------------------------------------------------------------------------
// ThreadCoordinator
// ---------------------------------------------------------------------------

/// Owns the worker pool and runs fan-out/merge rounds over it.
pub struct ThreadCoordinator {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl ThreadCoordinator {
    pub fn new(workers: usize) -> Result<Self, CoordinatorError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("sim-worker-{i}"))
            .build()?;
        tracing::debug!(workers, "worker pool ready");
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `update` for every index on the pool and merge the staged
    /// requests in index-list order.
    pub fn run<F>(
        &self,
        view: &KernelView<'_>,
        indices: &[PlatformIndex],
        update: &F,
    ) -> Vec<KernelRequest>
    where
        F: Fn(&KernelView<'_>, PlatformIndex, &mut EffectStage) + Sync,
    {
        self.pool.install(|| {
            indices
                .par_iter()
                .map(|&index| {
                    let mut stage = EffectStage::new();
                    update(view, index, &mut stage);
                    stage.into_requests()
                })
                .collect::<Vec<_>>()
        })
        .into_iter()
        .flatten()
        .collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
