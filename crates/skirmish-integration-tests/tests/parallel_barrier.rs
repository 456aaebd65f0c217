//! Barrier-synchronized parallel updates through the kernel.
//!
//! Workers read the kernel view and stage requests; nothing mutates until
//! the barrier, where the staged requests apply in platform order on the
//! driving thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use skirmish_core::platform::{Part, Platform, PlatformIndex};
use skirmish_core::scenario::Scenario;
use skirmish_core::sim::Simulation;
use skirmish_core::time::SimTime;

fn parallel_sim(platforms: usize, workers: usize) -> Simulation {
    let mut builder = Scenario::builder()
        .end_time(SimTime::from_secs(100.0))
        .worker_threads(workers);
    for _ in 0..platforms {
        builder = builder.platform(Platform::new("drone").with_part(Part::new("radar", false)));
    }
    let mut sim = Simulation::new(builder.build().unwrap(), 1).unwrap();
    sim.initialize().unwrap();
    sim.start().unwrap();
    sim
}

#[test]
fn staged_removals_apply_at_the_barrier() {
    let mut sim = parallel_sim(16, 4);
    assert_eq!(sim.platform_count(), 16);

    let applied = sim.parallel_update(|view, index, stage| {
        // No mutation is visible while workers run.
        assert_eq!(view.registry.count(), 16);
        if index.0 % 2 == 0 {
            stage.remove_platform(view.sim_time, index, true);
        }
    });
    assert_eq!(applied, 8);
    // Removals defer through the event queue; one pass flushes them.
    sim.advance_time_to(SimTime::from_secs(1.0)).unwrap();
    assert_eq!(sim.platform_count(), 8);
}

#[test]
fn staged_part_toggles_notify_in_platform_order() {
    let mut sim = parallel_sim(12, 3);
    let order: Arc<Mutex<Vec<PlatformIndex>>> = Arc::default();
    {
        let order = Arc::clone(&order);
        sim.observers()
            .part_turned_on
            .connect(move |n| order.lock().unwrap().push(n.platform));
    }
    sim.parallel_update(|view, index, stage| {
        stage.turn_part_on(view.sim_time, index, "radar");
    });
    let expected: Vec<PlatformIndex> = sim.registry().indices().collect();
    assert_eq!(*order.lock().unwrap(), expected);
}

#[test]
fn concurrent_draws_serialize_on_the_stream_lock() {
    use skirmish_core::random::SharedServices;
    let services = SharedServices::new(1, 2);
    let draws = Arc::new(AtomicUsize::new(0));
    // Draws from many threads serialize on the stream lock rather than
    // deadlock or tear.
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let services = &services;
            let draws = Arc::clone(&draws);
            scope.spawn(move || {
                for _ in 0..100 {
                    let _ = services.lock_simulation_stream().uniform();
                    draws.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });
    assert_eq!(draws.load(Ordering::Relaxed), 400);
}

#[test]
fn kernel_without_workers_skips_parallel_update() {
    let mut sim = parallel_sim(4, 0);
    let applied = sim.parallel_update(|view, index, stage| {
        stage.remove_platform(view.sim_time, index, true);
    });
    assert_eq!(applied, 0);
    assert_eq!(sim.platform_count(), 4);
}

#[test]
fn repeated_rounds_are_deterministic() {
    let run = || {
        let mut sim = parallel_sim(20, 4);
        let tracks: Arc<Mutex<Vec<(PlatformIndex, u64)>>> = Arc::default();
        {
            let tracks = Arc::clone(&tracks);
            sim.observers()
                .track_initiated
                .connect(move |n| tracks.lock().unwrap().push((n.platform, n.track_id)));
        }
        sim.parallel_update(|view, index, stage| {
            stage.initiate_track(view.sim_time, index);
        });
        let tracks = tracks.lock().unwrap();
        tracks.clone()
    };
    assert_eq!(run(), run());
}
