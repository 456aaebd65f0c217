//! Platform identity, registry lookups, and part notifications, driven
//! through the kernel's public surface.

use std::sync::{Arc, Mutex};

use skirmish_core::observer::{PartNotice, PlatformNotice};
use skirmish_core::platform::{Part, Platform, PlatformIndex, PlatformState};
use skirmish_core::scenario::Scenario;
use skirmish_core::sim::{RequestError, Simulation};
use skirmish_core::time::SimTime;

fn secs(t: f64) -> SimTime {
    SimTime::from_secs(t)
}

fn running_sim(end: f64) -> Simulation {
    let scenario = Scenario::builder().end_time(secs(end)).build().unwrap();
    let mut sim = Simulation::new(scenario, 1).unwrap();
    sim.initialize().unwrap();
    sim.start().unwrap();
    sim
}

#[test]
fn indices_are_stable_and_never_reused() {
    let mut sim = running_sim(100.0);
    let p1 = sim
        .add_platform(SimTime::ZERO, Platform::new("tank").with_name("p1"))
        .unwrap()
        .unwrap();
    let p2 = sim
        .add_platform(SimTime::ZERO, Platform::new("tank").with_name("p2"))
        .unwrap()
        .unwrap();
    assert_eq!((p1, p2), (PlatformIndex(1), PlatformIndex(2)));

    sim.remove_platform(SimTime::ZERO, p1, true).unwrap();
    sim.advance_time_to(secs(1.0)).unwrap();
    assert!(sim.platform(p1).is_none());

    let p3 = sim
        .add_platform(secs(1.0), Platform::new("tank").with_name("p3"))
        .unwrap()
        .unwrap();
    assert_eq!(p3, PlatformIndex(3));
    assert_eq!(sim.platform(p2).map(Platform::index), Some(p2));
}

#[test]
fn identity_lookups_survive_removal() {
    let mut sim = running_sim(100.0);
    let index = sim
        .add_platform(
            SimTime::ZERO,
            Platform::new("awacs").with_name("sentry").with_sign("EYE-1"),
        )
        .unwrap()
        .unwrap();
    assert_eq!(sim.platform_by_name("sentry").map(Platform::index), Some(index));
    assert_eq!(sim.platform_by_sign("EYE-1").map(Platform::index), Some(index));

    sim.remove_platform(SimTime::ZERO, index, true).unwrap();
    sim.advance_time_to(secs(1.0)).unwrap();

    // Live lookups fail, attribute lookups still resolve.
    assert!(sim.platform_by_name("sentry").is_none());
    assert!(sim.platform_by_sign("EYE-1").is_none());
    assert_eq!(sim.registry().name_of(index), Some("sentry"));
    assert_eq!(sim.registry().type_of(index), Some("awacs"));
    assert_eq!(sim.registry().sign_of(index), Some("EYE-1"));
}

#[test]
fn duplicate_name_is_rejected_and_omission_published() {
    let mut sim = running_sim(100.0);
    let omitted: Arc<Mutex<Vec<PlatformNotice>>> = Arc::default();
    {
        let omitted = Arc::clone(&omitted);
        sim.observers()
            .platform_omitted
            .connect(move |notice| omitted.lock().unwrap().push(notice.clone()));
    }
    sim.add_platform(SimTime::ZERO, Platform::new("sam").with_name("battery"))
        .unwrap();
    let err = sim
        .add_platform(SimTime::ZERO, Platform::new("sam").with_name("battery"))
        .unwrap_err();
    assert!(matches!(err, RequestError::Registry(_)));
    let omitted = omitted.lock().unwrap();
    assert_eq!(omitted.len(), 1);
    assert_eq!(omitted[0].name, "battery");
    assert!(omitted[0].index.is_none());
}

#[test]
fn default_names_are_generated_per_type() {
    let mut sim = running_sim(100.0);
    sim.add_platform(SimTime::ZERO, Platform::new("mig-29")).unwrap();
    sim.add_platform(SimTime::ZERO, Platform::new("mig-29")).unwrap();
    sim.add_platform(SimTime::ZERO, Platform::new("frigate")).unwrap();
    assert!(sim.platform_by_name("mig-29:1").is_some());
    assert!(sim.platform_by_name("mig-29:2").is_some());
    assert!(sim.platform_by_name("frigate:1").is_some());
}

#[test]
fn add_and_init_notices_carry_identity() {
    let mut sim = running_sim(100.0);
    let log: Arc<Mutex<Vec<(&'static str, String)>>> = Arc::default();
    {
        {
            let log = Arc::clone(&log);
            sim.observers().platform_added.connect(move |n| {
                log.lock().unwrap().push(("added", n.name.clone()));
            });
        }
        let log = Arc::clone(&log);
        sim.observers().platform_initialized.connect(move |n| {
            log.lock().unwrap().push(("initialized", n.name.clone()));
        });
    }
    sim.add_platform(SimTime::ZERO, Platform::new("sub").with_name("narwhal"))
        .unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            ("added", "narwhal".to_string()),
            ("initialized", "narwhal".to_string()),
        ]
    );
}

#[test]
fn initially_on_parts_power_up_with_notice() {
    let mut sim = running_sim(100.0);
    let powered: Arc<Mutex<Vec<PartNotice>>> = Arc::default();
    {
        let powered = Arc::clone(&powered);
        sim.observers()
            .part_turned_on
            .connect(move |n| powered.lock().unwrap().push(n.clone()));
    }
    let index = sim
        .add_platform(
            SimTime::ZERO,
            Platform::new("fighter")
                .with_part(Part::new("radar", true))
                .with_part(Part::new("jammer", false)),
        )
        .unwrap()
        .unwrap();
    let platform = sim.platform(index).unwrap();
    assert!(platform.part("radar").unwrap().is_turned_on());
    assert!(!platform.part("jammer").unwrap().is_turned_on());
    let powered = powered.lock().unwrap();
    assert_eq!(powered.len(), 1);
    assert_eq!(powered[0].part, "radar");
}

#[test]
fn part_power_and_operability_changes_notify() {
    let mut sim = running_sim(100.0);
    let index = sim
        .add_platform(
            SimTime::ZERO,
            Platform::new("fighter").with_part(Part::new("radar", true)),
        )
        .unwrap()
        .unwrap();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    {
        {
            let log = Arc::clone(&log);
            sim.observers().part_turned_off.connect(move |_| {
                log.lock().unwrap().push("off");
            });
        }
        let log = Arc::clone(&log);
        sim.observers().part_operational_changed.connect(move |_| {
            log.lock().unwrap().push("operational");
        });
    }
    // Powering on an already-on part changes nothing.
    assert!(!sim.turn_part_on(SimTime::ZERO, index, "radar").unwrap());
    // Going non-operational forces the power off first.
    assert!(sim
        .set_part_operational(SimTime::ZERO, index, "radar", false)
        .unwrap());
    assert!(!sim.turn_part_on(SimTime::ZERO, index, "radar").unwrap());
    assert_eq!(*log.lock().unwrap(), vec!["off", "operational"]);
}

#[test]
fn broken_platform_stays_in_simulation() {
    let mut sim = running_sim(100.0);
    let index = sim
        .add_platform(SimTime::ZERO, Platform::new("tank"))
        .unwrap()
        .unwrap();
    let broken: Arc<Mutex<Vec<PlatformIndex>>> = Arc::default();
    {
        let broken = Arc::clone(&broken);
        sim.observers()
            .platform_broken
            .connect(move |n| broken.lock().unwrap().push(n.index));
    }
    sim.break_platform(SimTime::ZERO, index).unwrap();
    // A second break is idempotent.
    sim.break_platform(SimTime::ZERO, index).unwrap();
    assert_eq!(sim.platform(index).unwrap().state(), PlatformState::Broken);
    assert_eq!(*broken.lock().unwrap(), vec![index]);
}

#[test]
fn operations_on_unknown_platforms_error() {
    let mut sim = running_sim(100.0);
    let ghost = PlatformIndex(42);
    assert!(matches!(
        sim.remove_platform(SimTime::ZERO, ghost, true),
        Err(RequestError::Registry(_))
    ));
    assert!(matches!(
        sim.break_platform(SimTime::ZERO, ghost),
        Err(RequestError::Registry(_))
    ));
    assert!(matches!(
        sim.initiate_track(SimTime::ZERO, ghost),
        Err(RequestError::Registry(_))
    ));
}

#[test]
fn deleted_notice_precedes_registry_removal() {
    let mut sim = running_sim(100.0);
    let index = sim
        .add_platform(SimTime::ZERO, Platform::new("target").with_name("victim"))
        .unwrap()
        .unwrap();
    let seen_live: Arc<Mutex<Option<bool>>> = Arc::default();
    {
        let seen_live = Arc::clone(&seen_live);
        sim.observers().platform_deleted.connect(move |notice| {
            // The notice still carries full identity at publication time.
            *seen_live.lock().unwrap() = Some(notice.name == "victim");
        });
    }
    sim.remove_platform(SimTime::ZERO, index, true).unwrap();
    sim.advance_time_to(secs(1.0)).unwrap();
    assert_eq!(*seen_live.lock().unwrap(), Some(true));
    assert!(sim.platform(index).is_none());
}
