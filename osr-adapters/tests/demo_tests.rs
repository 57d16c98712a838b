//! Integration tests for the DemoRace feed

use osr_adapters::demo::DEMO_STEP;
use osr_adapters::DemoRace;
use osr_core::feed::SimulationFeed;
use osr_core::{EventType, ReplayConfig, ReplayEngine, TickSample};

fn run(feed: &mut DemoRace, ticks: usize) -> Vec<TickSample> {
    (0..ticks)
        .map(|i| {
            feed.read_tick()
                .expect("read_tick() should not error")
                .unwrap_or_else(|| panic!("Tick {} should be Some", i))
        })
        .collect()
}

#[test]
fn test_demo_race_name() {
    let feed = DemoRace::new();
    assert_eq!(feed.name(), "Demo Race");
}

#[test]
fn test_demo_race_detect_always_true() {
    let feed = DemoRace::new();
    assert!(feed.detect(), "DemoRace should always be detected");
}

#[test]
fn test_demo_race_initially_inactive() {
    let feed = DemoRace::new();
    assert!(!feed.is_active(), "DemoRace should be inactive before start()");
}

#[test]
fn test_demo_race_read_tick_when_inactive_returns_none() {
    let mut feed = DemoRace::new();
    let tick = feed.read_tick().unwrap();
    assert!(
        tick.is_none(),
        "read_tick() should return None when feed is inactive"
    );
}

#[test]
fn test_demo_race_start_and_stop() {
    let mut feed = DemoRace::new();

    feed.start().expect("start() should succeed");
    assert!(feed.is_active(), "Feed should be active after start()");

    feed.stop().expect("stop() should succeed");
    assert!(!feed.is_active(), "Feed should be inactive after stop()");
}

#[test]
fn test_demo_race_first_tick_reports_race_start() {
    let mut feed = DemoRace::new();
    feed.start().expect("start() should succeed");

    let tick = run(&mut feed, 1).remove(0);
    assert_eq!(tick.delta_time, DEMO_STEP);
    assert_eq!(tick.vehicles.len(), 4);
    assert!(tick.camera.is_some(), "broadcast camera should be populated");
    assert_eq!(tick.events.len(), 1);
    assert_eq!(tick.events[0].event_type, EventType::RaceStart);
}

#[test]
fn test_demo_race_snapshot_values_in_reasonable_range() {
    let mut feed = DemoRace::new();
    feed.start().expect("start() should succeed");

    for tick in run(&mut feed, 600) {
        for (id, snapshot) in &tick.vehicles {
            assert!(
                (0.0..=100.0).contains(&snapshot.speed),
                "Speed {} of car {} should be in reasonable range",
                snapshot.speed,
                id
            );
            assert!((1..=6).contains(&snapshot.gear), "Gear {} out of range", snapshot.gear);
            assert!((0.0..=1.0).contains(&snapshot.throttle));
            assert!((0.0..=1.0).contains(&snapshot.brake));
            assert!((0.0..=1.0).contains(&snapshot.nitro_amount));
            assert!(snapshot.track_progress.is_some(), "progress should be reported");
            assert_eq!(snapshot.wheel_rotations.len(), 4);
            assert_eq!(snapshot.suspension_compressions.len(), 4);
        }
    }
}

#[test]
fn test_demo_race_is_deterministic_after_restart() {
    let mut feed = DemoRace::new();
    feed.start().expect("start() should succeed");
    let first = run(&mut feed, 120);

    feed.stop().expect("stop() should succeed");
    feed.start().expect("start() should succeed");
    let second = run(&mut feed, 120);

    assert_eq!(first.last().map(|t| t.vehicles.clone()), second.last().map(|t| t.vehicles.clone()));
}

#[test]
fn test_demo_race_session_lists_every_car() {
    let feed = DemoRace::new().with_laps(2);
    let session = feed.session().expect("demo race exposes session info");
    assert_eq!(session.track_name, "Demo Loop");
    assert_eq!(session.game_mode, "race_2_laps");
    assert_eq!(session.participants.len(), 4);
    assert_eq!(session.participants[0].player_name, "Demo Player");
}

#[test]
fn test_demo_race_reports_laps_and_finish() {
    let mut feed = DemoRace::new().with_laps(1);
    feed.start().expect("start() should succeed");

    let ticks = ((feed.lap_duration() + 3.0) / DEMO_STEP) as usize;
    let events: Vec<_> = run(&mut feed, ticks)
        .into_iter()
        .flat_map(|t| t.events)
        .collect();

    let laps = events
        .iter()
        .filter(|e| e.event_type == EventType::LapComplete)
        .count();
    let finishes: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::RaceFinish)
        .collect();
    assert_eq!(laps, 4, "every car should complete the opening lap");
    assert_eq!(finishes.len(), 1);
    // Fastest car crosses first
    assert_eq!(finishes[0].vehicle_id, Some(4));
}

#[test]
fn test_demo_race_recorded_session_yields_highlights() {
    let mut feed = DemoRace::new();
    let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
    if let Some(session) = feed.session() {
        engine.apply_session(&session);
    }
    feed.start().expect("start() should succeed");
    engine.start_recording("demo");

    for tick in run(&mut feed, (45.0 / DEMO_STEP) as usize) {
        engine.ingest(tick);
    }
    engine.stop_recording();

    let rec = engine.current_recording();
    assert_eq!(rec.track_name, "Demo Loop");
    assert_eq!(rec.participants.len(), 4);
    assert!(rec.total_duration > 44.0);

    for kind in [
        EventType::RaceStart,
        EventType::Overtake,
        EventType::BigAir,
        EventType::DriftStart,
        EventType::NitroActivated,
        EventType::LapComplete,
    ] {
        assert!(
            !engine.events_of_type(kind).is_empty(),
            "expected at least one {:?}",
            kind
        );
    }
    assert!(rec
        .events
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
}
