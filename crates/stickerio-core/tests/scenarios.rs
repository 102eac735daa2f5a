//! End-to-end game scenarios
//!
//! Each scenario writes a small event log, replays it through the engine and
//! checks both the materialized state and the read model.

use std::sync::Arc;

use stickerio_core::{
    Engine, EventLog, GameConfig, InMemoryEventLog, InMemoryReadModel, ReadModelReader,
    ResyncStats,
};
use stickerio_events::fixtures;
use stickerio_events::{
    CityId, Coordinates, CreateCity, DeleteCity, Epoch, Event, EventKind, Leg, MovementId,
    PlayerId, QueueUnit, StartMovement,
};

struct World {
    engine: Engine,
    log: Arc<InMemoryEventLog>,
    view: Arc<InMemoryReadModel>,
}

fn world() -> World {
    let log = Arc::new(InMemoryEventLog::new());
    let view = Arc::new(InMemoryReadModel::new());
    let engine = Engine::new(Arc::new(GameConfig::default()), 42, log.clone(), view.clone());
    World { engine, log, view }
}

fn record(world: &World, id: &str, due: Epoch, kind: EventKind) {
    let event = Event::new(id, due, &kind).unwrap();
    assert!(world.log.insert(&event).unwrap(), "{id} should be new");
}

fn found(
    city: &str,
    player: &str,
    at: (i32, i32),
    resources: &[(&str, i64)],
    units: &[(&str, i64)],
) -> EventKind {
    EventKind::CreateCity(CreateCity {
        city_id: city.into(),
        name: city.to_string(),
        player_id: PlayerId::from(player),
        location: Coordinates::new(at.0, at.1),
        resources: resources.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        units: units.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    })
}

fn march(
    movement: &str,
    player: &str,
    origin: &str,
    to: (i32, i32),
    units: &[(&str, i64)],
) -> EventKind {
    EventKind::StartMovement(StartMovement {
        movement_id: movement.into(),
        player_id: PlayerId::from(player),
        origin_id: origin.into(),
        destination_id: None,
        destination: Coordinates::new(to.0, to.1),
        units: units.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        resources: Default::default(),
    })
}

#[test]
fn test_sample_log_replays_to_expected_state() {
    let w = world();
    for event in fixtures::sample_events() {
        w.log.insert(&event).unwrap();
    }

    let stats = w.engine.resync(1100).unwrap();
    // 7 accepted commands plus 5 chained follow-ups, 2 rejections
    assert_eq!(
        stats,
        ResyncStats {
            replayed: 12,
            rejected: 2,
            scheduled: 0
        }
    );

    let snapshot = w.engine.snapshot().unwrap();
    assert_eq!(snapshot.cities.len(), 3);
    assert!(snapshot.movements.is_empty());
    assert!(snapshot.unit_queue.is_empty());
    assert!(snapshot.building_queue.is_empty());

    w.engine
        .with_store(|store| {
            // The squatter lost the race for (3, 4)
            assert!(store.city(&"city_squatter".into()).is_none());

            let stickton = store.city(&"city_stickton".into()).unwrap();
            // 20 founded, 10 sent away, 5 back from foraging, 2 trained
            assert_eq!(stickton.units_of("stickmen"), 12);

            let twigfort = store.city(&"city_twigfort".into()).unwrap();
            assert_eq!(twigfort.owner, PlayerId::from("player_ana"));
            assert_eq!(twigfort.units_of("stickmen"), 10);

            let inkwell = store.city(&"city_inkwell".into()).unwrap();
            assert_eq!(inkwell.building_level("mines"), 1);
        })
        .unwrap();

    assert_eq!(w.view.city_count(), 3);
    assert_eq!(w.view.movement_count(), 0);
}

#[test]
fn test_sample_log_midway_has_movement_on_return_leg() {
    let w = world();
    for event in fixtures::sample_events() {
        w.log.insert(&event).unwrap();
    }

    let stats = w.engine.resync(1030).unwrap();
    // Forage return, training and the mines upgrade are still pending
    assert_eq!(stats.scheduled, 3);
    assert_eq!(w.engine.scheduled_len().unwrap(), 3);

    let forage = w
        .view
        .get_movement(&MovementId::from("mov_forage"))
        .unwrap()
        .expect("forage party is on its way home");
    assert_eq!(forage.leg, Leg::Return);
    assert_eq!(forage.departure_epoch, 1022);
    assert!(w
        .view
        .get_movement(&MovementId::from("mov_reinforce"))
        .unwrap()
        .is_none());

    assert_eq!(w.engine.apply_due(1100).unwrap(), 3);
    assert_eq!(w.view.movement_count(), 0);
}

#[test]
fn test_raid_kills_defenders_and_carries_off_stock() {
    let w = world();
    record(&w, "e1", 100, found("raiders", "p1", (0, 0), &[], &[("stickmen", 50)]));
    record(&w, "e2", 100, found("target", "p2", (3, 4), &[("sticks", 200)], &[("stickmen", 10)]));
    record(&w, "e3", 100, march("m1", "p1", "raiders", (3, 4), &[("stickmen", 50)]));

    // Arrival at 103, survivors on their way home
    w.engine.resync(104).unwrap();
    w.engine
        .with_store(|store| {
            let target = store.city(&"target".into()).unwrap();
            let defenders = target.units_of("stickmen");
            assert!((1..=2).contains(&defenders), "{defenders} defenders left");
            assert!(target.resource_base.values().all(|amount| *amount == 0));

            let raid = store.movement(&"m1".into()).unwrap();
            assert_eq!(raid.leg, Leg::Return);
            let survivors = raid.carried_units["stickmen"];
            assert!((37..=42).contains(&survivors), "{survivors} survivors");
            assert!(raid.carried_resources["sticks"] >= 200);
        })
        .unwrap();

    // Return at 106
    w.engine.resync(110).unwrap();
    w.engine
        .with_store(|store| {
            assert_eq!(store.movement_count(), 0);
            let raiders = store.city(&"raiders".into()).unwrap();
            assert!((37..=42).contains(&raiders.units_of("stickmen")));
            assert!(raiders.resource_base["sticks"] >= 200);
        })
        .unwrap();
}

#[test]
fn test_conquest_cancels_queue_and_frees_the_coordinate() {
    let w = world();
    record(&w, "e1", 100, found("raiders", "p1", (0, 0), &[], &[("stickmen", 5)]));
    record(&w, "e2", 100, found("target", "p2", (3, 4), &[("sticks", 10)], &[]));
    record(
        &w,
        "e3",
        100,
        EventKind::QueueUnit(QueueUnit {
            item_id: "u1".into(),
            city_id: "target".into(),
            player_id: PlayerId::from("p2"),
            unit_type: "stickmen".into(),
            unit_count: 1,
        }),
    );
    record(&w, "e4", 100, march("m1", "p1", "raiders", (3, 4), &[("stickmen", 5)]));

    w.engine.resync(102).unwrap();
    assert!(w.view.get_unit_item(&"target".into(), &"u1".into()).unwrap().is_some());

    // The undefended city is stripped bare on arrival and disappears
    w.engine.resync(104).unwrap();
    assert!(w.view.get_city(&CityId::from("target")).unwrap().is_none());
    assert!(w.view.get_unit_item(&"target".into(), &"u1".into()).unwrap().is_none());

    // Training completes into nothing; the coordinate can be settled again
    record(&w, "e5", 150, found("rebuilt", "p1", (3, 4), &[], &[]));
    let stats = w.engine.resync(200).unwrap();
    assert_eq!(stats.rejected, 0);
    w.engine
        .with_store(|store| {
            assert_eq!(store.city_at(&Coordinates::new(3, 4)).unwrap().id, CityId::from("rebuilt"));
            let raiders = store.city(&"raiders".into()).unwrap();
            assert_eq!(raiders.units_of("stickmen"), 5);
        })
        .unwrap();
}

#[test]
fn test_expedition_is_lost_when_origin_changes_hands() {
    let w = world();
    record(&w, "e1", 100, found("home", "p1", (0, 0), &[], &[("stickmen", 5)]));
    record(&w, "e2", 100, march("m1", "p1", "home", (10, 0), &[("stickmen", 5)]));
    record(
        &w,
        "e3",
        107,
        EventKind::DeleteCity(DeleteCity {
            city_id: "home".into(),
            player_id: PlayerId::from("p1"),
        }),
    );
    record(&w, "e4", 108, found("usurper", "p2", (0, 0), &[], &[]));

    // Arrival at 105, return at 110
    let stats = w.engine.resync(200).unwrap();
    assert_eq!(stats.rejected, 0);
    w.engine
        .with_store(|store| {
            assert_eq!(store.movement_count(), 0);
            assert_eq!(store.city_count(), 1);
            let usurper = store.city(&"usurper".into()).unwrap();
            assert_eq!(usurper.total_units(), 0);
        })
        .unwrap();
}

#[test]
fn test_units_are_conserved_across_reinforcement() {
    let w = world();
    record(&w, "e1", 100, found("a", "p1", (0, 0), &[], &[("stickmen", 8), ("swordsmen", 3)]));
    record(&w, "e2", 100, found("b", "p1", (6, 8), &[], &[("stickmen", 1)]));
    record(&w, "e3", 100, march("m1", "p1", "a", (6, 8), &[("stickmen", 4), ("swordsmen", 3)]));

    let total = |engine: &Engine| {
        engine
            .with_store(|store| {
                let home: i64 = store.cities().map(|c| c.total_units()).sum();
                let away: i64 = store.movements().map(|m| m.total_units()).sum();
                home + away
            })
            .unwrap()
    };

    w.engine.resync(105).unwrap();
    assert_eq!(w.engine.snapshot().unwrap().movements.len(), 1);
    assert_eq!(total(&w.engine), 12);

    // Swordsmen set the pace: 10 cells at 1 cell/s
    w.engine.resync(110).unwrap();
    assert_eq!(total(&w.engine), 12);
    w.engine
        .with_store(|store| {
            let b = store.city(&"b".into()).unwrap();
            assert_eq!(b.units_of("stickmen"), 5);
            assert_eq!(b.units_of("swordsmen"), 3);
        })
        .unwrap();
}
