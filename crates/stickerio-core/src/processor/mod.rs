//! Event Processor
//!
//! Applies one persisted event to the state store. Every handler validates
//! its preconditions before touching the store, so a rejected event leaves
//! no trace. Handlers return at most one follow-up event, which the caller
//! persists and schedules.

mod city;
mod movement;
mod production;

use std::sync::Arc;

use tracing::debug;

use stickerio_events::{Epoch, Event, EventId, EventKind, EventName};

use crate::config::GameConfig;
use crate::error::{ProcessError, Rejection};
use crate::state::{DirtySet, StateStore};
use crate::SimRng;

/// A follow-up produced by a handler, not yet given an id
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Chained {
    pub due_epoch: Epoch,
    pub kind: EventKind,
}

/// Epoch `seconds` after `start`, rejected when it leaves the epoch range
pub(crate) fn due_after(start: Epoch, seconds: Epoch) -> Result<Epoch, Rejection> {
    start
        .checked_add(seconds)
        .ok_or(Rejection::EpochOverflow { start, seconds })
}

/// Id of the event chained from `parent`
pub fn chained_event_id(parent: &EventId, name: EventName) -> EventId {
    EventId::chained(parent, name)
}

/// Applies events with a fixed config and RNG seed.
#[derive(Debug, Clone)]
pub struct Processor {
    config: Arc<GameConfig>,
    seed: u64,
}

impl Processor {
    pub fn new(config: Arc<GameConfig>, seed: u64) -> Self {
        Self { config, seed }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Apply one event at its due epoch.
    ///
    /// Touched identifiers are recorded in `dirty`. Returns the chained
    /// event, if the event starts something that finishes later.
    pub fn apply(
        &self,
        store: &mut StateStore,
        dirty: &mut DirtySet,
        event: &Event,
    ) -> Result<Option<Event>, ProcessError> {
        let kind = event
            .decode()
            .map_err(|source| ProcessError::MalformedPayload {
                event_id: event.id.clone(),
                name: event.name,
                source,
            })?;
        let now = event.due_epoch;
        let config = self.config.as_ref();
        let mut rng = SimRng::for_event(self.seed, &event.id);

        let chained = match &kind {
            EventKind::CreateCity(p) => city::create_city(config, store, dirty, p, now)?,
            EventKind::DeleteCity(p) => city::delete_city(store, dirty, p)?,
            EventKind::StartMovement(p) => {
                movement::start_movement(config, store, dirty, p, now)?
            }
            EventKind::Arrival(p) => movement::arrival(config, store, dirty, p, now, &mut rng.0)?,
            EventKind::Return(p) => movement::return_home(config, store, dirty, p, now)?,
            EventKind::QueueUnit(p) => production::queue_unit(config, store, dirty, p, now)?,
            EventKind::CreateUnit(p) => production::create_unit(store, dirty, p)?,
            EventKind::QueueBuilding(p) => {
                production::queue_building(config, store, dirty, p, now)?
            }
            EventKind::UpgradeBuilding(p) => {
                production::upgrade_building(config, store, dirty, p, now)?
            }
        };

        debug!(event_id = %event.id, name = %event.name, due = now, "event applied");

        chained
            .map(|next| {
                let name = next.kind.name();
                Event::new(chained_event_id(&event.id, name), next.due_epoch, &next.kind)
                    .map_err(|source| ProcessError::Encode { name, source })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stickerio_events::{Coordinates, CreateCity, PlayerId, QueueUnit};
    use uuid::Uuid;

    fn processor() -> Processor {
        Processor::new(Arc::new(GameConfig::default()), 42)
    }

    fn found(id: &str, city: &str, x: i32, due: Epoch) -> Event {
        let kind = EventKind::CreateCity(CreateCity {
            city_id: city.into(),
            name: city.to_string(),
            player_id: PlayerId::from("p1"),
            location: Coordinates::new(x, 0),
            resources: [("sticks".to_string(), 100)].into(),
            units: [("stickmen".to_string(), 5)].into(),
        });
        Event::new(id, due, &kind).unwrap()
    }

    #[test]
    fn test_chained_ids_are_stable() {
        let parent = EventId::from("evt_1");
        let a = chained_event_id(&parent, EventName::Arrival);
        let b = chained_event_id(&parent, EventName::Arrival);
        let c = chained_event_id(&parent, EventName::Return);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_malformed_payload_is_fatal() {
        let mut store = StateStore::new();
        let mut dirty = DirtySet::new();
        let event = Event {
            id: EventId::from("evt_bad"),
            name: EventName::CreateCity,
            due_epoch: 10,
            payload: "{\"city_id\": 5}".into(),
        };
        let err = processor().apply(&mut store, &mut dirty, &event).unwrap_err();
        assert!(matches!(err, ProcessError::MalformedPayload { .. }));
        assert!(dirty.is_empty());
    }

    #[test]
    fn test_chained_event_inherits_identity() {
        let processor = processor();
        let mut store = StateStore::new();
        let mut dirty = DirtySet::new();
        processor
            .apply(&mut store, &mut dirty, &found("evt_1", "c1", 0, 100))
            .unwrap();

        let queue = Event::new(
            "evt_2",
            110,
            &EventKind::QueueUnit(QueueUnit {
                item_id: "u1".into(),
                city_id: "c1".into(),
                player_id: PlayerId::from("p1"),
                unit_type: "stickmen".into(),
                unit_count: 2,
            }),
        )
        .unwrap();
        let chained = processor
            .apply(&mut store, &mut dirty, &queue)
            .unwrap()
            .expect("training completes later");
        assert_eq!(chained.name, EventName::CreateUnit);
        assert_eq!(chained.id, chained_event_id(&queue.id, EventName::CreateUnit));
        assert_eq!(chained.due_epoch, 170);
    }
}
