//! Persistence Boundaries
//!
//! The event log is the single source of truth; the read model is the
//! queryable projection the flusher keeps in step with the state store.
//! Both are traits so the engine can run against the in-memory backends in
//! tests and a JSONL file log in the binary.

mod jsonl;
mod memory;

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

use stickerio_events::{
    BuildingQueueItem, City, CityId, Coordinates, Epoch, Event, EventId, EventKey, Movement,
    MovementId, PlayerId, QueueItemId, UnitQueueItem,
};

pub use jsonl::JsonlEventLog;
pub use memory::{InMemoryEventLog, InMemoryReadModel};

/// Errors from an event log backend.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("event log I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed event on line {line} of {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode event {id}: {source}")]
    Encode {
        id: EventId,
        #[source]
        source: serde_json::Error,
    },
    #[error("event log unavailable: {0}")]
    Unavailable(String),
}

/// Errors from a read-model backend.
#[derive(Debug, Error)]
pub enum ReadModelError {
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("read model unavailable: {0}")]
    Unavailable(String),
}

/// Append-only, idempotent event storage.
pub trait EventLog: Send + Sync {
    /// Persist an event; `false` when its id is already present.
    fn insert(&self, event: &Event) -> Result<bool, LogError>;

    /// Every event due at or before `until_epoch`, ordered by `(due_epoch, id)`.
    fn list_due(&self, until_epoch: Epoch) -> Result<Vec<Event>, LogError>;
}

/// Write side of the read model. Upserts and deletes are idempotent.
pub trait ReadModelWriter: Send + Sync {
    fn upsert_city(&self, city: &City) -> Result<(), ReadModelError>;
    fn delete_city(&self, id: &CityId) -> Result<(), ReadModelError>;

    fn upsert_movement(&self, movement: &Movement) -> Result<(), ReadModelError>;
    fn delete_movement(&self, id: &MovementId) -> Result<(), ReadModelError>;

    fn upsert_unit_item(&self, item: &UnitQueueItem) -> Result<(), ReadModelError>;
    fn delete_unit_item(&self, city: &CityId, id: &QueueItemId) -> Result<(), ReadModelError>;

    fn upsert_building_item(&self, item: &BuildingQueueItem) -> Result<(), ReadModelError>;
    fn delete_building_item(&self, city: &CityId, id: &QueueItemId)
        -> Result<(), ReadModelError>;
}

/// Query side of the read model.
pub trait ReadModelReader: Send + Sync {
    fn get_city(&self, id: &CityId) -> Result<Option<City>, ReadModelError>;
    fn list_cities(&self, filter: &CityFilter, page: &Page) -> Result<Vec<City>, ReadModelError>;

    fn get_movement(&self, id: &MovementId) -> Result<Option<Movement>, ReadModelError>;
    fn list_movements(
        &self,
        filter: &MovementFilter,
        page: &Page,
    ) -> Result<Vec<Movement>, ReadModelError>;

    fn get_unit_item(
        &self,
        city: &CityId,
        id: &QueueItemId,
    ) -> Result<Option<UnitQueueItem>, ReadModelError>;
    fn list_unit_items(
        &self,
        city: &CityId,
        page: &Page,
    ) -> Result<Vec<UnitQueueItem>, ReadModelError>;

    fn get_building_item(
        &self,
        city: &CityId,
        id: &QueueItemId,
    ) -> Result<Option<BuildingQueueItem>, ReadModelError>;
    fn list_building_items(
        &self,
        city: &CityId,
        page: &Page,
    ) -> Result<Vec<BuildingQueueItem>, ReadModelError>;
}

/// Cursor pagination: entries with an id strictly after `after`, by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub after: Option<String>,
    pub size: usize,
}

impl Page {
    pub const DEFAULT_SIZE: usize = 100;

    pub fn first(size: usize) -> Self {
        Self { after: None, size }
    }

    pub fn after(id: impl Into<String>, size: usize) -> Self {
        Self {
            after: Some(id.into()),
            size,
        }
    }

    pub(crate) fn admits(&self, id: &str) -> bool {
        self.after.as_deref().map_or(true, |after| id > after)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first(Self::DEFAULT_SIZE)
    }
}

/// Inclusive rectangle on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: Coordinates,
    pub max: Coordinates,
}

impl Bounds {
    pub fn contains(&self, point: &Coordinates) -> bool {
        (self.min.x..=self.max.x).contains(&point.x) && (self.min.y..=self.max.y).contains(&point.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityFilter {
    pub player: Option<PlayerId>,
    pub bounds: Option<Bounds>,
}

impl CityFilter {
    pub fn matches(&self, city: &City) -> bool {
        self.player.as_ref().map_or(true, |p| &city.owner == p)
            && self.bounds.map_or(true, |b| b.contains(&city.location))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub player: Option<PlayerId>,
    pub origin: Option<CityId>,
    pub destination: Option<CityId>,
}

impl MovementFilter {
    pub fn matches(&self, movement: &Movement) -> bool {
        self.player.as_ref().map_or(true, |p| &movement.player_id == p)
            && self
                .origin
                .as_ref()
                .map_or(true, |c| movement.origin.city_id.as_ref() == Some(c))
            && self
                .destination
                .as_ref()
                .map_or(true, |c| movement.destination.city_id.as_ref() == Some(c))
    }
}

/// Events ordered by `(due_epoch, id)` with an id set for idempotent inserts.
#[derive(Debug, Default)]
pub(crate) struct EventIndex {
    by_key: BTreeMap<EventKey, Event>,
    ids: HashSet<EventId>,
}

impl EventIndex {
    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    pub fn insert(&mut self, event: Event) -> bool {
        if !self.ids.insert(event.id.clone()) {
            return false;
        }
        self.by_key.insert(event.key(), event);
        true
    }

    pub fn list_due(&self, until_epoch: Epoch) -> Vec<Event> {
        self.by_key
            .values()
            .take_while(|event| event.due_epoch <= until_epoch)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stickerio_events::{DeleteCity, EventKind, Leg, Place};

    fn event(id: &str, due: Epoch) -> Event {
        let kind = EventKind::DeleteCity(DeleteCity {
            city_id: CityId::from("c1"),
            player_id: PlayerId::from("p1"),
        });
        Event::new(id, due, &kind).unwrap()
    }

    #[test]
    fn test_index_orders_and_dedups() {
        let mut index = EventIndex::default();
        assert!(index.insert(event("b", 20)));
        assert!(index.insert(event("c", 10)));
        assert!(index.insert(event("a", 10)));
        assert!(!index.insert(event("a", 5)));

        let ids: Vec<String> = index.list_due(15).iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(index.list_due(20).len(), 3);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_page_cursor() {
        let page = Page::after("m05", 10);
        assert!(page.admits("m06"));
        assert!(!page.admits("m05"));
        assert!(Page::default().admits(""));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let bounds = Bounds {
            min: Coordinates::new(-2, -2),
            max: Coordinates::new(2, 2),
        };
        assert!(bounds.contains(&Coordinates::new(2, -2)));
        assert!(!bounds.contains(&Coordinates::new(3, 0)));
    }

    #[test]
    fn test_movement_filter() {
        let movement = Movement {
            id: MovementId::from("m1"),
            player_id: PlayerId::from("p1"),
            origin: Place {
                city_id: Some(CityId::from("c1")),
                location: Coordinates::new(0, 0),
            },
            destination: Place {
                city_id: None,
                location: Coordinates::new(5, 5),
            },
            leg: Leg::Outbound,
            departure_epoch: 0,
            speed: 1.0,
            carried_units: Default::default(),
            carried_resources: Default::default(),
        };
        let by_origin = MovementFilter {
            origin: Some(CityId::from("c1")),
            ..Default::default()
        };
        assert!(by_origin.matches(&movement));

        let by_destination = MovementFilter {
            destination: Some(CityId::from("c2")),
            ..Default::default()
        };
        assert!(!by_destination.matches(&movement));

        let by_player = MovementFilter {
            player: Some(PlayerId::from("p2")),
            ..Default::default()
        };
        assert!(!by_player.matches(&movement));
    }
}
