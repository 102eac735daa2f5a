//! In-memory event log and read model.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use stickerio_events::{
    BuildingQueueItem, City, CityId, Epoch, Event, Movement, MovementId, QueueItemId,
    UnitQueueItem,
};

use super::{
    CityFilter, EventIndex, EventLog, LogError, MovementFilter, Page, ReadModelError,
    ReadModelReader, ReadModelWriter,
};

/// Event log held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    index: Mutex<EventIndex>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log pre-filled with events.
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let mut index = EventIndex::default();
        for event in events {
            index.insert(event);
        }
        Self {
            index: Mutex::new(index),
        }
    }

    pub fn len(&self) -> usize {
        self.index.lock().map(|index| index.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, EventIndex>, LogError> {
        self.index
            .lock()
            .map_err(|_| LogError::Unavailable("event log lock poisoned".into()))
    }
}

impl EventLog for InMemoryEventLog {
    fn insert(&self, event: &Event) -> Result<bool, LogError> {
        Ok(self.lock()?.insert(event.clone()))
    }

    fn list_due(&self, until_epoch: Epoch) -> Result<Vec<Event>, LogError> {
        Ok(self.lock()?.list_due(until_epoch))
    }
}

#[derive(Debug, Default)]
struct Tables {
    cities: BTreeMap<CityId, City>,
    movements: BTreeMap<MovementId, Movement>,
    unit_items: BTreeMap<CityId, BTreeMap<QueueItemId, UnitQueueItem>>,
    building_items: BTreeMap<CityId, BTreeMap<QueueItemId, BuildingQueueItem>>,
}

/// Read model held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryReadModel {
    tables: Mutex<Tables>,
}

impl InMemoryReadModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn city_count(&self) -> usize {
        self.tables.lock().map(|t| t.cities.len()).unwrap_or(0)
    }

    pub fn movement_count(&self) -> usize {
        self.tables.lock().map(|t| t.movements.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, ReadModelError> {
        self.tables
            .lock()
            .map_err(|_| ReadModelError::Unavailable("read model lock poisoned".into()))
    }
}

fn paginate<'a, T: Clone + 'a>(
    entries: impl Iterator<Item = (&'a str, &'a T)>,
    page: &Page,
) -> Vec<T> {
    entries
        .filter(|(id, _)| page.admits(id))
        .take(page.size)
        .map(|(_, value)| value.clone())
        .collect()
}

impl ReadModelWriter for InMemoryReadModel {
    fn upsert_city(&self, city: &City) -> Result<(), ReadModelError> {
        self.lock()?.cities.insert(city.id.clone(), city.clone());
        Ok(())
    }

    fn delete_city(&self, id: &CityId) -> Result<(), ReadModelError> {
        self.lock()?.cities.remove(id);
        Ok(())
    }

    fn upsert_movement(&self, movement: &Movement) -> Result<(), ReadModelError> {
        self.lock()?
            .movements
            .insert(movement.id.clone(), movement.clone());
        Ok(())
    }

    fn delete_movement(&self, id: &MovementId) -> Result<(), ReadModelError> {
        self.lock()?.movements.remove(id);
        Ok(())
    }

    fn upsert_unit_item(&self, item: &UnitQueueItem) -> Result<(), ReadModelError> {
        self.lock()?
            .unit_items
            .entry(item.city_id.clone())
            .or_default()
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    fn delete_unit_item(&self, city: &CityId, id: &QueueItemId) -> Result<(), ReadModelError> {
        let mut tables = self.lock()?;
        if let Some(queue) = tables.unit_items.get_mut(city) {
            queue.remove(id);
            if queue.is_empty() {
                tables.unit_items.remove(city);
            }
        }
        Ok(())
    }

    fn upsert_building_item(&self, item: &BuildingQueueItem) -> Result<(), ReadModelError> {
        self.lock()?
            .building_items
            .entry(item.city_id.clone())
            .or_default()
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    fn delete_building_item(
        &self,
        city: &CityId,
        id: &QueueItemId,
    ) -> Result<(), ReadModelError> {
        let mut tables = self.lock()?;
        if let Some(queue) = tables.building_items.get_mut(city) {
            queue.remove(id);
            if queue.is_empty() {
                tables.building_items.remove(city);
            }
        }
        Ok(())
    }
}

impl ReadModelReader for InMemoryReadModel {
    fn get_city(&self, id: &CityId) -> Result<Option<City>, ReadModelError> {
        Ok(self.lock()?.cities.get(id).cloned())
    }

    fn list_cities(&self, filter: &CityFilter, page: &Page) -> Result<Vec<City>, ReadModelError> {
        let tables = self.lock()?;
        Ok(paginate(
            tables
                .cities
                .iter()
                .filter(|(_, city)| filter.matches(city))
                .map(|(id, city)| (id.as_str(), city)),
            page,
        ))
    }

    fn get_movement(&self, id: &MovementId) -> Result<Option<Movement>, ReadModelError> {
        Ok(self.lock()?.movements.get(id).cloned())
    }

    fn list_movements(
        &self,
        filter: &MovementFilter,
        page: &Page,
    ) -> Result<Vec<Movement>, ReadModelError> {
        let tables = self.lock()?;
        Ok(paginate(
            tables
                .movements
                .iter()
                .filter(|(_, movement)| filter.matches(movement))
                .map(|(id, movement)| (id.as_str(), movement)),
            page,
        ))
    }

    fn get_unit_item(
        &self,
        city: &CityId,
        id: &QueueItemId,
    ) -> Result<Option<UnitQueueItem>, ReadModelError> {
        Ok(self
            .lock()?
            .unit_items
            .get(city)
            .and_then(|queue| queue.get(id))
            .cloned())
    }

    fn list_unit_items(
        &self,
        city: &CityId,
        page: &Page,
    ) -> Result<Vec<UnitQueueItem>, ReadModelError> {
        let tables = self.lock()?;
        Ok(tables
            .unit_items
            .get(city)
            .map(|queue| paginate(queue.iter().map(|(id, item)| (id.as_str(), item)), page))
            .unwrap_or_default())
    }

    fn get_building_item(
        &self,
        city: &CityId,
        id: &QueueItemId,
    ) -> Result<Option<BuildingQueueItem>, ReadModelError> {
        Ok(self
            .lock()?
            .building_items
            .get(city)
            .and_then(|queue| queue.get(id))
            .cloned())
    }

    fn list_building_items(
        &self,
        city: &CityId,
        page: &Page,
    ) -> Result<Vec<BuildingQueueItem>, ReadModelError> {
        let tables = self.lock()?;
        Ok(tables
            .building_items
            .get(city)
            .map(|queue| paginate(queue.iter().map(|(id, item)| (id.as_str(), item)), page))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Bounds;
    use stickerio_events::{Coordinates, DeleteCity, EventKind, PlayerId};

    fn city(id: &str, owner: &str, x: i32, y: i32) -> City {
        City {
            id: CityId::from(id),
            name: id.to_string(),
            owner: PlayerId::from(owner),
            location: Coordinates::new(x, y),
            building_levels: Default::default(),
            resource_base: Default::default(),
            resource_epoch: 0,
            unit_counts: Default::default(),
        }
    }

    #[test]
    fn test_event_log_is_idempotent() {
        let log = InMemoryEventLog::new();
        let kind = EventKind::DeleteCity(DeleteCity {
            city_id: CityId::from("c1"),
            player_id: PlayerId::from("p1"),
        });
        let event = Event::new("evt_1", 10, &kind).unwrap();
        assert!(log.insert(&event).unwrap());
        assert!(!log.insert(&event).unwrap());
        assert_eq!(log.len(), 1);
        assert!(log.list_due(9).unwrap().is_empty());
        assert_eq!(log.list_due(10).unwrap(), vec![event]);
    }

    #[test]
    fn test_city_queries() {
        let view = InMemoryReadModel::new();
        for (id, owner, x, y) in [
            ("c1", "p1", 0, 0),
            ("c2", "p1", 10, 10),
            ("c3", "p2", 1, -1),
            ("c4", "p1", -1, 1),
        ] {
            view.upsert_city(&city(id, owner, x, y)).unwrap();
        }

        let mine = CityFilter {
            player: Some(PlayerId::from("p1")),
            bounds: None,
        };
        let ids = |cities: Vec<City>| cities.into_iter().map(|c| c.id.0).collect::<Vec<_>>();
        assert_eq!(
            ids(view.list_cities(&mine, &Page::default()).unwrap()),
            vec!["c1", "c2", "c4"]
        );
        assert_eq!(
            ids(view.list_cities(&mine, &Page::after("c1", 1)).unwrap()),
            vec!["c2"]
        );

        let nearby = CityFilter {
            player: None,
            bounds: Some(Bounds {
                min: Coordinates::new(-1, -1),
                max: Coordinates::new(1, 1),
            }),
        };
        assert_eq!(
            ids(view.list_cities(&nearby, &Page::default()).unwrap()),
            vec!["c1", "c3", "c4"]
        );

        view.delete_city(&CityId::from("c1")).unwrap();
        view.delete_city(&CityId::from("c1")).unwrap();
        assert!(view.get_city(&CityId::from("c1")).unwrap().is_none());
        assert_eq!(view.city_count(), 3);
    }

    #[test]
    fn test_queue_items_by_city() {
        let view = InMemoryReadModel::new();
        for (id, city) in [("u1", "c1"), ("u2", "c1"), ("u3", "c2")] {
            view.upsert_unit_item(&UnitQueueItem {
                id: QueueItemId::from(id),
                city_id: CityId::from(city),
                player_id: PlayerId::from("p1"),
                queued_epoch: 0,
                duration_sec: 10,
                unit_type: "stickmen".into(),
                unit_count: 1,
            })
            .unwrap();
        }
        let c1 = CityId::from("c1");
        assert_eq!(view.list_unit_items(&c1, &Page::default()).unwrap().len(), 2);
        view.delete_unit_item(&c1, &QueueItemId::from("u1")).unwrap();
        assert!(view.get_unit_item(&c1, &QueueItemId::from("u1")).unwrap().is_none());
        assert!(view
            .list_building_items(&c1, &Page::default())
            .unwrap()
            .is_empty());
    }
}
