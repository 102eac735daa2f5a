//! Materialized State Store
//!
//! In-memory view of the game as of the last applied event: cities with a
//! coordinate index kept in step with the primary map, movements, and the
//! per-city production queues.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use stickerio_events::{
    BuildingQueueItem, City, CityId, Coordinates, Movement, MovementId, QueueItemId,
    UnitQueueItem,
};

use super::dirty::DirtySet;

/// A write that would break a store invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("city {0} already exists")]
    CityExists(CityId),
    #[error("coordinate ({}, {}) already holds city {occupant}", .location.x, .location.y)]
    CoordinateTaken {
        location: Coordinates,
        occupant: CityId,
    },
    #[error("city {0} does not exist")]
    MissingCity(CityId),
    #[error("city {0} cannot change location")]
    LocationChanged(CityId),
    #[error("movement {0} already exists")]
    MovementExists(MovementId),
    #[error("queue item {item} already exists in city {city}")]
    QueueItemExists { city: CityId, item: QueueItemId },
}

/// A city taken out of the store together with its queues
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedCity {
    pub city: City,
    pub unit_items: Vec<QueueItemId>,
    pub building_items: Vec<QueueItemId>,
}

/// Ordered, serializable copy of the whole store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub cities: Vec<City>,
    pub movements: Vec<Movement>,
    pub unit_queue: Vec<UnitQueueItem>,
    pub building_queue: Vec<BuildingQueueItem>,
}

impl StoreSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StateStore {
    cities: BTreeMap<CityId, City>,
    city_index: BTreeMap<Coordinates, CityId>,
    movements: BTreeMap<MovementId, Movement>,
    unit_queues: BTreeMap<CityId, BTreeMap<QueueItemId, UnitQueueItem>>,
    building_queues: BTreeMap<CityId, BTreeMap<QueueItemId, BuildingQueueItem>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ---- cities ----

    pub fn city(&self, id: &CityId) -> Option<&City> {
        self.cities.get(id)
    }

    /// Mutable access for resource, unit and building updates.
    ///
    /// The location must not change; it is keyed in the coordinate index.
    pub fn city_mut(&mut self, id: &CityId) -> Option<&mut City> {
        self.cities.get_mut(id)
    }

    pub fn city_at(&self, location: &Coordinates) -> Option<&City> {
        self.city_index
            .get(location)
            .and_then(|id| self.cities.get(id))
    }

    pub fn cities(&self) -> impl Iterator<Item = &City> {
        self.cities.values()
    }

    pub fn insert_city(&mut self, city: City) -> Result<(), StoreError> {
        if self.cities.contains_key(&city.id) {
            return Err(StoreError::CityExists(city.id));
        }
        if let Some(occupant) = self.city_index.get(&city.location) {
            return Err(StoreError::CoordinateTaken {
                location: city.location,
                occupant: occupant.clone(),
            });
        }
        self.city_index.insert(city.location, city.id.clone());
        self.cities.insert(city.id.clone(), city);
        Ok(())
    }

    /// Replace a stored city with an updated copy at the same location.
    pub fn replace_city(&mut self, city: City) -> Result<(), StoreError> {
        match self.cities.get_mut(&city.id) {
            Some(existing) if existing.location == city.location => {
                *existing = city;
                Ok(())
            }
            Some(_) => Err(StoreError::LocationChanged(city.id)),
            None => Err(StoreError::MissingCity(city.id)),
        }
    }

    /// Remove a city, its queues and its coordinate index entry.
    pub fn remove_city(&mut self, id: &CityId) -> Option<RemovedCity> {
        let city = self.cities.remove(id)?;
        self.city_index.remove(&city.location);
        let unit_items = self
            .unit_queues
            .remove(id)
            .map(|queue| queue.into_keys().collect())
            .unwrap_or_default();
        let building_items = self
            .building_queues
            .remove(id)
            .map(|queue| queue.into_keys().collect())
            .unwrap_or_default();
        Some(RemovedCity {
            city,
            unit_items,
            building_items,
        })
    }

    // ---- movements ----

    pub fn movement(&self, id: &MovementId) -> Option<&Movement> {
        self.movements.get(id)
    }

    pub fn movement_mut(&mut self, id: &MovementId) -> Option<&mut Movement> {
        self.movements.get_mut(id)
    }

    pub fn movements(&self) -> impl Iterator<Item = &Movement> {
        self.movements.values()
    }

    pub fn insert_movement(&mut self, movement: Movement) -> Result<(), StoreError> {
        if self.movements.contains_key(&movement.id) {
            return Err(StoreError::MovementExists(movement.id));
        }
        self.movements.insert(movement.id.clone(), movement);
        Ok(())
    }

    pub fn remove_movement(&mut self, id: &MovementId) -> Option<Movement> {
        self.movements.remove(id)
    }

    // ---- production queues ----

    pub fn unit_item(&self, city: &CityId, item: &QueueItemId) -> Option<&UnitQueueItem> {
        self.unit_queues.get(city).and_then(|queue| queue.get(item))
    }

    pub fn unit_queue(&self, city: &CityId) -> impl Iterator<Item = &UnitQueueItem> {
        self.unit_queues.get(city).into_iter().flat_map(|q| q.values())
    }

    pub fn insert_unit_item(&mut self, item: UnitQueueItem) -> Result<(), StoreError> {
        if !self.cities.contains_key(&item.city_id) {
            return Err(StoreError::MissingCity(item.city_id));
        }
        let queue = self.unit_queues.entry(item.city_id.clone()).or_default();
        if queue.contains_key(&item.id) {
            return Err(StoreError::QueueItemExists {
                city: item.city_id,
                item: item.id,
            });
        }
        queue.insert(item.id.clone(), item);
        Ok(())
    }

    pub fn remove_unit_item(&mut self, city: &CityId, item: &QueueItemId) -> Option<UnitQueueItem> {
        let queue = self.unit_queues.get_mut(city)?;
        let removed = queue.remove(item);
        if queue.is_empty() {
            self.unit_queues.remove(city);
        }
        removed
    }

    pub fn building_item(&self, city: &CityId, item: &QueueItemId) -> Option<&BuildingQueueItem> {
        self.building_queues.get(city).and_then(|queue| queue.get(item))
    }

    pub fn building_queue(&self, city: &CityId) -> impl Iterator<Item = &BuildingQueueItem> {
        self.building_queues
            .get(city)
            .into_iter()
            .flat_map(|q| q.values())
    }

    pub fn insert_building_item(&mut self, item: BuildingQueueItem) -> Result<(), StoreError> {
        if !self.cities.contains_key(&item.city_id) {
            return Err(StoreError::MissingCity(item.city_id));
        }
        let queue = self.building_queues.entry(item.city_id.clone()).or_default();
        if queue.contains_key(&item.id) {
            return Err(StoreError::QueueItemExists {
                city: item.city_id,
                item: item.id,
            });
        }
        queue.insert(item.id.clone(), item);
        Ok(())
    }

    pub fn remove_building_item(
        &mut self,
        city: &CityId,
        item: &QueueItemId,
    ) -> Option<BuildingQueueItem> {
        let queue = self.building_queues.get_mut(city)?;
        let removed = queue.remove(item);
        if queue.is_empty() {
            self.building_queues.remove(city);
        }
        removed
    }

    // ---- whole-store views ----

    /// Every identifier currently held, as a dirty set
    pub fn all_ids(&self) -> DirtySet {
        let mut ids = DirtySet::new();
        for id in self.cities.keys() {
            ids.mark_city(id);
        }
        for id in self.movements.keys() {
            ids.mark_movement(id);
        }
        for (city, queue) in &self.unit_queues {
            for item in queue.keys() {
                ids.mark_unit_item(city, item);
            }
        }
        for (city, queue) in &self.building_queues {
            for item in queue.keys() {
                ids.mark_building_item(city, item);
            }
        }
        ids
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            cities: self.cities.values().cloned().collect(),
            movements: self.movements.values().cloned().collect(),
            unit_queue: self
                .unit_queues
                .values()
                .flat_map(|q| q.values().cloned())
                .collect(),
            building_queue: self
                .building_queues
                .values()
                .flat_map(|q| q.values().cloned())
                .collect(),
        }
    }

    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    pub fn movement_count(&self) -> usize {
        self.movements.len()
    }
}
