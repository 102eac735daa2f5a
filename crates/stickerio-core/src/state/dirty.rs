//! Dirty Set
//!
//! Identifiers touched during a pass, reconciled into the read model by the
//! view flusher. Only cleared after a successful flush.

use std::collections::{BTreeMap, BTreeSet};

use stickerio_events::{CityId, MovementId, QueueItemId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    pub cities: BTreeSet<CityId>,
    pub movements: BTreeSet<MovementId>,
    pub unit_queue: BTreeMap<CityId, BTreeSet<QueueItemId>>,
    pub building_queue: BTreeMap<CityId, BTreeSet<QueueItemId>>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_city(&mut self, id: &CityId) {
        self.cities.insert(id.clone());
    }

    pub fn mark_movement(&mut self, id: &MovementId) {
        self.movements.insert(id.clone());
    }

    pub fn mark_unit_item(&mut self, city: &CityId, item: &QueueItemId) {
        self.unit_queue
            .entry(city.clone())
            .or_default()
            .insert(item.clone());
    }

    pub fn mark_building_item(&mut self, city: &CityId, item: &QueueItemId) {
        self.building_queue
            .entry(city.clone())
            .or_default()
            .insert(item.clone());
    }

    /// Fold another set into this one.
    pub fn merge(&mut self, other: DirtySet) {
        self.cities.extend(other.cities);
        self.movements.extend(other.movements);
        for (city, items) in other.unit_queue {
            self.unit_queue.entry(city).or_default().extend(items);
        }
        for (city, items) in other.building_queue {
            self.building_queue.entry(city).or_default().extend(items);
        }
    }

    /// Number of touched identifiers
    pub fn len(&self) -> usize {
        self.cities.len()
            + self.movements.len()
            + self.unit_queue.values().map(BTreeSet::len).sum::<usize>()
            + self.building_queue.values().map(BTreeSet::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
