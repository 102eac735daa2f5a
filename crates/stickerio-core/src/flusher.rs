//! View Flusher
//!
//! Reconciles every identifier in the dirty set into the read model:
//! present in the store means upsert, absent means delete. The dirty set is
//! only cleared when the whole flush succeeded, so a failed flush is retried
//! with the next pass.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::persistence::{ReadModelError, ReadModelWriter};
use crate::state::{DirtySet, StateStore};

/// Counts from one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub upserts: usize,
    pub deletes: usize,
}

#[derive(Clone)]
pub struct ViewFlusher {
    view: Arc<dyn ReadModelWriter>,
}

impl ViewFlusher {
    pub fn new(view: Arc<dyn ReadModelWriter>) -> Self {
        Self { view }
    }

    /// Flush the dirty set against the store, clearing it on success.
    pub fn flush(
        &self,
        store: &StateStore,
        dirty: &mut DirtySet,
    ) -> Result<FlushStats, ReadModelError> {
        if dirty.is_empty() {
            return Ok(FlushStats::default());
        }
        match self.write(store, dirty) {
            Ok(stats) => {
                debug!(upserts = stats.upserts, deletes = stats.deletes, "view flushed");
                dirty.clear();
                Ok(stats)
            }
            Err(e) => {
                warn!(error = %e, pending = dirty.len(), "view flush failed, keeping dirty set");
                Err(e)
            }
        }
    }

    fn write(&self, store: &StateStore, dirty: &DirtySet) -> Result<FlushStats, ReadModelError> {
        let mut stats = FlushStats::default();

        for id in &dirty.cities {
            match store.city(id) {
                Some(city) => {
                    self.view.upsert_city(city)?;
                    stats.upserts += 1;
                }
                None => {
                    self.view.delete_city(id)?;
                    stats.deletes += 1;
                }
            }
        }

        for id in &dirty.movements {
            match store.movement(id) {
                Some(movement) => {
                    self.view.upsert_movement(movement)?;
                    stats.upserts += 1;
                }
                None => {
                    self.view.delete_movement(id)?;
                    stats.deletes += 1;
                }
            }
        }

        for (city, items) in &dirty.unit_queue {
            for item in items {
                match store.unit_item(city, item) {
                    Some(entry) => {
                        self.view.upsert_unit_item(entry)?;
                        stats.upserts += 1;
                    }
                    None => {
                        self.view.delete_unit_item(city, item)?;
                        stats.deletes += 1;
                    }
                }
            }
        }

        for (city, items) in &dirty.building_queue {
            for item in items {
                match store.building_item(city, item) {
                    Some(entry) => {
                        self.view.upsert_building_item(entry)?;
                        stats.upserts += 1;
                    }
                    None => {
                        self.view.delete_building_item(city, item)?;
                        stats.deletes += 1;
                    }
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use stickerio_events::{
        BuildingQueueItem, City, CityId, Coordinates, Movement, MovementId, PlayerId,
        QueueItemId, UnitQueueItem,
    };

    use crate::persistence::{InMemoryReadModel, ReadModelReader};

    /// Read model that refuses writes while `down` is set
    struct FlakyView {
        inner: InMemoryReadModel,
        down: AtomicBool,
    }

    impl FlakyView {
        fn check(&self) -> Result<(), ReadModelError> {
            if self.down.load(Ordering::SeqCst) {
                Err(ReadModelError::Unavailable("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    impl ReadModelWriter for FlakyView {
        fn upsert_city(&self, city: &City) -> Result<(), ReadModelError> {
            self.check()?;
            self.inner.upsert_city(city)
        }
        fn delete_city(&self, id: &CityId) -> Result<(), ReadModelError> {
            self.check()?;
            self.inner.delete_city(id)
        }
        fn upsert_movement(&self, movement: &Movement) -> Result<(), ReadModelError> {
            self.check()?;
            self.inner.upsert_movement(movement)
        }
        fn delete_movement(&self, id: &MovementId) -> Result<(), ReadModelError> {
            self.check()?;
            self.inner.delete_movement(id)
        }
        fn upsert_unit_item(&self, item: &UnitQueueItem) -> Result<(), ReadModelError> {
            self.check()?;
            self.inner.upsert_unit_item(item)
        }
        fn delete_unit_item(&self, city: &CityId, id: &QueueItemId) -> Result<(), ReadModelError> {
            self.check()?;
            self.inner.delete_unit_item(city, id)
        }
        fn upsert_building_item(&self, item: &BuildingQueueItem) -> Result<(), ReadModelError> {
            self.check()?;
            self.inner.upsert_building_item(item)
        }
        fn delete_building_item(
            &self,
            city: &CityId,
            id: &QueueItemId,
        ) -> Result<(), ReadModelError> {
            self.check()?;
            self.inner.delete_building_item(city, id)
        }
    }

    fn city(id: &str, x: i32) -> City {
        City {
            id: CityId::from(id),
            name: id.to_string(),
            owner: PlayerId::from("p1"),
            location: Coordinates::new(x, 0),
            building_levels: Default::default(),
            resource_base: Default::default(),
            resource_epoch: 0,
            unit_counts: Default::default(),
        }
    }

    #[test]
    fn test_upserts_present_and_deletes_missing() {
        let view = Arc::new(InMemoryReadModel::new());
        let flusher = ViewFlusher::new(view.clone());

        let mut store = StateStore::new();
        store.insert_city(city("c1", 0)).unwrap();
        view.upsert_city(&city("gone", 9)).unwrap();

        let mut dirty = DirtySet::new();
        dirty.mark_city(&CityId::from("c1"));
        dirty.mark_city(&CityId::from("gone"));
        dirty.mark_movement(&MovementId::from("m_never_stored"));

        let stats = flusher.flush(&store, &mut dirty).unwrap();
        assert_eq!(stats, FlushStats { upserts: 1, deletes: 2 });
        assert!(dirty.is_empty());
        assert!(view.get_city(&CityId::from("c1")).unwrap().is_some());
        assert!(view.get_city(&CityId::from("gone")).unwrap().is_none());
    }

    #[test]
    fn test_failed_flush_keeps_dirty_set() {
        let view = Arc::new(FlakyView {
            inner: InMemoryReadModel::new(),
            down: AtomicBool::new(true),
        });
        let flusher = ViewFlusher::new(view.clone());

        let mut store = StateStore::new();
        store.insert_city(city("c1", 0)).unwrap();
        let mut dirty = DirtySet::new();
        dirty.mark_city(&CityId::from("c1"));

        assert!(flusher.flush(&store, &mut dirty).is_err());
        assert_eq!(dirty.len(), 1);

        view.down.store(false, Ordering::SeqCst);
        flusher.flush(&store, &mut dirty).unwrap();
        assert!(dirty.is_empty());
        assert!(view.inner.get_city(&CityId::from("c1")).unwrap().is_some());
    }
}
