//! Unit training and building upgrades.
//!
//! Queueing pays up front and chains the completion. A completion only
//! takes effect while its queue item still exists and the city is still
//! owned by the player who queued it; otherwise it is silently cancelled.

use stickerio_events::{
    BuildingQueueItem, BuildingReady, Epoch, EventKind, QueueBuilding, QueueUnit, UnitQueueItem,
    UnitReady, UnitCounts,
};

use super::city::owned_city;
use super::{due_after, Chained};
use crate::calculators::{self, deposit};
use crate::config::GameConfig;
use crate::error::{ProcessError, Rejection};
use crate::state::{DirtySet, StateStore};

pub(super) fn queue_unit(
    config: &GameConfig,
    store: &mut StateStore,
    dirty: &mut DirtySet,
    payload: &QueueUnit,
    now: Epoch,
) -> Result<Option<Chained>, ProcessError> {
    let city = owned_city(store, &payload.city_id, &payload.player_id)?;
    if config.unit(&payload.unit_type).is_none() {
        return Err(Rejection::UnknownUnit(payload.unit_type.clone()).into());
    }
    if payload.unit_count <= 0 {
        return Err(Rejection::InvalidCount {
            name: payload.unit_type.clone(),
            count: payload.unit_count,
        }
        .into());
    }
    if store.unit_item(&payload.city_id, &payload.item_id).is_some() {
        return Err(Rejection::DuplicateQueueItem {
            city: payload.city_id.clone(),
            item: payload.item_id.clone(),
        }
        .into());
    }

    let cost = calculators::training_cost(config, &payload.unit_type, payload.unit_count)
        .unwrap_or_default();
    let duration =
        calculators::training_duration(config, city, &payload.unit_type, payload.unit_count)
            .ok_or_else(|| Rejection::UnknownUnit(payload.unit_type.clone()))?;
    let due_epoch = due_after(now, duration)?;

    let mut updated = city.clone();
    calculators::spend(config, &mut updated, &cost, now)?;

    store.replace_city(updated)?;
    store.insert_unit_item(UnitQueueItem {
        id: payload.item_id.clone(),
        city_id: payload.city_id.clone(),
        player_id: payload.player_id.clone(),
        queued_epoch: now,
        duration_sec: duration,
        unit_type: payload.unit_type.clone(),
        unit_count: payload.unit_count,
    })?;
    dirty.mark_city(&payload.city_id);
    dirty.mark_unit_item(&payload.city_id, &payload.item_id);

    Ok(Some(Chained {
        due_epoch,
        kind: EventKind::CreateUnit(UnitReady::from(payload)),
    }))
}

pub(super) fn create_unit(
    store: &mut StateStore,
    dirty: &mut DirtySet,
    payload: &UnitReady,
) -> Result<Option<Chained>, ProcessError> {
    let Some(item) = store.remove_unit_item(&payload.city_id, &payload.item_id) else {
        return Ok(None);
    };
    dirty.mark_unit_item(&payload.city_id, &payload.item_id);

    if let Some(city) = store.city_mut(&item.city_id) {
        if city.is_owned_by(&item.player_id) && item.player_id == payload.player_id {
            let trained = UnitCounts::from([(item.unit_type.clone(), item.unit_count)]);
            deposit(&mut city.unit_counts, &trained);
            dirty.mark_city(&item.city_id);
        }
    }
    Ok(None)
}

pub(super) fn queue_building(
    config: &GameConfig,
    store: &mut StateStore,
    dirty: &mut DirtySet,
    payload: &QueueBuilding,
    now: Epoch,
) -> Result<Option<Chained>, ProcessError> {
    let city = owned_city(store, &payload.city_id, &payload.player_id)?;
    let spec = config
        .building(&payload.building)
        .ok_or_else(|| Rejection::UnknownBuilding(payload.building.clone()))?;

    let current = city.building_level(&payload.building);
    let target = payload.target_level;
    if target < 1 || target > spec.max_level || target > current + 1 {
        return Err(Rejection::InvalidLevel {
            building: payload.building.clone(),
            current,
            target,
        }
        .into());
    }
    if store
        .building_item(&payload.city_id, &payload.item_id)
        .is_some()
    {
        return Err(Rejection::DuplicateQueueItem {
            city: payload.city_id.clone(),
            item: payload.item_id.clone(),
        }
        .into());
    }

    let invalid_level = || Rejection::InvalidLevel {
        building: payload.building.clone(),
        current,
        target,
    };
    let cost = calculators::upgrade_cost(config, &payload.building, target).ok_or_else(invalid_level)?;
    let duration = calculators::upgrade_duration(config, city, &payload.building, target)
        .ok_or_else(invalid_level)?;
    let due_epoch = due_after(now, duration)?;

    let mut updated = city.clone();
    calculators::spend(config, &mut updated, &cost, now)?;

    store.replace_city(updated)?;
    store.insert_building_item(BuildingQueueItem {
        id: payload.item_id.clone(),
        city_id: payload.city_id.clone(),
        player_id: payload.player_id.clone(),
        queued_epoch: now,
        duration_sec: duration,
        building: payload.building.clone(),
        target_level: target,
    })?;
    dirty.mark_city(&payload.city_id);
    dirty.mark_building_item(&payload.city_id, &payload.item_id);

    Ok(Some(Chained {
        due_epoch,
        kind: EventKind::UpgradeBuilding(BuildingReady::from(payload)),
    }))
}

pub(super) fn upgrade_building(
    config: &GameConfig,
    store: &mut StateStore,
    dirty: &mut DirtySet,
    payload: &BuildingReady,
    now: Epoch,
) -> Result<Option<Chained>, ProcessError> {
    let Some(item) = store.remove_building_item(&payload.city_id, &payload.item_id) else {
        return Ok(None);
    };
    dirty.mark_building_item(&payload.city_id, &payload.item_id);

    if let Some(city) = store.city_mut(&item.city_id) {
        if city.is_owned_by(&item.player_id) && item.player_id == payload.player_id {
            // Accrue at the old rates before the level changes them
            calculators::settle(config, city, now);
            city.building_levels
                .insert(item.building.clone(), item.target_level);
            dirty.mark_city(&item.city_id);
        }
    }
    Ok(None)
}
