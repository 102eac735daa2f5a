//! City foundation and removal.

use stickerio_events::{City, CityId, CreateCity, DeleteCity, Epoch, PlayerId};

use super::Chained;
use crate::calculators;
use crate::config::GameConfig;
use crate::error::{ProcessError, Rejection};
use crate::state::{DirtySet, StateStore};

pub(super) fn create_city(
    config: &GameConfig,
    store: &mut StateStore,
    dirty: &mut DirtySet,
    payload: &CreateCity,
    now: Epoch,
) -> Result<Option<Chained>, ProcessError> {
    if store.city(&payload.city_id).is_some() {
        return Err(Rejection::CityIdTaken(payload.city_id.clone()).into());
    }
    if store.city_at(&payload.location).is_some() {
        return Err(Rejection::CoordinateOccupied(payload.location).into());
    }
    for (unit, count) in &payload.units {
        if config.unit(unit).is_none() {
            return Err(Rejection::UnknownUnit(unit.clone()).into());
        }
        check_count(unit, *count)?;
    }
    for (resource, amount) in &payload.resources {
        check_count(resource, *amount)?;
    }

    let mut city = City {
        id: payload.city_id.clone(),
        name: payload.name.clone(),
        owner: payload.player_id.clone(),
        location: payload.location,
        building_levels: Default::default(),
        resource_base: payload.resources.clone(),
        resource_epoch: now,
        unit_counts: payload.units.clone(),
    };
    calculators::prune(&mut city.resource_base);
    calculators::prune(&mut city.unit_counts);

    store.insert_city(city)?;
    dirty.mark_city(&payload.city_id);
    Ok(None)
}

pub(super) fn delete_city(
    store: &mut StateStore,
    dirty: &mut DirtySet,
    payload: &DeleteCity,
) -> Result<Option<Chained>, ProcessError> {
    owned_city(store, &payload.city_id, &payload.player_id)?;
    remove_city(store, dirty, &payload.city_id);
    Ok(None)
}

/// Look up a city and check the caller owns it.
pub(super) fn owned_city<'a>(
    store: &'a StateStore,
    city: &CityId,
    player: &PlayerId,
) -> Result<&'a City, Rejection> {
    let found = store
        .city(city)
        .ok_or_else(|| Rejection::UnknownCity(city.clone()))?;
    if !found.is_owned_by(player) {
        return Err(Rejection::NotOwner {
            player: player.clone(),
            city: city.clone(),
        });
    }
    Ok(found)
}

/// Remove a city and mark it and its queue items dirty.
pub(super) fn remove_city(store: &mut StateStore, dirty: &mut DirtySet, city: &CityId) {
    if let Some(removed) = store.remove_city(city) {
        dirty.mark_city(city);
        for item in &removed.unit_items {
            dirty.mark_unit_item(city, item);
        }
        for item in &removed.building_items {
            dirty.mark_building_item(city, item);
        }
    }
}

pub(super) fn check_count(name: &str, count: i64) -> Result<(), Rejection> {
    if count < 0 {
        return Err(Rejection::InvalidCount {
            name: name.to_string(),
            count,
        });
    }
    Ok(())
}
