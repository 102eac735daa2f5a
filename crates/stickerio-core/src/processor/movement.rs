//! Movement lifecycle: departure, arrival and return.
//!
//! A movement addresses places rather than cities. On arrival the city
//! currently standing on the destination coordinate decides the outcome:
//! nobody there means foraging, an own city means reinforcement and anyone
//! else's city means a raid. The return leg resolves the origin coordinate
//! the same way.

use rand::Rng;
use tracing::{debug, info};

use stickerio_events::{
    CityId, Epoch, EventKind, Leg, Movement, MovementId, MovementStep, Place, PlayerId, StartMovement,
    UnitCounts,
};

use super::city::{check_count, owned_city, remove_city};
use super::{due_after, Chained};
use crate::calculators::{self, deposit, withdraw};
use crate::config::GameConfig;
use crate::error::{ProcessError, Rejection};
use crate::state::{DirtySet, StateStore};

pub(super) fn start_movement(
    config: &GameConfig,
    store: &mut StateStore,
    dirty: &mut DirtySet,
    payload: &StartMovement,
    now: Epoch,
) -> Result<Option<Chained>, ProcessError> {
    if store.movement(&payload.movement_id).is_some() {
        return Err(Rejection::MovementIdTaken(payload.movement_id.clone()).into());
    }
    let origin = owned_city(store, &payload.origin_id, &payload.player_id)?;
    if origin.location == payload.destination {
        return Err(Rejection::SameOriginAndDestination(payload.destination).into());
    }

    let mut units = payload.units.clone();
    for (unit, count) in &units {
        check_count(unit, *count)?;
        if config.unit(unit).is_none() {
            return Err(Rejection::UnknownUnit(unit.clone()).into());
        }
        let available = origin.units_of(unit);
        if available < *count {
            return Err(Rejection::InsufficientUnits {
                unit: unit.clone(),
                requested: *count,
                available,
            }
            .into());
        }
    }
    calculators::prune(&mut units);
    let speed = calculators::slowest_speed(config, &units).ok_or(Rejection::EmptyGroup)?;

    let mut cargo = payload.resources.clone();
    for (resource, amount) in &cargo {
        check_count(resource, *amount)?;
    }
    calculators::prune(&mut cargo);

    // Debit a copy so a failed spend leaves the city untouched
    let mut updated = origin.clone();
    withdraw(&mut updated.unit_counts, &units);
    calculators::spend(config, &mut updated, &cargo, now)?;

    let arrival = due_after(
        now,
        calculators::travel_time(&updated.location, &payload.destination, speed),
    )?;
    let movement = Movement {
        id: payload.movement_id.clone(),
        player_id: payload.player_id.clone(),
        origin: Place {
            city_id: Some(updated.id.clone()),
            location: updated.location,
        },
        destination: Place {
            city_id: payload.destination_id.clone(),
            location: payload.destination,
        },
        leg: Leg::Outbound,
        departure_epoch: now,
        speed,
        carried_units: units,
        carried_resources: cargo,
    };

    dirty.mark_city(&updated.id);
    dirty.mark_movement(&movement.id);
    store.replace_city(updated)?;
    store.insert_movement(movement)?;

    Ok(Some(Chained {
        due_epoch: arrival,
        kind: EventKind::Arrival(step(payload.movement_id.clone(), payload.player_id.clone())),
    }))
}

pub(super) fn arrival<R: Rng + ?Sized>(
    config: &GameConfig,
    store: &mut StateStore,
    dirty: &mut DirtySet,
    payload: &MovementStep,
    now: Epoch,
    rng: &mut R,
) -> Result<Option<Chained>, ProcessError> {
    let mut movement = leg_of(store, payload, Leg::Outbound)?.clone();
    dirty.mark_movement(&movement.id);

    let target = movement.destination.location;
    let occupant = store
        .city_at(&target)
        .map(|city| (city.id.clone(), city.owner.clone()));

    match occupant {
        None => {
            let free = calculators::free_capacity(
                config,
                &movement.carried_units,
                &movement.carried_resources,
            );
            let found = calculators::forage(config, free, rng);
            debug!(movement_id = %movement.id, ?found, "foraged");
            deposit(&mut movement.carried_resources, &found);
            turn_back(config, store, movement, now).map(Some)
        }
        Some((city_id, owner)) if owner == movement.player_id => {
            let Some(city) = store.city_mut(&city_id) else {
                return Err(invariant(&city_id));
            };
            calculators::credit(config, city, &movement.carried_resources, now);
            deposit(&mut city.unit_counts, &movement.carried_units);
            dirty.mark_city(&city_id);
            store.remove_movement(&movement.id);
            Ok(None)
        }
        Some((city_id, _)) => {
            let Some(mut defender) = store.city(&city_id).cloned() else {
                return Err(invariant(&city_id));
            };
            calculators::settle(config, &mut defender, now);

            let outcome = calculators::resolve_combat(
                config,
                &movement.carried_units,
                &defender.unit_counts,
                rng,
            );
            info!(
                movement_id = %movement.id,
                city_id = %city_id,
                swing = outcome.swing,
                "raid resolved"
            );
            defender.unit_counts = outcome.defenders;
            movement.carried_units = outcome.attackers;

            let chained = if movement.total_units() == 0 {
                store.remove_movement(&movement.id);
                None
            } else {
                let free = calculators::free_capacity(
                    config,
                    &movement.carried_units,
                    &movement.carried_resources,
                );
                let loot = calculators::plunder(
                    free,
                    &movement.carried_resources,
                    &defender.resource_base,
                );
                withdraw(&mut defender.resource_base, &loot.taken);
                deposit(&mut movement.carried_resources, &loot.taken);
                withdraw(&mut movement.carried_resources, &loot.returned);
                deposit(&mut defender.resource_base, &loot.returned);
                Some(turn_back(config, store, movement, now)?)
            };

            let emptied = defender.total_units() == 0
                && defender.resource_base.values().all(|amount| *amount == 0);
            store.replace_city(defender)?;
            if emptied {
                info!(city_id = %city_id, "city conquered and emptied");
                remove_city(store, dirty, &city_id);
            } else {
                dirty.mark_city(&city_id);
            }
            Ok(chained)
        }
    }
}

pub(super) fn return_home(
    config: &GameConfig,
    store: &mut StateStore,
    dirty: &mut DirtySet,
    payload: &MovementStep,
    now: Epoch,
) -> Result<Option<Chained>, ProcessError> {
    let movement = leg_of(store, payload, Leg::Return)?.clone();
    store.remove_movement(&movement.id);
    dirty.mark_movement(&movement.id);

    let home = store
        .city_at(&movement.origin.location)
        .map(|city| (city.id.clone(), city.owner.clone()));
    match home {
        Some((city_id, owner)) if owner == movement.player_id => {
            let Some(city) = store.city_mut(&city_id) else {
                return Err(invariant(&city_id));
            };
            calculators::credit(config, city, &movement.carried_resources, now);
            deposit(&mut city.unit_counts, &movement.carried_units);
            dirty.mark_city(&city_id);
        }
        Some((city_id, _)) => {
            info!(movement_id = %movement.id, city_id = %city_id, "origin changed hands, expedition lost");
        }
        None => {
            info!(movement_id = %movement.id, "origin gone, expedition lost");
        }
    }
    Ok(None)
}

/// Look up a movement on the expected leg owned by the payload player.
fn leg_of<'a>(
    store: &'a StateStore,
    payload: &MovementStep,
    expected: Leg,
) -> Result<&'a Movement, Rejection> {
    let movement = store
        .movement(&payload.movement_id)
        .ok_or_else(|| Rejection::UnknownMovement(payload.movement_id.clone()))?;
    if movement.player_id != payload.player_id {
        return Err(Rejection::NotMovementOwner {
            player: payload.player_id.clone(),
            movement: movement.id.clone(),
        });
    }
    if movement.leg != expected {
        return Err(Rejection::WrongLeg {
            movement: movement.id.clone(),
            actual: movement.leg,
        });
    }
    Ok(movement)
}

/// Flip the movement onto its return leg and store it.
fn turn_back(
    config: &GameConfig,
    store: &mut StateStore,
    mut movement: Movement,
    now: Epoch,
) -> Result<Chained, ProcessError> {
    let speed = surviving_speed(config, &movement.carried_units, &movement.id)?;
    // The arrival already happened, so an out-of-range return is parked at
    // the last epoch instead of being rejected
    let back = now.saturating_add(calculators::travel_time(
        &movement.destination.location,
        &movement.origin.location,
        speed,
    ));
    movement.begin_return(now, speed);

    let chained = Chained {
        due_epoch: back,
        kind: EventKind::Return(step(movement.id.clone(), movement.player_id.clone())),
    };
    if let Some(stored) = store.movement_mut(&movement.id) {
        *stored = movement;
    }
    Ok(chained)
}

fn surviving_speed(
    config: &GameConfig,
    units: &UnitCounts,
    movement: &MovementId,
) -> Result<f64, ProcessError> {
    calculators::slowest_speed(config, units)
        .ok_or_else(|| ProcessError::Invariant(format!("movement {movement} has no units left")))
}

fn step(movement_id: MovementId, player_id: PlayerId) -> MovementStep {
    MovementStep {
        movement_id,
        player_id,
    }
}

fn invariant(city: &CityId) -> ProcessError {
    ProcessError::Invariant(format!("coordinate index points at missing city {city}"))
}
