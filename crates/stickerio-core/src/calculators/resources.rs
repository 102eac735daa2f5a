//! Resource accrual.
//!
//! A city stores its resources as a base amount valid at `resource_epoch`.
//! Anything that compares against a cost projects the base forward first.

use stickerio_events::{City, Count, Epoch, ResourceCounts};

use crate::config::GameConfig;
use crate::error::Rejection;

/// Production per second of one resource in a city, multipliers applied
pub fn accrual_rate(config: &GameConfig, city: &City, resource: &str) -> f64 {
    let trickle = config
        .resource(resource)
        .map(|spec| spec.trickle_per_sec)
        .unwrap_or(0.0);
    config
        .resource_boosters(resource)
        .iter()
        .fold(trickle, |rate, building| {
            rate * config.building_multiplier(building, city.building_level(building))
        })
}

/// Resource amounts of a city as of `target_epoch`.
///
/// Elapsed time is clamped at zero, so projecting into the past yields the
/// base. Covers every configured resource plus anything already in stock.
pub fn project(config: &GameConfig, city: &City, target_epoch: Epoch) -> ResourceCounts {
    let elapsed = target_epoch.saturating_sub(city.resource_epoch).max(0) as f64;

    let mut projected = city.resource_base.clone();
    for name in config.resources.keys() {
        projected.entry(name.clone()).or_insert(0);
    }
    for (name, amount) in projected.iter_mut() {
        let accrued = (elapsed * accrual_rate(config, city, name)) as Count;
        *amount = amount.saturating_add(accrued);
    }
    projected
}

/// Commit the projection to `target_epoch`.
pub fn settle(config: &GameConfig, city: &mut City, target_epoch: Epoch) {
    city.resource_base = project(config, city, target_epoch);
    city.resource_epoch = city.resource_epoch.max(target_epoch);
}

/// Pay `cost` out of the projected stock, all or nothing.
///
/// On failure the city is left exactly as it was.
pub fn spend(
    config: &GameConfig,
    city: &mut City,
    cost: &ResourceCounts,
    target_epoch: Epoch,
) -> Result<(), Rejection> {
    let mut projected = project(config, city, target_epoch);
    for (resource, required) in cost {
        let available = projected.get(resource).copied().unwrap_or(0);
        if available < *required {
            return Err(Rejection::InsufficientResources {
                resource: resource.clone(),
                required: *required,
                available,
            });
        }
    }
    for (resource, required) in cost {
        if let Some(amount) = projected.get_mut(resource) {
            *amount -= required;
        }
    }
    city.resource_base = projected;
    city.resource_epoch = city.resource_epoch.max(target_epoch);
    Ok(())
}

/// Settle to `target_epoch`, then add `amounts`.
pub fn credit(config: &GameConfig, city: &mut City, amounts: &ResourceCounts, target_epoch: Epoch) {
    settle(config, city, target_epoch);
    for (resource, amount) in amounts {
        let entry = city.resource_base.entry(resource.clone()).or_insert(0);
        *entry = entry.saturating_add(*amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stickerio_events::{CityId, Coordinates, PlayerId};

    fn city(sticks: Count, epoch: Epoch) -> City {
        City {
            id: CityId::from("c1"),
            name: "Stickton".into(),
            owner: PlayerId::from("p1"),
            location: Coordinates::new(0, 0),
            building_levels: Default::default(),
            resource_base: ResourceCounts::from([("sticks".to_string(), sticks)]),
            resource_epoch: epoch,
            unit_counts: Default::default(),
        }
    }

    #[test]
    fn test_projection_applies_trickle() {
        let config = GameConfig::default();
        let c = city(100, 1000);
        let projected = project(&config, &c, 1010);
        // sticks trickle 1.0/s, circles 0.25/s
        assert_eq!(projected["sticks"], 110);
        assert_eq!(projected["circles"], 2);
    }

    #[test]
    fn test_projection_applies_building_multiplier() {
        let config = GameConfig::default();
        let mut c = city(0, 0);
        c.building_levels.insert("mines".into(), 1);
        assert_eq!(project(&config, &c, 10)["sticks"], 15);
    }

    #[test]
    fn test_projection_into_the_past_yields_base() {
        let config = GameConfig::default();
        let c = city(100, 1000);
        assert_eq!(project(&config, &c, 900)["sticks"], 100);
    }

    #[test]
    fn test_projection_is_monotonic() {
        let config = GameConfig::default();
        let c = city(7, 500);
        let mut last = 0;
        for epoch in (400..700).step_by(7) {
            let now = project(&config, &c, epoch)["circles"];
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_spend_commits_projection() {
        let config = GameConfig::default();
        let mut c = city(100, 1000);
        let cost = ResourceCounts::from([("sticks".to_string(), 50)]);
        spend(&config, &mut c, &cost, 1020).unwrap();
        assert_eq!(c.resource_base["sticks"], 70);
        assert_eq!(c.resource_epoch, 1020);
    }

    #[test]
    fn test_failed_spend_leaves_city_unchanged() {
        let config = GameConfig::default();
        let mut c = city(10, 1000);
        let before = c.clone();
        let cost = ResourceCounts::from([
            ("sticks".to_string(), 5),
            ("circles".to_string(), 500),
        ]);
        let err = spend(&config, &mut c, &cost, 1010).unwrap_err();
        assert!(matches!(err, Rejection::InsufficientResources { .. }));
        assert_eq!(c, before);
    }

    #[test]
    fn test_credit_settles_first() {
        let config = GameConfig::default();
        let mut c = city(0, 0);
        let cargo = ResourceCounts::from([("sticks".to_string(), 5)]);
        credit(&config, &mut c, &cargo, 20);
        assert_eq!(c.resource_base["sticks"], 25);
        assert_eq!(c.resource_epoch, 20);
    }
}
