//! Production durations and costs.

use stickerio_events::{City, Count, Epoch, Level, ResourceCounts};

use crate::config::GameConfig;

/// Shortest production time; a completion always lands after its order.
pub const MIN_DURATION_SEC: Epoch = 1;

fn multiplier_product(config: &GameConfig, city: &City, buildings: &[String]) -> f64 {
    buildings.iter().fold(1.0, |product, building| {
        product * config.building_multiplier(building, city.building_level(building))
    })
}

/// Seconds to train `count` units of a type in a city
pub fn training_duration(
    config: &GameConfig,
    city: &City,
    unit: &str,
    count: Count,
) -> Option<Epoch> {
    let spec = config.unit(unit)?;
    let multiplier = multiplier_product(config, city, config.training_boosters(unit));
    let seconds = spec.production_sec as f64 * count as f64 * multiplier;
    Some((seconds as Epoch).max(MIN_DURATION_SEC))
}

/// Seconds to raise a building to `target_level` in a city
pub fn upgrade_duration(
    config: &GameConfig,
    city: &City,
    building: &str,
    target_level: Level,
) -> Option<Epoch> {
    let base = config.building(building)?.upgrade_sec_for(target_level)?;
    let multiplier = multiplier_product(config, city, config.construction_boosters(building));
    Some(((base as f64 * multiplier) as Epoch).max(MIN_DURATION_SEC))
}

/// Resources to train `count` units of a type
pub fn training_cost(config: &GameConfig, unit: &str, count: Count) -> Option<ResourceCounts> {
    let spec = config.unit(unit)?;
    Some(
        spec.cost
            .iter()
            .map(|(resource, amount)| (resource.clone(), amount.saturating_mul(count)))
            .collect(),
    )
}

/// Resources to raise a building to `target_level`
pub fn upgrade_cost(config: &GameConfig, building: &str, target_level: Level) -> Option<ResourceCounts> {
    config
        .building(building)?
        .upgrade_cost_for(target_level)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stickerio_events::{CityId, Coordinates, PlayerId};

    fn city_with(buildings: &[(&str, Level)]) -> City {
        City {
            id: CityId::from("c1"),
            name: "Stickton".into(),
            owner: PlayerId::from("p1"),
            location: Coordinates::new(0, 0),
            building_levels: buildings.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            resource_base: Default::default(),
            resource_epoch: 0,
            unit_counts: Default::default(),
        }
    }

    #[test]
    fn test_training_duration_scales_with_barracks() {
        let config = GameConfig::default();
        assert_eq!(training_duration(&config, &city_with(&[]), "stickmen", 2), Some(60));
        let city = city_with(&[("barracks", 3)]);
        assert_eq!(training_duration(&config, &city, "stickmen", 2), Some(45));
        assert_eq!(training_duration(&config, &city, "dragons", 1), None);
    }

    #[test]
    fn test_durations_have_a_floor() {
        let mut config = GameConfig::default();
        if let Some(spec) = config.units.get_mut("stickmen") {
            spec.production_sec = 0;
        }
        assert_eq!(
            training_duration(&config, &city_with(&[]), "stickmen", 10),
            Some(MIN_DURATION_SEC)
        );
    }

    #[test]
    fn test_upgrade_duration_uses_workshop() {
        let config = GameConfig::default();
        assert_eq!(upgrade_duration(&config, &city_with(&[]), "mines", 1), Some(60));
        let city = city_with(&[("workshop", 1)]);
        assert_eq!(upgrade_duration(&config, &city, "mines", 1), Some(48));
        assert_eq!(upgrade_duration(&config, &city, "mines", 4), None);
    }

    #[test]
    fn test_costs() {
        let config = GameConfig::default();
        let cost = training_cost(&config, "swordsmen", 3).unwrap();
        assert_eq!(cost["sticks"], 60);
        assert_eq!(cost["circles"], 30);

        let cost = upgrade_cost(&config, "mines", 2).unwrap();
        assert_eq!(cost["sticks"], 150);
        assert!(upgrade_cost(&config, "mines", 0).is_none());
    }
}
