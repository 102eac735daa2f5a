//! Domain Calculators
//!
//! Pure functions over the game-balance tables: resource accrual, travel
//! time, production durations, combat and loot distribution. Nothing here
//! touches the state store; callers pass in the city or unit group.

pub mod combat;
pub mod loot;
pub mod production;
pub mod resources;
pub mod travel;

use std::collections::BTreeMap;

use stickerio_events::Count;

pub use combat::{resolve_combat, CombatOutcome};
pub use loot::{carry_capacity, forage, free_capacity, plunder, spread, Plunder};
pub use production::{training_cost, training_duration, upgrade_cost, upgrade_duration};
pub use resources::{credit, project, settle, spend};
pub use travel::{slowest_speed, travel_time};

/// Add counts into a map, dropping entries that end at zero.
pub fn deposit(into: &mut BTreeMap<String, Count>, amounts: &BTreeMap<String, Count>) {
    for (name, amount) in amounts {
        let entry = into.entry(name.clone()).or_insert(0);
        *entry = entry.saturating_add(*amount);
        if *entry == 0 {
            into.remove(name);
        }
    }
}

/// Subtract counts from a map, dropping entries that end at zero.
///
/// Callers check availability first; a shortfall saturates at zero.
pub fn withdraw(from: &mut BTreeMap<String, Count>, amounts: &BTreeMap<String, Count>) {
    for (name, amount) in amounts {
        if let Some(entry) = from.get_mut(name) {
            *entry = (*entry - amount).max(0);
            if *entry == 0 {
                from.remove(name);
            }
        }
    }
}

/// Drop zero entries so equal groups compare equal
pub fn prune(counts: &mut BTreeMap<String, Count>) {
    counts.retain(|_, count| *count != 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, Count)]) -> BTreeMap<String, Count> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let mut stock = counts(&[("sticks", 10)]);
        deposit(&mut stock, &counts(&[("sticks", 5), ("circles", 2)]));
        assert_eq!(stock, counts(&[("circles", 2), ("sticks", 15)]));

        withdraw(&mut stock, &counts(&[("circles", 2), ("sticks", 20)]));
        assert!(stock.is_empty());
    }

    #[test]
    fn test_prune() {
        let mut group = counts(&[("stickmen", 0), ("swordsmen", 3)]);
        prune(&mut group);
        assert_eq!(group, counts(&[("swordsmen", 3)]));
    }
}
