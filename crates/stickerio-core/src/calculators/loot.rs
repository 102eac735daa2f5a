//! Carry capacity, plunder and foraging.

use rand::Rng;

use stickerio_events::entities::total;
use stickerio_events::{Count, ResourceCounts, UnitCounts};

use crate::config::GameConfig;

/// Resources a unit group can carry in total
pub fn carry_capacity(config: &GameConfig, units: &UnitCounts) -> Count {
    units
        .iter()
        .filter_map(|(unit, count)| {
            config
                .unit(unit)
                .map(|spec| count.saturating_mul(spec.carry_capacity))
        })
        .fold(0, |sum: Count, capacity| sum.saturating_add(capacity))
}

/// Capacity left after the current cargo; negative when overloaded
pub fn free_capacity(config: &GameConfig, units: &UnitCounts, carried: &ResourceCounts) -> Count {
    carry_capacity(config, units).saturating_sub(total(carried))
}

/// Spread `amount` over the non-empty entries of `pool`.
///
/// Every type first gets an even share capped by its stock, then the
/// leftover is swept across types in name order until either `amount` or
/// the pool runs out.
pub fn spread(amount: Count, pool: &ResourceCounts) -> ResourceCounts {
    let stocked: Vec<(&String, Count)> = pool
        .iter()
        .filter(|(_, stock)| **stock > 0)
        .map(|(name, stock)| (name, *stock))
        .collect();
    let mut taken = ResourceCounts::new();
    if amount <= 0 || stocked.is_empty() {
        return taken;
    }

    let share = amount / stocked.len() as Count;
    let mut remaining = amount;
    for (name, stock) in &stocked {
        let take = share.min(*stock);
        if take > 0 {
            taken.insert((*name).clone(), take);
            remaining -= take;
        }
    }

    for (name, stock) in &stocked {
        if remaining == 0 {
            break;
        }
        let already = taken.get(*name).copied().unwrap_or(0);
        let extra = remaining.min(stock - already);
        if extra > 0 {
            taken.insert((*name).clone(), already + extra);
            remaining -= extra;
        }
    }
    taken
}

/// Resources moving after a won raid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plunder {
    /// Taken from the defender into the cargo
    pub taken: ResourceCounts,
    /// Dropped from an overloaded cargo and left with the defender
    pub returned: ResourceCounts,
}

/// Split the loot of a raid given the survivors' free capacity.
///
/// With spare capacity the defender's stock is plundered; when the survivors
/// can no longer carry their cargo the excess is handed to the defender.
pub fn plunder(free: Count, carried: &ResourceCounts, defender_stock: &ResourceCounts) -> Plunder {
    if free < 0 {
        Plunder {
            taken: ResourceCounts::new(),
            returned: spread(-free, carried),
        }
    } else {
        Plunder {
            taken: spread(free, defender_stock),
            returned: ResourceCounts::new(),
        }
    }
}

/// Gather resources at an unclaimed coordinate.
///
/// Only groups with more than one unit of free capacity forage. The haul is
/// a random fraction of `foraging_coefficient * free`, at least one unit, and
/// is split over the configured resources in name order with the last type
/// taking the remainder.
pub fn forage<R: Rng + ?Sized>(config: &GameConfig, free: Count, rng: &mut R) -> ResourceCounts {
    let mut found = ResourceCounts::new();
    if free <= 1 || config.foraging_coefficient <= 0.0 || config.resources.is_empty() {
        return found;
    }

    let ceiling = config.foraging_coefficient * free as f64;
    let total = ((rng.gen::<f64>() * ceiling) as Count).clamp(1, free);

    let mut remaining = total;
    let last = config.resources.len() - 1;
    for (index, resource) in config.resources.keys().enumerate() {
        let amount = if index == last {
            remaining
        } else {
            (rng.gen::<f64>() * remaining as f64) as Count
        };
        if amount > 0 {
            found.insert(resource.clone(), amount);
            remaining -= amount;
        }
    }
    found
}
