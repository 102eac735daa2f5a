//! Combat resolution.
//!
//! Each side's power is summed per combat stat. The swing accumulates
//! attacker power minus defender power for every stat the attackers bring,
//! each term scaled by a random efficiency in `[combat_efficiency, 1)`. The
//! normalized swing then splits survivors between the two sides.

use rand::Rng;
use std::collections::BTreeMap;

use stickerio_events::{Count, StatName, UnitCounts};

use crate::config::GameConfig;

/// Surviving units on both sides
#[derive(Debug, Clone, PartialEq)]
pub struct CombatOutcome {
    pub attackers: UnitCounts,
    pub defenders: UnitCounts,
    /// Normalized swing in `[-0.5, 0.5]`; positive favours the attackers
    pub swing: f64,
}

/// Total power per combat stat of a unit group
pub fn side_power(config: &GameConfig, units: &UnitCounts) -> BTreeMap<StatName, f64> {
    let mut power = BTreeMap::new();
    for (unit, count) in units {
        let Some(spec) = config.unit(unit) else {
            continue;
        };
        for (stat, value) in &spec.combat {
            *power.entry(stat.clone()).or_insert(0.0) += (*count as f64) * (*value as f64);
        }
    }
    power
}

fn scale(units: &UnitCounts, factor: f64) -> UnitCounts {
    units
        .iter()
        .map(|(unit, count)| (unit.clone(), ((*count as f64) * factor).max(0.0) as Count))
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// Fight one battle between an attacking group and a defending garrison.
pub fn resolve_combat<R: Rng + ?Sized>(
    config: &GameConfig,
    attackers: &UnitCounts,
    defenders: &UnitCounts,
    rng: &mut R,
) -> CombatOutcome {
    let attack = side_power(config, attackers);
    let defense = side_power(config, defenders);

    let swing_max: f64 = attack.values().sum();
    let swing_min: f64 = -defense.values().sum::<f64>();

    if swing_min == 0.0 {
        // Nothing to fight
        return CombatOutcome {
            attackers: scale(attackers, 1.0),
            defenders: scale(defenders, 1.0),
            swing: 0.0,
        };
    }
    if swing_max == 0.0 {
        return CombatOutcome {
            attackers: UnitCounts::new(),
            defenders: scale(defenders, 1.0),
            swing: -0.5,
        };
    }

    let efficiency = config.combat_efficiency;
    let mut draw = || efficiency + (1.0 - efficiency) * rng.gen::<f64>();

    let mut swing = 0.0;
    for (stat, attacker_power) in &attack {
        let defender_power = defense.get(stat).copied().unwrap_or(0.0);
        swing += attacker_power * draw() - defender_power * draw();
    }
    let normalized = 0.5 * swing / (swing_max - swing_min);

    CombatOutcome {
        attackers: scale(attackers, 0.5 + normalized),
        defenders: scale(defenders, 0.5 - normalized),
        swing: normalized,
    }
}
