//! Travel speed and time.

use stickerio_events::{Coordinates, Epoch, UnitCounts};

use crate::config::GameConfig;

/// Speed of the slowest unit type present in the group.
///
/// `None` when the group holds no known units.
pub fn slowest_speed(config: &GameConfig, units: &UnitCounts) -> Option<f64> {
    config
        .units_by_speed()
        .iter()
        .find(|unit| units.get(*unit).copied().unwrap_or(0) > 0)
        .and_then(|unit| config.unit(unit))
        .map(|spec| spec.speed)
}

/// Whole seconds needed to cover the distance, rounded up
pub fn travel_time(from: &Coordinates, to: &Coordinates, speed: f64) -> Epoch {
    (from.distance_to(to) / speed).ceil() as Epoch
}
