//! Entity Types
//!
//! Cities, movements and production queue items as held by the materialized
//! state and mirrored into the read model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::{CityId, MovementId, PlayerId, QueueItemId};

/// Seconds since the Unix epoch
pub type Epoch = i64;
/// Grid coordinate component
pub type Coordinate = i32;
/// Unit or resource count
pub type Count = i64;
/// Building level
pub type Level = i64;

pub type ResourceName = String;
pub type UnitName = String;
pub type BuildingName = String;
pub type StatName = String;

pub type ResourceCounts = BTreeMap<ResourceName, Count>;
pub type UnitCounts = BTreeMap<UnitName, Count>;
pub type BuildingLevels = BTreeMap<BuildingName, Level>;

/// Sum of a count map, saturating at `Count::MAX`
pub fn total(counts: &BTreeMap<String, Count>) -> Count {
    counts
        .values()
        .fold(0, |sum: Count, count| sum.saturating_add(*count))
}

/// A point on the world grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: Coordinate,
    pub y: Coordinate,
}

impl Coordinates {
    pub fn new(x: Coordinate, y: Coordinate) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// A player-owned city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub owner: PlayerId,
    pub location: Coordinates,
    #[serde(default)]
    pub building_levels: BuildingLevels,
    /// Resource stock as of `resource_epoch`; project before comparing
    #[serde(default)]
    pub resource_base: ResourceCounts,
    pub resource_epoch: Epoch,
    #[serde(default)]
    pub unit_counts: UnitCounts,
}

impl City {
    pub fn building_level(&self, building: &str) -> Level {
        self.building_levels.get(building).copied().unwrap_or(0)
    }

    pub fn units_of(&self, unit: &str) -> Count {
        self.unit_counts.get(unit).copied().unwrap_or(0)
    }

    pub fn total_units(&self) -> Count {
        total(&self.unit_counts)
    }

    pub fn is_owned_by(&self, player: &PlayerId) -> bool {
        &self.owner == player
    }
}

/// Direction of travel of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Outbound,
    Return,
}

/// A place a movement travels from or to.
///
/// The city id is informational: a movement is resolved against whichever
/// city occupies `location` when it gets there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_id: Option<CityId>,
    pub location: Coordinates,
}

/// One expedition, outbound or on its way back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub player_id: PlayerId,
    pub origin: Place,
    pub destination: Place,
    pub leg: Leg,
    /// Departure epoch of the current leg
    pub departure_epoch: Epoch,
    pub speed: f64,
    #[serde(default)]
    pub carried_units: UnitCounts,
    #[serde(default)]
    pub carried_resources: ResourceCounts,
}

impl Movement {
    /// The place the current leg is heading to
    pub fn heading_to(&self) -> &Place {
        match self.leg {
            Leg::Outbound => &self.destination,
            Leg::Return => &self.origin,
        }
    }

    /// The place the current leg departed from
    pub fn departed_from(&self) -> &Place {
        match self.leg {
            Leg::Outbound => &self.origin,
            Leg::Return => &self.destination,
        }
    }

    /// Turn the expedition around for its way home.
    pub fn begin_return(&mut self, departure_epoch: Epoch, speed: f64) {
        self.leg = Leg::Return;
        self.departure_epoch = departure_epoch;
        self.speed = speed;
    }

    pub fn total_units(&self) -> Count {
        total(&self.carried_units)
    }
}

/// Units in training
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitQueueItem {
    pub id: QueueItemId,
    pub city_id: CityId,
    pub player_id: PlayerId,
    pub queued_epoch: Epoch,
    pub duration_sec: Epoch,
    pub unit_type: UnitName,
    pub unit_count: Count,
}

impl UnitQueueItem {
    pub fn completes_at(&self) -> Epoch {
        self.queued_epoch.saturating_add(self.duration_sec)
    }
}

/// A building upgrade in progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingQueueItem {
    pub id: QueueItemId,
    pub city_id: CityId,
    pub player_id: PlayerId,
    pub queued_epoch: Epoch,
    pub duration_sec: Epoch,
    pub building: BuildingName,
    pub target_level: Level,
}

impl BuildingQueueItem {
    pub fn completes_at(&self) -> Epoch {
        self.queued_epoch.saturating_add(self.duration_sec)
    }
}
