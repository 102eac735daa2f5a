//! Shared event and entity types for the stickerio simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for all other crates in the workspace.

pub mod entities;
pub mod event;
pub mod ids;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export id types
pub use ids::{CityId, EventId, MovementId, PlayerId, QueueItemId};

// Re-export entity types
pub use entities::{
    BuildingLevels, BuildingName, BuildingQueueItem, City, Coordinate, Coordinates, Count, Epoch,
    Leg, Level, Movement, Place, ResourceCounts, ResourceName, StatName, UnitCounts, UnitName,
    UnitQueueItem,
};

// Re-export event types
pub use event::{
    BuildingReady, CreateCity, DeleteCity, Event, EventKey, EventKind, EventName, MovementStep,
    QueueBuilding, QueueUnit, StartMovement, UnitReady, UnknownEventName,
};
