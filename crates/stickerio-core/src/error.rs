//! Processing Errors
//!
//! [`Rejection`] names why the game rules forbid applying an event right now;
//! [`ProcessError`] separates those recoverable rejections from fatal errors
//! that abort the current pass.

use thiserror::Error;

use stickerio_events::{
    BuildingName, CityId, Coordinates, Count, Epoch, EventId, EventName, Leg, Level, MovementId,
    PlayerId, QueueItemId, ResourceName, UnitName,
};

use crate::state::StoreError;

/// A precondition that failed; the event is dropped without mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("player {player} does not own city {city}")]
    NotOwner { player: PlayerId, city: CityId },
    #[error("movement {movement} does not belong to player {player}")]
    NotMovementOwner {
        player: PlayerId,
        movement: MovementId,
    },
    #[error("city id {0} is already taken")]
    CityIdTaken(CityId),
    #[error("coordinate ({}, {}) is occupied", .0.x, .0.y)]
    CoordinateOccupied(Coordinates),
    #[error("unknown city {0}")]
    UnknownCity(CityId),
    #[error("movement id {0} is already taken")]
    MovementIdTaken(MovementId),
    #[error("unknown movement {0}")]
    UnknownMovement(MovementId),
    #[error("unknown unit type {0}")]
    UnknownUnit(UnitName),
    #[error("unknown building {0}")]
    UnknownBuilding(BuildingName),
    #[error("origin and destination are both ({}, {})", .0.x, .0.y)]
    SameOriginAndDestination(Coordinates),
    #[error("movement carries no units")]
    EmptyGroup,
    #[error("invalid count {count} for {name}")]
    InvalidCount { name: String, count: Count },
    #[error("not enough {unit}: {available} available, {requested} requested")]
    InsufficientUnits {
        unit: UnitName,
        requested: Count,
        available: Count,
    },
    #[error("not enough {resource}: {available} available, {required} required")]
    InsufficientResources {
        resource: ResourceName,
        required: Count,
        available: Count,
    },
    #[error("{building} cannot be upgraded from level {current} to {target}")]
    InvalidLevel {
        building: BuildingName,
        current: Level,
        target: Level,
    },
    #[error("movement {movement} is on its {actual:?} leg")]
    WrongLeg { movement: MovementId, actual: Leg },
    #[error("queue item {item} already exists in city {city}")]
    DuplicateQueueItem { city: CityId, item: QueueItemId },
    #[error("{seconds}s after epoch {start} is past the last representable epoch")]
    EpochOverflow { start: Epoch, seconds: Epoch },
}

/// Failure to apply one event.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("precondition failed: {0}")]
    PreconditionFailed(#[from] Rejection),
    #[error("malformed {name} payload in event {event_id}: {source}")]
    MalformedPayload {
        event_id: EventId,
        name: EventName,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode chained {name} event: {source}")]
    Encode {
        name: EventName,
        #[source]
        source: serde_json::Error,
    },
    #[error("store invariant violated: {0}")]
    Store(#[from] StoreError),
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl ProcessError {
    /// Whether the event was merely rejected by the rules
    pub fn is_precondition(&self) -> bool {
        matches!(self, ProcessError::PreconditionFailed(_))
    }
}
