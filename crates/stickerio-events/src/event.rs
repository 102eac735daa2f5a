//! Event Types
//!
//! The persisted event envelope and the typed payload for each discriminator.
//!
//! An [`Event`] is what the log stores: an id, a discriminator, the epoch it
//! becomes due and a JSON payload. [`EventKind`] is the decoded, strongly typed
//! view of the same event.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::entities::{
    BuildingName, Coordinates, Count, Epoch, Level, ResourceCounts, UnitCounts, UnitName,
};
use crate::ids::{CityId, EventId, MovementId, PlayerId, QueueItemId};

/// Event discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    CreateCity,
    DeleteCity,
    StartMovement,
    Arrival,
    Return,
    QueueUnit,
    CreateUnit,
    QueueBuilding,
    UpgradeBuilding,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::CreateCity => "create_city",
            EventName::DeleteCity => "delete_city",
            EventName::StartMovement => "start_movement",
            EventName::Arrival => "arrival",
            EventName::Return => "return",
            EventName::QueueUnit => "queue_unit",
            EventName::CreateUnit => "create_unit",
            EventName::QueueBuilding => "queue_building",
            EventName::UpgradeBuilding => "upgrade_building",
        }
    }

    /// Whether players may submit this event directly.
    ///
    /// Arrivals, returns and production completions are only ever chained
    /// by the engine.
    pub fn is_player_command(&self) -> bool {
        matches!(
            self,
            EventName::CreateCity
                | EventName::DeleteCity
                | EventName::StartMovement
                | EventName::QueueUnit
                | EventName::QueueBuilding
        )
    }

    /// Returns all discriminators.
    pub fn all() -> &'static [EventName] {
        &[
            EventName::CreateCity,
            EventName::DeleteCity,
            EventName::StartMovement,
            EventName::Arrival,
            EventName::Return,
            EventName::QueueUnit,
            EventName::CreateUnit,
            EventName::QueueBuilding,
            EventName::UpgradeBuilding,
        ]
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a discriminator string that names no event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventName(pub String);

impl fmt::Display for UnknownEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event name: {}", self.0)
    }
}

impl std::error::Error for UnknownEventName {}

impl FromStr for EventName {
    type Err = UnknownEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::all()
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownEventName(s.to_string()))
    }
}

impl EventId {
    /// Fresh random id for a submitted event
    pub fn generate() -> Self {
        EventId(Uuid::new_v4().to_string())
    }

    /// Id of the event chained from `parent`.
    ///
    /// Name-based, so reprocessing the same parent during a replay yields
    /// the same id and the log insert becomes a no-op.
    pub fn chained(parent: &EventId, name: EventName) -> Self {
        let key = format!("{}/{}", parent, name);
        EventId(Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string())
    }
}

/// Log ordering key: due epoch first, id second
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub due_epoch: Epoch,
    pub id: EventId,
}

/// A persisted, immutable event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: EventName,
    pub due_epoch: Epoch,
    /// JSON document whose shape is fixed by `name`
    pub payload: String,
}

impl Event {
    /// Builds an event from a typed payload.
    pub fn new(
        id: impl Into<EventId>,
        due_epoch: Epoch,
        kind: &EventKind,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: id.into(),
            name: kind.name(),
            due_epoch,
            payload: kind.encode_payload()?,
        })
    }

    /// Decodes the payload according to the discriminator.
    pub fn decode(&self) -> Result<EventKind, serde_json::Error> {
        EventKind::decode(self.name, &self.payload)
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            due_epoch: self.due_epoch,
            id: self.id.clone(),
        }
    }

    /// Serialize to a single JSONL line (no trailing newline)
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from a JSONL line
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Decoded event payloads.
///
/// Serializes adjacently tagged as `{"name": ..., "payload": {...}}`, which is
/// also the shape commands are submitted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    CreateCity(CreateCity),
    DeleteCity(DeleteCity),
    StartMovement(StartMovement),
    Arrival(MovementStep),
    Return(MovementStep),
    QueueUnit(QueueUnit),
    CreateUnit(UnitReady),
    QueueBuilding(QueueBuilding),
    UpgradeBuilding(BuildingReady),
}

impl EventKind {
    pub fn name(&self) -> EventName {
        match self {
            EventKind::CreateCity(_) => EventName::CreateCity,
            EventKind::DeleteCity(_) => EventName::DeleteCity,
            EventKind::StartMovement(_) => EventName::StartMovement,
            EventKind::Arrival(_) => EventName::Arrival,
            EventKind::Return(_) => EventName::Return,
            EventKind::QueueUnit(_) => EventName::QueueUnit,
            EventKind::CreateUnit(_) => EventName::CreateUnit,
            EventKind::QueueBuilding(_) => EventName::QueueBuilding,
            EventKind::UpgradeBuilding(_) => EventName::UpgradeBuilding,
        }
    }

    /// The player on whose behalf the event runs
    pub fn player_id(&self) -> &PlayerId {
        match self {
            EventKind::CreateCity(p) => &p.player_id,
            EventKind::DeleteCity(p) => &p.player_id,
            EventKind::StartMovement(p) => &p.player_id,
            EventKind::Arrival(p) | EventKind::Return(p) => &p.player_id,
            EventKind::QueueUnit(p) => &p.player_id,
            EventKind::CreateUnit(p) => &p.player_id,
            EventKind::QueueBuilding(p) => &p.player_id,
            EventKind::UpgradeBuilding(p) => &p.player_id,
        }
    }

    pub fn encode_payload(&self) -> Result<String, serde_json::Error> {
        match self {
            EventKind::CreateCity(p) => serde_json::to_string(p),
            EventKind::DeleteCity(p) => serde_json::to_string(p),
            EventKind::StartMovement(p) => serde_json::to_string(p),
            EventKind::Arrival(p) | EventKind::Return(p) => serde_json::to_string(p),
            EventKind::QueueUnit(p) => serde_json::to_string(p),
            EventKind::CreateUnit(p) => serde_json::to_string(p),
            EventKind::QueueBuilding(p) => serde_json::to_string(p),
            EventKind::UpgradeBuilding(p) => serde_json::to_string(p),
        }
    }

    pub fn decode(name: EventName, payload: &str) -> Result<Self, serde_json::Error> {
        Ok(match name {
            EventName::CreateCity => EventKind::CreateCity(serde_json::from_str(payload)?),
            EventName::DeleteCity => EventKind::DeleteCity(serde_json::from_str(payload)?),
            EventName::StartMovement => EventKind::StartMovement(serde_json::from_str(payload)?),
            EventName::Arrival => EventKind::Arrival(serde_json::from_str(payload)?),
            EventName::Return => EventKind::Return(serde_json::from_str(payload)?),
            EventName::QueueUnit => EventKind::QueueUnit(serde_json::from_str(payload)?),
            EventName::CreateUnit => EventKind::CreateUnit(serde_json::from_str(payload)?),
            EventName::QueueBuilding => EventKind::QueueBuilding(serde_json::from_str(payload)?),
            EventName::UpgradeBuilding => {
                EventKind::UpgradeBuilding(serde_json::from_str(payload)?)
            }
        })
    }
}

/// Found a new city
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCity {
    pub city_id: CityId,
    pub name: String,
    pub player_id: PlayerId,
    pub location: Coordinates,
    #[serde(default)]
    pub resources: ResourceCounts,
    #[serde(default)]
    pub units: UnitCounts,
}

/// Abandon a city
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCity {
    pub city_id: CityId,
    pub player_id: PlayerId,
}

/// Send units and cargo from an owned city towards a coordinate.
///
/// The departure epoch is the event's due epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartMovement {
    pub movement_id: MovementId,
    pub player_id: PlayerId,
    pub origin_id: CityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<CityId>,
    pub destination: Coordinates,
    #[serde(default)]
    pub units: UnitCounts,
    #[serde(default)]
    pub resources: ResourceCounts,
}

/// End of a movement leg (arrival or return)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementStep {
    pub movement_id: MovementId,
    pub player_id: PlayerId,
}

/// Queue units for training
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueUnit {
    pub item_id: QueueItemId,
    pub city_id: CityId,
    pub player_id: PlayerId,
    pub unit_type: UnitName,
    pub unit_count: Count,
}

/// Training of a queued unit batch finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReady {
    pub item_id: QueueItemId,
    pub city_id: CityId,
    pub player_id: PlayerId,
    pub unit_type: UnitName,
    pub unit_count: Count,
}

/// Queue a building upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueBuilding {
    pub item_id: QueueItemId,
    pub city_id: CityId,
    pub player_id: PlayerId,
    pub building: BuildingName,
    pub target_level: Level,
}

/// A queued building upgrade finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingReady {
    pub item_id: QueueItemId,
    pub city_id: CityId,
    pub player_id: PlayerId,
    pub building: BuildingName,
    pub target_level: Level,
}

impl From<&QueueUnit> for UnitReady {
    fn from(q: &QueueUnit) -> Self {
        Self {
            item_id: q.item_id.clone(),
            city_id: q.city_id.clone(),
            player_id: q.player_id.clone(),
            unit_type: q.unit_type.clone(),
            unit_count: q.unit_count,
        }
    }
}

impl From<&QueueBuilding> for BuildingReady {
    fn from(q: &QueueBuilding) -> Self {
        Self {
            item_id: q.item_id.clone(),
            city_id: q.city_id.clone(),
            player_id: q.player_id.clone(),
            building: q.building.clone(),
            target_level: q.target_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete_city() -> EventKind {
        EventKind::DeleteCity(DeleteCity {
            city_id: CityId::from("city_1"),
            player_id: PlayerId::from("p1"),
        })
    }

    #[test]
    fn test_event_payload_roundtrip() {
        let kind = delete_city();
        let event = Event::new("evt_1", 10, &kind).unwrap();
        assert_eq!(event.name, EventName::DeleteCity);
        assert_eq!(event.decode().unwrap(), kind);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let event = Event {
            id: EventId::from("evt_1"),
            name: EventName::StartMovement,
            due_epoch: 0,
            payload: r#"{"movement_id": 3}"#.to_string(),
        };
        assert!(event.decode().is_err());
    }

    #[test]
    fn test_event_names_parse() {
        for name in EventName::all() {
            assert_eq!(name.as_str().parse::<EventName>().unwrap(), *name);
            let json = serde_json::to_string(name).unwrap();
            assert_eq!(json, format!("\"{}\"", name.as_str()));
        }
        assert!("teleport".parse::<EventName>().is_err());
    }

    #[test]
    fn test_player_commands() {
        let commands: Vec<EventName> = EventName::all()
            .iter()
            .copied()
            .filter(EventName::is_player_command)
            .collect();
        assert_eq!(commands.len(), 5);
        assert!(!EventName::Arrival.is_player_command());
        assert!(!EventName::CreateUnit.is_player_command());
    }

    #[test]
    fn test_event_key_orders_by_epoch_then_id() {
        let kind = delete_city();
        let late_a = Event::new("a", 20, &kind).unwrap();
        let early_b = Event::new("b", 10, &kind).unwrap();
        let early_c = Event::new("c", 10, &kind).unwrap();

        let mut keys = vec![late_a.key(), early_c.key(), early_b.key()];
        keys.sort();
        let ids: Vec<&str> = keys.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_command_shape() {
        let json = r#"{"name":"arrival","payload":{"movement_id":"m1","player_id":"p1"}}"#;
        let kind: EventKind = serde_json::from_str(json).unwrap();
        assert_eq!(kind.name(), EventName::Arrival);
        assert_eq!(kind.player_id(), &PlayerId::from("p1"));
    }

    #[test]
    fn test_generated_ids() {
        let parent = EventId::generate();
        assert_ne!(parent, EventId::generate());

        let arrival = EventId::chained(&parent, EventName::Arrival);
        assert_eq!(arrival, EventId::chained(&parent, EventName::Arrival));
        assert_ne!(arrival, EventId::chained(&parent, EventName::Return));
        assert!(Uuid::parse_str(arrival.as_str()).is_ok());
    }

    #[test]
    fn test_jsonl_roundtrip() {
        let event = Event::new("evt_9", 42, &delete_city()).unwrap();
        let line = event.to_jsonl().unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(Event::from_jsonl(&line).unwrap(), event);
    }
}
