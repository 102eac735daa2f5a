//! Sample data fixtures for testing.
//!
//! This module provides a ready-made event log for other crates to use.
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // stickerio-events = { path = "../stickerio-events", features = ["test-fixtures"] }
//!
//! use stickerio_events::fixtures;
//!
//! let events = fixtures::sample_events();
//! ```

use crate::{Event, EventId};

/// Returns the sample event log, in file order.
///
/// Contains 9 events between epochs 1000 and 1030:
/// - 3 accepted city foundations (two for `player_ana`, one for `player_bo`)
/// - 1 city foundation on an occupied coordinate (rejected)
/// - 1 reinforcement movement between `player_ana`'s cities
/// - 1 unit training order
/// - 1 movement towards an unclaimed coordinate (forage)
/// - 1 city deletion by a player who does not own the city (rejected)
/// - 1 building upgrade order
pub fn sample_events() -> Vec<Event> {
    let jsonl = include_str!("../tests/fixtures/sample_events.jsonl");
    jsonl
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            Event::from_jsonl(l).unwrap_or_else(|e| {
                panic!("Failed to parse event line: {}\nError: {}", l, e)
            })
        })
        .collect()
}

/// Returns a specific event by ID from the sample events.
pub fn get_event(event_id: &str) -> Option<Event> {
    let id = EventId::from(event_id);
    sample_events().into_iter().find(|e| e.id == id)
}

/// Epoch of the last sample event
pub fn sample_log_end() -> i64 {
    sample_events()
        .iter()
        .map(|e| e.due_epoch)
        .max()
        .unwrap_or_default()
}
