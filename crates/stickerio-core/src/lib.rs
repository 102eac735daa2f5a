//! Stickerio Simulation Engine Library
//!
//! Event-sourced simulation core for the stickerio strategy game: domain
//! calculators, the materialized state store, the event processor, the view
//! flusher, resync and the ingress queue feeding the single worker task.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use stickerio_events::EventId;

pub mod calculators;
pub mod config;
pub mod engine;
pub mod error;
pub mod flusher;
pub mod ingress;
pub mod persistence;
pub mod processor;
pub mod state;
pub mod worker;

pub use config::{ConfigError, GameConfig};
pub use engine::{Engine, EngineError, LiveOutcome, ResyncStats};
pub use error::{ProcessError, Rejection};
pub use flusher::{FlushStats, ViewFlusher};
pub use ingress::{CommandIngress, IngressError, IngressReceiver, Receipt, Submission};
pub use persistence::{
    Bounds, CityFilter, EventLog, InMemoryEventLog, InMemoryReadModel, JsonlEventLog, LogError,
    MovementFilter, Page, ReadModelError, ReadModelReader, ReadModelWriter,
};
pub use processor::Processor;
pub use state::{DirtySet, StateStore, StoreError, StoreSnapshot};
pub use worker::{run_worker, WorkerSettings};

/// Seeded random number generator for a single event.
///
/// Every event draws from its own generator, seeded from the engine seed and
/// the event id, so replaying a log reproduces every random outcome no matter
/// which events were applied before it.
pub struct SimRng(pub SmallRng);

impl SimRng {
    pub fn for_event(seed: u64, event_id: &EventId) -> Self {
        SimRng(SmallRng::seed_from_u64(seed ^ fnv1a(event_id.as_str())))
    }
}

/// 64-bit FNV-1a; stable across platforms and releases unlike `DefaultHasher`.
fn fnv1a(s: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    s.bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}
