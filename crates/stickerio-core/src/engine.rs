//! Simulation Engine
//!
//! Owns the materialized state behind a single lock and drives the
//! processor along three paths:
//!
//! - **live**: one event handed over by the ingress queue
//! - **sweep**: chained events from the in-memory schedule that became due
//! - **resync**: a full replay of the log into a fresh store, which is the
//!   only path the engine relies on for correctness
//!
//! Every path ends with a view flush.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use stickerio_events::{Epoch, Event, EventId, EventKey};

use crate::config::GameConfig;
use crate::error::{ProcessError, Rejection};
use crate::flusher::ViewFlusher;
use crate::persistence::{EventLog, LogError, ReadModelError, ReadModelWriter};
use crate::processor::Processor;
use crate::state::{DirtySet, StateStore, StoreSnapshot};

/// Fatal failure of an engine pass.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    ReadModel(#[from] ReadModelError),
    #[error("engine state lock poisoned")]
    Poisoned,
}

/// What happened to an event on the live path
#[derive(Debug, Clone, PartialEq)]
pub enum LiveOutcome {
    Applied,
    Rejected(Rejection),
    /// Already applied or rejected since the last resync
    Duplicate,
    /// Not due yet; parked in the schedule
    Scheduled,
}

/// Counts from one resync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncStats {
    pub replayed: usize,
    pub rejected: usize,
    pub scheduled: usize,
}

#[derive(Default)]
struct EngineState {
    store: StateStore,
    dirty: DirtySet,
    /// Events applied or rejected since the last resync
    applied: HashSet<EventId>,
    /// Chained events waiting for their due epoch
    scheduled: BTreeMap<EventKey, Event>,
}

pub struct Engine {
    processor: Processor,
    log: Arc<dyn EventLog>,
    flusher: ViewFlusher,
    state: Mutex<EngineState>,
}

impl Engine {
    pub fn new(
        config: Arc<GameConfig>,
        seed: u64,
        log: Arc<dyn EventLog>,
        view: Arc<dyn ReadModelWriter>,
    ) -> Self {
        Self {
            processor: Processor::new(config, seed),
            log,
            flusher: ViewFlusher::new(view),
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState>, EngineError> {
        self.state.lock().map_err(|_| EngineError::Poisoned)
    }

    /// Apply an event handed over by the ingress queue.
    pub fn apply_live(&self, event: Event, now: Epoch) -> Result<LiveOutcome, EngineError> {
        let mut state = self.lock()?;
        if state.applied.contains(&event.id) {
            debug!(event_id = %event.id, "event already applied");
            return Ok(LiveOutcome::Duplicate);
        }
        if event.due_epoch > now {
            debug!(event_id = %event.id, due = event.due_epoch, "event parked until due");
            state.scheduled.insert(event.key(), event);
            return Ok(LiveOutcome::Scheduled);
        }

        // Chained events ordered before this one go first, as in a replay
        let key = event.key();
        self.drain_scheduled(&mut state, |next| next < &key)?;
        let outcome = self.apply_one(&mut state, &event)?;
        self.flush(&mut state)?;
        Ok(outcome)
    }

    /// Apply every scheduled event due at or before `now`.
    pub fn apply_due(&self, now: Epoch) -> Result<usize, EngineError> {
        let mut state = self.lock()?;
        let applied = self.drain_scheduled(&mut state, |next| next.due_epoch <= now)?;
        if applied > 0 {
            debug!(applied, now, "schedule swept");
        }
        self.flush(&mut state)?;
        Ok(applied)
    }

    /// Rebuild the state by replaying the log up to `now`.
    ///
    /// The replay runs against a fresh store; the current one is only
    /// replaced once the whole replay succeeded.
    pub fn resync(&self, now: Epoch) -> Result<ResyncStats, EngineError> {
        let mut state = self.lock()?;

        let mut queue: BTreeMap<EventKey, Event> = self
            .log
            .list_due(now)?
            .into_iter()
            .map(|event| (event.key(), event))
            .collect();

        let mut store = StateStore::new();
        let mut scratch = DirtySet::new();
        let mut applied = HashSet::new();
        let mut scheduled = BTreeMap::new();
        let mut stats = ResyncStats::default();

        while let Some((_, event)) = queue.pop_first() {
            if !applied.insert(event.id.clone()) {
                continue;
            }
            match self.processor.apply(&mut store, &mut scratch, &event) {
                Ok(chained) => {
                    stats.replayed += 1;
                    if let Some(next) = chained {
                        self.log.insert(&next)?;
                        if next.due_epoch <= now {
                            queue.insert(next.key(), next);
                        } else {
                            scheduled.insert(next.key(), next);
                        }
                    }
                }
                Err(e) if e.is_precondition() => {
                    stats.rejected += 1;
                    debug!(event_id = %event.id, name = %event.name, reason = %e, "skipped during replay");
                }
                Err(e) => {
                    error!(event_id = %event.id, name = %event.name, error = %e, "resync aborted");
                    return Err(e.into());
                }
            }
        }
        stats.scheduled = scheduled.len();

        let mut dirty = state.store.all_ids();
        dirty.merge(store.all_ids());
        dirty.merge(std::mem::take(&mut state.dirty));

        state.store = store;
        state.dirty = dirty;
        state.applied = applied;
        state.scheduled = scheduled;

        info!(
            replayed = stats.replayed,
            rejected = stats.rejected,
            scheduled = stats.scheduled,
            now,
            "resync complete"
        );
        self.flush(&mut state)?;
        Ok(stats)
    }

    /// Ordered copy of the current state
    pub fn snapshot(&self) -> Result<StoreSnapshot, EngineError> {
        Ok(self.lock()?.store.snapshot())
    }

    /// Run a read-only closure against the current store.
    pub fn with_store<T>(&self, f: impl FnOnce(&StateStore) -> T) -> Result<T, EngineError> {
        Ok(f(&self.lock()?.store))
    }

    /// Number of chained events waiting in the schedule
    pub fn scheduled_len(&self) -> Result<usize, EngineError> {
        Ok(self.lock()?.scheduled.len())
    }

    /// Number of identifiers waiting for a flush
    pub fn pending_flush(&self) -> Result<usize, EngineError> {
        Ok(self.lock()?.dirty.len())
    }

    /// Apply scheduled events in key order while `admit` accepts the next key.
    fn drain_scheduled(
        &self,
        state: &mut EngineState,
        admit: impl Fn(&EventKey) -> bool,
    ) -> Result<usize, EngineError> {
        let mut applied = 0;
        while let Some(entry) = state.scheduled.first_entry() {
            if !admit(entry.key()) {
                break;
            }
            let event = entry.remove();
            if state.applied.contains(&event.id) {
                continue;
            }
            self.apply_one(state, &event)?;
            applied += 1;
        }
        Ok(applied)
    }

    fn apply_one(&self, state: &mut EngineState, event: &Event) -> Result<LiveOutcome, EngineError> {
        let EngineState {
            store,
            dirty,
            applied,
            scheduled,
        } = state;

        match self.processor.apply(store, dirty, event) {
            Ok(chained) => {
                applied.insert(event.id.clone());
                if let Some(next) = chained {
                    self.log.insert(&next)?;
                    debug!(event_id = %next.id, name = %next.name, due = next.due_epoch, "chained event scheduled");
                    scheduled.insert(next.key(), next);
                }
                Ok(LiveOutcome::Applied)
            }
            Err(ProcessError::PreconditionFailed(reason)) => {
                applied.insert(event.id.clone());
                warn!(event_id = %event.id, name = %event.name, %reason, "event rejected");
                Ok(LiveOutcome::Rejected(reason))
            }
            Err(e) => {
                error!(event_id = %event.id, name = %event.name, error = %e, "event failed");
                Err(e.into())
            }
        }
    }

    fn flush(&self, state: &mut EngineState) -> Result<(), EngineError> {
        let EngineState { store, dirty, .. } = state;
        self.flusher.flush(store, dirty)?;
        Ok(())
    }
}
