//! Command Ingress
//!
//! Hands events from request-handling code to the worker. Every event is
//! persisted first and then offered to a bounded queue without blocking;
//! when the queue is full the event is left to the next resync and the
//! worker is woken to run one early.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tracing::{debug, warn};

use stickerio_events::{Epoch, Event, EventId, EventKind, EventName};

use crate::persistence::{EventLog, LogError};

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("failed to persist event: {0}")]
    Log(#[from] LogError),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0} events cannot be submitted by players")]
    NotACommand(EventName),
}

/// How an accepted event will reach the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// On the fast path
    Queued,
    /// Left to the next resync
    Deferred,
    /// Already in the log
    Duplicate,
}

/// Acknowledgement for a submitted command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub event_id: EventId,
    pub due_epoch: Epoch,
    pub submission: Submission,
}

/// Producer side of the ingress queue.
#[derive(Clone)]
pub struct CommandIngress {
    log: Arc<dyn EventLog>,
    sender: mpsc::Sender<Event>,
    resync: Arc<Notify>,
}

/// Worker side of the ingress queue
pub struct IngressReceiver {
    pub events: mpsc::Receiver<Event>,
    pub resync: Arc<Notify>,
}

/// Create a bounded ingress queue in front of `log`.
pub fn channel(log: Arc<dyn EventLog>, capacity: usize) -> (CommandIngress, IngressReceiver) {
    let (sender, events) = mpsc::channel(capacity.max(1));
    let resync = Arc::new(Notify::new());
    (
        CommandIngress {
            log,
            sender,
            resync: resync.clone(),
        },
        IngressReceiver { events, resync },
    )
}

impl CommandIngress {
    /// Persist an event, then offer it to the worker.
    pub fn submit(&self, event: Event) -> Result<Submission, IngressError> {
        if !self.log.insert(&event)? {
            debug!(event_id = %event.id, "event already in log");
            return Ok(Submission::Duplicate);
        }
        let event_id = event.id.clone();
        match self.sender.try_send(event) {
            Ok(()) => Ok(Submission::Queued),
            Err(TrySendError::Full(_)) => {
                warn!(event_id = %event_id, "ingress queue full, deferring to resync");
                self.resync.notify_one();
                Ok(Submission::Deferred)
            }
            Err(TrySendError::Closed(_)) => {
                warn!(event_id = %event_id, "ingress queue closed, deferring to resync");
                Ok(Submission::Deferred)
            }
        }
    }

    /// Submit a player command with a fresh id, due at the server's `now`.
    pub fn submit_command(&self, kind: EventKind, now: Epoch) -> Result<Receipt, IngressError> {
        let name = kind.name();
        if !name.is_player_command() {
            return Err(IngressError::NotACommand(name));
        }
        let event = Event::new(EventId::generate(), now, &kind)?;
        let event_id = event.id.clone();
        let submission = self.submit(event)?;
        Ok(Receipt {
            event_id,
            due_epoch: now,
            submission,
        })
    }
}
