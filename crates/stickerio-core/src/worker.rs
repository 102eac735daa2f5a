//! Worker Task
//!
//! The single execution context of the engine: drains the ingress queue,
//! sweeps the schedule and resyncs on a timer or when the ingress dropped
//! an event. Engine errors are logged and the loop carries on; the next
//! resync repairs whatever a failed pass left behind.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use stickerio_events::Epoch;

use crate::engine::{Engine, LiveOutcome};
use crate::ingress::IngressReceiver;

/// Source of the current epoch
pub type Clock = fn() -> Epoch;

/// Wall-clock seconds since the Unix epoch
pub fn system_clock() -> Epoch {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as Epoch)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub resync_interval: Duration,
    pub sweep_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(10),
            sweep_interval: Duration::from_millis(500),
        }
    }
}

/// Run until `shutdown` flips to true or the ingress closes.
///
/// The first resync runs immediately, so the engine materializes the
/// existing log before taking live events.
pub async fn run_worker(
    engine: Arc<Engine>,
    mut ingress: IngressReceiver,
    settings: WorkerSettings,
    clock: Clock,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut resync_tick = interval(settings.resync_interval);
    resync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sweep_tick = interval(settings.sweep_interval);
    sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        resync_secs = settings.resync_interval.as_secs_f64(),
        sweep_ms = settings.sweep_interval.as_millis() as u64,
        "worker started"
    );

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = resync_tick.tick() => resync(&engine, clock()),
            _ = ingress.resync.notified() => {
                info!("ingress dropped an event, resyncing early");
                resync(&engine, clock());
                resync_tick.reset();
            }
            // Ahead of the ingress so a busy queue cannot starve the schedule
            _ = sweep_tick.tick() => {
                if let Err(e) = engine.apply_due(clock()) {
                    error!(error = %e, "schedule sweep failed");
                }
            }
            received = ingress.events.recv() => {
                let Some(event) = received else {
                    info!("ingress closed");
                    break;
                };
                match engine.apply_live(event, clock()) {
                    Ok(LiveOutcome::Applied) | Ok(LiveOutcome::Scheduled) => {}
                    Ok(outcome) => debug!(?outcome, "live event not applied"),
                    Err(e) => error!(error = %e, "live pass failed"),
                }
            }
        }
    }
    info!("worker stopped");
}

fn resync(engine: &Engine, now: Epoch) {
    if let Err(e) = engine.resync(now) {
        error!(error = %e, "resync failed, keeping previous state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stickerio_events::{Coordinates, CreateCity, EventKind, PlayerId};

    use crate::config::GameConfig;
    use crate::ingress;
    use crate::persistence::{InMemoryEventLog, InMemoryReadModel, ReadModelReader};

    fn fixed_clock() -> Epoch {
        1_000
    }

    #[tokio::test]
    async fn test_worker_applies_commands_and_stops() {
        let log = Arc::new(InMemoryEventLog::new());
        let view = Arc::new(InMemoryReadModel::new());
        let engine = Arc::new(Engine::new(
            Arc::new(GameConfig::default()),
            42,
            log.clone(),
            view.clone(),
        ));
        let (commands, receiver) = ingress::channel(log.clone(), 8);
        let (stop, shutdown) = watch::channel(false);

        let settings = WorkerSettings {
            resync_interval: Duration::from_secs(60),
            sweep_interval: Duration::from_millis(10),
        };
        let handle = tokio::spawn(run_worker(
            engine.clone(),
            receiver,
            settings,
            fixed_clock,
            shutdown,
        ));

        let found = EventKind::CreateCity(CreateCity {
            city_id: "c1".into(),
            name: "Stickton".into(),
            player_id: PlayerId::from("p1"),
            location: Coordinates::new(0, 0),
            resources: Default::default(),
            units: Default::default(),
        });
        commands.submit_command(found, fixed_clock()).unwrap();

        let mut seen = false;
        for _ in 0..100 {
            if view.get_city(&"c1".into()).unwrap().is_some() {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(seen, "city should reach the read model");

        stop.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should stop")
            .unwrap();
    }
}
