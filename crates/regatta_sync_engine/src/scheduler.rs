//! Periodic drain scheduling.
//!
//! One background task owns the drain loop: it ticks on a fixed
//! interval, probes connectivity, and runs a single drain pass when the
//! hub is reachable. Because the loop awaits each pass before selecting
//! again, passes never overlap; a record enqueued while a pass runs is
//! simply picked up on the next tick.

use crate::error::{EngineError, EngineResult};
use crate::orchestrator::{DrainReport, SyncOrchestrator};
use crate::transport::SyncTransport;
use crate::unix_now_ms;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum Command {
    DrainNow(oneshot::Sender<EngineResult<DrainReport>>),
    Shutdown,
}

/// Handle to a running drain scheduler.
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    /// Requests an immediate drain pass and waits for its report.
    pub async fn drain_now(&self) -> EngineResult<DrainReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::DrainNow(reply_tx))
            .await
            .map_err(|_| EngineError::State("scheduler not running".into()))?;
        reply_rx
            .await
            .map_err(|_| EngineError::State("scheduler dropped the request".into()))?
    }

    /// Stops the scheduler. A pass in progress finishes first.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }
}

/// Spawns the background drain task.
///
/// Returns the control handle and the task's join handle.
pub fn spawn_scheduler<T: SyncTransport + 'static>(
    orchestrator: Arc<SyncOrchestrator<T>>,
    interval: Duration,
) -> (SchedulerHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(16);

    let task = tokio::spawn(async move {
        // First tick one full interval out, not at startup.
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("drain scheduler started");

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::DrainNow(reply)) => {
                        let result = orchestrator.drain(unix_now_ms());
                        let _ = reply.send(result);
                    }
                    Some(Command::Shutdown) | None => {
                        info!("drain scheduler stopping");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if !orchestrator.transport().probe() {
                        debug!("hub unreachable, skipping tick");
                        continue;
                    }
                    match orchestrator.drain(unix_now_ms()) {
                        Ok(report) if report.attempted > 0 => {
                            debug!(
                                attempted = report.attempted,
                                synced = report.synced,
                                "periodic drain finished"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "periodic drain failed"),
                    }
                }
            }
        }
    });

    (SchedulerHandle { tx }, task)
}
