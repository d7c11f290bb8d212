//! Turnaround pipeline.
//!
//! Landed aircraft queue on the [`ServiceBacklog`]; a single consumer task
//! pops them in FIFO order and dispatches turnaround work onto a bounded
//! worker pool. Completions flow back to the orchestrator over a channel,
//! which returns each aircraft to idle and re-binds its airport's request
//! feed.
//!
//! # Architecture
//!
//! ```text
//! Aircraft::advance (landing)
//!       │ offer
//!       ▼
//! ServiceBacklog (FIFO + duplicate suppression)
//!       │ pop (single consumer)
//!       ▼
//! ServicingDaemon ──permits──▶ turnaround workers (JoinSet)
//!       ▲                            │ TurnaroundRunner::run
//!       │                            ▼
//!       └───── completion channel ◀──┘
//! ```
//!
//! # Shutdown
//!
//! Cancelling the daemon's token stops the consumer immediately; workers
//! already running get a grace period (the configured shutdown timeout) to
//! finish, after which they are forcibly cancelled through a child token.
//! A forcibly cancelled worker kills any external process it spawned.

mod backlog;
mod runner;

pub use backlog::ServiceBacklog;
pub use runner::{
    CommandTurnaround, SimulatedTurnaround, TurnaroundError, TurnaroundReport, TurnaroundRunner,
    DEFAULT_SERVICE_COMMAND, DEFAULT_SIMULATED_TURNAROUND,
};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aircraft::{Aircraft, AircraftId};
use crate::airport::AirportId;

/// Default number of concurrent turnaround workers.
pub const DEFAULT_SERVICING_WORKERS: usize = 8;
/// Default grace period granted to in-flight turnarounds at shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Completion event delivered to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnaroundComplete {
    /// Airport where the turnaround ran (the aircraft's new home).
    pub airport: AirportId,
    pub aircraft: AircraftId,
}

/// Settings for the servicing pipeline.
#[derive(Debug, Clone)]
pub struct ServicingConfig {
    /// Maximum turnarounds in flight at once.
    pub workers: usize,
    /// How long shutdown waits for running turnarounds before cancelling.
    pub shutdown_timeout: Duration,
}

impl Default for ServicingConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_SERVICING_WORKERS,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Single consumer of the service backlog.
///
/// Owns the worker pool for the lifetime of [`run`](Self::run); the backlog
/// itself is shared with the aircraft that offer themselves into it.
pub struct ServicingDaemon {
    backlog: Arc<ServiceBacklog>,
    roster: Vec<Arc<Aircraft>>,
    runner: Arc<dyn TurnaroundRunner>,
    config: ServicingConfig,
    completion_tx: mpsc::UnboundedSender<TurnaroundComplete>,
}

impl ServicingDaemon {
    /// Creates the daemon and the completion channel it reports into.
    pub fn new(
        backlog: Arc<ServiceBacklog>,
        roster: Vec<Arc<Aircraft>>,
        runner: Arc<dyn TurnaroundRunner>,
        config: ServicingConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TurnaroundComplete>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        (
            Self {
                backlog,
                roster,
                runner,
                config,
                completion_tx,
            },
            completion_rx,
        )
    }

    /// Runs the consumer loop until `shutdown` is cancelled, then drains
    /// the worker pool as described in the module docs.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(workers = self.config.workers, "Servicing daemon starting");
        let permits = Arc::new(Semaphore::new(self.config.workers));
        let mut workers: JoinSet<()> = JoinSet::new();
        let worker_cancel = CancellationToken::new();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.backlog.wait_available() => {}
            }

            // Reap workers that have already finished.
            while let Some(result) = workers.try_join_next() {
                if let Err(err) = result {
                    error!(error = %err, "Turnaround worker failed");
                }
            }

            let id = match self.backlog.pop() {
                Some(id) => id,
                None => continue,
            };
            let aircraft = match self.roster.get(id as usize) {
                Some(aircraft) => Arc::clone(aircraft),
                None => {
                    warn!(aircraft = id, "Unknown aircraft id in backlog");
                    self.backlog.release(id);
                    continue;
                }
            };
            if !aircraft.begin_servicing() {
                warn!(
                    aircraft = id,
                    state = %aircraft.state(),
                    "Aircraft no longer awaiting service; skipping"
                );
                self.backlog.release(id);
                continue;
            }

            // Wait for pool capacity; shutdown interrupts the wait. An
            // aircraft stranded here stays flagged and is not re-enqueued.
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    warn!(
                        aircraft = id,
                        "Shutdown before dispatch; aircraft remains flagged for service"
                    );
                    break;
                }
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!(
                            aircraft = id,
                            "Worker pool closed; aircraft remains flagged for service"
                        );
                        break;
                    }
                },
            };

            let runner = Arc::clone(&self.runner);
            let backlog = Arc::clone(&self.backlog);
            let completion_tx = self.completion_tx.clone();
            let cancel = worker_cancel.child_token();
            let airport = aircraft.home();
            workers.spawn(async move {
                let _permit = permit;
                debug!(aircraft = id, airport, "Turnaround started");
                match runner.run(airport, id, cancel).await {
                    Ok(report) => {
                        info!(
                            aircraft = id,
                            airport,
                            token = %report.completion_token,
                            "Turnaround complete"
                        );
                        backlog.release(id);
                        let _ = completion_tx.send(TurnaroundComplete {
                            airport,
                            aircraft: id,
                        });
                    }
                    Err(TurnaroundError::Cancelled) => {
                        warn!(
                            aircraft = id,
                            airport, "Turnaround forcibly cancelled during shutdown"
                        );
                    }
                    Err(err) => {
                        error!(
                            aircraft = id,
                            airport,
                            error = %err,
                            "Turnaround failed; aircraft remains flagged for service"
                        );
                    }
                }
            });
        }

        self.drain(workers, worker_cancel).await;
    }

    /// Bounded drain: grant running turnarounds the configured grace period,
    /// then force-cancel whatever is left.
    async fn drain(&self, mut workers: JoinSet<()>, worker_cancel: CancellationToken) {
        self.backlog.close();
        let active = workers.len();
        if active > 0 {
            info!(active, "Waiting for in-flight turnarounds");
        }

        let grace = tokio::time::timeout(self.config.shutdown_timeout, async {
            while let Some(result) = workers.join_next().await {
                if let Err(err) = result {
                    error!(error = %err, "Turnaround worker failed");
                }
            }
        })
        .await;

        if grace.is_err() {
            warn!(
                remaining = workers.len(),
                timeout = ?self.config.shutdown_timeout,
                "Grace period expired; forcing turnaround cancellation"
            );
            worker_cancel.cancel();
            while let Some(result) = workers.join_next().await {
                if let Err(err) = result {
                    error!(error = %err, "Turnaround worker failed");
                }
            }
        }
        info!("Servicing daemon stopped");
    }
}
