//! Simulation runtime orchestrator.
//!
//! This module provides the central runtime that wires the subsystems
//! together and manages their lifecycles. The runtime owns the shutdown
//! tokens and the completion channel between servicing and the feeds.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          Simulation                            │
//! │                                                                │
//! │  RequestFeed (one per airport)                                 │
//! │        │ assign                                                │
//! │        ▼                                                       │
//! │  FleetCoordinator ──ticks──► Aircraft ──landing──► Backlog     │
//! │        ▲                                              │        │
//! │        │ restart feed      ServicingDaemon ◄──────────┘        │
//! │        └──────────────◄── completion channel                   │
//! │                                                                │
//! │  StatsSampler (periodic snapshot of the fleet)                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use skyfleet::sim::{Simulation, SimulationConfig};
//!
//! let sim = Simulation::start(config, source, runner)?;
//!
//! // Observe while it runs
//! let stats = sim.stats();
//!
//! // When shutting down
//! sim.shutdown().await;
//! ```

mod config;
mod error;

pub use config::SimulationConfig;
pub use error::SimError;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::aircraft::{Aircraft, AircraftSnapshot};
use crate::airport::{AirportId, AirportIndex};
use crate::fleet::FleetCoordinator;
use crate::ingest::{FeedHandle, RequestFeed, RequestSource};
use crate::servicing::{ServiceBacklog, ServicingDaemon, TurnaroundComplete, TurnaroundRunner};
use crate::stats::{self, FleetStats, SharedFleetStats, StatsSampler};

/// The running simulation.
///
/// Owns every background task and the tokens that stop them. Created with
/// [`Simulation::start`], observed through the accessor methods, and torn
/// down with [`Simulation::shutdown`].
///
/// # Lifecycle
///
/// 1. **Creation**: `start()` validates the configuration, places the
///    airports, distributes the fleet, and spawns all background tasks.
/// 2. **Operation**: feeds pull requests, the coordinator flies aircraft,
///    the servicing daemon turns them around.
/// 3. **Shutdown**: `shutdown()` stops the subsystems in dependency order
///    and waits for each to finish.
pub struct Simulation {
    airports: Arc<AirportIndex>,
    fleet: Arc<FleetCoordinator>,
    backlog: Arc<ServiceBacklog>,
    stats: SharedFleetStats,

    feed_tasks: JoinSet<()>,
    tick_tasks: JoinSet<()>,
    servicing_task: Option<JoinHandle<()>>,
    completion_task: Option<JoinHandle<()>>,
    stats_task: Option<JoinHandle<()>>,

    ingest_token: CancellationToken,
    servicing_token: CancellationToken,
    fleet_token: CancellationToken,
    stats_token: CancellationToken,
}

impl Simulation {
    /// Builds the world and spawns every background task.
    ///
    /// Must be called from within a Tokio runtime. The `source` supplies
    /// flight requests per airport and the `runner` performs turnarounds.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is unusable or airport
    /// placement fails.
    pub fn start(
        config: SimulationConfig,
        source: Arc<dyn RequestSource>,
        runner: Arc<dyn TurnaroundRunner>,
    ) -> Result<Self, SimError> {
        if config.fleet.fleet_size == 0 {
            return Err(SimError::EmptyFleet);
        }
        if !config.fleet.step.is_finite() || config.fleet.step <= 0.0 {
            return Err(SimError::InvalidStep(config.fleet.step));
        }
        if config.fleet.tick_interval.is_zero() {
            return Err(SimError::ZeroInterval("tick"));
        }
        if config.stats.sample_interval.is_zero() {
            return Err(SimError::ZeroInterval("sample"));
        }

        let airports = Arc::new(AirportIndex::random(&config.world)?);
        let backlog = Arc::new(ServiceBacklog::new());
        let roster =
            FleetCoordinator::distribute(&airports, config.fleet.fleet_size, &backlog);
        let fleet = Arc::new(FleetCoordinator::new(
            Arc::clone(&airports),
            roster.clone(),
            config.fleet.clone(),
        ));

        info!(
            airports = airports.len(),
            fleet = roster.len(),
            "Simulation starting"
        );

        let ingest_token = CancellationToken::new();
        let servicing_token = CancellationToken::new();
        let fleet_token = CancellationToken::new();
        let stats_token = CancellationToken::new();

        // One request feed per airport, all sharing the source.
        let mut feed_tasks = JoinSet::new();
        let mut feeds = HashMap::with_capacity(airports.len());
        for airport in airports.iter() {
            let (feed, handle) = RequestFeed::new(
                airport.id(),
                Arc::clone(&source),
                Arc::clone(&fleet),
                &config.ingest,
            );
            feed_tasks.spawn(feed.run(ingest_token.clone()));
            feeds.insert(airport.id(), handle);
        }
        let feeds = Arc::new(feeds);

        let (daemon, completion_rx) = ServicingDaemon::new(
            Arc::clone(&backlog),
            roster.clone(),
            runner,
            config.servicing.clone(),
        );
        let servicing_task = Some(tokio::spawn(daemon.run(servicing_token.clone())));

        let completion_task = Some(tokio::spawn(Self::handle_completions(
            completion_rx,
            roster,
            Arc::clone(&feeds),
        )));

        let sampler = StatsSampler::new(Arc::clone(&fleet), config.stats.clone());
        let stats = sampler.shared();
        let stats_task = Some(tokio::spawn(sampler.run(stats_token.clone())));

        let tick_tasks = fleet.spawn_ticks(fleet_token.clone());

        info!("Simulation started");

        Ok(Self {
            airports,
            fleet,
            backlog,
            stats,
            feed_tasks,
            tick_tasks,
            servicing_task,
            completion_task,
            stats_task,
            ingest_token,
            servicing_token,
            fleet_token,
            stats_token,
        })
    }

    /// Returns an aircraft to duty after its turnaround and revives the
    /// request feed at the airport it now calls home.
    ///
    /// Ends when the servicing daemon drops its side of the channel.
    async fn handle_completions(
        mut completion_rx: mpsc::UnboundedReceiver<TurnaroundComplete>,
        roster: Vec<Arc<Aircraft>>,
        feeds: Arc<HashMap<AirportId, FeedHandle>>,
    ) {
        while let Some(done) = completion_rx.recv().await {
            match roster.get(done.aircraft as usize) {
                Some(aircraft) => {
                    if !aircraft.complete_servicing(done.airport) {
                        warn!(
                            aircraft = done.aircraft,
                            "Turnaround completion for aircraft not in servicing"
                        );
                    }
                }
                None => warn!(
                    aircraft = done.aircraft,
                    "Turnaround completion for unknown aircraft"
                ),
            }
            if let Some(feed) = feeds.get(&done.airport) {
                feed.restart(done.airport);
            }
        }
    }

    /// The airport layout this run was built on.
    pub fn airports(&self) -> &AirportIndex {
        &self.airports
    }

    /// Latest published statistics sample.
    pub fn stats(&self) -> FleetStats {
        stats::read(&self.stats)
    }

    /// Handle to the statistics slot itself.
    ///
    /// Useful when the final numbers are wanted after [`Simulation::shutdown`]
    /// has consumed the simulation; the sampler publishes one last sample
    /// on its way out.
    pub fn shared_stats(&self) -> SharedFleetStats {
        Arc::clone(&self.stats)
    }

    /// Point-in-time view of every aircraft.
    pub fn snapshots(&self) -> Vec<AircraftSnapshot> {
        self.fleet.snapshots()
    }

    /// Requests parked at `airport` waiting for an idle aircraft.
    pub fn queue_len(&self, airport: AirportId) -> usize {
        self.fleet.queue_len(airport)
    }

    /// Aircraft currently waiting for or undergoing a turnaround.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Stops the simulation, subsystem by subsystem.
    ///
    /// Feeds stop first so no new requests arrive, then the servicing
    /// daemon drains its workers, then aircraft ticking halts. The
    /// completion handler ends once the daemon's channel closes, and the
    /// sampler publishes one last snapshot before exiting.
    pub async fn shutdown(mut self) {
        info!("Simulation shutting down");

        self.ingest_token.cancel();
        while let Some(res) = self.feed_tasks.join_next().await {
            if let Err(e) = res {
                error!("Request feed task panicked: {e}");
            }
        }

        self.servicing_token.cancel();
        if let Some(handle) = self.servicing_task.take() {
            match handle.await {
                Ok(()) => info!("Servicing daemon shut down cleanly"),
                Err(e) => error!("Servicing daemon task panicked: {e}"),
            }
        }

        self.fleet_token.cancel();
        while let Some(res) = self.tick_tasks.join_next().await {
            if let Err(e) = res {
                error!("Tick task panicked: {e}");
            }
        }

        if let Some(handle) = self.completion_task.take() {
            if let Err(e) = handle.await {
                error!("Completion handler task panicked: {e}");
            }
        }

        self.stats_token.cancel();
        if let Some(handle) = self.stats_task.take() {
            if let Err(e) = handle.await {
                error!("Stats sampler task panicked: {e}");
            }
        }

        info!("Simulation stopped");
    }
}
