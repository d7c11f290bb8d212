//! Periodic fleet statistics.
//!
//! A single sampler task recomputes aggregate counters from fleet
//! snapshots on a fixed cadence and publishes them through a shared
//! read-write slot. The counters are purely derived state: nothing else in
//! the system increments them, so a reader always sees one internally
//! consistent sample rather than a mix of event-driven updates.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::aircraft::AircraftState;
use crate::fleet::FleetCoordinator;

/// Default pause between samples.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// One consistent sample of fleet-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetStats {
    /// Aircraft currently en route.
    pub in_flight: usize,
    /// Aircraft in the turnaround pipeline (landed, not yet back to idle).
    pub servicing: usize,
    /// Completed trips summed over the whole fleet.
    pub completed_trips: u64,
}

/// Shared handle to the latest sample.
pub type SharedFleetStats = Arc<RwLock<FleetStats>>;

/// Settings for the sampler.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Pause between samples.
    pub sample_interval: Duration,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

/// Periodic recomputation of [`FleetStats`].
pub struct StatsSampler {
    fleet: Arc<FleetCoordinator>,
    shared: SharedFleetStats,
    config: StatsConfig,
}

impl StatsSampler {
    pub fn new(fleet: Arc<FleetCoordinator>, config: StatsConfig) -> Self {
        Self {
            fleet,
            shared: Arc::new(RwLock::new(FleetStats::default())),
            config,
        }
    }

    /// Handle readers use to observe the latest sample.
    pub fn shared(&self) -> SharedFleetStats {
        Arc::clone(&self.shared)
    }

    /// Samples on the configured cadence until `shutdown` is cancelled,
    /// publishing one final sample on the way out.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.sample();
        }

        self.sample();
        debug!("Stats sampler stopped");
    }

    fn sample(&self) {
        let mut stats = FleetStats::default();
        for snapshot in self.fleet.snapshots() {
            match snapshot.state {
                AircraftState::InFlight => stats.in_flight += 1,
                AircraftState::AwaitingService | AircraftState::Servicing => {
                    stats.servicing += 1
                }
                AircraftState::Idle => {}
            }
            stats.completed_trips += snapshot.trips;
        }
        if let Ok(mut slot) = self.shared.write() {
            *slot = stats;
        }
    }
}

/// Copies the latest sample out of a shared handle.
pub fn read(shared: &SharedFleetStats) -> FleetStats {
    shared.read().map(|stats| *stats).unwrap_or_default()
}
