//! Simulation configuration.

use std::time::Duration;

use crate::airport::PlacementConfig;
use crate::fleet::FleetConfig;
use crate::ingest::FeedConfig;
use crate::servicing::ServicingConfig;
use crate::stats::StatsConfig;

/// Configuration for a complete simulation.
///
/// Groups the per-subsystem configurations, providing sensible defaults
/// while allowing customization of the common knobs.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use skyfleet::sim::SimulationConfig;
///
/// // Using defaults
/// let config = SimulationConfig::default();
/// assert_eq!(config.world.count, 10);
/// assert_eq!(config.fleet.fleet_size, 10);
///
/// // Custom configuration
/// let config = SimulationConfig::new()
///     .with_airports(4)
///     .with_fleet_size(6)
///     .with_seed(42)
///     .with_tick_interval(Duration::from_millis(20));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimulationConfig {
    /// Airport placement parameters.
    pub world: PlacementConfig,
    /// Fleet size and movement parameters.
    pub fleet: FleetConfig,
    /// Turnaround worker pool parameters.
    pub servicing: ServicingConfig,
    /// Request feed parameters.
    pub ingest: FeedConfig,
    /// Statistics sampling parameters.
    pub stats: StatsConfig,
}

impl SimulationConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of airports to place. Default: 10.
    pub fn with_airports(mut self, count: u32) -> Self {
        self.world.count = count;
        self
    }

    /// Set the fleet size. Default: 10.
    pub fn with_fleet_size(mut self, fleet_size: u32) -> Self {
        self.fleet.fleet_size = fleet_size;
        self
    }

    /// Seed airport placement for a reproducible layout.
    ///
    /// Without a seed the layout is drawn from entropy.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.world.seed = Some(seed);
        self
    }

    /// Set the world dimensions in grid units. Default: 10.0 x 10.0.
    pub fn with_world_size(mut self, width: f64, height: f64) -> Self {
        self.world.world_width = width;
        self.world.world_height = height;
        self
    }

    /// Set the pause between movement ticks. Default: 100ms.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.fleet.tick_interval = interval;
        self
    }

    /// Set the distance an aircraft covers per tick. Default: 1.0.
    pub fn with_step(mut self, step: f64) -> Self {
        self.fleet.step = step;
        self
    }

    /// Set the maximum concurrent turnarounds. Default: 8.
    pub fn with_service_workers(mut self, workers: usize) -> Self {
        self.servicing.workers = workers;
        self
    }

    /// Set how long shutdown waits for running turnarounds. Default: 60s.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.servicing.shutdown_timeout = timeout;
        self
    }

    /// Set the pause between statistics samples. Default: 1s.
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.stats.sample_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_subsystem_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.world.count, 10);
        assert_eq!(config.fleet.fleet_size, 10);
        assert_eq!(config.servicing.workers, 8);
        assert_eq!(config.stats.sample_interval, Duration::from_secs(1));
        assert!(config.world.seed.is_none());
    }

    #[test]
    fn builders_override_individual_fields() {
        let config = SimulationConfig::new()
            .with_airports(3)
            .with_fleet_size(5)
            .with_seed(7)
            .with_step(0.25)
            .with_service_workers(2);

        assert_eq!(config.world.count, 3);
        assert_eq!(config.fleet.fleet_size, 5);
        assert_eq!(config.world.seed, Some(7));
        assert_eq!(config.fleet.step, 0.25);
        assert_eq!(config.servicing.workers, 2);
        // Untouched sections keep their defaults.
        assert_eq!(config.fleet.tick_interval, Duration::from_millis(100));
    }
}
