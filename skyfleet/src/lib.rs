//! Skyfleet - Concurrent airport fleet coordination
//!
//! This library simulates a fixed fleet of aircraft flying between a fixed
//! set of airports: transfer requests arrive per airport, idle aircraft are
//! dispatched or requests are queued, landed aircraft pass through a bounded
//! turnaround pipeline, and aggregate counters are sampled on a fixed cadence.
//!
//! # High-Level API
//!
//! For most use cases, the [`sim`] module provides a simplified facade:
//!
//! ```ignore
//! use skyfleet::sim::{Simulation, SimulationConfig};
//! use skyfleet::ingest::RandomRequestSource;
//! use skyfleet::servicing::SimulatedTurnaround;
//!
//! let config = SimulationConfig::default().with_seed(7);
//! let simulation = Simulation::start(config, source, runner)?;
//!
//! // ... observe simulation.stats() / simulation.snapshots() ...
//!
//! simulation.shutdown().await;
//! ```

pub mod aircraft;
pub mod airport;
pub mod fleet;
pub mod ingest;
pub mod logging;
pub mod request;
pub mod servicing;
pub mod sim;
pub mod stats;

/// Version of the skyfleet library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
