//! Fleet coordination.
//!
//! The coordinator owns the aircraft roster and the per-airport request
//! queues, and drives one periodic movement task per aircraft. Assignment
//! has two paths that share one guard:
//!
//! - push: [`FleetCoordinator::assign`] scans the roster for an idle
//!   aircraft parked at the origin and starts the flight immediately,
//!   falling back to the origin's queue;
//! - pull: each aircraft's movement task drains its home airport's queue
//!   the moment the aircraft goes idle.
//!
//! Both paths start flights through [`Aircraft::begin_flight`], a
//! single-lock check-and-set, so a request can never be satisfied twice and
//! an aircraft can never fly two requests at once.

mod queues;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::aircraft::{Aircraft, AircraftId, AircraftSnapshot, AircraftState, Progress};
use crate::airport::{AirportId, AirportIndex};
use crate::request::FlightRequest;
use crate::servicing::ServiceBacklog;

use queues::RequestQueues;

/// Default number of aircraft in the fleet.
pub const DEFAULT_FLEET_SIZE: u32 = 10;
/// Default pause between movement ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
/// Default distance covered per tick, in grid units.
pub const DEFAULT_STEP: f64 = 1.0;

/// Settings for fleet sizing and movement.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Number of aircraft distributed across the airports.
    pub fleet_size: u32,
    /// Fixed sleep quantum between movement ticks.
    pub tick_interval: Duration,
    /// Distance covered per tick.
    pub step: f64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            fleet_size: DEFAULT_FLEET_SIZE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            step: DEFAULT_STEP,
        }
    }
}

/// Outcome of [`FleetCoordinator::assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// An idle aircraft took the flight.
    Dispatched(AircraftId),
    /// Every aircraft at the origin was busy; the request was queued.
    Queued,
    /// The request referenced an airport outside the index.
    UnknownAirport,
}

/// Owns the roster and request queues; matches requests to aircraft.
pub struct FleetCoordinator {
    airports: Arc<AirportIndex>,
    roster: Vec<Arc<Aircraft>>,
    queues: RequestQueues,
    config: FleetConfig,
}

impl FleetCoordinator {
    pub fn new(
        airports: Arc<AirportIndex>,
        roster: Vec<Arc<Aircraft>>,
        config: FleetConfig,
    ) -> Self {
        let queues = RequestQueues::new(airports.len());
        Self {
            airports,
            roster,
            queues,
            config,
        }
    }

    /// Builds a roster of `fleet_size` idle aircraft spread evenly across
    /// the airports: `fleet_size / airports` each, remainder going to the
    /// first airports in id order. Ids are sequential from zero.
    pub fn distribute(
        airports: &AirportIndex,
        fleet_size: u32,
        backlog: &Arc<ServiceBacklog>,
    ) -> Vec<Arc<Aircraft>> {
        let airport_count = airports.len() as u32;
        if airport_count == 0 {
            return Vec::new();
        }
        let per_airport = fleet_size / airport_count;
        let remainder = fleet_size % airport_count;

        let mut roster = Vec::with_capacity(fleet_size as usize);
        let mut next_id: AircraftId = 0;
        for airport in airports.iter() {
            let extra = u32::from(airport.id() < remainder);
            for _ in 0..per_airport + extra {
                roster.push(Arc::new(Aircraft::new(
                    next_id,
                    airport.id(),
                    airport.position(),
                    Arc::clone(backlog),
                )));
                next_id += 1;
            }
        }
        roster
    }

    /// Routes one request: dispatch to the first idle aircraft parked at
    /// the origin, or park the request in the origin's queue.
    pub fn assign(&self, request: FlightRequest) -> Assignment {
        let target = match self.airports.get(request.destination) {
            Some(airport) => airport.position(),
            None => {
                warn!(
                    origin = request.origin,
                    destination = request.destination,
                    "Dropping request for unknown destination airport"
                );
                return Assignment::UnknownAirport;
            }
        };
        if self.airports.get(request.origin).is_none() {
            warn!(
                origin = request.origin,
                destination = request.destination,
                "Dropping request from unknown origin airport"
            );
            return Assignment::UnknownAirport;
        }

        for aircraft in &self.roster {
            if aircraft.begin_flight(request.origin, request.destination, target.0, target.1) {
                return Assignment::Dispatched(aircraft.id());
            }
        }

        self.queues.push(request);
        debug!(
            origin = request.origin,
            destination = request.destination,
            pending = self.queues.len(request.origin),
            "No idle aircraft at origin; request queued"
        );
        Assignment::Queued
    }

    /// Pending request count for one airport.
    pub fn queue_len(&self, airport: AirportId) -> usize {
        self.queues.len(airport)
    }

    /// Consistent snapshots of every aircraft, in roster order.
    pub fn snapshots(&self) -> Vec<AircraftSnapshot> {
        self.roster.iter().map(|aircraft| aircraft.snapshot()).collect()
    }

    /// Spawns one movement task per aircraft. Tasks run until `shutdown`
    /// is cancelled; the returned set joins them.
    pub fn spawn_ticks(self: &Arc<Self>, shutdown: CancellationToken) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        for aircraft in &self.roster {
            let coordinator = Arc::clone(self);
            let aircraft = Arc::clone(aircraft);
            let shutdown = shutdown.clone();
            tasks.spawn(async move {
                coordinator.tick_loop(aircraft, shutdown).await;
            });
        }
        tasks
    }

    /// One aircraft's periodic loop: advance the flight in progress, or
    /// pull the next queued request once idle.
    async fn tick_loop(&self, aircraft: Arc<Aircraft>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Progress::Parked = aircraft.advance(self.config.step) {
                if aircraft.state() == AircraftState::Idle {
                    self.pull_next(&aircraft);
                }
            }
        }
        debug!(aircraft = aircraft.id(), "Movement task stopped");
    }

    /// Pull path of assignment: take the oldest pending request for the
    /// aircraft's home airport. Losing the race against a push-path
    /// assignment returns the request to the front of the queue.
    fn pull_next(&self, aircraft: &Aircraft) {
        let request = match self.queues.pop(aircraft.home()) {
            Some(request) => request,
            None => return,
        };
        let target = match self.airports.get(request.destination) {
            Some(airport) => airport.position(),
            None => {
                warn!(
                    origin = request.origin,
                    destination = request.destination,
                    "Dropping queued request for unknown destination airport"
                );
                return;
            }
        };
        if !aircraft.begin_flight(request.origin, request.destination, target.0, target.1) {
            self.queues.push_front(request);
        }
    }
}
