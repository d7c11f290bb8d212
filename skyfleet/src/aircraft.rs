//! Aircraft state machine.
//!
//! Each aircraft guards its whole mutable tuple (position, target, state,
//! home airport, trip count) with one lock, and every transition method is a
//! check-and-set: it verifies the current state and applies the transition
//! inside a single critical section. Concurrent callers therefore cannot
//! double-assign an aircraft or land it twice. The lock is never held across
//! a call into another component.
//!
//! The lifecycle is strictly linear:
//!
//! ```text
//! Idle ──begin_flight──▶ InFlight ──advance (arrival)──▶ AwaitingService
//!   ▲                                                          │
//!   └────complete_servicing──── Servicing ◀──begin_servicing───┘
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::airport::AirportId;
use crate::servicing::ServiceBacklog;

/// Identifier of an aircraft within the fleet roster.
///
/// Ids are assigned sequentially from zero in roster order.
pub type AircraftId = u32;

/// Lifecycle state of a single aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AircraftState {
    /// Parked at its home airport, available for assignment.
    Idle,
    /// En route to a destination airport.
    InFlight,
    /// Landed and queued for turnaround.
    AwaitingService,
    /// Turnaround in progress (or terminally failed).
    Servicing,
}

impl fmt::Display for AircraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AircraftState::Idle => "idle",
            AircraftState::InFlight => "in flight",
            AircraftState::AwaitingService => "awaiting service",
            AircraftState::Servicing => "servicing",
        };
        write!(f, "{name}")
    }
}

/// Outcome of one movement tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// Not in flight; nothing to do.
    Parked,
    /// Moved toward the target with `remaining` distance still to cover.
    Moving { remaining: f64 },
    /// Arrived and landed at `airport` on this tick.
    Landed { airport: AirportId },
}

struct AircraftInner {
    x: f64,
    y: f64,
    target_x: f64,
    target_y: f64,
    state: AircraftState,
    home: AirportId,
    destination: AirportId,
    trips: u64,
}

/// Consistent copy of an aircraft's observable state.
///
/// Taken under the aircraft's lock, so the position pair and the counters
/// always belong to the same instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AircraftSnapshot {
    pub id: AircraftId,
    pub x: f64,
    pub y: f64,
    pub state: AircraftState,
    pub home: AirportId,
    pub trips: u64,
}

/// A single aircraft.
///
/// Aircraft are shared between the coordinator's movement task, the
/// assignment paths, and the servicing pipeline; all of them go through the
/// transition methods below.
pub struct Aircraft {
    id: AircraftId,
    backlog: Arc<ServiceBacklog>,
    inner: Mutex<AircraftInner>,
}

impl Aircraft {
    /// Creates an idle aircraft parked at `home`.
    pub fn new(
        id: AircraftId,
        home: AirportId,
        position: (f64, f64),
        backlog: Arc<ServiceBacklog>,
    ) -> Self {
        Self {
            id,
            backlog,
            inner: Mutex::new(AircraftInner {
                x: position.0,
                y: position.1,
                target_x: position.0,
                target_y: position.1,
                state: AircraftState::Idle,
                home,
                destination: home,
                trips: 0,
            }),
        }
    }

    pub fn id(&self) -> AircraftId {
        self.id
    }

    pub fn state(&self) -> AircraftState {
        self.locked().state
    }

    /// Airport the aircraft currently belongs to.
    pub fn home(&self) -> AirportId {
        self.locked().home
    }

    /// Starts a flight toward `destination`.
    ///
    /// The guard shared by both dispatch paths: succeeds only if the
    /// aircraft is idle AND parked at `origin`, refusing silently otherwise.
    /// An aircraft that is in flight, awaiting service, or being serviced
    /// cannot take a new assignment.
    pub fn begin_flight(
        &self,
        origin: AirportId,
        destination: AirportId,
        target_x: f64,
        target_y: f64,
    ) -> bool {
        let mut inner = self.locked();
        if inner.home != origin {
            return false;
        }
        if inner.state != AircraftState::Idle {
            let state = inner.state;
            drop(inner);
            debug!(aircraft = self.id, %state, "Refusing flight start");
            return false;
        }
        inner.destination = destination;
        inner.target_x = target_x;
        inner.target_y = target_y;
        inner.state = AircraftState::InFlight;
        drop(inner);
        info!(aircraft = self.id, origin, destination, "Flight started");
        true
    }

    /// Moves at most `step` units toward the target.
    ///
    /// When the remaining distance fits in this tick the aircraft lands as
    /// part of the same critical section: position and home become the
    /// destination airport, the trip counter increments, and the state
    /// becomes [`AircraftState::AwaitingService`]. The backlog offer happens
    /// after the lock is released and fires exactly once per landing.
    pub fn advance(&self, step: f64) -> Progress {
        let (airport, trips) = {
            let mut inner = self.locked();
            if inner.state != AircraftState::InFlight {
                return Progress::Parked;
            }
            let dx = inner.target_x - inner.x;
            let dy = inner.target_y - inner.y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > step {
                let scale = step / distance;
                inner.x += dx * scale;
                inner.y += dy * scale;
                return Progress::Moving {
                    remaining: distance - step,
                };
            }
            inner.x = inner.target_x;
            inner.y = inner.target_y;
            inner.home = inner.destination;
            inner.state = AircraftState::AwaitingService;
            inner.trips += 1;
            (inner.destination, inner.trips)
        };
        info!(aircraft = self.id, airport, trips, "Aircraft landed");
        self.backlog.offer(self);
        Progress::Landed { airport }
    }

    /// Marks the turnaround as started. Used by the servicing consumer when
    /// a worker picks the aircraft up.
    pub fn begin_servicing(&self) -> bool {
        let mut inner = self.locked();
        if inner.state != AircraftState::AwaitingService {
            return false;
        }
        inner.state = AircraftState::Servicing;
        true
    }

    /// Returns the aircraft to idle at `airport` after a successful
    /// turnaround, restoring its assignment eligibility.
    pub fn complete_servicing(&self, airport: AirportId) -> bool {
        let mut inner = self.locked();
        if inner.state != AircraftState::Servicing {
            return false;
        }
        inner.home = airport;
        inner.state = AircraftState::Idle;
        drop(inner);
        debug!(aircraft = self.id, airport, "Aircraft back in rotation");
        true
    }

    pub fn snapshot(&self) -> AircraftSnapshot {
        let inner = self.locked();
        AircraftSnapshot {
            id: self.id,
            x: inner.x,
            y: inner.y,
            state: inner.state,
            home: inner.home,
            trips: inner.trips,
        }
    }

    fn locked(&self) -> MutexGuard<'_, AircraftInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Aircraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Aircraft")
            .field("id", &snapshot.id)
            .field("state", &snapshot.state)
            .field("home", &snapshot.home)
            .field("trips", &snapshot.trips)
            .finish()
    }
}
