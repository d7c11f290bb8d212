//! Transfer requests flowing from ingestion to the fleet coordinator.

use std::fmt;

use crate::airport::AirportId;

/// A request to fly one aircraft from `origin` to `destination`.
///
/// Requests are immutable values: created by a request feed, then consumed
/// exactly once by the fleet coordinator, either dispatched immediately or
/// parked in the origin airport's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightRequest {
    pub origin: AirportId,
    pub destination: AirportId,
}

impl FlightRequest {
    pub fn new(origin: AirportId, destination: AirportId) -> Self {
        Self {
            origin,
            destination,
        }
    }
}

impl fmt::Display for FlightRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)
    }
}
