//! Per-airport request queues.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::airport::AirportId;
use crate::request::FlightRequest;

/// One unbounded FIFO of pending requests per airport.
///
/// A request parks here only until an aircraft at its origin goes idle.
/// Push and pull sides both preserve arrival order; a pull that loses the
/// assignment race puts the request back at the front.
#[derive(Debug)]
pub struct RequestQueues {
    queues: Vec<Mutex<VecDeque<FlightRequest>>>,
}

impl RequestQueues {
    pub fn new(airport_count: usize) -> Self {
        let queues = (0..airport_count).map(|_| Mutex::default()).collect();
        Self { queues }
    }

    /// Appends a request to its origin's queue. Returns `false` for an
    /// origin outside the index.
    pub fn push(&self, request: FlightRequest) -> bool {
        match self.queue(request.origin) {
            Some(mut queue) => {
                queue.push_back(request);
                true
            }
            None => false,
        }
    }

    /// Puts a request back at the front of its origin's queue.
    pub fn push_front(&self, request: FlightRequest) {
        if let Some(mut queue) = self.queue(request.origin) {
            queue.push_front(request);
        }
    }

    /// Takes the oldest pending request for `airport`, if any.
    pub fn pop(&self, airport: AirportId) -> Option<FlightRequest> {
        self.queue(airport)?.pop_front()
    }

    /// Number of pending requests for `airport`.
    pub fn len(&self, airport: AirportId) -> usize {
        self.queue(airport).map_or(0, |queue| queue.len())
    }

    fn queue(&self, airport: AirportId) -> Option<MutexGuard<'_, VecDeque<FlightRequest>>> {
        self.queues
            .get(airport as usize)
            .map(|queue| queue.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queues_are_fifo_per_airport() {
        let queues = RequestQueues::new(2);
        queues.push(FlightRequest::new(0, 1));
        queues.push(FlightRequest::new(0, 2));
        queues.push(FlightRequest::new(1, 0));

        assert_eq!(queues.pop(0), Some(FlightRequest::new(0, 1)));
        assert_eq!(queues.pop(0), Some(FlightRequest::new(0, 2)));
        assert_eq!(queues.pop(0), None);
        assert_eq!(queues.pop(1), Some(FlightRequest::new(1, 0)));
    }

    #[test]
    fn push_front_restores_order() {
        let queues = RequestQueues::new(1);
        queues.push(FlightRequest::new(0, 1));
        queues.push(FlightRequest::new(0, 2));

        let first = queues.pop(0).unwrap();
        queues.push_front(first);
        assert_eq!(queues.pop(0), Some(FlightRequest::new(0, 1)));
        assert_eq!(queues.pop(0), Some(FlightRequest::new(0, 2)));
    }

    #[test]
    fn out_of_range_airport_is_rejected() {
        let queues = RequestQueues::new(1);
        assert!(!queues.push(FlightRequest::new(5, 0)));
        assert_eq!(queues.len(5), 0);
        assert_eq!(queues.pop(5), None);
    }
}
