//! Shared turnaround backlog.
//!
//! The backlog is the hand-off point between aircraft that have landed and
//! the servicing consumer: a mutex-guarded deque holds FIFO order, a
//! membership set suppresses duplicate offers, and a [`Notify`] gives the
//! single consumer a blocking "non-empty or closed" wait without holding
//! any lock across the await point.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::aircraft::{Aircraft, AircraftId, AircraftState};

#[derive(Debug, Default)]
struct BacklogInner {
    queue: VecDeque<AircraftId>,
    members: HashSet<AircraftId>,
    closed: bool,
}

/// FIFO of aircraft awaiting turnaround.
///
/// Membership of an aircraft lasts from the accepted offer until
/// [`release`](Self::release), which covers the whole turnaround; duplicate
/// offers in that window are no-ops. Offers after the backlog closes fail
/// silently.
#[derive(Debug, Default)]
pub struct ServiceBacklog {
    inner: Mutex<BacklogInner>,
    available: Notify,
}

impl ServiceBacklog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an aircraft for turnaround and wakes the consumer.
    ///
    /// Returns `false` without queueing if the aircraft is still in flight,
    /// is already queued or being serviced, or the backlog has closed. Safe
    /// to call concurrently for the same aircraft; at most one offer wins.
    pub fn offer(&self, aircraft: &Aircraft) -> bool {
        if aircraft.state() == AircraftState::InFlight {
            warn!(
                aircraft = aircraft.id(),
                "Refusing to queue an aircraft that is still in flight"
            );
            return false;
        }
        let mut inner = self.locked();
        if inner.closed {
            debug!(
                aircraft = aircraft.id(),
                "Backlog closed; dropping turnaround request"
            );
            return false;
        }
        if !inner.members.insert(aircraft.id()) {
            debug!(
                aircraft = aircraft.id(),
                "Aircraft already queued for turnaround"
            );
            return false;
        }
        inner.queue.push_back(aircraft.id());
        drop(inner);
        self.available.notify_one();
        true
    }

    /// Removes one id in FIFO order, if any. Membership is retained until
    /// [`release`](Self::release) so duplicate offers stay suppressed while
    /// the turnaround runs.
    pub(crate) fn pop(&self) -> Option<AircraftId> {
        self.locked().queue.pop_front()
    }

    /// Clears membership for `id`, allowing the aircraft to queue again
    /// after its next landing.
    pub(crate) fn release(&self, id: AircraftId) {
        self.locked().members.remove(&id);
    }

    /// Number of queued (not yet picked up) aircraft.
    pub fn len(&self) -> usize {
        self.locked().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rejects all future offers and wakes the consumer.
    pub(crate) fn close(&self) {
        self.locked().closed = true;
        self.available.notify_one();
    }

    /// Waits until the backlog holds at least one entry or has closed.
    pub(crate) async fn wait_available(&self) {
        loop {
            // Arm the notification before checking, so an offer landing
            // between the check and the await cannot be missed.
            let notified = self.available.notified();
            {
                let inner = self.locked();
                if !inner.queue.is_empty() || inner.closed {
                    return;
                }
            }
            notified.await;
        }
    }

    fn locked(&self) -> MutexGuard<'_, BacklogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
