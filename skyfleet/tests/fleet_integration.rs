//! Integration tests for fleet coordination.
//!
//! These tests verify the assignment path under contention:
//! - Concurrent requests for one idle aircraft dispatch exactly once
//! - Overflow requests wait in their origin's queue and drain in order
//! - Requests naming unknown airports are dropped
//!
//! Run with: `cargo test --test fleet_integration`

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use skyfleet::aircraft::{Aircraft, AircraftState};
use skyfleet::airport::AirportIndex;
use skyfleet::fleet::{Assignment, FleetConfig, FleetCoordinator};
use skyfleet::request::FlightRequest;
use skyfleet::servicing::ServiceBacklog;

// =============================================================================
// Test Helpers
// =============================================================================

struct Setup {
    coordinator: Arc<FleetCoordinator>,
    roster: Vec<Arc<Aircraft>>,
}

fn build_fleet(positions: &[(f64, f64)], fleet_size: u32, config: FleetConfig) -> Setup {
    let airports = Arc::new(AirportIndex::from_positions(positions));
    let backlog = Arc::new(ServiceBacklog::new());
    let roster = FleetCoordinator::distribute(&airports, fleet_size, &backlog);
    let coordinator = Arc::new(FleetCoordinator::new(airports, roster.clone(), config));
    Setup { coordinator, roster }
}

/// Polls `cond` until it holds or the deadline passes.
async fn wait_for(what: &str, deadline: Duration, cond: impl Fn() -> bool) {
    let start = Instant::now();
    while !cond() {
        if start.elapsed() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_dispatch_exactly_once() {
    let setup = build_fleet(&[(0.0, 0.0), (3.0, 4.0)], 1, FleetConfig::default());
    let coordinator = setup.coordinator;

    let mut handles = Vec::new();
    for _ in 0..32 {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            coordinator.assign(FlightRequest::new(0, 1))
        }));
    }

    let mut dispatched = 0;
    let mut queued = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Assignment::Dispatched(id) => {
                assert_eq!(id, 0);
                dispatched += 1;
            }
            Assignment::Queued => queued += 1,
            Assignment::UnknownAirport => panic!("request named known airports"),
        }
    }

    assert_eq!(dispatched, 1, "one aircraft takes exactly one flight");
    assert_eq!(queued, 31);
    assert_eq!(coordinator.queue_len(0), 31);
    assert_eq!(setup.roster[0].state(), AircraftState::InFlight);
}

#[tokio::test]
async fn test_queued_requests_drain_head_first() {
    let config = FleetConfig {
        tick_interval: Duration::from_millis(10),
        step: 20.0,
        ..Default::default()
    };
    let setup = build_fleet(&[(0.0, 0.0), (3.0, 4.0), (0.0, 5.0)], 1, config);
    let coordinator = setup.coordinator;
    let aircraft = Arc::clone(&setup.roster[0]);

    // The single aircraft takes the first request; two more arrive for the
    // airport it is flying to.
    assert!(matches!(
        coordinator.assign(FlightRequest::new(0, 1)),
        Assignment::Dispatched(0)
    ));
    assert!(matches!(
        coordinator.assign(FlightRequest::new(1, 2)),
        Assignment::Queued
    ));
    assert!(matches!(
        coordinator.assign(FlightRequest::new(1, 0)),
        Assignment::Queued
    ));
    assert_eq!(coordinator.queue_len(1), 2);

    let shutdown = CancellationToken::new();
    let mut tick_tasks = coordinator.spawn_ticks(shutdown.clone());

    wait_for("first landing", Duration::from_secs(5), || {
        aircraft.state() == AircraftState::AwaitingService
    })
    .await;
    assert_eq!(aircraft.home(), 1);

    // Turn the aircraft around by hand; the next tick should pull the
    // oldest queued request, which flies it on to airport 2.
    assert!(aircraft.begin_servicing());
    assert!(aircraft.complete_servicing(1));

    wait_for("second landing", Duration::from_secs(5), || {
        aircraft.snapshot().trips == 2
    })
    .await;
    assert_eq!(aircraft.home(), 2, "head of the queue was taken first");
    assert_eq!(coordinator.queue_len(1), 1);

    // The remaining request waits at airport 1; the aircraft is now at
    // airport 2 and never returns for it.
    assert!(aircraft.begin_servicing());
    assert!(aircraft.complete_servicing(2));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.queue_len(1), 1);
    assert_eq!(aircraft.state(), AircraftState::Idle);

    shutdown.cancel();
    while tick_tasks.join_next().await.is_some() {}
}

#[tokio::test]
async fn test_unknown_airports_are_dropped() {
    let setup = build_fleet(&[(0.0, 0.0), (3.0, 4.0)], 1, FleetConfig::default());
    let coordinator = setup.coordinator;

    assert!(matches!(
        coordinator.assign(FlightRequest::new(0, 9)),
        Assignment::UnknownAirport
    ));
    assert!(matches!(
        coordinator.assign(FlightRequest::new(7, 1)),
        Assignment::UnknownAirport
    ));

    // Nothing was queued and nothing took off.
    assert_eq!(coordinator.queue_len(0), 0);
    assert_eq!(coordinator.queue_len(1), 0);
    assert_eq!(setup.roster[0].state(), AircraftState::Idle);
}
