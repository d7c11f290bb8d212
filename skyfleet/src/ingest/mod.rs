//! Request ingestion.
//!
//! One [`RequestFeed`] runs per airport: it opens a [`RequestSource`]
//! stream bound to that airport, turns each produced destination into a
//! [`FlightRequest`], and forwards it to the fleet coordinator through a
//! small bounded forwarding pool, so a slow assignment never stalls the
//! feed.
//!
//! A feed whose stream ends or fails stays parked, holding no external
//! resources, until a restart command arrives through its [`FeedHandle`];
//! a restart tears down the current stream (killing any external process)
//! and opens a fresh one, optionally against a different airport. Only the
//! affected airport's feed is ever disturbed.

mod source;

pub use source::{
    CommandRequestSource, RandomRequestSource, RequestSource, RequestStream, SourceError,
    DEFAULT_RANDOM_INTERVAL, DEFAULT_REQUEST_BATCH, DEFAULT_REQUEST_COMMAND,
};

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::airport::AirportId;
use crate::fleet::FleetCoordinator;
use crate::request::FlightRequest;

/// Default size of the per-feed forwarding pool.
pub const DEFAULT_FORWARD_WORKERS: usize = 10;

/// Settings for request ingestion.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Concurrent forwards allowed per feed.
    pub forward_workers: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            forward_workers: DEFAULT_FORWARD_WORKERS,
        }
    }
}

/// Control handle for one running feed.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    restart_tx: mpsc::UnboundedSender<AirportId>,
}

impl FeedHandle {
    /// Re-binds the feed: the current stream is closed and a new one is
    /// opened against `origin`. Ignored once the feed has stopped.
    pub fn restart(&self, origin: AirportId) {
        let _ = self.restart_tx.send(origin);
    }
}

enum FeedEvent {
    Shutdown,
    Restart(AirportId),
    Item(Result<Option<AirportId>, SourceError>),
}

/// Long-running producer of flight requests for one airport.
pub struct RequestFeed {
    origin: AirportId,
    source: Arc<dyn RequestSource>,
    fleet: Arc<FleetCoordinator>,
    forwarders: Arc<Semaphore>,
    restart_rx: mpsc::UnboundedReceiver<AirportId>,
}

impl RequestFeed {
    pub fn new(
        origin: AirportId,
        source: Arc<dyn RequestSource>,
        fleet: Arc<FleetCoordinator>,
        config: &FeedConfig,
    ) -> (Self, FeedHandle) {
        let (restart_tx, restart_rx) = mpsc::unbounded_channel();
        (
            Self {
                origin,
                source,
                fleet,
                forwarders: Arc::new(Semaphore::new(config.forward_workers)),
                restart_rx,
            },
            FeedHandle { restart_tx },
        )
    }

    /// Runs the feed until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(airport = self.origin, "Request feed starting");
        let mut stream = self.open_stream().await;

        loop {
            let event = match stream.as_mut() {
                Some(active) => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => FeedEvent::Shutdown,
                        Some(origin) = self.restart_rx.recv() => FeedEvent::Restart(origin),
                        item = active.next() => FeedEvent::Item(item),
                    }
                }
                None => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => FeedEvent::Shutdown,
                        Some(origin) = self.restart_rx.recv() => FeedEvent::Restart(origin),
                    }
                }
            };

            match event {
                FeedEvent::Shutdown => break,
                FeedEvent::Restart(origin) => {
                    debug!(
                        airport = self.origin,
                        new_airport = origin,
                        "Restarting request feed"
                    );
                    // Dropping the old stream releases its external process.
                    drop(stream.take());
                    self.origin = origin;
                    stream = self.open_stream().await;
                }
                FeedEvent::Item(Ok(Some(destination))) => self.forward(destination).await,
                FeedEvent::Item(Ok(None)) => {
                    info!(airport = self.origin, "Request source drained; feed parked");
                    stream = None;
                }
                FeedEvent::Item(Err(err)) => {
                    error!(airport = self.origin, error = %err, "Request feed failed");
                    stream = None;
                }
            }
        }
        debug!(airport = self.origin, "Request feed stopped");
    }

    async fn open_stream(&self) -> Option<Box<dyn RequestStream>> {
        match self.source.open(self.origin).await {
            Ok(stream) => Some(stream),
            Err(err) => {
                error!(airport = self.origin, error = %err, "Could not open request source");
                None
            }
        }
    }

    /// Hands the request to the coordinator on a pooled forwarding task.
    async fn forward(&self, destination: AirportId) {
        let request = FlightRequest::new(self.origin, destination);
        let permit = match Arc::clone(&self.forwarders).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let fleet = Arc::clone(&self.fleet);
        tokio::spawn(async move {
            let _permit = permit;
            fleet.assign(request);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::aircraft::AircraftState;
    use crate::airport::AirportIndex;
    use crate::fleet::FleetConfig;
    use crate::servicing::ServiceBacklog;

    /// Source that replays one scripted batch per `open` call.
    struct ScriptedSource {
        batches: Mutex<VecDeque<Vec<AirportId>>>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Vec<AirportId>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches.into()),
            })
        }
    }

    impl RequestSource for ScriptedSource {
        fn open<'a>(
            &'a self,
            _origin: AirportId,
        ) -> Pin<
            Box<dyn Future<Output = Result<Box<dyn RequestStream>, SourceError>> + Send + 'a>,
        > {
            Box::pin(async move {
                let batch = self.batches.lock().unwrap().pop_front().unwrap_or_default();
                Ok(Box::new(ScriptedStream {
                    items: batch.into(),
                }) as Box<dyn RequestStream>)
            })
        }
    }

    struct ScriptedStream {
        items: VecDeque<AirportId>,
    }

    impl RequestStream for ScriptedStream {
        fn next<'a>(
            &'a mut self,
        ) -> Pin<Box<dyn Future<Output = Result<Option<AirportId>, SourceError>> + Send + 'a>>
        {
            Box::pin(async move { Ok(self.items.pop_front()) })
        }
    }

    fn test_fleet() -> Arc<FleetCoordinator> {
        let airports = Arc::new(AirportIndex::from_positions(&[(0.0, 0.0), (4.0, 0.0)]));
        let backlog = Arc::new(ServiceBacklog::new());
        let roster = FleetCoordinator::distribute(&airports, 1, &backlog);
        Arc::new(FleetCoordinator::new(
            airports,
            roster,
            FleetConfig::default(),
        ))
    }

    async fn wait_for(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let end = tokio::time::Instant::now() + deadline;
        while tokio::time::Instant::now() < end {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    #[tokio::test]
    async fn feed_forwards_requests_to_the_coordinator() {
        let fleet = test_fleet();
        let source = ScriptedSource::new(vec![vec![1]]);
        let (feed, _handle) = RequestFeed::new(0, source, Arc::clone(&fleet), &FeedConfig::default());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(feed.run(shutdown.clone()));

        let dispatched = wait_for(Duration::from_secs(2), || {
            fleet.snapshots()[0].state == AircraftState::InFlight
        })
        .await;
        assert!(dispatched, "scripted request should dispatch the aircraft");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("feed should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn parked_feed_revives_on_restart() {
        let fleet = test_fleet();
        // First batch empty: the stream drains immediately and parks.
        let source = ScriptedSource::new(vec![vec![], vec![1]]);
        let (feed, handle) = RequestFeed::new(0, source, Arc::clone(&fleet), &FeedConfig::default());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(feed.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fleet.snapshots()[0].state, AircraftState::Idle);

        handle.restart(0);
        let dispatched = wait_for(Duration::from_secs(2), || {
            fleet.snapshots()[0].state == AircraftState::InFlight
        })
        .await;
        assert!(dispatched, "restart should re-open the source");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("feed should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn restart_after_stop_is_ignored() {
        let fleet = test_fleet();
        let source = ScriptedSource::new(vec![vec![]]);
        let (feed, handle) = RequestFeed::new(0, source, fleet, &FeedConfig::default());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(feed.run(shutdown.clone()));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("feed should stop")
            .unwrap();

        // The feed is gone; this must not panic or block.
        handle.restart(1);
    }
}
