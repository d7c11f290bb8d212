//! Request sources.
//!
//! A source is bound to an origin airport and yields destination airport
//! ids one at a time. Sources are lazy and unbounded unless the underlying
//! feed ends; a feed restart closes the current stream and opens a fresh
//! one through the same source.
//!
//! Both traits use boxed future return types to allow trait objects,
//! enabling runtime selection between the external command source and the
//! in-process random source.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::warn;

use crate::airport::AirportId;

/// Default executable spawned per airport to generate requests.
pub const DEFAULT_REQUEST_COMMAND: &str = "fleet_flight_requests";
/// Default batch size passed to the external request command.
pub const DEFAULT_REQUEST_BATCH: u32 = 10;
/// Default pause between destinations from [`RandomRequestSource`].
pub const DEFAULT_RANDOM_INTERVAL: Duration = Duration::from_secs(3);

/// Error returned when a request stream cannot be opened or read.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The external command could not be launched at all.
    #[error("failed to launch request command '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the feed failed mid-stream.
    #[error("error reading request feed: {0}")]
    Io(#[from] std::io::Error),
}

/// Factory for request streams, one open stream per feed binding.
pub trait RequestSource: Send + Sync + 'static {
    /// Opens a stream of destinations for flights departing `origin`.
    fn open<'a>(
        &'a self,
        origin: AirportId,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn RequestStream>, SourceError>> + Send + 'a>>;
}

/// One open stream of destination ids for a single origin airport.
pub trait RequestStream: Send {
    /// Next destination, `None` when the feed ends.
    fn next<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<AirportId>, SourceError>> + Send + 'a>>;
}

/// Spawns the external request command and parses its stdout.
///
/// The command is invoked as `<command> <batch> <origin_id>`; each stdout
/// line holding an integer becomes one destination id, blank and malformed
/// lines are skipped. The child is killed when the stream is dropped.
#[derive(Debug, Clone)]
pub struct CommandRequestSource {
    command: String,
    batch: u32,
}

impl CommandRequestSource {
    pub fn new(command: impl Into<String>, batch: u32) -> Self {
        let mut command = command.into();
        if cfg!(windows) && !command.ends_with(".bat") {
            command.push_str(".bat");
        }
        Self { command, batch }
    }
}

impl Default for CommandRequestSource {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_COMMAND, DEFAULT_REQUEST_BATCH)
    }
}

impl RequestSource for CommandRequestSource {
    fn open<'a>(
        &'a self,
        origin: AirportId,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn RequestStream>, SourceError>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut child = Command::new(&self.command)
                .arg(self.batch.to_string())
                .arg(origin.to_string())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| SourceError::Launch {
                    command: self.command.clone(),
                    source,
                })?;

            let stdout = match child.stdout.take() {
                Some(stdout) => stdout,
                None => {
                    return Err(SourceError::Io(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "request command stdout was not captured",
                    )))
                }
            };

            Ok(Box::new(CommandRequestStream {
                _child: child,
                lines: BufReader::new(stdout).lines(),
                origin,
            }) as Box<dyn RequestStream>)
        })
    }
}

struct CommandRequestStream {
    // Held so the child is killed when the stream is dropped.
    _child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    origin: AirportId,
}

impl RequestStream for CommandRequestStream {
    fn next<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<AirportId>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            loop {
                match self.lines.next_line().await? {
                    Some(line) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match trimmed.parse::<AirportId>() {
                            Ok(destination) => return Ok(Some(destination)),
                            Err(_) => {
                                warn!(
                                    origin = self.origin,
                                    line = trimmed,
                                    "Skipping malformed request line"
                                );
                            }
                        }
                    }
                    None => return Ok(None),
                }
            }
        })
    }
}

/// In-process source: emits uniformly random destinations other than the
/// origin, at a fixed rate. Used by demos and tests.
#[derive(Debug, Clone)]
pub struct RandomRequestSource {
    airports: u32,
    interval: Duration,
    seed: Option<u64>,
}

impl RandomRequestSource {
    pub fn new(airports: u32, interval: Duration) -> Self {
        Self {
            airports,
            interval,
            seed: None,
        }
    }

    /// Makes the stream deterministic; each origin derives its own rng.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl RequestSource for RandomRequestSource {
    fn open<'a>(
        &'a self,
        origin: AirportId,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn RequestStream>, SourceError>> + Send + 'a>>
    {
        Box::pin(async move {
            let rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed ^ u64::from(origin)),
                None => StdRng::from_entropy(),
            };
            Ok(Box::new(RandomRequestStream {
                rng,
                airports: self.airports,
                origin,
                interval: self.interval,
            }) as Box<dyn RequestStream>)
        })
    }
}

struct RandomRequestStream {
    rng: StdRng,
    airports: u32,
    origin: AirportId,
    interval: Duration,
}

impl RequestStream for RandomRequestStream {
    fn next<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<AirportId>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            // With a single airport there is nowhere to fly to.
            if self.airports < 2 {
                return Ok(None);
            }
            tokio::time::sleep(self.interval).await;
            loop {
                let destination = self.rng.gen_range(0..self.airports);
                if destination != self.origin {
                    return Ok(Some(destination));
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn random_source_never_yields_the_origin() {
        let source = RandomRequestSource::new(4, Duration::from_millis(1)).with_seed(11);
        let mut stream = source.open(2).await.unwrap();
        for _ in 0..32 {
            let destination = stream.next().await.unwrap().unwrap();
            assert_ne!(destination, 2);
            assert!(destination < 4);
        }
    }

    #[tokio::test]
    async fn seeded_random_source_is_reproducible() {
        let source = RandomRequestSource::new(6, Duration::from_millis(1)).with_seed(5);
        let mut first = source.open(0).await.unwrap();
        let mut second = source.open(0).await.unwrap();
        for _ in 0..8 {
            assert_eq!(
                first.next().await.unwrap(),
                second.next().await.unwrap()
            );
        }
    }

    #[tokio::test]
    async fn random_source_with_one_airport_ends_immediately() {
        let source = RandomRequestSource::new(1, Duration::from_millis(1));
        let mut stream = source.open(0).await.unwrap();
        assert_eq!(stream.next().await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_source_parses_integer_lines() {
        // `seq 5 8` prints 5..=8, one integer per line.
        let source = CommandRequestSource::new("seq", 5);
        let mut stream = source.open(8).await.unwrap();
        for expected in 5..=8 {
            assert_eq!(stream.next().await.unwrap(), Some(expected));
        }
        assert_eq!(stream.next().await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_source_skips_malformed_lines() {
        // `echo 3 7` prints "3 7", which is not a bare integer.
        let source = CommandRequestSource::new("echo", 3);
        let mut stream = source.open(7).await.unwrap();
        assert_eq!(stream.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_command_reports_launch_error() {
        let source = CommandRequestSource::new("skyfleet-no-such-command", 10);
        let result = source.open(0).await;
        assert!(matches!(result, Err(SourceError::Launch { .. })));
    }
}
