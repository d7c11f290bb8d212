//! Turnaround execution.
//!
//! The actual turnaround work happens outside the simulator. The
//! [`TurnaroundRunner`] trait is the seam: the servicing daemon hands an
//! implementation an airport/aircraft pair plus a cancellation token and
//! awaits a completion report.
//!
//! The trait uses a boxed future return type to allow trait objects,
//! enabling runtime selection between the external command runner and the
//! in-process simulated runner.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::aircraft::AircraftId;
use crate::airport::AirportId;

/// Default executable invoked for each turnaround.
pub const DEFAULT_SERVICE_COMMAND: &str = "fleet_plane_service";
/// Default duration of a simulated turnaround.
pub const DEFAULT_SIMULATED_TURNAROUND: Duration = Duration::from_secs(2);

/// Report produced by a successful turnaround.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnaroundReport {
    /// Opaque token emitted by the collaborator (its last output line).
    pub completion_token: String,
}

/// Error returned by a turnaround attempt.
#[derive(Debug, thiserror::Error)]
pub enum TurnaroundError {
    /// The external command could not be launched at all.
    #[error("failed to launch turnaround command '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the collaborator's output failed mid-turnaround.
    #[error("error reading turnaround output: {0}")]
    Io(#[from] std::io::Error),

    /// The collaborator finished but reported failure.
    #[error("turnaround command exited with {status}")]
    Failed { status: std::process::ExitStatus },

    /// The collaborator exited cleanly without a completion token.
    #[error("turnaround command produced no completion token")]
    NoToken,

    /// Shutdown cancelled the turnaround before it finished.
    #[error("turnaround cancelled during shutdown")]
    Cancelled,
}

/// Strategy for performing one aircraft turnaround.
pub trait TurnaroundRunner: Send + Sync + 'static {
    /// Performs the turnaround for `aircraft` at `airport`.
    ///
    /// Implementations must honor `cancel` promptly and release any
    /// external resources they hold when cancelled.
    fn run<'a>(
        &'a self,
        airport: AirportId,
        aircraft: AircraftId,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<TurnaroundReport, TurnaroundError>> + Send + 'a>>;
}

/// Runs the external turnaround command, one process per turnaround.
///
/// The command is invoked as `<command> <airport_id> <aircraft_id>`. The
/// last non-blank line it writes to stdout becomes the completion token; a
/// non-zero exit status or an empty output fails the turnaround. The child
/// is killed if the turnaround is cancelled or dropped mid-flight.
#[derive(Debug, Clone)]
pub struct CommandTurnaround {
    command: String,
}

impl CommandTurnaround {
    pub fn new(command: impl Into<String>) -> Self {
        let mut command = command.into();
        if cfg!(windows) && !command.ends_with(".bat") {
            command.push_str(".bat");
        }
        Self { command }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Default for CommandTurnaround {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_COMMAND)
    }
}

impl TurnaroundRunner for CommandTurnaround {
    fn run<'a>(
        &'a self,
        airport: AirportId,
        aircraft: AircraftId,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<TurnaroundReport, TurnaroundError>> + Send + 'a>> {
        Box::pin(async move {
            let mut child = Command::new(&self.command)
                .arg(airport.to_string())
                .arg(aircraft.to_string())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| TurnaroundError::Launch {
                    command: self.command.clone(),
                    source,
                })?;

            let stdout = match child.stdout.take() {
                Some(stdout) => stdout,
                None => return Err(TurnaroundError::NoToken),
            };
            let mut lines = BufReader::new(stdout).lines();
            let mut token: Option<String> = None;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        return Err(TurnaroundError::Cancelled);
                    }
                    line = lines.next_line() => match line? {
                        Some(line) => {
                            let trimmed = line.trim();
                            if !trimmed.is_empty() {
                                token = Some(trimmed.to_string());
                            }
                        }
                        None => break,
                    },
                }
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Err(TurnaroundError::Cancelled);
                }
                status = child.wait() => status?,
            };

            if !status.success() {
                return Err(TurnaroundError::Failed { status });
            }
            match token {
                Some(completion_token) => Ok(TurnaroundReport { completion_token }),
                None => Err(TurnaroundError::NoToken),
            }
        })
    }
}

/// In-process turnaround used by demos and tests.
///
/// Sleeps for a fixed duration, honoring cancellation.
#[derive(Debug, Clone)]
pub struct SimulatedTurnaround {
    duration: Duration,
}

impl SimulatedTurnaround {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Default for SimulatedTurnaround {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_TURNAROUND)
    }
}

impl TurnaroundRunner for SimulatedTurnaround {
    fn run<'a>(
        &'a self,
        airport: AirportId,
        aircraft: AircraftId,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<TurnaroundReport, TurnaroundError>> + Send + 'a>> {
        let duration = self.duration;
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TurnaroundError::Cancelled),
                _ = tokio::time::sleep(duration) => Ok(TurnaroundReport {
                    completion_token: format!("turnaround-{airport}-{aircraft}"),
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_turnaround_completes() {
        let runner = SimulatedTurnaround::new(Duration::from_millis(5));
        let report = runner
            .run(2, 7, CancellationToken::new())
            .await
            .expect("simulated turnaround should succeed");
        assert_eq!(report.completion_token, "turnaround-2-7");
    }

    #[tokio::test]
    async fn simulated_turnaround_honors_cancellation() {
        let runner = SimulatedTurnaround::new(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = runner.run(0, 0, cancel).await;
        assert!(matches!(result, Err(TurnaroundError::Cancelled)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_turnaround_reads_last_line_as_token() {
        // `echo 4 9` prints the two ids back; that line is the token.
        let runner = CommandTurnaround::new("echo");
        let report = runner
            .run(4, 9, CancellationToken::new())
            .await
            .expect("echo should succeed");
        assert_eq!(report.completion_token, "4 9");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_turnaround_fails_on_nonzero_exit() {
        let runner = CommandTurnaround::new("false");
        let result = runner.run(0, 1, CancellationToken::new()).await;
        assert!(matches!(result, Err(TurnaroundError::Failed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_turnaround_requires_output() {
        // `true` exits 0 without printing anything.
        let runner = CommandTurnaround::new("true");
        let result = runner.run(0, 1, CancellationToken::new()).await;
        assert!(matches!(result, Err(TurnaroundError::NoToken)));
    }

    #[tokio::test]
    async fn missing_command_reports_launch_error() {
        let runner = CommandTurnaround::new("skyfleet-no-such-command");
        let result = runner.run(0, 1, CancellationToken::new()).await;
        assert!(matches!(result, Err(TurnaroundError::Launch { .. })));
    }
}
