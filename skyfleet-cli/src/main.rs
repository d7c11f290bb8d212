//! Skyfleet CLI - Command-line interface
//!
//! This binary runs the fleet simulation from the command line: it places
//! the airports, starts the background subsystems, prints periodic status
//! lines, and shuts everything down on Ctrl-C or when the run duration
//! elapses.

mod error;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use skyfleet::ingest::{CommandRequestSource, RandomRequestSource, RequestSource};
use skyfleet::logging::{init_logging, DEFAULT_LOG_FILE};
use skyfleet::servicing::{CommandTurnaround, SimulatedTurnaround, TurnaroundRunner};
use skyfleet::sim::{Simulation, SimulationConfig};
use skyfleet::stats;

use error::CliError;

#[derive(Parser)]
#[command(name = "skyfleet")]
#[command(about = "Simulate a passenger fleet flying between airports", long_about = None)]
struct Args {
    /// Number of airports to place
    #[arg(long, default_value = "10")]
    airports: u32,

    /// Number of aircraft in the fleet
    #[arg(long, default_value = "10")]
    fleet: u32,

    /// Seed for reproducible airport layouts and request streams
    #[arg(long)]
    seed: Option<u64>,

    /// World edge length in grid units
    #[arg(long, default_value = "10.0")]
    world: f64,

    /// Milliseconds between aircraft movement ticks
    #[arg(long, default_value = "100")]
    tick_ms: u64,

    /// Distance an aircraft covers per tick
    #[arg(long, default_value = "1.0")]
    step: f64,

    /// Stop after this many seconds (runs until Ctrl-C if not set)
    #[arg(long)]
    duration: Option<u64>,

    /// Maximum concurrent turnarounds
    #[arg(long, default_value = "8")]
    service_workers: usize,

    /// External turnaround command (simulated turnarounds if not set)
    #[arg(long)]
    service_command: Option<String>,

    /// Simulated turnaround duration in seconds
    #[arg(long, default_value = "2")]
    service_secs: u64,

    /// Seconds shutdown waits for running turnarounds before cancelling
    #[arg(long, default_value = "60")]
    shutdown_secs: u64,

    /// External request command (random requests if not set)
    #[arg(long)]
    request_command: Option<String>,

    /// Destinations requested per command invocation
    #[arg(long, default_value = "10")]
    request_batch: u32,

    /// Seconds between random requests at each airport
    #[arg(long, default_value = "3")]
    request_secs: u64,

    /// Seconds between status lines
    #[arg(long, default_value = "1")]
    stats_secs: u64,

    /// Directory for the log file
    #[arg(long, default_value = "logs")]
    log_dir: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        e.exit()
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    if args.stats_secs == 0 {
        return Err(CliError::Config(
            "--stats-secs must be at least 1".to_string(),
        ));
    }

    let _logging_guard =
        init_logging(&args.log_dir, DEFAULT_LOG_FILE).map_err(CliError::LoggingInit)?;

    info!("Skyfleet v{}", skyfleet::VERSION);

    println!("Skyfleet v{}", skyfleet::VERSION);
    println!(
        "  Airports: {} on a {:.0}x{:.0} grid",
        args.airports, args.world, args.world
    );
    println!("  Fleet: {} aircraft", args.fleet);
    match &args.request_command {
        Some(cmd) => println!("  Requests: external command '{}'", cmd),
        None => println!(
            "  Requests: random, one per airport every {}s",
            args.request_secs
        ),
    }
    match &args.service_command {
        Some(cmd) => println!("  Turnarounds: external command '{}'", cmd),
        None => println!("  Turnarounds: simulated, {}s each", args.service_secs),
    }
    println!();

    let mut config = SimulationConfig::new()
        .with_airports(args.airports)
        .with_fleet_size(args.fleet)
        .with_world_size(args.world, args.world)
        .with_tick_interval(Duration::from_millis(args.tick_ms))
        .with_step(args.step)
        .with_service_workers(args.service_workers)
        .with_shutdown_timeout(Duration::from_secs(args.shutdown_secs))
        .with_sample_interval(Duration::from_secs(args.stats_secs));
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let source: Arc<dyn RequestSource> = match args.request_command.as_deref() {
        Some(cmd) => Arc::new(CommandRequestSource::new(cmd, args.request_batch)),
        None => {
            let mut random =
                RandomRequestSource::new(args.airports, Duration::from_secs(args.request_secs));
            if let Some(seed) = args.seed {
                random = random.with_seed(seed);
            }
            Arc::new(random)
        }
    };

    let runner: Arc<dyn TurnaroundRunner> = match args.service_command.as_deref() {
        Some(cmd) => Arc::new(CommandTurnaround::new(cmd)),
        None => Arc::new(SimulatedTurnaround::new(Duration::from_secs(
            args.service_secs,
        ))),
    };

    let sim = Simulation::start(config, source, runner)?;

    for airport in sim.airports().iter() {
        info!(
            airport = airport.id(),
            x = airport.x(),
            y = airport.y(),
            "Airport placed"
        );
    }

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut status = tokio::time::interval(Duration::from_secs(args.stats_secs));
    status.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; swallow it so the first
    // status line carries real activity.
    status.tick().await;

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                println!();
                info!("Interrupt received, shutting down");
                break;
            }
            _ = &mut deadline => {
                info!(seconds = args.duration, "Run duration reached, shutting down");
                break;
            }
            _ = status.tick() => {
                let current = sim.stats();
                info!(
                    in_flight = current.in_flight,
                    servicing = current.servicing,
                    completed_trips = current.completed_trips,
                    "Fleet status"
                );
            }
        }
    }

    let shared = sim.shared_stats();
    sim.shutdown().await;

    let summary = stats::read(&shared);
    println!();
    println!("Simulation complete:");
    println!("  Completed trips: {}", summary.completed_trips);
    println!("  In flight at shutdown: {}", summary.in_flight);
    println!("  Awaiting turnaround at shutdown: {}", summary.servicing);

    Ok(())
}
