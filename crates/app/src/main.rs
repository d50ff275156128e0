//! PokerRoom - planning poker room synchronization
//!
//! Headless driver for the sync engine: generates room codes and runs
//! simulated tables of clients against an in-memory document store.

mod simulation;

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use pokerroom_core::{RoomCode, SyncConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use simulation::SimulationOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Speed-up applied to the default timings when no config file is given
const DEMO_TIME_SCALE: u64 = 1000;

#[derive(Parser)]
#[command(name = "pokerroom")]
#[command(about = "Planning poker room synchronization")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a fresh room code
    NewCode,
    /// Run several clients through voting rounds in one process
    Simulate(SimulateArgs),
}

#[derive(ClapArgs)]
struct SimulateArgs {
    /// Room code (generated when omitted)
    #[arg(long)]
    room: Option<String>,

    /// Number of simulated clients
    #[arg(short, long, default_value = "4")]
    participants: usize,

    /// Number of vote/reveal/reset rounds
    #[arg(short, long, default_value = "3")]
    rounds: u32,

    /// Sync config TOML (timings and deck)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Abandon the leader afterwards and wait for another client to take over
    #[arg(long)]
    crash_leader: bool,

    /// Seed for the simulated card picks
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine readable
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match args.command {
        Command::NewCode => {
            println!("{}", RoomCode::generate());
            Ok(())
        }
        Command::Simulate(simulate) => run_simulation(simulate),
    }
}

fn run_simulation(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let room = match args.room.as_deref() {
        Some(code) => RoomCode::parse(code)?,
        None => RoomCode::generate(),
    };

    let config = match &args.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default().scaled_down(DEMO_TIME_SCALE),
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    tracing::info!(
        room = %room,
        participants = args.participants,
        rounds = args.rounds,
        heartbeat_ms = config.heartbeat_interval_ms,
        stale_ms = config.stale_threshold_ms,
        "Starting simulation"
    );

    let options = SimulationOptions {
        room,
        participants: args.participants,
        rounds: args.rounds,
        config,
        crash_leader: args.crash_leader,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(simulation::run(options, &mut rng))?;
    tracing::info!(room = %report.room, rounds = report.rounds.len(), "Simulation finished");

    for outcome in &report.rounds {
        println!("{}", serde_json::to_string(outcome)?);
    }
    if let Some(failover) = &report.failover {
        println!("{}", serde_json::to_string(failover)?);
    }
    Ok(())
}
