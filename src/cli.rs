use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Nimbus Markov-chain weather forecaster.
#[derive(Parser)]
#[command(
    name = "nimbus",
    version,
    about = "Markov-chain weather forecaster"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Build the transition matrix from a historical weather payload.
    Matrix(MatrixArgs),
    /// Simulate a future weather trajectory.
    Simulate(SimulateArgs),
    /// Report steady state, simulated distribution and streak lengths.
    Stats(StatsArgs),
}

/// Input/output arguments shared by every subcommand.
#[derive(clap::Args)]
pub struct IoArgs {
    /// Path to TOML configuration file (default: ./nimbus.toml if present).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override historical payload JSON path from config.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Override output JSON path from config (stdout if unset).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `matrix` subcommand.
#[derive(clap::Args)]
pub struct MatrixArgs {
    #[command(flatten)]
    pub io: IoArgs,
}

/// Simulation overrides shared by `simulate` and `stats`.
#[derive(clap::Args)]
pub struct ForecastArgs {
    /// Override simulation horizon in days from config.
    #[arg(short, long)]
    pub days: Option<usize>,

    /// Override starting state from config.
    #[arg(long = "initial-state", visible_alias = "from")]
    pub initial_state: Option<String>,

    /// Override RNG seed from config.
    #[arg(short, long)]
    pub seed: Option<u64>,
}

/// Arguments for the `simulate` subcommand.
#[derive(clap::Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub forecast: ForecastArgs,

    /// Number of ensemble members; member k uses seed + k.
    #[arg(short, long, default_value_t = 1)]
    pub members: usize,
}

/// Arguments for the `stats` subcommand.
#[derive(clap::Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub forecast: ForecastArgs,
}
