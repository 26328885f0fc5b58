//! EMANE emulation lab driver
//!
//! Builds the topology graph, renders the initial pathloss scenario, writes
//! per-node traffic schedules and replays link update epochs against the
//! emulator's event service.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cmd_events, cmd_run, cmd_scenario, cmd_topology, cmd_traffic};
use config::{LabConfig, Overrides, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Experiment configuration file (YAML or JSON)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Topology description, overrides the config file
    #[arg(short, long, global = true)]
    topology_file: Option<PathBuf>,

    /// Seed for every random source
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Directory for generated schedule files
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Epoch duration in seconds
    #[arg(long, global = true)]
    duration: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the topology and print its nodes and links
    Topology {
        /// Print the graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the initial pathloss scenario
    Scenario,

    /// Generate per-node traffic schedules
    Traffic,

    /// Replay link update epochs against the event service
    Events {
        /// Log events without pacing or publishing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the whole experiment: traffic schedules, then link events
    Run {
        /// Log events without pacing or publishing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = LabConfig::load(&cli.config)?;
    config.apply(Overrides {
        topology_file: cli.topology_file,
        output_dir: cli.output_dir,
        seed: cli.seed,
        duration: cli.duration,
    });

    match cli.command {
        Commands::Topology { json } => cmd_topology(&config, json).await?,
        Commands::Scenario => cmd_scenario(&config).await?,
        Commands::Traffic => cmd_traffic(&config).await?,
        Commands::Events { dry_run } => cmd_events(&config, dry_run).await?,
        Commands::Run { dry_run } => cmd_run(&config, dry_run).await?,
    }

    Ok(())
}
