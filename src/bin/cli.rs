//! ChainSim CLI application

use anyhow::Context;
use chainsim::{PeerDegree, RunLimit, SimulationConfig, Simulator};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "chainsim-cli")]
#[command(about = "Discrete-event simulator for peer-to-peer cryptocurrency networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of nodes
    #[arg(short = 'n', long)]
    nodes: Option<usize>,

    /// Fraction of slow nodes (0-1)
    #[arg(short = 'z', long)]
    slow_fraction: Option<f64>,

    /// Mean transaction interarrival time in seconds
    #[arg(long)]
    txn_interarrival: Option<f64>,

    /// Mean block interarrival time in seconds
    #[arg(long)]
    block_interarrival: Option<f64>,

    /// Minimum peers sampled per node
    #[arg(long, requires = "max_peers")]
    min_peers: Option<usize>,

    /// Maximum peers sampled per node
    #[arg(long, requires = "min_peers")]
    max_peers: Option<usize>,

    /// Forbid blocks without transactions
    #[arg(long)]
    no_empty_blocks: bool,

    /// RNG seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Stop after this many events
    #[arg(short, long, conflicts_with = "until")]
    events: Option<u64>,

    /// Stop at this virtual time (seconds)
    #[arg(short, long, default_value_t = 100.0)]
    until: f64,

    /// Prune every node's tree to its longest chain before reporting
    #[arg(long)]
    prune: bool,

    /// Write each node's block tree as a Graphviz file into this directory
    #[arg(long)]
    dot: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and print a JSON report
    Run,
    /// Print the effective configuration as JSON
    Config,
    /// Show version information
    Version,
}

impl Cli {
    fn simulation_config(&self) -> anyhow::Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SimulationConfig::default(),
        };

        if let Some(nodes) = self.nodes {
            config.node_count = nodes;
        }
        if let Some(z) = self.slow_fraction {
            config.slow_fraction = z;
        }
        if let Some(mean) = self.txn_interarrival {
            config.mean_transaction_interarrival = mean;
        }
        if let Some(mean) = self.block_interarrival {
            config.mean_block_interarrival = mean;
        }
        if let (Some(min), Some(max)) = (self.min_peers, self.max_peers) {
            config.peer_degree = Some(PeerDegree::new(min, max));
        }
        if self.no_empty_blocks {
            config.allow_empty_blocks = false;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }

    fn run_limit(&self) -> RunLimit {
        match self.events {
            Some(events) => RunLimit::Events(events),
            None => RunLimit::Until(self.until),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Run) | None => {
            let config = cli.simulation_config()?;
            let limit = cli.run_limit();
            info!("Starting simulation of {} nodes ({:?})", config.node_count, limit);

            let mut sim = Simulator::new(config)?;
            let counts = sim.run(limit)?;
            info!(
                "Processed {} events, {} blocks mined",
                counts.total(),
                counts.blocks_mined()
            );

            if let Some(dir) = &cli.dot {
                let written = sim.report().write_dot(dir, false)?;
                info!("Wrote {} block trees to {}", written.len(), dir.display());
            }

            if cli.prune {
                sim.prune_chains();
                if let Some(dir) = &cli.dot {
                    sim.report().write_dot(dir, true)?;
                }
            }
            println!("{}", sim.report().to_json()?);
        },
        Some(Commands::Config) => {
            let config = cli.simulation_config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        },
        Some(Commands::Version) => {
            println!("ChainSim v{}", chainsim::VERSION);
        },
    }

    Ok(())
}
