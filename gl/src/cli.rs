//! Command-line interface definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::patterns::Pattern;

#[derive(Parser, Debug)]
#[command(name = "gl", about = "Distributed generation-synchronous Game of Life engine")]
pub struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation to its generation limit
    Run {
        /// Side length of the square grid
        #[arg(long)]
        grid_size: Option<usize>,

        /// Number of partition workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Number of generations to run
        #[arg(short, long)]
        generations: Option<u64>,

        /// Initial grid pattern
        #[arg(short, long)]
        pattern: Option<Pattern>,

        /// Live-cell probability for the random pattern
        #[arg(long)]
        density: Option<f64>,

        /// Fixed RNG seed for reproducible random grids
        #[arg(long)]
        seed: Option<u64>,

        /// Final grid output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show how grid rows would be assigned to workers
    Plan {
        /// Side length of the square grid
        #[arg(long)]
        grid_size: Option<usize>,

        /// Number of partition workers
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
