use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::core::Engine;

#[derive(Parser)]
#[command(name = "bracecov")]
#[command(about = "Heuristic coverage instrumentation for C-family source trees")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default Bracecov.toml
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Copy a source tree, inserting execution probes into matching files
    Instrument {
        /// Source tree to instrument
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Output directory for the instrumented tree
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for the generated coverage support files
        #[arg(long)]
        support: Option<PathBuf>,
    },

    /// Correlate a counter dump back onto the instrumented sources
    Correlate {
        /// Source tree that was instrumented
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Directory holding the instrumented tree
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Counter dump written by the instrumented program
        #[arg(short, long)]
        dump: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path } => {
                engine.init(path).await
            }
            Commands::Instrument { source, output, support } => {
                engine.instrument(source, output, support).await
            }
            Commands::Correlate { source, output, dump } => {
                engine.correlate(source, output, dump).await
            }
        }
    }
}
