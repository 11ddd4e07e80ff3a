use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::config::OutputFormat;
use crate::core::Engine;

#[derive(Parser)]
#[command(name = "callmap")]
#[command(about = "Per-file call graphs of JavaScript and TypeScript sources, as Mermaid flowcharts")]
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
    /// Write a default callmap.toml
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Build diagrams for every source file under a directory
    Scan {
        /// Source directory to analyze
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Output directory for diagrams (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// ECMAScript version hint passed to the parser
        #[arg(long)]
        ecma_version: Option<String>,
    },

    /// Print the diagram of a single file
    File {
        /// Source file to analyze
        path: PathBuf,
    },
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path } => {
                engine.init(path).await
            }
            Commands::Scan { source, output, format, ecma_version } => {
                engine.scan(source, output, format, ecma_version).await
            }
            Commands::File { path } => {
                engine.file(path).await
            }
        }
    }
}
