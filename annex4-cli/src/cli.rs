use crate::commands::*;
use annex4_core::AnnexResult;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "annex4-monitor")]
#[command(about = "Watches EU AI Act sources and keeps the local rule tree in sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a single URL and ingest it directly, bypassing the source monitor.
    UpdateSingle(UpdateSingleCommand),
    /// Run one sweep of every active, due Source from a config file.
    UpdateAll(UpdateAllCommand),
}

impl Cli {
    pub async fn run(self) -> AnnexResult<()> {
        if self.verbose {
            tracing::info!("running in verbose mode");
        }

        match self.command {
            Commands::UpdateSingle(cmd) => cmd.execute().await,
            Commands::UpdateAll(cmd) => cmd.execute().await,
        }
    }
}
