//! Stowage CLI - Warehouse hierarchy inspection, allocation plans and the
//! marketplace order relay.
//!
//! # Usage
//!
//! ```bash
//! # Show the racks and rows of a cell export
//! stowage racks cells.json
//! stowage racks cells.json --rack 3
//!
//! # Replay an allocation plan against a document's lines
//! stowage plan lines.json allocations.json --policy reject
//!
//! # Run the marketplace relay (one pass, or until Ctrl+C)
//! stowage relay --once
//! stowage relay
//! ```
//!
//! # Commands
//!
//! - `racks` - Group a warehouse's cells into racks and rows
//! - `plan` - Check an allocation plan and print the commit payload
//! - `relay` - Import marketplace orders into the backend

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use stowage_core::{OverAllocationPolicy, RackId};

mod commands;
mod logging;

use logging::LogFormat;

#[derive(Parser)]
#[command(name = "stowage")]
#[command(author, version, about = "Stowage warehouse tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the rack → row → cell hierarchy of a cell list
    Racks {
        /// JSON file with the warehouse's cells
        cells: PathBuf,

        /// Only list the rows of this rack
        #[arg(long)]
        rack: Option<RackId>,
    },
    /// Replay allocations into a fresh ledger and report completion
    Plan {
        /// JSON file with the document lines
        lines: PathBuf,

        /// JSON file with the allocations to apply, in order
        allocations: PathBuf,

        /// What to do when an allocation exceeds a product's remaining count
        #[arg(long, default_value = "clamp")]
        policy: OverAllocationPolicy,
    },
    /// Relay marketplace orders into the warehouse backend
    Relay {
        /// Run a single pass instead of polling until interrupted
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_format);

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Racks { cells, rack } => commands::racks::show(&cells, rack)?,
        Commands::Plan {
            lines,
            allocations,
            policy,
        } => commands::plan::replay(&lines, &allocations, policy)?,
        Commands::Relay { once } => {
            if once {
                commands::relay::once().await?;
            } else {
                commands::relay::scheduled().await?;
            }
        }
    }
    Ok(())
}
