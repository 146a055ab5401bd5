mod cli;
mod cmd;
mod command;
mod config;
mod events;
mod git;
mod logger;
mod polecat;
mod registry;
mod sling;
mod spinner;
mod state;
mod tmux;
mod workflow;

use anyhow::Result;
use tracing::{error, info};

fn main() -> Result<()> {
    logger::init()?;
    info!(args = ?std::env::args().collect::<Vec<_>>(), "polecats start");

    match cli::run() {
        Ok(result) => {
            info!("polecats finished successfully");
            Ok(result)
        }
        Err(err) => {
            error!(error = ?err, "polecats failed");
            Err(err)
        }
    }
}
