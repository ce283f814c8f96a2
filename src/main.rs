//! tasar CLI - used-vehicle price inference server
//!
//! # Commands
//!
//! - `serve` - Start the prediction server
//! - `check` - Load and validate an artifact bundle
//! - `predict` - Predict a price offline or against a running server
//! - `info` - Show version info

use clap::Parser;

use tasar::cli::{self, Cli};

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = cli::entrypoint(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
