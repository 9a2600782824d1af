//! mella-feed CLI entry point
//!
//! Proximity-ranked listing feed - CLI + HTTP API

use mella_feed::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
