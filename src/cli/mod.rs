//! CLI command handlers
//!
//! Each subcommand has its own module with handler functions.

pub mod config;
pub mod distance;
pub mod listings;
pub mod locate;
pub mod nearby;
pub mod serve;

use crate::coord::Coordinates;
use crate::error::Result;
use crate::geo::ip_location::IpPositioning;
use crate::geo::{DisabledPositioning, Positioning, StaticPositioning};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Proximity-ranked listing feed for the Mella marketplace
#[derive(Parser)]
#[command(name = "mella-feed")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show listings near a viewer
    Nearby(nearby::NearbyArgs),

    /// Resolve the viewer location
    Locate(locate::LocateArgs),

    /// Distance between two coordinates
    Distance(distance::DistanceArgs),

    /// Post, list and remove your own listings
    Listings(listings::ListingsArgs),

    /// Manage configuration
    Config(config::ConfigArgs),

    /// Start web server (foreground)
    Serve(serve::ServeArgs),
}

/// Where the viewer is, shared by `nearby` and `locate`
#[derive(Args)]
pub struct PositionArgs {
    /// Latitude of a known position
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of a known position
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lng: Option<f64>,

    /// Profile location text, used when no position is available
    #[arg(long)]
    pub profile_location: Option<String>,

    /// Skip positioning and use the profile or default location
    #[arg(long, conflicts_with_all = ["lat", "lng"])]
    pub no_position: bool,
}

impl PositionArgs {
    /// Positioning capability for these arguments
    ///
    /// `--lat/--lng` pin the position; otherwise the IP geolocation service is asked.
    pub fn positioning(&self) -> Result<Arc<dyn Positioning>> {
        if self.no_position {
            return Ok(Arc::new(DisabledPositioning));
        }

        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => {
                let coordinate = Coordinates::new(lat, lng);
                coordinate.validate()?;
                Ok(Arc::new(StaticPositioning::new(coordinate)))
            }
            _ => Ok(Arc::new(IpPositioning::new())),
        }
    }
}

/// Initialize logging to stderr
///
/// `RUST_LOG` overrides `default_level`.
pub fn init_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(match cli.command {
        Commands::Serve(_) => "info",
        _ => "warn",
    });

    match cli.command {
        Commands::Nearby(args) => nearby::run(args).await,
        Commands::Locate(args) => locate::run(args).await,
        Commands::Distance(args) => distance::run(args),
        Commands::Listings(args) => listings::run(args).await,
        Commands::Config(args) => config::run(args),
        Commands::Serve(args) => serve::run(args).await,
    }
}
