//! Locate command handler
//!
//! Runs the geolocation fallback chain once and prints where it landed.

use crate::cli::PositionArgs;
use crate::config::Config;
use crate::error::Result;
use crate::geo::{GeolocationResolver, GeolocationSettings};
use clap::Args;

/// Locate command arguments
#[derive(Args)]
pub struct LocateArgs {
    #[command(flatten)]
    pub position: PositionArgs,

    /// Print the resolved location as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the locate command
pub async fn run(args: LocateArgs) -> Result<()> {
    let config = Config::load()?;

    let resolver = GeolocationResolver::new(
        args.position.positioning()?,
        GeolocationSettings::from_config(&config),
    );
    let resolved = resolver
        .resolve(args.position.profile_location.as_deref())
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        println!("{} ({})", resolved.coordinate, resolved.source);
    }

    Ok(())
}
