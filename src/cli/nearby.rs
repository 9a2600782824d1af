//! Nearby command handler
//!
//! Runs a feed for one viewer against the configured store and prints it.

use crate::cli::PositionArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::{create_nearby_feed, FeedOptions, FeedPhase, FeedState};
use crate::format::{available_formats, get_formatter, OutputFormatter};
use crate::listing::Category;
use crate::store::{ListingStore, RestListingStore};
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

/// Nearby command arguments
#[derive(Args)]
pub struct NearbyArgs {
    /// Viewer user id; their own listings are excluded
    #[arg(long, short = 'u')]
    pub user: String,

    #[command(flatten)]
    pub position: PositionArgs,

    /// Radius in kilometers
    #[arg(long, short = 'r')]
    pub radius: Option<f64>,

    /// Only this category (house, car, service, product)
    #[arg(long, short = 'c')]
    pub category: Option<Category>,

    /// Text to search in title, subcategory and description
    #[arg(long, short = 'q')]
    pub query: Option<String>,

    /// Output format
    #[arg(long, short = 'f')]
    pub format: Option<String>,

    /// Keep running and print every change
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// List available formats
    #[arg(short = 'F', long = "list-formats")]
    pub list_formats: bool,
}

/// Run the nearby command
pub async fn run(args: NearbyArgs) -> Result<()> {
    if args.list_formats {
        list_formats();
        return Ok(());
    }

    let config = Config::load()?;

    let radius = args.radius.unwrap_or(config.feed.radius_km);
    if !radius.is_finite() || radius <= 0.0 {
        return Err(Error::Config(format!("Radius must be positive: {}", radius)));
    }

    let format = args.format.clone().unwrap_or(config.feed.format.clone());
    let formatter = get_formatter(&format)
        .ok_or_else(|| Error::Config(format!("Unknown format: {}", format)))?;

    let store: Arc<dyn ListingStore> = Arc::new(RestListingStore::from_config(&config.store)?);
    let options = FeedOptions::from_config(&config)
        .with_radius(radius)
        .with_category(args.category)
        .with_text(args.query);

    let feed = create_nearby_feed(
        args.user,
        args.position.profile_location.clone(),
        options,
        store,
        args.position.positioning()?,
    );
    let mut state = feed.state();

    let result = if args.watch {
        watch_feed(&mut state, formatter.as_ref()).await
    } else {
        print_once(&mut state, formatter.as_ref()).await
    };

    feed.dispose();
    result
}

/// Print the first settled state; an errored feed fails the command
async fn print_once(
    state: &mut watch::Receiver<FeedState>,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let settled = state
        .wait_for(|s| {
            matches!(
                s.phase,
                FeedPhase::Live | FeedPhase::Error | FeedPhase::Disposed
            )
        })
        .await
        .map_err(|_| Error::Store("Feed stopped unexpectedly".to_string()))?
        .clone();

    println!("{}", formatter.format(&settled)?);

    match settled.error {
        Some(e) => Err(Error::Store(e.to_string())),
        None => Ok(()),
    }
}

/// Print every state outside of loading until Ctrl-C
async fn watch_feed(
    state: &mut watch::Receiver<FeedState>,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let current = state.borrow_and_update().clone();
                if !current.is_loading() {
                    println!("{}", formatter.format(&current)?);
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

/// Print available output formats
fn list_formats() {
    println!("Available output formats:");
    for format in available_formats() {
        println!("  {:<6} - {}", format.name, format.description);
    }
}
