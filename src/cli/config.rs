//! Config command handler
//!
//! View and modify configuration settings.

use crate::config::Config;
use crate::error::{Error, Result};
use clap::Args;

/// Config command arguments
#[derive(Args)]
pub struct ConfigArgs {
    /// Configuration key (e.g., "feed.radius_km")
    pub key: Option<String>,

    /// Value to set (if not provided, shows current value)
    pub value: Option<String>,

    /// Show config file path
    #[arg(long)]
    pub path: bool,

    /// Reset config to defaults
    #[arg(long)]
    pub reset: bool,
}

/// Run the config command
pub fn run(args: ConfigArgs) -> Result<()> {
    // Show path
    if args.path {
        let path = Config::config_path()?;
        println!("{}", path.display());
        return Ok(());
    }

    // Reset config
    if args.reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults");
        return Ok(());
    }

    let mut config = Config::load()?;

    match (&args.key, &args.value) {
        (None, None) => show_all_config(&config),

        (Some(key), None) => match config.get(key) {
            Some(value) => println!("{}", value),
            None => {
                return Err(Error::Config(format!(
                    "Unknown config key: {}\n\nAvailable keys:\n  {}",
                    key,
                    Config::available_keys().join("\n  ")
                )));
            }
        },

        (Some(key), Some(value)) => {
            config.set(key, value)?;
            config.save()?;
            println!("{} = {}", key, value);
        }

        (None, Some(_)) => {
            return Err(Error::Config(
                "Must specify a key to set a value".to_string(),
            ));
        }
    }

    Ok(())
}

/// Display all configuration values
fn show_all_config(config: &Config) {
    println!("[feed]");
    println!("radius_km = {}", config.feed.radius_km);
    println!("format = \"{}\"", config.feed.format);
    println!();

    println!("[geolocation]");
    println!("high_accuracy = {}", config.geolocation.high_accuracy);
    println!("timeout_secs = {}", config.geolocation.timeout_secs);
    println!("default_lat = {}", config.geolocation.default_lat);
    println!("default_lng = {}", config.geolocation.default_lng);
    println!();

    println!("[store]");
    if config.store.url.is_empty() {
        println!("url = \"\" # not configured");
    } else {
        println!("url = \"{}\"", config.store.url);
    }
    if config.store.api_key.is_empty() {
        println!("api_key = \"\" # not configured");
    } else {
        println!("api_key = \"***\" # configured");
    }
    println!("table = \"{}\"", config.store.table);
    println!("poll_interval_secs = {}", config.store.poll_interval_secs);
    println!("failure_threshold = {}", config.store.failure_threshold);
    println!();

    println!("[reconnect]");
    println!("initial_backoff_ms = {}", config.reconnect.initial_backoff_ms);
    println!("max_backoff_ms = {}", config.reconnect.max_backoff_ms);
    println!("max_attempts = {}", config.reconnect.max_attempts);
    println!();

    println!("[server]");
    println!("host = \"{}\"", config.server.host);
    println!("port = {}", config.server.port);
}
