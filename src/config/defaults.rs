//! Default configuration values
//!
//! Named constants for all tunable parameters

use crate::constants::geo::{HOME_CITY_LAT, HOME_CITY_LNG};

/// Radius of the nearby feed in kilometers
pub const DEFAULT_RADIUS_KM: f64 = 50.0;

/// Ask the positioning capability for its most accurate fix
pub const DEFAULT_HIGH_ACCURACY: bool = true;

/// Positioning timeout in seconds
pub const DEFAULT_GEOLOCATION_TIMEOUT_SECS: u64 = 10;

/// Fallback viewer latitude
pub const DEFAULT_LAT: f64 = HOME_CITY_LAT;

/// Fallback viewer longitude
pub const DEFAULT_LNG: f64 = HOME_CITY_LNG;

/// Listing table name
pub const DEFAULT_TABLE: &str = "listings";

/// Seconds between change-feed polls
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Consecutive poll failures before the change feed reports a disconnect
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// First reconnect delay in milliseconds
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;

/// Upper bound on the reconnect delay in milliseconds
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

/// Reconnect attempts before the feed gives up and reports an error
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 7979;

/// Default output format
pub const DEFAULT_FORMAT: &str = "text";

/// Config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name (for XDG paths)
pub const APP_DIR_NAME: &str = "mella-feed";
