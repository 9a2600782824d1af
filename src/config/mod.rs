//! Configuration management
//!
//! Loads and saves configuration from XDG-compliant paths.
//! Config location: ~/.config/mella-feed/config.toml

pub mod defaults;

use crate::coord::Coordinates;
use crate::error::{Error, Result};
use defaults::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Nearby feed settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Viewer location resolution
    #[serde(default)]
    pub geolocation: GeolocationConfig,

    /// Hosted listing store
    #[serde(default)]
    pub store: StoreConfig,

    /// Change-feed reconnect policy
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Nearby feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Only listings strictly closer than this are shown
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,

    /// Default CLI output format
    #[serde(default = "default_format")]
    pub format: String,
}

/// Viewer location resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    #[serde(default = "default_high_accuracy")]
    pub high_accuracy: bool,

    /// Positioning timeout in seconds
    #[serde(default = "default_geolocation_timeout")]
    pub timeout_secs: u64,

    /// Fallback latitude when no fix or profile location is available
    #[serde(default = "default_lat")]
    pub default_lat: f64,

    /// Fallback longitude when no fix or profile location is available
    #[serde(default = "default_lng")]
    pub default_lng: f64,
}

/// Hosted listing store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project URL, e.g. https://<project>.supabase.co
    #[serde(default)]
    pub url: String,

    /// Anonymous API key
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_table")]
    pub table: String,

    /// Seconds between change-feed polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Consecutive poll failures before the change feed disconnects
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

/// Change-feed reconnect policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

// Default value functions for serde
fn default_radius_km() -> f64 {
    DEFAULT_RADIUS_KM
}
fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}
fn default_high_accuracy() -> bool {
    DEFAULT_HIGH_ACCURACY
}
fn default_geolocation_timeout() -> u64 {
    DEFAULT_GEOLOCATION_TIMEOUT_SECS
}
fn default_lat() -> f64 {
    DEFAULT_LAT
}
fn default_lng() -> f64 {
    DEFAULT_LNG
}
fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}
fn default_initial_backoff() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}
fn default_max_backoff() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            radius_km: default_radius_km(),
            format: default_format(),
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            high_accuracy: default_high_accuracy(),
            timeout_secs: default_geolocation_timeout(),
            default_lat: default_lat(),
            default_lng: default_lng(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            table: default_table(),
            poll_interval_secs: default_poll_interval(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: {}", key, value)))
}

fn validate_radius(radius: f64) -> Result<()> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(Error::Config(format!(
            "Radius must be a positive number: {}",
            radius
        )));
    }
    Ok(())
}

fn validate_default_location(lat: f64, lng: f64) -> Result<()> {
    Coordinates::new(lat, lng)
        .validate()
        .map_err(|e| Error::Config(format!("Invalid default location: {}", e)))
}

impl Config {
    /// Check values that serde accepts but the feed cannot use
    pub fn validate(&self) -> Result<()> {
        validate_radius(self.feed.radius_km)?;
        validate_default_location(self.geolocation.default_lat, self.geolocation.default_lng)
    }

    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(APP_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default path
    ///
    /// Creates default config if file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific path, creating it if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

            let config: Config = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get a configuration value by key path
    ///
    /// Key format: "section.key"
    /// Returns the value as a string, or None if not found
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["feed", "radius_km"] => Some(self.feed.radius_km.to_string()),
            ["feed", "format"] => Some(self.feed.format.clone()),

            ["geolocation", "high_accuracy"] => Some(self.geolocation.high_accuracy.to_string()),
            ["geolocation", "timeout_secs"] => Some(self.geolocation.timeout_secs.to_string()),
            ["geolocation", "default_lat"] => Some(self.geolocation.default_lat.to_string()),
            ["geolocation", "default_lng"] => Some(self.geolocation.default_lng.to_string()),

            ["store", "url"] => Some(self.store.url.clone()),
            ["store", "api_key"] => Some(self.store.api_key.clone()),
            ["store", "table"] => Some(self.store.table.clone()),
            ["store", "poll_interval_secs"] => Some(self.store.poll_interval_secs.to_string()),
            ["store", "failure_threshold"] => Some(self.store.failure_threshold.to_string()),

            ["reconnect", "initial_backoff_ms"] => {
                Some(self.reconnect.initial_backoff_ms.to_string())
            }
            ["reconnect", "max_backoff_ms"] => Some(self.reconnect.max_backoff_ms.to_string()),
            ["reconnect", "max_attempts"] => Some(self.reconnect.max_attempts.to_string()),

            ["server", "host"] => Some(self.server.host.clone()),
            ["server", "port"] => Some(self.server.port.to_string()),

            _ => None,
        }
    }

    /// Set a configuration value by key path
    ///
    /// Key format: "section.key"
    /// Returns error if key is invalid or value type is wrong
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["feed", "radius_km"] => {
                let radius: f64 = parse_value(key, value)?;
                validate_radius(radius)?;
                self.feed.radius_km = radius;
            }
            ["feed", "format"] => self.feed.format = value.to_string(),

            ["geolocation", "high_accuracy"] => {
                self.geolocation.high_accuracy = parse_value(key, value)?;
            }
            ["geolocation", "timeout_secs"] => {
                self.geolocation.timeout_secs = parse_value(key, value)?;
            }
            ["geolocation", "default_lat"] => {
                let lat = parse_value(key, value)?;
                validate_default_location(lat, self.geolocation.default_lng)?;
                self.geolocation.default_lat = lat;
            }
            ["geolocation", "default_lng"] => {
                let lng = parse_value(key, value)?;
                validate_default_location(self.geolocation.default_lat, lng)?;
                self.geolocation.default_lng = lng;
            }

            ["store", "url"] => self.store.url = value.trim_end_matches('/').to_string(),
            ["store", "api_key"] => self.store.api_key = value.to_string(),
            ["store", "table"] => self.store.table = value.to_string(),
            ["store", "poll_interval_secs"] => {
                self.store.poll_interval_secs = parse_value(key, value)?;
            }
            ["store", "failure_threshold"] => {
                self.store.failure_threshold = parse_value(key, value)?;
            }

            ["reconnect", "initial_backoff_ms"] => {
                self.reconnect.initial_backoff_ms = parse_value(key, value)?;
            }
            ["reconnect", "max_backoff_ms"] => {
                self.reconnect.max_backoff_ms = parse_value(key, value)?;
            }
            ["reconnect", "max_attempts"] => {
                self.reconnect.max_attempts = parse_value(key, value)?;
            }

            ["server", "host"] => self.server.host = value.to_string(),
            ["server", "port"] => self.server.port = parse_value(key, value)?,

            _ => {
                return Err(Error::Config(format!("Unknown config key: {}", key)));
            }
        }

        Ok(())
    }

    /// List all available config keys
    pub fn available_keys() -> Vec<&'static str> {
        vec![
            "feed.radius_km",
            "feed.format",
            "geolocation.high_accuracy",
            "geolocation.timeout_secs",
            "geolocation.default_lat",
            "geolocation.default_lng",
            "store.url",
            "store.api_key",
            "store.table",
            "store.poll_interval_secs",
            "store.failure_threshold",
            "reconnect.initial_backoff_ms",
            "reconnect.max_backoff_ms",
            "reconnect.max_attempts",
            "server.host",
            "server.port",
        ]
    }

    /// Get server address as "host:port"
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.feed.radius_km, 50.0);
        assert_eq!(config.geolocation.timeout_secs, 10);
        assert!(config.geolocation.high_accuracy);
        assert_eq!(config.geolocation.default_lat, 9.0105);
        assert_eq!(config.store.table, "listings");
        assert_eq!(config.server.port, 7979);
    }

    #[test]
    fn test_get_set() {
        let mut config = Config::default();

        assert_eq!(config.get("feed.radius_km"), Some("50".to_string()));

        config.set("feed.radius_km", "12.5").unwrap();
        assert_eq!(config.feed.radius_km, 12.5);

        config.set("store.url", "https://example.supabase.co/").unwrap();
        assert_eq!(
            config.get("store.url"),
            Some("https://example.supabase.co".to_string())
        );

        config.set("geolocation.high_accuracy", "false").unwrap();
        assert!(!config.geolocation.high_accuracy);
    }

    #[test]
    fn test_get_invalid_key() {
        let config = Config::default();
        assert_eq!(config.get("invalid.key"), None);
    }

    #[test]
    fn test_set_invalid_key() {
        let mut config = Config::default();
        assert!(config.set("invalid.key", "value").is_err());
    }

    #[test]
    fn test_set_invalid_value() {
        let mut config = Config::default();
        assert!(config.set("feed.radius_km", "not_a_number").is_err());
        assert!(config.set("feed.radius_km", "-3").is_err());
        assert!(config.set("server.port", "99999").is_err());
    }

    #[test]
    fn test_set_rejects_out_of_range_default_location() {
        let mut config = Config::default();
        assert!(config.set("geolocation.default_lat", "200").is_err());
        assert!(config.set("geolocation.default_lng", "-180.5").is_err());
        assert!(config.set("geolocation.default_lat", "NaN").is_err());
        assert_eq!(config.geolocation.default_lat, DEFAULT_LAT);
        assert_eq!(config.geolocation.default_lng, DEFAULT_LNG);

        config.set("geolocation.default_lat", "-33.9249").unwrap();
        config.set("geolocation.default_lng", "18.4241").unwrap();
        assert_eq!(config.geolocation.default_lat, -33.9249);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        fs::write(&path, "[geolocation]\ndefault_lat = 200.0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        fs::write(&path, "[feed]\nradius_km = -5.0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        fs::write(&path, "[feed]\nradius_km = nan\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.feed.radius_km = 20.0;
        config.store.url = "https://example.supabase.co".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.feed.radius_km, 20.0);
        assert_eq!(loaded.store.url, "https://example.supabase.co");
    }

    #[test]
    fn test_load_creates_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.feed.radius_km, 50.0);
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[feed]\nradius_km = 5.0\n").unwrap();
        assert_eq!(config.feed.radius_km, 5.0);
        assert_eq!(config.feed.format, "text");
        assert_eq!(config.reconnect.max_attempts, 5);
    }

    #[test]
    fn test_serialization_format() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();

        assert!(toml.contains("[feed]"));
        assert!(toml.contains("[geolocation]"));
        assert!(toml.contains("[store]"));
        assert!(toml.contains("[reconnect]"));
        assert!(toml.contains("[server]"));
    }

    #[test]
    fn test_every_key_is_readable() {
        let config = Config::default();
        for key in Config::available_keys() {
            assert!(config.get(key).is_some(), "{} should be readable", key);
        }
    }

    #[test]
    fn test_server_addr() {
        let config = Config::default();
        assert_eq!(config.server_addr(), "127.0.0.1:7979");
    }
}
