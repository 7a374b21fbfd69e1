use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::api::{DEFAULT_CITY, DEFAULT_ENDPOINT, PayloadStyle};
use crate::domain::Coordinate;
use crate::feed::FieldAliases;
use crate::location::FALLBACK;
use crate::map::{DEFAULT_ICON_TEMPLATE, DEFAULT_PADDING, DEFAULT_SHADOW_URL, DEFAULT_ZOOM};

/// Shortest allowed poll interval
pub const MIN_INTERVAL_SECS: u64 = 1;

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_interval_secs() -> u64 {
    30
}
fn default_request_timeout_secs() -> u64 {
    20
}
fn default_location_timeout_secs() -> u64 {
    5
}
fn default_fallback() -> Coordinate {
    FALLBACK
}
fn default_city() -> String {
    DEFAULT_CITY.to_string()
}
fn default_verbose() -> bool {
    false
}

#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_location_timeout_secs")]
    pub location_timeout_secs: u64,
    #[serde(default = "default_fallback")]
    pub fallback: Coordinate,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default = "default_verbose")]
    pub verbose: bool,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub fields: FieldAliases,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            lat: None,
            lon: None,
            city: None,
            country: None,
            endpoint: default_endpoint(),
            interval_secs: default_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            location_timeout_secs: default_location_timeout_secs(),
            fallback: default_fallback(),
            output: None,
            verbose: default_verbose(),
            payload: PayloadConfig::default(),
            map: MapConfig::default(),
            fields: FieldAliases::default(),
        }
    }
}

/// Request body sent to the prediction endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct PayloadConfig {
    #[serde(default)]
    pub style: PayloadStyle,
    /// Value of the `city` key for styles that send one
    #[serde(default = "default_city")]
    pub city: String,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            style: PayloadStyle::default(),
            city: default_city(),
        }
    }
}

fn default_zoom() -> u8 {
    DEFAULT_ZOOM
}
fn default_padding() -> u32 {
    DEFAULT_PADDING
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_max_zoom() -> u8 {
    18
}
fn default_icon_template() -> String {
    DEFAULT_ICON_TEMPLATE.to_string()
}
fn default_shadow_url() -> String {
    DEFAULT_SHADOW_URL.to_string()
}
fn default_currency() -> String {
    "₹".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    /// Pixels kept clear around fitted markers
    #[serde(default = "default_padding")]
    pub padding: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
    #[serde(default = "default_icon_template")]
    pub icon_template: String,
    #[serde(default = "default_shadow_url")]
    pub shadow_url: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom: default_zoom(),
            padding: default_padding(),
            width: default_width(),
            height: default_height(),
            max_zoom: default_max_zoom(),
            icon_template: default_icon_template(),
            shadow_url: default_shadow_url(),
            currency: default_currency(),
        }
    }
}

impl FileConfig {
    /// First parseable config file on the search path
    pub fn load() -> Option<Self> {
        for path in get_config_paths() {
            if path.exists()
                && let Ok(contents) = std::fs::read_to_string(&path)
            {
                match toml::from_str(&contents) {
                    Ok(config) => return Some(config),
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config file {:?}: {}", path, e);
                    }
                }
            }
        }
        None
    }

    /// Load an explicitly named config file; a missing or broken file is an error
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Config file not found: {:?}", path);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&contents).context("Failed to parse config file")
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs < MIN_INTERVAL_SECS {
            bail!("interval_secs must be at least {}", MIN_INTERVAL_SECS);
        }
        if !self.fallback.is_valid() {
            bail!("fallback coordinate is out of range: {:?}", self.fallback);
        }
        if self.map.max_zoom < self.map.zoom {
            bail!("map.max_zoom ({}) is below map.zoom ({})", self.map.max_zoom, self.map.zoom);
        }
        if !self.map.icon_template.contains("{color}") {
            bail!("map.icon_template must contain a {{color}} placeholder");
        }
        Ok(())
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("parkwatch.toml"));
    paths.push(PathBuf::from(".parkwatch.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("parkwatch").join("config.toml"));
        paths.push(config_dir.join("parkwatch.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".parkwatch.toml"));
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();

        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.interval_secs, 30);
        assert_eq!(config.fallback, FALLBACK);
        assert_eq!(config.payload.style, PayloadStyle::City);
        assert_eq!(config.payload.city, "India_Cities");
        assert_eq!(config.map.padding, 50);
        assert_eq!(config.fields.latitude, vec!["latitude", "lat"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_file() {
        let config: FileConfig = toml::from_str(
            r#"
            lat = 12.97
            lon = 77.59
            endpoint = "http://localhost:8000/predict"
            interval_secs = 10
            output = "spots.geojson"

            [fallback]
            latitude = 28.61
            longitude = 77.21

            [payload]
            style = "compat"
            city = "Bengaluru"

            [map]
            padding = 20
            currency = "$"

            [fields]
            available = ["free", "available"]
            "#,
        )
        .unwrap();

        assert_eq!(config.lat, Some(12.97));
        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.fallback, Coordinate::new(28.61, 77.21));
        assert_eq!(config.payload.style, PayloadStyle::Compat);
        assert_eq!(config.payload.city, "Bengaluru");
        assert_eq!(config.map.padding, 20);
        assert_eq!(config.map.zoom, DEFAULT_ZOOM);
        assert_eq!(config.map.currency, "$");
        assert_eq!(config.fields.available, vec!["free", "available"]);
        assert_eq!(config.fields.name, vec!["location_name", "name"]);
        assert_eq!(config.output, Some(PathBuf::from("spots.geojson")));
    }

    #[test]
    fn test_validation() {
        let config = FileConfig {
            interval_secs: 0,
            ..FileConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = FileConfig::default();
        config.map.icon_template = "https://example.com/pin.png".to_string();
        assert!(config.validate().is_err());

        let config = FileConfig {
            fallback: Coordinate::new(100.0, 0.0),
            ..FileConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("parkwatch.toml");

        assert!(FileConfig::from_path(&path).is_err());

        fs::write(&path, "interval_secs = 45\n").unwrap();
        assert_eq!(FileConfig::from_path(&path).unwrap().interval_secs, 45);

        fs::write(&path, "interval_secs = \"soon\"\n").unwrap();
        assert!(FileConfig::from_path(&path).is_err());
    }
}
