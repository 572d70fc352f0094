use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{LatLng, SortMode};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub map: MapConfig,
    pub uploads: UploadConfig,
    pub tables: TablesConfig,
    pub store: StoreConfig,
    pub display: DisplayConfig,
}

/// Initial viewport and zoom bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub center: LatLng,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// How long to wait for the visitor's position before keeping `center`
    pub geolocation_timeout_ms: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: LatLng::new(55.7558, 37.6173),
            zoom: 10.0,
            min_zoom: 3.0,
            max_zoom: 18.0,
            geolocation_timeout_ms: 5000,
        }
    }
}

impl MapConfig {
    /// Keep `zoom` within the configured bounds; never panics on bad bounds
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        // f64::max/min ignore a NaN operand, so a NaN bound leaves that side open
        if self.min_zoom > self.max_zoom {
            zoom.max(self.max_zoom).min(self.min_zoom)
        } else {
            zoom.max(self.min_zoom).min(self.max_zoom)
        }
    }

    /// Reject zoom bounds that cannot describe a range
    pub fn validate(&self) -> Result<()> {
        if !self.min_zoom.is_finite() || !self.max_zoom.is_finite() || !self.zoom.is_finite() {
            anyhow::bail!("map.zoom, map.min_zoom and map.max_zoom must be finite numbers");
        }
        if self.min_zoom > self.max_zoom {
            anyhow::bail!(
                "map.min_zoom ({}) must not exceed map.max_zoom ({})",
                self.min_zoom,
                self.max_zoom
            );
        }
        Ok(())
    }
}

/// Photo upload limits and blob placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum photo size in bytes
    pub max_file_size: u64,
    /// MIME types accepted for photos; entries may be glob patterns
    pub allowed_types: Vec<String>,
    pub bucket: String,
    pub path_prefix: String,
    pub cache_control_secs: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,
            allowed_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
            bucket: "reviews-photos".to_string(),
            path_prefix: "public".to_string(),
            cache_control_secs: 3600,
        }
    }
}

/// Table names in the remote store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub reviews: String,
    pub likes: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            reviews: "reviews".to_string(),
            likes: "likes".to_string(),
        }
    }
}

/// Remote store endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Popup text is cut after this many characters
    pub preview_chars: usize,
    pub default_sort: SortMode,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            preview_chars: 100,
            default_sort: SortMode::Newest,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .map
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    /// Load configuration from the default location (.review-map/config.yml)
    pub fn load_default() -> Result<Self> {
        Self::load(".review-map/config.yml")
    }

    /// Check whether a photo MIME type is on the allow-list
    pub fn is_allowed_type(&self, content_type: &str) -> bool {
        let content_type = content_type.to_ascii_lowercase();
        self.uploads.allowed_types.iter().any(|allowed| {
            match glob::Pattern::new(&allowed.to_ascii_lowercase()) {
                Ok(pattern) => pattern.matches(&content_type),
                Err(_) => allowed.eq_ignore_ascii_case(&content_type),
            }
        })
    }
}
