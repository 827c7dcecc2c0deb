//! Environment-driven configuration.
//!
//! Every component keeps its own config struct with sensible defaults; this
//! module only overlays the handful of values a deployment usually changes.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `GOOGLE_MAPS_API_KEY` | unset (provider unavailable) |
//! | `PLACES_BASE_URL` | `https://maps.googleapis.com/maps/api` |
//! | `PLACES_TIMEOUT_SECS` | `10` |
//! | `PLACES_DEBOUNCE_MS` | `300` |
//! | `PLACES_HEATMAP_RADIUS_M` | `5000` |
//! | `PLACES_HEATMAP_SPACING_MS` | `100` |
//! | `PLACES_HEATMAP_CONCURRENCY` | `1` |
//! | `PLACES_DEFAULT_CENTER` | `31.5204,74.3587` |

use std::env::VarError;
use std::fmt::Display;
use std::str::FromStr;

use crate::autocomplete::SearchConfig;
use crate::error::ConfigError;
use crate::heatmap::HeatmapConfig;
use crate::map_session::MapConfig;
use crate::LatLng;

/// Default Places Web Service root.
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

/// Connection settings for the places provider
#[derive(Debug, Clone)]
pub struct PlacesConfig {
    /// API key; `None` leaves the provider unavailable
    pub api_key: Option<String>,
    /// Web service root (default: Google Maps API)
    pub base_url: String,
    /// Per-request timeout (default: 10s)
    pub timeout_secs: u64,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

/// Everything an [`crate::Explorer`] needs.
#[derive(Debug, Clone, Default)]
pub struct ExplorerConfig {
    pub places: PlacesConfig,
    pub search: SearchConfig,
    pub heatmap: HeatmapConfig,
    pub map: MapConfig,
}

/// Load configuration, reading a `.env` file first if one exists.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is set to an unparseable value.
pub fn load_config() -> Result<ExplorerConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_config_from_env()
}

/// Load configuration from the process environment only.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is set to an unparseable value.
pub fn load_config_from_env() -> Result<ExplorerConfig, ConfigError> {
    build_config(|key| std::env::var(key))
}

/// Build configuration from an arbitrary variable lookup.
///
/// Unset variables keep their defaults; an empty API key counts as unset.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` naming the first bad variable.
pub fn build_config<F>(lookup: F) -> Result<ExplorerConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let mut config = ExplorerConfig::default();

    config.places.api_key = lookup("GOOGLE_MAPS_API_KEY")
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());
    if let Ok(url) = lookup("PLACES_BASE_URL") {
        config.places.base_url = url.trim_end_matches('/').to_string();
    }
    config.places.timeout_secs = parse_or(&lookup, "PLACES_TIMEOUT_SECS", config.places.timeout_secs)?;

    config.search.debounce_ms = parse_or(&lookup, "PLACES_DEBOUNCE_MS", config.search.debounce_ms)?;

    config.heatmap.radius_meters = parse_or(&lookup, "PLACES_HEATMAP_RADIUS_M", config.heatmap.radius_meters)?;
    config.heatmap.inter_query_delay_ms =
        parse_or(&lookup, "PLACES_HEATMAP_SPACING_MS", config.heatmap.inter_query_delay_ms)?;
    config.heatmap.max_concurrent_queries =
        parse_or(&lookup, "PLACES_HEATMAP_CONCURRENCY", config.heatmap.max_concurrent_queries)?;
    if config.heatmap.max_concurrent_queries == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PLACES_HEATMAP_CONCURRENCY".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if let Ok(raw) = lookup("PLACES_DEFAULT_CENTER") {
        config.map.default_center = parse_center(&raw).map_err(|reason| ConfigError::InvalidEnvVar {
            var: "PLACES_DEFAULT_CENTER".to_string(),
            reason,
        })?;
    }

    Ok(config)
}

fn parse_or<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse `"lat,lng"`.
fn parse_center(raw: &str) -> Result<LatLng, String> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lng\", got {:?}", raw))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("latitude: {}", e))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("longitude: {}", e))?;

    let center = LatLng::new(lat, lng);
    if !center.is_valid() {
        return Err(format!("{},{} is out of range", lat, lng));
    }
    Ok(center)
}
