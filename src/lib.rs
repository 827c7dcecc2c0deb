//! # Place Heatmap
//!
//! Race-safe place search and weighted activity heatmaps on top of an
//! asynchronous, rate-sensitive places provider.
//!
//! This library provides:
//! - A debounced autocomplete pipeline that never lets an older response
//!   overwrite a newer one
//! - A suggestion list state machine with unified keyboard navigation
//! - A heatmap aggregation engine that scores categorized proximity results
//! - A map session that re-centers, swaps markers and rebuilds the heatmap
//!   for every selected place
//!
//! Rendering and the provider SDK stay outside the crate: the core talks to
//! the provider through [`PlacesProvider`] and to the renderer through
//! [`MapSurface`].
//!
//! ## Features
//!
//! - **`http`** (default) - Google Places Web Service adapter ([`GooglePlacesClient`])
//!
//! ## Quick Start
//!
//! ```rust
//! use place_heatmap::{CategorySpec, RawPlace, LatLng, heatmap::score_place};
//!
//! let spec = CategorySpec::new("dining", "restaurant", Some(0.2));
//! let place = RawPlace {
//!     location: Some(LatLng::new(31.52, 74.35)),
//!     rating: Some(5.0),
//!     user_ratings_total: Some(2_400),
//!     ..RawPlace::default()
//! };
//!
//! assert_eq!(score_place(&place, &spec), 1.0);
//! ```

use serde::{Deserialize, Serialize};

pub mod geo_utils;

pub mod error;
pub use error::{ConfigError, PlacesError};

pub mod config;
pub use config::{load_config, ExplorerConfig, PlacesConfig};

// Collaborator contract and adapters
pub mod provider;
pub use provider::{
    degrade, CategoryFilter, PlacesProvider, PlacesStatus, Prediction, RawPlace, Reply,
    DETAIL_FIELDS,
};

pub mod static_provider;
pub use static_provider::StaticProvider;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::GooglePlacesClient;

pub mod rate_limit;

// Search pipeline
pub mod debounce;
pub use debounce::Debouncer;

pub mod autocomplete;
pub use autocomplete::{RequestSequencer, RequestToken, ResponseOutcome, SearchConfig};

pub mod resolver;
pub use resolver::{normalize_place, Resolution, SelectionResolver};

pub mod suggestions;
pub use suggestions::{
    default_quick_actions, Activation, ListState, QuickAction, QuickActionEffect, SuggestionItem,
    SuggestionList,
};

// Map side
pub mod heatmap;
pub use heatmap::{
    default_categories, CategorySpec, CategoryStat, HeatmapConfig, HeatmapDataset, HeatmapEngine,
    WeightedPoint,
};

pub mod map_session;
pub use map_session::{MapConfig, MapSession, MapUpdate, NearbyPlace};

pub mod explorer;
pub use explorer::{Explorer, MapSurface, SearchSnapshot, UiEvent};

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate.
///
/// # Example
/// ```
/// use place_heatmap::LatLng;
/// let point = LatLng::new(31.5204, 74.3587); // Lahore
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Create a new coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the coordinate is finite and within WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center point of the bounds.
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Inclusive containment check.
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

/// A fully resolved place, as handed to the map session.
///
/// Built by [`normalize_place`] from a provider detail record. A new selection
/// replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub formatted_address: String,
    pub location: LatLng,
    pub types: Vec<String>,
    pub rating: Option<f64>,
    pub price_level: Option<u8>,
    pub user_ratings_total: Option<u32>,
}

impl Place {
    /// Id used for the device-location pseudo place.
    pub const CURRENT_LOCATION_ID: &'static str = "user-location";

    /// Pseudo place for a resolved device location.
    pub fn current_location(location: LatLng) -> Self {
        Self {
            id: Self::CURRENT_LOCATION_ID.to_string(),
            name: "Your Location".to_string(),
            formatted_address: "Your Current Location".to_string(),
            location,
            types: Vec::new(),
            rating: None,
            price_level: None,
            user_ratings_total: None,
        }
    }

    /// Display text for the price level (`Free`, `$` .. `$$$$`).
    pub fn price_label(&self) -> Option<&'static str> {
        const LEVELS: [&str; 5] = ["Free", "$", "$$", "$$$", "$$$$"];
        self.price_level
            .and_then(|level| LEVELS.get(level as usize).copied())
    }
}
