//! Google Places Web Service adapter.
//!
//! [`GooglePlacesClient`] implements [`PlacesProvider`] over the JSON
//! endpoints under `place/`:
//! - `autocomplete` for text predictions
//! - `details` for a selected place id
//! - `nearbysearch` for proximity queries
//!
//! Provider statuses are passed through in the [`Reply`]; only transport and
//! decoding failures become errors. Nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::{PlacesConfig, DEFAULT_BASE_URL};
use crate::error::PlacesError;
use crate::provider::{CategoryFilter, PlacesProvider, PlacesStatus, Prediction, RawPlace, Reply};
use crate::LatLng;

const AUTOCOMPLETE_PATH: &str = "place/autocomplete/json";
const DETAILS_PATH: &str = "place/details/json";
const NEARBY_PATH: &str = "place/nearbysearch/json";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    status: PlacesStatus,
    #[serde(default)]
    predictions: Vec<WirePrediction>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePrediction {
    place_id: String,
    #[serde(default)]
    description: String,
    structured_formatting: Option<StructuredFormatting>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StructuredFormatting {
    main_text: String,
    secondary_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: PlacesStatus,
    result: Option<WirePlace>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: PlacesStatus,
    #[serde(default)]
    results: Vec<WirePlace>,
    error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePlace {
    place_id: Option<String>,
    name: Option<String>,
    formatted_address: Option<String>,
    vicinity: Option<String>,
    geometry: Option<Geometry>,
    types: Vec<String>,
    rating: Option<f64>,
    user_ratings_total: Option<u32>,
    price_level: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<LatLng>,
}

impl From<WirePrediction> for Prediction {
    fn from(wire: WirePrediction) -> Self {
        let (primary, secondary) = match wire.structured_formatting {
            Some(fmt) => (fmt.main_text, fmt.secondary_text.unwrap_or_default()),
            None => (wire.description.clone(), String::new()),
        };
        let mut prediction = Prediction::new(wire.place_id, primary, secondary).with_tags(wire.types);
        if !wire.description.is_empty() {
            prediction.description = wire.description;
        }
        prediction
    }
}

impl From<WirePlace> for RawPlace {
    fn from(wire: WirePlace) -> Self {
        Self {
            place_id: wire.place_id,
            name: wire.name,
            formatted_address: wire.formatted_address,
            vicinity: wire.vicinity,
            location: wire.geometry.and_then(|g| g.location),
            types: wire.types,
            rating: wire.rating,
            user_ratings_total: wire.user_ratings_total,
            price_level: wire.price_level,
        }
    }
}

fn invalid_base_url(url: &str, reason: impl std::fmt::Display) -> PlacesError {
    PlacesError::InvalidBaseUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

fn log_status(endpoint: &str, status: PlacesStatus, message: Option<&str>) {
    if !status.is_ok() {
        debug!(
            "[GooglePlaces] {} answered {}{}",
            endpoint,
            status,
            message.map(|m| format!(": {}", m)).unwrap_or_default()
        );
    }
}

// ============================================================================
// Client
// ============================================================================

/// Places provider backed by the Google Places Web Service.
///
/// Use [`GooglePlacesClient::new`] with loaded configuration, or
/// [`GooglePlacesClient::with_base_url`] to point at a mock server.
pub struct GooglePlacesClient {
    client: Client,
    api_key: String,
    autocomplete_url: Url,
    details_url: Url,
    nearby_url: Url,
}

impl GooglePlacesClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// - [`PlacesError::MissingCredential`] if no API key is configured.
    /// - [`PlacesError::InvalidBaseUrl`] if the base URL cannot be parsed.
    /// - [`PlacesError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &PlacesConfig) -> Result<Self, PlacesError> {
        let api_key = config.api_key.as_deref().ok_or(PlacesError::MissingCredential)?;
        Self::with_base_url(api_key, config.timeout_secs, &config.base_url)
    }

    /// Creates a client against the public endpoint.
    ///
    /// # Errors
    ///
    /// Same as [`GooglePlacesClient::with_base_url`].
    pub fn with_api_key(api_key: &str, timeout_secs: u64) -> Result<Self, PlacesError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL.
    ///
    /// # Errors
    ///
    /// - [`PlacesError::MissingCredential`] if `api_key` is blank.
    /// - [`PlacesError::InvalidBaseUrl`] if `base_url` cannot be parsed.
    /// - [`PlacesError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(api_key: &str, timeout_secs: u64, base_url: &str) -> Result<Self, PlacesError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(PlacesError::MissingCredential);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(60))
            .user_agent(concat!("place-heatmap/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Exactly one trailing slash so joins append instead of replacing the last segment
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base = Url::parse(&normalised).map_err(|e| invalid_base_url(base_url, e))?;
        if base.cannot_be_a_base() {
            return Err(invalid_base_url(base_url, "not a hierarchical URL"));
        }
        let endpoint = |path: &str| base.join(path).map_err(|e| invalid_base_url(base_url, e));

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            autocomplete_url: endpoint(AUTOCOMPLETE_PATH)?,
            details_url: endpoint(DETAILS_PATH)?,
            nearby_url: endpoint(NEARBY_PATH)?,
        })
    }

    fn build_url(&self, endpoint: &Url, params: &[(&str, &str)]) -> Url {
        let mut url = endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("key", &self.api_key);
        }
        url
    }

    /// GET `url`, require a 2xx status and decode the body.
    async fn request_json<T: DeserializeOwned>(&self, url: Url, context: &str) -> Result<T, PlacesError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| PlacesError::Deserialize {
            context: context.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl PlacesProvider for GooglePlacesClient {
    async fn predict_text(
        &self,
        query: &str,
        filter: Option<&CategoryFilter>,
    ) -> Result<Reply<Vec<Prediction>>, PlacesError> {
        let types = filter.map(CategoryFilter::joined);
        let mut params = vec![("input", query)];
        if let Some(types) = types.as_deref() {
            params.push(("types", types));
        }

        debug!("[GooglePlaces] autocomplete {:?}", query);
        let url = self.build_url(&self.autocomplete_url, &params);
        let response: AutocompleteResponse = self.request_json(url, "autocomplete").await?;
        log_status("autocomplete", response.status, response.error_message.as_deref());

        Ok(Reply {
            status: response.status,
            data: response.predictions.into_iter().map(Prediction::from).collect(),
        })
    }

    async fn get_details(
        &self,
        id: &str,
        fields: &[&str],
    ) -> Result<Reply<Option<RawPlace>>, PlacesError> {
        let fields = fields.join(",");
        let mut params = vec![("place_id", id)];
        if !fields.is_empty() {
            params.push(("fields", fields.as_str()));
        }

        debug!("[GooglePlaces] details {}", id);
        let url = self.build_url(&self.details_url, &params);
        let response: DetailsResponse = self.request_json(url, "details").await?;
        log_status("details", response.status, response.error_message.as_deref());

        Ok(Reply {
            status: response.status,
            data: response.result.map(RawPlace::from),
        })
    }

    async fn search_nearby(
        &self,
        center: LatLng,
        radius_meters: u32,
        filter: Option<&CategoryFilter>,
    ) -> Result<Reply<Vec<RawPlace>>, PlacesError> {
        let location = format!("{},{}", center.lat, center.lng);
        let radius = radius_meters.to_string();
        let mut params = vec![("location", location.as_str()), ("radius", radius.as_str())];
        // nearbysearch takes a single type
        if let Some(place_type) = filter.and_then(|f| f.types.first()) {
            params.push(("type", place_type.as_str()));
        }

        debug!("[GooglePlaces] nearbysearch {} r={}m {:?}", location, radius_meters, filter.map(|f| &f.types));
        let url = self.build_url(&self.nearby_url, &params);
        let response: NearbyResponse = self.request_json(url, "nearbysearch").await?;
        log_status("nearbysearch", response.status, response.error_message.as_deref());

        Ok(Reply {
            status: response.status,
            data: response.results.into_iter().map(RawPlace::from).collect(),
        })
    }
}
