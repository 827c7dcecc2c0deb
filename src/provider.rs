//! Places collaborator contract.
//!
//! The core never talks to a provider SDK directly. Every provider (the
//! Google Places adapter in [`crate::http`], the scripted
//! [`crate::StaticProvider`], or anything a host application wires in) sits
//! behind [`PlacesProvider`], which offers three requests:
//!
//! - text prediction for autocomplete
//! - details for a chosen id
//! - proximity search around a center
//!
//! Every reply carries a [`PlacesStatus`]. Only [`PlacesStatus::Ok`] means
//! success; callers use [`degrade`] to turn any other status, and any
//! transport error, into an empty result.

use std::fmt;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::PlacesError;
use crate::LatLng;

/// Fields requested for a selection's detail lookup.
pub const DETAIL_FIELDS: &[&str] = &[
    "place_id",
    "name",
    "formatted_address",
    "geometry",
    "types",
    "rating",
    "price_level",
    "user_ratings_total",
];

/// Status attached to every provider reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacesStatus {
    Ok,
    ZeroResults,
    OverQueryLimit,
    RequestDenied,
    InvalidRequest,
    NotFound,
    #[serde(other)]
    UnknownError,
}

impl PlacesStatus {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ZeroResults => "ZERO_RESULTS",
            Self::OverQueryLimit => "OVER_QUERY_LIMIT",
            Self::RequestDenied => "REQUEST_DENIED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for PlacesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider reply: status plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub status: PlacesStatus,
    pub data: T,
}

impl<T> Reply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: PlacesStatus::Ok,
            data,
        }
    }
}

impl<T: Default> Reply<T> {
    /// A reply with the given status and an empty payload.
    pub fn with_status(status: PlacesStatus) -> Self {
        Self {
            status,
            data: T::default(),
        }
    }
}

/// Provider-side type filter (e.g. `["restaurant"]`, `["university", "school"]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub types: Vec<String>,
}

impl CategoryFilter {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single(place_type: impl Into<String>) -> Self {
        Self {
            types: vec![place_type.into()],
        }
    }

    /// Types joined with `|`, the separator Places endpoints expect.
    pub fn joined(&self) -> String {
        self.types.join("|")
    }
}

/// Autocomplete candidate for a partial query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub primary_text: String,
    pub secondary_text: String,
    /// Full display text; becomes the query once the prediction is selected.
    pub description: String,
    pub category_tags: Vec<String>,
}

impl Prediction {
    pub fn new(id: impl Into<String>, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        let primary_text = primary.into();
        let secondary_text = secondary.into();
        let description = if secondary_text.is_empty() {
            primary_text.clone()
        } else {
            format!("{}, {}", primary_text, secondary_text)
        };
        Self {
            id: id.into(),
            primary_text,
            secondary_text,
            description,
            category_tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Provider-shaped place record; every field may be missing.
///
/// Detail lookups and proximity searches both return this shape. It is
/// normalized into a [`crate::Place`] by [`crate::normalize_place`] and scored
/// directly by the heatmap engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPlace {
    pub place_id: Option<String>,
    pub name: Option<String>,
    pub formatted_address: Option<String>,
    pub vicinity: Option<String>,
    pub location: Option<LatLng>,
    pub types: Vec<String>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u32>,
    pub price_level: Option<u8>,
}

/// The request/response contract the core relies on.
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    /// Text predictions for a partial query, optionally scoped by category.
    async fn predict_text(
        &self,
        query: &str,
        filter: Option<&CategoryFilter>,
    ) -> Result<Reply<Vec<Prediction>>, PlacesError>;

    /// Details for a place id, limited to `fields`.
    async fn get_details(
        &self,
        id: &str,
        fields: &[&str],
    ) -> Result<Reply<Option<RawPlace>>, PlacesError>;

    /// Places within `radius_meters` of `center`, optionally scoped by category.
    async fn search_nearby(
        &self,
        center: LatLng,
        radius_meters: u32,
        filter: Option<&CategoryFilter>,
    ) -> Result<Reply<Vec<RawPlace>>, PlacesError>;
}

/// Collapse a provider result into its payload, or an empty payload.
///
/// Non-OK statuses and transport errors are absorbed here; nothing above the
/// provider boundary sees them. `context` only feeds the log line.
pub fn degrade<T: Default>(result: Result<Reply<T>, PlacesError>, context: &str) -> T {
    match result {
        Ok(reply) if reply.status.is_ok() => reply.data,
        Ok(reply) if reply.status == PlacesStatus::ZeroResults => {
            debug!("[Places] {}: no results", context);
            T::default()
        }
        Ok(reply) => {
            warn!("[Places] {}: provider status {}", context, reply.status);
            T::default()
        }
        Err(e) => {
            warn!("[Places] {}: {}", context, e);
            T::default()
        }
    }
}
