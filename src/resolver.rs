//! Selection resolution: prediction id -> full [`Place`].

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, warn};

use crate::autocomplete::RequestToken;
use crate::provider::{degrade, PlacesProvider, RawPlace, DETAIL_FIELDS};
use crate::Place;

/// Normalize a provider detail record into a [`Place`].
///
/// A location is mandatory. The name falls back to `fallback_name` and the id
/// to `fallback_id`; the address falls back to the vicinity, then to empty.
pub fn normalize_place(raw: RawPlace, fallback_id: &str, fallback_name: &str) -> Option<Place> {
    let location = raw.location.filter(|loc| loc.is_valid())?;

    Some(Place {
        id: raw.place_id.unwrap_or_else(|| fallback_id.to_string()),
        name: raw
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| fallback_name.to_string()),
        formatted_address: raw.formatted_address.or(raw.vicinity).unwrap_or_default(),
        location,
        types: raw.types,
        rating: raw.rating,
        price_level: raw.price_level,
        user_ratings_total: raw.user_ratings_total,
    })
}

/// Result of a selection once its detail lookup has finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The latest selection resolved; `description` becomes the query.
    Resolved { place: Place, description: String },
    /// The latest selection could not be resolved; nothing changes.
    Failed { id: String },
    /// A newer selection was made while this one was in flight.
    Stale { id: String },
}

struct Pending {
    token: RequestToken,
    id: String,
    description: String,
    place: Option<Place>,
}

/// Fetches details for selected ids and normalizes them.
///
/// Failures are not retried; the user re-selects instead.
pub struct SelectionResolver {
    provider: Arc<dyn PlacesProvider>,
    latest: RequestToken,
    in_flight: FuturesUnordered<BoxFuture<'static, Pending>>,
}

impl SelectionResolver {
    pub fn new(provider: Arc<dyn PlacesProvider>) -> Self {
        Self {
            provider,
            latest: RequestToken::default(),
            in_flight: FuturesUnordered::new(),
        }
    }

    /// Look up and normalize a single place.
    pub async fn fetch(&self, id: &str, description: &str) -> Option<Place> {
        fetch_place(self.provider.as_ref(), id, description).await
    }

    /// Start resolving a selection; supersedes any selection still in flight.
    pub fn resolve(&mut self, id: &str, description: &str) -> RequestToken {
        self.latest = self.latest.next();

        let token = self.latest;
        let id = id.to_string();
        let description = description.to_string();
        let provider = Arc::clone(&self.provider);

        debug!("[SelectionResolver] Resolving {} ({:?}) as {}", id, description, token);
        self.in_flight.push(Box::pin(async move {
            let place = fetch_place(provider.as_ref(), &id, &description).await;
            Pending {
                token,
                id,
                description,
                place,
            }
        }));

        token
    }

    /// Wait for the next lookup to finish. `None` when nothing is in flight.
    pub async fn next_resolved(&mut self) -> Option<Resolution> {
        let pending = self.in_flight.next().await?;

        if pending.token != self.latest {
            debug!("[SelectionResolver] Ignoring superseded selection {}", pending.id);
            return Some(Resolution::Stale { id: pending.id });
        }

        Some(match pending.place {
            Some(place) => Resolution::Resolved {
                place,
                description: pending.description,
            },
            None => Resolution::Failed { id: pending.id },
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

async fn fetch_place(provider: &dyn PlacesProvider, id: &str, description: &str) -> Option<Place> {
    let result = provider.get_details(id, DETAIL_FIELDS).await;
    let raw = degrade(result, &format!("details {}", id))?;

    let place = normalize_place(raw, id, description);
    if place.is_none() {
        warn!("[SelectionResolver] Details for {} carry no usable location", id);
    }
    place
}
