//! Scripted in-memory places provider.
//!
//! [`StaticProvider`] answers from tables filled in up front, with optional
//! per-request latency, non-OK statuses and hard failures. It records every
//! call it receives. Useful for demos and for exercising ordering behavior
//! without a network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::PlacesError;
use crate::provider::{CategoryFilter, PlacesProvider, PlacesStatus, Prediction, RawPlace, Reply};
use crate::LatLng;

#[derive(Debug, Clone)]
enum Outcome<T> {
    Reply(Reply<T>),
    Fail,
}

#[derive(Debug, Clone)]
struct Script<T> {
    outcome: Outcome<T>,
    delay: Duration,
}

impl<T: Default> Default for Script<T> {
    fn default() -> Self {
        Self {
            outcome: Outcome::Reply(Reply::with_status(PlacesStatus::ZeroResults)),
            delay: Duration::ZERO,
        }
    }
}

impl<T: Clone> Script<T> {
    async fn play(&self, what: &str) -> Result<Reply<T>, PlacesError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            Outcome::Reply(reply) => Ok(reply.clone()),
            Outcome::Fail => Err(PlacesError::Unavailable(format!("scripted failure for {}", what))),
        }
    }
}

/// A recorded proximity search.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyCall {
    pub center: LatLng,
    pub radius_meters: u32,
    pub filter: Option<CategoryFilter>,
    /// When the call reached the provider
    pub at: Instant,
}

#[derive(Debug, Default)]
struct CallLog {
    predictions: Vec<(String, Option<CategoryFilter>)>,
    details: Vec<String>,
    nearby: Vec<NearbyCall>,
}

/// In-memory [`PlacesProvider`].
///
/// Predictions are keyed by the exact query, details by id, proximity results
/// by the filter's joined type list (`""` for an unfiltered search). Anything
/// unscripted answers `ZERO_RESULTS`, or `NOT_FOUND` for details.
#[derive(Debug, Default)]
pub struct StaticProvider {
    predictions: HashMap<String, Script<Vec<Prediction>>>,
    details: HashMap<String, Script<Option<RawPlace>>>,
    nearby: HashMap<String, Script<Vec<RawPlace>>>,
    calls: Mutex<CallLog>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predictions(mut self, query: &str, predictions: Vec<Prediction>) -> Self {
        self.predictions.entry(query.to_string()).or_default().outcome =
            Outcome::Reply(Reply::ok(predictions));
        self
    }

    pub fn with_prediction_status(mut self, query: &str, status: PlacesStatus) -> Self {
        self.predictions.entry(query.to_string()).or_default().outcome =
            Outcome::Reply(Reply::with_status(status));
        self
    }

    pub fn with_prediction_delay(mut self, query: &str, delay: Duration) -> Self {
        self.predictions.entry(query.to_string()).or_default().delay = delay;
        self
    }

    pub fn fail_predictions(mut self, query: &str) -> Self {
        self.predictions.entry(query.to_string()).or_default().outcome = Outcome::Fail;
        self
    }

    pub fn with_details(mut self, id: &str, place: RawPlace) -> Self {
        self.details.entry(id.to_string()).or_default().outcome = Outcome::Reply(Reply::ok(Some(place)));
        self
    }

    pub fn with_details_delay(mut self, id: &str, delay: Duration) -> Self {
        self.details.entry(id.to_string()).or_default().delay = delay;
        self
    }

    pub fn fail_details(mut self, id: &str) -> Self {
        self.details.entry(id.to_string()).or_default().outcome = Outcome::Fail;
        self
    }

    /// Script the proximity results for a place type (`""` for unfiltered).
    pub fn with_nearby(mut self, place_type: &str, places: Vec<RawPlace>) -> Self {
        self.nearby.entry(place_type.to_string()).or_default().outcome = Outcome::Reply(Reply::ok(places));
        self
    }

    pub fn with_nearby_status(mut self, place_type: &str, status: PlacesStatus) -> Self {
        self.nearby.entry(place_type.to_string()).or_default().outcome =
            Outcome::Reply(Reply::with_status(status));
        self
    }

    pub fn with_nearby_delay(mut self, place_type: &str, delay: Duration) -> Self {
        self.nearby.entry(place_type.to_string()).or_default().delay = delay;
        self
    }

    pub fn fail_nearby(mut self, place_type: &str) -> Self {
        self.nearby.entry(place_type.to_string()).or_default().outcome = Outcome::Fail;
        self
    }

    pub fn prediction_calls(&self) -> usize {
        self.with_log(|log| log.predictions.len())
    }

    /// Queries received so far, in call order.
    pub fn prediction_queries(&self) -> Vec<String> {
        self.with_log(|log| log.predictions.iter().map(|(q, _)| q.clone()).collect())
    }

    pub fn prediction_filters(&self) -> Vec<Option<CategoryFilter>> {
        self.with_log(|log| log.predictions.iter().map(|(_, f)| f.clone()).collect())
    }

    pub fn details_calls(&self) -> Vec<String> {
        self.with_log(|log| log.details.clone())
    }

    pub fn nearby_calls(&self) -> Vec<NearbyCall> {
        self.with_log(|log| log.nearby.clone())
    }

    fn with_log<R>(&self, f: impl FnOnce(&mut CallLog) -> R) -> R {
        let mut log = self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut log)
    }
}

#[async_trait]
impl PlacesProvider for StaticProvider {
    async fn predict_text(
        &self,
        query: &str,
        filter: Option<&CategoryFilter>,
    ) -> Result<Reply<Vec<Prediction>>, PlacesError> {
        self.with_log(|log| log.predictions.push((query.to_string(), filter.cloned())));
        match self.predictions.get(query) {
            Some(script) => script.play(query).await,
            None => Ok(Reply::with_status(PlacesStatus::ZeroResults)),
        }
    }

    async fn get_details(
        &self,
        id: &str,
        _fields: &[&str],
    ) -> Result<Reply<Option<RawPlace>>, PlacesError> {
        self.with_log(|log| log.details.push(id.to_string()));
        match self.details.get(id) {
            Some(script) => script.play(id).await,
            None => Ok(Reply::with_status(PlacesStatus::NotFound)),
        }
    }

    async fn search_nearby(
        &self,
        center: LatLng,
        radius_meters: u32,
        filter: Option<&CategoryFilter>,
    ) -> Result<Reply<Vec<RawPlace>>, PlacesError> {
        self.with_log(|log| {
            log.nearby.push(NearbyCall {
                center,
                radius_meters,
                filter: filter.cloned(),
                at: Instant::now(),
            })
        });
        let key = filter.map(CategoryFilter::joined).unwrap_or_default();
        match self.nearby.get(&key) {
            Some(script) => script.play(&key).await,
            None => Ok(Reply::with_status(PlacesStatus::ZeroResults)),
        }
    }
}
