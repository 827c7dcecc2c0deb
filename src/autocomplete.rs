//! Race-safe autocomplete requests.
//!
//! [`RequestSequencer`] turns settled queries into provider prediction
//! requests. The provider offers no cancellation, so overlapping requests are
//! all allowed to finish; each one carries the [`RequestToken`] minted for it
//! and only a response whose token is still the latest reaches the UI state.
//! Arrival order does not matter.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;

use crate::error::PlacesError;
use crate::provider::{degrade, CategoryFilter, PlacesProvider, Prediction, Reply};

/// Configuration for the search pipeline.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Quiet period before a query is sent (default: 300ms)
    pub debounce_ms: u64,
    /// Queries shorter than this never reach the provider (default: 2)
    pub min_query_chars: usize,
    /// Predictions kept from each response (default: 5)
    pub max_predictions: usize,
    /// Delay between blur and closing the list, so a pending click lands (default: 200ms)
    pub blur_grace_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            min_query_chars: 2,
            max_predictions: 5,
            blur_grace_ms: 200,
        }
    }
}

/// Monotonically increasing request marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happened to a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The response was the latest one and replaced the predictions.
    Applied {
        token: RequestToken,
        query: String,
        count: usize,
    },
    /// A newer request superseded this one; the response was dropped.
    Stale { token: RequestToken, query: String },
}

struct Completed {
    token: RequestToken,
    query: String,
    result: Result<Reply<Vec<Prediction>>, PlacesError>,
}

/// Issues prediction requests and filters their responses by token.
pub struct RequestSequencer {
    provider: Arc<dyn PlacesProvider>,
    min_query_chars: usize,
    max_predictions: usize,
    latest: RequestToken,
    query: String,
    filter: Option<CategoryFilter>,
    predictions: Vec<Prediction>,
    loading: bool,
    in_flight: FuturesUnordered<BoxFuture<'static, Completed>>,
}

impl RequestSequencer {
    pub fn new(provider: Arc<dyn PlacesProvider>, config: &SearchConfig) -> Self {
        Self {
            provider,
            min_query_chars: config.min_query_chars,
            max_predictions: config.max_predictions,
            latest: RequestToken::default(),
            query: String::new(),
            filter: None,
            predictions: Vec::new(),
            loading: false,
            in_flight: FuturesUnordered::new(),
        }
    }

    /// Handle a settled query.
    ///
    /// Always mints a token, so anything still in flight becomes stale. Returns
    /// the token when a provider request was issued, `None` when the query was
    /// too short and the predictions were cleared instead.
    pub fn submit(&mut self, query: &str) -> Option<RequestToken> {
        self.latest = self.latest.next();
        self.query = query.to_string();

        if query.chars().count() < self.min_query_chars {
            self.predictions.clear();
            self.loading = false;
            return None;
        }

        let token = self.latest;
        let query = self.query.clone();
        let filter = self.filter.clone();
        let provider = Arc::clone(&self.provider);

        debug!("[RequestSequencer] Issuing request {} for {:?}", token, query);
        self.loading = true;
        self.in_flight.push(Box::pin(async move {
            let result = provider.predict_text(&query, filter.as_ref()).await;
            Completed { token, query, result }
        }));

        Some(token)
    }

    /// Change the category filter and re-issue the current query.
    pub fn set_filter(&mut self, filter: Option<CategoryFilter>) -> Option<RequestToken> {
        self.filter = filter;
        if self.query.chars().count() < self.min_query_chars {
            return None;
        }
        let query = self.query.clone();
        self.submit(&query)
    }

    /// Invalidate everything in flight and empty the predictions.
    pub fn clear(&mut self) {
        self.submit("");
    }

    /// Wait for the next in-flight request to finish and apply it if current.
    ///
    /// Returns `None` immediately when nothing is in flight.
    pub async fn next_response(&mut self) -> Option<ResponseOutcome> {
        let completed = self.in_flight.next().await?;
        Some(self.apply(completed))
    }

    fn apply(&mut self, completed: Completed) -> ResponseOutcome {
        let Completed { token, query, result } = completed;

        if token != self.latest {
            debug!(
                "[RequestSequencer] Ignoring stale response {} for {:?} (latest {})",
                token, query, self.latest
            );
            return ResponseOutcome::Stale { token, query };
        }

        self.loading = false;
        let mut predictions = degrade(result, &format!("autocomplete {:?}", query));
        predictions.truncate(self.max_predictions);

        debug!(
            "[RequestSequencer] Request {} found {} results for {:?}",
            token,
            predictions.len(),
            query
        );

        let count = predictions.len();
        self.predictions = predictions;
        ResponseOutcome::Applied { token, query, count }
    }

    /// The query behind the current predictions (or the request in flight).
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn latest_token(&self) -> RequestToken {
        self.latest
    }

    pub fn filter(&self) -> Option<&CategoryFilter> {
        self.filter.as_ref()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::PlacesStatus;
    use crate::static_provider::StaticProvider;
    use std::time::Duration;

    fn predictions(prefix: &str, n: usize) -> Vec<Prediction> {
        (0..n)
            .map(|i| Prediction::new(format!("{prefix}-{i}"), format!("{prefix} {i}"), "Lahore"))
            .collect()
    }

    fn sequencer(provider: &Arc<StaticProvider>) -> RequestSequencer {
        let provider: Arc<dyn PlacesProvider> = provider.clone();
        RequestSequencer::new(provider, &SearchConfig::default())
    }

    #[tokio::test]
    async fn test_short_query_makes_no_call() {
        let provider = Arc::new(StaticProvider::new());
        let mut seq = sequencer(&provider);

        assert_eq!(seq.submit(""), None);
        assert_eq!(seq.submit("l"), None);

        assert!(seq.predictions().is_empty());
        assert!(!seq.is_loading());
        assert_eq!(seq.in_flight(), 0);
        assert_eq!(provider.prediction_calls(), 0);
        assert_eq!(seq.next_response().await, None);
    }

    #[tokio::test]
    async fn test_response_caps_predictions_in_provider_order() {
        let provider = Arc::new(StaticProvider::new().with_predictions("lahore", predictions("lhr", 8)));
        let mut seq = sequencer(&provider);

        let token = seq.submit("lahore").unwrap();
        assert!(seq.is_loading());

        let outcome = seq.next_response().await.unwrap();
        assert_eq!(
            outcome,
            ResponseOutcome::Applied {
                token,
                query: "lahore".into(),
                count: 5
            }
        );
        assert!(!seq.is_loading());
        let ids: Vec<_> = seq.predictions().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["lhr-0", "lhr-1", "lhr-2", "lhr-3", "lhr-4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_older_response_is_discarded() {
        let provider = Arc::new(
            StaticProvider::new()
                .with_predictions("la", predictions("la", 3))
                .with_prediction_delay("la", Duration::from_millis(500))
                .with_predictions("lahore", predictions("lahore", 2))
                .with_prediction_delay("lahore", Duration::from_millis(50)),
        );
        let mut seq = sequencer(&provider);

        let a = seq.submit("la").unwrap();
        let b = seq.submit("lahore").unwrap();
        assert!(b > a);

        // B resolves first and is applied
        let first = seq.next_response().await.unwrap();
        assert!(matches!(first, ResponseOutcome::Applied { token, .. } if token == b));

        // A resolves afterwards and must not overwrite B
        let second = seq.next_response().await.unwrap();
        assert_eq!(
            second,
            ResponseOutcome::Stale {
                token: a,
                query: "la".into()
            }
        );

        let ids: Vec<_> = seq.predictions().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["lahore-0", "lahore-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_response_arriving_first_is_still_stale() {
        let provider = Arc::new(
            StaticProvider::new()
                .with_predictions("la", predictions("la", 3))
                .with_prediction_delay("la", Duration::from_millis(10))
                .with_predictions("lahore", predictions("lahore", 2))
                .with_prediction_delay("lahore", Duration::from_millis(200)),
        );
        let mut seq = sequencer(&provider);

        seq.submit("la");
        seq.submit("lahore");

        assert!(matches!(seq.next_response().await, Some(ResponseOutcome::Stale { .. })));
        assert!(seq.predictions().is_empty());
        assert!(seq.is_loading());

        assert!(matches!(seq.next_response().await, Some(ResponseOutcome::Applied { count: 2, .. })));
        assert!(!seq.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shortening_query_invalidates_in_flight() {
        let provider = Arc::new(
            StaticProvider::new()
                .with_predictions("lahore", predictions("lahore", 2))
                .with_prediction_delay("lahore", Duration::from_millis(100)),
        );
        let mut seq = sequencer(&provider);

        seq.submit("lahore");
        seq.submit("l");

        assert!(matches!(seq.next_response().await, Some(ResponseOutcome::Stale { .. })));
        assert!(seq.predictions().is_empty());
        assert!(!seq.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_forgets_query() {
        let provider = Arc::new(
            StaticProvider::new()
                .with_predictions("lahore", predictions("lahore", 2))
                .with_prediction_delay("lahore", Duration::from_millis(100)),
        );
        let mut seq = sequencer(&provider);

        seq.submit("lahore");
        assert_eq!(seq.query(), "lahore");
        seq.clear();

        assert_eq!(seq.query(), "");
        assert!(matches!(seq.next_response().await, Some(ResponseOutcome::Stale { .. })));
        assert!(seq.predictions().is_empty());
    }

    #[tokio::test]
    async fn test_failed_or_non_ok_response_empties_predictions() {
        let provider = Arc::new(
            StaticProvider::new()
                .with_predictions("lahore", predictions("lahore", 2))
                .with_prediction_status("karachi", PlacesStatus::OverQueryLimit)
                .fail_predictions("quetta"),
        );
        let mut seq = sequencer(&provider);

        seq.submit("lahore");
        seq.next_response().await;
        assert_eq!(seq.predictions().len(), 2);

        seq.submit("karachi");
        assert!(matches!(seq.next_response().await, Some(ResponseOutcome::Applied { count: 0, .. })));
        assert!(seq.predictions().is_empty());

        seq.submit("quetta");
        assert!(matches!(seq.next_response().await, Some(ResponseOutcome::Applied { count: 0, .. })));
        assert!(!seq.is_loading());
    }

    #[tokio::test]
    async fn test_set_filter_reissues_current_query() {
        let provider = Arc::new(StaticProvider::new().with_predictions("uni", predictions("uni", 1)));
        let mut seq = sequencer(&provider);

        assert_eq!(seq.set_filter(Some(CategoryFilter::single("university"))), None);

        let first = seq.submit("uni").unwrap();
        let second = seq.set_filter(None).unwrap();
        assert!(second > first);

        // Provider calls happen when the requests are polled
        while seq.next_response().await.is_some() {}
        assert_eq!(provider.prediction_calls(), 2);

        let filters = provider.prediction_filters();
        assert!(filters.contains(&Some(CategoryFilter::single("university"))));
        assert!(filters.contains(&None));
    }
}
