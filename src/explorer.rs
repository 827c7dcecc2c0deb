//! The coordinator: one task that owns every piece of UI-visible state.
//!
//! [`Explorer::run`] multiplexes UI events, the debounced query, in-flight
//! autocomplete and detail requests, map session results and the blur grace
//! timer with a single `tokio::select!`. Each event is applied to completion
//! before the next one is looked at, so no state is ever shared or locked.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::autocomplete::{RequestSequencer, ResponseOutcome, SearchConfig};
use crate::config::ExplorerConfig;
use crate::debounce::Debouncer;
use crate::heatmap::{default_categories, HeatmapEngine, WeightedPoint};
use crate::map_session::{MapSession, MapUpdate, NearbyPlace};
use crate::provider::{CategoryFilter, PlacesProvider};
use crate::resolver::{Resolution, SelectionResolver};
use crate::suggestions::{
    default_quick_actions, Activation, ListState, QuickActionEffect, SuggestionItem, SuggestionList,
};
use crate::{LatLng, Place};

/// Renderer boundary.
///
/// Called from the coordinator task only. Implementations forward to whatever
/// actually draws the map and the search box.
pub trait MapSurface: Send {
    fn center_changed(&mut self, center: LatLng);

    fn marker_changed(&mut self, place: Option<&Place>);

    /// The full replacement point set.
    fn heatmap_changed(&mut self, points: &[WeightedPoint]);

    fn nearby_changed(&mut self, _nearby: &[NearbyPlace]) {}

    fn search_changed(&mut self, snapshot: &SearchSnapshot);

    /// The user asked for their device location; answer with
    /// [`UiEvent::UseMyLocation`] once it resolves.
    fn location_requested(&mut self) {}

    /// Center of the visible viewport, if the renderer tracks one.
    fn current_viewport_center(&self) -> Option<LatLng> {
        None
    }
}

/// What the search box should show.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSnapshot {
    pub query: String,
    pub state: ListState,
    pub items: Vec<SuggestionItem>,
    pub selected: Option<usize>,
    /// A prediction or detail request is outstanding
    pub loading: bool,
    pub filter: Option<CategoryFilter>,
}

/// Input from the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Input(String),
    Focus,
    Blur,
    Next,
    Previous,
    Activate,
    ActivateAt(usize),
    Escape,
    Clear,
    SelectCategory(Option<CategoryFilter>),
    /// A place picked outside the search box (e.g. from the nearby list)
    PlaceChosen(Place),
    /// Device location resolved after [`MapSurface::location_requested`]
    UseMyLocation(LatLng),
    /// Rebuild the heatmap around the current viewport
    RefreshHeatmap,
}

/// Search box plus map, driven by [`UiEvent`]s.
pub struct Explorer<S> {
    query: String,
    blur_grace: Duration,
    blur_deadline: Option<Instant>,
    debouncer: Debouncer<String>,
    settled: watch::Receiver<String>,
    sequencer: RequestSequencer,
    resolver: SelectionResolver,
    list: SuggestionList,
    map: MapSession,
    surface: S,
}

impl<S: MapSurface> Explorer<S> {
    pub fn new(provider: Arc<dyn PlacesProvider>, config: &ExplorerConfig, surface: S) -> Self {
        let search: &SearchConfig = &config.search;
        let debouncer = Debouncer::new(String::new(), Duration::from_millis(search.debounce_ms));
        let settled = debouncer.subscribe();
        let engine = HeatmapEngine::new(Arc::clone(&provider), default_categories(), &config.heatmap);

        Self {
            query: String::new(),
            blur_grace: Duration::from_millis(search.blur_grace_ms),
            blur_deadline: None,
            debouncer,
            settled,
            sequencer: RequestSequencer::new(Arc::clone(&provider), search),
            resolver: SelectionResolver::new(Arc::clone(&provider)),
            list: SuggestionList::new(default_quick_actions()),
            map: MapSession::new(engine, provider, config.map.clone()),
            surface,
        }
    }

    /// Build an explorer backed by the Google Places web service.
    ///
    /// # Errors
    ///
    /// Returns `PlacesError::MissingCredential` when no API key is configured,
    /// or `PlacesError::InvalidBaseUrl` for a malformed base URL. Both leave
    /// the feature unavailable for the whole session.
    #[cfg(feature = "http")]
    pub fn from_config(config: &ExplorerConfig, surface: S) -> Result<Self, crate::PlacesError> {
        let client = crate::http::GooglePlacesClient::new(&config.places)?;
        Ok(Self::new(Arc::new(client), config, surface))
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn map(&self) -> &MapSession {
        &self.map
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        SearchSnapshot {
            query: self.query.clone(),
            state: self.list.state(),
            items: self.list.items().to_vec(),
            selected: self.list.selected(),
            loading: self.sequencer.is_loading() || self.resolver.in_flight() > 0,
            filter: self.sequencer.filter().cloned(),
        }
    }

    /// Process events until the sender side closes, then hand back the surface.
    ///
    /// Requests still in flight at that point are dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<UiEvent>) -> S {
        info!("[Explorer] Starting at {:?}", self.map.center());
        self.map.start();
        self.surface.center_changed(self.map.center());
        self.publish_search();

        loop {
            let blur_at = self.blur_deadline;

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                changed = self.settled.changed() => {
                    if changed.is_ok() {
                        let query = self.settled.borrow_and_update().clone();
                        self.on_settled(&query);
                    }
                }
                Some(outcome) = self.sequencer.next_response() => self.on_predictions(outcome),
                Some(resolution) = self.resolver.next_resolved() => self.on_resolution(resolution),
                Some(update) = self.map.next_update() => self.on_map_update(update),
                _ = tokio::time::sleep_until(blur_at.unwrap_or_else(Instant::now)), if blur_at.is_some() => {
                    self.blur_deadline = None;
                    self.list.blur();
                    self.publish_search();
                }
            }
        }

        info!("[Explorer] Event stream closed");
        self.surface
    }

    /// Apply one UI event.
    pub fn handle_event(&mut self, event: UiEvent) {
        debug!("[Explorer] {:?}", event);
        match event {
            UiEvent::Input(text) => self.set_query(text),
            UiEvent::Clear => self.set_query(String::new()),
            UiEvent::Focus => {
                self.blur_deadline = None;
                self.list.focus();
            }
            UiEvent::Blur => {
                self.blur_deadline = Some(Instant::now() + self.blur_grace);
            }
            UiEvent::Escape => self.list.escape(),
            UiEvent::Next => self.list.next(),
            UiEvent::Previous => self.list.previous(),
            UiEvent::Activate => {
                if let Some(activation) = self.list.activate() {
                    self.on_activation(activation);
                }
            }
            UiEvent::ActivateAt(index) => {
                if let Some(activation) = self.list.activate_at(index) {
                    self.on_activation(activation);
                }
            }
            UiEvent::SelectCategory(filter) => {
                self.sequencer.set_filter(filter);
            }
            UiEvent::PlaceChosen(place) => self.select_place(place),
            UiEvent::UseMyLocation(location) => self.select_place(Place::current_location(location)),
            UiEvent::RefreshHeatmap => {
                let center = self
                    .surface
                    .current_viewport_center()
                    .unwrap_or_else(|| self.map.center());
                self.map.refresh(center);
                self.surface.center_changed(center);
            }
        }
        self.publish_search();
    }

    fn set_query(&mut self, text: String) {
        if text.is_empty() {
            self.sequencer.clear();
            self.list.set_predictions(&[]);
        }
        self.list.set_query(&text);
        self.debouncer.set(text.clone());
        self.query = text;

        // Back to the last settled value after a clear: the debouncer will not
        // publish it again, so re-issue it here
        if self.query == self.debouncer.get() && self.query != self.sequencer.query() {
            let query = self.query.clone();
            self.on_settled(&query);
        }
    }

    fn on_settled(&mut self, query: &str) {
        if self.sequencer.submit(query).is_none() {
            self.list.set_predictions(&[]);
        }
        self.publish_search();
    }

    fn on_predictions(&mut self, outcome: ResponseOutcome) {
        if let ResponseOutcome::Applied { .. } = outcome {
            self.list.set_predictions(self.sequencer.predictions());
            self.publish_search();
        }
    }

    fn on_activation(&mut self, activation: Activation) {
        match activation {
            Activation::QuickAction(action) => match action.effect {
                QuickActionEffect::UseMyLocation => self.surface.location_requested(),
                QuickActionEffect::SetQuery(text) => self.set_query(text),
            },
            Activation::Prediction(prediction) => {
                self.resolver.resolve(&prediction.id, &prediction.description);
            }
        }
    }

    fn on_resolution(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Resolved { place, description } => {
                self.set_query(description);
                self.list.close();
                self.select_place(place);
            }
            Resolution::Failed { id } => {
                info!("[Explorer] Could not resolve {}", id);
            }
            Resolution::Stale { .. } => return,
        }
        self.publish_search();
    }

    fn on_map_update(&mut self, update: MapUpdate) {
        match update {
            MapUpdate::HeatmapReady { .. } => {
                let heatmap = self.map.heatmap();
                self.surface.heatmap_changed(heatmap.points());
            }
            MapUpdate::NearbyReady { .. } => self.surface.nearby_changed(self.map.nearby()),
            MapUpdate::Discarded => {}
        }
    }

    fn select_place(&mut self, place: Place) {
        self.map.select_place(place);
        self.surface.center_changed(self.map.center());
        self.surface.marker_changed(self.map.marker());
        self.surface.nearby_changed(self.map.nearby());
    }

    fn publish_search(&mut self) {
        let snapshot = self.snapshot();
        self.surface.search_changed(&snapshot);
    }
}
