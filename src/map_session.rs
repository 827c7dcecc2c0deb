//! Map session: center, marker, heatmap and nearby list for the current place.
//!
//! Every selection starts two requests: a heatmap aggregation around the new
//! center and a short proximity search for the "nearby" panel. Both are
//! tagged with the generation current at dispatch; a result whose generation
//! has since moved on is dropped instead of overwriting newer state. A
//! superseded aggregation also stops issuing category queries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info};

use crate::geo_utils::haversine_distance;
use crate::heatmap::{HeatmapDataset, HeatmapEngine};
use crate::provider::{degrade, CategoryFilter, PlacesProvider};
use crate::resolver::normalize_place;
use crate::{LatLng, Place};

/// Configuration for the map session
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Center used before anything is selected (default: Lahore)
    pub default_center: LatLng,
    /// Radius of the nearby search (default: 2000m)
    pub nearby_radius_meters: u32,
    /// Nearby places shown (default: 5)
    pub nearby_limit: usize,
    /// Place type of the nearby search (default: "establishment")
    pub nearby_type: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_center: LatLng::new(31.5204, 74.3587),
            nearby_radius_meters: 2000,
            nearby_limit: 5,
            nearby_type: "establishment".to_string(),
        }
    }
}

/// A place near the marker.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyPlace {
    pub place: Place,
    /// Great-circle distance from the marker
    pub distance_meters: f64,
}

/// What [`MapSession::next_update`] applied.
#[derive(Debug, Clone, PartialEq)]
pub enum MapUpdate {
    /// A new dataset replaced the previous one.
    HeatmapReady { center: LatLng, points: usize },
    /// The nearby list was replaced.
    NearbyReady { count: usize },
    /// A result for a superseded center or selection was dropped.
    Discarded,
}

enum Landed {
    /// `None` when the aggregation was abandoned
    Heatmap(Option<HeatmapDataset>),
    Nearby(Vec<NearbyPlace>),
}

struct Finished {
    generation: u64,
    landed: Landed,
}

/// Owns the visible map state and the requests that feed it.
pub struct MapSession {
    engine: HeatmapEngine,
    provider: Arc<dyn PlacesProvider>,
    config: MapConfig,
    center: LatLng,
    marker: Option<Place>,
    heatmap: Arc<HeatmapDataset>,
    nearby: Vec<NearbyPlace>,
    heatmap_generation: Arc<AtomicU64>,
    nearby_generation: u64,
    in_flight: FuturesUnordered<BoxFuture<'static, Finished>>,
}

impl MapSession {
    pub fn new(engine: HeatmapEngine, provider: Arc<dyn PlacesProvider>, config: MapConfig) -> Self {
        let center = config.default_center;
        Self {
            engine,
            provider,
            config,
            center,
            marker: None,
            heatmap: Arc::new(HeatmapDataset::empty(center)),
            nearby: Vec::new(),
            heatmap_generation: Arc::new(AtomicU64::new(0)),
            nearby_generation: 0,
            in_flight: FuturesUnordered::new(),
        }
    }

    /// Kick off the first aggregation around the default center.
    pub fn start(&mut self) {
        let center = self.config.default_center;
        self.center = center;
        self.spawn_heatmap(center);
    }

    /// Re-center on `place`, move the marker and request fresh data.
    ///
    /// The current heatmap stays visible until its replacement lands.
    pub fn select_place(&mut self, place: Place) {
        info!("[MapSession] Selected {} at {:?}", place.name, place.location);
        let center = place.location;
        self.center = center;
        self.marker = Some(place);
        self.nearby.clear();

        self.spawn_heatmap(center);
        self.spawn_nearby(center);
    }

    /// Re-aggregate around `center` without touching the marker.
    pub fn refresh(&mut self, center: LatLng) {
        self.center = center;
        self.spawn_heatmap(center);
    }

    /// Wait for the next in-flight request and apply it if still current.
    ///
    /// Returns `None` immediately when nothing is in flight.
    pub async fn next_update(&mut self) -> Option<MapUpdate> {
        let finished = self.in_flight.next().await?;

        Some(match finished.landed {
            Landed::Heatmap(Some(dataset))
                if finished.generation == self.heatmap_generation.load(Ordering::Acquire) =>
            {
                let update = MapUpdate::HeatmapReady {
                    center: dataset.center(),
                    points: dataset.len(),
                };
                self.heatmap = Arc::new(dataset);
                update
            }
            Landed::Nearby(nearby) if finished.generation == self.nearby_generation => {
                let update = MapUpdate::NearbyReady { count: nearby.len() };
                self.nearby = nearby;
                update
            }
            _ => {
                debug!("[MapSession] Dropping result of superseded request (generation {})", finished.generation);
                MapUpdate::Discarded
            }
        })
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn marker(&self) -> Option<&Place> {
        self.marker.as_ref()
    }

    /// The dataset currently on screen.
    pub fn heatmap(&self) -> Arc<HeatmapDataset> {
        Arc::clone(&self.heatmap)
    }

    pub fn nearby(&self) -> &[NearbyPlace] {
        &self.nearby
    }

    /// Summed heat within `radius_meters` of `location` in the current dataset.
    pub fn density_at(&self, location: &LatLng, radius_meters: f64) -> f64 {
        self.heatmap.density_at(location, radius_meters)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn spawn_heatmap(&mut self, center: LatLng) {
        let generation = self.heatmap_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let latest = Arc::clone(&self.heatmap_generation);
        let engine = self.engine.clone();

        self.in_flight.push(Box::pin(async move {
            let dataset = engine
                .aggregate_while(center, || latest.load(Ordering::Acquire) == generation)
                .await;
            Finished {
                generation,
                landed: Landed::Heatmap(dataset),
            }
        }));
    }

    fn spawn_nearby(&mut self, center: LatLng) {
        self.nearby_generation += 1;
        let generation = self.nearby_generation;
        let provider = Arc::clone(&self.provider);
        let radius = self.config.nearby_radius_meters;
        let limit = self.config.nearby_limit;
        let filter = CategoryFilter::single(self.config.nearby_type.as_str());

        self.in_flight.push(Box::pin(async move {
            let result = provider.search_nearby(center, radius, Some(&filter)).await;
            let nearby = degrade(result, "nearby places")
                .into_iter()
                .filter_map(|raw| {
                    let id = raw.place_id.clone().unwrap_or_default();
                    normalize_place(raw, &id, "")
                })
                .take(limit)
                .map(|place| NearbyPlace {
                    distance_meters: haversine_distance(&center, &place.location),
                    place,
                })
                .collect();
            Finished {
                generation,
                landed: Landed::Nearby(nearby),
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heatmap::{default_categories, CategorySpec, HeatmapConfig};
    use crate::provider::RawPlace;
    use crate::static_provider::StaticProvider;
    use std::time::Duration;
    use tokio::time::Instant;

    fn raw(id: &str, lat: f64, lng: f64) -> RawPlace {
        RawPlace {
            place_id: Some(id.to_string()),
            name: Some(id.to_uppercase()),
            vicinity: Some("Gulberg".into()),
            location: Some(LatLng::new(lat, lng)),
            rating: Some(4.0),
            ..RawPlace::default()
        }
    }

    fn session(provider: StaticProvider) -> (MapSession, Arc<StaticProvider>) {
        let provider = Arc::new(provider);
        let shared: Arc<dyn PlacesProvider> = provider.clone();
        let engine = HeatmapEngine::new(
            shared.clone(),
            vec![CategorySpec::new("dining", "restaurant", Some(0.2))],
            &HeatmapConfig::default(),
        );
        (MapSession::new(engine, shared, MapConfig::default()), provider)
    }

    async fn drain(session: &mut MapSession) -> Vec<MapUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = session.next_update().await {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn test_start_aggregates_default_center() {
        let (mut session, provider) = session(StaticProvider::new().with_nearby("restaurant", vec![raw("r1", 31.52, 74.35)]));
        session.start();

        let updates = drain(&mut session).await;
        assert_eq!(
            updates,
            [MapUpdate::HeatmapReady {
                center: MapConfig::default().default_center,
                points: 1
            }]
        );
        assert!(session.marker().is_none());
        assert_eq!(provider.nearby_calls()[0].radius_meters, 5000);
    }

    #[tokio::test]
    async fn test_select_place_recenters_and_fetches_nearby() {
        let provider = StaticProvider::new()
            .with_nearby("restaurant", vec![raw("r1", 31.56, 74.32)])
            .with_nearby(
                "establishment",
                (0..8u32).map(|i| raw(&format!("e{i}"), 31.55 + f64::from(i) * 0.001, 74.31)).collect(),
            );
        let (mut session, provider) = session(provider);
        let fort = Place::current_location(LatLng::new(31.5880, 74.3155));

        session.select_place(fort.clone());
        assert_eq!(session.center(), fort.location);
        assert_eq!(session.marker(), Some(&fort));

        drain(&mut session).await;
        assert_eq!(session.heatmap().len(), 1);
        assert_eq!(session.heatmap().center(), fort.location);

        let ids: Vec<_> = session.nearby().iter().map(|n| n.place.id.as_str()).collect();
        assert_eq!(ids, ["e0", "e1", "e2", "e3", "e4"]);
        assert!(session.nearby().iter().all(|n| n.distance_meters > 0.0));

        let nearby_call = provider
            .nearby_calls()
            .into_iter()
            .find(|c| c.filter == Some(CategoryFilter::single("establishment")))
            .unwrap();
        assert_eq!(nearby_call.radius_meters, 2000);
        assert_eq!(nearby_call.center, fort.location);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_selection_is_discarded() {
        let provider = StaticProvider::new()
            .with_nearby("restaurant", vec![raw("r1", 31.52, 74.35)])
            .with_nearby_delay("restaurant", Duration::from_millis(300));
        let (mut session, _) = session(provider);

        let first = Place::current_location(LatLng::new(31.0, 74.0));
        let second = Place::current_location(LatLng::new(32.0, 75.0));
        session.select_place(first);
        session.select_place(second.clone());

        let updates = drain(&mut session).await;
        let discarded = updates.iter().filter(|u| **u == MapUpdate::Discarded).count();
        assert_eq!(discarded, 2);
        assert_eq!(session.heatmap().center(), second.location);
        assert_eq!(session.center(), second.location);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_selections_keep_query_spacing() {
        let provider = Arc::new(StaticProvider::new());
        let shared: Arc<dyn PlacesProvider> = provider.clone();
        let config = HeatmapConfig::default();
        let engine = HeatmapEngine::new(shared.clone(), default_categories(), &config);
        let mut session = MapSession::new(engine, shared, MapConfig::default());

        // Let the first aggregation get three queries out
        session.select_place(Place::current_location(LatLng::new(31.0, 74.0)));
        let deadline = Instant::now() + Duration::from_millis(250);
        while let Ok(Some(_)) = tokio::time::timeout_at(deadline, session.next_update()).await {}

        let second = LatLng::new(32.0, 75.0);
        session.select_place(Place::current_location(second));
        drain(&mut session).await;

        let establishment = Some(CategoryFilter::single("establishment"));
        let category_calls: Vec<_> = provider
            .nearby_calls()
            .into_iter()
            .filter(|c| c.filter != establishment)
            .collect();

        for pair in category_calls.windows(2) {
            let gap = pair[1].at - pair[0].at;
            assert!(gap >= Duration::from_millis(config.inter_query_delay_ms), "queries {:?} apart", gap);
        }
        let superseded = category_calls.iter().filter(|c| c.center != second).count();
        assert_eq!(superseded, 3);
        assert_eq!(category_calls.len(), 13);
        assert_eq!(session.heatmap().center(), second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_heatmap_visible_until_replacement_lands() {
        let provider = StaticProvider::new()
            .with_nearby("restaurant", vec![raw("r1", 31.52, 74.35)])
            .with_nearby_delay("restaurant", Duration::from_millis(200));
        let (mut session, _) = session(provider);

        session.start();
        drain(&mut session).await;
        let before = session.heatmap();
        assert_eq!(before.len(), 1);

        session.refresh(LatLng::new(33.6844, 73.0479));
        assert!(Arc::ptr_eq(&before, &session.heatmap()));

        drain(&mut session).await;
        assert_eq!(session.heatmap().center(), LatLng::new(33.6844, 73.0479));
    }

    #[tokio::test]
    async fn test_refresh_keeps_marker_and_nearby() {
        let provider = StaticProvider::new().with_nearby("establishment", vec![raw("e0", 31.55, 74.31)]);
        let (mut session, _) = session(provider);
        let place = Place::current_location(LatLng::new(31.5, 74.3));

        session.select_place(place.clone());
        drain(&mut session).await;
        session.refresh(LatLng::new(31.6, 74.4));
        drain(&mut session).await;

        assert_eq!(session.marker(), Some(&place));
        assert_eq!(session.nearby().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_nearby_leaves_empty_list() {
        let provider = StaticProvider::new().fail_nearby("establishment");
        let (mut session, _) = session(provider);

        session.select_place(Place::current_location(LatLng::new(31.5, 74.3)));
        let updates = drain(&mut session).await;

        assert!(updates.contains(&MapUpdate::NearbyReady { count: 0 }));
        assert!(session.nearby().is_empty());
    }
}
