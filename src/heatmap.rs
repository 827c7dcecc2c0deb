//! Weighted activity heatmaps from categorized proximity searches.
//!
//! For a center coordinate the engine runs one proximity search per entry in
//! its category table, scores every returned place and collects the results
//! into a [`HeatmapDataset`]:
//! - Popular, well-reviewed places weigh more
//! - High-salience categories (dining, retail, universities, attractions) get a boost
//! - A category that fails contributes nothing and never sinks the others
//!
//! The dataset indexes its points in an R-tree so the renderer (or a tap
//! handler) can ask for local density without rescanning every point.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, info};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::error::PlacesError;
use crate::geo_utils::{bounds_around, compute_bounds, haversine_distance};
use crate::provider::{degrade, CategoryFilter, PlacesProvider, PlacesStatus, RawPlace, Reply};
use crate::rate_limit::DispatchLimiter;
use crate::{Bounds, LatLng};

/// Base weight every located place starts from.
const BASE_WEIGHT: f64 = 0.3;
/// Share of the weight carried by a perfect rating.
const RATING_WEIGHT: f64 = 0.4;
/// Share of the weight carried by review volume.
const REVIEWS_WEIGHT: f64 = 0.3;
/// Review count at which the volume share saturates.
const REVIEWS_SATURATION: f64 = 1000.0;
/// Boost for high-salience categories.
const SALIENCE_BOOST: f64 = 0.2;

/// Configuration for heatmap aggregation
#[derive(Debug, Clone)]
pub struct HeatmapConfig {
    /// Search radius around the center (default: 5000m)
    pub radius_meters: u32,
    /// Minimum spacing between query starts (default: 100ms)
    pub inter_query_delay_ms: u64,
    /// Queries allowed in flight at once (default: 1, sequential)
    pub max_concurrent_queries: usize,
    /// Points kept per category (default: 20)
    pub max_results_per_category: usize,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            radius_meters: 5000,
            inter_query_delay_ms: 100,
            max_concurrent_queries: 1,
            max_results_per_category: 20,
        }
    }
}

/// One row of the category table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpec {
    /// Stable key used in stats and logs
    pub key: String,
    /// Provider place type searched for
    pub place_type: String,
    /// Extra weight for high-salience categories
    pub boost: Option<f64>,
}

impl CategorySpec {
    pub fn new(key: impl Into<String>, place_type: impl Into<String>, boost: Option<f64>) -> Self {
        Self {
            key: key.into(),
            place_type: place_type.into(),
            boost,
        }
    }

    pub fn is_high_salience(&self) -> bool {
        self.boost.is_some()
    }
}

/// The stock ten-category table.
pub fn default_categories() -> Vec<CategorySpec> {
    let boosted = Some(SALIENCE_BOOST);
    vec![
        CategorySpec::new("dining", "restaurant", boosted),
        CategorySpec::new("retail", "shopping_mall", boosted),
        CategorySpec::new("university", "university", boosted),
        CategorySpec::new("healthcare", "hospital", None),
        CategorySpec::new("school", "school", None),
        CategorySpec::new("finance", "bank", None),
        CategorySpec::new("fuel", "gas_station", None),
        CategorySpec::new("pharmacy", "pharmacy", None),
        CategorySpec::new("fitness", "gym", None),
        CategorySpec::new("attractions", "tourist_attraction", boosted),
    ]
}

/// Activity weight of a place in `[0, 1]`.
///
/// `0.3 + (rating / 5) * 0.4 + min(reviews / 1000, 1) * 0.3 + boost`, where
/// each term only applies when its input is present, clamped to `[0, 1]`.
pub fn score_place(place: &RawPlace, category: &CategorySpec) -> f64 {
    let mut weight = BASE_WEIGHT;

    if let Some(rating) = place.rating {
        weight += (rating / 5.0) * RATING_WEIGHT;
    }
    if let Some(reviews) = place.user_ratings_total {
        weight += (f64::from(reviews) / REVIEWS_SATURATION).min(1.0) * REVIEWS_WEIGHT;
    }
    if let Some(boost) = category.boost {
        weight += boost;
    }

    weight.clamp(0.0, 1.0)
}

/// A heatmap sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedPoint {
    pub location: LatLng,
    pub weight: f64,
}

/// Per-category outcome of one aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub key: String,
    /// Places the provider returned
    pub returned: usize,
    /// Points that made it into the dataset
    pub kept: usize,
    /// True when the query errored or came back with a non-OK status
    pub failed: bool,
}

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// The weighted point set for one center. Replaced whole on every aggregation.
#[derive(Debug, Clone)]
pub struct HeatmapDataset {
    center: LatLng,
    points: Vec<WeightedPoint>,
    stats: Vec<CategoryStat>,
    index: RTree<IndexedPoint>,
}

impl HeatmapDataset {
    pub fn new(center: LatLng, points: Vec<WeightedPoint>, stats: Vec<CategoryStat>) -> Self {
        let indexed: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .map(|(idx, p)| IndexedPoint {
                idx,
                lat: p.location.lat,
                lng: p.location.lng,
            })
            .collect();

        Self {
            center,
            points,
            stats,
            index: RTree::bulk_load(indexed),
        }
    }

    /// A dataset with no points, used before the first aggregation lands.
    pub fn empty(center: LatLng) -> Self {
        Self::new(center, Vec::new(), Vec::new())
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    /// Points in category-table order, then provider order within a category.
    pub fn points(&self) -> &[WeightedPoint] {
        &self.points
    }

    pub fn stats(&self) -> &[CategoryStat] {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of categories whose query failed.
    pub fn failed_categories(&self) -> usize {
        self.stats.iter().filter(|s| s.failed).count()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        compute_bounds(self.points.iter().map(|p| &p.location))
    }

    /// Points within `radius_meters` of `location`.
    pub fn points_within(&self, location: &LatLng, radius_meters: f64) -> Vec<&WeightedPoint> {
        let envelope = bounds_around(location, radius_meters);
        let search = AABB::from_corners(
            [envelope.min_lat, envelope.min_lng],
            [envelope.max_lat, envelope.max_lng],
        );

        let mut hits: Vec<usize> = self
            .index
            .locate_in_envelope(&search)
            .map(|p| p.idx)
            .filter(|&idx| haversine_distance(location, &self.points[idx].location) <= radius_meters)
            .collect();
        hits.sort_unstable();

        hits.into_iter().map(|idx| &self.points[idx]).collect()
    }

    /// Summed weight within `radius_meters` of `location`.
    pub fn density_at(&self, location: &LatLng, radius_meters: f64) -> f64 {
        self.points_within(location, radius_meters)
            .iter()
            .map(|p| p.weight)
            .sum()
    }
}

/// Runs the per-category proximity searches and scores their results.
///
/// Cheap to clone; clones share the provider, the category table and one
/// dispatch schedule, so overlapping aggregations never start queries closer
/// together than `inter_query_delay_ms`.
#[derive(Clone)]
pub struct HeatmapEngine {
    provider: Arc<dyn PlacesProvider>,
    categories: Arc<[CategorySpec]>,
    limiter: Arc<DispatchLimiter>,
    config: HeatmapConfig,
}

impl HeatmapEngine {
    pub fn new(provider: Arc<dyn PlacesProvider>, categories: Vec<CategorySpec>, config: &HeatmapConfig) -> Self {
        Self {
            provider,
            categories: categories.into(),
            limiter: Arc::new(DispatchLimiter::new(Duration::from_millis(config.inter_query_delay_ms))),
            config: config.clone(),
        }
    }

    pub fn categories(&self) -> &[CategorySpec] {
        &self.categories
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    /// Build the dataset for `center`.
    ///
    /// Query starts are spaced by `inter_query_delay_ms`; at most
    /// `max_concurrent_queries` run at once. Output follows table order
    /// regardless of completion order.
    pub async fn aggregate(&self, center: LatLng) -> HeatmapDataset {
        self.aggregate_while(center, || true)
            .await
            .unwrap_or_else(|| HeatmapDataset::empty(center))
    }

    /// Like [`aggregate`](Self::aggregate), but gives up once `keep_going`
    /// returns `false`.
    ///
    /// `keep_going` is checked before each category query is scheduled and
    /// again when its dispatch slot comes up; abandoned categories never reach
    /// the provider. Queries already sent still run to completion. Returns
    /// `None` when the aggregation was abandoned.
    pub async fn aggregate_while<F>(&self, center: LatLng, keep_going: F) -> Option<HeatmapDataset>
    where
        F: Fn() -> bool + Send + Sync,
    {
        let start = tokio::time::Instant::now();
        let radius = self.config.radius_meters;
        let max_in_flight = self.config.max_concurrent_queries.max(1);
        let keep_going = &keep_going;

        let responses: Vec<(CategorySpec, Option<Result<Reply<Vec<RawPlace>>, PlacesError>>)> =
            stream::iter(self.categories.iter().cloned())
                .map(|category| {
                    let provider = Arc::clone(&self.provider);
                    let limiter = Arc::clone(&self.limiter);
                    async move {
                        if !keep_going() {
                            return (category, None);
                        }
                        let slot = limiter.wait_for_slot().await;
                        if !keep_going() {
                            debug!("[Heatmap] Skipping {} (slot {}), aggregation abandoned", category.place_type, slot);
                            return (category, None);
                        }
                        debug!("[Heatmap] Query {} for {}", slot, category.place_type);
                        let filter = CategoryFilter::single(category.place_type.as_str());
                        let result = provider.search_nearby(center, radius, Some(&filter)).await;
                        (category, Some(result))
                    }
                })
                .buffered(max_in_flight)
                .collect()
                .await;

        if responses.iter().any(|(_, result)| result.is_none()) {
            debug!("[Heatmap] Abandoned aggregation around {:?}", center);
            return None;
        }

        let mut points = Vec::new();
        let mut stats = Vec::with_capacity(responses.len());
        for (category, result) in responses.into_iter().filter_map(|(c, r)| r.map(|r| (c, r))) {
            let stat = self.collect_category(&category, result, &mut points);
            stats.push(stat);
        }

        let dataset = HeatmapDataset::new(center, points, stats);
        info!(
            "[Heatmap] Aggregated {} points from {} categories ({} failed) in {:?}",
            dataset.len(),
            self.categories.len(),
            dataset.failed_categories(),
            start.elapsed()
        );
        Some(dataset)
    }

    fn collect_category(
        &self,
        category: &CategorySpec,
        result: Result<Reply<Vec<RawPlace>>, PlacesError>,
        points: &mut Vec<WeightedPoint>,
    ) -> CategoryStat {
        let failed = match &result {
            Ok(reply) => !reply.status.is_ok() && reply.status != PlacesStatus::ZeroResults,
            Err(_) => true,
        };
        let places = degrade(result, &format!("nearby {}", category.place_type));
        let returned = places.len();

        let mut seen: Vec<&str> = Vec::new();
        let mut kept = 0;
        for place in &places {
            if kept >= self.config.max_results_per_category {
                break;
            }
            let Some(location) = place.location.filter(|loc| loc.is_valid()) else {
                continue;
            };
            if let Some(id) = place.place_id.as_deref() {
                if seen.contains(&id) {
                    continue;
                }
                seen.push(id);
            }

            points.push(WeightedPoint {
                location,
                weight: score_place(place, category),
            });
            kept += 1;
        }

        CategoryStat {
            key: category.key.clone(),
            returned,
            kept,
            failed,
        }
    }
}
