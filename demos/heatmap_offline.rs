//! Build a heatmap for central Lahore from scripted provider data.
//!
//! Run with: cargo run --example heatmap_offline

use std::sync::Arc;
use std::time::Instant;

use place_heatmap::{
    default_categories, HeatmapConfig, HeatmapEngine, LatLng, PlacesStatus, RawPlace,
    StaticProvider,
};

fn place(id: &str, lat: f64, lng: f64, rating: Option<f64>, reviews: Option<u32>) -> RawPlace {
    RawPlace {
        place_id: Some(id.to_string()),
        name: Some(id.to_string()),
        location: Some(LatLng::new(lat, lng)),
        rating,
        user_ratings_total: reviews,
        ..RawPlace::default()
    }
}

#[tokio::main]
async fn main() {
    let center = LatLng::new(31.5204, 74.3587);

    let provider = StaticProvider::new()
        .with_nearby(
            "restaurant",
            vec![
                place("Cafe Aylanto", 31.5126, 74.3508, Some(4.5), Some(3400)),
                place("Haveli", 31.5866, 74.3107, Some(4.3), Some(9800)),
                place("Street stall", 31.5300, 74.3500, None, None),
            ],
        )
        .with_nearby(
            "university",
            vec![
                place("LUMS", 31.4707, 74.4088, Some(4.6), Some(2100)),
                place("Punjab University", 31.4952, 74.3006, Some(4.4), Some(6500)),
            ],
        )
        .with_nearby("hospital", vec![place("Services Hospital", 31.5381, 74.3370, Some(3.9), Some(800))])
        .with_nearby("bank", vec![place("Branch", 31.5210, 74.3590, Some(3.5), Some(40))])
        .with_nearby_status("gym", PlacesStatus::OverQueryLimit)
        .fail_nearby("pharmacy");

    let engine = HeatmapEngine::new(Arc::new(provider), default_categories(), &HeatmapConfig::default());

    println!("Heatmap for ({}, {})\n", center.lat, center.lng);

    let start = Instant::now();
    let dataset = engine.aggregate(center).await;
    println!("Aggregated in {:?}\n", start.elapsed());

    println!("{:<12} {:>8} {:>6} {:>8}", "category", "returned", "kept", "failed");
    for stat in dataset.stats() {
        println!("{:<12} {:>8} {:>6} {:>8}", stat.key, stat.returned, stat.kept, stat.failed);
    }

    println!("\nPoints:");
    for point in dataset.points() {
        println!(
            "  ({:.4}, {:.4})  weight {:.2}",
            point.location.lat, point.location.lng, point.weight
        );
    }

    if let Some(bounds) = dataset.bounds() {
        println!(
            "\nBounds: lat {:.4}..{:.4}, lng {:.4}..{:.4}",
            bounds.min_lat, bounds.max_lat, bounds.min_lng, bounds.max_lng
        );
    }

    for radius in [1_000.0, 5_000.0, 15_000.0] {
        println!(
            "Density within {:>6}m of center: {:.2}",
            radius,
            dataset.density_at(&center, radius)
        );
    }
}
