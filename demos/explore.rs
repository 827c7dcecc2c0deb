//! Drive an explorer session against the live Google Places API.
//!
//! Run with: GOOGLE_MAPS_API_KEY=... cargo run --example explore -- "badshahi mosque"

use std::time::Duration;

use place_heatmap::{
    load_config, Explorer, LatLng, ListState, MapSurface, NearbyPlace, Place, SearchSnapshot,
    SuggestionItem, UiEvent, WeightedPoint,
};
use tokio::sync::mpsc;
use tokio::time::sleep;

struct ConsoleSurface;

impl MapSurface for ConsoleSurface {
    fn center_changed(&mut self, center: LatLng) {
        println!("[map] center ({:.4}, {:.4})", center.lat, center.lng);
    }

    fn marker_changed(&mut self, place: Option<&Place>) {
        match place {
            Some(place) => println!("[map] marker {} - {}", place.name, place.formatted_address),
            None => println!("[map] marker cleared"),
        }
    }

    fn heatmap_changed(&mut self, points: &[WeightedPoint]) {
        let total: f64 = points.iter().map(|p| p.weight).sum();
        println!("[map] heatmap {} points, total weight {:.1}", points.len(), total);
    }

    fn nearby_changed(&mut self, nearby: &[NearbyPlace]) {
        for entry in nearby {
            println!(
                "[map] nearby {} ({:.0}m){}",
                entry.place.name,
                entry.distance_meters,
                entry
                    .place
                    .rating
                    .map(|r| format!(" rated {:.1}", r))
                    .unwrap_or_default()
            );
        }
    }

    fn search_changed(&mut self, snapshot: &SearchSnapshot) {
        if snapshot.state != ListState::ShowingPredictions {
            return;
        }
        println!("[search] {:?}", snapshot.query);
        for (i, item) in snapshot.items.iter().enumerate() {
            let marker = if snapshot.selected == Some(i) { ">" } else { " " };
            if let SuggestionItem::Prediction(p) = item {
                println!("  {} {}", marker, p.description);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let query = std::env::args().nth(1).unwrap_or_else(|| "badshahi mosque".to_string());

    let config = load_config()?;
    let explorer = match Explorer::from_config(&config, ConsoleSurface) {
        Ok(explorer) => explorer,
        Err(e) if e.is_fatal() => {
            eprintln!("Places search unavailable: {}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let (tx, rx) = mpsc::channel(16);
    let session = tokio::spawn(explorer.run(rx));

    tx.send(UiEvent::Focus).await?;
    // Type one character at a time, faster than the debounce delay
    let mut typed = String::new();
    for c in query.chars() {
        typed.push(c);
        tx.send(UiEvent::Input(typed.clone())).await?;
        sleep(Duration::from_millis(80)).await;
    }

    sleep(Duration::from_secs(2)).await;
    tx.send(UiEvent::Next).await?;
    tx.send(UiEvent::Activate).await?;

    // Ten spaced category queries plus the nearby search
    sleep(Duration::from_secs(5)).await;

    drop(tx);
    session.await?;
    Ok(())
}
