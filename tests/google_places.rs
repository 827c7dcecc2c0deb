//! Integration tests for `GooglePlacesClient` using wiremock HTTP mocks.

use place_heatmap::{
    degrade, CategoryFilter, GooglePlacesClient, LatLng, PlacesError, PlacesProvider, PlacesStatus,
    DETAIL_FIELDS,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> GooglePlacesClient {
    GooglePlacesClient::with_base_url("test-key", 5, base_url).expect("client construction should not fail")
}

#[tokio::test]
async fn autocomplete_returns_predictions() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "OK",
        "predictions": [
            {
                "place_id": "ChIJ-fort",
                "description": "Lahore Fort, Fort Road, Lahore, Pakistan",
                "structured_formatting": {
                    "main_text": "Lahore Fort",
                    "secondary_text": "Fort Road, Lahore, Pakistan"
                },
                "types": ["tourist_attraction", "point_of_interest"]
            },
            {
                "place_id": "ChIJ-lahore",
                "description": "Lahore, Pakistan",
                "structured_formatting": { "main_text": "Lahore" },
                "types": ["locality"]
            }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/place/autocomplete/json"))
        .and(query_param("input", "lahore"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let reply = client.predict_text("lahore", None).await.expect("should parse predictions");

    assert_eq!(reply.status, PlacesStatus::Ok);
    assert_eq!(reply.data.len(), 2);
    assert_eq!(reply.data[0].id, "ChIJ-fort");
    assert_eq!(reply.data[0].primary_text, "Lahore Fort");
    assert_eq!(reply.data[0].description, "Lahore Fort, Fort Road, Lahore, Pakistan");
    assert_eq!(reply.data[1].secondary_text, "");
}

#[tokio::test]
async fn autocomplete_sends_category_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/place/autocomplete/json"))
        .and(query_param("types", "university|school"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ZERO_RESULTS",
            "predictions": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let filter = CategoryFilter::new(["university", "school"]);
    let reply = client.predict_text("uni", Some(&filter)).await.expect("should parse");

    assert_eq!(reply.status, PlacesStatus::ZeroResults);
    assert!(reply.data.is_empty());
}

#[tokio::test]
async fn details_parse_geometry() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "OK",
        "result": {
            "place_id": "ChIJ-fort",
            "name": "Lahore Fort",
            "formatted_address": "Fort Road, Walled City of Lahore, Lahore, Pakistan",
            "geometry": { "location": { "lat": 31.5880, "lng": 74.3155 } },
            "types": ["tourist_attraction"],
            "rating": 4.6,
            "user_ratings_total": 51234
        }
    });

    Mock::given(method("GET"))
        .and(path("/place/details/json"))
        .and(query_param("place_id", "ChIJ-fort"))
        .and(query_param("fields", DETAIL_FIELDS.join(",").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let reply = client.get_details("ChIJ-fort", DETAIL_FIELDS).await.expect("should parse details");

    let place = reply.data.expect("result present");
    assert_eq!(place.name.as_deref(), Some("Lahore Fort"));
    assert_eq!(place.location, Some(LatLng::new(31.5880, 74.3155)));
    assert_eq!(place.user_ratings_total, Some(51234));
    assert_eq!(place.price_level, None);
}

#[tokio::test]
async fn nearby_search_sends_location_radius_and_type() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "OK",
        "results": [
            {
                "place_id": "r1",
                "name": "Cafe Aylanto",
                "vicinity": "MM Alam Road, Lahore",
                "geometry": { "location": { "lat": 31.5126, "lng": 74.3508 } },
                "rating": 4.5,
                "user_ratings_total": 3400,
                "price_level": 3
            },
            {
                "place_id": "r2",
                "name": "No Geometry Diner"
            }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/place/nearbysearch/json"))
        .and(query_param("location", "31.5204,74.3587"))
        .and(query_param("radius", "5000"))
        .and(query_param("type", "restaurant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let filter = CategoryFilter::single("restaurant");
    let reply = client
        .search_nearby(LatLng::new(31.5204, 74.3587), 5000, Some(&filter))
        .await
        .expect("should parse nearby results");

    assert_eq!(reply.data.len(), 2);
    assert_eq!(reply.data[0].vicinity.as_deref(), Some("MM Alam Road, Lahore"));
    assert_eq!(reply.data[0].price_level, Some(3));
    assert!(reply.data[1].location.is_none());
}

#[tokio::test]
async fn provider_status_is_passed_through() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/place/nearbysearch/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OVER_QUERY_LIMIT",
            "error_message": "You have exceeded your daily request quota for this API.",
            "results": []
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client.search_nearby(LatLng::new(0.0, 0.0), 100, None).await;

    let reply = result.as_ref().expect("status is not a transport error");
    assert_eq!(reply.status, PlacesStatus::OverQueryLimit);
    assert!(degrade(result, "test").is_empty());
}

#[tokio::test]
async fn http_error_surfaces_as_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client.predict_text("lahore", None).await;

    assert!(matches!(result, Err(PlacesError::Http(_))), "got {:?}", result.map(|r| r.status));
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/place/details/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client.get_details("anything", DETAIL_FIELDS).await;

    assert!(
        matches!(result, Err(PlacesError::Deserialize { ref context, .. }) if context == "details"),
        "got {:?}",
        result.map(|r| r.status)
    );
}
