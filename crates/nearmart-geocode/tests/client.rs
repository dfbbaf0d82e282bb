//! Integration tests for `NominatimClient` using wiremock HTTP mocks.

use std::sync::Arc;

use nearmart_core::{Coordinates, UNKNOWN_CITY};
use nearmart_discovery::ReverseGeocoder;
use nearmart_geocode::{GeocodeError, NominatimClient};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DELHI: Coordinates = Coordinates::new(28.7041, 77.1025);

fn test_client(base_url: &str, max_retries: u32) -> NominatimClient {
    NominatimClient::with_base_url(base_url, "nearmart-test/0.1", 5, max_retries)
        .expect("client construction should not fail")
        .with_backoff_base_ms(0)
}

fn delhi_body() -> serde_json::Value {
    serde_json::json!({
        "place_id": 123_456,
        "lat": "28.7041",
        "lon": "77.1025",
        "display_name": "Rohini, North West Delhi, Delhi, 110085, India",
        "address": {
            "suburb": "Rohini",
            "city": "Delhi",
            "state": "Delhi",
            "postcode": "110085",
            "country": "India",
            "country_code": "in"
        }
    })
}

#[tokio::test]
async fn reverse_returns_parsed_place() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("format", "json"))
        .and(query_param("lat", "28.7041"))
        .and(query_param("lon", "77.1025"))
        .and(query_param("zoom", "18"))
        .and(query_param("addressdetails", "1"))
        .and(header("user-agent", "nearmart-test/0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(delhi_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let place = client.reverse(DELHI).await.expect("should parse place");

    assert_eq!(place.address, "Rohini, North West Delhi, Delhi");
    assert_eq!(place.city, "Delhi");
    assert_eq!(place.state, "Delhi");
    assert_eq!(place.country, "India");
}

#[tokio::test]
async fn town_is_used_when_city_is_absent() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "display_name": "Kharkhoda, Sonipat, Haryana, India",
        "address": { "town": "Kharkhoda", "state": "Haryana", "country": "India" }
    });
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let place = test_client(&server.uri(), 0)
        .reverse(Coordinates::new(29.3089, 76.9133))
        .await
        .expect("should parse place");

    assert_eq!(place.city, "Kharkhoda");
    assert_eq!(place.address, "Kharkhoda, Sonipat, Haryana");
}

#[tokio::test]
async fn error_payload_maps_to_no_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "error": "Unable to geocode" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 2)
        .reverse(Coordinates::new(0.0, -30.0))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, GeocodeError::NoResult(msg) if msg == "Unable to geocode"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn transient_server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(delhi_body()))
        .expect(1)
        .mount(&server)
        .await;

    let place = test_client(&server.uri(), 2)
        .reverse(DELHI)
        .await
        .expect("second attempt should succeed");
    assert_eq!(place.city, "Delhi");
}

#[tokio::test]
async fn rate_limit_is_surfaced_after_retries_are_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 2)
        .reverse(DELHI)
        .await
        .unwrap_err();
    assert!(matches!(err, GeocodeError::RateLimited), "got {err:?}");
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 3)
        .reverse(DELHI)
        .await
        .unwrap_err();
    assert!(
        matches!(err, GeocodeError::UnexpectedStatus { status: 400, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 0)
        .reverse(DELHI)
        .await
        .unwrap_err();
    assert!(matches!(err, GeocodeError::Deserialize { .. }), "got {err:?}");
}

#[tokio::test]
async fn works_behind_the_reverse_geocoder_port() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "display_name": "Open field" })),
        )
        .mount(&server)
        .await;

    let geocoder: Arc<dyn ReverseGeocoder> = Arc::new(test_client(&server.uri(), 0));
    let place = geocoder
        .reverse_geocode(DELHI)
        .await
        .expect("port call should succeed");
    assert_eq!(place.address, "Open field");
    assert_eq!(place.city, UNKNOWN_CITY);

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let err = geocoder.reverse_geocode(DELHI).await.unwrap_err();
    assert!(err.to_string().contains("404"), "got {err}");
}
