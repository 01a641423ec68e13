//! REST client tests against a fake HTTP server.

use std::sync::Arc;
use std::time::Duration;

use fleet_core::VehicleStatus;
use fleet_sync::{FleetBackend, FleetConfig, HttpBackend, SyncEngine, SyncError};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(&server.uri(), Duration::from_secs(5)).expect("backend")
}

#[tokio::test]
async fn fetch_all_accepts_bare_and_enveloped_arrays() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "TRK-1", "status": "moving", "speed": 52 },
            { "vehicleNumber": "TRK-2", "status": "idle" },
            { "driverName": "no id" }
        ])))
        .mount(&server)
        .await;

    let vehicles = backend(&server).fetch_all().await.expect("fetch_all");
    assert_eq!(vehicles.len(), 2);
    assert_eq!(vehicles[0].status, VehicleStatus::EnRoute);
    assert_eq!(vehicles[1].id, "TRK-2");

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "TRK-9", "status": "delivered" }]
        })))
        .mount(&server)
        .await;

    let vehicles = backend(&server).fetch_all().await.expect("fetch_all");
    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles[0].status, VehicleStatus::Delivered);
}

#[tokio::test]
async fn fetch_by_status_uses_canonical_path_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/vehicles/status/en_route"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vehicles": [{ "id": "TRK-3", "status": "en_route" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vehicles = backend(&server)
        .fetch_by_status(&VehicleStatus::EnRoute)
        .await
        .expect("fetch_by_status");
    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles[0].id, "TRK-3");
}

#[tokio::test]
async fn fetch_by_id_handles_envelopes_and_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/vehicles/TRK-5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vehicle": {
                "id": "TRK-5",
                "driverName": "Ana",
                "currentLocation": { "lat": 40.7128, "lng": -74.006 }
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/vehicles/TRK-404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let b = backend(&server);
    let vehicle = b.fetch_by_id("TRK-5").await.expect("fetch").expect("found");
    assert_eq!(vehicle.driver_name, "Ana");
    assert_eq!(vehicle.location_text(), "40.712800, -74.006000");

    assert!(b.fetch_by_id("TRK-404").await.expect("fetch").is_none());
}

#[tokio::test]
async fn fetch_statistics_reads_aliases() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "totalVehicles": 25, "moving": 11, "averageSpeed": 0 }
        })))
        .mount(&server)
        .await;

    let patch = backend(&server).fetch_statistics().await.expect("statistics");
    assert_eq!(patch.total, Some(25));
    assert_eq!(patch.en_route, Some(11));
    assert_eq!(patch.average_speed, Some(0.0));
    assert_eq!(patch.idle, None);
}

#[tokio::test]
async fn server_errors_are_retryable_transport_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/vehicles"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = backend(&server).fetch_all().await.unwrap_err();
    assert!(
        matches!(&err, SyncError::HttpStatus { status: 503, .. }),
        "expected HTTP 503, got {err:?}"
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/statistics"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "total": 1 }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&server.uri(), Duration::from_millis(100)).expect("backend");
    let err = backend.fetch_statistics().await.unwrap_err();
    assert!(matches!(err, SyncError::RequestTimeout(_)), "got {err:?}");
}

#[tokio::test]
async fn engine_keeps_stale_fleet_when_backend_fails() {
    let server = MockServer::start().await;

    let fleet: Vec<_> = (0..10)
        .map(|i| json!({ "id": format!("TRK-{i}"), "status": "idle" }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(fleet)))
        .mount(&server)
        .await;

    let mut config = FleetConfig::default();
    config.api.base_url = server.uri();
    config.push.enabled = false;
    let engine = SyncEngine::spawn(config.clone(), Arc::new(HttpBackend::from_config(&config).unwrap()));

    engine.load_all().await.expect("first load");
    assert_eq!(engine.vehicles().len(), 10);

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/vehicles"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(engine.load_all().await.is_err());
    assert_eq!(engine.vehicles().len(), 10);
    assert!(engine.error().is_some());
    assert!(engine.phase().is_degraded());

    engine.shutdown().await;
}
