#![allow(clippy::unwrap_used)]
// Integration tests for `RestClient` using wiremock.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use yengou_api::wire::TripStatus;
use yengou_api::{Error, LoginRole, RestClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = RestClient::with_client(reqwest::Client::new(), base)
        .with_token(SecretString::from("tok-123"));
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_drivers_sends_bearer() {
    let (server, client) = setup().await;

    let body = json!([
        {
            "id": "drv-0001",
            "balance": 1500.0,
            "accountBanned": false,
            "user": { "id": "u1", "firstName": "Awa", "lastName": "Diop", "phoneNumber": "+221770000000" },
            "vehicles": [{ "id": "v1", "make": "Toyota", "model": "Corolla", "vehicleType": "SEDAN" }]
        },
        { "id": "drv-0002" }
    ]);

    Mock::given(method("GET"))
        .and(path("/api/driver-profiles"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let drivers = client.list_drivers().await.unwrap();

    assert_eq!(drivers.len(), 2);
    assert_eq!(drivers[0].id, "drv-0001");
    assert_eq!(
        drivers[0].user.as_ref().unwrap().display_name().as_deref(),
        Some("Awa Diop")
    );
    assert_eq!(drivers[0].vehicles[0].vehicle_type.as_deref(), Some("SEDAN"));
    assert!(drivers[1].user.is_none());
    assert!(drivers[1].vehicles.is_empty());
}

#[tokio::test]
async fn test_active_trips_query_and_places() {
    let (server, client) = setup().await;

    let body = json!([{
        "id": "T1",
        "status": "IN_TRANSIT",
        "driver": { "id": "drv-0001", "firstName": "Awa" },
        "service": {
            "id": "S1",
            "departureLatitude": 14.6928,
            "departureLongitude": -17.4467,
            "departureLocationName": "Plateau",
            "arrivalLatitude": 14.7167,
            "arrivalLongitude": -17.4677,
            "arrivalLocationName": "Almadies"
        }
    }]);

    Mock::given(method("GET"))
        .and(path("/api/trips"))
        .and(query_param("status.in", "ACCEPTED,IN_TRANSIT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let trips = client.active_trips().await.unwrap();

    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0].status, TripStatus::InTransit);
    let service = trips[0].service.as_ref().unwrap();
    let departure = service.departure().unwrap();
    assert_eq!(departure.name.as_deref(), Some("Plateau"));
    assert!((departure.point.latitude - 14.6928).abs() < f64::EPSILON);
    assert_eq!(service.arrival().unwrap().name.as_deref(), Some("Almadies"));
}

#[tokio::test]
async fn test_dashboard_stats() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/backoffice/dashboard/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalDrivers": 120,
            "totalClients": 3400,
            "servicesToday": 87,
            "revenueToday": 412500.0
        })))
        .mount(&server)
        .await;

    let stats = client.dashboard_stats().await.unwrap();
    assert_eq!(stats.total_drivers, 120);
    assert_eq!(stats.services_today, 87);
    assert_eq!(stats.total_services, 0);
}

#[tokio::test]
async fn test_admin_login_extracts_nested_user() {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = RestClient::with_client(reqwest::Client::new(), base);

    Mock::given(method("POST"))
        .and(path("/api/backoffice/auth/admin/login"))
        .and(body_json(json!({ "username": "ops", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "jwt-abc",
            "refreshToken": "jwt-refresh",
            "adminProfile": {
                "id": "adm-1",
                "user": { "id": "u9", "firstName": "Moussa", "authorities": ["ROLE_ADMIN"] }
            }
        })))
        .mount(&server)
        .await;

    let login = client
        .login("ops", &SecretString::from("hunter2"), LoginRole::Admin)
        .await
        .unwrap();

    assert_eq!(login.access_token.expose_secret(), "jwt-abc");
    let user = login.user.unwrap();
    assert_eq!(user.id, "u9");
    assert_eq!(user.authorities, vec!["ROLE_ADMIN".to_string()]);
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_rejected() {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = RestClient::with_client(reqwest::Client::new(), base);

    Mock::given(method("POST"))
        .and(path("/api/authenticate"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client
        .login("nobody", &SecretString::from("wrong"), LoginRole::User)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Authentication { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_expired_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/driver-profiles"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.list_drivers().await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired), "got {err:?}");
    assert!(err.is_auth_rejection());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/trips"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client.active_trips().await.unwrap_err();
    match &err {
        Error::Api { status, message } => {
            assert_eq!(*status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/backoffice/dashboard/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.system_alerts().await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert!(body.contains("oops")),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}
