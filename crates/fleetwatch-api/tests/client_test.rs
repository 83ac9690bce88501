#![allow(clippy::unwrap_used)]
// Integration tests for `FleetClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleetwatch_api::{Error, FleetClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FleetClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = FleetClient::new(base_url, &TransportConfig::default()).unwrap();
    (server, client)
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_open_session_sets_cookie() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/session"))
        .and(query_param("token", "s3cret"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "JSESSIONID=abc123; Path=/")
                .set_body_json(json!({"id": 7, "name": "dispatch", "administrator": true})),
        )
        .mount(&server)
        .await;

    let token = SecretString::from("s3cret".to_string());
    let user = client.open_session(&token).await.unwrap();

    assert_eq!(user.id, 7);
    assert!(user.administrator);
    assert_eq!(client.cookie_header().as_deref(), Some("JSESSIONID=abc123"));
}

#[tokio::test]
async fn test_open_session_rejected_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let token = SecretString::from("wrong".to_string());
    let result = client.open_session(&token).await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_current_session_expired() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.current_session().await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired));
    assert!(err.is_auth_expired());
}

#[tokio::test]
async fn test_close_session() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.close_session().await.unwrap();
}

// ── Snapshot tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 1,
                "name": "Truck 1",
                "uniqueId": "861234",
                "status": "online",
                "lastUpdate": "2026-03-01T10:00:00Z",
                "category": "truck",
                "groupId": 4,
                "disabled": false,
                "attributes": {"plate": "AB-123"}
            },
            {
                "id": "broken"
            },
            {
                "name": "no id yet"
            }
        ])))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();

    // The element with a mistyped id is dropped; the one without an id is
    // kept for the core to reject.
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name.as_deref(), Some("Truck 1"));
    assert_eq!(devices[0].unique_id.as_deref(), Some("861234"));
    assert_eq!(devices[0].group_id, Some(4));
    assert_eq!(devices[1].id, None);
}

#[tokio::test]
async fn test_list_positions() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/positions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 100,
            "deviceId": 1,
            "deviceTime": "2026-03-01T10:05:00Z",
            "fixTime": "2026-03-01T10:05:00Z",
            "latitude": 48.85,
            "longitude": 2.35,
            "speed": 0.0,
            "course": 180.0,
            "attributes": {"batteryLevel": 55}
        }])))
        .mount(&server)
        .await;

    let positions = client.list_positions().await.unwrap();

    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].device_id, Some(1));
    assert_eq!(positions[0].latitude, Some(48.85));
}

#[tokio::test]
async fn test_snapshot_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert!(
        matches!(err, Error::Http { status: 502, ref body } if body == "bad gateway"),
        "unexpected error: {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_snapshot_invalid_json() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/positions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = client.list_positions().await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }));
}
