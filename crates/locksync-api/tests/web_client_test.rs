#![allow(clippy::unwrap_used)]
// Integration tests for `NukiWebClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use locksync_api::{Error, LockApi, NukiWebClient, SmartlockAction, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, NukiWebClient) {
    let server = MockServer::start().await;
    let token: SecretString = "test-token".to_string().into();
    let client =
        NukiWebClient::with_base_url(&server.uri(), &token, &TransportConfig::default()).unwrap();
    (server, client)
}

fn lock_json(id: i64, device_type: i32) -> serde_json::Value {
    json!({
        "smartlockId": id,
        "accountId": 42,
        "type": device_type,
        "name": "Front Door",
        "firmwareVersion": 132_618,
        "state": {
            "mode": 2,
            "state": 1,
            "trigger": 0,
            "lastAction": 2,
            "batteryCritical": false,
            "batteryCharging": false,
            "batteryCharge": 84,
            "keypadBatteryCritical": false,
            "doorState": 2
        },
        "updateDate": "2024-06-15T10:30:00.000Z"
    })
}

// ── Success paths ───────────────────────────────────────────────────

#[tokio::test]
async fn test_get_smartlocks_sends_bearer_header() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/smartlock"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("accept", "application/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([lock_json(1, 0), lock_json(2, 2)])),
        )
        .mount(&server)
        .await;

    let locks = client.get_smartlocks().await.unwrap();

    assert_eq!(locks.len(), 2);
    assert_eq!(locks[0].smartlock_id, 1);
    assert_eq!(locks[1].device_type, 2);
    assert_eq!(locks[0].name.as_deref(), Some("Front Door"));
}

#[tokio::test]
async fn test_get_smartlock_parses_state() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/smartlock/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lock_json(7, 4)))
        .mount(&server)
        .await;

    let lock = client.get_smartlock("abc").await.unwrap();
    let state = lock.state.unwrap();

    assert_eq!(lock.smartlock_id, 7);
    assert_eq!(state.battery_charge, Some(84));
    assert_eq!(state.door_state, Some(2));
    assert_eq!(state.battery_critical, Some(false));
}

#[tokio::test]
async fn test_send_action_posts_action_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/smartlock/abc/action"))
        .and(body_json(json!({ "action": 2, "option": 0 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .send_action("abc", &SmartlockAction::new(2))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_probe_succeeds_on_empty_list() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/smartlock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    client.probe().await.unwrap();
}

// ── Error classification ────────────────────────────────────────────

#[tokio::test]
async fn test_401_is_unauthorized_with_detail_message() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/smartlock/abc"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detailMessage": "Your access token is not authorized" })),
        )
        .mount(&server)
        .await;

    let result = client.get_smartlock("abc").await;

    assert_eq!(
        result.unwrap_err(),
        Error::Unauthorized {
            message: "Your access token is not authorized".into()
        }
    );
}

#[tokio::test]
async fn test_403_plain_body_is_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/smartlock"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let err = client.get_smartlocks().await.unwrap_err();

    assert!(err.is_unauthorized(), "expected Unauthorized, got: {err:?}");
    assert_eq!(err.message(), "Server returned status 403: Forbidden");
}

#[tokio::test]
async fn test_500_is_communication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/smartlock/abc"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client.get_smartlock("abc").await.unwrap_err();

    assert_eq!(
        err,
        Error::Communication {
            message: "Server returned status 500: upstream down".into()
        }
    );
}

#[tokio::test]
async fn test_empty_error_body_uses_reason_phrase() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/smartlock/abc/action"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client
        .send_action("abc", &SmartlockAction::new(1))
        .await
        .unwrap_err();

    assert_eq!(err.message(), "Server returned status 404: Not Found");
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/smartlock"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
        .mount(&server)
        .await;

    let err = client.get_smartlocks().await.unwrap_err();

    assert!(matches!(err, Error::Communication { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_malformed_body_is_communication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/smartlock/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client.get_smartlock("abc").await.unwrap_err();

    assert!(matches!(err, Error::Communication { .. }), "got: {err:?}");
    assert!(err.message().contains("maintenance"));
}

#[tokio::test]
async fn test_connection_refused_is_communication_error() {
    // Bind then drop a listener so the port is very likely closed.
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let token: SecretString = "test-token".to_string().into();
    let transport = TransportConfig {
        timeout: Duration::from_secs(2),
        ..TransportConfig::default()
    };
    let client = NukiWebClient::with_base_url(&uri, &token, &transport).unwrap();

    let err = client.get_smartlocks().await.unwrap_err();

    assert!(matches!(err, Error::Communication { .. }), "got: {err:?}");
    assert!(
        err.message()
            .starts_with("Exception when sending request - "),
        "got: {}",
        err.message()
    );
}

#[tokio::test]
async fn test_timeout_is_communication_error() {
    let server = MockServer::start().await;
    let token: SecretString = "test-token".to_string().into();
    let transport = TransportConfig {
        timeout: Duration::from_millis(200),
        ..TransportConfig::default()
    };
    let client = NukiWebClient::with_base_url(&server.uri(), &token, &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/smartlock"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = client.get_smartlocks().await.unwrap_err();

    assert!(err.message().contains("timeout"), "got: {}", err.message());
}

#[test]
fn test_invalid_token_characters_rejected_as_unauthorized() {
    let token: SecretString = "bad\ntoken".to_string().into();
    let err = NukiWebClient::new(&token, &TransportConfig::default()).unwrap_err();
    assert!(err.is_unauthorized());
}
