use courier_core::{LaPosteConfig, ProviderError, TrackingNumber, TrackingProvider};
use courier_integrations::LaPosteClient;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> LaPosteClient {
    let cfg = LaPosteConfig {
        endpoint: format!("{}/suivi/v2/", server.uri()),
        api_key: Some("test-key".to_string()),
        language: "en_GB".to_string(),
        timeout: Duration::from_secs(2),
    };
    LaPosteClient::new(&cfg).unwrap()
}

fn tn(raw: &str) -> TrackingNumber {
    TrackingNumber::new(raw).unwrap()
}

#[tokio::test]
async fn returns_first_event_label_and_sends_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/suivi/v2/idships/6A18342135896"))
        .and(query_param("lang", "en_GB"))
        .and(header("X-Okapi-Key", "test-key"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "shipment": {
                "event": [
                    {"label": "Your parcel has been delivered"},
                    {"label": "Your parcel is in transit"}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let label = client_for(&server).fetch(&tn("6A18342135896")).await.unwrap();
    assert_eq!(label, "Your parcel has been delivered");
}

#[tokio::test]
async fn not_found_answers_become_status_labels() {
    let cases = [
        (404, json!({"returnMessage": "Letter cannot be found"}), "Letter cannot be found"),
        (400, json!({"returnMessage": "Invalid tracking number"}), "Invalid tracking number"),
        (404, json!({"returnCode": 104}), "Unknown status"),
    ];
    for (status, body, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        let label = client_for(&server).fetch(&tn("X1")).await.unwrap();
        assert_eq!(label, expected, "status {status}");
    }
}

#[tokio::test]
async fn not_found_with_non_json_body_is_unknown_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<html>gone</html>"))
        .mount(&server)
        .await;
    let label = client_for(&server).fetch(&tn("X1")).await.unwrap();
    assert_eq!(label, "Unknown status");
}

#[tokio::test]
async fn unauthorized_is_reported_as_such() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"code": "UNAUTHORIZED"})))
        .mount(&server)
        .await;
    let err = client_for(&server).fetch(&tn("X1")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unauthorized), "{err:?}");
}

#[tokio::test]
async fn server_errors_and_malformed_payloads_are_unavailable() {
    let responses = [
        ResponseTemplate::new(500),
        ResponseTemplate::new(503).set_body_string("maintenance"),
        ResponseTemplate::new(200).set_body_string("not json"),
        ResponseTemplate::new(200).set_body_json(json!({"shipment": {"event": []}})),
        ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})),
    ];
    for response in responses {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(response)
            .mount(&server)
            .await;
        let err = client_for(&server).fetch(&tn("X1")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }), "{err:?}");
    }
}

#[tokio::test]
async fn slow_provider_times_out_as_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({"shipment": {"event": [{"label": "late"}]}})),
        )
        .mount(&server)
        .await;
    let err = client_for(&server).fetch(&tn("X1")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }), "{err:?}");
}

#[tokio::test]
async fn connection_refused_is_unavailable() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    drop(server);
    let err = client.fetch(&tn("X1")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }), "{err:?}");
}
