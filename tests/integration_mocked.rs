/// Integration tests with a mocked Conversions API.
/// Tests the outbound dispatch path without hitting the real service.
use lead_relay::meta_client::MetaClient;
use lead_relay::meta_models::{ConversionEvent, CustomData, EventPayload, UserData};
use lead_relay::models::LeadRecord;
use lead_relay::normalize;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PIXEL_ID: &str = "1234567890";

fn sample_payload() -> EventPayload {
    let record = LeadRecord {
        lead_id: Some("L1".to_string()),
        status: Some("Nuevo Lead".to_string()),
        email: Some("a@b.com".to_string()),
        conversion_at: Some("2025-06-01T10:00:00Z".to_string()),
        ..Default::default()
    };
    let event_id = normalize::generate_event_id("L1", "Nuevo Lead", Some("2025-06-01T10:00:00Z"));

    EventPayload {
        data: vec![ConversionEvent {
            event_name: "Lead".to_string(),
            event_time: normalize::to_unix_seconds(Some("2025-06-01T10:00:00Z")),
            event_id,
            action_source: "website".to_string(),
            user_data: UserData::from_lead(&record, "L1"),
            custom_data: CustomData::from_lead(&record, 5.0, "MXN"),
            event_source_url: None,
        }],
        access_token: "test_token".to_string(),
    }
}

#[tokio::test]
async fn test_successful_dispatch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{}/events", PIXEL_ID)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "events_received": 1 })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = MetaClient::new(mock_server.uri(), PIXEL_ID.to_string()).unwrap();
    let result = client.send_events(&sample_payload()).await;

    assert!(result.is_ok());
    let body = result.unwrap();
    assert_eq!(body.get("events_received").and_then(|v| v.as_i64()), Some(1));
}

#[tokio::test]
async fn test_outbound_body_carries_hashed_email_and_event_id() {
    let mock_server = MockServer::start().await;
    let payload = sample_payload();
    let event_id = payload.data[0].event_id.clone();

    Mock::given(method("POST"))
        .and(path(format!("/{}/events", PIXEL_ID)))
        .and(body_partial_json(serde_json::json!({
            "access_token": "test_token",
            "data": [{
                "event_name": "Lead",
                "event_id": event_id,
                "action_source": "website",
                "user_data": { "em": [normalize::sha256_hex("a@b.com")] },
                "custom_data": { "value": 5.0, "currency": "MXN", "content_type": "lead" }
            }]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "events_received": 1 })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = MetaClient::new(mock_server.uri(), PIXEL_ID.to_string()).unwrap();
    client.send_events(&payload).await.unwrap();
}

#[tokio::test]
async fn test_api_error_is_a_dispatch_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{}/events", PIXEL_ID)))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "message": "Invalid parameter" }
        })))
        .mount(&mock_server)
        .await;

    let client = MetaClient::new(mock_server.uri(), PIXEL_ID.to_string()).unwrap();
    let result = client.send_events(&sample_payload()).await;

    assert!(result.is_err());
    let msg = result.unwrap_err().to_string();
    assert!(msg.contains("400"), "unexpected error: {}", msg);
    assert!(msg.contains("Invalid parameter"), "unexpected error: {}", msg);
}

#[tokio::test]
async fn test_server_error_is_a_dispatch_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{}/events", PIXEL_ID)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = MetaClient::new(mock_server.uri(), PIXEL_ID.to_string()).unwrap();
    let result = client.send_events(&sample_payload()).await;

    assert!(result.is_err());
}
