//! The validation call issues exactly one POST carrying the normalized payload.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{Value as JsonValue, json};

use lumberjack_console::api::{ApiError, ConsoleClient, DEFAULT_VALIDATION_PATH, Transport};
use lumberjack_console::datetime::{Clock, DateTimeContext};
use lumberjack_console::timerange::TimeRange;
use lumberjack_console::validation::{ValidationQuery, ValidationStatus};

#[derive(Clone, Default)]
struct RecordingTransport {
    calls: Arc<Mutex<Vec<(String, JsonValue)>>>,
    fail: bool,
}

impl RecordingTransport {
    fn calls(&self) -> Vec<(String, JsonValue)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_json(&self, path: &str, body: JsonValue) -> Result<JsonValue, ApiError> {
        self.calls.lock().unwrap().push((path.to_string(), body));
        if self.fail {
            return Err(ApiError::Status {
                url: path.to_string(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(json!({
            "success": true,
            "result": { "status": "OK", "explanations": [] }
        }))
    }
}

fn context() -> DateTimeContext {
    DateTimeContext::new("-06:00".parse().unwrap())
        .with_clock(Clock::Fixed(Utc.with_ymd_and_hms(2021, 1, 2, 0, 0, 0).unwrap()))
}

fn validation_input() -> ValidationQuery {
    ValidationQuery {
        query_string: "source:".to_string(),
        time_range: Some(TimeRange::relative_between(300, None)),
        streams: vec!["stream-id".to_string()],
        ..Default::default()
    }
}

fn request_payload() -> JsonValue {
    json!({
        "query": "source:",
        "timerange": { "type": "relative", "from": 300 },
        "streams": ["stream-id"],
        "parameters": [],
        "parameter_bindings": {},
    })
}

#[tokio::test]
async fn calls_validate_api() {
    let transport = RecordingTransport::default();
    let client = ConsoleClient::new(transport.clone(), context());

    let response = client.validate_query(&validation_input()).await.unwrap();

    assert!(response.success);
    assert_eq!(response.result.unwrap().status, ValidationStatus::Ok);
    assert_eq!(
        transport.calls(),
        vec![(DEFAULT_VALIDATION_PATH.to_string(), request_payload())]
    );
}

#[tokio::test]
async fn normalizes_absolute_time_ranges() {
    let transport = RecordingTransport::default();
    let client = ConsoleClient::new(transport.clone(), context());

    client
        .validate_query(&ValidationQuery {
            time_range: Some(TimeRange::absolute(
                "2021-01-01 16:00:00.000",
                "2021-01-01 17:00:00.000",
            )),
            ..validation_input()
        })
        .await
        .unwrap();

    let mut expected = request_payload();
    expected["timerange"] = json!({
        "type": "absolute",
        "from": "2021-01-01T22:00:00.000Z",
        "to": "2021-01-01T23:00:00.000Z",
    });

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, expected);
}

#[tokio::test]
async fn transport_failure_is_propagated_without_retry() {
    let transport = RecordingTransport {
        fail: true,
        ..Default::default()
    };
    let client = ConsoleClient::new(transport.clone(), context());

    let err = client.validate_query(&validation_input()).await.unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 503, .. }));
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn malformed_absolute_range_never_reaches_the_network() {
    let transport = RecordingTransport::default();
    let client = ConsoleClient::new(transport.clone(), context());

    let err = client
        .validate_query(&ValidationQuery {
            time_range: Some(TimeRange::absolute("01/01/2021 4pm", "2021-01-01 17:00:00.000")),
            ..validation_input()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Validation(_)));
    assert!(transport.calls().is_empty());
}
