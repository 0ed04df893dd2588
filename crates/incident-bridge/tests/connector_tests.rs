//! Connector behavior against a mock alert/incident API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use incident_bridge::{
    Alert, Connector, ConnectorConfig, ConnectorError, ConnectorEvent, NoopObserver, Operation,
    RecordingObserver, RetryConfig,
};

const API_KEY: &str = "test-api-key";

fn config(server: &MockServer) -> ConnectorConfig {
    ConnectorConfig::new(API_KEY, &server.uri()).unwrap()
}

fn connector(server: &MockServer) -> Connector {
    Connector::new(config(server)).unwrap()
}

fn recorded(server: &MockServer) -> (Connector, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let connector = Connector::with_observer(config(server), observer.clone()).unwrap();
    (connector, observer)
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
    }
}

fn critical_alert() -> Alert {
    serde_json::from_value(json!({
        "id": "al-1",
        "title": "Ransomware beacon",
        "severity": "critical",
        "source": "edr",
        "description": "Known C2 domain contacted from fin-ws-12"
    }))
    .unwrap()
}

async fn request_bodies(server: &MockServer, http_method: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == http_method)
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

// =============================================================================
// get_alerts
// =============================================================================

#[tokio::test]
async fn test_get_alerts_sends_window_and_auth() {
    let server = MockServer::start().await;
    let alerts = json!([
        {"title": "A", "severity": "critical", "source": "ids", "description": "a", "id": 1},
        {"title": "B", "severity": "low", "source": "waf", "description": "b", "tags": ["x"]},
        {"title": "C", "severity": "medium", "source": "edr", "description": "c"}
    ]);

    Mock::given(method("GET"))
        .and(path("/api/v1/alerts"))
        .and(query_param("start_time", "2024-01-01T00:00:00Z"))
        .and(query_param("end_time", "2024-01-02T00:00:00Z"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&alerts))
        .expect(1)
        .mount(&server)
        .await;

    let (connector, observer) = recorded(&server);
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

    let fetched = connector.get_alerts(start, end).await.unwrap();

    assert_eq!(fetched.len(), 3);
    assert_eq!(serde_json::to_value(&fetched).unwrap(), alerts);
    assert_eq!(
        observer.events(),
        vec![ConnectorEvent::AlertsFetched { count: 3 }]
    );
}

#[tokio::test]
async fn test_get_alerts_forwards_reversed_window() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/alerts"))
        .and(query_param("start_time", "2024-01-02T00:00:00Z"))
        .and(query_param("end_time", "2024-01-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let fetched = connector(&server).get_alerts(start, end).await.unwrap();
    assert!(fetched.is_empty());
}

#[tokio::test]
async fn test_get_alerts_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/alerts"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let (connector, observer) = recorded(&server);
    let err = connector
        .get_alerts(Utc::now(), Utc::now())
        .await
        .unwrap_err();

    let remote = err.as_remote().expect("remote error");
    assert_eq!(remote.operation, Operation::GetAlerts);
    assert_eq!(remote.status_code(), Some(500));
    assert!(err.to_string().contains("database unavailable"));

    match observer.events().as_slice() {
        [ConnectorEvent::RequestFailed {
            operation, status, ..
        }] => {
            assert_eq!(*operation, Operation::GetAlerts);
            assert_eq!(*status, Some(500));
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[tokio::test]
async fn test_get_alerts_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"alerts": []})))
        .mount(&server)
        .await;

    let err = connector(&server)
        .get_alerts(Utc::now(), Utc::now())
        .await
        .unwrap_err();

    let remote = err.as_remote().expect("remote error");
    assert_eq!(remote.status_code(), Some(200));
    assert!(!remote.is_retryable());
}

#[tokio::test]
async fn test_get_alerts_returns_records_verbatim() {
    let server = MockServer::start().await;
    let alerts = json!([
        {"title": null, "severity": "critical", "source": "ids", "description": "d"},
        {"title": "B", "severity": "critical", "source": {"tool": "edr"}},
        {"title": ["x"], "severity": 5}
    ]);

    Mock::given(method("GET"))
        .and(path("/api/v1/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&alerts))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = connector(&server)
        .get_alerts(Utc::now(), Utc::now())
        .await
        .unwrap();

    assert_eq!(fetched.len(), 3);
    assert_eq!(fetched[0].get("title"), Some(&Value::Null));
    assert_eq!(fetched[1].source(), None);
    assert_eq!(fetched[2].severity_level(), None);
    assert_eq!(serde_json::to_value(&fetched).unwrap(), alerts);
}

#[tokio::test]
async fn test_get_alerts_retries_transient_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/alerts"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"title": "late"}])))
        .expect(1)
        .mount(&server)
        .await;

    let connector = Connector::new(config(&server).with_retry(fast_retry(3))).unwrap();
    let fetched = connector.get_alerts(Utc::now(), Utc::now()).await.unwrap();

    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].title(), Some("late"));
}

#[tokio::test]
async fn test_get_alerts_not_retried_by_default() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/alerts"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let result = connector(&server).get_alerts(Utc::now(), Utc::now()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_get_alerts_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/alerts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let config = config(&server).with_request_timeout(Some(Duration::from_millis(50)));
    let err = Connector::new(config)
        .unwrap()
        .get_alerts(Utc::now(), Utc::now())
        .await
        .unwrap_err();

    let remote = err.as_remote().expect("remote error");
    assert!(remote.is_timeout());
    assert_eq!(remote.status, None);
}

// =============================================================================
// create_incident
// =============================================================================

#[tokio::test]
async fn test_create_incident_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/incidents"))
        .and(header("authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"incident_id": "INC-100"})))
        .expect(1)
        .mount(&server)
        .await;

    let (connector, observer) = recorded(&server);
    let before = Utc::now();
    let incident_id = connector.create_incident(&critical_alert()).await.unwrap();
    let after = Utc::now();

    assert_eq!(incident_id.as_deref(), Some("INC-100"));

    let bodies = request_bodies(&server, "POST").await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["title"], "Ransomware beacon");
    assert_eq!(body["severity"], "critical");
    assert_eq!(body["source"], "edr");
    assert_eq!(body["description"], "Known C2 domain contacted from fin-ws-12");
    assert!(body.get("id").is_none(), "remote fields must not be forwarded");

    let created_at = body["created_at"]
        .as_str()
        .unwrap()
        .parse::<chrono::DateTime<Utc>>()
        .unwrap();
    assert!(created_at >= before - chrono::Duration::seconds(1));
    assert!(created_at <= after + chrono::Duration::seconds(1));

    assert_eq!(
        observer.events(),
        vec![ConnectorEvent::IncidentCreated {
            incident_id: Some("INC-100".to_string())
        }]
    );
}

#[tokio::test]
async fn test_create_incident_forwards_missing_fields_as_null() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/incidents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"incident_id": "INC-2"})))
        .mount(&server)
        .await;

    let alert: Alert = serde_json::from_value(json!({"title": "Only a title"})).unwrap();
    connector(&server).create_incident(&alert).await.unwrap();

    let body = &request_bodies(&server, "POST").await[0];
    assert_eq!(body["title"], "Only a title");
    assert_eq!(body["severity"], Value::Null);
    assert_eq!(body["source"], Value::Null);
    assert_eq!(body["description"], Value::Null);
    assert!(body["created_at"].is_string());
}

#[tokio::test]
async fn test_create_incident_forwards_non_string_fields() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/incidents"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"incident_id": "INC-3"})))
        .expect(1)
        .mount(&server)
        .await;

    let alert = Alert::from(json!({
        "title": "B",
        "severity": "critical",
        "source": {"tool": "edr"},
        "description": null
    }));
    connector(&server).create_incident(&alert).await.unwrap();

    let body = &request_bodies(&server, "POST").await[0];
    assert_eq!(body["title"], "B");
    assert_eq!(body["source"], json!({"tool": "edr"}));
    assert_eq!(body["description"], Value::Null);
}

#[tokio::test]
async fn test_create_incident_missing_id_is_not_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/incidents"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"status": "created"})))
        .mount(&server)
        .await;

    let (connector, observer) = recorded(&server);
    let incident_id = connector.create_incident(&critical_alert()).await.unwrap();

    assert_eq!(incident_id, None);
    assert_eq!(
        observer.events(),
        vec![ConnectorEvent::IncidentCreated { incident_id: None }]
    );
}

#[tokio::test]
async fn test_create_incident_is_not_deduplicated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/incidents"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"incident_id": "INC-1"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/incidents"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"incident_id": "INC-2"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let connector = connector(&server);
    let alert = critical_alert();

    let first = connector.create_incident(&alert).await.unwrap();
    let second = connector.create_incident(&alert).await.unwrap();

    // Same alert twice is expected to open two incidents
    assert_eq!(first.as_deref(), Some("INC-1"));
    assert_eq!(second.as_deref(), Some("INC-2"));
    assert_eq!(request_bodies(&server, "POST").await.len(), 2);
}

#[tokio::test]
async fn test_create_incident_error_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/incidents"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let connector = Connector::new(config(&server).with_retry(fast_retry(3))).unwrap();
    let err = connector
        .create_incident(&critical_alert())
        .await
        .unwrap_err();

    let remote = err.as_remote().expect("remote error");
    assert_eq!(remote.operation, Operation::CreateIncident);
    assert_eq!(remote.status_code(), Some(503));
}

#[tokio::test]
async fn test_create_incident_retried_on_connect_error() {
    let config = ConnectorConfig::new(API_KEY, "http://127.0.0.1:9")
        .unwrap()
        .with_retry(RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        });
    let observer = Arc::new(RecordingObserver::new());
    let connector = Connector::with_observer(config, observer.clone()).unwrap();

    let started = std::time::Instant::now();
    let err = connector
        .create_incident(&critical_alert())
        .await
        .unwrap_err();

    // Two backoff sleeps (50ms + 100ms) mean all three attempts were made
    assert!(started.elapsed() >= Duration::from_millis(150));
    let remote = err.as_remote().expect("remote error");
    assert_eq!(remote.operation, Operation::CreateIncident);
    assert!(remote.is_connect());
    assert_eq!(observer.events().len(), 1);
}

// =============================================================================
// update_incident_status
// =============================================================================

#[tokio::test]
async fn test_update_status_addresses_created_incident() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/incidents"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"incident_id": "INC-77"})))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/incidents/INC-77/status"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(body_json(json!({"status": "in_progress"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (connector, observer) = recorded(&server);
    let incident_id = connector
        .create_incident(&critical_alert())
        .await
        .unwrap()
        .unwrap();
    let updated = connector
        .update_incident_status(&incident_id, "in_progress")
        .await
        .unwrap();

    assert!(updated);
    assert_eq!(
        observer.events().last(),
        Some(&ConnectorEvent::IncidentStatusUpdated {
            incident_id: "INC-77".to_string(),
            status: "in_progress".to_string(),
        })
    );
}

#[tokio::test]
async fn test_update_status_accepts_free_form_status() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/incidents/42/status"))
        .and(body_json(json!({"status": "waiting-on-vendor"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let connector = Connector::with_observer(config(&server), Arc::new(NoopObserver)).unwrap();
    let updated = connector
        .update_incident_status("42", "waiting-on-vendor")
        .await
        .unwrap();
    assert!(updated);
}

#[tokio::test]
async fn test_update_status_retries_transient_failures() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/incidents/INC-9/status"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/incidents/INC-9/status"))
        .and(body_json(json!({"status": "resolved"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let observer = Arc::new(RecordingObserver::new());
    let connector =
        Connector::with_observer(config(&server).with_retry(fast_retry(3)), observer.clone())
            .unwrap();
    let updated = connector
        .update_incident_status("INC-9", "resolved")
        .await
        .unwrap();

    assert!(updated);
    assert_eq!(
        observer.events(),
        vec![ConnectorEvent::IncidentStatusUpdated {
            incident_id: "INC-9".to_string(),
            status: "resolved".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_update_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/incidents/INC-404/status"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such incident"))
        .expect(1)
        .mount(&server)
        .await;

    let err = connector(&server)
        .update_incident_status("INC-404", "resolved")
        .await
        .unwrap_err();

    let remote = err.as_remote().expect("remote error");
    assert_eq!(remote.operation, Operation::UpdateIncidentStatus);
    assert_eq!(remote.status_code(), Some(404));
}

#[tokio::test]
async fn test_update_status_rejects_empty_id() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (connector, observer) = recorded(&server);
    let err = connector
        .update_incident_status("", "in_progress")
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectorError::InvalidArgument(_)));
    assert_eq!(
        observer.events(),
        vec![ConnectorEvent::RequestFailed {
            operation: Operation::UpdateIncidentStatus,
            status: None,
            error: err.to_string(),
        }]
    );
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_invalid_api_key_header_rejected() {
    let config = ConnectorConfig::new("bad\nkey", "https://siem.example.com").unwrap();
    let err = Connector::new(config).unwrap_err();
    assert!(matches!(err, ConnectorError::Config(_)));
}

#[tokio::test]
async fn test_connection_refused_is_remote_error() {
    // Nothing listens on the discard port
    let config = ConnectorConfig::new(API_KEY, "http://127.0.0.1:9").unwrap();
    let err = Connector::new(config)
        .unwrap()
        .get_alerts(Utc::now(), Utc::now())
        .await
        .unwrap_err();

    let remote = err.as_remote().expect("remote error");
    assert!(remote.is_connect());
    assert_eq!(remote.status, None);
}
