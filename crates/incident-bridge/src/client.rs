//! REST client for the security tool's alert and incident API.

use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, Operation, RemoteRequestError, Result};
use crate::models::{
    format_timestamp, Alert, CreateIncidentResponse, IncidentPayload, StatusUpdate,
};
use crate::observer::{ConnectorEvent, ConnectorObserver, TracingObserver};
use crate::retry::with_retry_async;

const ALERTS_PATH: &[&str] = &["api", "v1", "alerts"];
const INCIDENTS_PATH: &[&str] = &["api", "v1", "incidents"];

/// Authenticated connector for alert retrieval and incident management.
///
/// Holds one HTTP session carrying the bearer token and JSON content type.
/// Each call is an independent request; the connector keeps no state
/// beyond its configuration.
#[derive(Clone)]
pub struct Connector {
    client: reqwest::Client,
    config: ConnectorConfig,
    observer: Arc<dyn ConnectorObserver>,
}

impl Connector {
    /// Create a connector that reports events to `tracing`.
    ///
    /// # Errors
    /// Returns [`ConnectorError::Config`] if the session cannot be built.
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a connector with a custom event observer.
    ///
    /// # Errors
    /// Returns [`ConnectorError::Config`] if the API key is not a valid
    /// header value or the HTTP client cannot be built.
    pub fn with_observer(
        config: ConnectorConfig,
        observer: Arc<dyn ConnectorObserver>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();

        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", config.api_key()))
            .map_err(|_| ConnectorError::Config("Invalid API key".to_string()))?;
        auth_value.set_sensitive(true);

        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| ConnectorError::Config(format!("Failed to build HTTP client: {e}")))?;

        debug!(base_url = %config.base_url(), "Connector initialized");

        Ok(Self {
            client,
            config,
            observer,
        })
    }

    /// The configuration this connector was built with.
    #[must_use]
    pub const fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Fetch alerts raised between `start` and `end`.
    ///
    /// The window is forwarded as-is; alerts are returned in the order the
    /// remote API sent them.
    ///
    /// # Errors
    /// Returns [`ConnectorError::Remote`] on transport failure, non-success
    /// status, or a body that is not a JSON array of alerts.
    #[instrument(skip_all, fields(start = %start, end = %end))]
    pub async fn get_alerts(
        &self,
        start: chrono::DateTime<Utc>,
        end: chrono::DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        let operation = Operation::GetAlerts;
        let mut url = self.config.endpoint(ALERTS_PATH)?;
        url.query_pairs_mut()
            .append_pair("start_time", &format_timestamp(&start))
            .append_pair("end_time", &format_timestamp(&end));

        let result = self
            .send_json::<(), Vec<Alert>>(operation, Method::GET, &url, None)
            .await;

        let alerts = self.report(operation, result)?;
        self.observer.on_event(&ConnectorEvent::AlertsFetched {
            count: alerts.len(),
        });
        Ok(alerts)
    }

    /// Open an incident for `alert`.
    ///
    /// Only `title`, `severity`, `source` and `description` are read and
    /// forwarded with whatever JSON value they hold. The payload is stamped
    /// with the current time as `created_at`. Every call creates a new
    /// incident.
    ///
    /// Returns the server-assigned id, or `None` if the response had none.
    ///
    /// # Errors
    /// Returns [`ConnectorError::Remote`] on transport failure, non-success
    /// status, or a body that is not JSON.
    #[instrument(skip(self, alert), fields(title = ?alert.title()))]
    pub async fn create_incident(&self, alert: &Alert) -> Result<Option<String>> {
        let operation = Operation::CreateIncident;
        let url = self.config.endpoint(INCIDENTS_PATH)?;
        let payload = IncidentPayload::from_alert(alert, Utc::now());

        let result = self
            .send_json::<_, CreateIncidentResponse>(operation, Method::POST, &url, Some(&payload))
            .await;

        let incident_id = self.report(operation, result)?.into_incident_id();
        self.observer.on_event(&ConnectorEvent::IncidentCreated {
            incident_id: incident_id.clone(),
        });
        Ok(incident_id)
    }

    /// Set the lifecycle status of an incident.
    ///
    /// `status` is not validated locally; the remote API decides which
    /// values it accepts.
    ///
    /// # Errors
    /// Returns [`ConnectorError::InvalidArgument`] for an empty id (reported
    /// to the observer like any other failure), or
    /// [`ConnectorError::Remote`] on transport failure or non-success status.
    #[instrument(skip(self))]
    pub async fn update_incident_status(&self, incident_id: &str, status: &str) -> Result<bool> {
        let operation = Operation::UpdateIncidentStatus;
        if incident_id.trim().is_empty() {
            let err = ConnectorError::InvalidArgument("incident id must not be empty".to_string());
            self.observer.on_event(&ConnectorEvent::RequestFailed {
                operation,
                status: None,
                error: err.to_string(),
            });
            return Err(err);
        }

        let segments: Vec<&str> = INCIDENTS_PATH
            .iter()
            .copied()
            .chain([incident_id, "status"])
            .collect();
        let url = self.config.endpoint(&segments)?;
        let body = StatusUpdate {
            status: status.to_string(),
        };

        let result = self
            .send(operation, Method::PUT, &url, Some(&body))
            .await
            .map(|_| ());

        self.report(operation, result)?;
        self.observer.on_event(&ConnectorEvent::IncidentStatusUpdated {
            incident_id: incident_id.to_string(),
            status: status.to_string(),
        });
        Ok(true)
    }

    /// Report a failure to the observer and convert it.
    fn report<T>(
        &self,
        operation: Operation,
        result: std::result::Result<T, RemoteRequestError>,
    ) -> Result<T> {
        result.map_err(|e| {
            self.observer.on_event(&ConnectorEvent::RequestFailed {
                operation,
                status: e.status_code(),
                error: e.to_string(),
            });
            e.into()
        })
    }

    /// Send a request and decode the JSON response.
    async fn send_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        operation: Operation,
        method: Method,
        url: &Url,
        body: Option<&B>,
    ) -> std::result::Result<R, RemoteRequestError> {
        with_retry_async(&self.config.retry, operation, move || {
            let method = method.clone();
            async move {
                let response = self.execute(operation, method, url, body).await?;
                let status = response.status();
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| RemoteRequestError::transport(operation, e))?;

                serde_json::from_slice(&bytes)
                    .map_err(|e| RemoteRequestError::decode(operation, status, e))
            }
        })
        .await
    }

    /// Send a request, ignoring the response body.
    async fn send<B: Serialize + Sync>(
        &self,
        operation: Operation,
        method: Method,
        url: &Url,
        body: Option<&B>,
    ) -> std::result::Result<Response, RemoteRequestError> {
        with_retry_async(&self.config.retry, operation, move || {
            self.execute(operation, method.clone(), url, body)
        })
        .await
    }

    /// One attempt: send and check the status.
    async fn execute<B: Serialize + Sync>(
        &self,
        operation: Operation,
        method: Method,
        url: &Url,
        body: Option<&B>,
    ) -> std::result::Result<Response, RemoteRequestError> {
        let mut request = self.client.request(method, url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(operation = %operation, url = %url, "Sending request");

        let response = request
            .send()
            .await
            .map_err(|e| RemoteRequestError::transport(operation, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RemoteRequestError::status(operation, status, body))
        }
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
