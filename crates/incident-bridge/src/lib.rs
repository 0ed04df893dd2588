//! Connector between a security tool's alert feed and its incident API.
//!
//! This crate provides:
//! - [`Connector`]: authenticated client for fetching alerts, creating
//!   incidents and updating incident status
//! - [`IncidentSync`]: one fetch-and-process pass turning qualifying alerts
//!   into incidents
//! - [`ConnectorObserver`]: event hook used for logging and tests
//!
//! # Usage
//!
//! ```no_run
//! use incident_bridge::{Connector, ConnectorConfig, IncidentSync, SyncPolicy, TimeWindow};
//!
//! # async fn example() -> incident_bridge::Result<()> {
//! let config = ConnectorConfig::new("your-api-key", "https://security-tool-api.example.com")?;
//! let connector = Connector::new(config)?;
//!
//! let window = TimeWindow::last(chrono::Duration::days(1));
//! let report = IncidentSync::new(connector, SyncPolicy::default())
//!     .run(&window)
//!     .await?;
//!
//! println!("opened {} incidents", report.incidents.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! [`ConnectorConfig::from_env`] reads:
//!
//! - `INCIDENT_BRIDGE_API_KEY`: bearer token (required)
//! - `INCIDENT_BRIDGE_BASE_URL`: API base URL (required)
//! - `INCIDENT_BRIDGE_TIMEOUT_SECS`: per-request timeout, `0` disables
//! - `INCIDENT_BRIDGE_CONNECT_TIMEOUT_SECS`: connect timeout, `0` disables
//! - `INCIDENT_BRIDGE_MAX_ATTEMPTS`: attempts per call (default 1, no retry)

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod observer;
pub mod retry;
pub mod sync;

pub use client::Connector;
pub use config::ConnectorConfig;
pub use error::{ConnectorError, Operation, RemoteCause, RemoteRequestError, Result};
pub use models::{Alert, IncidentPayload, Severity, StatusUpdate, TimeWindow};
pub use observer::{
    ConnectorEvent, ConnectorObserver, NoopObserver, RecordingObserver, TracingObserver,
};
pub use retry::RetryConfig;
pub use sync::{IncidentSync, SyncPolicy, SyncReport, SyncedIncident};
