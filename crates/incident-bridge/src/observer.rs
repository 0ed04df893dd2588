//! Connector event reporting.
//!
//! The connector does not log directly. It reports each outcome to a
//! [`ConnectorObserver`]; the default [`TracingObserver`] turns events into
//! `tracing` records, and tests substitute their own recorder.

use std::sync::Mutex;

use tracing::{error, info};

use crate::error::Operation;

/// Outcome of one connector call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    /// Alerts were retrieved
    AlertsFetched { count: usize },

    /// An incident was created; `incident_id` is `None` when the response
    /// carried no id
    IncidentCreated { incident_id: Option<String> },

    /// An incident status was changed
    IncidentStatusUpdated { incident_id: String, status: String },

    /// A call failed and its error is being returned to the caller
    RequestFailed {
        operation: Operation,
        status: Option<u16>,
        error: String,
    },
}

/// Receiver for connector events.
pub trait ConnectorObserver: Send + Sync {
    /// Handle one event. Must not fail or block for long.
    fn on_event(&self, event: &ConnectorEvent);
}

/// Observer that writes events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ConnectorObserver for TracingObserver {
    fn on_event(&self, event: &ConnectorEvent) {
        match event {
            ConnectorEvent::AlertsFetched { count } => {
                info!(count, "Retrieved {count} alerts successfully");
            }
            ConnectorEvent::IncidentCreated { incident_id } => {
                info!(incident_id = ?incident_id, "Created incident");
            }
            ConnectorEvent::IncidentStatusUpdated {
                incident_id,
                status,
            } => {
                info!(
                    incident_id = %incident_id,
                    status = %status,
                    "Updated incident status"
                );
            }
            ConnectorEvent::RequestFailed {
                operation,
                status,
                error,
            } => {
                error!(
                    operation = %operation,
                    status = ?status,
                    error = %error,
                    "Remote request failed"
                );
            }
        }
    }
}

/// Observer that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ConnectorObserver for NoopObserver {
    fn on_event(&self, _event: &ConnectorEvent) {}
}

/// Observer that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ConnectorEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    #[must_use]
    pub fn events(&self) -> Vec<ConnectorEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ConnectorObserver for RecordingObserver {
    fn on_event(&self, event: &ConnectorEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
