//! One fetch-and-process pass from alerts to incidents.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::Connector;
use crate::error::Result;
use crate::models::{Alert, Severity, TimeWindow};

/// Status given to newly created incidents by default.
pub const DEFAULT_INITIAL_STATUS: &str = "in_progress";

/// Which alerts become incidents, and what status they start in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Lowest severity that opens an incident.
    pub min_severity: Severity,
    /// Status applied right after creation.
    pub initial_status: String,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            min_severity: Severity::Critical,
            initial_status: DEFAULT_INITIAL_STATUS.to_string(),
        }
    }
}

impl SyncPolicy {
    /// Whether `alert` qualifies. Alerts with a missing or unrecognized
    /// severity never qualify.
    #[must_use]
    pub fn qualifies(&self, alert: &Alert) -> bool {
        alert
            .severity_level()
            .is_some_and(|level| level >= self.min_severity)
    }
}

/// An incident opened during a sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedIncident {
    pub alert_title: Option<String>,
    pub incident_id: Option<String>,
    pub status_updated: bool,
}

/// Summary of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Alerts returned by the remote API
    pub fetched: usize,
    /// Alerts below the severity threshold
    pub skipped: usize,
    /// Incidents opened, in alert order
    pub incidents: Vec<SyncedIncident>,
    /// Incidents created without an id in the response
    pub missing_ids: usize,
}

/// Drives alert retrieval and incident creation over one time window.
#[derive(Debug, Clone)]
pub struct IncidentSync {
    connector: Connector,
    policy: SyncPolicy,
}

impl IncidentSync {
    #[must_use]
    pub const fn new(connector: Connector, policy: SyncPolicy) -> Self {
        Self { connector, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Fetch alerts for `window` and open an incident for each qualifying one.
    ///
    /// Each new incident is moved to the policy's initial status when the
    /// server returned an id for it.
    ///
    /// # Errors
    /// The first error aborts the pass. Incidents created before it are left
    /// as they are.
    pub async fn run(&self, window: &TimeWindow) -> Result<SyncReport> {
        let alerts = self.connector.get_alerts(window.start, window.end).await?;

        let mut report = SyncReport {
            fetched: alerts.len(),
            ..SyncReport::default()
        };

        for alert in &alerts {
            if !self.policy.qualifies(alert) {
                debug!(title = ?alert.title(), severity = ?alert.severity(), "Skipping alert");
                report.skipped += 1;
                continue;
            }

            let incident_id = self.connector.create_incident(alert).await?;

            let status_updated = match &incident_id {
                Some(id) => {
                    self.connector
                        .update_incident_status(id, &self.policy.initial_status)
                        .await?
                }
                None => {
                    warn!(
                        title = ?alert.title(),
                        "Incident created without an id, status not updated"
                    );
                    report.missing_ids += 1;
                    false
                }
            };

            report.incidents.push(SyncedIncident {
                alert_title: alert.title().map(str::to_string),
                incident_id,
                status_updated,
            });
        }

        info!(
            fetched = report.fetched,
            created = report.incidents.len(),
            skipped = report.skipped,
            "Sync pass complete"
        );

        Ok(report)
    }
}
