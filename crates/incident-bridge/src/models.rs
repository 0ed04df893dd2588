//! Wire types for the alert and incident API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational - no action needed
    Informational,
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
    /// Critical - immediate action required
    Critical,
}

impl Severity {
    /// Get the wire name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "informational" => Ok(Self::Informational),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// A security alert as reported by the monitoring tool.
///
/// The alert is kept exactly as the remote API sent it: no field is
/// required, typed or dropped, so it serializes back unchanged. The
/// descriptive fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alert {
    raw: Value,
}

impl Default for Alert {
    fn default() -> Self {
        Self {
            raw: Value::Object(Map::new()),
        }
    }
}

impl From<Value> for Alert {
    fn from(raw: Value) -> Self {
        Self { raw }
    }
}

impl Alert {
    /// Raw value of `key`, `None` when absent or when the alert is not an
    /// object. An explicit `null` is returned as `Some(&Value::Null)`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// The alert as received.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.raw
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.raw
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// `title`, when it is a string.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    /// Raw `severity` string; see [`Alert::severity_level`].
    #[must_use]
    pub fn severity(&self) -> Option<&str> {
        self.str_field("severity")
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.str_field("source")
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.str_field("description")
    }

    /// Parsed severity, or `None` when absent, not a string or unrecognized.
    #[must_use]
    pub fn severity_level(&self) -> Option<Severity> {
        self.severity().and_then(|s| s.parse().ok())
    }
}

/// Body of `POST /api/v1/incidents`.
///
/// Alert fields are forwarded with whatever JSON value the alert carried;
/// missing ones are sent as explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentPayload {
    pub title: Value,
    pub severity: Value,
    pub source: Value,
    pub description: Value,
    pub created_at: DateTime<Utc>,
}

impl IncidentPayload {
    /// Build the payload for one alert, stamped with `created_at`.
    #[must_use]
    pub fn from_alert(alert: &Alert, created_at: DateTime<Utc>) -> Self {
        let field = |key: &str| alert.get(key).cloned().unwrap_or(Value::Null);

        Self {
            title: field("title"),
            severity: field("severity"),
            source: field("source"),
            description: field("description"),
            created_at,
        }
    }
}

/// Body of `PUT /api/v1/incidents/{id}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// Response of `POST /api/v1/incidents`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CreateIncidentResponse {
    #[serde(default)]
    incident_id: Option<Value>,
}

impl CreateIncidentResponse {
    /// Incident id as a string. Numeric ids are rendered in decimal;
    /// empty strings and other JSON types count as absent.
    pub(crate) fn into_incident_id(self) -> Option<String> {
        match self.incident_id? {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Query window for alert retrieval.
///
/// `start <= end` is not enforced; out-of-order windows are forwarded to
/// the remote API unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The calendar day starting at midnight UTC of `date`.
    #[must_use]
    pub fn day_starting(date: NaiveDate) -> Self {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// The `span` ending now.
    #[must_use]
    pub fn last(span: Duration) -> Self {
        let end = Utc::now();
        Self {
            start: end - span,
            end,
        }
    }
}

/// ISO-8601 form used for query parameters.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
