//! Incident bridge binary.
//!
//! Runs one sync pass: fetch alerts for a window, open incidents for the
//! qualifying ones and move them to their initial status.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use incident_bridge::{
    Connector, ConnectorConfig, IncidentSync, RetryConfig, Severity, SyncPolicy, TimeWindow,
};

/// Open incidents for security alerts raised in a time window
#[derive(Parser, Debug)]
#[command(name = "incident-bridge")]
#[command(version)]
struct Cli {
    /// API bearer token
    #[arg(long, env = "INCIDENT_BRIDGE_API_KEY", hide_env_values = true)]
    api_key: String,

    /// API base URL
    #[arg(long, env = "INCIDENT_BRIDGE_BASE_URL")]
    base_url: String,

    /// Window start (RFC 3339). Defaults to 24 hours before --end
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Window end (RFC 3339). Defaults to now
    #[arg(long)]
    end: Option<DateTime<Utc>>,

    /// Lowest severity that opens an incident
    #[arg(long, default_value = "critical", value_parser = parse_severity)]
    min_severity: Severity,

    /// Status applied to each new incident
    #[arg(long, default_value = incident_bridge::sync::DEFAULT_INITIAL_STATUS)]
    status: String,

    /// Per-request timeout in seconds (0 disables)
    #[arg(long, env = "INCIDENT_BRIDGE_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Connection timeout in seconds (0 disables)
    #[arg(long, env = "INCIDENT_BRIDGE_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Attempts per remote call (1 disables retries)
    #[arg(long, env = "INCIDENT_BRIDGE_MAX_ATTEMPTS", default_value_t = 1)]
    max_attempts: u32,

    /// Print the sync report as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn parse_severity(raw: &str) -> Result<Severity, String> {
    raw.parse()
}

impl Cli {
    fn window(&self) -> TimeWindow {
        let end = self.end.unwrap_or_else(Utc::now);
        let start = self.start.unwrap_or(end - chrono::Duration::days(1));
        TimeWindow::new(start, end)
    }

    fn connector_config(&self) -> Result<ConnectorConfig> {
        let seconds = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

        Ok(ConnectorConfig::new(self.api_key.clone(), &self.base_url)?
            .with_request_timeout(seconds(self.timeout_secs))
            .with_connect_timeout(seconds(self.connect_timeout_secs))
            .with_retry(RetryConfig::with_max_attempts(self.max_attempts)))
    }
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("incident_bridge=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let window = cli.window();
    let connector =
        Connector::new(cli.connector_config()?).context("Failed to create connector")?;

    info!(
        base_url = %connector.config().base_url(),
        start = %window.start,
        end = %window.end,
        min_severity = %cli.min_severity,
        "Starting incident sync"
    );

    let policy = SyncPolicy {
        min_severity: cli.min_severity,
        initial_status: cli.status.clone(),
    };

    let report = IncidentSync::new(connector, policy)
        .run(&window)
        .await
        .context("Incident sync failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        println!(
            "Fetched {} alerts, opened {} incidents, skipped {}",
            report.fetched,
            report.incidents.len(),
            report.skipped
        );
        for incident in &report.incidents {
            println!(
                "  {} -> {}{}",
                incident.alert_title.as_deref().unwrap_or("<untitled>"),
                incident.incident_id.as_deref().unwrap_or("<no id>"),
                if incident.status_updated {
                    format!(" ({})", cli.status)
                } else {
                    String::new()
                }
            );
        }
    }

    Ok(())
}
