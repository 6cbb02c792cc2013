//! Azure Monitor telemetry collector.
//!
//! Logs come from the Log Analytics query API (KQL over a workspace),
//! metrics from the ARM metrics API (named metric over a resource). Token
//! acquisition is the environment's job; this module only spends a
//! pre-issued bearer token.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{error, info};
use reqwest::Client;
use serde_json::{Value, json};

use crate::error::{ArchevalError, Result};
use crate::telemetry::collector::LogCollector;
use crate::telemetry::record::{TelemetryBatch, TelemetryRecord};

/// Log Analytics query API base URL
const LOG_ANALYTICS_API_URL: &str = "https://api.loganalytics.io/v1/workspaces";

/// ARM metrics API base URL
const ARM_API_URL: &str = "https://management.azure.com";

/// ARM metrics API version
const METRICS_API_VERSION: &str = "2018-01-01";

/// Configuration for the Azure Monitor collector
#[derive(Debug, Clone)]
pub struct AzureMonitorConfig {
    /// Log Analytics workspace to query
    pub workspace_id: String,
    /// Fully qualified ARM resource id for metric queries
    pub resource_id: String,
    /// Pre-issued bearer token
    pub token: String,
    /// Per-call request timeout
    pub timeout: Duration,
}

impl AzureMonitorConfig {
    /// Build configuration from the environment.
    ///
    /// Reads AZURE_MONITOR_TOKEN, AZURE_LOG_ANALYTICS_WORKSPACE_ID and
    /// AZURE_MONITOR_RESOURCE_ID.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        Ok(Self {
            workspace_id: require_env("AZURE_LOG_ANALYTICS_WORKSPACE_ID")?,
            resource_id: require_env("AZURE_MONITOR_RESOURCE_ID")?,
            token: require_env("AZURE_MONITOR_TOKEN")?,
            timeout,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ArchevalError::Config(format!("{} not set", name)))
}

/// Azure Monitor collector
pub struct AzureMonitorCollector {
    client: Client,
    config: AzureMonitorConfig,
}

impl AzureMonitorCollector {
    /// Create a new collector with an HTTP client bound to the configured
    /// timeout
    pub fn new(config: AzureMonitorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ArchevalError::Telemetry(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Run a KQL query against the workspace and return the first table's
    /// rows
    async fn query_logs(&self, query: &str, span: Duration) -> Result<Vec<TelemetryRecord>> {
        let url = format!("{}/{}/query", LOG_ANALYTICS_API_URL, self.config.workspace_id);
        let body = json!({
            "query": query,
            "timespan": iso8601_span(span),
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ArchevalError::Telemetry(format!("Log query request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ArchevalError::Telemetry(format!(
                "Log query error {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ArchevalError::Telemetry(format!("Failed to parse log response: {}", e)))?;

        Ok(parse_log_tables(&body))
    }

    /// Fetch datapoints for a named metric over the span
    async fn query_metrics(&self, name: &str, span: Duration) -> Result<Vec<TelemetryRecord>> {
        let end = Utc::now();
        let start = end
            - chrono::Duration::from_std(span)
                .map_err(|e| ArchevalError::Telemetry(format!("Invalid span: {}", e)))?;

        let url = format!(
            "{}{}/providers/Microsoft.Insights/metrics",
            ARM_API_URL, self.config.resource_id
        );

        let timespan = format!("{}/{}", start.to_rfc3339(), end.to_rfc3339());
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.token)
            .query(&[
                ("api-version", METRICS_API_VERSION),
                ("metricnames", name),
                ("timespan", timespan.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ArchevalError::Telemetry(format!("Metric query request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ArchevalError::Telemetry(format!(
                "Metric query error {}: {}",
                status, error_body
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            ArchevalError::Telemetry(format!("Failed to parse metric response: {}", e))
        })?;

        Ok(parse_metric_timeseries(&body))
    }
}

#[async_trait]
impl LogCollector for AzureMonitorCollector {
    async fn collect(&self, query: &str, span: Duration) -> TelemetryBatch {
        match self.query_logs(query, span).await {
            Ok(records) => {
                info!("Collected {} Azure Monitor log rows", records.len());
                TelemetryBatch::collected(records)
            }
            Err(e) => {
                error!("Failed to collect Azure Monitor logs: {}", e);
                TelemetryBatch::failed(e.to_string())
            }
        }
    }

    async fn collect_metric(&self, name: &str, span: Duration) -> TelemetryBatch {
        match self.query_metrics(name, span).await {
            Ok(records) => {
                info!("Collected {} Azure Monitor metric datapoints", records.len());
                TelemetryBatch::collected(records)
            }
            Err(e) => {
                error!("Failed to collect Azure Monitor metrics: {}", e);
                TelemetryBatch::failed(e.to_string())
            }
        }
    }

    fn provider(&self) -> &str {
        "azure"
    }
}

impl std::fmt::Debug for AzureMonitorCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureMonitorCollector")
            .field("workspace_id", &self.config.workspace_id)
            .field("resource_id", &self.config.resource_id)
            .finish()
    }
}

/// ISO-8601 duration for the Log Analytics timespan parameter
fn iso8601_span(span: Duration) -> String {
    format!("PT{}S", span.as_secs())
}

/// Flatten the first table of a Log Analytics response into records, one per
/// row, cells stringified in column order
fn parse_log_tables(body: &Value) -> Vec<TelemetryRecord> {
    let Some(rows) = body["tables"][0]["rows"].as_array() else {
        return Vec::new();
    };

    rows.iter()
        .map(|row| {
            let fields: Vec<String> = row
                .as_array()
                .map(|cells| cells.iter().map(value_to_field).collect())
                .unwrap_or_else(|| vec![value_to_field(row)]);
            TelemetryRecord { fields }
        })
        .collect()
}

/// Flatten the first timeseries of an ARM metrics response into records of
/// (timestamp, average)
fn parse_metric_timeseries(body: &Value) -> Vec<TelemetryRecord> {
    let Some(data) = body["value"][0]["timeseries"][0]["data"].as_array() else {
        return Vec::new();
    };

    data.iter()
        .map(|point| {
            TelemetryRecord::new([
                value_to_field(&point["timeStamp"]),
                value_to_field(&point["average"]),
            ])
        })
        .collect()
}

fn value_to_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
