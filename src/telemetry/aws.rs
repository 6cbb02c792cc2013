//! AWS CloudWatch telemetry collector.
//!
//! Logs come from the CloudWatch Logs FilterLogEvents API, metrics from the
//! CloudWatch GetMetricStatistics API, both over the JSON wire protocol.
//! Request signing is the environment's job; this module only attaches the
//! pre-built authorization material it is handed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use log::{error, info};
use reqwest::Client;
use serde_json::{Value, json};

use crate::error::{ArchevalError, Result};
use crate::telemetry::collector::LogCollector;
use crate::telemetry::record::{TelemetryBatch, TelemetryRecord};

/// CloudWatch Logs API target for log queries
const LOGS_TARGET: &str = "Logs_20140328.FilterLogEvents";

/// CloudWatch API target for metric statistics
const METRICS_TARGET: &str = "GraniteServiceVersion20100801.GetMetricStatistics";

/// Metric aggregation period in seconds
const METRIC_PERIOD_SECS: u64 = 3600;

/// Configuration for the CloudWatch collector
#[derive(Debug, Clone)]
pub struct CloudWatchConfig {
    /// AWS region, e.g. us-east-1
    pub region: String,
    /// Log group to filter events from
    pub log_group: String,
    /// Metric namespace for statistics queries
    pub metric_namespace: String,
    /// Pre-built authorization header value
    pub authorization: String,
    /// Per-call request timeout
    pub timeout: Duration,
}

impl CloudWatchConfig {
    /// Build configuration from the environment.
    ///
    /// Reads AWS_DEFAULT_REGION, AWS_CLOUDWATCH_LOG_GROUP and
    /// AWS_CLOUDWATCH_AUTHORIZATION; AWS_CLOUDWATCH_NAMESPACE is optional
    /// and defaults to AWS/EC2.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        Ok(Self {
            region: require_env("AWS_DEFAULT_REGION")?,
            log_group: require_env("AWS_CLOUDWATCH_LOG_GROUP")?,
            metric_namespace: std::env::var("AWS_CLOUDWATCH_NAMESPACE")
                .unwrap_or_else(|_| "AWS/EC2".to_string()),
            authorization: require_env("AWS_CLOUDWATCH_AUTHORIZATION")?,
            timeout,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ArchevalError::Config(format!("{} not set", name)))
}

/// AWS CloudWatch collector
pub struct CloudWatchCollector {
    client: Client,
    config: CloudWatchConfig,
}

impl CloudWatchCollector {
    /// Create a new collector with an HTTP client bound to the configured
    /// timeout
    pub fn new(config: CloudWatchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ArchevalError::Telemetry(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn send_target(&self, endpoint: &str, target: &str, content_type: &str, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(endpoint)
            .header("X-Amz-Target", target)
            .header("Content-Type", content_type)
            .header("Authorization", &self.config.authorization)
            .json(&body)
            .send()
            .await
            .map_err(|e| ArchevalError::Telemetry(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ArchevalError::Telemetry(format!(
                "CloudWatch error {}: {}",
                status, error_body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ArchevalError::Telemetry(format!("Failed to parse response: {}", e)))
    }

    /// Filter log events from the configured group over the span
    async fn query_logs(&self, filter_pattern: &str, span: Duration) -> Result<Vec<TelemetryRecord>> {
        let endpoint = format!("https://logs.{}.amazonaws.com/", self.config.region);
        let end_ms = Utc::now().timestamp_millis();
        let start_ms = end_ms - span.as_millis() as i64;

        let mut body = json!({
            "logGroupName": self.config.log_group,
            "startTime": start_ms,
            "endTime": end_ms,
        });
        if !filter_pattern.is_empty() {
            body["filterPattern"] = json!(filter_pattern);
        }

        let response = self
            .send_target(&endpoint, LOGS_TARGET, "application/x-amz-json-1.1", body)
            .await?;

        Ok(parse_log_events(&response))
    }

    /// Fetch averaged datapoints for a named metric over the span
    async fn query_metrics(&self, name: &str, span: Duration) -> Result<Vec<TelemetryRecord>> {
        let endpoint = format!("https://monitoring.{}.amazonaws.com/", self.config.region);
        let end = Utc::now().timestamp();
        let start = end - span.as_secs() as i64;

        let body = json!({
            "Namespace": self.config.metric_namespace,
            "MetricName": name,
            "StartTime": start,
            "EndTime": end,
            "Period": METRIC_PERIOD_SECS,
            "Statistics": ["Average"],
        });

        let response = self
            .send_target(&endpoint, METRICS_TARGET, "application/x-amz-json-1.0", body)
            .await?;

        Ok(parse_datapoints(&response))
    }
}

#[async_trait]
impl LogCollector for CloudWatchCollector {
    async fn collect(&self, query: &str, span: Duration) -> TelemetryBatch {
        match self.query_logs(query, span).await {
            Ok(records) => {
                info!("Collected {} CloudWatch log events", records.len());
                TelemetryBatch::collected(records)
            }
            Err(e) => {
                error!("Failed to collect CloudWatch logs: {}", e);
                TelemetryBatch::failed(e.to_string())
            }
        }
    }

    async fn collect_metric(&self, name: &str, span: Duration) -> TelemetryBatch {
        match self.query_metrics(name, span).await {
            Ok(records) => {
                info!("Collected {} CloudWatch metric datapoints", records.len());
                TelemetryBatch::collected(records)
            }
            Err(e) => {
                error!("Failed to collect CloudWatch metrics: {}", e);
                TelemetryBatch::failed(e.to_string())
            }
        }
    }

    fn provider(&self) -> &str {
        "aws"
    }
}

impl std::fmt::Debug for CloudWatchCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudWatchCollector")
            .field("region", &self.config.region)
            .field("log_group", &self.config.log_group)
            .finish()
    }
}

/// Flatten a FilterLogEvents response into records of
/// (timestamp, log stream, message)
fn parse_log_events(body: &Value) -> Vec<TelemetryRecord> {
    let Some(events) = body["events"].as_array() else {
        return Vec::new();
    };

    events
        .iter()
        .map(|event| {
            TelemetryRecord::new([
                render_epoch_ms(event["timestamp"].as_i64()),
                event["logStreamName"].as_str().unwrap_or("").to_string(),
                event["message"].as_str().unwrap_or("").trim_end().to_string(),
            ])
        })
        .collect()
}

/// Flatten a GetMetricStatistics response into records of
/// (timestamp, average)
fn parse_datapoints(body: &Value) -> Vec<TelemetryRecord> {
    let Some(datapoints) = body["Datapoints"].as_array() else {
        return Vec::new();
    };

    datapoints
        .iter()
        .map(|point| {
            let timestamp = match &point["Timestamp"] {
                Value::String(s) => s.clone(),
                Value::Number(n) => render_epoch_ms(n.as_f64().map(|s| (s * 1000.0) as i64)),
                other => other.to_string(),
            };
            TelemetryRecord::new([timestamp, point["Average"].to_string()])
        })
        .collect()
}

fn render_epoch_ms(ms: Option<i64>) -> String {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CloudWatchConfig {
        CloudWatchConfig {
            region: "us-east-1".to_string(),
            log_group: "/aws/lambda/orders".to_string(),
            metric_namespace: "AWS/EC2".to_string(),
            authorization: "AWS4-HMAC-SHA256 Credential=test".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_collector_construction() {
        let collector = CloudWatchCollector::new(test_config()).unwrap();
        assert_eq!(collector.provider(), "aws");
    }

    #[test]
    fn test_parse_log_events() {
        let body = json!({
            "events": [
                {
                    "timestamp": 1704067200000i64,
                    "logStreamName": "2024/01/01/[$LATEST]abc",
                    "message": "ERROR timeout calling upstream\n"
                }
            ]
        });

        let records = parse_log_events(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields[0], "2024-01-01T00:00:00+00:00");
        assert_eq!(records[0].fields[1], "2024/01/01/[$LATEST]abc");
        assert_eq!(records[0].fields[2], "ERROR timeout calling upstream");
    }

    #[test]
    fn test_parse_log_events_empty_response() {
        assert!(parse_log_events(&json!({})).is_empty());
        assert!(parse_log_events(&json!({"events": []})).is_empty());
    }

    #[test]
    fn test_parse_datapoints() {
        let body = json!({
            "Datapoints": [
                {"Timestamp": "2024-01-01T00:00:00Z", "Average": 17.25}
            ]
        });

        let records = parse_datapoints(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields, vec!["2024-01-01T00:00:00Z", "17.25"]);
    }

    #[test]
    fn test_render_epoch_ms_invalid() {
        assert_eq!(render_epoch_ms(None), "");
    }

    #[test]
    fn test_debug_hides_authorization() {
        let collector = CloudWatchCollector::new(test_config()).unwrap();
        let debug_str = format!("{:?}", collector);
        assert!(debug_str.contains("us-east-1"));
        assert!(!debug_str.contains("AWS4-HMAC-SHA256"));
    }
}
