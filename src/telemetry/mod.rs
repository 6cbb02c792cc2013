//! Telemetry Layer - pulling logs and metrics from cloud providers
//!
//! This module provides:
//! - TelemetryRecord/TelemetryBatch types for collected data
//! - LogCollector trait for provider abstraction
//! - Azure Monitor and AWS CloudWatch collectors
//! - Prompt-block rendering of collected records

pub mod aws;
pub mod azure;
pub mod collector;
pub mod format;
pub mod record;

pub use aws::{CloudWatchCollector, CloudWatchConfig};
pub use azure::{AzureMonitorCollector, AzureMonitorConfig};
pub use collector::{DEFAULT_SPAN, LogCollector, MockCollector};
pub use format::format_records;
pub use record::{CollectionStatus, TelemetryBatch, TelemetryRecord};
