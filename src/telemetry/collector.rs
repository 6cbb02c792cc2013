//! The log/metric collection capability.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::telemetry::record::TelemetryBatch;

/// Default lookback window for telemetry queries: one day
pub const DEFAULT_SPAN: Duration = Duration::from_secs(86_400);

/// Pulls a bounded window of operational data from an external telemetry
/// source.
///
/// Query strings and metric names are provider-native and passed through
/// unmodified - callers own validation of anything untrusted. Provider call
/// errors never propagate: they are logged at this layer and become a failed
/// batch with zero records.
#[async_trait]
pub trait LogCollector: Send + Sync {
    /// Collect log records matching a provider-native query over the span
    async fn collect(&self, query: &str, span: Duration) -> TelemetryBatch;

    /// Collect datapoints for a named metric over the span
    async fn collect_metric(&self, name: &str, span: Duration) -> TelemetryBatch;

    /// Provider name for logging
    fn provider(&self) -> &str {
        "collector"
    }
}

/// Scripted collector for tests - returns queued batches in order, then
/// empty successful batches.
pub struct MockCollector {
    batches: Mutex<VecDeque<TelemetryBatch>>,
    queries: Mutex<Vec<String>>,
}

impl MockCollector {
    pub fn new(batches: Vec<TelemetryBatch>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Queries and metric names received, in call order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn next_batch(&self, input: &str) -> TelemetryBatch {
        self.queries.lock().unwrap().push(input.to_string());
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| TelemetryBatch::collected(vec![]))
    }
}

#[async_trait]
impl LogCollector for MockCollector {
    async fn collect(&self, query: &str, _span: Duration) -> TelemetryBatch {
        self.next_batch(query)
    }

    async fn collect_metric(&self, name: &str, _span: Duration) -> TelemetryBatch {
        self.next_batch(name)
    }

    fn provider(&self) -> &str {
        "mock"
    }
}
