//! Feedback loop implementation - drives bounded, error-fed retry attempts.
//!
//! The FeedbackLoop evaluates one architecture description, iterating until
//! the model responds successfully or the attempt budget is exhausted. Each
//! failed attempt's error message becomes the next attempt's supplementary
//! input.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{info, warn};

use crate::eval::{EvaluationClient, EvaluationRequest};
use crate::telemetry::collector::{DEFAULT_SPAN, LogCollector};
use crate::telemetry::format::format_records;
use crate::telemetry::record::TelemetryRecord;

/// Default attempt budget, matching the observed loop bound.
///
/// `max_attempts = N` means exactly N attempts execute when none succeeds.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 11;

/// Outcome of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The model returned a usable response
    Success(String),
    /// The attempt failed; the message is fed into the next attempt
    Failure { kind: String, message: String },
}

/// One recorded iteration of the feedback loop.
///
/// Immutable once recorded.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// 1-based attempt index
    pub index: u32,
    /// Supplementary input this attempt ran with
    pub input_text: String,
    pub outcome: AttemptOutcome,
}

/// Terminal state of a loop run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// First successful evaluation text
    Success(String),
    /// Attempt budget exhausted; carries the final attempt's error text
    Exhausted(String),
    /// Cancelled before completion; carries the last known text, if any
    Cancelled(Option<String>),
}

impl EvaluationOutcome {
    /// Best-available text for the caller. For Exhausted this is the last
    /// error text, not a successful evaluation.
    pub fn best_available(&self) -> Option<&str> {
        match self {
            EvaluationOutcome::Success(text) | EvaluationOutcome::Exhausted(text) => Some(text),
            EvaluationOutcome::Cancelled(last) => last.as_deref(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EvaluationOutcome::Success(_))
    }
}

/// Cheap cloneable cancellation handle, checked at the top of each attempt
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Configuration for the FeedbackLoop
#[derive(Debug, Clone)]
pub struct FeedbackLoopConfig {
    /// Attempt budget
    pub max_attempts: u32,
    /// Provider-native log query, passed through unmodified
    pub log_query: Option<String>,
    /// Named metric to append to the telemetry block
    pub metric_name: Option<String>,
    /// Lookback window for telemetry queries
    pub span: Duration,
}

impl Default for FeedbackLoopConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            log_query: None,
            metric_name: None,
            span: DEFAULT_SPAN,
        }
    }
}

/// The orchestrator's per-run mutable state
struct LoopState {
    current_input: String,
    iteration_count: u32,
    last_result: Option<String>,
}

/// Domain record for one loop run, mutated by the runner as attempts land
#[derive(Debug, Clone)]
pub struct EvaluationRun {
    pub goal_text: String,
    pub attempts: Vec<Attempt>,
}

impl EvaluationRun {
    pub fn new(goal_text: impl Into<String>) -> Self {
        Self {
            goal_text: goal_text.into(),
            attempts: Vec::new(),
        }
    }
}

/// FeedbackLoop drives a fixed-budget retry sequence.
///
/// Each attempt:
/// 1. Checks cancellation
/// 2. Collects fresh telemetry (when a provider is configured)
/// 3. Builds an EvaluationRequest from the current input
/// 4. Calls the evaluation client
/// 5. On success: terminates with the response
/// 6. On failure: the error message becomes the next attempt's input
pub struct FeedbackLoop<E>
where
    E: EvaluationClient,
{
    /// Evaluation client for model calls
    eval: Arc<E>,
    /// Optional telemetry source; attempts run with an empty block without it
    collector: Option<Arc<dyn LogCollector>>,
    /// Configuration
    config: FeedbackLoopConfig,
}

impl<E> FeedbackLoop<E>
where
    E: EvaluationClient,
{
    /// Create a new FeedbackLoop with the given dependencies
    pub fn new(eval: Arc<E>, collector: Option<Arc<dyn LogCollector>>) -> Self {
        Self {
            eval,
            collector,
            config: FeedbackLoopConfig::default(),
        }
    }

    /// Create a new FeedbackLoop with custom configuration
    pub fn with_config(
        eval: Arc<E>,
        collector: Option<Arc<dyn LogCollector>>,
        config: FeedbackLoopConfig,
    ) -> Self {
        Self {
            eval,
            collector,
            config,
        }
    }

    /// Run the loop until first success, budget exhaustion, or cancellation.
    ///
    /// No error escapes: per-attempt failures are converted to the next
    /// attempt's input and retried. Attempts are recorded on `evaluation`
    /// in order.
    pub async fn run(&self, evaluation: &mut EvaluationRun) -> EvaluationOutcome {
        self.run_with_cancel(evaluation, &CancelToken::new()).await
    }

    /// Run with a caller-supplied cancellation token, checked at the top of
    /// each attempt
    pub async fn run_with_cancel(
        &self,
        evaluation: &mut EvaluationRun,
        cancel: &CancelToken,
    ) -> EvaluationOutcome {
        let mut state = LoopState {
            current_input: evaluation.goal_text.clone(),
            iteration_count: 0,
            last_result: None,
        };

        while state.iteration_count < self.config.max_attempts {
            if cancel.is_cancelled() {
                info!(
                    "Evaluation cancelled after {} attempt(s)",
                    state.iteration_count
                );
                return EvaluationOutcome::Cancelled(state.last_result);
            }

            state.iteration_count += 1;
            let input_text = state.current_input.clone();

            let telemetry_block = self.collect_telemetry().await;
            let request = EvaluationRequest::new(
                &evaluation.goal_text,
                &state.current_input,
                state.iteration_count,
            )
            .with_telemetry(telemetry_block);

            match self.eval.evaluate(&request).await {
                Ok(text) => {
                    info!(
                        "Attempt {}/{} succeeded",
                        state.iteration_count, self.config.max_attempts
                    );
                    evaluation.attempts.push(Attempt {
                        index: state.iteration_count,
                        input_text,
                        outcome: AttemptOutcome::Success(text.clone()),
                    });
                    return EvaluationOutcome::Success(text);
                }
                Err(err) => {
                    warn!(
                        "Attempt {}/{} failed ({}): {}",
                        state.iteration_count,
                        self.config.max_attempts,
                        err.kind(),
                        err
                    );
                    let message = err.to_string();
                    evaluation.attempts.push(Attempt {
                        index: state.iteration_count,
                        input_text,
                        outcome: AttemptOutcome::Failure {
                            kind: err.kind().to_string(),
                            message: message.clone(),
                        },
                    });
                    state.last_result = Some(message.clone());
                    // The failure itself is the next attempt's input
                    state.current_input = message;
                }
            }
        }

        EvaluationOutcome::Exhausted(state.last_result.unwrap_or_default())
    }

    /// Collect and render a fresh telemetry block for one attempt.
    ///
    /// A failed provider call yields an empty block, never an error.
    async fn collect_telemetry(&self) -> String {
        let Some(collector) = &self.collector else {
            return String::new();
        };

        let mut records: Vec<TelemetryRecord> = Vec::new();

        if let Some(query) = &self.config.log_query {
            let batch = collector.collect(query, self.config.span).await;
            if !batch.succeeded() {
                warn!("Log collection from {} failed, continuing without logs", collector.provider());
            }
            records.extend(batch.records);
        }

        if let Some(name) = &self.config.metric_name {
            let batch = collector.collect_metric(name, self.config.span).await;
            if !batch.succeeded() {
                warn!(
                    "Metric collection from {} failed, continuing without metrics",
                    collector.provider()
                );
            }
            records.extend(batch.records);
        }

        format_records(&records)
    }
}
