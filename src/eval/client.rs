//! Core evaluation client types and trait definitions.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// One evaluation request - everything needed for a single model call.
///
/// Constructed fresh per attempt and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// The original architecture goal, constant across attempts
    pub main_prompt: String,
    /// Supplementary text: the goal on attempt 1, the prior failure message
    /// on later attempts
    pub text_prompt: String,
    /// Rendered telemetry block, empty when no collector is configured
    pub telemetry_block: String,
    /// 1-based attempt index
    pub iteration: u32,
}

impl EvaluationRequest {
    pub fn new(main_prompt: impl Into<String>, text_prompt: impl Into<String>, iteration: u32) -> Self {
        Self {
            main_prompt: main_prompt.into(),
            text_prompt: text_prompt.into(),
            telemetry_block: String::new(),
            iteration,
        }
    }

    /// Attach a rendered telemetry block
    pub fn with_telemetry(mut self, block: impl Into<String>) -> Self {
        self.telemetry_block = block.into();
        self
    }

    /// Compose the single prompt sent to the model, in fixed order: main
    /// prompt, labeled telemetry block (skipped when empty), supplementary
    /// text prompt.
    pub fn compose(&self) -> String {
        if self.telemetry_block.is_empty() {
            format!("{}\n{}", self.main_prompt, self.text_prompt)
        } else {
            format!(
                "{}\nLogs:\n{}\n{}",
                self.main_prompt, self.telemetry_block, self.text_prompt
            )
        }
    }
}

/// Errors that can occur during model evaluation
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },
}

impl EvalError {
    /// Short stable tag for logging and attempt records
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::RateLimited { .. } => "rate_limited",
            EvalError::Api { .. } => "api",
            EvalError::Network(_) => "network",
            EvalError::InvalidResponse(_) => "invalid_response",
            EvalError::MissingApiKey { .. } => "missing_api_key",
        }
    }
}

/// Stateless evaluation client - each call is independent.
///
/// Failures are returned, never retried here; the feedback loop owns all
/// retry policy.
#[async_trait]
pub trait EvaluationClient: Send + Sync {
    /// Send the composed prompt to the completion service and return the
    /// trimmed response text
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvalError>;

    /// Model identifier for logging
    fn model(&self) -> &str {
        "unknown"
    }
}

/// Scripted evaluation client for tests.
///
/// Returns queued outcomes in order and records every composed prompt it
/// receives. The final queued outcome is replayed on further calls, so
/// always-succeeding and always-failing scripts work for any attempt count.
pub struct MockEvaluationClient {
    outcomes: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockEvaluationClient {
    pub fn new(outcomes: Vec<Result<String, String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Client that succeeds on every call with the given text
    pub fn always_succeeding(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            outcomes: Mutex::new(VecDeque::from(vec![Ok(text)])),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Composed prompts received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of evaluate calls received
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl EvaluationClient for MockEvaluationClient {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvalError> {
        self.prompts.lock().unwrap().push(request.compose());

        let mut outcomes = self.outcomes.lock().unwrap();
        let outcome = match outcomes.len() {
            0 => Ok("mock response".to_string()),
            // Keep replaying the final outcome so always-succeeding and
            // always-failing scripts work for any attempt count
            1 => outcomes.front().cloned().unwrap(),
            _ => outcomes.pop_front().unwrap(),
        };

        outcome.map_err(|message| EvalError::Api { status: 500, message })
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
