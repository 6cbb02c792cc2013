//! Runner module - the feedback-driven evaluation loop.
//!
//! Contains the FeedbackLoop orchestrator that retries model evaluation
//! with error-as-input feedback until success or budget exhaustion.

pub mod feedback_loop;

pub use feedback_loop::{
    Attempt, AttemptOutcome, CancelToken, DEFAULT_MAX_ATTEMPTS, EvaluationOutcome, EvaluationRun,
    FeedbackLoop, FeedbackLoopConfig,
};
