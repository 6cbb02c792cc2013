//! Feedback loop integration tests
//!
//! Tests the end-to-end evaluation flow with scripted evaluation clients
//! and telemetry collectors.

use std::sync::Arc;
use std::time::Duration;

use archeval::eval::{EvaluationRequest, MockEvaluationClient};
use archeval::runner::{
    AttemptOutcome, CancelToken, EvaluationOutcome, EvaluationRun, FeedbackLoop,
    FeedbackLoopConfig,
};
use archeval::telemetry::{
    LogCollector, MockCollector, TelemetryBatch, TelemetryRecord, format_records,
};

fn runner_with(
    eval: MockEvaluationClient,
    collector: Option<MockCollector>,
    config: FeedbackLoopConfig,
) -> (FeedbackLoop<MockEvaluationClient>, Arc<MockEvaluationClient>) {
    let eval = Arc::new(eval);
    let collector = collector.map(|c| Arc::new(c) as Arc<dyn LogCollector>);
    (
        FeedbackLoop::with_config(Arc::clone(&eval), collector, config),
        eval,
    )
}

/// Scenario: the model succeeds on the first call - exactly one iteration
#[tokio::test]
async fn test_first_call_success_runs_one_iteration() {
    let (runner, eval) = runner_with(
        MockEvaluationClient::always_succeeding("three tiers behind a load balancer"),
        None,
        FeedbackLoopConfig::default(),
    );

    let mut evaluation = EvaluationRun::new("deploy a 3-tier web app");
    let outcome = runner.run(&mut evaluation).await;

    assert_eq!(eval.call_count(), 1);
    assert_eq!(evaluation.attempts.len(), 1);
    assert_eq!(
        outcome,
        EvaluationOutcome::Success("three tiers behind a load balancer".to_string())
    );
}

/// Scenario: failures on attempts 1-2, success on attempt 3; attempt 2 runs
/// with attempt 1's stringified error as input
#[tokio::test]
async fn test_error_feedback_reaches_next_attempt() {
    let (runner, eval) = runner_with(
        MockEvaluationClient::new(vec![
            Err("subnet overlaps with existing VPC".to_string()),
            Err("NAT gateway quota exceeded".to_string()),
            Ok("revised plan".to_string()),
        ]),
        None,
        FeedbackLoopConfig::default(),
    );

    let mut evaluation = EvaluationRun::new("deploy a 3-tier web app");
    let outcome = runner.run(&mut evaluation).await;

    assert!(outcome.is_success());
    assert_eq!(eval.call_count(), 3);
    assert_eq!(evaluation.attempts.len(), 3);

    let AttemptOutcome::Failure { message, .. } = &evaluation.attempts[0].outcome else {
        panic!("attempt 1 should have failed");
    };
    assert_eq!(&evaluation.attempts[1].input_text, message);
    assert!(message.contains("subnet overlaps"));

    // The failure text is visible in the second composed prompt
    assert!(eval.prompts()[1].contains("subnet overlaps"));
}

/// Scenario: every attempt fails with max_attempts = 5 - exactly five
/// iterations, final text is the last attempt's error
#[tokio::test]
async fn test_all_failures_exhaust_budget() {
    let (runner, eval) = runner_with(
        MockEvaluationClient::new(vec![Err("model unavailable".to_string())]),
        None,
        FeedbackLoopConfig {
            max_attempts: 5,
            ..Default::default()
        },
    );

    let mut evaluation = EvaluationRun::new("goal");
    let outcome = runner.run(&mut evaluation).await;

    assert_eq!(eval.call_count(), 5);
    assert_eq!(evaluation.attempts.len(), 5);

    let EvaluationOutcome::Exhausted(text) = &outcome else {
        panic!("expected exhaustion, got {:?}", outcome);
    };
    let AttemptOutcome::Failure { message, .. } = &evaluation.attempts[4].outcome else {
        panic!("attempt 5 should have failed");
    };
    assert_eq!(text, message);
    assert!(!outcome.is_success());
}

/// The loop never exceeds its budget regardless of how the script behaves
#[tokio::test]
async fn test_never_more_than_budget() {
    for max_attempts in [1, 2, 7] {
        let (runner, eval) = runner_with(
            MockEvaluationClient::new(vec![Err("always failing".to_string())]),
            None,
            FeedbackLoopConfig {
                max_attempts,
                ..Default::default()
            },
        );

        let mut evaluation = EvaluationRun::new("goal");
        runner.run(&mut evaluation).await;

        assert_eq!(eval.call_count(), max_attempts as usize);
    }
}

/// Telemetry records collected for the attempt appear between the main
/// prompt and the supplementary text
#[tokio::test]
async fn test_composed_prompt_order() {
    let collector = MockCollector::new(vec![
        TelemetryBatch::collected(vec![TelemetryRecord::new(["TELEMETRY-MARKER"])]),
        TelemetryBatch::collected(vec![TelemetryRecord::new(["TELEMETRY-MARKER"])]),
    ]);
    let (runner, eval) = runner_with(
        MockEvaluationClient::new(vec![
            Err("ERROR-MARKER".to_string()),
            Ok("done".to_string()),
        ]),
        Some(collector),
        FeedbackLoopConfig {
            log_query: Some("AppServiceHTTPLogs | where StatusCode >= 400".to_string()),
            ..Default::default()
        },
    );

    let mut evaluation = EvaluationRun::new("GOAL-MARKER");
    runner.run(&mut evaluation).await;

    // Attempt 2: main prompt, then telemetry, then the fed-back error
    let prompt = &eval.prompts()[1];
    let goal_at = prompt.find("GOAL-MARKER").unwrap();
    let telemetry_at = prompt.find("TELEMETRY-MARKER").unwrap();
    let error_at = prompt.find("ERROR-MARKER").unwrap();
    assert!(goal_at < telemetry_at && telemetry_at < error_at);
}

/// A failing provider yields an empty batch and the loop continues - the
/// collector contract is that it never raises
#[tokio::test]
async fn test_collector_failure_never_stops_the_loop() {
    let collector = MockCollector::new(vec![
        TelemetryBatch::failed("throttled by provider"),
        TelemetryBatch::failed("throttled by provider"),
    ]);
    let (runner, eval) = runner_with(
        MockEvaluationClient::new(vec![
            Err("bad response".to_string()),
            Ok("recovered".to_string()),
        ]),
        Some(collector),
        FeedbackLoopConfig {
            log_query: Some("query".to_string()),
            ..Default::default()
        },
    );

    let mut evaluation = EvaluationRun::new("goal");
    let outcome = runner.run(&mut evaluation).await;

    assert_eq!(outcome, EvaluationOutcome::Success("recovered".to_string()));
    // No telemetry block made it into any prompt
    for prompt in eval.prompts() {
        assert!(!prompt.contains("Logs:"));
    }
}

/// Direct collector contract check with an injected failure
#[tokio::test]
async fn test_collector_converts_failure_to_empty_batch() {
    let collector = MockCollector::new(vec![TelemetryBatch::failed("simulated outage")]);
    let batch = collector.collect("any query", Duration::from_secs(60)).await;

    assert!(batch.is_empty());
    assert!(!batch.succeeded());
}

/// Formatter is pure and total over the same input
#[test]
fn test_formatter_determinism() {
    let records = vec![
        TelemetryRecord::new(["2024-01-01T00:00:00Z", "503", "vm-1", "upstream timeout"]),
        TelemetryRecord::new(["2024-01-01T00:05:00Z", "200", "vm-2", "ok"]),
    ];

    assert_eq!(format_records(&records), format_records(&records));
    assert_eq!(format_records(&[]), "");
}

/// Cancellation before the first attempt runs zero iterations
#[tokio::test]
async fn test_cancellation_before_first_attempt() {
    let (runner, eval) = runner_with(
        MockEvaluationClient::always_succeeding("never returned"),
        None,
        FeedbackLoopConfig::default(),
    );

    let cancel = CancelToken::new();
    cancel.cancel();

    let mut evaluation = EvaluationRun::new("goal");
    let outcome = runner.run_with_cancel(&mut evaluation, &cancel).await;

    assert_eq!(outcome, EvaluationOutcome::Cancelled(None));
    assert_eq!(eval.call_count(), 0);
}

/// Requests carry a fresh 1-based iteration index
#[tokio::test]
async fn test_iteration_indices_are_one_based() {
    let request = EvaluationRequest::new("goal", "goal", 1);
    assert_eq!(request.iteration, 1);

    let (runner, _eval) = runner_with(
        MockEvaluationClient::new(vec![
            Err("e1".to_string()),
            Err("e2".to_string()),
            Err("e3".to_string()),
        ]),
        None,
        FeedbackLoopConfig {
            max_attempts: 3,
            ..Default::default()
        },
    );

    let mut evaluation = EvaluationRun::new("goal");
    runner.run(&mut evaluation).await;

    let indices: Vec<u32> = evaluation.attempts.iter().map(|a| a.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
}
