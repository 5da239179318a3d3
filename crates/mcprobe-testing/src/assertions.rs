//! Assertion helpers for tests that drive a server through the harness.

use crate::runner::{ScenarioReport, StepStatus};
use mcprobe_core::types::CallToolResult;

fn joined_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|c| c.as_text())
        .collect::<Vec<_>>()
        .join("")
}

/// Assert that a tool result is successful and contains expected text.
///
/// # Panics
///
/// Panics if the result is an error or doesn't contain the expected text.
pub fn assert_tool_success(result: &CallToolResult, expected_text: &str) {
    assert!(
        !result.is_error(),
        "Expected successful tool result, but got error: {}",
        joined_text(result)
    );
    assert!(!result.content.is_empty(), "Tool result has no content");

    let text = joined_text(result);
    assert!(
        text.contains(expected_text),
        "Expected tool result to contain '{expected_text}', but got '{text}'"
    );
}

/// Assert that a tool result is an error with expected message.
///
/// # Panics
///
/// Panics if the result is successful or doesn't contain the expected message.
pub fn assert_tool_error(result: &CallToolResult, expected_message: &str) {
    assert!(
        result.is_error(),
        "Expected error tool result, but got success"
    );

    let text = joined_text(result);
    assert!(
        text.contains(expected_message),
        "Expected error message to contain '{expected_message}', but got '{text}'"
    );
}

/// Assert that every step of a report passed or only warned.
///
/// # Panics
///
/// Panics with the failing steps and any fatal error otherwise.
pub fn assert_report_passed(report: &ScenarioReport) {
    if report.passed() {
        return;
    }
    let failures: Vec<String> = report
        .steps
        .iter()
        .filter(|s| s.status.is_failure())
        .map(|s| format!("#{} {} [{}]: {}", s.index, s.name, s.status, s.messages.join("; ")))
        .collect();
    panic!(
        "Scenario '{}' did not pass:\n{}\nfatal: {:?}",
        report.scenario,
        failures.join("\n"),
        report.fatal
    );
}

/// Assert the status of the step at one-based `index`.
///
/// # Panics
///
/// Panics if there is no such step or its status differs.
pub fn assert_step_status(report: &ScenarioReport, index: usize, expected: StepStatus) {
    let step = report
        .steps
        .iter()
        .find(|s| s.index == index)
        .unwrap_or_else(|| panic!("Scenario '{}' has no step #{index}", report.scenario));
    assert_eq!(
        step.status, expected,
        "Step #{index} '{}' has status {} ({:?}), expected {expected}",
        step.name, step.status, step.messages
    );
}

/// Assert that a run ended with a fatal error of the given kind.
///
/// # Panics
///
/// Panics if the run had no fatal error or it was of another kind.
pub fn assert_fatal_kind(report: &ScenarioReport, kind: &str) {
    let fatal = report
        .fatal
        .as_ref()
        .unwrap_or_else(|| panic!("Scenario '{}' ended without a fatal error", report.scenario));
    assert_eq!(fatal.kind, kind, "unexpected fatal error: {}", fatal.message);
}
