//! Report rendering.

use crate::cli::ReportFormat;
use mcprobe_testing::runner::{ScenarioReport, StepStatus};
use std::fmt::Write;

/// Render a report in the requested format.
pub fn render(report: &ScenarioReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Json => serde_json::to_string_pretty(report),
    }
}

/// One line per step, with messages indented underneath.
#[must_use]
pub fn render_text(report: &ScenarioReport) -> String {
    let mut out = String::new();
    let server = report.server.as_deref().unwrap_or("<unnamed server>");
    let _ = writeln!(
        out,
        "Scenario '{}' against {server} (session {})",
        report.scenario, report.session_id
    );

    for step in &report.steps {
        let _ = writeln!(
            out,
            "  [{:<5}] {:>2}. {} ({}) {}ms",
            step.status.to_string(),
            step.index,
            step.name,
            step.method,
            step.duration.as_millis()
        );
        for message in &step.messages {
            for line in message.lines() {
                let _ = writeln!(out, "            {line}");
            }
        }
    }

    if let Some(fatal) = &report.fatal {
        let _ = writeln!(out, "Fatal: {}: {}", fatal.kind, fatal.message);
    }

    let verdict = if report.passed() { "PASSED" } else { "FAILED" };
    let _ = writeln!(
        out,
        "Result: {verdict} ({} passed, {} warned, {} failed, {} fatal, {} skipped) in {}ms",
        report.count(StepStatus::Passed),
        report.count(StepStatus::Warned),
        report.count(StepStatus::Failed),
        report.count(StepStatus::Fatal),
        report.count(StepStatus::Skipped),
        report.duration.as_millis()
    );
    out
}
