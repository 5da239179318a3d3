//! Scenario execution and reports.
//!
//! Steps run in order against one [`Client`]. A failed check fails its step
//! and the run continues; a fatal client error ends the run, the remaining
//! steps are reported as skipped, and the report keeps the error together
//! with whatever the server wrote to stderr.

use crate::scenario::{Action, Expectation, Outcome, Scenario, Step};
use mcprobe_client::{Client, ClientError};
use mcprobe_transport::Transport;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Every check held.
    Passed,
    /// Only soft checks failed.
    Warned,
    /// The answer was wrong but the session survived.
    Failed,
    /// The session ended during this step.
    Fatal,
    /// Not run because an earlier step was fatal.
    Skipped,
}

impl StepStatus {
    /// Whether the step counts against the run.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Fatal | Self::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Passed => "PASS",
            Self::Warned => "WARN",
            Self::Failed => "FAIL",
            Self::Fatal => "FATAL",
            Self::Skipped => "SKIP",
        };
        f.write_str(label)
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// One-based position in the scenario.
    pub index: usize,
    /// Step name.
    pub name: String,
    /// JSON-RPC method that was sent.
    pub method: String,
    /// Step status.
    pub status: StepStatus,
    /// Failures, warnings, and other notes.
    pub messages: Vec<String>,
    /// Wall time spent on the step.
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

/// The error that ended a run.
#[derive(Debug, Clone, Serialize)]
pub struct FatalError {
    /// Error category, e.g. `ServerDied`.
    pub kind: String,
    /// Rendered error message.
    pub message: String,
    /// Captured server stderr, if the server wrote any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl From<&ClientError> for FatalError {
    fn from(err: &ClientError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            stderr: err.stderr().map(str::to_string),
        }
    }
}

/// Outcome of a whole scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub scenario: String,
    /// Session id of the client that ran it.
    pub session_id: String,
    /// Server name from the handshake, if one was reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Per-step results, in order.
    pub steps: Vec<StepReport>,
    /// The fatal error, if the run ended early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<FatalError>,
    /// Whether the whole run passed.
    pub passed: bool,
    /// Wall time for the run.
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl ScenarioReport {
    /// Whether every step passed or only warned.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.fatal.is_none() && !self.steps.iter().any(|s| s.status.is_failure())
    }

    /// Number of steps with the given status.
    #[must_use]
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// The step that ended the run, if any.
    #[must_use]
    pub fn fatal_step(&self) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.status == StepStatus::Fatal)
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(millis)
}

/// Run `scenario` against `client`.
///
/// The client is left open on success so the caller decides when to close
/// it; after a fatal error it is already closed.
pub async fn run_scenario<T: Transport>(
    scenario: &Scenario,
    client: &mut Client<T>,
) -> ScenarioReport {
    info!(scenario = %scenario.name, steps = scenario.steps.len(), "Running scenario");
    let started = Instant::now();
    let mut steps = Vec::with_capacity(scenario.steps.len());
    let mut fatal = None;

    for (position, step) in scenario.steps.iter().enumerate() {
        let index = position + 1;

        if fatal.is_some() {
            steps.push(StepReport {
                index,
                name: step.name.clone(),
                method: step.action.method().to_string(),
                status: StepStatus::Skipped,
                messages: Vec::new(),
                duration: Duration::ZERO,
            });
            continue;
        }

        let step_started = Instant::now();
        let response = perform(client, step).await;
        let (status, messages) = match response {
            Err(err) if err.is_fatal() => {
                let error = FatalError::from(&err);
                let mut messages = vec![format!("{}: {}", error.kind, error.message)];
                if let Some(help) = help_for(&err) {
                    messages.push(help);
                }
                fatal = Some(error);
                (StepStatus::Fatal, messages)
            }
            other => judge(step, other),
        };

        let report = StepReport {
            index,
            name: step.name.clone(),
            method: step.action.method().to_string(),
            status,
            messages,
            duration: step_started.elapsed(),
        };
        match status {
            StepStatus::Passed => debug!(index, step = %report.name, "Step passed"),
            StepStatus::Warned => {
                warn!(index, step = %report.name, messages = ?report.messages, "Step passed with warnings");
            }
            _ => warn!(index, step = %report.name, %status, messages = ?report.messages, "Step did not pass"),
        }
        steps.push(report);
    }

    let mut report = ScenarioReport {
        scenario: scenario.name.clone(),
        session_id: client.session_id().to_string(),
        server: client
            .server_info()
            .and_then(|s| s.server_name())
            .map(str::to_string),
        steps,
        fatal,
        passed: false,
        duration: started.elapsed(),
    };
    report.passed = report.passed();
    info!(
        scenario = %report.scenario,
        passed = report.passed,
        failed = report.count(StepStatus::Failed),
        warned = report.count(StepStatus::Warned),
        "Scenario finished"
    );
    report
}

impl Scenario {
    /// Run this scenario against `client`. See [`run_scenario`].
    pub async fn run<T: Transport>(&self, client: &mut Client<T>) -> ScenarioReport {
        run_scenario(self, client).await
    }
}

/// Send the step's request and return the raw result.
async fn perform<T: Transport>(client: &mut Client<T>, step: &Step) -> Result<Value, ClientError> {
    let timeout = step.timeout.unwrap_or(client.config().timeout);

    match &step.action {
        Action::Initialize {
            client_info,
            protocol_version,
        } => {
            let config = client.config();
            let info = client_info.clone().unwrap_or_else(|| config.client_info.clone());
            let version = protocol_version
                .clone()
                .unwrap_or_else(|| config.protocol_version.clone());

            let result = client
                .initialize_within(&info.name, &info.version, &version, timeout)
                .await?;
            serde_json::to_value(result).map_err(|e| ClientError::InvalidResult {
                method: "initialize".to_string(),
                reason: e.to_string(),
            })
        }
        action => client.call(action.method(), action.params(), timeout).await,
    }
}

/// Compare a non-fatal outcome with the step's expectation.
fn judge(step: &Step, response: Result<Value, ClientError>) -> (StepStatus, Vec<String>) {
    let Expectation { outcome, checks } = &step.expect;

    let subject = match (outcome, response) {
        (Outcome::Success, Ok(result)) => {
            if let Err(message) = step.action.validate_shape(&result) {
                return (StepStatus::Failed, vec![message]);
            }
            result
        }
        (Outcome::Success, Err(err)) => return (StepStatus::Failed, vec![err.to_string()]),
        (Outcome::RemoteError { .. }, Ok(_)) => {
            return (
                StepStatus::Failed,
                vec!["expected an error response, got a result".to_string()],
            );
        }
        (
            Outcome::RemoteError { code: expected },
            Err(ClientError::Remote {
                code,
                message,
                data,
            }),
        ) => {
            if let Some(wanted) = *expected {
                if wanted != code {
                    return (
                        StepStatus::Failed,
                        vec![format!("expected error code {wanted}, got {code}: {message}")],
                    );
                }
            }
            serde_json::json!({ "code": code, "message": message, "data": data })
        }
        (Outcome::RemoteError { .. }, Err(err)) => {
            return (StepStatus::Failed, vec![err.to_string()]);
        }
    };

    let mut status = StepStatus::Passed;
    let mut messages = Vec::new();
    for check in checks {
        if let Err(message) = check.validate(&subject) {
            if check.is_soft() {
                messages.push(format!("warning: {message}"));
                if status == StepStatus::Passed {
                    status = StepStatus::Warned;
                }
            } else {
                messages.push(message);
                status = StepStatus::Failed;
            }
        }
    }
    (status, messages)
}

fn help_for(err: &ClientError) -> Option<String> {
    match err {
        ClientError::MalformedResponse { raw, .. } => Some(format!("raw line: {raw}")),
        ClientError::Timeout { .. } => {
            Some("the server may be slow to start or may not flush stdout".to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Check;
    use mcprobe_client::{ClientBuilder, SessionState};
    use mcprobe_transport::{MemoryPeer, MemoryTransport};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn initialize_result(with_name: bool) -> Value {
        let mut result = json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
        });
        if with_name {
            result["serverInfo"] = json!({"name": "srv", "version": "1"});
        }
        result
    }

    /// Answer requests with `reply(method, params)` until the client goes away.
    fn serve<F>(mut peer: MemoryPeer, reply: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(request) = peer.recv_json().await {
                let method = request["method"].as_str().unwrap_or_default().to_string();
                // Returning drops the peer, which looks like the server exiting.
                let Some(mut response) = reply(&method, &request["params"]) else {
                    return;
                };
                response["jsonrpc"] = json!("2.0");
                response["id"] = request["id"].clone();
                peer.send_json(&response);
            }
        })
    }

    fn scenario() -> Scenario {
        Scenario::new("unit")
            .step(
                Step::new("initialize", Action::initialize())
                    .expect(Expectation::success().check(Check::present("serverInfo.name").soft())),
            )
            .step(
                Step::new("tools/list", Action::ListTools).expect(
                    Expectation::success().check(Check::array_contains("tools", "name", "hello")),
                ),
            )
            .step(
                Step::new("unknown", Action::raw("bogus", json!({})))
                    .expect(Expectation::remote_error().code(-32601)),
            )
    }

    #[tokio::test]
    async fn test_all_steps_pass() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |method, _| match method {
            "initialize" => Some(json!({"result": initialize_result(true)})),
            "tools/list" => Some(json!({"result": {"tools": [{"name": "hello"}]}})),
            _ => Some(json!({"error": {"code": -32601, "message": "nope"}})),
        });

        let mut client = ClientBuilder::new().build(transport);
        let report = scenario().run(&mut client).await;

        assert!(report.passed(), "{report:#?}");
        assert_eq!(report.count(StepStatus::Passed), 3);
        assert_eq!(report.server.as_deref(), Some("srv"));
        assert_eq!(client.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_soft_check_warns_hard_check_fails() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |method, _| match method {
            "initialize" => Some(json!({"result": initialize_result(false)})),
            "tools/list" => Some(json!({"result": {"tools": []}})),
            _ => Some(json!({"error": {"code": -32600, "message": "wrong code"}})),
        });

        let mut client = ClientBuilder::new().build(transport);
        let report = scenario().run(&mut client).await;

        let statuses: Vec<_> = report.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Warned, StepStatus::Failed, StepStatus::Failed]
        );
        assert!(report.steps[0].messages[0].starts_with("warning:"));
        assert!(report.steps[2].messages[0].contains("expected error code -32601"));
        assert!(!report.passed());
        assert!(report.fatal.is_none());
        assert_eq!(client.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_mistyped_server_name_only_warns() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |method, _| match method {
            "initialize" => {
                let mut result = initialize_result(false);
                result["serverInfo"] = json!({"name": 42, "version": "1"});
                Some(json!({"result": result}))
            }
            "tools/list" => Some(json!({"result": {"tools": [{"name": "hello"}]}})),
            _ => Some(json!({"error": {"code": -32601, "message": "nope"}})),
        });

        let mut client = ClientBuilder::new().build(transport);
        let report = scenario().run(&mut client).await;

        assert_eq!(report.steps[0].status, StepStatus::Warned);
        assert!(report.fatal.is_none());
        assert!(report.passed(), "{report:#?}");
        assert_eq!(report.server, None);
    }

    #[tokio::test]
    async fn test_fatal_error_skips_remaining_steps() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |method, _| match method {
            "initialize" => Some(json!({"result": initialize_result(true)})),
            _ => None,
        });

        let mut client = ClientBuilder::new().build(transport);
        let report = scenario().run(&mut client).await;

        let statuses: Vec<_> = report.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Passed, StepStatus::Fatal, StepStatus::Skipped]
        );
        let fatal = report.fatal.as_ref().unwrap();
        assert_eq!(fatal.kind, "ServerDied");
        assert_eq!(report.fatal_step().unwrap().index, 2);
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_wrong_shape_fails_step() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |_, _| Some(json!({"result": {"tools": 7}})));

        let mut client = ClientBuilder::new().build(transport);
        let report = Scenario::new("shape")
            .step(Step::new("tools/list", Action::ListTools))
            .run(&mut client)
            .await;

        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert!(report.steps[0].messages[0].contains("wrong shape"));
    }

    #[tokio::test]
    async fn test_unexpected_remote_error_fails_step() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |_, _| {
            Some(json!({"error": {"code": -32602, "message": "bad params"}}))
        });

        let mut client = ClientBuilder::new().build(transport);
        let report = Scenario::new("remote")
            .step(Step::new("read", Action::read_resource("x://y")))
            .step(Step::new("list", Action::ListResources))
            .run(&mut client)
            .await;

        assert_eq!(report.count(StepStatus::Failed), 2);
        assert!(report.steps[0].messages[0].contains("bad params"));
        assert!(report.fatal.is_none());
    }

    #[test]
    fn test_report_json_shape() {
        let report = ScenarioReport {
            scenario: "s".into(),
            session_id: "id".into(),
            server: None,
            steps: vec![StepReport {
                index: 1,
                name: "initialize".into(),
                method: "initialize".into(),
                status: StepStatus::Warned,
                messages: vec!["warning: x".into()],
                duration: Duration::from_millis(12),
            }],
            fatal: None,
            passed: true,
            duration: Duration::from_millis(15),
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["steps"][0]["status"], "warned");
        assert_eq!(value["steps"][0]["duration_ms"], 12);
        assert_eq!(value["duration_ms"], 15);
        assert!(value.get("fatal").is_none());
        assert!(report.passed());
    }
}
