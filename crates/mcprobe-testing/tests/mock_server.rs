//! End-to-end runs against the `mcprobe-mock-server` binary over real pipes.

use mcprobe_client::{Client, ClientBuilder, ClientError, SessionState};
use mcprobe_testing::mock::CRASH_EXIT_CODE;
use mcprobe_testing::prelude::*;
use mcprobe_transport::ProcessTransport;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::{Duration, Instant};

const MOCK: &str = env!("CARGO_BIN_EXE_mcprobe-mock-server");

async fn spawn(mode: &str, extra: &[&str]) -> Client<ProcessTransport> {
    let transport = ProcessTransport::builder(MOCK)
        .args(["--mode", mode])
        .args(extra)
        .shutdown_grace(Duration::from_secs(1))
        .spawn()
        .await
        .expect("mock server should start");
    ClientBuilder::new()
        .name("test-client")
        .version("1.0.0")
        .timeout(Duration::from_secs(10))
        .build(transport)
}

#[tokio::test]
async fn test_hello_world_scenario_passes() {
    let mut client = spawn("conforming", &[]).await;

    let report = hello_world_scenario().run(&mut client).await;

    assert_report_passed(&report);
    assert_eq!(report.count(StepStatus::Passed), 10);
    assert_eq!(report.server.as_deref(), Some("hello-world-server"));
    assert_eq!(client.state(), SessionState::Active);

    client.close().await.unwrap();
    let status = client.transport().exit_status().expect("child should be reaped");
    assert!(status.success());
}

#[tokio::test]
async fn test_smoke_scenario_passes() {
    let mut client = spawn("conforming", &[]).await;
    let report = smoke_scenario().run(&mut client).await;
    client.close().await.unwrap();

    assert_report_passed(&report);
    assert_eq!(report.steps.len(), 3);
}

#[tokio::test]
async fn test_rag_scenario_passes() {
    let mut client = spawn("conforming", &[]).await;
    let report = rag_scenario().run(&mut client).await;
    client.close().await.unwrap();

    assert_report_passed(&report);
    assert_eq!(report.count(StepStatus::Passed), 5);
}

#[tokio::test]
async fn test_rag_query_answers_from_knowledge_base() {
    let transport = ProcessTransport::builder(MOCK).spawn().await.unwrap();
    let mut client = ClientBuilder::new().connect(transport).await.unwrap();

    let answer = client
        .call_tool("rag_query", json!({"query": "What type is Lapras?", "topK": 3}))
        .await
        .unwrap();
    assert_tool_success(&answer, "Answer:\nLapras is a Water and Ice type Pokemon.");

    let blank = client.call_tool("rag_query", json!({"query": ""})).await.unwrap();
    assert_eq!(
        blank.first_text(),
        Some("Error: The 'query' parameter is required and cannot be empty.")
    );
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_typed_helpers() {
    let transport = ProcessTransport::builder(MOCK).spawn().await.unwrap();
    let mut client = ClientBuilder::new().connect(transport).await.unwrap();
    assert_eq!(client.state(), SessionState::Initialized);

    let tools: Vec<_> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(tools, vec!["hello", "echo", "rag_query"]);

    let hello = client.call_tool("hello", json!({"name": "Bob"})).await.unwrap();
    assert_tool_success(&hello, "Hello, Bob!");

    let empty_echo = client.call_tool("echo", json!({"message": ""})).await.unwrap();
    assert_tool_error(&empty_echo, "cannot be empty");

    let contents = client.read_resource("hello://greetings/Ada").await.unwrap();
    assert!(contents[0].as_text().unwrap().contains("Hello, Ada!"));

    let err = client.read_resource("hello://missing").await.unwrap_err();
    assert!(matches!(err, ClientError::Remote { code: -32002, .. }));
    assert_eq!(client.state(), SessionState::Active);

    client.close().await.unwrap();
    client.close().await.unwrap();
    assert!(client.transport().exit_status().is_some());
}

#[tokio::test]
async fn test_missing_server_name_only_warns() {
    let mut client = spawn("no-server-name", &[]).await;
    let report = hello_world_scenario().run(&mut client).await;
    client.close().await.unwrap();

    assert_report_passed(&report);
    assert_step_status(&report, 1, StepStatus::Warned);
    assert!(report.server.is_none());
}

#[tokio::test]
async fn test_crash_reports_server_died_with_stderr() {
    let mut client = spawn("crash-after", &["--crash-after", "3"]).await;

    let report = hello_world_scenario().run(&mut client).await;

    assert_fatal_kind(&report, "ServerDied");
    assert_step_status(&report, 3, StepStatus::Passed);
    assert_step_status(&report, 4, StepStatus::Fatal);
    assert_step_status(&report, 10, StepStatus::Skipped);
    let stderr = report.fatal.as_ref().unwrap().stderr.as_deref().unwrap();
    assert!(stderr.contains("IllegalStateException"), "{stderr}");

    assert_eq!(client.state(), SessionState::Closed);
    let status = client.transport().exit_status().expect("child should be reaped");
    assert_eq!(status.code(), Some(i32::from(CRASH_EXIT_CODE)));
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let mut client = spawn("silent", &[]).await;
    let mut scenario = smoke_scenario();
    scenario.steps[0].timeout = Some(Duration::from_millis(300));

    let started = Instant::now();
    let report = scenario.run(&mut client).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_fatal_kind(&report, "Timeout");
    assert_eq!(report.count(StepStatus::Skipped), 2);
    assert_eq!(client.state(), SessionState::Closed);
    assert!(client.transport().exit_status().is_some());
}

#[tokio::test]
async fn test_wrong_id_is_a_protocol_error() {
    let mut client = spawn("wrong-id", &[]).await;
    let report = hello_world_scenario().run(&mut client).await;

    assert_step_status(&report, 1, StepStatus::Passed);
    assert_fatal_kind(&report, "ProtocolError");
    assert!(report.fatal.unwrap().message.contains("does not match request id 2"));
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_stdout_logging_is_a_malformed_response() {
    let mut client = spawn("garbage", &[]).await;
    let report = hello_world_scenario().run(&mut client).await;

    assert_fatal_kind(&report, "MalformedResponse");
    let step = report.fatal_step().unwrap();
    assert_eq!(step.index, 2);
    assert!(step.messages.iter().any(|m| m.contains("INFO  [main]")));
}

#[tokio::test]
async fn test_version_mismatch_fails_handshake() {
    let mut client = spawn("reject-version", &[]).await;
    let report = hello_world_scenario().run(&mut client).await;

    assert_fatal_kind(&report, "HandshakeError");
    assert_step_status(&report, 1, StepStatus::Fatal);
    assert_eq!(report.count(StepStatus::Skipped), 9);
    assert!(client.transport().exit_status().is_some());
}

#[tokio::test]
async fn test_spawn_failure() {
    let err = ProcessTransport::builder("/definitely/not/a/server")
        .spawn()
        .await
        .unwrap_err();
    let err = ClientError::from_transport("initialize", err);
    assert_eq!(err.kind(), "SpawnError");
}
