//! # mcprobe
//!
//! A command-line harness for servers that speak the Model Context Protocol
//! over stdio. It launches the server as a child process, performs the
//! `initialize` handshake, runs a scenario of tool and resource calls, and
//! reports each step as passed, warned, failed, fatal, or skipped.
//!
//! ```text
//! mcprobe [OPTIONS] <SERVER> [-- <SERVER_ARGS>...]
//! ```
//!
//! ## Crate Organization
//!
//! - [`mcprobe_core`] - JSON-RPC and MCP wire types, line framing
//! - [`mcprobe_transport`] - Child-process stdio transport with stderr capture
//! - [`mcprobe_client`] - Correlating client with timeouts and an error taxonomy
//! - [`mcprobe_testing`] - Scenario model, runner, reports, and mock server
//!
//! This crate adds the command line, configuration, logging setup, and
//! report rendering on top.

#![deny(missing_docs)]
#![warn(clippy::unwrap_used)]

pub mod cli;
pub mod config;
pub mod logging;
pub mod report;

pub use mcprobe_client::{Client, ClientBuilder, ClientError, SessionState};
pub use mcprobe_testing::{Scenario, ScenarioReport, StepStatus};
pub use mcprobe_transport::{ProcessTransport, Transport};

use config::HarnessConfig;
use miette::{IntoDiagnostic, miette};
use std::path::PathBuf;
use tracing::{info, warn};

/// How a harness run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The scenario ran to the end, or to its first fatal error.
    Completed(ScenarioReport),
    /// The run was interrupted with Ctrl-C.
    Interrupted,
}

/// Launch the configured server, run the configured scenario, and terminate
/// the server on every path out.
///
/// Only failures that happen before the scenario starts (unknown scenario,
/// spawn failure) are returned as errors. Failures during the run are part
/// of the report.
pub async fn run(config: &HarnessConfig) -> miette::Result<RunOutcome> {
    let scenario = mcprobe_testing::scenario_by_name(config.scenario.name())
        .ok_or_else(|| miette!("Unknown scenario '{}'", config.scenario.name()))?;

    let java_home = std::env::var_os("JAVA_HOME").map(PathBuf::from);
    let builder = config.process_builder(java_home.as_deref());
    let command_line = builder.command_line();

    let transport = builder.spawn().await.map_err(ClientError::Spawn)?;
    info!(command = %command_line, pid = ?transport.pid(), "Server started");

    let mut client = config.client_builder().build(transport);

    let outcome = tokio::select! {
        report = scenario.run(&mut client) => Ok(RunOutcome::Completed(report)),
        signal = tokio::signal::ctrl_c() => signal.into_diagnostic().map(|()| {
            warn!("Interrupted, terminating server");
            RunOutcome::Interrupted
        }),
    };

    if let Err(e) = client.close().await {
        warn!(error = %e, "Failed to terminate server cleanly");
    }
    info!(
        exit_status = ?client.transport().exit_status(),
        "Server terminated"
    );

    outcome
}
