//! Scenario tables, reports, and a mock server for the mcprobe harness.
//!
//! This crate drives an MCP server through an [`mcprobe_client::Client`] and
//! reports what happened. It includes:
//!
//! - A scenario model: ordered steps, each an action plus the checks its
//!   answer must satisfy
//! - A runner that turns a scenario into a serializable [`ScenarioReport`]
//! - The built-in `hello-world` and `smoke` scenarios
//! - A scripted mock server, also shipped as the `mcprobe-mock-server` binary
//!
//! # Overview
//!
//! ```no_run
//! use mcprobe_client::ClientBuilder;
//! use mcprobe_testing::fixtures::hello_world_scenario;
//! use mcprobe_transport::ProcessTransport;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ProcessTransport::builder("my-mcp-server").spawn().await?;
//! let mut client = ClientBuilder::new().build(transport);
//!
//! let report = hello_world_scenario().run(&mut client).await;
//! client.close().await?;
//!
//! for step in &report.steps {
//!     println!("{} {} {}", step.index, step.status, step.name);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod assertions;
pub mod fixtures;
pub mod mock;
pub mod runner;
pub mod scenario;

pub use fixtures::{hello_world_scenario, rag_scenario, scenario_by_name, smoke_scenario};
pub use mock::{MockServer, Mode};
pub use runner::{FatalError, ScenarioReport, StepReport, StepStatus, run_scenario};
pub use scenario::{Action, Check, Expectation, Scenario, Step};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::assertions::{
        assert_fatal_kind, assert_report_passed, assert_step_status, assert_tool_error,
        assert_tool_success,
    };
    pub use crate::fixtures::{hello_world_scenario, rag_scenario, smoke_scenario};
    pub use crate::runner::{ScenarioReport, StepStatus, run_scenario};
    pub use crate::scenario::{Action, Check, Expectation, Scenario, Step};
}
