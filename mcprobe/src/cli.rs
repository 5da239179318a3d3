//! Command-line interface.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Launch an MCP server over stdio and check how it behaves.
#[derive(Debug, Parser)]
#[command(name = "mcprobe", version, about, long_about = None)]
pub struct Cli {
    /// Server program to launch. A path ending in `.jar` is run with `java -jar`.
    pub server: PathBuf,

    /// Arguments passed to the server (after `--`).
    #[arg(last = true)]
    pub server_args: Vec<String>,

    /// Extra environment variable for the server, as KEY=VALUE. Repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Working directory for the server.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Java launcher used for `.jar` servers. Defaults to `$JAVA_HOME/bin/java`, then `java`.
    #[arg(long, value_name = "PATH")]
    pub java: Option<PathBuf>,

    /// Seconds to wait for each response.
    #[arg(long, value_name = "SECS", env = "MCPROBE_TIMEOUT", default_value = "30", value_parser = parse_seconds)]
    pub timeout: Duration,

    /// Seconds the server gets to exit after SIGTERM before it is killed.
    #[arg(long, value_name = "SECS", env = "MCPROBE_GRACE", default_value = "2", value_parser = parse_seconds)]
    pub grace: Duration,

    /// Protocol version requested in the handshake.
    #[arg(long, value_name = "VERSION")]
    pub protocol_version: Option<String>,

    /// Client name announced in the handshake.
    #[arg(long, value_name = "NAME")]
    pub client_name: Option<String>,

    /// Client version announced in the handshake.
    #[arg(long, value_name = "VERSION")]
    pub client_version: Option<String>,

    /// Scenario to run.
    #[arg(long, value_enum, default_value_t = ScenarioChoice::HelloWorld)]
    pub scenario: ScenarioChoice,

    /// Report format written to stdout.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,

    /// Log level for harness logs on stderr. `RUST_LOG` takes precedence.
    #[arg(long, value_name = "LEVEL", env = "MCPROBE_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Built-in scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioChoice {
    /// Full hello-world tool and resource sequence.
    HelloWorld,
    /// The `rag_query` knowledge-base tool.
    Rag,
    /// Handshake plus tool and resource discovery.
    Smoke,
}

impl ScenarioChoice {
    /// Scenario name as used by `scenario_by_name`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HelloWorld => "hello-world",
            Self::Rag => "rag",
            Self::Smoke => "smoke",
        }
    }
}

/// Report output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// One line per step.
    #[default]
    Text,
    /// The full report as JSON.
    Json,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("expected a number of seconds, got '{raw}'"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("seconds must be positive, got '{raw}'"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}
