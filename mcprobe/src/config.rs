//! Harness configuration.

use crate::cli::{Cli, LogFormat, ReportFormat, ScenarioChoice};
use mcprobe_client::{ClientBuilder, DEFAULT_TIMEOUT};
use mcprobe_core::capability::PROTOCOL_VERSION;
use mcprobe_transport::{DEFAULT_SHUTDOWN_GRACE, ProcessTransportBuilder};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to launch the server process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Server program, or a `.jar` file.
    pub server: PathBuf,
    /// Arguments for the server.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Working directory.
    pub cwd: Option<PathBuf>,
    /// Java launcher for `.jar` servers.
    pub java: Option<PathBuf>,
}

impl LaunchConfig {
    /// Whether the server is a jar that must be run through Java.
    #[must_use]
    pub fn is_jar(&self) -> bool {
        self.server
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
    }

    /// The program and arguments to execute.
    ///
    /// `java_home` is the value of `JAVA_HOME`, passed in so the choice can
    /// be tested without touching the process environment.
    #[must_use]
    pub fn command(&self, java_home: Option<&Path>) -> (OsString, Vec<OsString>) {
        let server_args = self.args.iter().map(OsString::from);
        if !self.is_jar() {
            return (self.server.clone().into_os_string(), server_args.collect());
        }

        let java = self.java.clone().map_or_else(
            || {
                java_home.map_or_else(
                    || OsString::from("java"),
                    |home| home.join("bin").join("java").into_os_string(),
                )
            },
            PathBuf::into_os_string,
        );
        let mut args = vec![OsString::from("-jar"), self.server.clone().into_os_string()];
        args.extend(server_args);
        (java, args)
    }
}

/// Everything a harness run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Server launch settings.
    pub launch: LaunchConfig,
    /// Default per-request timeout.
    pub timeout: Duration,
    /// Grace period between SIGTERM and kill.
    pub grace: Duration,
    /// Protocol version for the handshake.
    pub protocol_version: String,
    /// Client name for the handshake.
    pub client_name: String,
    /// Client version for the handshake.
    pub client_version: String,
    /// Scenario to run.
    pub scenario: ScenarioChoice,
    /// Report format.
    pub report: ReportFormat,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log format.
    pub log_format: LogFormat,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            launch: LaunchConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            grace: DEFAULT_SHUTDOWN_GRACE,
            protocol_version: PROTOCOL_VERSION.to_string(),
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            scenario: ScenarioChoice::HelloWorld,
            report: ReportFormat::Text,
            log_level: "warn".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl HarnessConfig {
    /// Build the configuration from parsed arguments, falling back to
    /// defaults for anything not given.
    #[must_use]
    pub fn from_cli(cli: Cli) -> Self {
        let defaults = Self::default();
        Self {
            launch: LaunchConfig {
                server: cli.server,
                args: cli.server_args,
                env: cli.env,
                cwd: cli.cwd,
                java: cli.java,
            },
            timeout: cli.timeout,
            grace: cli.grace,
            protocol_version: cli.protocol_version.unwrap_or(defaults.protocol_version),
            client_name: cli.client_name.unwrap_or(defaults.client_name),
            client_version: cli.client_version.unwrap_or(defaults.client_version),
            scenario: cli.scenario,
            report: cli.report,
            log_level: cli.log_level,
            log_format: cli.log_format,
        }
    }

    /// A process builder for the configured server.
    #[must_use]
    pub fn process_builder(&self, java_home: Option<&Path>) -> ProcessTransportBuilder {
        let (program, args) = self.launch.command(java_home);
        let mut builder = ProcessTransportBuilder::new(program)
            .args(args)
            .envs(self.launch.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .shutdown_grace(self.grace);
        if let Some(dir) = &self.launch.cwd {
            builder = builder.working_dir(dir);
        }
        builder
    }

    /// A client builder with the configured identity and timeout.
    #[must_use]
    pub fn client_builder(&self) -> ClientBuilder {
        ClientBuilder::new()
            .name(&self.client_name)
            .version(&self.client_version)
            .protocol_version(&self.protocol_version)
            .timeout(self.timeout)
    }
}
