//! Transport to an MCP server running as a child process.
//!
//! The server is launched with all three standard streams piped. Requests
//! go to its stdin, responses come from its stdout, and stderr is drained in
//! the background for diagnostics.
//!
//! # Example
//!
//! ```no_run
//! use mcprobe_transport::{ProcessTransport, Transport};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), mcprobe_transport::TransportError> {
//! let mut transport = ProcessTransport::builder("java")
//!     .args(["-jar", "server.jar"])
//!     .env("MCP_LOG_LEVEL", "debug")
//!     .shutdown_grace(Duration::from_secs(5))
//!     .spawn()
//!     .await?;
//!
//! transport.write_line(br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await?;
//! let line = transport.read_line().await?;
//!
//! transport.terminate().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Lifecycle
//!
//! [`Transport::terminate`] closes stdin, sends SIGTERM, and waits for the
//! shutdown grace period before force-killing. The child is also spawned
//! with kill-on-drop, so a transport dropped without being terminated (for
//! example while unwinding) still takes its server down with it.

use crate::error::TransportError;
use crate::stderr::{DEFAULT_STDERR_CAPACITY, StderrCapture};
use crate::traits::{Transport, TransportMetadata};
use crate::{MAX_LINE_SIZE, preview};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, trace, warn};

/// Default time a server gets to exit after SIGTERM before it is killed.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How long `terminate` waits for the stderr collector to see end-of-input.
const STDERR_FLUSH_WAIT: Duration = Duration::from_millis(500);

/// A transport connected to a spawned server process via stdio.
#[derive(Debug)]
pub struct ProcessTransport {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr: StderrCapture,
    shutdown_grace: Duration,
    exit_status: Option<ExitStatus>,
    closed: bool,
    command: String,
    metadata: TransportMetadata,
}

impl ProcessTransport {
    /// Spawn `program` with `args` and extra environment variables.
    ///
    /// The child inherits the harness environment; `env` entries are added
    /// on top of it.
    pub async fn start<S, I, A, E, K, V>(program: S, args: I, env: E) -> Result<Self, TransportError>
    where
        S: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
        E: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        ProcessTransportBuilder::new(program)
            .args(args)
            .envs(env)
            .spawn()
            .await
    }

    /// Create a builder for more advanced configuration.
    #[must_use]
    pub fn builder<S: AsRef<OsStr>>(program: S) -> ProcessTransportBuilder {
        ProcessTransportBuilder::new(program)
    }

    /// Get the process ID of the child, if it has not been reaped yet.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Get the command line that was used to spawn this process.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Exit status recorded by [`Transport::terminate`].
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Check whether the child process is still running.
    pub fn is_running(&mut self) -> bool {
        self.child
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)))
    }

    async fn shutdown(&mut self, mut child: Child) -> Result<ExitStatus, TransportError> {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }

        if let Err(e) = request_exit(&mut child) {
            debug!(command = %self.command, error = %e, "Could not signal server");
        }

        match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!(
                    command = %self.command,
                    grace = ?self.shutdown_grace,
                    "Server did not exit after SIGTERM, killing"
                );
                child.kill().await?;
                Ok(child.wait().await?)
            }
        }
    }
}

#[cfg(unix)]
fn request_exit(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid).map_err(std::io::Error::other)?;
    kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn request_exit(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

impl Transport for ProcessTransport {
    async fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        if line.contains(&b'\n') {
            return Err(TransportError::EmbeddedNewline);
        }
        if line.len() > MAX_LINE_SIZE {
            return Err(TransportError::MessageTooLarge {
                size: line.len(),
                max: MAX_LINE_SIZE,
            });
        }

        let stdin = match (self.closed, self.stdin.as_mut()) {
            (false, Some(stdin)) => stdin,
            _ => return Err(TransportError::closed("server stdin is closed")),
        };

        let written = async {
            stdin.write_all(line).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                debug!(len = line.len(), preview = %preview(line), "Wrote line to server stdin");
                Ok(())
            }
            Err(e) => {
                let err = TransportError::Io(e);
                if err.is_closed() {
                    Err(TransportError::closed(format!(
                        "server stopped reading stdin: {err}"
                    )))
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::closed("transport terminated"));
        }

        loop {
            let mut line = Vec::new();
            let limit = MAX_LINE_SIZE as u64 + 1;
            let bytes_read = (&mut self.stdout)
                .take(limit)
                .read_until(b'\n', &mut line)
                .await?;

            if bytes_read == 0 {
                return Err(TransportError::closed("server closed its stdout"));
            }

            if line.last() == Some(&b'\n') {
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
            }

            if line.len() > MAX_LINE_SIZE {
                return Err(TransportError::MessageTooLarge {
                    size: line.len(),
                    max: MAX_LINE_SIZE,
                });
            }

            if line.iter().all(u8::is_ascii_whitespace) {
                trace!("Skipping blank line from server stdout");
                continue;
            }

            debug!(len = line.len(), preview = %preview(&line), "Read line from server stdout");
            return Ok(line);
        }
    }

    fn drain_stderr(&mut self) -> String {
        self.stderr.drain()
    }

    async fn terminate(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        // Closing stdin first lets servers that exit on EOF shut down cleanly.
        drop(self.stdin.take());

        let Some(child) = self.child.take() else {
            return Ok(());
        };

        let status = self.shutdown(child).await?;
        info!(command = %self.command, %status, "Server process exited");
        self.exit_status = Some(status);
        self.stderr.finish(STDERR_FLUSH_WAIT).await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed || self.child.is_none()
    }

    fn metadata(&self) -> TransportMetadata {
        self.metadata.clone()
    }
}

// No Drop impl: terminate() needs to await, and the child was spawned with
// kill_on_drop, so dropping the transport kills the server anyway. Tokio
// reaps the killed process in the background.

/// Builder for creating process transports with custom configuration.
///
/// # Example
///
/// ```no_run
/// use mcprobe_transport::ProcessTransportBuilder;
///
/// # async fn example() -> Result<(), mcprobe_transport::TransportError> {
/// let transport = ProcessTransportBuilder::new("my-server")
///     .arg("--config")
///     .arg("config.json")
///     .env("LOG_LEVEL", "debug")
///     .working_dir("/path/to/server")
///     .spawn()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProcessTransportBuilder {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    current_dir: Option<PathBuf>,
    clear_env: bool,
    shutdown_grace: Duration,
    stderr_capacity: usize,
}

impl ProcessTransportBuilder {
    /// Create a new builder for the given program.
    #[must_use]
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: PathBuf::from(program.as_ref()),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            clear_env: false,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            stderr_capacity: DEFAULT_STDERR_CAPACITY,
        }
    }

    /// Add a single argument.
    #[must_use]
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Add multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable.
    #[must_use]
    pub fn env<K: AsRef<OsStr>, V: AsRef<OsStr>>(mut self, key: K, value: V) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Set multiple environment variables.
    #[must_use]
    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.envs.extend(
            envs.into_iter()
                .map(|(k, v)| (k.as_ref().to_os_string(), v.as_ref().to_os_string())),
        );
        self
    }

    /// Set the working directory for the child process.
    #[must_use]
    pub fn working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Clear the environment variables before adding new ones.
    ///
    /// By default, the child inherits the parent's environment.
    #[must_use]
    pub const fn clear_env(mut self) -> Self {
        self.clear_env = true;
        self
    }

    /// Time to wait after SIGTERM before killing the server.
    #[must_use]
    pub const fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Maximum number of stderr bytes to retain for diagnostics.
    #[must_use]
    pub const fn stderr_capacity(mut self, bytes: usize) -> Self {
        self.stderr_capacity = bytes;
        self
    }

    /// The command line this builder will run, for display.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(OsStr::to_string_lossy)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Spawn the process and create the transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn spawn(self) -> Result<ProcessTransport, TransportError> {
        let command_line = self.command_line();
        let mut command = Command::new(&self.program);

        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.clear_env {
            command.env_clear();
        }

        for (key, value) in &self.envs {
            command.env(key, value);
        }

        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| TransportError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(TransportError::closed(
                "child process was spawned without piped stdio",
            ));
        };

        let pid = child.id();
        info!(pid, command = %command_line, "Spawned server process");

        let stderr = StderrCapture::spawn(stderr, self.stderr_capacity, command_line.clone());
        let metadata = TransportMetadata::new("process-stdio")
            .remote_addr(command_line.clone())
            .pid(pid)
            .connected_now();

        Ok(ProcessTransport {
            child: Some(child),
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            stderr,
            shutdown_grace: self.shutdown_grace,
            exit_status: None,
            closed: false,
            command: command_line,
            metadata,
        })
    }
}
