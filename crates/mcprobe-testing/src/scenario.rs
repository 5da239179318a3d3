//! Scenario tables.
//!
//! A [`Scenario`] is an ordered list of [`Step`]s. Each step performs one
//! [`Action`] against the server and states what it expects back: a success
//! or a JSON-RPC error, plus any number of [`Check`]s on the returned JSON.
//!
//! ```rust
//! use mcprobe_testing::scenario::{Action, Check, Expectation, Scenario, Step};
//! use serde_json::json;
//!
//! let scenario = Scenario::new("greeting")
//!     .description("Calls the hello tool")
//!     .step(Step::new("initialize", Action::initialize()))
//!     .step(
//!         Step::new("hello Alice", Action::call_tool("hello", json!({"name": "Alice"})))
//!             .expect(Expectation::success().check(Check::contains("content[0].text", "Alice"))),
//!     );
//!
//! assert_eq!(scenario.steps.len(), 2);
//! ```

use mcprobe_core::capability::ClientInfo;
use mcprobe_core::types::{
    CallToolResult, ListResourcesResult, ListToolsResult, ReadResourceResult,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// A named, ordered sequence of steps.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Scenario description.
    pub description: Option<String>,
    /// Steps to execute, in order.
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Create an empty scenario.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps: Vec::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// One request and what is expected of its answer.
#[derive(Debug, Clone)]
pub struct Step {
    /// Step name, shown in reports.
    pub name: String,
    /// What to send.
    pub action: Action,
    /// What must come back.
    pub expect: Expectation,
    /// Overrides the client's default timeout for this step.
    pub timeout: Option<Duration>,
}

impl Step {
    /// A step that expects a plain success.
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            action,
            expect: Expectation::success(),
            timeout: None,
        }
    }

    /// Set the expectation.
    #[must_use]
    pub fn expect(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }

    /// Set a per-step timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A request a step can make.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The `initialize` handshake. Unset fields come from the client config.
    Initialize {
        /// Client identity to announce.
        client_info: Option<ClientInfo>,
        /// Protocol version to request.
        protocol_version: Option<String>,
    },
    /// `tools/list`.
    ListTools,
    /// `tools/call`.
    CallTool {
        /// Tool name.
        name: String,
        /// Tool arguments.
        arguments: Value,
    },
    /// `resources/list`.
    ListResources,
    /// `resources/read`.
    ReadResource {
        /// Resource URI.
        uri: String,
    },
    /// Any other method, sent as is.
    Raw {
        /// Method name.
        method: String,
        /// Request parameters.
        params: Value,
    },
}

impl Action {
    /// Handshake with the client's configured identity.
    #[must_use]
    pub const fn initialize() -> Self {
        Self::Initialize {
            client_info: None,
            protocol_version: None,
        }
    }

    /// Handshake with an explicit identity and protocol version.
    pub fn initialize_as(
        name: impl Into<String>,
        version: impl Into<String>,
        protocol_version: impl Into<String>,
    ) -> Self {
        Self::Initialize {
            client_info: Some(ClientInfo::new(name, version)),
            protocol_version: Some(protocol_version.into()),
        }
    }

    /// Call a tool.
    pub fn call_tool(name: impl Into<String>, arguments: Value) -> Self {
        Self::CallTool {
            name: name.into(),
            arguments,
        }
    }

    /// Read a resource.
    pub fn read_resource(uri: impl Into<String>) -> Self {
        Self::ReadResource { uri: uri.into() }
    }

    /// Send an arbitrary method.
    pub fn raw(method: impl Into<String>, params: Value) -> Self {
        Self::Raw {
            method: method.into(),
            params,
        }
    }

    /// The JSON-RPC method this action sends.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::ListTools => "tools/list",
            Self::CallTool { .. } => "tools/call",
            Self::ListResources => "resources/list",
            Self::ReadResource { .. } => "resources/read",
            Self::Raw { method, .. } => method,
        }
    }

    /// Request parameters for every action except [`Action::Initialize`],
    /// whose parameters depend on the client config.
    #[must_use]
    pub fn params(&self) -> Value {
        match self {
            Self::Initialize { .. } | Self::ListTools | Self::ListResources => {
                Value::Object(serde_json::Map::new())
            }
            Self::CallTool { name, arguments } => {
                serde_json::json!({ "name": name, "arguments": arguments })
            }
            Self::ReadResource { uri } => serde_json::json!({ "uri": uri }),
            Self::Raw { params, .. } => params.clone(),
        }
    }

    /// Check that a successful result has the shape MCP prescribes for this
    /// method. Raw and handshake results are not checked here.
    pub fn validate_shape(&self, result: &Value) -> Result<(), String> {
        let shape = match self {
            Self::ListTools => decode_as::<ListToolsResult>(result),
            Self::CallTool { .. } => decode_as::<CallToolResult>(result),
            Self::ListResources => decode_as::<ListResourcesResult>(result),
            Self::ReadResource { .. } => decode_as::<ReadResourceResult>(result),
            Self::Initialize { .. } | Self::Raw { .. } => Ok(()),
        };
        shape.map_err(|e| format!("{} result has the wrong shape: {e}", self.method()))
    }
}

fn decode_as<T: DeserializeOwned>(value: &Value) -> Result<(), serde_json::Error> {
    T::deserialize(value).map(drop)
}

/// What kind of answer a step expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A `result`.
    Success,
    /// An `error`, optionally with a specific code.
    RemoteError {
        /// Required error code.
        code: Option<i64>,
    },
}

/// The expected answer to a step.
///
/// For [`Outcome::Success`] the checks run against the result. For
/// [`Outcome::RemoteError`] they run against the error object
/// (`{code, message, data}`).
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    /// Success or error.
    pub outcome: Outcome,
    /// Checks on the returned JSON.
    pub checks: Vec<Check>,
}

impl Expectation {
    /// Expect a result.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            outcome: Outcome::Success,
            checks: Vec::new(),
        }
    }

    /// Expect a JSON-RPC error with any code.
    #[must_use]
    pub const fn remote_error() -> Self {
        Self {
            outcome: Outcome::RemoteError { code: None },
            checks: Vec::new(),
        }
    }

    /// Require a specific error code.
    #[must_use]
    pub const fn code(mut self, code: i64) -> Self {
        self.outcome = Outcome::RemoteError { code: Some(code) };
        self
    }

    /// Add a check.
    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }
}

/// How much a failed check matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A failure fails the step.
    Hard,
    /// A failure is reported as a warning.
    Soft,
}

/// What a check asserts about the value at its path.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckKind {
    /// The path exists.
    Present,
    /// The value equals this JSON.
    Equals(Value),
    /// The value is a non-empty string.
    NonEmptyText,
    /// The value is a string containing this text.
    Contains(String),
    /// The value is a string that does not contain this text.
    Excludes(String),
    /// The value is an array with an element matching `value`, comparing the
    /// element's `key` member when set and the whole element otherwise.
    ArrayContains {
        /// Member to compare inside each element.
        key: Option<String>,
        /// Value to look for.
        value: Value,
    },
}

/// An assertion on one JSON path of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    /// Dot-separated path with `[n]` indices, e.g. `content[0].text`.
    pub path: String,
    /// What to assert.
    pub kind: CheckKind,
    /// Hard or soft.
    pub severity: Severity,
}

impl Check {
    fn hard(path: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            path: path.into(),
            kind,
            severity: Severity::Hard,
        }
    }

    /// The path exists.
    pub fn present(path: impl Into<String>) -> Self {
        Self::hard(path, CheckKind::Present)
    }

    /// The value at `path` equals `expected`.
    pub fn equals(path: impl Into<String>, expected: Value) -> Self {
        Self::hard(path, CheckKind::Equals(expected))
    }

    /// The value at `path` is a non-empty string.
    pub fn non_empty_text(path: impl Into<String>) -> Self {
        Self::hard(path, CheckKind::NonEmptyText)
    }

    /// The string at `path` contains `needle`.
    pub fn contains(path: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::hard(path, CheckKind::Contains(needle.into()))
    }

    /// The string at `path` does not contain `needle`.
    pub fn excludes(path: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::hard(path, CheckKind::Excludes(needle.into()))
    }

    /// The array at `path` has an element whose `key` member equals `value`.
    pub fn array_contains(
        path: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::hard(
            path,
            CheckKind::ArrayContains {
                key: Some(key.into()),
                value: value.into(),
            },
        )
    }

    /// The array at `path` has an element equal to `value`.
    pub fn array_contains_value(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::hard(
            path,
            CheckKind::ArrayContains {
                key: None,
                value: value.into(),
            },
        )
    }

    /// Downgrade a failure of this check to a warning.
    #[must_use]
    pub const fn soft(mut self) -> Self {
        self.severity = Severity::Soft;
        self
    }

    /// Whether a failure only warns.
    #[must_use]
    pub const fn is_soft(&self) -> bool {
        matches!(self.severity, Severity::Soft)
    }

    /// Validate `root` against this check.
    pub fn validate(&self, root: &Value) -> Result<(), String> {
        let Some(value) = get_json_path(root, &self.path) else {
            return Err(format!("'{}' is missing", self.path));
        };

        match &self.kind {
            CheckKind::Present => Ok(()),
            CheckKind::Equals(expected) => {
                if value == expected {
                    Ok(())
                } else {
                    Err(format!("'{}' is {value}, expected {expected}", self.path))
                }
            }
            CheckKind::NonEmptyText => match value.as_str() {
                Some(text) if !text.trim().is_empty() => Ok(()),
                Some(_) => Err(format!("'{}' is empty", self.path)),
                None => Err(self.not_a_string(value)),
            },
            CheckKind::Contains(needle) => {
                let text = value.as_str().ok_or_else(|| self.not_a_string(value))?;
                if text.contains(needle.as_str()) {
                    Ok(())
                } else {
                    Err(format!(
                        "'{}' does not contain {needle:?}: {}",
                        self.path,
                        excerpt(text)
                    ))
                }
            }
            CheckKind::Excludes(needle) => {
                let text = value.as_str().ok_or_else(|| self.not_a_string(value))?;
                if text.contains(needle.as_str()) {
                    Err(format!(
                        "'{}' contains {}: {}",
                        self.path,
                        excerpt(&format!("{needle:?}")),
                        excerpt(text)
                    ))
                } else {
                    Ok(())
                }
            }
            CheckKind::ArrayContains { key, value: wanted } => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("'{}' is not an array", self.path))?;
                let found = items.iter().any(|item| match key {
                    Some(key) => item.get(key) == Some(wanted),
                    None => item == wanted,
                });
                if found {
                    Ok(())
                } else {
                    let label = key.as_deref().unwrap_or("element");
                    Err(format!("'{}' has no {label} equal to {wanted}", self.path))
                }
            }
        }
    }

    fn not_a_string(&self, value: &Value) -> String {
        format!("'{}' is not a string: {value}", self.path)
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = &self.path;
        match &self.kind {
            CheckKind::Present => write!(f, "{path} is present"),
            CheckKind::Equals(v) => write!(f, "{path} == {v}"),
            CheckKind::NonEmptyText => write!(f, "{path} is non-empty text"),
            CheckKind::Contains(s) => write!(f, "{path} contains {s:?}"),
            CheckKind::Excludes(s) => write!(f, "{path} excludes {}", excerpt(&format!("{s:?}"))),
            CheckKind::ArrayContains { key: Some(k), value } => {
                write!(f, "{path} has an element with {k} == {value}")
            }
            CheckKind::ArrayContains { key: None, value } => write!(f, "{path} contains {value}"),
        }
    }
}

/// Keep failure messages readable when the text is long.
fn excerpt(text: &str) -> String {
    const LIMIT: usize = 80;
    if text.chars().count() <= LIMIT {
        return text.to_string();
    }
    let head: String = text.chars().take(LIMIT).collect();
    format!("{head}...")
}

/// Look up a value by dot notation path with `[n]` array indices.
///
/// `content[0].text`, `tools`, `serverInfo.name` and `[0]` are all valid.
/// An empty path is the root.
#[must_use]
pub fn get_json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let (key, mut rest) = match part.find('[') {
            Some(open) => part.split_at(open),
            None => (part, ""),
        };
        if !key.is_empty() {
            current = current.get(key)?;
        }
        while !rest.is_empty() {
            let inner = rest.strip_prefix('[')?;
            let close = inner.find(']')?;
            let index = inner[..close].parse::<usize>().ok()?;
            current = current.get(index)?;
            rest = &inner[close + 1..];
        }
    }
    Some(current)
}
