//! A scripted hello-world MCP server.
//!
//! [`MockServer`] speaks newline-delimited JSON-RPC over any reader and
//! writer pair. In [`Mode::Conforming`] it behaves like a small, correct
//! server with `hello`, `echo`, and `rag_query` tools and two `hello://`
//! resources. `rag_query` answers from a few built-in passages ranked by
//! keyword overlap, standing in for a real retrieval pipeline.
//! The other modes misbehave in one specific way each, so the harness can be
//! tested against the failures it is meant to diagnose.
//!
//! ```rust
//! use mcprobe_testing::mock::{MockServer, Mode};
//!
//! let input = concat!(
//!     r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"1"}}}"#,
//!     "\n",
//!     r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"hello","arguments":{"name":"Alice"}}}"#,
//!     "\n",
//! );
//! let mut output = Vec::new();
//! let code = MockServer::new(Mode::Conforming)
//!     .serve(input.as_bytes(), &mut output, std::io::sink())
//!     .unwrap();
//!
//! assert_eq!(code, 0);
//! let output = String::from_utf8(output).unwrap();
//! assert!(output.lines().nth(1).unwrap().contains("Hello, Alice!"));
//! ```

use crate::fixtures::{
    DEFAULT_TOP_K, GREETING_URI_PREFIX, MAX_MESSAGE_LENGTH, MAX_NAME_LENGTH, RAG_TOOL_NAME,
    SERVER_INFO_URI, hello_world_resources, hello_world_tools,
};
use fancy_regex::Regex;
use mcprobe_core::capability::{
    InitializeRequest, InitializeResult, PROTOCOL_VERSION, ResourceCapability,
    ServerCapabilities, ServerInfo, ToolCapability, is_version_supported,
};
use mcprobe_core::error::JsonRpcError;
use mcprobe_core::protocol::{RequestId, Response};
use mcprobe_core::types::{
    CallToolRequest, CallToolResult, ListResourcesResult, ListToolsResult, ReadResourceRequest,
    ReadResourceResult, ResourceContents,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::sync::LazyLock;

/// Name the mock reports in `serverInfo`.
pub const MOCK_SERVER_NAME: &str = "hello-world-server";

/// Version the mock reports in `serverInfo`.
pub const MOCK_SERVER_VERSION: &str = "1.0.0";

/// Exit code used by [`Mode::CrashAfter`].
pub const CRASH_EXIT_CODE: u8 = 3;

/// How the mock behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    /// Answer every request correctly.
    #[default]
    Conforming,
    /// Read requests and never answer.
    Silent,
    /// Answer the configured number of requests, then write a stack trace
    /// to stderr and exit with [`CRASH_EXIT_CODE`].
    CrashAfter,
    /// Answer the handshake, then reply to everything with the wrong id.
    WrongId,
    /// Answer the handshake, then write log text instead of JSON.
    Garbage,
    /// Leave `serverInfo` out of the handshake result.
    NoServerName,
    /// Answer the handshake with a protocol version other than the one asked for.
    RejectVersion,
}

/// What the server does with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Write this line.
    Line(String),
    /// Write nothing.
    Nothing,
    /// Exit with [`CRASH_EXIT_CODE`].
    Crash,
}

#[derive(Debug, Deserialize)]
struct Incoming {
    #[serde(default)]
    id: Option<RequestId>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// The scripted server.
#[derive(Debug, Clone)]
pub struct MockServer {
    mode: Mode,
    crash_after: usize,
    initialized: bool,
    answered: usize,
}

impl MockServer {
    /// Create a server in the given mode. [`Mode::CrashAfter`] defaults to
    /// answering one request (the handshake).
    #[must_use]
    pub const fn new(mode: Mode) -> Self {
        Self {
            mode,
            crash_after: 1,
            initialized: false,
            answered: 0,
        }
    }

    /// Number of requests answered before a [`Mode::CrashAfter`] crash.
    #[must_use]
    pub const fn crash_after(mut self, requests: usize) -> Self {
        self.crash_after = requests;
        self
    }

    /// Serve until `input` ends. Returns the process exit code.
    ///
    /// Every request is logged to `diagnostics`, the way a real server logs
    /// to stderr.
    pub fn serve<R, W, E>(&mut self, input: R, mut output: W, mut diagnostics: E) -> io::Result<u8>
    where
        R: BufRead,
        W: Write,
        E: Write,
    {
        writeln!(diagnostics, "{MOCK_SERVER_NAME}: starting in {:?} mode", self.mode)?;
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            writeln!(diagnostics, "{MOCK_SERVER_NAME}: <- {}", preview(&line))?;

            match self.handle_line(&line)? {
                Reply::Line(reply) => {
                    writeln!(output, "{reply}")?;
                    output.flush()?;
                }
                Reply::Nothing => {}
                Reply::Crash => {
                    writeln!(
                        diagnostics,
                        "Exception in thread \"main\" java.lang.IllegalStateException: simulated crash after {} responses",
                        self.answered
                    )?;
                    writeln!(diagnostics, "\tat HelloWorldServer.handle(HelloWorldServer.kt:42)")?;
                    diagnostics.flush()?;
                    return Ok(CRASH_EXIT_CODE);
                }
            }
        }
        writeln!(diagnostics, "{MOCK_SERVER_NAME}: stdin closed, exiting")?;
        Ok(0)
    }

    /// Decide what to do with one input line.
    pub fn handle_line(&mut self, line: &str) -> Result<Reply, serde_json::Error> {
        let incoming: Incoming = match serde_json::from_str(line) {
            Ok(incoming) => incoming,
            Err(e) => {
                let error = JsonRpcError::parse_error(format!("Parse error: {e}"));
                let reply = json!({"jsonrpc": "2.0", "id": null, "error": error});
                return Ok(Reply::Line(reply.to_string()));
            }
        };
        let Some(id) = incoming.id else {
            // Notifications are accepted silently.
            return Ok(Reply::Nothing);
        };

        match self.mode {
            Mode::Silent => return Ok(Reply::Nothing),
            Mode::CrashAfter if self.answered >= self.crash_after => return Ok(Reply::Crash),
            _ => {}
        }

        let params = incoming.params.unwrap_or(Value::Null);
        let outcome = self.dispatch(&incoming.method, &params);
        self.answered += 1;

        let past_handshake = incoming.method != "initialize";
        if past_handshake && self.mode == Mode::Garbage {
            return Ok(Reply::Line(format!(
                "INFO  [main] HelloWorldServer - handled {}",
                incoming.method
            )));
        }
        let id = if past_handshake && self.mode == Mode::WrongId {
            wrong_id(&id)
        } else {
            id
        };

        let response = match outcome {
            Ok(result) => Response::success(id, result),
            Err(error) => Response::error(id, error),
        };
        serde_json::to_string(&response).map(Reply::Line)
    }

    fn dispatch(&mut self, method: &str, params: &Value) -> Result<Value, JsonRpcError> {
        if method == "initialize" {
            return self.initialize(params);
        }
        if !self.initialized {
            return Err(JsonRpcError::invalid_request("Server not initialized"));
        }

        match method {
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&ListToolsResult {
                tools: hello_world_tools(),
                next_cursor: None,
            }),
            "tools/call" => {
                let request: CallToolRequest = decode_params(params)?;
                to_result(&call_tool(&request)?)
            }
            "resources/list" => to_result(&ListResourcesResult {
                resources: hello_world_resources(),
                next_cursor: None,
            }),
            "resources/read" => {
                let request: ReadResourceRequest = decode_params(params)?;
                to_result(&read_resource(&request.uri)?)
            }
            other => Err(JsonRpcError::method_not_found(format!(
                "Method not found: {other}"
            ))),
        }
    }

    fn initialize(&mut self, params: &Value) -> Result<Value, JsonRpcError> {
        let request: InitializeRequest = decode_params(params)?;

        let requested = request.protocol_version;
        let protocol_version = match self.mode {
            Mode::RejectVersion if requested == "2025-06-18" => PROTOCOL_VERSION.to_string(),
            Mode::RejectVersion => "2025-06-18".to_string(),
            _ if is_version_supported(&requested) => requested,
            _ => PROTOCOL_VERSION.to_string(),
        };
        let server_info = (self.mode != Mode::NoServerName).then(|| ServerInfo {
            name: Some(MOCK_SERVER_NAME.to_string()),
            version: Some(MOCK_SERVER_VERSION.to_string()),
        });

        self.initialized = true;
        to_result(&InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolCapability {
                    list_changed: Some(true),
                }),
                resources: Some(ResourceCapability {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
                other: serde_json::Map::new(),
            },
            server_info,
            instructions: Some(
                "Call hello, echo, or rag_query, or read a hello:// resource.".to_string(),
            ),
        })
    }
}

fn call_tool(request: &CallToolRequest) -> Result<CallToolResult, JsonRpcError> {
    let argument = |key: &str| {
        request
            .arguments
            .as_ref()
            .and_then(|args| args.get(key))
            .and_then(Value::as_str)
    };

    match request.name.as_str() {
        "hello" => {
            let name = argument("name")
                .map(|raw| sanitize(raw, MAX_NAME_LENGTH))
                .filter(|name| !name.is_empty());
            Ok(CallToolResult::text(greeting(name.as_deref())))
        }
        "echo" => match argument("message") {
            Some(raw) if !raw.trim().is_empty() => {
                let message = sanitize(raw, MAX_MESSAGE_LENGTH);
                if message.is_empty() {
                    Ok(CallToolResult::error(
                        "Error: The message contains only invalid characters.",
                    ))
                } else {
                    Ok(CallToolResult::text(format!("Echo: {message}")))
                }
            }
            _ => Ok(CallToolResult::error(
                "Error: The 'message' parameter is required and cannot be empty.",
            )),
        },
        RAG_TOOL_NAME => match argument("query") {
            Some(query) if !query.trim().is_empty() => {
                let arguments = request.arguments.as_ref();
                let top_k = arguments
                    .and_then(|args| args.get("topK"))
                    .and_then(lenient_number)
                    .map_or(DEFAULT_TOP_K, |k| k.max(0.0) as usize);
                let min_similarity = arguments
                    .and_then(|args| args.get("minSimilarity"))
                    .and_then(lenient_number)
                    .unwrap_or(0.0);
                Ok(CallToolResult::text(rag_answer(query, top_k, min_similarity)))
            }
            _ => Ok(CallToolResult::text(
                "Error: The 'query' parameter is required and cannot be empty.",
            )),
        },
        other => Err(JsonRpcError::invalid_params(format!("Unknown tool: {other}"))),
    }
}

/// Passages the `rag_query` tool retrieves from: title, source, text.
const KNOWLEDGE_BASE: &[(&str, &str, &str)] = &[
    (
        "Lapras",
        "pokedex/lapras.md",
        "Lapras is a Water and Ice type Pokemon. It ferries people across the sea on its back.",
    ),
    (
        "Eevee",
        "pokedex/eevee.md",
        "Eevee is a Normal type Pokemon that can evolve into multiple forms, such as Vaporeon, Jolteon, and Flareon.",
    ),
    (
        "Pikachu",
        "pokedex/pikachu.md",
        "Pikachu is an Electric type Pokemon. It evolves into Raichu when exposed to a Thunder Stone.",
    ),
    (
        "Charizard",
        "pokedex/charizard.md",
        "Charizard is a Fire and Flying type Pokemon. It breathes flames hot enough to melt boulders.",
    ),
];

/// Numbers may arrive as JSON numbers or numeric strings.
fn lenient_number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Rank the built-in passages by the share of query terms they contain and
/// format the answer the way the hello-world server formats `rag_query`.
fn rag_answer(query: &str, top_k: usize, min_similarity: f64) -> String {
    let wanted = terms(query);
    let mut ranked: Vec<(f64, &(&str, &str, &str))> = KNOWLEDGE_BASE
        .iter()
        .map(|passage| {
            let have = terms(passage.2);
            let hits = wanted.iter().filter(|term| have.contains(term)).count();
            let similarity = if wanted.is_empty() {
                0.0
            } else {
                hits as f64 / wanted.len() as f64
            };
            (similarity, passage)
        })
        .filter(|(similarity, _)| *similarity > 0.0 && *similarity >= min_similarity)
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.truncate(top_k);

    let answer = ranked.first().map_or(
        "I could not find any relevant information in the knowledge base.",
        |(_, passage)| passage.2,
    );

    let rule = "=".repeat(60);
    let thin = "-".repeat(60);
    let mut out = format!(
        "Query: {query}\n\nAnswer:\n{answer}\n\n{rule}\nSources ({} chunks retrieved):\n{thin}\n",
        ranked.len()
    );
    for (index, (similarity, (title, source, text))) in ranked.iter().enumerate() {
        let _ = write!(
            out,
            "\n[{}] {title}\n    Source: {source}\n    Similarity: {similarity:.3}\n    Excerpt: {text}\n",
            index + 1
        );
    }
    out
}

fn greeting(name: Option<&str>) -> String {
    format!(
        "Hello, {}! Welcome to the MCP Hello World server!",
        name.unwrap_or("World")
    )
}

fn read_resource(uri: &str) -> Result<ReadResourceResult, JsonRpcError> {
    let text = if uri == SERVER_INFO_URI {
        format!(
            "MCP Hello World Server\n======================\nVersion: {MOCK_SERVER_VERSION}\n\n\
             Capabilities:\n- Tools: hello, echo, rag_query\n- Resources: server info, personalized greeting\n\
             - Input sanitization"
        )
    } else if let Some(raw) = uri.strip_prefix(GREETING_URI_PREFIX) {
        let raw = if raw.trim().is_empty() { "World" } else { raw };
        let name = sanitize(raw, MAX_NAME_LENGTH);
        if name.is_empty() {
            "Error: Invalid name provided".to_string()
        } else {
            format!(
                "Hello, {name}!\n\nThis is a dynamic resource generated just for you.\n\n\
                 Resource URI: {uri}\n\nHave a wonderful day!"
            )
        }
    } else {
        return Err(JsonRpcError::resource_not_found(uri));
    };

    Ok(ReadResourceResult {
        contents: vec![ResourceContents::text(uri, "text/plain", text)],
    })
}

/// Every code point in the Unicode "Other" category: control, format
/// (zero-width spaces, byte order marks), private use, and unassigned.
static OTHER_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{C}").expect("valid regex"));

/// Strip "Other" characters (newlines, tabs, and zero-width characters
/// included), trim, and keep at most `max_chars` characters.
#[must_use]
pub fn sanitize(input: &str, max_chars: usize) -> String {
    let cleaned = OTHER_CHARACTERS.replace_all(input, "");
    cleaned.trim().chars().take(max_chars).collect()
}

fn wrong_id(id: &RequestId) -> RequestId {
    match id {
        RequestId::Number(n) => RequestId::Number(n.wrapping_add(1)),
        RequestId::String(s) => RequestId::String(format!("{s}-other")),
        RequestId::Null => RequestId::Number(0),
    }
}

fn decode_params<T: for<'de> Deserialize<'de>>(params: &Value) -> Result<T, JsonRpcError> {
    T::deserialize(params).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

fn preview(line: &str) -> String {
    line.chars().take(100).collect()
}
