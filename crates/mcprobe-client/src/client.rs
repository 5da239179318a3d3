//! The correlating JSON-RPC client.
//!
//! [`Client`] turns a line transport into a request/response protocol:
//!
//! - Request ids are assigned from a per-session counter starting at 1
//! - Exactly one response line is read per request, and its id must match
//! - Every exchange is bounded by a timeout
//! - Fatal failures terminate the server before they are returned
//!
//! One request is in flight at a time. [`Client::call`] takes `&mut self`,
//! so a second call cannot start until the first has returned.

use crate::error::ClientError;
use crate::session::SessionState;
use mcprobe_core::capability::{ClientInfo, InitializeRequest, InitializeResult, PROTOCOL_VERSION};
use mcprobe_core::protocol::{Request, RequestId, decode_response, encode_request};
use mcprobe_core::types::{
    CallToolRequest, CallToolResult, ListResourcesResult, ListToolsResult, ReadResourceRequest,
    ReadResourceResult, Resource, ResourceContents, Tool,
};
use mcprobe_transport::{Transport, TransportError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Default bound on a single request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every call a client makes.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identity sent in the handshake.
    pub client_info: ClientInfo,
    /// Protocol version requested in the handshake.
    pub protocol_version: String,
    /// Bound on each exchange made through the typed helpers.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_info: ClientInfo::new("mcprobe", env!("CARGO_PKG_VERSION")),
            protocol_version: PROTOCOL_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A client session with one MCP server.
///
/// # Example
///
/// ```no_run
/// use mcprobe_client::ClientBuilder;
/// use mcprobe_transport::ProcessTransport;
///
/// # async fn example() -> Result<(), mcprobe_client::ClientError> {
/// let transport = ProcessTransport::builder("my-server")
///     .spawn()
///     .await
///     .map_err(mcprobe_client::ClientError::Spawn)?;
/// let mut client = ClientBuilder::new().connect(transport).await?;
///
/// let tools = client.list_tools().await;
/// client.close().await?;
/// println!("{:?}", tools?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client<T: Transport> {
    transport: T,
    config: ClientConfig,
    next_id: i64,
    state: SessionState,
    server: Option<InitializeResult>,
    session_id: Uuid,
}

impl<T: Transport> Client<T> {
    /// Wrap a transport in an unstarted session.
    #[must_use]
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let session_id = Uuid::new_v4();
        debug!(session = %session_id, transport = %transport.metadata().transport_type, "Created client session");
        Self {
            transport,
            config,
            next_id: 1,
            state: SessionState::Unstarted,
            server: None,
            session_id,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handshake result, once `initialize` has succeeded.
    #[must_use]
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server.as_ref()
    }

    /// Settings this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Identifier used to tag this session in logs.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Borrow the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take whatever the server has written to stderr so far.
    pub fn drain_stderr(&mut self) -> String {
        self.transport.drain_stderr()
    }

    // ==========================================================================
    // Core Exchange
    // ==========================================================================

    /// Send one request and wait for its response.
    ///
    /// Writes the request as one line, then reads exactly one line and
    /// checks that it answers this request. The write and the read together
    /// must finish within `timeout`.
    ///
    /// A JSON-RPC error from the server is returned as
    /// [`ClientError::Remote`] and leaves the session open. Any other error
    /// closes the session and terminates the server before returning.
    pub async fn call(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        if self.state.is_closed() {
            return Err(ClientError::SessionClosed);
        }

        let id = self.next_request_id();
        let request = Request::with_params(method.to_string(), id.clone(), params);
        let line = encode_request(&request).map_err(ClientError::Serialize)?;

        trace!(session = %self.session_id, %id, method, "Sending request");
        let started = Instant::now();

        let exchanged = tokio::time::timeout(timeout, exchange(&mut self.transport, &line)).await;
        let outcome = match exchanged {
            Ok(Ok(raw)) => interpret(method, &id, &raw),
            Ok(Err(e)) => Err(ClientError::from_transport(method, e)),
            Err(_) => Err(ClientError::Timeout {
                method: method.to_string(),
                id: id.clone(),
                timeout,
                stderr: String::new(),
            }),
        };

        match outcome {
            Ok(result) => {
                if method != "initialize" {
                    self.state = self.state.after_call();
                }
                debug!(session = %self.session_id, %id, method, elapsed = ?started.elapsed(), "Request completed");
                Ok(result)
            }
            Err(err) if err.is_fatal() => Err(self.teardown(err).await),
            Err(err) => {
                debug!(session = %self.session_id, %id, method, error = %err, "Request failed");
                Err(err)
            }
        }
    }

    /// [`call`](Self::call) with the configured timeout.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value, ClientError> {
        let timeout = self.config.timeout;
        self.call(method, params, timeout).await
    }

    // ==========================================================================
    // Handshake
    // ==========================================================================

    /// Perform the `initialize` handshake.
    ///
    /// The server must answer with the protocol version that was asked for;
    /// anything else is a [`ClientError::Handshake`] and closes the session.
    /// A missing `serverInfo` is accepted and left for the caller to judge.
    pub async fn initialize(
        &mut self,
        client_name: &str,
        client_version: &str,
        protocol_version: &str,
    ) -> Result<InitializeResult, ClientError> {
        let timeout = self.config.timeout;
        self.initialize_within(client_name, client_version, protocol_version, timeout)
            .await
    }

    /// [`initialize`](Self::initialize) bounded by an explicit timeout.
    pub async fn initialize_within(
        &mut self,
        client_name: &str,
        client_version: &str,
        protocol_version: &str,
        timeout: Duration,
    ) -> Result<InitializeResult, ClientError> {
        let params = InitializeRequest::new(
            protocol_version,
            ClientInfo::new(client_name, client_version),
        );
        let params =
            serde_json::to_value(params).map_err(|e| ClientError::Serialize(e.into()))?;

        let value = self.call("initialize", params, timeout).await?;

        let result: InitializeResult = match serde_json::from_value(value) {
            Ok(result) => result,
            Err(e) => {
                let err = ClientError::Handshake {
                    message: format!("initialize result could not be decoded: {e}"),
                    stderr: String::new(),
                };
                return Err(self.teardown(err).await);
            }
        };

        if result.protocol_version != protocol_version {
            let err = ClientError::Handshake {
                message: format!(
                    "server answered protocol version {} but {protocol_version} was requested",
                    result.protocol_version
                ),
                stderr: String::new(),
            };
            return Err(self.teardown(err).await);
        }

        self.state = self.state.after_handshake();
        info!(
            session = %self.session_id,
            server = result.server_name().unwrap_or("<unnamed>"),
            protocol_version = %result.protocol_version,
            "Session initialized"
        );
        self.server = Some(result.clone());
        Ok(result)
    }

    /// Perform the handshake with the identity from [`ClientConfig`].
    pub async fn handshake(&mut self) -> Result<InitializeResult, ClientError> {
        let ClientConfig {
            client_info,
            protocol_version,
            ..
        } = self.config.clone();
        self.initialize(&client_info.name, &client_info.version, &protocol_version)
            .await
    }

    // ==========================================================================
    // Tool Operations
    // ==========================================================================

    /// List all available tools.
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>, ClientError> {
        let result: ListToolsResult = self.request_typed("tools/list", empty_params()).await?;
        Ok(result.tools)
    }

    /// Call a tool by name.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the tool to call
    /// * `arguments` - The arguments to pass to the tool (as JSON)
    pub async fn call_tool(
        &mut self,
        name: impl Into<String>,
        arguments: Value,
    ) -> Result<CallToolResult, ClientError> {
        let request = CallToolRequest {
            name: name.into(),
            arguments: Some(arguments),
        };
        let params =
            serde_json::to_value(request).map_err(|e| ClientError::Serialize(e.into()))?;
        self.request_typed("tools/call", params).await
    }

    // ==========================================================================
    // Resource Operations
    // ==========================================================================

    /// List all available resources.
    pub async fn list_resources(&mut self) -> Result<Vec<Resource>, ClientError> {
        let result: ListResourcesResult =
            self.request_typed("resources/list", empty_params()).await?;
        Ok(result.resources)
    }

    /// Read a resource by URI.
    pub async fn read_resource(
        &mut self,
        uri: impl Into<String>,
    ) -> Result<Vec<ResourceContents>, ClientError> {
        let request = ReadResourceRequest { uri: uri.into() };
        let params =
            serde_json::to_value(request).map_err(|e| ClientError::Serialize(e.into()))?;
        let result: ReadResourceResult = self.request_typed("resources/read", params).await?;
        Ok(result.contents)
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    /// Terminate the server and close the session. Safe to call repeatedly.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        if !self.state.is_closed() {
            info!(session = %self.session_id, "Closing session");
        }
        self.state = SessionState::Closed;
        self.transport
            .terminate()
            .await
            .map_err(ClientError::Transport)
    }

    // ==========================================================================
    // Internal Methods
    // ==========================================================================

    /// Generate the next request ID.
    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        RequestId::Number(id)
    }

    async fn request_typed<R: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<R, ClientError> {
        let value = self.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| ClientError::InvalidResult {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }

    /// Close the session after a fatal error and attach the server's stderr.
    async fn teardown(&mut self, err: ClientError) -> ClientError {
        warn!(session = %self.session_id, kind = err.kind(), error = %err, "Fatal error, terminating server");
        self.state = SessionState::Closed;
        if let Err(e) = self.transport.terminate().await {
            warn!(session = %self.session_id, error = %e, "Failed to terminate server cleanly");
        }
        let stderr = self.transport.drain_stderr();
        err.with_stderr(stderr)
    }
}

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}

async fn exchange<T: Transport>(transport: &mut T, line: &[u8]) -> Result<Vec<u8>, TransportError> {
    transport.write_line(line).await?;
    transport.read_line().await
}

/// Turn one response line into the outcome of request `id`.
fn interpret(method: &str, id: &RequestId, raw: &[u8]) -> Result<Value, ClientError> {
    let response = decode_response(raw).map_err(|e| ClientError::MalformedResponse {
        method: method.to_string(),
        raw: String::from_utf8_lossy(raw).into_owned(),
        reason: e.to_string(),
        stderr: String::new(),
    })?;

    if response.id != *id {
        return Err(ClientError::Protocol {
            expected: id.clone(),
            actual: response.id,
            stderr: String::new(),
        });
    }

    response.into_result().map_err(|e| ClientError::Remote {
        code: e.code,
        message: e.message,
        data: e.data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientBuilder;
    use mcprobe_transport::{MemoryPeer, MemoryTransport};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::task::JoinHandle;

    fn client(transport: MemoryTransport) -> Client<MemoryTransport> {
        ClientBuilder::new()
            .name("test-client")
            .version("1.0.0")
            .timeout(Duration::from_secs(5))
            .build(transport)
    }

    /// Answer each request with whatever `respond` returns, until it returns `None`.
    fn serve<F>(mut peer: MemoryPeer, mut respond: F) -> JoinHandle<Vec<Value>>
    where
        F: FnMut(&Value) -> Option<String> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(request) = peer.recv_json().await {
                let reply = respond(&request);
                seen.push(request);
                match reply {
                    Some(line) => {
                        peer.send_line(line);
                    }
                    None => break,
                }
            }
            seen
        })
    }

    fn ok(request: &Value, result: Value) -> Option<String> {
        Some(json!({"jsonrpc": "2.0", "id": request["id"], "result": result}).to_string())
    }

    fn init_result(version: &str) -> Value {
        json!({
            "protocolVersion": version,
            "capabilities": {"tools": {}, "resources": {}},
            "serverInfo": {"name": "hello-world-server", "version": "1.0.0"}
        })
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_increase() {
        let (transport, peer) = MemoryTransport::pair();
        let server = serve(peer, |req| ok(req, json!({})));
        let mut client = client(transport);

        for _ in 0..3 {
            client.request("tools/list", json!({})).await.unwrap();
        }
        client.close().await.unwrap();

        let ids: Vec<Value> = server.await.unwrap().iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn test_request_wire_format() {
        let (transport, peer) = MemoryTransport::pair();
        let server = serve(peer, |req| ok(req, json!({"content": []})));
        let mut client = client(transport);

        client
            .call_tool("hello", json!({"name": "Alice"}))
            .await
            .unwrap();
        client.close().await.unwrap();

        let seen = server.await.unwrap();
        assert_eq!(
            seen[0],
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "hello", "arguments": {"name": "Alice"}}
            })
        );
    }

    #[tokio::test]
    async fn test_handshake_moves_to_initialized_then_active() {
        let (transport, peer) = MemoryTransport::pair();
        let server = serve(peer, |req| match req["method"].as_str() {
            Some("initialize") => ok(req, init_result("2024-11-05")),
            _ => ok(req, json!({"tools": [{"name": "hello"}]})),
        });
        let mut client = client(transport);
        assert_eq!(client.state(), SessionState::Unstarted);

        let result = client
            .initialize("test-client", "1.0.0", "2024-11-05")
            .await
            .unwrap();
        assert_eq!(result.server_name(), Some("hello-world-server"));
        assert_eq!(client.state(), SessionState::Initialized);

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools[0].name, "hello");
        assert_eq!(client.state(), SessionState::Active);

        client.close().await.unwrap();
        assert_eq!(client.state(), SessionState::Closed);

        let seen = server.await.unwrap();
        assert_eq!(
            seen[0]["params"],
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            })
        );
    }

    #[tokio::test]
    async fn test_configured_handshake_uses_builder_identity() {
        let (transport, peer) = MemoryTransport::pair();
        let server = serve(peer, |req| ok(req, init_result("2024-11-05")));
        let mut client = client(transport);

        client.handshake().await.unwrap();
        client.close().await.unwrap();

        let seen = server.await.unwrap();
        assert_eq!(seen[0]["params"]["clientInfo"]["name"], "test-client");
    }

    #[tokio::test]
    async fn test_protocol_version_mismatch_fails_handshake() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |req| ok(req, init_result("2099-01-01")));
        let mut client = client(transport);

        let err = client
            .initialize("test-client", "1.0.0", "2024-11-05")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Handshake { .. }));
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_id_mismatch_is_protocol_error() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |req| {
            let wrong = req["id"].as_u64().unwrap_or(0) + 1;
            Some(json!({"jsonrpc": "2.0", "id": wrong, "result": {}}).to_string())
        });
        let mut client = client(transport);

        let err = client.request("tools/list", json!({})).await.unwrap_err();
        match err {
            ClientError::Protocol {
                expected, actual, ..
            } => {
                assert_eq!(expected, RequestId::Number(1));
                assert_eq!(actual, RequestId::Number(2));
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
        assert_eq!(client.state(), SessionState::Closed);

        let again = client.request("tools/list", json!({})).await.unwrap_err();
        assert!(matches!(again, ClientError::SessionClosed));
    }

    async fn mismatch_with(reply: Value) -> ClientError {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, move |_| Some(reply.to_string()));
        let mut client = client(transport);

        let err = client.request("tools/list", json!({})).await.unwrap_err();
        assert_eq!(client.state(), SessionState::Closed);
        err
    }

    #[tokio::test]
    async fn test_negative_id_is_protocol_error() {
        let err = mismatch_with(json!({"jsonrpc": "2.0", "id": -5, "result": {}})).await;
        assert_eq!(err.kind(), "ProtocolError");
        match err {
            ClientError::Protocol {
                expected, actual, ..
            } => {
                assert_eq!(expected, RequestId::Number(1));
                assert_eq!(actual, RequestId::Number(-5));
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_null_id_parse_error_is_protocol_error() {
        let err = mismatch_with(json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": -32700, "message": "Parse error"}
        }))
        .await;
        assert_eq!(err.kind(), "ProtocolError");
        assert!(matches!(
            err,
            ClientError::Protocol {
                actual: RequestId::Null,
                ..
            }
        ));
        assert!(err.to_string().contains("Response id null"));
    }

    #[tokio::test]
    async fn test_remote_error_keeps_session_open() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |req| match req["params"]["name"].as_str() {
            Some("missing") => Some(
                json!({
                    "jsonrpc": "2.0",
                    "id": req["id"],
                    "error": {"code": -32602, "message": "Unknown tool: missing", "data": {"tool": "missing"}}
                })
                .to_string(),
            ),
            _ => ok(req, json!({"content": [{"type": "text", "text": "hi"}]})),
        });
        let mut client = client(transport);

        let err = client.call_tool("missing", json!({})).await.unwrap_err();
        match &err {
            ClientError::Remote {
                code,
                message,
                data,
            } => {
                assert_eq!(*code, -32602);
                assert_eq!(message, "Unknown tool: missing");
                assert_eq!(data.as_ref().unwrap()["tool"], "missing");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
        assert!(!err.is_fatal());
        assert_eq!(client.state(), SessionState::Unstarted);

        let result = tokio_test::assert_ok!(client.call_tool("hello", json!({})).await);
        assert_eq!(result.first_text(), Some("hi"));
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_line_carries_raw_payload() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |_| Some("Starting server on stdio...".to_string()));
        let mut client = client(transport);

        let err = client.request("tools/list", json!({})).await.unwrap_err();
        match err {
            ClientError::MalformedResponse { raw, method, .. } => {
                assert_eq!(raw, "Starting server on stdio...");
                assert_eq!(method, "tools/list");
            }
            other => panic!("expected malformed response, got {other:?}"),
        }
        assert!(client.transport().is_closed());
    }

    #[tokio::test]
    async fn test_two_documents_on_one_line_are_malformed() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |req| {
            let doc = json!({"jsonrpc": "2.0", "id": req["id"], "result": {}}).to_string();
            Some(format!("{doc}{doc}"))
        });
        let mut client = client(transport);

        let err = client.request("tools/list", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "MalformedResponse");
    }

    #[tokio::test]
    async fn test_server_death_reports_stderr() {
        let (transport, mut peer) = MemoryTransport::pair();
        let server = tokio::spawn(async move {
            let _request = peer.recv_line().await;
            peer.write_stderr(b"java.lang.IllegalStateException: boom\n")
                .await
                .unwrap();
            drop(peer);
        });
        let mut client = client(transport);

        let err = client.request("initialize", json!({})).await.unwrap_err();
        server.await.unwrap();

        assert_eq!(err.kind(), "ServerDied");
        assert!(err.stderr().unwrap().contains("IllegalStateException"));
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_server_times_out_and_closes() {
        let (transport, mut peer) = MemoryTransport::pair();
        let server = tokio::spawn(async move {
            // Read the request, never answer, and stay alive.
            let _request = peer.recv_line().await;
            std::future::pending::<()>().await;
        });
        let mut client = client(transport);

        let started = Instant::now();
        let bound = Duration::from_millis(250);
        let err = client.call("tools/list", json!({}), bound).await.unwrap_err();

        assert!(matches!(err, ClientError::Timeout { .. }));
        assert!(started.elapsed() >= bound);
        assert!(started.elapsed() < bound + Duration::from_secs(1));
        assert_eq!(client.state(), SessionState::Closed);
        assert!(client.transport().is_closed());
        server.abort();
    }

    #[tokio::test]
    async fn test_calls_before_handshake_are_still_sent() {
        let (transport, peer) = MemoryTransport::pair();
        let server = serve(peer, |req| {
            Some(
                json!({
                    "jsonrpc": "2.0",
                    "id": req["id"],
                    "error": {"code": -32600, "message": "Server not initialized"}
                })
                .to_string(),
            )
        });
        let mut client = client(transport);

        let err = tokio_test::assert_err!(client.list_resources().await);
        assert!(matches!(err, ClientError::Remote { code: -32600, .. }));
        assert_eq!(client.state(), SessionState::Unstarted);

        client.close().await.unwrap();
        assert_eq!(server.await.unwrap()[0]["method"], "resources/list");
    }

    #[tokio::test]
    async fn test_unexpected_result_shape_is_not_fatal() {
        let (transport, peer) = MemoryTransport::pair();
        let _server = serve(peer, |req| match req["method"].as_str() {
            Some("resources/read") => ok(req, json!({"contents": "not-a-list"})),
            _ => ok(req, json!({"resources": []})),
        });
        let mut client = client(transport);

        let err = client.read_resource("hello://server/info").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResult { .. }));
        assert!(!client.state().is_closed());

        assert!(client.list_resources().await.unwrap().is_empty());
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (transport, _peer) = MemoryTransport::pair();
        let mut client = client(transport);
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert_eq!(client.state(), SessionState::Closed);
    }
}
