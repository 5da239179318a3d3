//! Built-in scenarios and the hello-world catalogue they exercise.
//!
//! - [`hello_world_scenario`]: greetings, echo, sanitization, and resources
//! - [`rag_scenario`]: the `rag_query` knowledge-base tool
//! - [`smoke_scenario`]: handshake and discovery only, for any server

use crate::scenario::{Action, Check, Expectation, Scenario, Step};
use mcprobe_core::capability::PROTOCOL_VERSION;
use mcprobe_core::types::{Resource, Tool};
use serde_json::json;

/// Client name announced by [`hello_world_scenario`].
pub const TEST_CLIENT_NAME: &str = "test-client";

/// Client version announced by [`hello_world_scenario`].
pub const TEST_CLIENT_VERSION: &str = "1.0.0";

/// Longest name the `hello` tool echoes back.
pub const MAX_NAME_LENGTH: usize = 50;

/// Longest message the `echo` tool echoes back.
pub const MAX_MESSAGE_LENGTH: usize = 500;

/// URI of the static server information resource.
pub const SERVER_INFO_URI: &str = "hello://server/info";

/// URI prefix of the parameterized greeting resource.
pub const GREETING_URI_PREFIX: &str = "hello://greetings/";

/// Name of the retrieval tool.
pub const RAG_TOOL_NAME: &str = "rag_query";

/// Passages `rag_query` retrieves when `topK` is not given.
pub const DEFAULT_TOP_K: usize = 5;

/// Message sent to the `echo` tool.
const ECHO_MESSAGE: &str = "Hello from mcprobe!";

/// Names of the scenarios the CLI can run.
pub const SCENARIO_NAMES: &[&str] = &["hello-world", "rag", "smoke"];

/// Look up a built-in scenario by name.
#[must_use]
pub fn scenario_by_name(name: &str) -> Option<Scenario> {
    match name {
        "hello-world" => Some(hello_world_scenario()),
        "rag" => Some(rag_scenario()),
        "smoke" => Some(smoke_scenario()),
        _ => None,
    }
}

/// The full hello-world sequence: handshake, tool discovery, greetings,
/// echo, input sanitization, and resource discovery and reads.
#[must_use]
pub fn hello_world_scenario() -> Scenario {
    let text = "content[0].text";
    let resource_text = "contents[0].text";
    let long_name = "A".repeat(80);
    let overflow = "A".repeat(MAX_NAME_LENGTH + 1);

    Scenario::new("hello-world")
        .description("Exercises the hello and echo tools and the hello:// resources")
        .step(
            Step::new(
                "initialize",
                Action::initialize_as(TEST_CLIENT_NAME, TEST_CLIENT_VERSION, PROTOCOL_VERSION),
            )
            .expect(Expectation::success().check(Check::present("serverInfo.name").soft())),
        )
        .step(
            Step::new("list tools", Action::ListTools).expect(
                Expectation::success()
                    .check(Check::present("tools"))
                    .check(Check::array_contains("tools", "name", "hello"))
                    .check(Check::array_contains("tools", "name", "echo")),
            ),
        )
        .step(
            Step::new("hello without a name", Action::call_tool("hello", json!({})))
                .expect(Expectation::success().check(Check::non_empty_text(text))),
        )
        .step(
            Step::new(
                "hello with a name",
                Action::call_tool("hello", json!({"name": "Alice"})),
            )
            .expect(Expectation::success().check(Check::contains(text, "Alice"))),
        )
        .step(
            Step::new(
                "echo a message",
                Action::call_tool("echo", json!({"message": ECHO_MESSAGE})),
            )
            .expect(Expectation::success().check(Check::contains(text, ECHO_MESSAGE))),
        )
        .step(
            Step::new(
                "hello strips control characters",
                Action::call_tool("hello", json!({"name": "Alice\nBob\tCharlie"})),
            )
            .expect(
                Expectation::success()
                    .check(Check::excludes(text, "\n"))
                    .check(Check::excludes(text, "\t")),
            ),
        )
        .step(
            Step::new(
                "hello truncates long names",
                Action::call_tool("hello", json!({"name": long_name})),
            )
            .expect(Expectation::success().check(Check::excludes(text, overflow))),
        )
        .step(
            Step::new("list resources", Action::ListResources)
                .expect(Expectation::success().check(Check::present("resources"))),
        )
        .step(
            Step::new("read server info", Action::read_resource(SERVER_INFO_URI))
                .expect(Expectation::success().check(Check::non_empty_text(resource_text))),
        )
        .step(
            Step::new(
                "read personalized greeting",
                Action::read_resource(format!("{GREETING_URI_PREFIX}TestUser")),
            )
            .expect(Expectation::success().check(Check::contains(resource_text, "TestUser"))),
        )
}

/// Questions against the `rag_query` tool: discovery, two queries whose
/// answers must be formatted with an `Answer:` section, and a blank query
/// that must be refused.
#[must_use]
pub fn rag_scenario() -> Scenario {
    let text = "content[0].text";

    Scenario::new("rag")
        .description("Exercises the rag_query knowledge-base tool")
        .step(
            Step::new("initialize", Action::initialize())
                .expect(Expectation::success().check(Check::present("serverInfo.name").soft())),
        )
        .step(
            Step::new("list tools", Action::ListTools).expect(
                Expectation::success()
                    .check(Check::present("tools"))
                    .check(Check::array_contains("tools", "name", RAG_TOOL_NAME)),
            ),
        )
        .step(
            Step::new(
                "rag query",
                Action::call_tool(
                    RAG_TOOL_NAME,
                    json!({"query": "What type is Lapras?", "topK": 3}),
                ),
            )
            .expect(
                Expectation::success()
                    .check(Check::non_empty_text(text))
                    .check(Check::contains(text, "Answer:")),
            ),
        )
        .step(
            Step::new(
                "rag query with a larger topK",
                Action::call_tool(
                    RAG_TOOL_NAME,
                    json!({"query": "What Pokemon can evolve into multiple forms?", "topK": 5}),
                ),
            )
            .expect(
                Expectation::success()
                    .check(Check::non_empty_text(text))
                    .check(Check::contains(text, "Answer:")),
            ),
        )
        .step(
            Step::new(
                "rag query rejects a blank query",
                Action::call_tool(RAG_TOOL_NAME, json!({"query": "   "})),
            )
            .expect(Expectation::success().check(Check::contains(text, "cannot be empty"))),
        )
}

/// A minimal sequence any MCP server should pass.
#[must_use]
pub fn smoke_scenario() -> Scenario {
    Scenario::new("smoke")
        .description("Handshake plus tool and resource discovery")
        .step(
            Step::new("initialize", Action::initialize())
                .expect(Expectation::success().check(Check::present("serverInfo.name").soft())),
        )
        .step(
            Step::new("list tools", Action::ListTools)
                .expect(Expectation::success().check(Check::present("tools"))),
        )
        .step(
            Step::new("list resources", Action::ListResources)
                .expect(Expectation::success().check(Check::present("resources"))),
        )
}

/// The tools the hello-world server advertises.
#[must_use]
pub fn hello_world_tools() -> Vec<Tool> {
    vec![
        Tool::new("hello")
            .description(
                "Returns a friendly greeting message. You can optionally provide a name to personalize the greeting.",
            )
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "The name of the person to greet (optional, max 50 characters)",
                        "maxLength": MAX_NAME_LENGTH
                    }
                },
                "required": []
            })),
        Tool::new("echo")
            .description("Echoes back the message you provide.")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The message to echo back (max 500 characters)",
                        "maxLength": MAX_MESSAGE_LENGTH
                    }
                },
                "required": ["message"]
            })),
        Tool::new(RAG_TOOL_NAME)
            .description(
                "Query the RAG knowledge base. Retrieves relevant information from documents and provides contextual answers.",
            )
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The question or query to search for in the knowledge base"
                    },
                    "topK": {
                        "type": "number",
                        "description": "Number of relevant chunks to retrieve (default: 5)",
                        "default": DEFAULT_TOP_K
                    },
                    "minSimilarity": {
                        "type": "number",
                        "description": "Minimum similarity threshold 0.0-1.0 (default: 0.0)",
                        "default": 0.0
                    }
                },
                "required": ["query"]
            })),
    ]
}

/// The resources the hello-world server advertises.
#[must_use]
pub fn hello_world_resources() -> Vec<Resource> {
    vec![
        Resource::new(SERVER_INFO_URI, "Server Information")
            .description("Information about this MCP server")
            .mime_type("text/plain"),
        Resource::new(format!("{GREETING_URI_PREFIX}{{name}}"), "Personalized Greeting")
            .description("A greeting for the name in the URI")
            .mime_type("text/plain"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hello_world_order() {
        let scenario = hello_world_scenario();
        let methods: Vec<_> = scenario.steps.iter().map(|s| s.action.method()).collect();
        assert_eq!(
            methods,
            vec![
                "initialize",
                "tools/list",
                "tools/call",
                "tools/call",
                "tools/call",
                "tools/call",
                "tools/call",
                "resources/list",
                "resources/read",
                "resources/read",
            ]
        );
        assert_eq!(
            scenario.steps[0].action,
            Action::initialize_as("test-client", "1.0.0", "2024-11-05")
        );
        assert!(scenario.steps[0].expect.checks[0].is_soft());
    }

    #[test]
    fn test_rag_steps() {
        let scenario = rag_scenario();
        assert_eq!(scenario.steps.len(), 5);
        assert_eq!(
            scenario.steps[2].action,
            Action::call_tool("rag_query", json!({"query": "What type is Lapras?", "topK": 3}))
        );
        assert!(
            scenario.steps[1]
                .expect
                .checks
                .iter()
                .any(|check| check.to_string().contains("rag_query"))
        );
    }

    #[test]
    fn test_scenario_lookup() {
        for name in SCENARIO_NAMES {
            assert_eq!(scenario_by_name(name).unwrap().name, *name);
        }
        assert!(scenario_by_name("nope").is_none());
    }

    #[test]
    fn test_catalogue() {
        let tools: Vec<_> = hello_world_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(tools, vec!["hello", "echo", "rag_query"]);
        assert_eq!(hello_world_resources()[1].uri, "hello://greetings/{name}");
    }
}
