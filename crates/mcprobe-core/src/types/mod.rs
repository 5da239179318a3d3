//! MCP payload types for the methods the harness exercises.
//!
//! - **Tools**: `tools/list` and `tools/call`
//! - **Resources**: `resources/list` and `resources/read`
//! - **Content**: the polymorphic items a tool call returns

pub mod content;
pub mod resource;
pub mod tool;

pub use content::*;
pub use resource::*;
pub use tool::*;
