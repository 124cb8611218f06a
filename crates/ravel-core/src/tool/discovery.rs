//! External tool discovery.
//!
//! A `ToolDiscovery` is a catalogue that lives outside the process (an MCP
//! server, a plugin host). The registry lists it once per step and wraps each
//! entry in a [`DiscoveredTool`] that forwards calls by name.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use ravel_types::error::ToolError;
use ravel_types::tool::{ToolResult, ToolSchema};

use super::definition::{Tool, ToolContext};

/// Catalogue of externally hosted tools.
///
/// Object-safe (boxed futures) so one discovery client can be shared as
/// `Arc<dyn ToolDiscovery>`.
pub trait ToolDiscovery: Send + Sync {
    /// List available tools, optionally filtered by a free-text query.
    fn list_tools<'a>(
        &'a self,
        query: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<ToolSchema>, ToolError>>;

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        args: Value,
    ) -> BoxFuture<'a, Result<ToolResult, ToolError>>;
}

/// A tool listed by a [`ToolDiscovery`].
pub struct DiscoveredTool {
    schema: ToolSchema,
    discovery: Arc<dyn ToolDiscovery>,
}

impl DiscoveredTool {
    pub fn new(schema: ToolSchema, discovery: Arc<dyn ToolDiscovery>) -> Self {
        Self { schema, discovery }
    }
}

impl Tool for DiscoveredTool {
    fn name(&self) -> &str {
        &self.schema.name
    }

    fn description(&self) -> &str {
        &self.schema.description
    }

    fn input_schema(&self) -> Value {
        self.schema.input_schema.clone()
    }

    fn execute(
        &self,
        args: Value,
        _ctx: &ToolContext,
    ) -> impl std::future::Future<Output = Result<ToolResult, ToolError>> + Send {
        self.discovery.call_tool(&self.schema.name, args)
    }
}
