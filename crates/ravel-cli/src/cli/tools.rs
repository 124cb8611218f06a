//! Built-in tools available to replayed runs.
//!
//! Scripts can call these by name to exercise the tool path end to end.

use chrono::Utc;
use serde_json::{Value, json};

use ravel_core::tool::{Tool, ToolContext, ToolRegistry};
use ravel_types::error::ToolError;
use ravel_types::tool::ToolResult;

/// Registry with every built-in tool.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Echo);
    registry.register(Remember);
    registry.register(Recall);
    registry.register(Clock);
    registry
}

/// Returns its `text` argument.
pub struct Echo;

impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the given text unchanged"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let text = required_str(&args, "text", self.name())?;
        Ok(ToolResult::text(text))
    }
}

/// Stores a value in the run's shared context.
pub struct Remember;

impl Tool for Remember {
    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> &str {
        "Store a value under a key, visible to every run sharing this context"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"key": {"type": "string"}, "value": {}},
            "required": ["key", "value"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let key = required_str(&args, "key", self.name())?;
        let value = args.get("value").cloned().unwrap_or(Value::Null);
        let previous = ctx.shared.set(key, value);
        Ok(ToolResult::json(json!({"stored": key, "previous": previous})))
    }
}

/// Reads a value from the run's shared context.
pub struct Recall;

impl Tool for Recall {
    fn name(&self) -> &str {
        "recall"
    }

    fn description(&self) -> &str {
        "Read the value stored under a key"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"key": {"type": "string"}},
            "required": ["key"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let key = required_str(&args, "key", self.name())?;
        match ctx.shared.get(key) {
            Some(value) => Ok(ToolResult::json(value)),
            None => Ok(ToolResult::error(format!("nothing stored under '{key}'"))),
        }
    }
}

/// Current UTC time.
pub struct Clock;

impl Tool for Clock {
    fn name(&self) -> &str {
        "clock"
    }

    fn description(&self) -> &str {
        "Current date and time in UTC (RFC 3339)"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::text(Utc::now().to_rfc3339()))
    }
}

fn required_str<'a>(args: &'a Value, field: &str, tool: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidInput {
            tool: tool.to_string(),
            message: format!("missing string field '{field}'"),
        })
}
