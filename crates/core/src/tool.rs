//! Tool trait, the abstraction over agent capabilities.
//!
//! Tools are what let the tutor act: look up courses, read articles, build
//! mind maps, write evaluations of an article.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::event::{EventSink, NoopSink};
use crate::message::{SessionId, ToolCall};
use crate::provider::ToolDefinition;

/// Outcome of one tool execution: the text handed back to the model.
pub type ToolResult = std::result::Result<String, ToolError>;

/// Per-run context handed to every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    /// The session the run belongs to
    pub session_id: SessionId,

    /// Where tools publish their own events (artifact streaming, list updates)
    pub events: Arc<dyn EventSink>,

    /// Cancelled when the run is cancelled or a tool timeout fires
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(session_id: SessionId, events: Arc<dyn EventSink>, cancel: CancellationToken) -> Self {
        Self {
            session_id,
            events,
            cancel,
        }
    }

    /// A context with no event consumer and a fresh token. Handy for tests and tooling.
    pub fn detached(session_id: impl Into<SessionId>) -> Self {
        Self::new(session_id.into(), Arc::new(NoopSink), CancellationToken::new())
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("session_id", &self.session_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// The core Tool trait.
///
/// Each tool implements this and is registered in a [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_article").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given argument object.
    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> ToolResult;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, sorted by name so requests are stable.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(call.arguments.clone(), ctx).await
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
