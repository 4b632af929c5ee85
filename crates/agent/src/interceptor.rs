//! Tool dispatch and the interceptor that reports it to the client.
//!
//! [`RegistryDispatch`] runs the pending tool calls of one assistant message
//! against the registry. [`ToolCallInterceptor`] wraps any [`ToolDispatch`] and
//! emits `TOOL_CALL_START` / `TOOL_CALL_END` events around it, with display
//! attributes resolved from the call arguments and the tool output.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lectern_config::ToolErrorMode;
use lectern_core::artifact::{ArtifactStore, CourseCatalog};
use lectern_core::error::{Error, Result, ToolError};
use lectern_core::event::{AgentEvent, Attributes};
use lectern_core::message::{Message, ToolCall};
use lectern_core::tool::{ToolContext, ToolRegistry};
use serde_json::Value;
use tracing::{debug, warn};

/// Executes a batch of tool calls, producing one tool message per call in call order.
#[async_trait]
pub trait ToolDispatch: Send + Sync {
    async fn dispatch(&self, calls: &[ToolCall], ctx: &ToolContext) -> Result<Vec<Message>>;
}

/// Sequential dispatch against a [`ToolRegistry`].
pub struct RegistryDispatch {
    tools: Arc<ToolRegistry>,
    error_mode: ToolErrorMode,
    tool_timeout: Option<Duration>,
}

impl RegistryDispatch {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            error_mode: ToolErrorMode::default(),
            tool_timeout: None,
        }
    }

    pub fn with_error_mode(mut self, mode: ToolErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Limit each tool call. Exceeding it cancels the run token.
    pub fn with_tool_timeout(mut self, limit: Option<Duration>) -> Self {
        self.tool_timeout = limit;
        self
    }

    async fn run_one(&self, call: &ToolCall, ctx: &ToolContext) -> Result<std::result::Result<String, ToolError>> {
        let execution = self.tools.execute(call, ctx);
        let outcome = match self.tool_timeout {
            Some(limit) => tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
                timed = tokio::time::timeout(limit, execution) => match timed {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(tool = %call.name, timeout_secs = limit.as_secs(), "Tool timed out, cancelling run");
                        ctx.cancel.cancel();
                        return Err(Error::Cancelled);
                    }
                },
            },
            None => tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
                outcome = execution => outcome,
            },
        };
        Ok(outcome)
    }
}

#[async_trait]
impl ToolDispatch for RegistryDispatch {
    async fn dispatch(&self, calls: &[ToolCall], ctx: &ToolContext) -> Result<Vec<Message>> {
        let mut responses = Vec::with_capacity(calls.len());
        for call in calls {
            if ctx.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            debug!(tool = %call.name, tool_call_id = %call.id, "Dispatching tool");

            let content = match self.run_one(call, ctx).await? {
                Ok(output) => output,
                // Only a cancelled token stops the run; otherwise it is an ordinary tool failure.
                Err(ToolError::Cancelled) if ctx.cancel.is_cancelled() => return Err(Error::Cancelled),
                Err(e) => match self.error_mode {
                    ToolErrorMode::Propagate => return Err(e.into()),
                    ToolErrorMode::Capture => {
                        warn!(tool = %call.name, error = %e, "Tool failed, handing error to the model");
                        format!("Error: {e}")
                    }
                },
            };
            responses.push(Message::tool_result(&call.id, &call.name, content));
        }
        Ok(responses)
    }
}

/// Looks up display attributes for tool arguments and outputs.
#[derive(Clone)]
pub struct AttributeResolver {
    artifacts: Arc<dyn ArtifactStore>,
    courses: Arc<dyn CourseCatalog>,
}

impl AttributeResolver {
    pub fn new(artifacts: Arc<dyn ArtifactStore>, courses: Arc<dyn CourseCatalog>) -> Self {
        Self { artifacts, courses }
    }

    /// `tag` is copied as is. The artifact id comes from `artifact_id` or
    /// `artifactId`, and its title from the artifact store or the course catalog.
    pub async fn resolve(&self, data: &Value) -> Attributes {
        let mut attributes = Attributes::new();
        let Some(map) = data.as_object() else {
            return attributes;
        };

        if let Some(tag) = map.get("tag") {
            attributes.insert("tag".into(), tag.clone());
        }

        let artifact_id = ["artifact_id", "artifactId"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .find(|id| !id.is_empty());
        let Some(artifact_id) = artifact_id else {
            return attributes;
        };
        attributes.insert("artifact_id".into(), Value::String(artifact_id.to_string()));

        if let Some(title) = self.title_for(artifact_id).await {
            attributes.insert("title".into(), Value::String(title));
        }
        attributes
    }

    /// Same as [`resolve`](Self::resolve), for tool output text.
    ///
    /// Only text starting with `{` is parsed; anything else yields no attributes.
    pub async fn resolve_output(&self, output: &str) -> Attributes {
        if !output.starts_with('{') {
            return Attributes::new();
        }
        match serde_json::from_str::<Value>(output) {
            Ok(value) => self.resolve(&value).await,
            Err(_) => Attributes::new(),
        }
    }

    async fn title_for(&self, artifact_id: &str) -> Option<String> {
        match self.artifacts.get(artifact_id).await {
            Ok(Some(artifact)) if !artifact.title.is_empty() => return Some(artifact.title),
            Ok(_) => {}
            Err(e) => debug!(artifact_id, error = %e, "Artifact lookup failed"),
        }
        match self.courses.get_course(artifact_id).await {
            Ok(Some(course)) if !course.title.is_empty() => Some(course.title),
            Ok(_) => None,
            Err(e) => {
                debug!(artifact_id, error = %e, "Course lookup failed");
                None
            }
        }
    }
}

/// Wraps a dispatch step with tool call start/end events.
pub struct ToolCallInterceptor<D> {
    inner: D,
    resolver: AttributeResolver,
}

impl<D: ToolDispatch> ToolCallInterceptor<D> {
    pub fn new(inner: D, resolver: AttributeResolver) -> Self {
        Self { inner, resolver }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: ToolDispatch> ToolDispatch for ToolCallInterceptor<D> {
    async fn dispatch(&self, calls: &[ToolCall], ctx: &ToolContext) -> Result<Vec<Message>> {
        for call in calls {
            let attributes = self.resolver.resolve(&call.arguments).await;
            ctx.events.emit(AgentEvent::ToolCallStart {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                attributes,
            });
        }

        let responses = self.inner.dispatch(calls, ctx).await?;

        for (position, call) in calls.iter().enumerate() {
            let response = responses
                .iter()
                .find(|m| m.tool_call_id.as_deref() == Some(call.id.as_str()))
                .or_else(|| responses.get(position));
            let attributes = match response {
                Some(message) => self.resolver.resolve_output(&message.content).await,
                None => Attributes::new(),
            };
            ctx.events.emit(AgentEvent::ToolCallEnd {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                attributes,
            });
        }
        Ok(responses)
    }
}
