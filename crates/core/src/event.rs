//! Client event protocol and event sinks.
//!
//! Every observable step of a run is an [`AgentEvent`]. Events are handed to an
//! [`EventSink`], which must never block the run: sinks forward over an unbounded
//! channel or drop the event.
//!
//! Wire form is `{"type": "<KIND>", "data": {...}}`; payload-less kinds omit `data`.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::artifact::{ArtifactRole, ArtifactType};

/// Display attributes resolved for a tool call (e.g. `tag`, `artifact_id`, `title`).
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// All events a run can emit, in the closed set the client understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentEvent {
    RunStarted,

    RunFinished,

    /// A text fragment of the assistant message currently being generated.
    TextMessage { message_id: String, content: String },

    ArtifactListUpdated {
        artifact_id: String,
        title: String,
        artifact_type: ArtifactType,
        role: ArtifactRole,
    },

    ArtifactContentStart {
        artifact_id: String,
        title: String,
        artifact_type: ArtifactType,
    },

    ArtifactContentChunk { artifact_id: String, content: String },

    ArtifactContentComplete { artifact_id: String },

    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
        attributes: Attributes,
    },

    ToolCallEnd {
        tool_call_id: String,
        tool_name: String,
        attributes: Attributes,
    },
}

impl AgentEvent {
    /// Lower snake-case kind name, used as the SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted => "run_started",
            Self::RunFinished => "run_finished",
            Self::TextMessage { .. } => "text_message",
            Self::ArtifactListUpdated { .. } => "artifact_list_updated",
            Self::ArtifactContentStart { .. } => "artifact_content_start",
            Self::ArtifactContentChunk { .. } => "artifact_content_chunk",
            Self::ArtifactContentComplete { .. } => "artifact_content_complete",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolCallEnd { .. } => "tool_call_end",
        }
    }
}

/// Accepts emitted events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Forwards events into an unbounded channel. A closed receiver silently drops events.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: AgentEvent) {
        // Receiver gone means the client left; the run decides about cancellation.
        let _ = self.tx.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: AgentEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<AgentEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Kind names of everything recorded so far.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(AgentEvent::event_type).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: AgentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
