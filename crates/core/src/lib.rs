//! # Lectern Core
//!
//! Domain types, collaborator traits, and error definitions for the Lectern
//! tutoring agent. This crate has no framework dependencies: it defines the
//! model that every other crate implements against.
//!
//! ## Layout
//!
//! - [`message`]: sessions, messages and complete tool calls
//! - [`delta`]: partial message fragments as they arrive from a model stream
//! - [`provider`]: the streaming language-model capability
//! - [`tool`]: tools, the tool registry and the per-run tool context
//! - [`artifact`]: artifacts, courses and their stores
//! - [`session`]: the session store
//! - [`event`]: the client event protocol and event sinks

pub mod artifact;
pub mod delta;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use artifact::{
    Artifact, ArtifactRole, ArtifactStore, ArtifactType, Course, CourseCatalog, NewArtifact,
};
pub use delta::{Delta, ToolCallChunk};
pub use error::{Error, ProviderError, Result, StoreError, ToolError};
pub use event::{AgentEvent, Attributes, ChannelSink, EventSink, NoopSink, RecordingSink};
pub use message::{InvalidToolCall, Message, Role, Session, SessionId, ToolCall};
pub use provider::{DeltaStream, Provider, ProviderRequest, ToolDefinition};
pub use session::SessionStore;
pub use tool::{Tool, ToolContext, ToolRegistry, ToolResult};
