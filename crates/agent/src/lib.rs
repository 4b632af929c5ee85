//! The tutoring agent run loop.
//!
//! A run answers one user message:
//!
//! 1. **START**: announce the run
//! 2. **REASON**: stream a model turn, merge its deltas, materialize cited artifacts
//! 3. **ACT**: execute the requested tools, reporting each call to the client
//! 4. back to REASON until a turn asks for no tools, then **END**
//!
//! Everything the client sees is an [`AgentEvent`](lectern_core::event::AgentEvent)
//! handed to the run's event sink.

pub mod citation;
pub mod guard;
pub mod interceptor;
pub mod limits;
pub mod merge;
pub mod orchestrator;
pub mod prompt;
pub mod reference;

#[cfg(test)]
mod test_support;

pub use citation::{TextPart, parse_citations, parse_text_parts};
pub use guard::{RunPermit, SessionGuard};
pub use interceptor::{AttributeResolver, RegistryDispatch, ToolCallInterceptor, ToolDispatch};
pub use limits::RunWatchdog;
pub use merge::{ChunkMerger, merge_all, merge_deltas};
pub use orchestrator::{
    AgentContext, Orchestrator, RunOutcome, RunRequest, RunSettings, RunState, RunStatus, Signal,
    transition,
};
pub use prompt::{default_system_prompt, system_prompt};
pub use reference::{Reference, ReferenceType, clean_references, parse_references};
