//! Provider trait, the abstraction over language-model backends.
//!
//! A Provider takes the session history plus the available tool definitions and
//! returns a lazy, finite stream of [`Delta`]s. Reassembling those deltas into a
//! message is the caller's job; a provider never accumulates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::delta::Delta;
use crate::error::ProviderError;
use crate::message::Message;

/// Receiver side of a model stream. Each item is one delta or a terminal error.
pub type DeltaStream = mpsc::Receiver<std::result::Result<Delta, ProviderError>>;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "deepseek/deepseek-chat", "gpt-4o")
    pub model: String,

    /// The full message history
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
            stop: Vec::new(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The core Provider trait.
///
/// Every model backend implements this. The orchestrator calls `stream()` once per
/// reasoning step and drains the receiver until it closes.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter", "deepseek").
    fn name(&self) -> &str;

    /// Send a request and get a stream of deltas.
    async fn stream(&self, request: ProviderRequest) -> std::result::Result<DeltaStream, ProviderError>;

    /// List available models for this provider.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}
