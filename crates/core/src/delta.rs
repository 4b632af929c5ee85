//! Partial message fragments as they arrive from a model stream.

use serde::{Deserialize, Serialize};

/// One incremental piece of an assistant message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Text fragment, possibly empty
    #[serde(default)]
    pub content: String,

    /// Tool call fragments, keyed by their stable index
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_chunks: Vec<ToolCallChunk>,
}

impl Delta {
    /// A delta carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_call_chunks: Vec::new(),
        }
    }

    /// A delta carrying a single tool call fragment.
    pub fn tool_chunk(chunk: ToolCallChunk) -> Self {
        Self {
            content: String::new(),
            tool_call_chunks: vec![chunk],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.tool_call_chunks.is_empty()
    }
}

/// A fragment of one tool call. Pieces sharing an `index` belong together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallChunk {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallChunk {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let chunk = ToolCallChunk::new(2).id("call_a").name("read_article").arguments("{\"a");
        assert_eq!(chunk.index, 2);
        assert_eq!(chunk.id.as_deref(), Some("call_a"));
        assert_eq!(chunk.name.as_deref(), Some("read_article"));
        assert_eq!(chunk.arguments.as_deref(), Some("{\"a"));
    }

    #[test]
    fn empty_delta_detection() {
        assert!(Delta::default().is_empty());
        assert!(!Delta::text("x").is_empty());
        assert!(!Delta::tool_chunk(ToolCallChunk::new(0)).is_empty());
    }
}
