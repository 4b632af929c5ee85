//! Mind map tool: turns text into a markdown outline stored as a `mind_map` artifact.
//!
//! The outline keeps the headings and list items of the text. Text without any
//! structure becomes one list item per non-empty line.

use std::sync::Arc;

use async_trait::async_trait;
use lectern_core::artifact::{ArtifactRole, ArtifactStore, ArtifactType, NewArtifact};
use lectern_core::error::ToolError;
use lectern_core::tool::{Tool, ToolContext, ToolResult};
use tracing::info;

const FALLBACK_TITLE: &str = "思维导图";
const MAX_TITLE_CHARS: usize = 40;

pub struct GenerateMindMapTool {
    artifacts: Arc<dyn ArtifactStore>,
}

impl GenerateMindMapTool {
    pub fn new(artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl Tool for GenerateMindMapTool {
    fn name(&self) -> &str {
        "generate_mind_map_artifact"
    }

    fn description(&self) -> &str {
        "根据 text 文本内容生成思维导图 artifact。返回 JSON，包括 artifactId 和 title。"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "要整理成思维导图的文本，最好是带标题和列表的 markdown"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let text = arguments["text"].as_str().unwrap_or("");
        let outline = Outline::from_text(text)
            .ok_or_else(|| ToolError::InvalidArguments("'text' must not be empty".into()))?;

        let artifact = self
            .artifacts
            .create(NewArtifact::new(
                &outline.title,
                ArtifactType::MindMap,
                ArtifactRole::Assistant,
                outline.to_markdown(),
            ))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        info!(artifact_id = %artifact.id, chars = text.chars().count(), "Mind map generated");
        Ok(serde_json::json!({
            "artifactId": artifact.id,
            "title": artifact.title,
        })
        .to_string())
    }
}

/// A titled list of outline lines.
#[derive(Debug, PartialEq)]
pub struct Outline {
    pub title: String,
    pub lines: Vec<String>,
}

impl Outline {
    /// Build an outline from free text. `None` when the text has no content.
    pub fn from_text(text: &str) -> Option<Self> {
        let non_empty: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect();
        if non_empty.is_empty() {
            return None;
        }

        let structural: Vec<&str> = non_empty
            .iter()
            .copied()
            .filter(|l| is_heading(l) || is_list_item(l))
            .collect();

        let first_heading = structural.iter().find(|l| is_heading(l)).copied();
        let title = match first_heading {
            Some(h) => h.trim_start().trim_start_matches('#').trim().to_string(),
            None => truncate_chars(non_empty[0].trim(), MAX_TITLE_CHARS),
        };
        let title = if title.is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            title
        };

        let lines = if structural.is_empty() {
            non_empty.iter().map(|l| format!("+ {}", l.trim())).collect()
        } else {
            structural
                .iter()
                .filter(|l| Some(**l) != first_heading)
                .map(|l| l.to_string())
                .collect()
        };

        Some(Self { title, lines })
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

fn is_heading(line: &str) -> bool {
    let t = line.trim_start();
    let hashes = t.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && t[hashes..].starts_with(' ')
}

fn is_list_item(line: &str) -> bool {
    let t = line.trim_start();
    if ["- ", "+ ", "* "].iter().any(|m| t.starts_with(m)) {
        return true;
    }
    let digits = t.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && (t[digits..].starts_with(". ") || t[digits..].starts_with(") "))
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
