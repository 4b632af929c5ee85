//! Article evaluator tools.
//!
//! Each tool reads the user's article, asks the model for one kind of
//! evaluation and streams the answer straight into a new artifact:
//!
//! 1. `ARTIFACT_CONTENT_START` with a pre-generated artifact id
//! 2. one `ARTIFACT_CONTENT_CHUNK` per non-empty model delta
//! 3. `ARTIFACT_CONTENT_COMPLETE`
//! 4. the artifact is stored under the announced id, then `ARTIFACT_LIST_UPDATED`
//!
//! The tool result is `{"evaluate_type", "artifact_id", "title"}`.

use std::sync::Arc;

use async_trait::async_trait;
use lectern_core::artifact::{Artifact, ArtifactRole, ArtifactStore, ArtifactType, NewArtifact};
use lectern_core::error::ToolError;
use lectern_core::event::AgentEvent;
use lectern_core::message::Message;
use lectern_core::provider::{Provider, ProviderRequest};
use lectern_core::tool::{Tool, ToolContext, ToolResult};
use tracing::{debug, info};

/// The kinds of evaluation the tools produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluateType {
    Comment,
    Title,
    Introduction,
}

impl EvaluateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Title => "title",
            Self::Introduction => "introduction",
        }
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::Comment => "write_comment",
            Self::Title => "write_candidate_titles",
            Self::Introduction => "write_introduction",
        }
    }

    /// Title of the generated artifact.
    pub fn artifact_title(&self) -> &'static str {
        match self {
            Self::Comment => "文章评价",
            Self::Title => "候选标题",
            Self::Introduction => "介绍语",
        }
    }

    fn tool_description(&self) -> &'static str {
        match self {
            Self::Comment => "评价这篇文章的质量，包括读者画像分析和六大维度评估。",
            Self::Title => "根据文章内容，撰写三个候选标题。",
            Self::Introduction => "根据文章内容，撰写一段介绍语。",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Self::Comment => {
                "请先分析这篇文章的目标读者画像，然后从主题、结构、论证、表达、可读性、\
                 原创性六个维度逐一评价，每个维度给出优点、问题和修改建议。"
            }
            Self::Title => {
                "请根据文章内容撰写三个候选标题，每个标题单独一行，并用一句话说明它的侧重点。"
            }
            Self::Introduction => {
                "请为这篇文章撰写一段 100 到 200 字的介绍语，用于在文章列表中吸引读者点击。"
            }
        }
    }
}

const EVALUATOR_SYSTEM_PROMPT: &str = "你是一位资深的技术写作编辑。你只输出 markdown 格式的结果，\
不复述原文，不输出与任务无关的寒暄。";

fn user_prompt(evaluate_type: EvaluateType, article: &Artifact) -> String {
    format!(
        "{instruction}\n\n<article title=\"{title}\">\n{content}\n</article>",
        instruction = evaluate_type.instruction(),
        title = article.title,
        content = article.content,
    )
}

/// One evaluator tool; the three public tools differ only in [`EvaluateType`].
pub struct ArticleEvaluatorTool {
    evaluate_type: EvaluateType,
    provider: Arc<dyn Provider>,
    model: String,
    artifacts: Arc<dyn ArtifactStore>,
}

impl ArticleEvaluatorTool {
    pub fn new(
        evaluate_type: EvaluateType,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            evaluate_type,
            provider,
            model: model.into(),
            artifacts,
        }
    }

    fn failure(&self, reason: impl std::fmt::Display) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.evaluate_type.tool_name().into(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Tool for ArticleEvaluatorTool {
    fn name(&self) -> &str {
        self.evaluate_type.tool_name()
    }

    fn description(&self) -> &str {
        self.evaluate_type.tool_description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "original_artifact_id": {
                    "type": "string",
                    "description": "原文 Artifact ID"
                }
            },
            "required": ["original_artifact_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        let original_id = arguments["original_artifact_id"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ToolError::InvalidArguments("Missing 'original_artifact_id' argument".into())
            })?;

        let original = self
            .artifacts
            .get(original_id)
            .await
            .map_err(|e| self.failure(e))?
            .ok_or_else(|| self.failure(format!("artifact {original_id} not found")))?;

        let title = self.evaluate_type.artifact_title();
        let artifact_type = ArtifactType::Evaluation;
        let artifact_id = self.artifacts.generate_id();

        info!(
            evaluate_type = self.evaluate_type.as_str(),
            original_artifact_id = original_id,
            artifact_id = %artifact_id,
            "Evaluating article"
        );

        ctx.events.emit(AgentEvent::ArtifactContentStart {
            artifact_id: artifact_id.clone(),
            title: title.into(),
            artifact_type,
        });

        let mut request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(EVALUATOR_SYSTEM_PROMPT),
                Message::user(user_prompt(self.evaluate_type, &original)),
            ],
        );
        request.temperature = 0.7;

        let mut stream = self
            .provider
            .stream(request)
            .await
            .map_err(|e| self.failure(e))?;

        let mut content = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
                next = stream.recv() => next,
            };
            let Some(delta) = next else { break };
            let delta = delta.map_err(|e| self.failure(e))?;
            if delta.content.is_empty() {
                continue;
            }
            ctx.events.emit(AgentEvent::ArtifactContentChunk {
                artifact_id: artifact_id.clone(),
                content: delta.content.clone(),
            });
            content.push_str(&delta.content);
        }

        ctx.events.emit(AgentEvent::ArtifactContentComplete {
            artifact_id: artifact_id.clone(),
        });

        let artifact = self
            .artifacts
            .create_with_id(
                &artifact_id,
                NewArtifact::new(title, artifact_type, ArtifactRole::Assistant, content)
                    .with_description(format!("{} of {}", self.evaluate_type.as_str(), original_id)),
            )
            .await
            .map_err(|e| self.failure(e))?;

        ctx.events.emit(AgentEvent::ArtifactListUpdated {
            artifact_id: artifact.id.clone(),
            title: artifact.title.clone(),
            artifact_type: artifact.artifact_type,
            role: artifact.role,
        });
        debug!(artifact_id = %artifact.id, chars = artifact.content.chars().count(), "Evaluation stored");

        Ok(serde_json::json!({
            "evaluate_type": self.evaluate_type.as_str(),
            "artifact_id": artifact.id,
            "title": artifact.title,
        })
        .to_string())
    }
}
