//! Course lookup tools: `list_articles` and `read_article`.

use std::sync::Arc;

use async_trait::async_trait;
use lectern_core::artifact::CourseCatalog;
use lectern_core::error::{StoreError, ToolError};
use lectern_core::tool::{Tool, ToolContext, ToolResult};
use tracing::debug;

fn store_failure(tool_name: &str, e: StoreError) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason: e.to_string(),
    }
}

/// Lists course metadata, optionally filtered by tag.
pub struct ListArticlesTool {
    catalog: Arc<dyn CourseCatalog>,
}

impl ListArticlesTool {
    pub fn new(catalog: Arc<dyn CourseCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for ListArticlesTool {
    fn name(&self) -> &str {
        "list_articles"
    }

    fn description(&self) -> &str {
        "查询文章元信息列表。返回 JSON 数组，每项包括 artifact_id、slug、标题、标签和摘要。"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "tag": {
                    "type": "string",
                    "description": "文章标签，例如 \"链表\"、\"二叉树\"、\"动态规划\"。为空时返回全部文章。"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let tag = arguments["tag"].as_str().unwrap_or("").trim();

        let courses: Vec<_> = self
            .catalog
            .list_courses()
            .await
            .map_err(|e| store_failure(self.name(), e))?
            .into_iter()
            .filter(|c| c.has_tag(tag))
            .collect();

        debug!(tag, count = courses.len(), "Listed articles");
        serde_json::to_string(&courses).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

/// Returns the markdown content of one course.
pub struct ReadArticleTool {
    catalog: Arc<dyn CourseCatalog>,
}

impl ReadArticleTool {
    pub fn new(catalog: Arc<dyn CourseCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for ReadArticleTool {
    fn name(&self) -> &str {
        "read_article"
    }

    fn description(&self) -> &str {
        "根据 artifact_id 读取文章的 markdown 全文。"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "artifact_id": {
                    "type": "string",
                    "description": "文章的 artifact_id，来自 list_articles 的结果"
                }
            },
            "required": ["artifact_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let artifact_id = arguments["artifact_id"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'artifact_id' argument".into()))?;

        self.catalog
            .read_content(artifact_id)
            .await
            .map_err(|e| store_failure(self.name(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_memory::FileCourseCatalog;

    const DP_ID: &str = "14-dynamic-programming-basics";

    fn catalog_with_content() -> (tempfile::TempDir, Arc<dyn CourseCatalog>) {
        let dir = tempfile::tempdir().unwrap();
        let course_dir = dir.path().join(DP_ID);
        std::fs::create_dir_all(&course_dir).unwrap();
        std::fs::write(course_dir.join(format!("{DP_ID}.md")), "# 打家劫舍").unwrap();
        let catalog = Arc::new(FileCourseCatalog::new(dir.path()));
        (dir, catalog)
    }

    #[tokio::test]
    async fn list_all_and_by_tag() {
        let (_dir, catalog) = catalog_with_content();
        let tool = ListArticlesTool::new(catalog);
        let ctx = ToolContext::detached("s1");

        let all: serde_json::Value =
            serde_json::from_str(&tool.execute(serde_json::json!({}), &ctx).await.unwrap()).unwrap();
        assert_eq!(all.as_array().unwrap().len(), 1);
        assert_eq!(all[0]["artifact_id"], DP_ID);

        let none: serde_json::Value = serde_json::from_str(
            &tool
                .execute(serde_json::json!({"tag": "二叉树"}), &ctx)
                .await
                .unwrap(),
        )
        .unwrap();
        assert!(none.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_output_keeps_unicode_readable() {
        let (_dir, catalog) = catalog_with_content();
        let output = ListArticlesTool::new(catalog)
            .execute(serde_json::json!({"tag": "动态规划"}), &ToolContext::detached("s1"))
            .await
            .unwrap();
        assert!(output.contains("打家劫舍"));
    }

    #[tokio::test]
    async fn read_article_returns_markdown() {
        let (_dir, catalog) = catalog_with_content();
        let output = ReadArticleTool::new(catalog)
            .execute(serde_json::json!({"artifact_id": DP_ID}), &ToolContext::detached("s1"))
            .await
            .unwrap();
        assert_eq!(output, "# 打家劫舍");
    }

    #[tokio::test]
    async fn read_article_errors() {
        let (_dir, catalog) = catalog_with_content();
        let tool = ReadArticleTool::new(catalog);
        let ctx = ToolContext::detached("s1");

        let err = tool.execute(serde_json::json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = tool
            .execute(serde_json::json!({"artifact_id": "missing"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
