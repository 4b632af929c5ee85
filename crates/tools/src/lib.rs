//! Tool implementations for Lectern.
//!
//! Two toolsets exist:
//! - `tutor`: look up and read course articles, build mind maps
//! - `evaluator`: comment on an article, propose titles, write an introduction

pub mod courses;
pub mod evaluator;
pub mod mind_map;

use std::sync::Arc;

use lectern_config::Toolset;
use lectern_core::artifact::{ArtifactStore, CourseCatalog};
use lectern_core::provider::Provider;
use lectern_core::tool::ToolRegistry;

pub use courses::{ListArticlesTool, ReadArticleTool};
pub use evaluator::{ArticleEvaluatorTool, EvaluateType};
pub use mind_map::GenerateMindMapTool;

/// Collaborators the tools are built from.
#[derive(Clone)]
pub struct ToolDeps {
    pub courses: Arc<dyn CourseCatalog>,
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Used by the evaluator tools for their own model calls
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

/// Registry with the course tools and the mind map tool.
pub fn tutor_registry(courses: Arc<dyn CourseCatalog>, artifacts: Arc<dyn ArtifactStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ListArticlesTool::new(courses.clone())));
    registry.register(Box::new(ReadArticleTool::new(courses)));
    registry.register(Box::new(GenerateMindMapTool::new(artifacts)));
    registry
}

/// Registry with the three article evaluator tools.
pub fn evaluator_registry(
    provider: Arc<dyn Provider>,
    model: &str,
    artifacts: Arc<dyn ArtifactStore>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for evaluate_type in [EvaluateType::Comment, EvaluateType::Title, EvaluateType::Introduction] {
        registry.register(Box::new(ArticleEvaluatorTool::new(
            evaluate_type,
            provider.clone(),
            model,
            artifacts.clone(),
        )));
    }
    registry
}

/// Build the registry for a configured toolset.
pub fn registry_for(toolset: Toolset, deps: ToolDeps) -> ToolRegistry {
    match toolset {
        Toolset::Tutor => tutor_registry(deps.courses, deps.artifacts),
        Toolset::Evaluator => evaluator_registry(deps.provider, &deps.model, deps.artifacts),
    }
}
