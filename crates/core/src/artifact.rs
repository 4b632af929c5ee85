//! Artifacts, courses and the stores that own them.
//!
//! An artifact is a titled piece of content shown next to the chat: a course
//! article, a mind map, an evaluation of the user's writing. Courses are a
//! read-only catalog whose content lives in markdown files.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Problem,
    UserCode,
    SolutionCode,
    Course,
    MindMap,
    Explanation,
    Evaluation,
    Other,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Problem => "problem",
            Self::UserCode => "user_code",
            Self::SolutionCode => "solution_code",
            Self::Course => "course",
            Self::MindMap => "mind_map",
            Self::Explanation => "explanation",
            Self::Evaluation => "evaluation",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who authored an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
    User,
    Assistant,
}

impl std::fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

/// A stored artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub title: String,
    pub artifact_type: ArtifactType,
    pub role: ArtifactRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to create an artifact; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArtifact {
    pub title: String,
    pub artifact_type: ArtifactType,
    pub role: ArtifactRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
}

impl NewArtifact {
    pub fn new(
        title: impl Into<String>,
        artifact_type: ArtifactType,
        role: ArtifactRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artifact_type,
            role,
            description: None,
            content: content.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Metadata of one course in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Stable identifier, also used as the course artifact id
    pub artifact_id: String,
    /// Directory and file stem of the course content
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

impl Course {
    /// Whether this course carries `tag`. An empty tag matches every course.
    pub fn has_tag(&self, tag: &str) -> bool {
        tag.is_empty() || self.tags.iter().any(|t| t == tag)
    }
}

/// Persistent home of artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store a new artifact under a freshly generated id.
    async fn create(&self, artifact: NewArtifact) -> Result<Artifact, StoreError>;

    /// Store an artifact under a caller-chosen id, replacing any artifact with that id
    /// while keeping its creation time.
    async fn create_with_id(&self, id: &str, artifact: NewArtifact) -> Result<Artifact, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Artifact>, StoreError>;

    /// All artifacts, oldest first.
    async fn list(&self) -> Result<Vec<Artifact>, StoreError>;

    /// A fresh id suitable for `create_with_id`.
    fn generate_id(&self) -> String;
}

/// Read-only catalog of courses.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError>;

    async fn get_course(&self, artifact_id: &str) -> Result<Option<Course>, StoreError>;

    /// Markdown content of a course. `NotFound` when the course or its file is absent.
    async fn read_content(&self, artifact_id: &str) -> Result<String, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_type_wire_names() {
        assert_eq!(
            serde_json::to_value(ArtifactType::SolutionCode).unwrap(),
            "solution_code"
        );
        assert_eq!(ArtifactType::MindMap.to_string(), "mind_map");
        let parsed: ArtifactType = serde_json::from_str("\"evaluation\"").unwrap();
        assert_eq!(parsed, ArtifactType::Evaluation);
    }

    #[test]
    fn course_tag_filter() {
        let course = Course {
            artifact_id: "14-dp".into(),
            slug: "14-dp".into(),
            title: "DP".into(),
            tags: vec!["动态规划".into()],
            summary: String::new(),
        };
        assert!(course.has_tag(""));
        assert!(course.has_tag("动态规划"));
        assert!(!course.has_tag("图论"));
    }

    #[test]
    fn new_artifact_builder() {
        let new = NewArtifact::new("t", ArtifactType::Other, ArtifactRole::User, "c")
            .with_description("d");
        assert_eq!(new.description.as_deref(), Some("d"));
        assert_eq!(new.role, ArtifactRole::User);
    }
}
