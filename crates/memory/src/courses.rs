//! File-backed course catalog.
//!
//! Course metadata comes from a built-in list, optionally extended by an
//! `index.toml` in the data directory. Course content is read on demand from
//! `<data_dir>/<slug>/<slug>.md`.
//!
//! ```toml
//! [[courses]]
//! artifact_id = "15-house-robber-ii"
//! slug = "15-house-robber-ii"
//! title = "15 打家劫舍 II"
//! tags = ["动态规划"]
//! summary = "..."
//! ```

use async_trait::async_trait;
use lectern_core::artifact::{Course, CourseCatalog};
use lectern_core::error::StoreError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Courses every installation knows about.
pub fn builtin_courses() -> Vec<Course> {
    vec![Course {
        artifact_id: "14-dynamic-programming-basics".into(),
        slug: "14-dynamic-programming-basics".into(),
        title: "14 打家劫舍：动态规划的解题四步骤".into(),
        tags: vec!["动态规划".into()],
        summary: "动态规划是一类很讲究「触类旁通」的题型。很多动态规划的解法需要你做过某一类型的例题，\
                  再做类似的题目的时候就可以想起来相应的思路。动态规划的典型入门题目是打家劫舍问题，\
                  本文以打家劫舍问题为例，讲解动态规划的解题四步骤：定义子问题、写出子问题的递推关系、\
                  确定 DP 数组的计算顺序、空间优化。"
            .into(),
    }]
}

#[derive(Debug, Deserialize)]
struct CourseIndex {
    #[serde(default)]
    courses: Vec<Course>,
}

/// A catalog over a directory of markdown course files.
pub struct FileCourseCatalog {
    data_dir: PathBuf,
    courses: Vec<Course>,
}

impl FileCourseCatalog {
    /// Open a catalog rooted at `data_dir`.
    ///
    /// A missing directory or index is fine: the built-in courses remain listed,
    /// and reading their content reports `NotFound`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let mut courses = builtin_courses();

        for course in Self::load_index(&data_dir) {
            match courses.iter_mut().find(|c| c.artifact_id == course.artifact_id) {
                Some(existing) => *existing = course,
                None => courses.push(course),
            }
        }

        debug!(data_dir = %data_dir.display(), count = courses.len(), "Course catalog loaded");
        Self { data_dir, courses }
    }

    /// Read `index.toml`, skipping it with a warning when malformed.
    fn load_index(data_dir: &Path) -> Vec<Course> {
        let path = data_dir.join("index.toml");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // no index, built-ins only
        };

        match toml::from_str::<CourseIndex>(&content) {
            Ok(index) => index.courses,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping malformed course index");
                Vec::new()
            }
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn content_path(&self, slug: &str) -> PathBuf {
        self.data_dir.join(slug).join(format!("{slug}.md"))
    }
}

#[async_trait]
impl CourseCatalog for FileCourseCatalog {
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.courses.clone())
    }

    async fn get_course(&self, artifact_id: &str) -> Result<Option<Course>, StoreError> {
        Ok(self.courses.iter().find(|c| c.artifact_id == artifact_id).cloned())
    }

    async fn read_content(&self, artifact_id: &str) -> Result<String, StoreError> {
        let course = self
            .get_course(artifact_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("course {artifact_id}")))?;

        let path = self.content_path(&course.slug);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(
                format!("course file {}", path.display()),
            )),
            Err(e) => Err(StoreError::Storage(format!(
                "Failed to read course file {}: {e}",
                path.display()
            ))),
        }
    }
}
