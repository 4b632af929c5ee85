//! In-memory artifact store.

use async_trait::async_trait;
use chrono::Utc;
use lectern_core::artifact::{Artifact, ArtifactStore, NewArtifact};
use lectern_core::error::StoreError;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Stores artifacts in insertion order.
#[derive(Clone)]
pub struct InMemoryArtifactStore {
    artifacts: Arc<RwLock<Vec<Artifact>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            artifacts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn create(&self, artifact: NewArtifact) -> Result<Artifact, StoreError> {
        let id = self.generate_id();
        self.create_with_id(&id, artifact).await
    }

    async fn create_with_id(&self, id: &str, artifact: NewArtifact) -> Result<Artifact, StoreError> {
        if id.trim().is_empty() {
            return Err(StoreError::Storage("artifact id must not be empty".into()));
        }

        let now = Utc::now();
        let mut artifacts = self.artifacts.write().await;
        let existing = artifacts.iter().position(|a| a.id == id);
        let created_at = existing.map_or(now, |pos| artifacts[pos].created_at);

        let stored = Artifact {
            id: id.to_string(),
            title: artifact.title,
            artifact_type: artifact.artifact_type,
            role: artifact.role,
            description: artifact.description,
            content: artifact.content,
            created_at,
            updated_at: now,
        };
        debug!(artifact_id = %stored.id, artifact_type = %stored.artifact_type, "Artifact stored");
        match existing {
            Some(pos) => artifacts[pos] = stored.clone(),
            None => artifacts.push(stored.clone()),
        }
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<Artifact>, StoreError> {
        Ok(self.artifacts.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Artifact>, StoreError> {
        Ok(self.artifacts.read().await.clone())
    }

    fn generate_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::artifact::{ArtifactRole, ArtifactType};

    fn draft(title: &str) -> NewArtifact {
        NewArtifact::new(title, ArtifactType::MindMap, ArtifactRole::Assistant, "- a\n- b")
    }

    #[tokio::test]
    async fn create_assigns_id() {
        let store = InMemoryArtifactStore::new();
        let artifact = store.create(draft("Map")).await.unwrap();
        assert!(!artifact.id.is_empty());
        assert_eq!(store.get(&artifact.id).await.unwrap().unwrap().title, "Map");
    }

    #[tokio::test]
    async fn create_with_id_replaces_and_keeps_created_at() {
        let store = InMemoryArtifactStore::new();
        let first = store.create_with_id("14-dp", draft("v1")).await.unwrap();
        let second = store.create_with_id("14-dp", draft("v2")).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(store.get("14-dp").await.unwrap().unwrap().title, "v2");
    }

    #[tokio::test]
    async fn missing_artifact_is_none() {
        let store = InMemoryArtifactStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn empty_id_rejected() {
        let store = InMemoryArtifactStore::new();
        assert!(store.create_with_id("  ", draft("x")).await.is_err());
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let store = InMemoryArtifactStore::new();
        store.create_with_id("a", draft("A")).await.unwrap();
        store.create_with_id("b", draft("B")).await.unwrap();
        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn generated_ids_are_unique() {
        let store = InMemoryArtifactStore::new();
        assert_ne!(store.generate_id(), store.generate_id());
    }
}
