//! In-memory artifact store

use dashmap::DashMap;

use super::{ArtifactStore, sort_refs};
use crate::types::{Artifact, ArtifactKind, ArtifactRef, DocError, Result, Stage};

/// Lock-sharded map of artifacts. Lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: DashMap<String, Artifact>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    fn collect_refs(&self, keep: impl Fn(&Artifact) -> bool) -> Vec<ArtifactRef> {
        let refs = self
            .artifacts
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().to_ref())
            .collect();
        sort_refs(refs)
    }
}

impl ArtifactStore for MemoryStore {
    fn put(
        &self,
        name: &str,
        kind: ArtifactKind,
        stage: Stage,
        payload: serde_json::Value,
    ) -> Result<ArtifactRef> {
        let artifact = Artifact::new(name, kind, stage, payload);
        let artifact_ref = artifact.to_ref();
        self.artifacts.insert(name.to_string(), artifact);
        tracing::trace!(name, %kind, "Stored artifact");
        Ok(artifact_ref)
    }

    fn get(&self, name: &str) -> Result<Artifact> {
        self.artifacts
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DocError::ArtifactNotFound(name.to_string()))
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.artifacts.contains_key(name))
    }

    fn list_by_kind(&self, kind: ArtifactKind) -> Result<Vec<ArtifactRef>> {
        Ok(self.collect_refs(|a| a.kind == kind))
    }

    fn list_by_stage(&self, stage: Stage) -> Result<Vec<ArtifactRef>> {
        Ok(self.collect_refs(|a| a.stage == stage))
    }

    fn clear_stage(&self, stage: Stage) -> Result<usize> {
        let before = self.artifacts.len();
        self.artifacts.retain(|_, a| a.stage != stage);
        Ok(before - self.artifacts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_concurrent_distinct_writers() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .put(
                            &format!("document/file/f{}.rs", i),
                            ArtifactKind::FileSummary,
                            Stage::Document,
                            json!({"path": format!("f{}.rs", i), "summary": "s"}),
                        )
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8);
    }
}
