//! Artifact Store
//!
//! Typed, named documents keyed by canonical name. Each stage owns the
//! artifacts it writes; downstream stages only read them back.
//!
//! Two backends share the [`ArtifactStore`] contract:
//! - [`MemoryStore`]: `DashMap`-backed, for tests and throwaway runs
//! - [`SqliteStore`]: pooled SQLite, persists across runs

mod memory;
mod sqlite;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::types::{Artifact, ArtifactKind, ArtifactRef, Result, Stage};

pub use memory::MemoryStore;
pub use sqlite::{PoolConfig, SqliteStore};

/// Shared store handle for async contexts.
pub type SharedStore = Arc<dyn ArtifactStore>;

/// Persisted-artifact contract.
///
/// `put` is idempotent-by-overwrite: writing the same name twice leaves the
/// latest payload. Concurrent writers must use distinct names.
pub trait ArtifactStore: Send + Sync {
    fn put(
        &self,
        name: &str,
        kind: ArtifactKind,
        stage: Stage,
        payload: serde_json::Value,
    ) -> Result<ArtifactRef>;

    /// Fails with `ArtifactNotFound` when the name is unknown
    fn get(&self, name: &str) -> Result<Artifact>;

    fn contains(&self, name: &str) -> Result<bool>;

    /// Refs of every artifact of `kind`, sorted by name
    fn list_by_kind(&self, kind: ArtifactKind) -> Result<Vec<ArtifactRef>>;

    /// Refs of every artifact owned by `stage`, sorted by name
    fn list_by_stage(&self, stage: Stage) -> Result<Vec<ArtifactRef>>;

    /// Drop everything `stage` produced. Returns the number of removed artifacts.
    fn clear_stage(&self, stage: Stage) -> Result<usize>;
}

/// Typed helpers over any store
pub trait ArtifactStoreExt: ArtifactStore {
    fn put_document<T: Serialize>(
        &self,
        name: &str,
        kind: ArtifactKind,
        stage: Stage,
        document: &T,
    ) -> Result<ArtifactRef> {
        self.put(name, kind, stage, serde_json::to_value(document)?)
    }

    fn get_document<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        self.get(name)?.decode()
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStoreExt for S {}

fn sort_refs(mut refs: Vec<ArtifactRef>) -> Vec<ArtifactRef> {
    refs.sort_by(|a, b| a.name.cmp(&b.name));
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocError, FileSummary, names};
    use serde_json::json;

    /// Contract checks shared by both backends
    pub(crate) fn exercise_contract(store: &dyn ArtifactStore) {
        let first = store
            .put(
                names::FILE_TREE,
                ArtifactKind::FileTree,
                Stage::Prepare,
                json!({"tree": "a"}),
            )
            .unwrap();
        assert_eq!(first.kind, ArtifactKind::FileTree);
        assert_eq!(first.digest.len(), 64);

        // Overwrite keeps the latest payload
        let second = store
            .put(
                names::FILE_TREE,
                ArtifactKind::FileTree,
                Stage::Prepare,
                json!({"tree": "b"}),
            )
            .unwrap();
        assert_ne!(first.digest, second.digest);
        let stored = store.get(names::FILE_TREE).unwrap();
        assert_eq!(stored.payload, json!({"tree": "b"}));
        assert_eq!(stored.digest, second.digest);

        let summary = FileSummary {
            path: "src/b.rs".to_string(),
            summary: "b".to_string(),
        };
        store
            .put_document(
                &names::file_summary("src/b.rs"),
                ArtifactKind::FileSummary,
                Stage::Document,
                &summary,
            )
            .unwrap();
        store
            .put(
                &names::file_summary("src/a.rs"),
                ArtifactKind::FileSummary,
                Stage::Document,
                json!({"path": "src/a.rs", "summary": "a"}),
            )
            .unwrap();

        let by_kind = store.list_by_kind(ArtifactKind::FileSummary).unwrap();
        let listed: Vec<_> = by_kind.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(listed, vec!["document/file/src/a.rs", "document/file/src/b.rs"]);

        let decoded: FileSummary = store.get_document(&names::file_summary("src/b.rs")).unwrap();
        assert_eq!(decoded, summary);

        assert_eq!(store.list_by_stage(Stage::Prepare).unwrap().len(), 1);
        assert_eq!(store.list_by_stage(Stage::Explore).unwrap().len(), 0);
        assert!(store.contains(names::FILE_TREE).unwrap());

        assert!(matches!(
            store.get("missing"),
            Err(DocError::ArtifactNotFound(name)) if name == "missing"
        ));

        assert_eq!(store.clear_stage(Stage::Document).unwrap(), 2);
        assert!(store.list_by_kind(ArtifactKind::FileSummary).unwrap().is_empty());
        assert!(store.contains(names::FILE_TREE).unwrap());
    }

    #[test]
    fn test_memory_store_contract() {
        exercise_contract(&MemoryStore::new());
    }

    #[test]
    fn test_sqlite_store_contract() {
        let store = SqliteStore::open_in_memory().unwrap();
        exercise_contract(&store);
    }

    #[test]
    fn test_shared_store_is_object_safe() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        store
            .put_document(
                names::INITIAL_DESCRIPTION,
                ArtifactKind::InitialDescription,
                Stage::Explore,
                &json!({"narrative": ""}),
            )
            .unwrap();
        assert_eq!(store.list_by_stage(Stage::Explore).unwrap().len(), 1);
    }
}
