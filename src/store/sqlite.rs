//! SQLite Artifact Store with Connection Pooling
//!
//! - Connection pooling via r2d2 for concurrent writers
//! - WAL mode so readers never block the aggregator's writes
//! - Version-tracked schema via `user_version`

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use super::{ArtifactStore, sort_refs};
use crate::constants::store;
use crate::types::{Artifact, ArtifactKind, ArtifactRef, DocError, Result, Stage};

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    /// Two connections per core, capped at the store maximum
    pub fn auto() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        Self {
            max_size: (cores * 2).clamp(2, store::MAX_POOL_SIZE),
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Pooled SQLite-backed artifact store.
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (creating if needed) the store at `path` and initialize its schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)
            .map_err(|e| DocError::Storage(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool };
        store.initialize()?;
        tracing::debug!(path = %path.as_ref().display(), "Opened artifact store");
        Ok(store)
    }

    /// Open an in-memory store for tests or throwaway runs.
    pub fn open_in_memory() -> Result<Self> {
        // A single connection: each in-memory connection is its own database
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| DocError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        let store = Self { pool };
        store.initialize()?;
        Ok(store)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            DocError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if current > SCHEMA_VERSION {
            return Err(DocError::Storage(format!(
                "Artifact store schema version {} is newer than supported version {}",
                current, SCHEMA_VERSION
            )));
        }

        conn.execute_batch(SCHEMA)?;
        if current < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    fn query_refs(&self, column: &str, value: &str) -> Result<Vec<ArtifactRef>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT name, kind, stage, digest, size FROM artifacts WHERE {} = ?1 ORDER BY name",
            column
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![value], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut refs = Vec::new();
        for row in rows {
            let (name, kind, stage, digest, size) = row?;
            refs.push(ArtifactRef {
                kind: parse_kind(&name, &kind)?,
                stage: parse_stage(&name, &stage)?,
                name,
                digest,
                size: size as usize,
            });
        }
        Ok(sort_refs(refs))
    }
}

fn parse_kind(name: &str, raw: &str) -> Result<ArtifactKind> {
    ArtifactKind::parse(raw)
        .ok_or_else(|| DocError::Storage(format!("Artifact '{}' has unknown kind '{}'", name, raw)))
}

fn parse_stage(name: &str, raw: &str) -> Result<Stage> {
    Stage::parse(raw)
        .ok_or_else(|| DocError::Storage(format!("Artifact '{}' has unknown stage '{}'", name, raw)))
}

impl ArtifactStore for SqliteStore {
    fn put(
        &self,
        name: &str,
        kind: ArtifactKind,
        stage: Stage,
        payload: serde_json::Value,
    ) -> Result<ArtifactRef> {
        let artifact = Artifact::new(name, kind, stage, payload);
        let serialized = artifact.payload.to_string();

        self.conn()?.execute(
            "INSERT INTO artifacts (name, kind, stage, payload, digest, size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                kind = excluded.kind,
                stage = excluded.stage,
                payload = excluded.payload,
                digest = excluded.digest,
                size = excluded.size,
                created_at = excluded.created_at",
            params![
                artifact.name,
                kind.as_str(),
                stage.as_str(),
                serialized,
                artifact.digest,
                serialized.len() as i64,
                artifact.created_at.to_rfc3339(),
            ],
        )?;

        tracing::trace!(name, %kind, "Stored artifact");
        Ok(artifact.to_ref())
    }

    fn get(&self, name: &str) -> Result<Artifact> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT kind, stage, payload, digest, created_at FROM artifacts WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((kind, stage, payload, digest, created_at)) = row else {
            return Err(DocError::ArtifactNotFound(name.to_string()));
        };

        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                DocError::Storage(format!("Artifact '{}' has invalid timestamp: {}", name, e))
            })?;

        Ok(Artifact {
            name: name.to_string(),
            kind: parse_kind(name, &kind)?,
            stage: parse_stage(name, &stage)?,
            payload: serde_json::from_str(&payload)?,
            digest,
            created_at,
        })
    }

    fn contains(&self, name: &str) -> Result<bool> {
        let found = self
            .conn()?
            .query_row(
                "SELECT 1 FROM artifacts WHERE name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn list_by_kind(&self, kind: ArtifactKind) -> Result<Vec<ArtifactRef>> {
        self.query_refs("kind", kind.as_str())
    }

    fn list_by_stage(&self, stage: Stage) -> Result<Vec<ArtifactRef>> {
        self.query_refs("stage", stage.as_str())
    }

    fn clear_stage(&self, stage: Stage) -> Result<usize> {
        let removed = self
            .conn()?
            .execute("DELETE FROM artifacts WHERE stage = ?1", params![stage.as_str()])?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::names;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_schema() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert!(tables.contains(&"artifacts".to_string()));

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_artifacts_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(store::DATABASE_FILE);

        let digest = {
            let store = SqliteStore::open(&path).unwrap();
            store
                .put(
                    names::INITIAL_DESCRIPTION,
                    ArtifactKind::InitialDescription,
                    Stage::Explore,
                    json!({"narrative": "a cli tool"}),
                )
                .unwrap()
                .digest
        };

        let reopened = SqliteStore::open(&path).unwrap();
        let artifact = reopened.get(names::INITIAL_DESCRIPTION).unwrap();
        assert_eq!(artifact.digest, digest);
        assert_eq!(artifact.payload["narrative"], "a cli tool");
        assert_eq!(artifact.stage, Stage::Explore);
    }
}
