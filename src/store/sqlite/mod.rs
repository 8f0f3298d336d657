use super::IngestionStore;
use crate::error::StoreError;
use crate::types::{CommitRecord, ExtractedRepository, IngestOutcome, ProjectSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;

/// Bumped whenever the table layout changes
pub const SCHEMA_VERSION: &str = "1";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        initial_commit_sha TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS project_locations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        location TEXT NOT NULL,
        path TEXT NOT NULL,
        has_uncommitted_changes INTEGER NOT NULL,
        UNIQUE(project_id, path)
    )",
    "CREATE TABLE IF NOT EXISTS authors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS commits (
        sha TEXT PRIMARY KEY,
        message TEXT NOT NULL,
        author_timestamp TEXT NOT NULL,
        author_id INTEGER NOT NULL REFERENCES authors(id),
        project_id INTEGER NOT NULL REFERENCES projects(id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_commits_project ON commits(project_id)",
];

/// SQLite-backed ingestion store
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and initialize the schema
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let store = Self::connect(&path.to_string_lossy()).await?;
        store.init_schema().await?;
        tracing::info!("Opened inventory database at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> Result<Self, StoreError> {
        let store = Self::connect(":memory:").await?;
        store.init_schema().await?;
        Ok(store)
    }

    async fn connect(db_path: &str) -> Result<Self, StoreError> {
        let open_failed = |reason: String| StoreError::OpenFailed {
            path: db_path.to_string(),
            reason,
        };

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path))
            .map_err(|e| open_failed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        // A single connection serializes writers and keeps `:memory:` alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| open_failed(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create tables if missing; returns true when the schema was (re)created
    pub async fn init_schema(&self) -> Result<bool, StoreError> {
        self.create_schema()
            .await
            .map_err(|e| StoreError::SchemaFailed(format!("{:#}", e)))
    }

    async fn create_schema(&self) -> Result<bool> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create metadata table")?;

        let stored_version = self.schema_version().await;
        if let Some(version) = stored_version.as_deref()
            && version != SCHEMA_VERSION
        {
            anyhow::bail!(
                "Database schema version {} is not supported (expected {})",
                version,
                SCHEMA_VERSION
            );
        }

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create table")?;
        }

        let created = stored_version.is_none();
        if created {
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)")
                .bind(SCHEMA_VERSION)
                .execute(&self.pool)
                .await
                .context("Failed to store schema version")?;
        }

        Ok(created)
    }

    /// Stored schema version, if the metadata table has one
    pub async fn schema_version(&self) -> Option<String> {
        sqlx::query("SELECT value FROM metadata WHERE key = 'schema_version'")
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .map(|row| row.get("value"))
    }

    async fn count(&self, table: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn merge_snapshot(
        &self,
        snapshot: &ExtractedRepository,
        initial_commit_sha: &str,
    ) -> Result<IngestOutcome> {
        let mut outcome = IngestOutcome::default();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let project_id = match find_project(&mut tx, initial_commit_sha).await? {
            Some(id) => id,
            None => {
                outcome.project_created = true;
                insert_project(&mut tx, &snapshot.project_name, initial_commit_sha).await?
            }
        };

        outcome.location_created = upsert_location(&mut tx, project_id, snapshot).await?;

        for commit in &snapshot.commits {
            if commit_exists(&mut tx, &commit.sha).await? {
                tracing::trace!("Commit {} already stored, skipping", commit.sha);
                outcome.commits_skipped += 1;
                continue;
            }

            let (author_id, author_created) = find_or_create_author(&mut tx, commit).await?;
            if author_created {
                outcome.authors_added += 1;
            }

            insert_commit(&mut tx, commit, author_id, project_id).await?;
            outcome.commits_added += 1;
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(outcome)
    }
}

async fn find_project(tx: &mut Transaction<'_, Sqlite>, initial_commit_sha: &str) -> Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM projects WHERE initial_commit_sha = ?")
        .bind(initial_commit_sha)
        .fetch_optional(&mut **tx)
        .await
        .context("Failed to look up project")
}

async fn insert_project(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    initial_commit_sha: &str,
) -> Result<i64> {
    let id = sqlx::query("INSERT INTO projects (name, initial_commit_sha) VALUES (?, ?)")
        .bind(name)
        .bind(initial_commit_sha)
        .execute(&mut **tx)
        .await
        .context("Failed to insert project")?
        .last_insert_rowid();
    tracing::debug!("Created project {} ({})", name, initial_commit_sha);
    Ok(id)
}

/// Returns true when a new location row was created
async fn upsert_location(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: i64,
    snapshot: &ExtractedRepository,
) -> Result<bool> {
    let path = snapshot.path.to_string_lossy();

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM project_locations WHERE project_id = ? AND path = ?")
            .bind(project_id)
            .bind(path.as_ref())
            .fetch_optional(&mut **tx)
            .await
            .context("Failed to look up project location")?;

    if let Some(id) = existing {
        sqlx::query("UPDATE project_locations SET has_uncommitted_changes = ? WHERE id = ?")
            .bind(snapshot.has_uncommitted_changes)
            .bind(id)
            .execute(&mut **tx)
            .await
            .context("Failed to update project location")?;
        return Ok(false);
    }

    let location = snapshot
        .path
        .parent()
        .map(|parent| parent.to_string_lossy().into_owned())
        .unwrap_or_default();

    sqlx::query(
        "INSERT INTO project_locations (project_id, location, path, has_uncommitted_changes)
         VALUES (?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(location)
    .bind(path.as_ref())
    .bind(snapshot.has_uncommitted_changes)
    .execute(&mut **tx)
    .await
    .context("Failed to insert project location")?;

    tracing::debug!("Created project location {}", path);
    Ok(true)
}

async fn commit_exists(tx: &mut Transaction<'_, Sqlite>, sha: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM commits WHERE sha = ?")
        .bind(sha)
        .fetch_optional(&mut **tx)
        .await
        .context("Failed to look up commit")?;
    Ok(found.is_some())
}

/// Returns the author id and whether the author was created
async fn find_or_create_author(
    tx: &mut Transaction<'_, Sqlite>,
    commit: &CommitRecord,
) -> Result<(i64, bool)> {
    let existing = sqlx::query("SELECT id, name FROM authors WHERE email = ?")
        .bind(&commit.author_email)
        .fetch_optional(&mut **tx)
        .await
        .context("Failed to look up author")?;

    if let Some(row) = existing {
        let id: i64 = row.get("id");
        let name: String = row.get("name");
        if !commit.author_name.is_empty() && name != commit.author_name {
            sqlx::query("UPDATE authors SET name = ? WHERE id = ?")
                .bind(&commit.author_name)
                .bind(id)
                .execute(&mut **tx)
                .await
                .context("Failed to update author name")?;
            tracing::trace!("Renamed author {}: {} -> {}", commit.author_email, name, commit.author_name);
        }
        return Ok((id, false));
    }

    let id = sqlx::query("INSERT INTO authors (name, email) VALUES (?, ?)")
        .bind(&commit.author_name)
        .bind(&commit.author_email)
        .execute(&mut **tx)
        .await
        .context("Failed to insert author")?
        .last_insert_rowid();
    Ok((id, true))
}

async fn insert_commit(
    tx: &mut Transaction<'_, Sqlite>,
    commit: &CommitRecord,
    author_id: i64,
    project_id: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO commits (sha, message, author_timestamp, author_id, project_id)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&commit.sha)
    .bind(&commit.message)
    .bind(commit.author_timestamp.to_rfc3339())
    .bind(author_id)
    .bind(project_id)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("Failed to insert commit {}", commit.sha))?;
    Ok(())
}

#[async_trait]
impl IngestionStore for SqliteStore {
    async fn upsert_snapshot(
        &self,
        snapshot: &ExtractedRepository,
    ) -> Result<IngestOutcome, StoreError> {
        let Some(initial_commit_sha) = snapshot.identity() else {
            tracing::warn!(
                "Refusing snapshot without initial commit SHA: {}",
                snapshot.path.display()
            );
            return Err(StoreError::MissingIdentity(snapshot.path.display().to_string()));
        };

        let outcome = self
            .merge_snapshot(snapshot, initial_commit_sha)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("{:#}", e)))?;

        tracing::info!(
            "Saved {} ({}): {} new commits, {} already known",
            snapshot.project_name,
            snapshot.path.display(),
            outcome.commits_added,
            outcome.commits_skipped
        );
        Ok(outcome)
    }

    async fn total_projects(&self) -> Result<u64, StoreError> {
        self.count("projects").await
    }

    async fn total_commits(&self) -> Result<u64, StoreError> {
        self.count("commits").await
    }

    async fn total_authors(&self) -> Result<u64, StoreError> {
        self.count("authors").await
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT p.id, p.name, p.initial_commit_sha,
                (SELECT COUNT(*) FROM commits c WHERE c.project_id = p.id) AS commit_count,
                (SELECT COUNT(*) FROM project_locations l WHERE l.project_id = p.id) AS location_count,
                (SELECT COALESCE(MAX(l.has_uncommitted_changes), 0)
                   FROM project_locations l WHERE l.project_id = p.id) AS dirty
             FROM projects p
             ORDER BY p.name COLLATE NOCASE, p.id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let commit_count: i64 = row.get("commit_count");
                let location_count: i64 = row.get("location_count");
                let dirty: i64 = row.get("dirty");
                ProjectSummary {
                    id: row.get("id"),
                    name: row.get("name"),
                    initial_commit_sha: row.get("initial_commit_sha"),
                    commit_count: commit_count as u64,
                    location_count: location_count as u64,
                    has_uncommitted_changes: dirty != 0,
                }
            })
            .collect())
    }
}
