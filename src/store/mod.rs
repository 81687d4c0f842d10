pub mod model;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::devcontainer::RuntimeConfig;
use crate::error::{Error, Result};
use model::{
    EnvFile, Environment, EnvironmentRecord, EnvironmentStatus, PortMapping, Project,
    ProjectStatus,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    repo_path   TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'active',
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS environments (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id      INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name            TEXT NOT NULL UNIQUE,
    branch          TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'created',
    container_id    TEXT,
    worktree_path   TEXT,
    runtime_config  TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    UNIQUE (project_id, branch)
);

CREATE TABLE IF NOT EXISTS env_files (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    environment_id  INTEGER NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
    relative_path   TEXT NOT NULL,
    content         TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    UNIQUE (environment_id, relative_path)
);

CREATE TABLE IF NOT EXISTS port_mappings (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    environment_id  INTEGER NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
    container_port  INTEGER NOT NULL,
    host_port       INTEGER NOT NULL UNIQUE,
    hostname        TEXT NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_port_mappings_environment ON port_mappings(environment_id);
";

const ENVIRONMENT_COLUMNS: &str =
    "id, project_id, name, branch, status, container_id, worktree_path, runtime_config";

/// SQLite-backed record of projects, environments, env files and port
/// mappings.
///
/// A single connection guarded by a mutex: every call takes the lock for its
/// own duration only, so no lock is ever held across an await point by
/// callers. Port allocation runs inside one transaction under that lock,
/// which makes it the single writer for host ports.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        Self::bootstrap(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- projects ----------------------------------------------------------

    /// Insert the project if no project with `name` exists, then return the
    /// stored row.
    pub fn ensure_project(&self, name: &str, repo_path: &Path) -> Result<Project> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO projects (name, repo_path, status, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO NOTHING",
            params![
                name,
                repo_path.to_string_lossy(),
                ProjectStatus::Active.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        conn.query_row(
            "SELECT id, name, repo_path, status FROM projects WHERE name = ?1",
            params![name],
            project_from_row,
        )
        .map_err(Error::from)
    }

    pub fn get_project(&self, id: i64) -> Result<Project> {
        self.conn()
            .query_row(
                "SELECT id, name, repo_path, status FROM projects WHERE id = ?1",
                params![id],
                project_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("project", id.to_string()))
    }

    // -- environments ------------------------------------------------------

    pub fn insert_environment(&self, project_id: i64, name: &str, branch: &str) -> Result<Environment> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO environments (project_id, name, branch, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                project_id,
                name,
                branch,
                EnvironmentStatus::Created.as_str(),
                now
            ],
        )
        .map_err(|e| constraint_to_conflict(e, || format!("environment '{name}' already exists")))?;
        let id = conn.last_insert_rowid();
        get_environment_where(&conn, "id = ?1", params![id])?
            .ok_or_else(|| Error::not_found("environment", name))
    }

    pub fn get_environment(&self, name: &str) -> Result<Option<Environment>> {
        get_environment_where(&self.conn(), "name = ?1", params![name])
    }

    /// Environments (optionally of one project) with their port mappings,
    /// ordered by name.
    pub fn list_environments(&self, project_id: Option<i64>) -> Result<Vec<EnvironmentRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT e.id, e.project_id, e.name, e.branch, e.status, e.container_id,
                    e.worktree_path, e.runtime_config, p.name
             FROM environments e
             JOIN projects p ON p.id = e.project_id
             WHERE ?1 IS NULL OR e.project_id = ?1
             ORDER BY e.name",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((environment_from_row(row)?, row.get::<_, String>(8)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (environment, project) = row?;
            let ports = list_port_mappings_on(&conn, environment.id)?;
            records.push(EnvironmentRecord {
                project,
                environment,
                ports,
            });
        }
        Ok(records)
    }

    pub fn update_environment_status(&self, id: i64, status: EnvironmentStatus) -> Result<()> {
        self.update_environment(id, "status", &status.as_str())
    }

    pub fn set_container_id(&self, id: i64, container_id: Option<&str>) -> Result<()> {
        self.update_environment(id, "container_id", &container_id)
    }

    pub fn set_worktree_path(&self, id: i64, path: &Path) -> Result<()> {
        let path = path.to_string_lossy().into_owned();
        self.update_environment(id, "worktree_path", &path)
    }

    pub fn set_runtime_config(&self, id: i64, config: &RuntimeConfig) -> Result<()> {
        let json = serde_json::to_string(config)?;
        self.update_environment(id, "runtime_config", &json)
    }

    /// Set one column and stamp `updated_at`. `column` is always one of the
    /// literals above.
    fn update_environment(&self, id: i64, column: &str, value: &dyn rusqlite::ToSql) -> Result<()> {
        let sql = format!("UPDATE environments SET {column} = ?2, updated_at = ?3 WHERE id = ?1");
        let changed = self
            .conn()
            .execute(&sql, params![id, value, Utc::now().to_rfc3339()])?;
        if changed == 0 {
            return Err(Error::not_found("environment", id.to_string()));
        }
        Ok(())
    }

    // -- env files ---------------------------------------------------------

    pub fn upsert_env_file(&self, environment_id: i64, relative_path: &str, content: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO env_files (environment_id, relative_path, content, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(environment_id, relative_path)
             DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
            params![environment_id, relative_path, content, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn list_env_files(&self, environment_id: i64) -> Result<Vec<EnvFile>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, environment_id, relative_path, content
             FROM env_files WHERE environment_id = ?1 ORDER BY relative_path",
        )?;
        let rows = stmt.query_map(params![environment_id], |row| {
            Ok(EnvFile {
                id: row.get(0)?,
                environment_id: row.get(1)?,
                relative_path: row.get(2)?,
                content: row.get(3)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    // -- port mappings -----------------------------------------------------

    pub fn insert_port_mapping(
        &self,
        environment_id: i64,
        container_port: u16,
        host_port: u16,
        hostname: &str,
    ) -> Result<PortMapping> {
        insert_port_mapping_on(&self.conn(), environment_id, container_port, host_port, hostname)
    }

    pub fn delete_port_mappings(&self, environment_id: i64) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM port_mappings WHERE environment_id = ?1",
            params![environment_id],
        )?;
        Ok(deleted)
    }

    pub fn list_port_mappings(&self, environment_id: i64) -> Result<Vec<PortMapping>> {
        list_port_mappings_on(&self.conn(), environment_id)
    }

    /// `max(host_port) + 1` across every environment, or `range_start` when
    /// no mapping exists.
    ///
    /// This is a plain read: two callers may see the same value before
    /// either inserts. Use [`Store::allocate_port_mapping`] to allocate.
    pub fn next_host_port(&self, range_start: u16) -> Result<u16> {
        next_host_port_on(&self.conn(), range_start)
    }

    /// Pick the next host port and persist the mapping in one transaction.
    ///
    /// The connection lock is held from the read of the current maximum to
    /// the commit, so concurrent allocations are serialized and can never
    /// hand out the same port.
    pub fn allocate_port_mapping(
        &self,
        environment_id: i64,
        container_port: u16,
        hostname: &str,
        range_start: u16,
    ) -> Result<PortMapping> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let host_port = next_host_port_on(&tx, range_start)?;
        let mapping = insert_port_mapping_on(&tx, environment_id, container_port, host_port, hostname)?;
        tx.commit()?;
        Ok(mapping)
    }
}

fn constraint_to_conflict(err: rusqlite::Error, message: impl FnOnce() -> String) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            Error::Conflict(message())
        }
        _ => Error::Store(err),
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let status: String = row.get(3)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        repo_path: row.get::<_, String>(2)?.into(),
        status: status.parse().map_err(|e| conversion_error(3, e))?,
    })
}

fn environment_from_row(row: &Row<'_>) -> rusqlite::Result<Environment> {
    let status: String = row.get(4)?;
    let runtime_config = row
        .get::<_, Option<String>>(7)?
        .map(|json| serde_json::from_str::<RuntimeConfig>(&json))
        .transpose()
        .map_err(|e| conversion_error(7, e.to_string()))?;
    Ok(Environment {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        branch: row.get(3)?,
        status: status.parse().map_err(|e| conversion_error(4, e))?,
        container_id: row.get(5)?,
        worktree_path: row.get::<_, Option<String>>(6)?.map(Into::into),
        runtime_config,
    })
}

fn get_environment_where(
    conn: &Connection,
    predicate: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Option<Environment>> {
    let sql = format!("SELECT {ENVIRONMENT_COLUMNS} FROM environments WHERE {predicate}");
    conn.query_row(&sql, params, environment_from_row)
        .optional()
        .map_err(Error::from)
}

fn list_port_mappings_on(conn: &Connection, environment_id: i64) -> Result<Vec<PortMapping>> {
    let mut stmt = conn.prepare(
        "SELECT id, environment_id, container_port, host_port, hostname
         FROM port_mappings WHERE environment_id = ?1 ORDER BY container_port",
    )?;
    let rows = stmt.query_map(params![environment_id], |row| {
        Ok(PortMapping {
            id: row.get(0)?,
            environment_id: row.get(1)?,
            container_port: row.get(2)?,
            host_port: row.get(3)?,
            hostname: row.get(4)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

fn insert_port_mapping_on(
    conn: &Connection,
    environment_id: i64,
    container_port: u16,
    host_port: u16,
    hostname: &str,
) -> Result<PortMapping> {
    conn.execute(
        "INSERT INTO port_mappings (environment_id, container_port, host_port, hostname)
         VALUES (?1, ?2, ?3, ?4)",
        params![environment_id, container_port, host_port, hostname],
    )
    .map_err(|e| {
        constraint_to_conflict(e, || {
            format!("host port {host_port} or hostname '{hostname}' is already allocated")
        })
    })?;
    Ok(PortMapping {
        id: conn.last_insert_rowid(),
        environment_id,
        container_port,
        host_port,
        hostname: hostname.to_string(),
    })
}

fn next_host_port_on(conn: &Connection, range_start: u16) -> Result<u16> {
    let max: Option<u16> =
        conn.query_row("SELECT MAX(host_port) FROM port_mappings", [], |row| row.get(0))?;
    match max {
        None => Ok(range_start),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| Error::Conflict("host port range exhausted".to_string())),
    }
}
